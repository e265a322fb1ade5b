//! Credential masking for logs.
//!
//! Shop access tokens, private app passwords and basic-auth userinfo must
//! never reach log output in clear text.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Credential shapes. The `secret` capture group is what gets masked.
const RULES: &[&str] = &[
    // Admin API tokens
    r"\b(?P<secret>shp(?:at|ca|pa|ss)_[a-fA-F0-9]{16,64})\b",
    r"(?i)x-shopify-access-token[\s:=]+(?P<secret>[^\s,;]+)",
    r"(?i)authorization[\s:=]+(?:basic|bearer)\s+(?P<secret>[a-zA-Z0-9+/=._-]{8,})",
    // Credential fields in JSON, YAML or query strings
    r#"(?i)(?:access[_-]?token|api[_-]?key|password)["']?\s*[:=]\s*["']?(?P<secret>[^\s"',}]{4,})"#,
    // Basic auth userinfo in a URL
    r"https?://[^\s/:@]+:(?P<secret>[^\s/@]+)@",
];

static COMPILED: LazyLock<Vec<Regex>> =
    LazyLock::new(|| RULES.iter().filter_map(|pattern| Regex::new(pattern).ok()).collect());

/// Masks credentials in strings.
///
/// Long values keep a short prefix and suffix so two tokens can still be
/// told apart in logs. Short values are masked entirely.
#[derive(Debug, Clone, Copy)]
pub struct SensitiveDataMasker {
    keep: usize,
}

impl Default for SensitiveDataMasker {
    fn default() -> Self {
        Self::new()
    }
}

impl SensitiveDataMasker {
    const FILL: &'static str = "***";

    /// Keeps three characters at each end of values of 8 or more characters.
    #[must_use]
    pub const fn new() -> Self {
        Self { keep: 3 }
    }

    /// Keeps `keep` characters at each end. Zero masks everything.
    #[must_use]
    pub const fn keeping(keep: usize) -> Self {
        Self { keep }
    }

    /// Masks a value known to be a credential.
    ///
    /// ```
    /// use tollgate_telemetry::masking::SensitiveDataMasker;
    ///
    /// let masker = SensitiveDataMasker::new();
    /// assert_eq!(masker.mask_value("shpat_0123456789abcdef"), "shp***def");
    /// assert_eq!(masker.mask_value("hunter2"), "***");
    /// ```
    #[must_use]
    pub fn mask_value(&self, value: &str) -> String {
        let len = value.chars().count();
        if self.keep == 0 || len < (self.keep * 2).max(8) {
            return Self::FILL.to_string();
        }
        let head: String = value.chars().take(self.keep).collect();
        let tail: String = value.chars().skip(len - self.keep).collect();
        format!("{head}{}{tail}", Self::FILL)
    }

    /// Masks every credential found in free text, such as a URL or a
    /// header dump. Returns the input unchanged when nothing matches.
    ///
    /// ```
    /// use tollgate_telemetry::masking::SensitiveDataMasker;
    ///
    /// let masker = SensitiveDataMasker::new();
    /// let masked = masker.mask_string("X-Shopify-Access-Token: shpat_0123456789abcdef0123");
    /// assert!(!masked.contains("0123456789abcdef0123"));
    /// ```
    #[must_use]
    pub fn mask_string<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut text = Cow::Borrowed(input);
        for regex in COMPILED.iter() {
            if !regex.is_match(&text) {
                continue;
            }
            let replaced = regex
                .replace_all(&text, |caps: &Captures<'_>| self.mask_match(caps))
                .into_owned();
            text = Cow::Owned(replaced);
        }
        text
    }

    fn mask_match(&self, caps: &Captures<'_>) -> String {
        let whole = &caps[0];
        let Some(secret) = caps.name("secret") else {
            return whole.to_string();
        };
        let start = secret.start() - caps.get(0).map_or(0, |m| m.start());
        let end = start + secret.len();
        format!(
            "{}{}{}",
            &whole[..start],
            self.mask_value(secret.as_str()),
            &whole[end..]
        )
    }
}
