//! Locale identifiers (`en-US`, `de`, `pt-BR`) used for voice selection.

use serde::{Deserialize, Serialize};
use std::fmt;

const FALLBACK_LOCALE: &str = "en-US";

/// A language tag normalized to `language[-REGION]` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Locale {
    language: String,
    region: Option<String>,
}

impl Locale {
    /// Parse `en-US`, `en_US`, `en_US.UTF-8` or `en`. Script subtags and encodings are dropped.
    pub fn new(identifier: &str) -> Self {
        let tag = identifier
            .split(['.', '@'])
            .next()
            .unwrap_or_default()
            .trim();
        let mut parts = tag.split(['-', '_']).filter(|p| !p.is_empty());
        let language = parts.next().unwrap_or_default().to_ascii_lowercase();
        let region = parts
            .find(|p| p.len() == 2 || (p.len() == 3 && p.chars().all(|c| c.is_ascii_digit())))
            .map(|p| p.to_ascii_uppercase());
        Self { language, region }
    }

    /// The user's locale from `LC_ALL`, `LC_MESSAGES` or `LANG`, falling back to `en-US`.
    /// `C` and `POSIX`, with or without an encoding (`C.UTF-8`), count as unset.
    pub fn current() -> Self {
        Self::from_env(|key| std::env::var(key).ok())
    }

    fn from_env(var: impl Fn(&str) -> Option<String>) -> Self {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| var(key))
            .map(|value| Self::new(&value))
            .find(|locale| !matches!(locale.language.as_str(), "" | "c" | "posix"))
            .unwrap_or_else(|| Self::new(FALLBACK_LOCALE))
    }

    pub fn language_code(&self) -> &str {
        &self.language
    }

    pub fn region_code(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// `language-REGION`, or just `language`.
    pub fn identifier(&self) -> String {
        match self.region {
            Some(ref region) => format!("{}-{}", self.language, region),
            None => self.language.clone(),
        }
    }

    /// True when both tags name the same language and region (case and separator insensitive).
    pub fn matches(&self, other: &str) -> bool {
        *self == Locale::new(other)
    }

    /// True when `other` is in the same base language.
    pub fn shares_language(&self, other: &str) -> bool {
        !self.language.is_empty() && self.language == Locale::new(other).language
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

impl From<String> for Locale {
    fn from(s: String) -> Self {
        Locale::new(&s)
    }
}

impl From<&str> for Locale {
    fn from(s: &str) -> Self {
        Locale::new(s)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.identifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!(Locale::new("en-US").identifier(), "en-US");
        assert_eq!(Locale::new("en_us.UTF-8").identifier(), "en-US");
        assert_eq!(Locale::new("de").identifier(), "de");
        assert_eq!(Locale::new("zh-Hans-CN").identifier(), "zh-CN");
        assert_eq!(Locale::new("es-419").identifier(), "es-419");
    }

    #[test]
    fn matching_ignores_case_and_separator() {
        let locale = Locale::new("pt-BR");
        assert!(locale.matches("pt_br"));
        assert!(!locale.matches("pt-PT"));
        assert!(locale.shares_language("pt-PT"));
        assert!(!locale.shares_language("es-ES"));
    }

    #[test]
    fn language_and_region_accessors() {
        let locale = Locale::new("fr_CA");
        assert_eq!(locale.language_code(), "fr");
        assert_eq!(locale.region_code(), Some("CA"));
        assert_eq!(Locale::new("fr").region_code(), None);
    }

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn c_locale_with_encoding_falls_back() {
        assert_eq!(Locale::from_env(env(&[("LANG", "C.UTF-8")])).identifier(), "en-US");
        assert_eq!(Locale::from_env(env(&[("LC_ALL", "POSIX"), ("LANG", "C")])).identifier(), "en-US");
        assert_eq!(Locale::from_env(env(&[])).identifier(), "en-US");
    }

    #[test]
    fn environment_precedence_skips_c_locale() {
        let vars = [("LC_ALL", "C.UTF-8"), ("LC_MESSAGES", ""), ("LANG", "de_DE.UTF-8")];
        assert_eq!(Locale::from_env(env(&vars)).identifier(), "de-DE");
        let vars = [("LC_ALL", "fr_CA.UTF-8"), ("LANG", "de_DE.UTF-8")];
        assert_eq!(Locale::from_env(env(&vars)).identifier(), "fr-CA");
    }
}
