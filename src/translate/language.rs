//! Target language parsing.
//! Accepts BCP 47 style codes ("fr", "en-US", "zh-Hant"); `_` is tolerated as a separator.

use std::fmt;

use unic_langid::LanguageIdentifier;

use super::TranslateError;

/// A parsed, canonicalized target language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLanguage {
    canonical: String,
}

impl TargetLanguage {
    /// Parse a language code. Empty and undetermined (`und`) codes are rejected.
    pub fn parse(code: &str) -> Result<Self, TranslateError> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(TranslateError::InvalidLanguage {
                code: code.to_string(),
                reason: "empty language code".into(),
            });
        }

        let id: LanguageIdentifier =
            trimmed
                .parse()
                .map_err(|e| TranslateError::InvalidLanguage {
                    code: code.to_string(),
                    reason: format!("{e}"),
                })?;

        if id.language.as_str() == "und" {
            return Err(TranslateError::InvalidLanguage {
                code: code.to_string(),
                reason: "undetermined language".into(),
            });
        }

        Ok(Self {
            canonical: id.to_string(),
        })
    }

    /// Canonical tag, e.g. "en-US".
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Primary language subtag, e.g. "en".
    #[cfg(test)]
    pub(crate) fn primary(&self) -> &str {
        self.canonical.split('-').next().unwrap_or_default()
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
