/*!
 * Display string catalogs.
 */
use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::device::{DeviceError, Result};
use crate::host::Translator;

const FALLBACK_LOCALE: &str = "en";

/// A flat `key -> display string` catalog for one locale
///
/// Keys without an entry translate to themselves.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: HashMap<String, String>,
}

impl Catalog {
    /// A catalog with no entries
    pub fn identity() -> Self {
        Self::default()
    }

    /// Pick one locale out of a JSON object of catalogs keyed by locale
    ///
    /// Falls back to the `en` catalog, then to an identity catalog, when the
    /// locale has no entry.
    pub fn for_locale(json: &str, locale: &str) -> Result<Self> {
        let mut catalogs: HashMap<String, Catalog> = serde_json::from_str(json)
            .map_err(|e| DeviceError::ConfigurationError(format!("Invalid locale catalogs: {}", e)))?;
        let catalog = match catalogs.remove(locale) {
            Some(catalog) => catalog,
            None => {
                debug!("No catalog for locale {}, falling back to {}", locale, FALLBACK_LOCALE);
                catalogs.remove(FALLBACK_LOCALE).unwrap_or_default()
            }
        };
        Ok(catalog)
    }

    /// Add or replace an entry
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Translator for Catalog {
    fn translate(&self, key: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_returns_key() {
        let catalog = Catalog::identity();
        assert!(catalog.is_empty());
        assert_eq!(catalog.translate("Dimming UP"), "Dimming UP");
    }

    const CATALOGS: &str = r#"{
        "en": {"Group1": "Group 1"},
        "nl": {"Group1": "Groep 1", "Dimming UP": "Dimmen omhoog"}
    }"#;

    #[test]
    fn test_for_locale() {
        let catalog = Catalog::for_locale(CATALOGS, "nl").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.translate("Group2"), "Group2");
        assert_eq!(catalog.translate("Dimming UP"), "Dimmen omhoog");
    }

    #[test]
    fn test_for_locale_fallbacks() {
        let catalog = Catalog::for_locale(CATALOGS, "de").unwrap();
        assert_eq!(catalog.translate("Group1"), "Group 1");

        let catalog = Catalog::for_locale(r#"{"nl": {}}"#, "fr").unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Catalog::for_locale("[1, 2]", "en"),
            Err(DeviceError::ConfigurationError(_))
        ));
    }
}
