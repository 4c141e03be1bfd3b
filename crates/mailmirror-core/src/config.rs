//! Engine configuration.

use std::path::Path;

use mailmirror_wire::{FetchMode, ResultType, SortOrder, request::DEFAULT_LIMIT};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::FolderId;

/// Query that shows the inbox.
pub const DEFAULT_INBOX_QUERY: &str = "in:inbox";

/// Sync engine configuration.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Hits per search page.
    pub page_size: u32,
    /// Search sort order.
    pub sort: SortOrder,
    /// Locale sent with searches.
    pub locale: Option<String>,
    /// Id of the inbox folder.
    pub inbox_folder: FolderId,
    /// Query that counts as the default inbox view.
    pub inbox_query: String,
    /// Which messages an expansion fetches in full.
    pub fetch_mode: FetchMode,
    /// Whether searches return conversations or messages.
    pub result_type: ResultType,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_LIMIT,
            sort: SortOrder::DateDesc,
            locale: None,
            inbox_folder: FolderId::inbox(),
            inbox_query: DEFAULT_INBOX_QUERY.to_string(),
            fetch_mode: FetchMode::All,
            result_type: ResultType::Conversation,
        }
    }
}

impl SyncConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// is out of range.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded sync config");
        Ok(config)
    }

    /// Loads a configuration, falling back to defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero page size or an empty inbox id.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".into()));
        }
        if self.inbox_folder.as_str().is_empty() {
            return Err(Error::Config("inbox_folder must not be empty".into()));
        }
        Ok(())
    }

    /// Sets the page size.
    #[must_use]
    pub const fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the sort order.
    #[must_use]
    pub const fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the locale.
    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Sets the inbox folder id.
    #[must_use]
    pub fn inbox_folder(mut self, folder: impl Into<FolderId>) -> Self {
        self.inbox_folder = folder.into();
        self
    }

    /// Sets the default inbox query.
    #[must_use]
    pub fn inbox_query(mut self, query: impl Into<String>) -> Self {
        self.inbox_query = query.into();
        self
    }

    /// Sets the expansion fetch mode.
    #[must_use]
    pub const fn fetch_mode(mut self, fetch_mode: FetchMode) -> Self {
        self.fetch_mode = fetch_mode;
        self
    }

    /// Sets the search result type.
    #[must_use]
    pub const fn result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = result_type;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.sort, SortOrder::DateDesc);
        assert_eq!(config.inbox_folder, FolderId::inbox());
        assert_eq!(config.inbox_query, "in:inbox");
        assert_eq!(config.result_type, ResultType::Conversation);
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::new()
            .page_size(25)
            .locale("de_DE")
            .result_type(ResultType::Message)
            .fetch_mode(FetchMode::Unread);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.locale.as_deref(), Some("de_DE"));
        assert_eq!(config.fetch_mode, FetchMode::Unread);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"page_size": 50, "sort": "subjAsc"}"#).unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.sort, SortOrder::SubjectAsc);
        assert_eq!(config.inbox_query, "in:inbox");
    }

    #[test]
    fn test_load_validates() {
        let path = std::env::temp_dir().join(format!(
            "mailmirror-config-test-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"page_size": 0}"#).unwrap();
        let err = SyncConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        std::fs::write(&path, r#"{"locale": "fr_FR"}"#).unwrap();
        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.locale.as_deref(), Some("fr_FR"));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = SyncConfig::load_or_default("/nonexistent/mailmirror.json").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert!(matches!(
            SyncConfig::load("/nonexistent/mailmirror.json"),
            Err(Error::Io(_))
        ));
    }
}
