//! Reader session configuration.
//!
//! Configuration can be created programmatically with the `with_*` setters,
//! deserialized from JSON, or overlaid from environment variables.

use crate::error::ConfigError;
use reader_model::{CollectionId, Scaling};
use serde::{Deserialize, Serialize};

/// Default number of pages kept mounted around the focus.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Default number of automatic profile fetch attempts per page.
pub const DEFAULT_RETRY_CEILING: u32 = 3;

/// Configuration for one reader session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Collection (gallery) whose pages are read
    pub collection_id: CollectionId,
    /// 1-based page number the session opens on
    pub start_page: u32,
    /// Requested local window size
    pub window_size: usize,
    /// Requested remote window size; derived from the local size when absent
    pub remote_window_size: Option<usize>,
    /// Maximum number of profile fetch attempts per page
    pub retry_ceiling: u32,
    /// Image scaling used for profile requests
    pub scaling: Scaling,
    /// Viewport width used to resolve `Scaling::Auto`
    pub viewport_width_px: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            collection_id: CollectionId(0),
            start_page: 1,
            window_size: DEFAULT_WINDOW_SIZE,
            remote_window_size: None,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            scaling: Scaling::Auto,
            viewport_width_px: 1280,
        }
    }
}

impl SessionConfig {
    pub fn new(collection_id: CollectionId) -> Self {
        Self { collection_id, ..Self::default() }
    }

    pub fn with_start_page(mut self, page: u32) -> Self {
        self.start_page = page;
        self
    }

    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    pub fn with_remote_window_size(mut self, size: usize) -> Self {
        self.remote_window_size = Some(size);
        self
    }

    pub fn with_retry_ceiling(mut self, ceiling: u32) -> Self {
        self.retry_ceiling = ceiling;
        self
    }

    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn with_viewport_width(mut self, width_px: u32) -> Self {
        self.viewport_width_px = width_px;
        self
    }

    /// Overlays values from environment variables onto the defaults.
    ///
    /// Environment variables:
    /// - `READER_WINDOW_SIZE`: local window size
    /// - `READER_REMOTE_WINDOW_SIZE`: remote window size
    /// - `READER_RETRY_CEILING`: profile fetch attempts per page
    /// - `READER_VIEWPORT_WIDTH`: viewport width in pixels
    ///
    /// # Errors
    /// Returns an error if any variable holds an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay_env()
    }

    pub fn overlay_env(mut self) -> Result<Self, ConfigError> {
        if let Some(size) = env_value("READER_WINDOW_SIZE")? {
            self.window_size = size;
        }
        if let Some(size) = env_value("READER_REMOTE_WINDOW_SIZE")? {
            self.remote_window_size = Some(size);
        }
        if let Some(ceiling) = env_value("READER_RETRY_CEILING")? {
            self.retry_ceiling = ceiling;
        }
        if let Some(width) = env_value("READER_VIEWPORT_WIDTH")? {
            self.viewport_width_px = width;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.retry_ceiling == 0 {
            return Err(ConfigError::ZeroRetryCeiling);
        }
        if self.start_page == 0 {
            return Err(ConfigError::InvalidStartPage);
        }
        Ok(())
    }
}

fn env_value<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => {
            raw.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue(name.to_string()))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.window_size, 10);
        assert_eq!(config.retry_ceiling, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        assert_eq!(
            SessionConfig::default().with_window_size(0).validate(),
            Err(ConfigError::ZeroWindow)
        );
        assert_eq!(
            SessionConfig::default().with_retry_ceiling(0).validate(),
            Err(ConfigError::ZeroRetryCeiling)
        );
        assert_eq!(
            SessionConfig::default().with_start_page(0).validate(),
            Err(ConfigError::InvalidStartPage)
        );
    }

    #[test]
    fn deserializes_partial_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"collection_id":7,"window_size":4,"scaling":12}"#)
                .expect("config should parse");

        assert_eq!(config.collection_id, CollectionId(7));
        assert_eq!(config.window_size, 4);
        assert_eq!(config.scaling, Scaling::Fixed(reader_model::ImageSize::X1280));
        assert_eq!(config.start_page, 1);
    }
}
