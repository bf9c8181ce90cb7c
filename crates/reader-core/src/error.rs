/// A remote request that did not produce a usable response.
///
/// All variants are transient from the reader's point of view: the session
/// keeps its previous state and clears its in-flight markers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    ZeroWindow,
    #[error("retry ceiling must be at least 1")]
    ZeroRetryCeiling,
    #[error("start page is 1-based and must be >= 1")]
    InvalidStartPage,
    #[error("invalid value for {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("key/value backend failed: {0}")]
    Backend(String),
    #[error("unable to encode value for `{key}`: {message}")]
    Encode { key: String, message: String },
}
