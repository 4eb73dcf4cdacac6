use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum NrssError {
    /// Shared key-value store errors (connection, command, script)
    #[error("Store Error: {0}")]
    StoreError(String),

    /// The store handle has been disconnected
    #[error("Store Disconnected")]
    StoreDisconnected,

    /// Upstream catalog errors (HTTP status, transport)
    #[error("Upstream Error: {0}")]
    UpstreamError(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    ConfigError(String),

    /// Malformed records read back from the store
    #[error("Parse Error: {0}")]
    ParseError(String),

    /// Trigger channel errors
    #[error("Event Error: {0}")]
    EventError(String),

    /// Anything that escaped orchestration without a classified cause
    #[error("Unexpected Error: {0}")]
    Unexpected(String),
}

impl From<redis::RedisError> for NrssError {
    fn from(err: redis::RedisError) -> Self {
        NrssError::StoreError(err.to_string())
    }
}

impl From<serde_json::Error> for NrssError {
    fn from(err: serde_json::Error) -> Self {
        NrssError::ParseError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<reqwest::Error> for NrssError {
    fn from(err: reqwest::Error) -> Self {
        NrssError::UpstreamError(err.to_string())
    }
}

impl From<url::ParseError> for NrssError {
    fn from(err: url::ParseError) -> Self {
        NrssError::ConfigError(format!("Invalid URL: {}", err))
    }
}

impl From<anyhow::Error> for NrssError {
    fn from(err: anyhow::Error) -> Self {
        NrssError::Unexpected(err.to_string())
    }
}

impl NrssError {
    /// Whether a later attempt at the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            NrssError::StoreError(_) => true,
            NrssError::StoreDisconnected => false,
            NrssError::UpstreamError(_) => true,
            NrssError::ConfigError(_) => false,
            NrssError::ParseError(_) => false,
            NrssError::EventError(_) => true,
            NrssError::Unexpected(_) => false,
        }
    }

    pub fn categorize(&self) -> ErrorCategory {
        match self {
            NrssError::StoreError(_) | NrssError::StoreDisconnected => ErrorCategory::Store,
            NrssError::UpstreamError(_) => ErrorCategory::Upstream,
            NrssError::ConfigError(_) => ErrorCategory::Configuration,
            NrssError::ParseError(_) => ErrorCategory::Data,
            NrssError::EventError(_) => ErrorCategory::Infrastructure,
            NrssError::Unexpected(_) => ErrorCategory::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCategory {
    Store,
    Upstream,
    Configuration,
    Data,
    Infrastructure,
    Critical,
}

/// Terminal reasons a fetch job can end without storing a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    /// Upstream returned nothing for the series
    NoData,
    /// Every episode's playback resolution failed
    NoPlayableEpisodes,
}

impl FetchFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchFailure::NoData => "no_data",
            FetchFailure::NoPlayableEpisodes => "no_playable_episodes",
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, NrssError>;
