//! Error types for Catena operations

/// Result type for Catena operations
pub type Result<T> = std::result::Result<T, CatenaError>;

/// Error types for the Catena framework
#[derive(Debug, thiserror::Error)]
pub enum CatenaError {
    /// Invalid or incomplete configuration (unknown provider, missing option)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required input key is missing or unusable
    #[error("Invalid input values: {0}")]
    InvalidInputValues(String),

    /// An input key holds a value of the wrong variant
    #[error("Wrong type for '{key}': expected {expected}, got {actual}")]
    WrongType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A template references a variable that was not supplied
    #[error("Missing template variable: {0}")]
    MissingVariable(String),

    /// A template could not be parsed
    #[error("Template error: {0}")]
    Template(String),

    /// Transport or SDK failure talking to a provider
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider answered with a non-success status
    #[error("Provider returned status {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    /// A provider payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Model output did not match the expected grammar
    #[error("Unable to parse output: {0}")]
    UnableToParseOutput(String),

    /// The caller cancelled the run
    #[error("Operation cancelled")]
    Cancelled,

    /// A tool invocation failed
    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// The agent loop hit its iteration cap
    #[error("Agent stopped after {0} iterations without a final answer")]
    MaxIterations(usize),

    /// Memory load/save failed
    #[error("Memory error: {0}")]
    Memory(String),

    /// An observer callback failed
    #[error("Callback error: {0}")]
    Callback(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CatenaError {
    /// True when the error means the caller aborted, not that something failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CatenaError::Cancelled)
    }

    /// True for transient provider failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatenaError::Provider(_) => true,
            CatenaError::ProviderStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<String> for CatenaError {
    fn from(s: String) -> Self {
        CatenaError::Other(s)
    }
}

impl From<&str> for CatenaError {
    fn from(s: &str) -> Self {
        CatenaError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for CatenaError {
    fn from(err: anyhow::Error) -> Self {
        CatenaError::Other(err.to_string())
    }
}
