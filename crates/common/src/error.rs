use thiserror::Error;

/// Process-level error: configuration, I/O and anything fatal to a run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schedule configuration error: {0}")]
    Schedule(#[from] ScheduleConfigError),

    #[error("Selection configuration error: {0}")]
    Selection(#[from] SelectionConfigError),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure to retrieve one listing or one filing. Recorded, then skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("listing {url} failed: {reason}")]
    Listing { url: String, reason: String },

    #[error("download {url} failed after {attempts} attempt(s): {reason}")]
    Download {
        url: String,
        attempts: u32,
        reason: String,
    },
}

/// Why one filing could not be turned into records. Recorded, then skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unsupported form type `{0}`")]
    UnsupportedForm(String),
}

/// An invalid selector rule set. Fatal to the owning run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectionConfigError {
    #[error("min_transaction_value must be a non-negative number, got {0}")]
    InvalidThreshold(f64),

    #[error("lookback_days must be at least 1")]
    ZeroLookback,

    #[error("lookback_days must be at most {max}, got {got}")]
    LookbackTooLarge { got: u32, max: u32 },

    #[error("transaction_codes must not be empty")]
    NoTransactionCodes,

    #[error("top_n must be at least 1 when set")]
    ZeroTopN,
}

/// Messaging endpoint refused or could not be reached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("messaging endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("messaging endpoint rejected the message: {0}")]
    Rejected(String),
}

/// A malformed schedule entry. Fatal to that entry only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleConfigError {
    #[error("invalid schedule expression `{expr}` for `{strategy}`: {reason}")]
    InvalidExpression {
        strategy: String,
        expr: String,
        reason: String,
    },

    #[error("no strategy registered under `{0}`")]
    UnknownStrategy(String),

    #[error("strategy `{strategy}` could not be built: {reason}")]
    Build { strategy: String, reason: String },

    #[error("malformed schedule entry `{strategy}`: {reason}")]
    Malformed { strategy: String, reason: String },
}
