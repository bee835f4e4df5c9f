use thiserror::Error;

/// Error taxonomy for the triage core.
///
/// Public entry points (`analyze`, `decide`, `aggregate`, `process`)
/// never surface these: internal helpers propagate them with `?` and the
/// boundary converts them into the documented fallback value, recording
/// the message in `warnings` / `error` fields. Collaborator engines use
/// the same type so engine failures flow through as failed tier results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriageError {
    /// Corrupt or unreadable input (image file, malformed tier result).
    #[error("input error: {0}")]
    Input(String),

    /// Failure inside rule evaluation or the cost model.
    #[error("policy evaluation error: {0}")]
    Policy(String),

    /// Every tier failed or was absent; nothing usable to aggregate.
    #[error("all tiers failed: {0}")]
    TotalFailure(String),
}

impl From<std::io::Error> for TriageError {
    fn from(err: std::io::Error) -> Self {
        TriageError::Input(err.to_string())
    }
}

impl From<image::ImageError> for TriageError {
    fn from(err: image::ImageError) -> Self {
        TriageError::Input(err.to_string())
    }
}
