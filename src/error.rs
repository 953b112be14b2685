use std::fmt;
use thiserror::Error;

/// Coarse classification of every failure the engine can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    DataIntegrity,
    Timeout,
    LimitViolation,
    Configuration,
    Io,
}

impl ErrorKind {
    /// Nothing inside the engine is retried. Collaborators may choose to
    /// wrap transport errors with their own retry policy.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::DataIntegrity => "data integrity",
            ErrorKind::Timeout => "timeout",
            ErrorKind::LimitViolation => "limit violation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Io => "io",
        };
        write!(f, "{}", val)
    }
}

/// Error type for calibration runs and exports
#[derive(Error, Debug)]
pub enum CalError {
    /// No answer from the unit within its timeout
    #[error("Timeout occurred in communication with device ('{0}')")]
    NoResponse(String),

    #[error("Device returned 'ERROR' for command '{0}'")]
    DeviceRejected(String),

    #[error("Unexpected response '{response}' for command '{command}'")]
    UnexpectedResponse { command: String, response: String },

    #[error("Instrument is not ready: {0}")]
    NotReady(String),

    #[error("Measurement '{0}' missing in instrument response")]
    MissingParameter(String),

    #[error("Incomplete or inconsistent instrument response: {param} has {found} points, expected {expected}")]
    InconsistentSweep { expected: usize, found: usize, param: String },

    #[error("Frequency mismatch for {key} at point {index}: {left} Hz vs {right} Hz")]
    FrequencyMismatch { key: String, index: usize, left: f64, right: f64 },

    /// Thermal stabilisation exceeded its bound, in seconds
    #[error("Temperature did not stabilize within {0:.1} s")]
    TemperatureTimeout(f64),

    #[error("{limit_type} limit of {category} failed for {key} at {freq} Hz: limit {limit}, measured {measured}")]
    LimitViolation {
        limit_type: String,
        category: String,
        key: String,
        freq: f64,
        limit: f64,
        measured: f64,
    },

    #[error("Invalid limit in category {category}: {msg}")]
    InvalidLimit { category: String, msg: String },

    #[error("Insufficient instrument ports: at least 2 are required, {0} available")]
    InsufficientPorts(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing standard {0}")]
    MissingStandard(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CalError::NoResponse(_)
            | CalError::DeviceRejected(_)
            | CalError::UnexpectedResponse { .. }
            | CalError::NotReady(_) => ErrorKind::Transport,
            CalError::MissingParameter(_)
            | CalError::InconsistentSweep { .. }
            | CalError::FrequencyMismatch { .. }
            | CalError::MissingStandard(_)
            | CalError::Format(_) => ErrorKind::DataIntegrity,
            CalError::TemperatureTimeout(_) => ErrorKind::Timeout,
            CalError::LimitViolation { .. } => ErrorKind::LimitViolation,
            CalError::InvalidLimit { .. }
            | CalError::InsufficientPorts(_)
            | CalError::InvalidConfig(_)
            | CalError::Json(_) => ErrorKind::Configuration,
            CalError::Archive(_) | CalError::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, CalError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_kinds() {
        assert_eq!(CalError::NoResponse(":TEMP?".into()).kind(), ErrorKind::Transport);
        assert_eq!(CalError::TemperatureTimeout(180.0).kind(), ErrorKind::Timeout);
        assert_eq!(CalError::InsufficientPorts(1).kind(), ErrorKind::Configuration);
        assert_eq!(
            CalError::MissingParameter("S21".into()).kind(),
            ErrorKind::DataIntegrity
        );
        assert!(!ErrorKind::Transport.is_retryable());
    }

    #[test]
    fn timeouts_are_distinguishable() {
        let comm = CalError::NoResponse(":TEMP:STABLE?".into()).to_string();
        let temp = CalError::TemperatureTimeout(180.0).to_string();
        assert!(comm.contains("communication"));
        assert!(temp.contains("did not stabilize"));
    }

    #[test]
    fn limit_violation_message() {
        let err = CalError::LimitViolation {
            limit_type: "dB".into(),
            category: "LOAD".into(),
            key: "P1".into(),
            freq: 1.5e9,
            limit: -25.0,
            measured: -20.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("LOAD"));
        assert!(msg.contains("P1"));
        assert!(msg.contains("1500000000"));
        assert!(msg.contains("-25"));
        assert!(msg.contains("-20"));
    }
}
