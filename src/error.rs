use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("request cancelled")] Cancelled,
    #[error("{0}")] Network(String),
    #[error("{message}")] Server { status: u16, message: String },
    #[error("{0}")] Validation(String),
    #[error("invalid response: {0}")] Decode(String),
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Network(_) | TransportError::Server { .. } | TransportError::Decode(_))
    }

    /// 4xx other than timeout/throttling means the request itself is wrong.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            408 | 429 => TransportError::Server { status, message },
            400..=499 => TransportError::Validation(message),
            _ => TransportError::Server { status, message },
        }
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history io error: {0}")] Io(#[from] std::io::Error),
    #[error("history serialization error: {0}")] Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum UploadError {
    #[error("No file uploaded")] Missing,
    #[error("Only PNG and JPG files are allowed")] UnsupportedType(String),
    #[error("File size must be less than {limit_mb}MB")] TooLarge { size: u64, limit_mb: u64 },
    #[error("Invalid image data: {0}")] Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(TransportError::from_status(500, "Model overloaded".into()).is_retryable());
        assert!(TransportError::from_status(429, "slow down".into()).is_retryable());
        assert_eq!(
            TransportError::from_status(400, "Validation error".into()),
            TransportError::Validation("Validation error".into())
        );
        assert!(!TransportError::Cancelled.is_retryable());
        assert!(TransportError::Cancelled.is_cancelled());
    }

    #[test]
    fn server_error_displays_its_message() {
        let err = TransportError::Server { status: 500, message: "Model overloaded".into() };
        assert_eq!(err.to_string(), "Model overloaded");
    }
}
