use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Capture error: {0}")]
    CaptureError(String),
    #[error("Encoding error: {0}")]
    EncodingError(String),
    #[error("Muxing error: {0}")]
    MuxingError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid container: {0}")]
    InvalidContainer(String),
    #[error("Recording session is closed")]
    SessionClosed,
}

impl RecorderError {
    /// Per-frame errors that leave the session recording.
    ///
    /// Everything else ends the current recording and returns it to idle.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RecorderError::CaptureError(_) | RecorderError::EncodingError(_)
        )
    }
}

impl From<std::io::Error> for RecorderError {
    fn from(e: std::io::Error) -> Self {
        RecorderError::IoError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecorderError::EncodingError("bad buffer".to_string());
        assert_eq!(err.to_string(), "Encoding error: bad buffer");
        assert_eq!(
            RecorderError::SessionClosed.to_string(),
            "Recording session is closed"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(RecorderError::CaptureError("zero size".into()).is_recoverable());
        assert!(RecorderError::EncodingError("mismatch".into()).is_recoverable());
        assert!(!RecorderError::IoError("disk full".into()).is_recoverable());
        assert!(!RecorderError::MuxingError("seek".into()).is_recoverable());
        assert!(!RecorderError::SessionClosed.is_recoverable());
        assert!(!RecorderError::InvalidContainer("truncated".into()).is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: RecorderError = io.into();
        assert!(matches!(err, RecorderError::IoError(ref m) if m.contains("read-only")));
    }
}
