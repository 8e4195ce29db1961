use thiserror::Error;
use tracing::error;

#[derive(Debug, Clone, Error)]
#[error("remote store error (status {status}): {message}")]
pub struct RemoteError {
    pub status: u16,
    pub message: String,
}

impl RemoteError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(key: &str) -> Self {
        Self::new(404, format!("blob not found: {key}"))
    }

    pub fn conflict(key: &str) -> Self {
        Self::new(409, format!("blob already exists: {key}"))
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsStatus {
    #[error("file not found")]
    FileNotFound,
    #[error("file exists")]
    FileExists,
    #[error("access denied")]
    AccessDenied,
    #[error("sharing violation")]
    SharingViolation,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("invalid handle")]
    InvalidHandle,
    #[error("not implemented")]
    NotImplemented,
    #[error("internal error")]
    InternalError,
}

pub type FsResult<T> = Result<T, FsStatus>;

impl From<RemoteError> for FsStatus {
    fn from(err: RemoteError) -> Self {
        match err.status {
            404 => FsStatus::FileNotFound,
            403 => FsStatus::AccessDenied,
            409 | 412 => FsStatus::SharingViolation,
            416 => FsStatus::InvalidParameter,
            status => {
                error!("unmapped remote error {}: {}", status, err.message);
                FsStatus::InternalError
            }
        }
    }
}

impl From<std::io::Error> for FsStatus {
    fn from(err: std::io::Error) -> Self {
        error!("buffer I/O failure: {}", err);
        FsStatus::InternalError
    }
}
