use crate::access::UserType;

#[derive(Debug, thiserror::Error)]
pub enum WindError {
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    // the only two the UI is expected to show the user
    #[error("audio input unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("audio input is already in use")]
    DeviceBusy,

    #[error("invalid instrument catalog: {0}")]
    InvalidCatalog(String),

    #[error("cannot move licence from {from:?} to {to:?}")]
    InvalidTransition { from: UserType, to: UserType },

    #[error("only an administrator can revoke a licence")]
    PermissionDenied,

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, WindError>;
