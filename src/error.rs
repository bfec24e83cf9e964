use thiserror::Error;

/// Camera acquisition and live-frame failures.
///
/// Each provider failure class maps to exactly one variant; anything the
/// provider cannot classify lands in `Device` with its raw message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera access was denied")]
    PermissionDenied,

    #[error("No camera was found on this device")]
    NoDevice,

    #[error("The camera is being used by another application")]
    HardwareBusy,

    #[error("This platform does not offer camera capture")]
    Unsupported,

    #[error("Camera error: {0}")]
    Device(String),

    #[error("Could not capture a frame: {0}")]
    CaptureFailed(String),

    #[error("Camera request was cancelled")]
    Cancelled,
}

/// Rejections of user-supplied input (picked files, signatures).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Declared type is not an image: {0}")]
    InvalidType(String),

    #[error("Could not read image: {0}")]
    ReadFailed(String),

    #[error("The signature is empty")]
    EmptySignature,

    #[error("Could not encode signature: {0}")]
    EncodeFailed(String),
}
