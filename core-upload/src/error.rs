use bridge_traits::error::{RemoteApiError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("uploader is not started")]
    NotStarted,

    #[error("uploader is already started")]
    AlreadyStarted,

    #[error(transparent)]
    Api(#[from] RemoteApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, UploadError>;
