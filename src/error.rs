//! Error taxonomy for the dispatch manager.
//!
//! `Configuration` covers anything wrong with the inputs before a dispatch is
//! encoded (missing or mismatched textures, calls in the wrong lifecycle
//! state). `Resource` covers GPU allocation requests that cannot be satisfied
//! (zero-sized or over-limit buffers and textures). Both are surfaced at
//! `initialize` time; nothing is allocated on the failure path.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GiError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl GiError {
    pub fn configuration<T: ToString>(msg: T) -> Self {
        GiError::Configuration(msg.to_string())
    }

    pub fn resource<T: ToString>(msg: T) -> Self {
        GiError::Resource(msg.to_string())
    }
}

pub type GiResult<T> = Result<T, GiError>;
