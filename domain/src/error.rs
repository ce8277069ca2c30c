use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid tile coordinates: {0}")]
    InvalidTileCoordinates(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid color format: {0}")]
    InvalidColorFormat(String),

    #[error("Image size mismatch: {0}")]
    SizeMismatch(String),

    #[error("Unknown enum code: {0}")]
    UnknownCode(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
