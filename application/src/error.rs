use std::io;
use thiserror::Error;

use domain::error::DomainError;
use domain::palette::PaletteMismatch;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Palette(#[from] PaletteMismatch),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Missing file: {message}")]
    MissingFile { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Codec error: {message}")]
    CodecError { message: String },
}

pub type AppResult<T> = Result<T, AppError>;
