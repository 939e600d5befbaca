use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsFixError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid sync byte: {0:#04x}")]
    InvalidSync(u8),

    #[error("truncated read: expected {expected} bytes, got {actual}")]
    TruncatedRead { expected: usize, actual: usize },

    #[error("unsupported pts/dts indicator: {0:#04b}")]
    UnsupportedPtsIndicator(u8),

    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),
}

pub type Result<T> = std::result::Result<T, TsFixError>;
