//! Application error types

/// Application result type
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] lectern_core::Error),

    #[error(transparent)]
    Net(#[from] lectern_net::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not resolve relay address {0}")]
    Address(String),

    #[error("Relay refused connection: {0}")]
    Rejected(String),

    #[error("Relay closed the connection before welcoming us")]
    NoWelcome,
}
