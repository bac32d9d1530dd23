//! CLI Error Types

use derive_more::{Display, Error};

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("unable to initialise logging")]
    Logging,
    #[display("configuration error")]
    Config,
    #[display("unable to connect to the target store")]
    Store,
    #[display("synchronisation failed")]
    Sync,
    #[display("unable to write manifest")]
    Output,
}
