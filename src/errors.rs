use rand_distr::BernoulliError;
use thiserror::Error;

/// Errors related to a single client connection.
///
/// Every variant is fatal for that one connection only: the session closes
/// the transport and unregisters the handle. Nothing here is allowed to
/// take down the process.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Writing a frame to the client failed or hit the write deadline.
    #[error("Failed to send to client: {0}")]
    SendFailed(String),

    /// Reading from the client failed.
    #[error("Failed to receive from client: {0}")]
    ReceiveFailed(String),

    /// The peer closed the connection (cleanly or otherwise).
    #[error("Connection closed")]
    Closed,

    /// The WebSocket upgrade did not complete.
    #[error("WebSocket handshake failed: {0}")]
    HandshakeFailed(String),
}

/// Invalid configuration values, detected before the server starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A period or timeout was configured as zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// The initial burst range is empty.
    #[error("Invalid initial burst range: {min}..={max}")]
    InvalidBurst {
        /// Lower bound of the burst range.
        min: usize,
        /// Upper bound of the burst range.
        max: usize,
    },

    /// New-order probability is outside `[0.0, 1.0]`.
    ///
    /// This originates from the `rand_distr` crate.
    #[error("Invalid new-order probability: {0}")]
    InvalidProbability(BernoulliError),
}

impl From<BernoulliError> for ConfigError {
    fn from(err: BernoulliError) -> Self {
        ConfigError::InvalidProbability(err)
    }
}

/// Errors returned from the [`OrderServer`](crate::order_server::OrderServer).
#[derive(Error, Debug)]
pub enum OrderServerError {
    /// Configuration values were rejected.
    #[error("Invalid Order Server config: {0}")]
    InvalidConfig(String),

    /// Critical failure during server initialization, such as failing to
    /// spawn the sweeper thread.
    #[error("Failed to initialize Order Server: {0}")]
    InitializationError(String),
}

impl From<ConfigError> for OrderServerError {
    fn from(err: ConfigError) -> Self {
        OrderServerError::InvalidConfig(err.to_string())
    }
}

/// Errors produced by the WebSocket accept loop.
#[derive(Error, Debug)]
pub enum WsServerError {
    /// The TCP listener failed to bind to the specified address/port.
    #[error("Failed to bind TCP listener: {0}")]
    BindError(String),

    /// Error while accepting an incoming TCP connection.
    #[error("Failed to accept TCP connection: {0}")]
    AcceptError(String),

    /// An error from the order server bubbled up into the transport layer.
    #[error("Order server error: {0}")]
    OrderServerError(#[from] OrderServerError),
}

/// High-level errors returned by the server and client binaries.
#[derive(Error, Debug)]
pub enum CliError {
    /// General wrapper around any textual failure.
    #[error("Cli failed with error: {0}")]
    GeneralError(String),
}

impl From<OrderServerError> for CliError {
    fn from(err: OrderServerError) -> Self {
        CliError::GeneralError(err.to_string())
    }
}

impl From<WsServerError> for CliError {
    fn from(err: WsServerError) -> Self {
        CliError::GeneralError(err.to_string())
    }
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        CliError::GeneralError(err.to_string())
    }
}
