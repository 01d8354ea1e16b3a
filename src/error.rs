use crate::clients::ClientError;

/// Errors surfaced to a client as a `{success: false, error}` acknowledgement.
///
/// None of these are fatal to the connection, let alone the process: the
/// handler boundary converts them into an ack and the read loop continues.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid payload: {0}")]
    BadPayload(String),

    #[error("call {0} not found")]
    CallNotFound(String),

    #[error(transparent)]
    Collaborator(#[from] ClientError),
}
