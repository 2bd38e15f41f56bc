/// Faults raised while talking to the Flair API
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The response carried no document. For a relation this means the
    /// relation is empty.
    #[error("Empty response body")]
    EmptyBody,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("{kind} {id} has no '{rel}' relationship")]
    MissingLink {
        kind: String,
        id: String,
        rel: String,
    },
}

/// Errors surfaced by the Flair integration
#[derive(Debug, thiserror::Error)]
pub enum FlairError {
    #[error("Flair requires both client_id and client_secret, missing: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Not connected to the Flair API, run discovery first")]
    NotConnected,

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("{node_def_id} does not accept command {command}")]
    UnknownCommand {
        node_def_id: &'static str,
        command: String,
    },

    #[error("Command {command} requires a value")]
    MissingValue { command: &'static str },

    #[error("Invalid index {value} for {command}")]
    InvalidIndex { command: &'static str, value: f64 },
}

impl FlairError {
    pub fn boxed(self) -> Box<dyn std::error::Error + Send> {
        Box::new(self)
    }
}
