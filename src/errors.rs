use bson::Document;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A fluent call arrived in an order the builder cannot honor, e.g. a
    /// field-scoped update operator without a current field, or a
    /// type-guarded option under the wrong query type.
    #[error("Out-of-sequence call: {0}")]
    Sequencing(String),

    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The store's reply did not carry a truthy success flag. The full raw
    /// reply is kept for diagnostics.
    #[error("Command failed: {message}")]
    Command { message: String, reply: Document },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Builds a command error from a failed reply, pulling `errmsg` out of
    /// the reply when the store provided one.
    pub fn from_reply(reply: Document) -> Self {
        let message = reply
            .get_str("errmsg")
            .map(str::to_owned)
            .unwrap_or_else(|_| "no error message in reply".to_string());
        Error::Command { message, reply }
    }
}
