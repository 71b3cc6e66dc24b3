use std::sync::Arc;

use crate::ElementId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Malformed step: {0}")]
    MalformedStep(String),

    #[error("Host does not support {0}")]
    Unsupported(&'static str),

    #[error("Element {0} is not known to the document")]
    UnknownElement(ElementId),

    #[error("Step response failed: {0}")]
    Response(Arc<str>),

    #[error("Too many events delivered during a running response (limit {0})")]
    ReentrancyOverflow(usize),

    #[error("Host event loop is closed")]
    HostLoopClosed,
}

impl Error {
    /// Wrap any displayable failure raised inside a step response.
    pub fn response(msg: impl std::fmt::Display) -> Self {
        Error::Response(Arc::from(msg.to_string()))
    }

    pub(crate) fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Error::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::HostLoopClosed
    }
}
