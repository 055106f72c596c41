use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwarderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("outbound queue is full, payload dropped")]
    QueueFull,

    #[error("forwarder has stopped")]
    Closed,
}
