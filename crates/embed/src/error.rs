use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbedError>;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("embedding service rejected request: status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("embedding service returned an empty vector")]
    Empty,
}
