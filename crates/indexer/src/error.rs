use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] notedex_store::StoreError),

    #[error("index error: {0}")]
    Ann(#[from] notedex_ann::AnnError),

    #[error("vault walk failed: {0}")]
    Walk(String),

    #[error("watcher error: {0}")]
    Watch(String),
}
