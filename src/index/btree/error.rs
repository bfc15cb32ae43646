use thiserror::Error;
use crate::common::types::PageId;
use crate::storage::buffer::BufferPoolError;

#[derive(Error, Debug)]
pub enum BTreeError {
    #[error("Node does not fit in a page")]
    NodeTooLarge,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Page {0} does not hold the expected node kind")]
    UnexpectedNodeKind(PageId),

    #[error("Out of memory: every buffer frame is pinned")]
    OutOfMemory,

    #[error("Buffer pool error: {0}")]
    BufferPoolError(#[from] BufferPoolError),
}
