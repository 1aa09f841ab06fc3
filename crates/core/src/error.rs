use crate::buffer::BufferKind;
use storage::StoreError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Fatal: nothing has been dispatched.
    #[error("initialization failed ({context}): {source}")]
    Initialization {
        context: &'static str,
        #[source]
        source: BoxError,
    },
    /// A buffer could not be written; its rows are kept for the next flush.
    #[error("flushing the {buffer} buffer failed: {source}")]
    Persistence {
        buffer: BufferKind,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    pub fn initialization<E>(context: &'static str) -> impl FnOnce(E) -> SyncError
    where
        E: Into<BoxError>,
    {
        move |err| SyncError::Initialization {
            context,
            source: err.into(),
        }
    }
}
