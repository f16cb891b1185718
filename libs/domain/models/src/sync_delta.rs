use std::collections::BTreeMap;
use std::error::Error as StdError;

use futures::stream::{self, BoxStream};

use crate::chunk::Chunk;
use crate::list::ListName;

/// A boxed, send-able failure from within the lazy chunk stream. Each
/// crate that drives the stream (envelope parsing, chunk decoding, HTTP)
/// keeps its own concrete error type; by the time it reaches `SyncDelta`
/// it has already been boxed so the domain model itself stays decoupled
/// from any one of those crates.
pub type ChunkStreamError = Box<dyn StdError + Send + Sync + 'static>;

/// A lazily realised sequence of chunks: pulling the next item may perform
/// an HTTP GET and a protobuf decode. Modeled as an async `Stream` rather
/// than a plain `Iterator` since driving it performs network I/O under
/// `tokio`.
pub type ChunkStream = BoxStream<'static, Result<Chunk, ChunkStreamError>>;

/// The range-compressed add/sub inventory for one list, as returned by
/// storage and sent back upstream in the next `downloads` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkRange {
    pub add: Option<String>,
    pub sub: Option<String>,
}

impl ChunkRange {
    pub fn is_empty(&self) -> bool {
        self.add.is_none() && self.sub.is_none()
    }
}

/// `(reset_required, del_add, del_sub, new_chunks)` — the parsed result of
/// one `downloads` round-trip, ready to be applied to storage as a single
/// transaction.
pub struct SyncDelta {
    pub reset_required: bool,
    pub del_add: BTreeMap<ListName, Vec<u32>>,
    pub del_sub: BTreeMap<ListName, Vec<u32>>,
    pub new_chunks: ChunkStream,
}

impl SyncDelta {
    pub fn empty() -> Self {
        Self {
            reset_required: false,
            del_add: BTreeMap::new(),
            del_sub: BTreeMap::new(),
            new_chunks: Box::pin(stream::empty()),
        }
    }
}

impl std::fmt::Debug for SyncDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDelta")
            .field("reset_required", &self.reset_required)
            .field("del_add", &self.del_add)
            .field("del_sub", &self.del_sub)
            .field("new_chunks", &"<lazy>")
            .finish()
    }
}
