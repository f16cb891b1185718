//! Shared domain types for the Safe Browsing v3 mirror.
//!
//! Every other crate in the workspace depends on this one for the shapes
//! of a `Chunk`, a `SyncDelta`, and a list name, so that none of them
//! accidentally diverge on the same concept.

mod chunk;
mod list;
mod sync_delta;

pub use chunk::{Chunk, ChunkType, PrefixLength};
pub use list::ListName;
pub use sync_delta::{ChunkRange, SyncDelta};
