//! HTTP clients for the two endpoints this workspace drives: the
//! `downloads` prefix-list endpoint (spec §4.6) and the `gethash`
//! full-hash endpoint (spec §4.7), each behind its own [`DelayController`]
//! fair-use policy.

mod full_hash;
mod gethash_wire;
mod prefix_list;
mod transport;

pub use full_hash::FullHashClient;
pub use gethash_wire::{FullHashResponse, HashEntry};
pub use prefix_list::PrefixListClient;
pub use transport::{ReqwestTransport, Transport, TransportError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Envelope(#[from] gsb_protocol_envelope::EnvelopeError),
    #[error("sleep cancelled by user request")]
    Cancelled,
    #[error("gethash request must include at least one prefix")]
    EmptyRequest,
    #[error("gethash request prefixes must share one length")]
    MixedPrefixLengths,
    #[error("malformed gethash response: {0}")]
    MalformedHashResponse(&'static str),
}
