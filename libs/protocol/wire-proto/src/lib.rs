//! Generated protobuf types. `chunk_data.proto` and
//! `malware_pattern_type.proto` describe the two external message shapes
//! the protocol layer decodes against; this crate only wires prost-build
//! and re-exports the result.

include!(concat!(env!("OUT_DIR"), "/gsb.rs"));
