//! Decodes a chunk container: a concatenation of length-prefixed
//! protobuf `ChunkData` messages, as fetched from a data-response `u:`
//! URL.

use gsb_domain_models::{Chunk, ChunkType, ListName, PrefixLength};
use gsb_protocol_wire_proto::chunk_data::{ChunkType as WireChunkType, PrefixType as WirePrefixType};
use gsb_protocol_wire_proto::ChunkData;
use prost::Message;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("malformed chunk: failed to decode protobuf record: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("malformed chunk: hashes length {hashes_len} is not a multiple of prefix length {prefix_len}")]
    UnalignedHashes { hashes_len: usize, prefix_len: usize },
    #[error("malformed chunk: record length prefix exceeds remaining data")]
    TruncatedRecord,
}

/// Parses every length-prefixed record in `container`, producing one
/// [`Chunk`] per record, attributed to `list_name`. Stops cleanly (no
/// error) on a short read of the 4-byte length prefix, which marks a
/// clean end of stream.
pub fn decode_container(container: &[u8], list_name: &ListName) -> Result<Vec<Chunk>, ChunkError> {
    let mut chunks = Vec::new();
    let mut offset = 0usize;
    loop {
        if container.len() - offset < 4 {
            break;
        }
        let len_bytes: [u8; 4] = container[offset..offset + 4].try_into().unwrap();
        let record_len = u32::from_be_bytes(len_bytes) as usize;
        offset += 4;

        if container.len() - offset < record_len {
            return Err(ChunkError::TruncatedRecord);
        }
        let record = &container[offset..offset + record_len];
        offset += record_len;

        let decoded = ChunkData::decode(record)?;
        chunks.push(to_domain_chunk(decoded, list_name)?);
    }
    Ok(chunks)
}

fn to_domain_chunk(decoded: ChunkData, list_name: &ListName) -> Result<Chunk, ChunkError> {
    let chunk_type = match decoded.chunk_type() {
        WireChunkType::Add => ChunkType::Add,
        WireChunkType::Sub => ChunkType::Sub,
    };
    let prefix_length = match decoded.prefix_type() {
        WirePrefixType::Prefix4b => PrefixLength::Short,
        WirePrefixType::Prefix32b => PrefixLength::Full,
    };
    let prefix_len = prefix_length.bytes();
    let hashes_bytes = decoded.hashes.unwrap_or_default();
    if hashes_bytes.len() % prefix_len != 0 {
        return Err(ChunkError::UnalignedHashes {
            hashes_len: hashes_bytes.len(),
            prefix_len,
        });
    }
    let hashes = hashes_bytes
        .chunks_exact(prefix_len)
        .map(|c| c.to_vec())
        .collect();

    Ok(Chunk::new(
        list_name.clone(),
        chunk_type,
        decoded.chunk_number.unwrap_or(0),
        prefix_length,
        hashes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;

    fn encode_record(chunk_number: u32, chunk_type: i32, prefix_type: i32, hashes: Vec<u8>) -> Vec<u8> {
        let data = ChunkData {
            chunk_number: Some(chunk_number),
            chunk_type: Some(chunk_type),
            prefix_type: Some(prefix_type),
            hashes: Some(hashes),
        };
        let mut buf = Vec::new();
        data.encode(&mut buf).unwrap();
        let mut record = (buf.len() as u32).to_be_bytes().to_vec();
        record.extend(buf);
        record
    }

    #[test]
    fn decodes_multiple_records_and_stops_cleanly() {
        let list = ListName::new("goog-malware-shavar");
        let mut container = Vec::new();
        container.extend(encode_record(336325, 0, 0, vec![1, 2, 3, 4, 5, 6, 7, 8]));
        container.extend(encode_record(165041, 1, 0, vec![9, 9, 9, 9]));
        let chunks = decode_container(&container, &list).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_number, 336325);
        assert_eq!(chunks[0].hashes.len(), 2);
        assert_eq!(chunks[1].chunk_type, ChunkType::Sub);
    }

    #[test]
    fn unaligned_hashes_is_malformed() {
        let list = ListName::new("goog-malware-shavar");
        let container = encode_record(1, 0, 0, vec![1, 2, 3]);
        assert!(matches!(
            decode_container(&container, &list),
            Err(ChunkError::UnalignedHashes { .. })
        ));
    }

    #[test]
    fn empty_container_decodes_to_empty_vec() {
        let list = ListName::new("goog-malware-shavar");
        assert!(decode_container(&[], &list).unwrap().is_empty());
    }
}
