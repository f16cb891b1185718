//! Wire encoding for the `gethash` endpoint (spec §4.7): the request body
//! of concatenated prefixes, and the mixed ASCII/binary response body of
//! full-hash blocks with optional metadata.

use std::collections::BTreeMap;

use gsb_domain_models::ListName;
use gsb_protocol_wire_proto::MalwarePatternType;
use prost::Message;

use crate::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEntry {
    pub full_hash: [u8; 32],
    pub metadata: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct FullHashResponse {
    pub cache_lifetime: i64,
    pub by_list: BTreeMap<ListName, Vec<HashEntry>>,
}

/// `"<prefix_len>:<prefix_len * count>\n"` followed by the concatenated
/// prefix bytes. Every prefix in `prefixes` must share one length.
pub fn encode_request(prefixes: &[Vec<u8>]) -> Result<Vec<u8>, ClientError> {
    let prefix_len = prefixes
        .first()
        .ok_or_else(|| ClientError::EmptyRequest)?
        .len();
    if prefixes.iter().any(|p| p.len() != prefix_len) {
        return Err(ClientError::MixedPrefixLengths);
    }
    let mut body = format!("{prefix_len}:{}\n", prefix_len * prefixes.len()).into_bytes();
    for prefix in prefixes {
        body.extend_from_slice(prefix);
    }
    Ok(body)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_line(&mut self) -> Result<&'a str, ClientError> {
        let rest = &self.buf[self.pos..];
        let newline = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(ClientError::MalformedHashResponse("line not terminated"))?;
        let line = std::str::from_utf8(&rest[..newline]).map_err(|_| ClientError::MalformedHashResponse("line is not valid ASCII"))?;
        self.pos += newline + 1;
        Ok(line.trim_end_matches('\r'))
    }

    fn read_exact(&mut self, n: usize) -> Result<&'a [u8], ClientError> {
        if self.buf.len() - self.pos < n {
            return Err(ClientError::MalformedHashResponse("body shorter than declared length"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

/// Parses `"cache_lifetime\n"` followed by zero or more hash-entry blocks
/// (spec §4.7). Trailing whitespace on the first line is tolerated (an
/// open question resolved in `DESIGN.md`).
pub fn parse_response(body: &[u8]) -> Result<FullHashResponse, ClientError> {
    let mut cursor = Cursor::new(body);
    let cache_lifetime: i64 = cursor
        .read_line()?
        .trim()
        .parse()
        .map_err(|_| ClientError::MalformedHashResponse("cache_lifetime is not an integer"))?;

    let mut by_list: BTreeMap<ListName, Vec<HashEntry>> = BTreeMap::new();
    while !cursor.at_end() {
        let header = cursor.read_line()?;
        let fields: Vec<&str> = header.split(':').collect();
        let (list_name, entry_len, entry_count, has_metadata) = match fields.as_slice() {
            [list, len, count] => (*list, *len, *count, false),
            [list, len, count, marker] if *marker == "m" => (*list, *len, *count, true),
            [_, _, _, _unknown] => return Err(ClientError::MalformedHashResponse("unknown fourth header field")),
            _ => return Err(ClientError::MalformedHashResponse("malformed hash-entry block header")),
        };

        let entry_len: usize = entry_len
            .parse()
            .map_err(|_| ClientError::MalformedHashResponse("entry_len is not an integer"))?;
        if entry_len != 32 {
            return Err(ClientError::MalformedHashResponse("entry_len must be 32"));
        }
        let entry_count: usize = entry_count
            .parse()
            .map_err(|_| ClientError::MalformedHashResponse("entry_count is not an integer"))?;

        let hash_bytes = cursor.read_exact(entry_len * entry_count)?;
        let mut entries: Vec<HashEntry> = hash_bytes
            .chunks_exact(entry_len)
            .map(|chunk| {
                let mut full_hash = [0u8; 32];
                full_hash.copy_from_slice(chunk);
                HashEntry { full_hash, metadata: None }
            })
            .collect();

        if has_metadata {
            for entry in entries.iter_mut() {
                let len_line = cursor.read_line()?;
                let len: usize = len_line
                    .trim()
                    .parse()
                    .map_err(|_| ClientError::MalformedHashResponse("metadata record length is not an integer"))?;
                let record = cursor.read_exact(len)?;
                let pattern = MalwarePatternType::decode(record)
                    .map_err(|_| ClientError::MalformedHashResponse("metadata record is not a valid MalwarePatternType"))?;
                entry.metadata = pattern.pattern_type;
            }
        }

        by_list.entry(ListName::new(list_name)).or_default().extend(entries);
    }

    Ok(FullHashResponse { cache_lifetime, by_list })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_metadata(pattern_type: i32) -> Vec<u8> {
        let msg = MalwarePatternType { pattern_type: Some(pattern_type) };
        let mut buf = Vec::new();
        msg.encode(&mut buf).unwrap();
        buf
    }

    #[test]
    fn encodes_request_header_and_body() {
        let prefixes = vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]];
        let body = encode_request(&prefixes).unwrap();
        assert_eq!(&body[..5], b"4:8\n\x01");
        assert_eq!(body.len(), 5 + 8 - 1);
    }

    #[test]
    fn mixed_lengths_are_rejected() {
        let prefixes = vec![vec![1, 2, 3, 4], vec![5, 6, 7]];
        assert!(matches!(encode_request(&prefixes), Err(ClientError::MixedPrefixLengths)));
    }

    #[test]
    fn parses_example_from_spec_scenario_5() {
        let mut body = b"600\ngoog-malware-shavar:32:1:m\n".to_vec();
        body.extend_from_slice(&[0xAAu8; 32]);
        let record = encode_metadata(2);
        body.extend_from_slice(format!("{}\n", record.len()).as_bytes());
        body.extend_from_slice(&record);

        let parsed = parse_response(&body).unwrap();
        assert_eq!(parsed.cache_lifetime, 600);
        let entries = parsed.by_list.get(&ListName::new("goog-malware-shavar")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].metadata, Some(2));
        assert_eq!(entries[0].full_hash, [0xAAu8; 32]);
    }

    #[test]
    fn parses_block_without_metadata() {
        let mut body = b"300\ngoog-phish-shavar:32:2\n".to_vec();
        body.extend_from_slice(&[0x11u8; 32]);
        body.extend_from_slice(&[0x22u8; 32]);
        let parsed = parse_response(&body).unwrap();
        assert_eq!(parsed.by_list.get(&ListName::new("goog-phish-shavar")).unwrap().len(), 2);
    }

    #[test]
    fn rejects_entry_len_other_than_32() {
        let body = b"300\ngoog-phish-shavar:4:1\n\x01\x02\x03\x04".to_vec();
        assert!(parse_response(&body).is_err());
    }

    #[test]
    fn rejects_unknown_fourth_field() {
        let mut body = b"300\ngoog-phish-shavar:32:1:z\n".to_vec();
        body.extend_from_slice(&[0x11u8; 32]);
        assert!(parse_response(&body).is_err());
    }
}
