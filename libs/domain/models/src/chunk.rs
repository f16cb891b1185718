use crate::list::ListName;

/// `add` chunks contribute prefixes to the blacklist; `sub` chunks cancel
/// specific prefixes contributed by a specific add-chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    Add,
    Sub,
}

/// Prefix-length is 4 bytes for a compact index key or 32 bytes (full
/// SHA-256) when the upstream service ships the whole hash in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefixLength {
    Short,
    Full,
}

impl PrefixLength {
    pub fn bytes(self) -> usize {
        match self {
            PrefixLength::Short => 4,
            PrefixLength::Full => 32,
        }
    }

    pub fn from_bytes(n: usize) -> Option<Self> {
        match n {
            4 => Some(PrefixLength::Short),
            32 => Some(PrefixLength::Full),
            _ => None,
        }
    }
}

/// One decoded chunk: `(list-name, chunk-type, chunk-number, prefix-length,
/// hashes)`, per spec.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub list_name: ListName,
    pub chunk_type: ChunkType,
    pub chunk_number: u32,
    pub prefix_length: PrefixLength,
    pub hashes: Vec<Vec<u8>>,
}

impl Chunk {
    pub fn new(
        list_name: ListName,
        chunk_type: ChunkType,
        chunk_number: u32,
        prefix_length: PrefixLength,
        hashes: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            list_name,
            chunk_type,
            chunk_number,
            prefix_length,
            hashes,
        }
    }
}
