//! URL canonicalization and permutation, per Safe Browsing v3's lookup
//! hashing scheme: canonicalize a URL, enumerate host/path permutations,
//! and SHA-256 each into a 32-byte lookup key.

mod canonical;
mod host;
mod path;
mod percent;
mod permutations;

pub use canonical::{canonicalize, Canonical};
pub use host::{ipv4_from_u32, is_dotted_quad};
pub use permutations::{host_permutations, path_permutations, url_permutations};

use sha2::{Digest, Sha256};

/// SHA-256 of the ASCII bytes of a URL variant — the 32-byte full-hash.
pub fn digest(variant: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(variant.as_bytes());
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

/// The first 4 bytes of a full-hash, used as the compact index key.
pub fn prefix_of(full_hash: &[u8; 32]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&full_hash[..4]);
    out
}

/// A URL ready for lookup: canonicalizes once, then lazily yields the
/// `(full_hash, prefix)` pair for each of its up-to-30 permutations.
pub struct LookupUrl {
    canonical: Canonical,
}

impl LookupUrl {
    pub fn new(raw_url: &str) -> Self {
        Self {
            canonical: canonicalize(raw_url),
        }
    }

    pub fn canonical(&self) -> &Canonical {
        &self.canonical
    }

    pub fn permutations(&self) -> Vec<String> {
        url_permutations(&self.canonical.host, &self.canonical.path_and_query())
    }

    /// Each permutation's `(full_hash, prefix)`, in the same order as
    /// [`LookupUrl::permutations`].
    pub fn hashes(&self) -> impl Iterator<Item = ([u8; 32], [u8; 4])> {
        self.permutations().into_iter().map(|variant| {
            let full = digest(&variant);
            let prefix = prefix_of(&full);
            (full, prefix)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn canonicalize_is_idempotent_property() {
        let urls = [
            "http://host/%25%32%35",
            "HTTP://ExamplE.COM/a/b/../c?x=1",
            "example.com",
            "http://3279880203/blah",
        ];
        for u in urls {
            let once = canonicalize(u).to_string();
            let twice = canonicalize(&once).to_string();
            assert_eq!(once, twice, "not idempotent for {u}");
        }
    }

    #[test]
    fn at_most_thirty_hashes() {
        let lookup = LookupUrl::new("http://a.b.c.d.e.f/1/2/3/4/5/page.html?x=1");
        assert!(lookup.hashes().count() <= 30);
    }

    proptest! {
        #[test]
        fn canonicalize_never_panics(s in "[ -~]{0,120}") {
            let _ = canonicalize(&s).to_string();
        }
    }
}
