use gsb_domain_models::ListName;

/// The result of `lookup(url)`: empty iff the URL matched nothing live in
/// the cache (spec §8, invariant 5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupResult {
    pub matches: Vec<(ListName, Option<i32>)>,
}

impl LookupResult {
    pub fn is_clean(&self) -> bool {
        self.matches.is_empty()
    }

    /// The CLI's `lookup` exit code (spec §6): 0 if clean, else the
    /// minimum non-zero metadata integer across all matches, or 3 if no
    /// match carried metadata.
    pub fn exit_code(&self) -> i32 {
        if self.matches.is_empty() {
            return 0;
        }
        self.matches
            .iter()
            .filter_map(|(_, metadata)| *metadata)
            .filter(|m| *m != 0)
            .min()
            .unwrap_or(3)
    }
}
