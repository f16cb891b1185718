//! Compresses sorted, non-negative integer sets into the compact textual
//! form the `downloads` endpoint uses for chunk-number ranges
//! (`1-4,6-8,15,20-23`) and expands that form back into a flat list.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeCodecError {
    #[error("empty range element")]
    EmptyElement,
    #[error("non-numeric range bound: {0:?}")]
    NonNumeric(String),
    #[error("range missing end bound: {0:?}")]
    MissingEnd(String),
    #[error("range start {start} is greater than end {end}")]
    Inverted { start: u32, end: u32 },
}

/// Sorts, deduplicates, and folds maximal runs of consecutive integers into
/// `start-end` spans; singletons stand alone. Returns `None` for empty
/// input, matching the "null/absent" case in spec.
pub fn compress<I>(numbers: I) -> Option<String>
where
    I: IntoIterator<Item = u32>,
{
    let mut sorted: Vec<u32> = numbers.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    let mut run_start = sorted[0];
    let mut run_end = sorted[0];
    for &n in &sorted[1..] {
        if n == run_end + 1 {
            run_end = n;
            continue;
        }
        parts.push(format_run(run_start, run_end));
        run_start = n;
        run_end = n;
    }
    parts.push(format_run(run_start, run_end));
    Some(parts.join(","))
}

fn format_run(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}

/// Expands one or more canonical range strings into the flat, ordered list
/// of integers they denote, in the order the elements were supplied.
pub fn expand<'a, I>(ranges: I) -> Result<Vec<u32>, RangeCodecError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = Vec::new();
    for range_text in ranges {
        for element in range_text.split(',') {
            if element.is_empty() {
                return Err(RangeCodecError::EmptyElement);
            }
            match element.split_once('-') {
                None => {
                    out.push(parse_bound(element)?);
                }
                Some((start_str, end_str)) => {
                    if start_str.is_empty() {
                        return Err(RangeCodecError::NonNumeric(element.to_string()));
                    }
                    if end_str.is_empty() {
                        return Err(RangeCodecError::MissingEnd(element.to_string()));
                    }
                    let start = parse_bound(start_str)?;
                    let end = parse_bound(end_str)?;
                    if start > end {
                        return Err(RangeCodecError::Inverted { start, end });
                    }
                    out.extend(start..=end);
                }
            }
        }
    }
    Ok(out)
}

fn parse_bound(s: &str) -> Result<u32, RangeCodecError> {
    s.parse::<u32>()
        .map_err(|_| RangeCodecError::NonNumeric(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compress_example_from_spec() {
        let input = vec![1, 2, 3, 4, 6, 7, 8, 15, 20, 21, 22, 23];
        assert_eq!(compress(input).as_deref(), Some("1-4,6-8,15,20-23"));
    }

    #[test]
    fn compress_empty_is_none() {
        assert_eq!(compress(Vec::<u32>::new()), None);
    }

    #[test]
    fn expand_example_from_spec() {
        let result = expand(["1-4,7", "9-11", "50"]).unwrap();
        assert_eq!(result, vec![1, 2, 3, 4, 7, 9, 10, 11, 50]);
    }

    #[test]
    fn expand_malformed_input_fails() {
        let err = expand(["1--7,-"]).unwrap_err();
        match err {
            RangeCodecError::NonNumeric(_) | RangeCodecError::EmptyElement => {}
            other => panic!("expected a parse failure, got {other:?}"),
        }
    }

    #[test]
    fn expand_rejects_inverted_range() {
        assert!(expand(["9-3"]).is_err());
    }

    proptest! {
        #[test]
        fn round_trip_compress_expand(mut xs in proptest::collection::vec(0u32..10_000, 0..200)) {
            xs.sort_unstable();
            xs.dedup();
            let compressed = compress(xs.clone());
            let round_tripped = match &compressed {
                Some(text) => expand([text.as_str()]).unwrap(),
                None => Vec::new(),
            };
            prop_assert_eq!(round_tripped, xs);
        }

        #[test]
        fn expand_then_compress_matches_canonical(mut xs in proptest::collection::vec(0u32..10_000, 1..200)) {
            xs.sort_unstable();
            xs.dedup();
            let canonical = compress(xs.clone()).unwrap();
            let expanded = expand([canonical.as_str()]).unwrap();
            let recompressed = compress(expanded).unwrap();
            prop_assert_eq!(recompressed, canonical);
        }
    }
}
