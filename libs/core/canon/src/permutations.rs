/// Host suffix variants a blacklisted URL might be filed under: the full
/// host (when it is not itself reducible to fewer than 5 labels) plus
/// progressively shorter label suffixes, capped so at most 5 ever come
/// back. A dotted-quad IPv4 host has exactly one variant: itself.
pub fn host_permutations(host: &str) -> Vec<String> {
    if crate::host::is_dotted_quad(host) {
        return vec![host.to_string()];
    }
    let parts: Vec<&str> = host.split('.').collect();
    let n = parts.len();
    let l = n.min(5);
    let mut out = Vec::new();
    if l > 4 {
        out.push(host.to_string());
    }
    for i in 0..l.saturating_sub(1) {
        let take = l - i;
        let start = n.saturating_sub(take);
        out.push(parts[start..].join("."));
    }
    out
}

/// Path (and, for the first two, query) prefix variants: the full
/// path+query, the path alone (if a query was present), then successive
/// directory prefixes up to 4 levels deep.
pub fn path_permutations(path_and_query: &str) -> Vec<String> {
    let mut out = Vec::new();
    if path_and_query != "/" {
        out.push(path_and_query.to_string());
    }
    let (path, had_query) = match path_and_query.split_once('?') {
        Some((p, _)) => (p, true),
        None => (path_and_query, false),
    };
    if had_query {
        out.push(path.to_string());
    }
    let segments: Vec<&str> = path.split('/').collect();
    let dir_segments = if segments.is_empty() {
        &segments[..]
    } else {
        &segments[..segments.len() - 1]
    };
    let mut current = String::new();
    for segment in dir_segments.iter().take(4) {
        current.push_str(segment);
        current.push('/');
        out.push(current.clone());
    }
    out
}

/// The cross-product of host and path variants, each as `host + path`
/// (no scheme), capped at 30 combinations per spec.
pub fn url_permutations(host: &str, path_and_query: &str) -> Vec<String> {
    let hosts = host_permutations(host);
    let paths = path_permutations(path_and_query);
    let mut out = Vec::with_capacity(hosts.len() * paths.len());
    'outer: for h in &hosts {
        for p in &paths {
            if out.len() >= 30 {
                break 'outer;
            }
            out.push(format!("{h}{p}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_from_spec_scenario_3() {
        let variants = url_permutations("a.b.c", "/1/2.html?param=1");
        assert_eq!(
            variants,
            vec![
                "a.b.c/1/2.html?param=1",
                "a.b.c/1/2.html",
                "a.b.c/",
                "a.b.c/1/",
                "b.c/1/2.html?param=1",
                "b.c/1/2.html",
                "b.c/",
                "b.c/1/",
            ]
        );
    }

    #[test]
    fn dotted_quad_host_has_single_variant() {
        assert_eq!(host_permutations("195.127.0.11"), vec!["195.127.0.11"]);
    }

    #[test]
    fn five_label_host_caps_at_five_variants() {
        let v = host_permutations("a.b.c.d.e.f");
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], "a.b.c.d.e.f");
    }

    #[test]
    fn never_exceeds_thirty_combinations() {
        let variants = url_permutations("a.b.c.d.e.f", "/1/2/3/4/5/index.html?a=1");
        assert!(variants.len() <= 30);
    }
}
