use crate::host::normalize_host;
use crate::path::normalize_path;
use crate::percent::{full_unescape, quote};

/// A URL broken into the pieces the permutation step needs, already in
/// canonical (fully normalized, percent-re-encoded) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: Option<String>,
}

impl Canonical {
    fn host_with_port(&self) -> String {
        match self.port {
            Some(p) => format!("{}:{}", self.host, p),
            None => self.host.clone(),
        }
    }

    /// `path[?query]`, with no scheme or host — the form `url_permutations`
    /// operates on.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }
}

impl std::fmt::Display for Canonical {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host_with_port(), self.path)?;
        if let Some(q) = &self.query {
            write!(f, "?{}", q)?;
        }
        Ok(())
    }
}

/// Produces the canonical form of `raw_url` per spec §4.1.
pub fn canonicalize(raw_url: &str) -> Canonical {
    let stripped = raw_url.trim().replace(['\n', '\r', '\t'], "");
    let without_fragment = stripped.split('#').next().unwrap_or("").to_string();

    let mut working = quote(&full_unescape(&without_fragment));
    if !working.contains("://") {
        working = format!("http://{}", working);
    }

    let has_query_delim = working.contains('?');
    let (scheme, rest) = split_scheme(&working);
    let (authority, path_and_query) = split_authority(rest);
    let (host_raw, port) = split_host_port(strip_userinfo(authority));
    let (path_raw, query_raw) = split_path_query(path_and_query);

    let host = quote(&normalize_host(host_raw));

    let mut path = full_unescape(path_raw);
    if path.is_empty() {
        path = "/".to_string();
    }
    path = normalize_path(&path);
    if path.is_empty() {
        path = "/".to_string();
    }
    let path = quote(&path);

    let query = if let Some(q) = query_raw {
        Some(q.to_string())
    } else if has_query_delim {
        Some(String::new())
    } else {
        None
    };

    Canonical {
        scheme: scheme.to_string(),
        host,
        port,
        path,
        query,
    }
}

fn split_scheme(url: &str) -> (&str, &str) {
    match url.find("://") {
        Some(idx) => (&url[..idx], &url[idx + 3..]),
        None => ("", url),
    }
}

fn split_authority(rest: &str) -> (&str, &str) {
    match rest.find(['/', '?']) {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    }
}

fn strip_userinfo(authority: &str) -> &str {
    match authority.rfind('@') {
        Some(idx) => &authority[idx + 1..],
        None => authority,
    }
}

fn split_host_port(host_port: &str) -> (&str, Option<u16>) {
    match host_port.rfind(':') {
        Some(idx) => {
            let maybe_port = &host_port[idx + 1..];
            if !maybe_port.is_empty() && maybe_port.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(p) = maybe_port.parse::<u16>() {
                    return (&host_port[..idx], Some(p));
                }
            }
            (host_port, None)
        }
        None => (host_port, None),
    }
}

fn split_path_query(path_and_query: &str) -> (&str, Option<&str>) {
    if let Some(rest) = path_and_query.strip_prefix('?') {
        return ("", Some(rest));
    }
    match path_and_query.find('?') {
        Some(idx) => (&path_and_query[..idx], Some(&path_and_query[idx + 1..])),
        None => (path_and_query, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_encoded_percent_collapses_once() {
        let c = canonicalize("http://host/%25%32%35");
        assert_eq!(c.to_string(), "http://host/%25");
    }

    #[test]
    fn decimal_host_becomes_dotted_quad() {
        let c = canonicalize("http://3279880203/blah");
        assert_eq!(c.to_string(), "http://195.127.0.11/blah");
    }

    #[test]
    fn scheme_is_added_when_missing() {
        let c = canonicalize("example.com/a");
        assert_eq!(c.to_string(), "http://example.com/a");
    }

    #[test]
    fn explicit_empty_query_is_preserved() {
        let c = canonicalize("http://host/path?");
        assert_eq!(c.to_string(), "http://host/path?");
    }

    #[test]
    fn absent_query_is_omitted() {
        let c = canonicalize("http://host/path");
        assert_eq!(c.to_string(), "http://host/path");
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let once = canonicalize("http://Example.com//a/../b/?x=1").to_string();
        let twice = canonicalize(&once).to_string();
        assert_eq!(once, twice);
    }
}
