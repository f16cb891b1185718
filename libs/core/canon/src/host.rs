use crate::percent::full_unescape;

/// Full-unescapes, trims/collapses dots, lowercases, and — if the result
/// is a bare decimal or `0x`-hex integer — rewrites it as a dotted-quad
/// IPv4 literal. DNS resolution is never performed here; see
/// `SPEC_FULL.md` for why a numeric hostname does not trigger a lookup.
pub fn normalize_host(raw: &str) -> String {
    let unescaped = full_unescape(raw);
    let trimmed = unescaped.trim_matches('.');
    let collapsed = collapse_dot_runs(trimmed);
    let lower = collapsed.to_lowercase();

    if !lower.is_empty() && lower.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = lower.parse::<u32>() {
            return ipv4_from_u32(n);
        }
    }
    if let Some(hex) = lower.strip_prefix("0x") {
        if !lower.contains('.') && !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            if let Ok(n) = u32::from_str_radix(hex, 16) {
                return ipv4_from_u32(n);
            }
        }
    }
    lower
}

fn collapse_dot_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_dot = false;
    for c in s.chars() {
        if c == '.' {
            if prev_dot {
                continue;
            }
            prev_dot = true;
        } else {
            prev_dot = false;
        }
        out.push(c);
    }
    out
}

/// Interprets a 32-bit integer as a big-endian IPv4 address and formats it
/// as a dotted-quad string, e.g. `3279880203` -> `195.127.0.11`.
pub fn ipv4_from_u32(n: u32) -> String {
    let bytes = n.to_be_bytes();
    format!("{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
}

pub fn is_dotted_quad(host: &str) -> bool {
    let parts: Vec<&str> = host.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) && p.parse::<u8>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_host_becomes_dotted_quad() {
        assert_eq!(normalize_host("3279880203"), "195.127.0.11");
    }

    #[test]
    fn hex_host_becomes_dotted_quad() {
        assert_eq!(normalize_host("0xC37F000B"), "195.127.0.11");
    }

    #[test]
    fn dots_are_collapsed_and_trimmed() {
        assert_eq!(normalize_host("..Example..COM.."), "example.com");
    }

    #[test]
    fn ipv4_from_u32_formats_dotted_quad() {
        assert_eq!(ipv4_from_u32(0xC37F000B), "195.127.0.11");
    }
}
