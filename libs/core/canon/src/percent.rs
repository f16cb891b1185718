/// Bytes that stay literal when percent-encoding a canonical URL. This is
/// the exact additional "safe" set from the spec; ASCII letters, digits,
/// `_`, `.`, `-`, and `~` are always left alone regardless of this list
/// (the usual percent-encoding "unreserved" characters).
const EXTRA_SAFE: &[u8] = b"!\"$&'()*+,-./:;<=>?@[\\]^_`{|}~";

fn is_always_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-' | b'~')
}

fn is_safe_byte(b: u8) -> bool {
    is_always_safe(b) || EXTRA_SAFE.contains(&b)
}

/// Percent-decodes `%XX` escapes once. Invalid UTF-8 produced by decoding
/// is replaced, matching `urllib.parse.unquote`'s lossy behavior.
fn percent_decode_once(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Repeatedly percent-decodes until a fixed point is reached ("full
/// unescape"). Bounded so a pathological input cannot loop forever.
pub fn full_unescape(s: &str) -> String {
    let mut current = s.to_string();
    for _ in 0..32 {
        let next = percent_decode_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
    current
}

/// Percent-encodes every byte that is not in the canonical "safe" set.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_safe_byte(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_is_idempotent_on_fixed_point() {
        assert_eq!(full_unescape("%2525"), "%");
    }

    #[test]
    fn quote_keeps_safe_chars_literal() {
        assert_eq!(quote("a/b?c=d"), "a/b?c=d");
    }

    #[test]
    fn quote_escapes_space_and_percent_and_hash() {
        assert_eq!(quote(" %#"), "%20%25%23");
    }
}
