//! Byte-level decoding of the bits of HTTP the server understands.

/// Offset of the blank line that ends a request head.
pub fn head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn hex_at(bytes: &[u8], i: usize) -> Option<u8> {
    bytes.get(i).copied().and_then(hex)
}

/// Undoes `%XX` escapes. Malformed escapes are kept as they are; invalid
/// UTF-8 is replaced.
pub fn percent_decode(s: &str, plus_as_space: bool) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => match (hex_at(bytes, i + 1), hex_at(bytes, i + 2)) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 3;
                    continue;
                }
                _ => out.push(b'%'),
            },
            b'+' if plus_as_space => out.push(b' '),
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Fields of an `application/x-www-form-urlencoded` body.
pub fn form_pairs(body: &[u8]) -> Vec<(String, String)> {
    String::from_utf8_lossy(body)
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key, true), percent_decode(value, true))
        })
        .collect()
}

/// The `name=value` pairs of a `Cookie` header. Pairs with no name or no
/// value are skipped.
pub fn cookies(header: &str) -> impl Iterator<Item = (&str, String)> {
    header.split(';').filter_map(|cookie| {
        let (name, value) = cookie.split_once('=')?;
        let (name, value) = (name.trim(), value.trim());
        (!name.is_empty() && !value.is_empty()).then(|| (name, percent_decode(value, false)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_end_of_head() {
        assert_eq!(head_end(b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody"), Some(23));
        assert_eq!(head_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
    }

    #[test]
    fn decodes_escapes() {
        assert_eq!(percent_decode("My+World%21", true), "My World!");
        assert_eq!(percent_decode("a+b%3D%3D", false), "a+b==");
        assert_eq!(percent_decode("100%", false), "100%");
        assert_eq!(percent_decode("%zz%4", false), "%zz%4");
        assert_eq!(percent_decode("caf%C3%A9", false), "café");
    }

    #[test]
    fn decodes_forms() {
        let body = b"op=newmap&mapname=Jj0b%2BQ%3D%3D&worldname=Big+Base&flag&&scrollpos=12";
        let fields = form_pairs(body);
        assert_eq!(
            fields,
            [
                ("op".to_owned(), "newmap".to_owned()),
                ("mapname".to_owned(), "Jj0b+Q==".to_owned()),
                ("worldname".to_owned(), "Big Base".to_owned()),
                ("flag".to_owned(), String::new()),
                ("scrollpos".to_owned(), "12".to_owned()),
            ]
        );
    }

    #[test]
    fn splits_cookies() {
        let header = "theme=dark; MANAGEMENTKEY=a%3Db=c ; empty=; =nameless; junk";
        let jar: Vec<_> = cookies(header).collect();
        assert_eq!(jar, [("theme", "dark".to_owned()), ("MANAGEMENTKEY", "a=b=c".to_owned())]);
    }
}
