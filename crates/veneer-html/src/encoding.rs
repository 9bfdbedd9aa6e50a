//! Input decoding
//!
//! Picks the character encoding of a byte stream the way a browser does for
//! a document without transport headers: byte order mark, then the caller's
//! declared label, then a `<meta>` prescan of the first 1024 bytes, then
//! UTF-8. Only the UTF-8, UTF-16 and windows-1252 families are decoded.

use std::fmt;

const PRESCAN_LIMIT: usize = 1024;

/// Bytes 0x80..=0x9F of windows-1252; the rest of the range maps to Latin-1
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}', '\u{02C6}',
    '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}', '\u{0090}', '\u{2018}',
    '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}', '\u{2122}', '\u{0161}',
    '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Windows1252,
}

/// How the encoding was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    ByteOrderMark,
    Declared,
    Prescan,
    Default,
}

impl Encoding {
    /// Resolve an encoding label, ignoring case and surrounding whitespace
    pub fn for_label(label: &str) -> Option<Self> {
        let label = label.trim_matches(|c: char| c.is_ascii_whitespace()).to_ascii_lowercase();
        match label.as_str() {
            "utf-8" | "utf8" | "unicode-1-1-utf-8" | "unicode11utf8" | "unicode20utf8" | "x-unicode20utf8" => {
                Some(Encoding::Utf8)
            }
            "utf-16" | "utf-16le" | "ucs-2" | "unicode" | "csunicode" | "iso-10646-ucs-2" | "unicodefeff" => {
                Some(Encoding::Utf16Le)
            }
            "utf-16be" | "unicodefffe" => Some(Encoding::Utf16Be),
            "windows-1252" | "cp1252" | "x-cp1252" | "latin1" | "l1" | "iso-8859-1" | "iso8859-1" | "iso_8859-1"
            | "iso88591" | "ascii" | "us-ascii" | "ansi_x3.4-1968" | "cp819" | "ibm819" | "csisolatin1" => {
                Some(Encoding::Windows1252)
            }
            _ => None,
        }
    }

    /// Canonical name, as reported by `Document::character_set`
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Windows1252 => "windows-1252",
        }
    }

    /// Decode `bytes`, replacing malformed sequences with U+FFFD
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            Encoding::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
            Encoding::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
                    _ => char::from(b),
                })
                .collect(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let mut out: String = char::decode_utf16(bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]])))
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if bytes.len() % 2 == 1 {
        out.push(char::REPLACEMENT_CHARACTER);
    }
    out
}

/// Result of sniffing: the encoding, how it was found, and the length of a
/// byte order mark to skip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub encoding: Encoding,
    pub confidence: Confidence,
    pub bom_len: usize,
}

pub fn sniff(bytes: &[u8], declared: Option<&str>) -> Sniffed {
    let found = |encoding, confidence| Sniffed {
        encoding,
        confidence,
        bom_len: 0,
    };
    if let Some((encoding, bom_len)) = byte_order_mark(bytes) {
        return Sniffed {
            encoding,
            confidence: Confidence::ByteOrderMark,
            bom_len,
        };
    }
    if let Some(label) = declared {
        match Encoding::for_label(label) {
            Some(encoding) => return found(encoding, Confidence::Declared),
            None => tracing::warn!(label, "unsupported declared encoding, sniffing instead"),
        }
    }
    if let Some(encoding) = prescan(bytes) {
        return found(encoding, Confidence::Prescan);
    }
    found(Encoding::Utf8, Confidence::Default)
}

fn byte_order_mark(bytes: &[u8]) -> Option<(Encoding, usize)> {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => Some((Encoding::Utf8, 3)),
        [0xFF, 0xFE, ..] => Some((Encoding::Utf16Le, 2)),
        [0xFE, 0xFF, ..] => Some((Encoding::Utf16Be, 2)),
        _ => None,
    }
}

/// Look for `charset=` inside `<meta ...>` tags near the start of the input
fn prescan(bytes: &[u8]) -> Option<Encoding> {
    let head = &bytes[..bytes.len().min(PRESCAN_LIMIT)];
    let lower: Vec<u8> = head.iter().map(u8::to_ascii_lowercase).collect();
    let mut offset = 0;
    while let Some(start) = find(&lower[offset..], b"<meta") {
        let tag_start = offset + start + 5;
        let tail = &lower[tag_start..];
        let end = tail.iter().position(|&b| b == b'>').unwrap_or(tail.len());
        let tag = &tail[..end];
        if let Some(at) = find(tag, b"charset") {
            let value = charset_value(&tag[at + 7..]);
            if let Some(encoding) = std::str::from_utf8(value).ok().and_then(Encoding::for_label) {
                // A UTF-16 label in ASCII-compatible bytes cannot be right
                return Some(match encoding {
                    Encoding::Utf16Le | Encoding::Utf16Be => Encoding::Utf8,
                    other => other,
                });
            }
        }
        offset = tag_start + end;
    }
    None
}

/// Value after `charset`: optional whitespace, `=`, optional quotes
fn charset_value(after: &[u8]) -> &[u8] {
    let mut i = 0;
    while after.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    if after.get(i) != Some(&b'=') {
        return &[];
    }
    i += 1;
    while after.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    let value = &after[i.min(after.len())..];
    match value.first() {
        Some(&quote @ (b'"' | b'\'')) => {
            let inner = &value[1..];
            let end = inner.iter().position(|&b| b == quote).unwrap_or(inner.len());
            &inner[..end]
        }
        _ => {
            let end = value
                .iter()
                .position(|&b| b.is_ascii_whitespace() || matches!(b, b';' | b'"' | b'\'' | b'/'))
                .unwrap_or(value.len());
            &value[..end]
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_wins() {
        let sniffed = sniff(b"\xEF\xBB\xBFhi", Some("windows-1252"));
        assert_eq!(sniffed.encoding, Encoding::Utf8);
        assert_eq!(sniffed.confidence, Confidence::ByteOrderMark);
        assert_eq!(sniffed.bom_len, 3);

        let utf16 = sniff(&[0xFF, 0xFE, b'a', 0], None);
        assert_eq!(utf16.encoding, Encoding::Utf16Le);
        assert_eq!(utf16.encoding.decode(&[b'a', 0]), "a");
    }

    #[test]
    fn test_declared_label() {
        let sniffed = sniff(b"<p>", Some(" Latin1 "));
        assert_eq!(sniffed.encoding, Encoding::Windows1252);
        assert_eq!(sniffed.confidence, Confidence::Declared);
        assert_eq!(sniff(b"<p>", Some("klingon")).confidence, Confidence::Default);
    }

    #[test]
    fn test_meta_prescan() {
        let charset = br#"<html><head><meta charset="windows-1252"><title>x</title>"#;
        assert_eq!(sniff(charset, None).encoding, Encoding::Windows1252);

        let http_equiv = br#"<meta http-equiv="Content-Type" content="text/html; charset=ISO-8859-1">"#;
        assert_eq!(sniff(http_equiv, None).confidence, Confidence::Prescan);

        let utf16 = br#"<meta charset=utf-16>"#;
        assert_eq!(sniff(utf16, None).encoding, Encoding::Utf8);

        let late = [vec![b' '; PRESCAN_LIMIT], br#"<meta charset="latin1">"#.to_vec()].concat();
        assert_eq!(sniff(&late, None).confidence, Confidence::Default);
    }

    #[test]
    fn test_windows_1252_decoding() {
        assert_eq!(Encoding::Windows1252.decode(b"caf\xE9 \x80"), "café €");
        assert_eq!(Encoding::Utf8.decode(b"ok\xFF"), "ok\u{FFFD}");
        assert_eq!(Encoding::Utf16Be.decode(&[0, b'a', 0]), "a\u{FFFD}");
    }
}
