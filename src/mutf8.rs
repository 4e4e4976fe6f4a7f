//! Modified UTF-8, the string encoding of `CONSTANT_Utf8` entries and of `writeUTF`.
//!
//! Differences from standard UTF-8: U+0000 is written as the two bytes `C0 80`, and
//! supplementary characters are written as a surrogate pair, three bytes per half.

/// Encode `s`, without the length prefix.
pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// Decode a modified UTF-8 byte run. Returns `None` on a malformed sequence or an
/// unpaired surrogate.
pub fn decode(bytes: &[u8]) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = continuation(bytes, i + 1)?;
            units.push(((b as u16 & 0x1F) << 6) | b2);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = continuation(bytes, i + 1)?;
            let b3 = continuation(bytes, i + 2)?;
            units.push(((b as u16 & 0x0F) << 12) | (b2 << 6) | b3);
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}

fn continuation(bytes: &[u8], at: usize) -> Option<u16> {
    match bytes.get(at) {
        Some(&b) if b & 0xC0 == 0x80 => Some((b & 0x3F) as u16),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_unchanged() {
        assert_eq!(encode("a.Empty"), b"a.Empty".to_vec());
        assert_eq!(decode(b"java/lang/String").as_deref(), Some("java/lang/String"));
    }

    #[test]
    fn test_nul_uses_two_bytes() {
        assert_eq!(encode("\0"), vec![0xC0, 0x80]);
        assert_eq!(decode(&[0xC0, 0x80]).as_deref(), Some("\0"));
    }

    #[test]
    fn test_latin_and_bmp() {
        assert_eq!(encode("ü"), vec![0xC3, 0xBC]);
        assert_eq!(encode("€"), vec![0xE2, 0x82, 0xAC]);
        assert_eq!(decode(&[0x47, 0x72, 0xC3, 0xBC, 0xC3, 0x9F, 0x65]).as_deref(), Some("Grüße"));
    }

    #[test]
    fn test_supplementary_uses_surrogate_pair() {
        // U+1F600 -> D83D DE00
        let encoded = encode("\u{1F600}");
        assert_eq!(encoded, vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]);
        assert_eq!(decode(&encoded).as_deref(), Some("\u{1F600}"));
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(decode(&[0xC3]), None);
        assert_eq!(decode(&[0xF0, 0x9F, 0x98, 0x80]), None);
        // lone high surrogate
        assert_eq!(decode(&[0xED, 0xA0, 0xBD]), None);
    }
}
