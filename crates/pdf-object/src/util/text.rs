//! Text strings: PDFDocEncoding, UTF-16 and UTF-8 with byte-order marks.

use lazy_static::lazy_static;

/// Code points of PDFDocEncoding bytes 0x18..=0x1F.
const DIACRITICS: [char; 8] = [
    '\u{02d8}', '\u{02c7}', '\u{02c6}', '\u{02d9}', '\u{02dd}', '\u{02db}', '\u{02da}', '\u{02dc}',
];

/// Code points of PDFDocEncoding bytes 0x80..=0x9E.
const HIGH_PUNCTUATION: [char; 31] = [
    '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}', '\u{2044}',
    '\u{2039}', '\u{203a}', '\u{2212}', '\u{2030}', '\u{201e}', '\u{201c}', '\u{201d}', '\u{2018}',
    '\u{2019}', '\u{201a}', '\u{2122}', '\u{fb01}', '\u{fb02}', '\u{0141}', '\u{0152}', '\u{0160}',
    '\u{0178}', '\u{017d}', '\u{0131}', '\u{0142}', '\u{0153}', '\u{0161}', '\u{017e}',
];

lazy_static! {
    /// PDFDocEncoding byte to Unicode.
    static ref PDF_DOC_ENCODING: [char; 256] = {
        let mut table = [char::REPLACEMENT_CHARACTER; 256];
        for (byte, slot) in table.iter_mut().enumerate() {
            *slot = match byte {
                0x18..=0x1f => DIACRITICS[byte - 0x18],
                0x7f | 0x9f | 0xad => char::REPLACEMENT_CHARACTER,
                0x80..=0x9e => HIGH_PUNCTUATION[byte - 0x80],
                0xa0 => '\u{20ac}',
                // everything else coincides with Latin-1
                _ => char::from(byte as u8),
            };
        }
        table
    };
}

/// Decodes the bytes of a text string.
///
/// A leading FE FF selects UTF-16BE, FF FE UTF-16LE and EF BB BF UTF-8;
/// anything else is PDFDocEncoding. Malformed sequences decode to U+FFFD.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xfe, 0xff]) {
        decode_utf16(rest, u16::from_be_bytes)
    } else if let Some(rest) = bytes.strip_prefix(&[0xff, 0xfe]) {
        decode_utf16(rest, u16::from_le_bytes)
    } else if let Some(rest) = bytes.strip_prefix(&[0xef, 0xbb, 0xbf]) {
        String::from_utf8_lossy(rest).into_owned()
    } else {
        bytes
            .iter()
            .map(|&b| PDF_DOC_ENCODING[b as usize])
            .collect()
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Encodes `text` as a text string.
///
/// Text made only of ASCII characters that PDFDocEncoding maps to
/// themselves is stored as is; anything else becomes UTF-16BE with a BOM.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    let plain = text
        .chars()
        .all(|c| c.is_ascii() && !matches!(c, '\u{18}'..='\u{1f}' | '\u{7f}'));
    if plain {
        return text.as_bytes().to_vec();
    }
    let mut out = Vec::with_capacity(2 + text.len() * 2);
    out.extend_from_slice(&[0xfe, 0xff]);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_doc_encoding() {
        assert_eq!(decode_text_string(b"Hello"), "Hello");
        assert_eq!(decode_text_string(&[0x80, 0x20, 0x92]), "\u{2022} \u{2122}");
        assert_eq!(decode_text_string(&[0xa0, 0xe9, 0x18]), "\u{20ac}\u{e9}\u{02d8}");
        assert_eq!(decode_text_string(&[0x7f, 0xad]), "\u{fffd}\u{fffd}");
    }

    #[test]
    fn test_byte_order_marks() {
        assert_eq!(decode_text_string(&[0xfe, 0xff, 0x00, 0x41, 0x20, 0xac]), "A\u{20ac}");
        assert_eq!(decode_text_string(&[0xff, 0xfe, 0x41, 0x00]), "A");
        assert_eq!(decode_text_string(b"\xef\xbb\xbfcaf\xc3\xa9"), "caf\u{e9}");
        // unpaired surrogate and odd trailing byte
        assert_eq!(decode_text_string(&[0xfe, 0xff, 0xd8, 0x00, 0x00]), "\u{fffd}");
    }

    #[test]
    fn test_encode_text_string() {
        assert_eq!(encode_text_string("Title"), b"Title");
        assert_eq!(encode_text_string("é"), vec![0xfe, 0xff, 0x00, 0xe9]);
        assert_eq!(encode_text_string("\u{1f600}"), vec![0xfe, 0xff, 0xd8, 0x3d, 0xde, 0x00]);
        assert_eq!(encode_text_string("\u{18}"), vec![0xfe, 0xff, 0x00, 0x18]);
    }

    #[test]
    fn test_text_round_trip() {
        for text in ["", "plain", "Gr\u{fc}\u{df}e", "\u{65e5}\u{672c}", "\u{7f}"] {
            assert_eq!(decode_text_string(&encode_text_string(text)), text);
        }
    }
}
