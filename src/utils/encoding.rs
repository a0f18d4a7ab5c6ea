// Text encodings used by ID3v2 frames

use encoding_rs::{UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};

/// ID3v2 text encoding byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Legacy single-byte codepage.
    Latin1 = 0,
    /// UTF-16 with byte order mark.
    Utf16 = 1,
    Utf16BE = 2,
    Utf8 = 3,
}

impl TextEncoding {
    /// Unknown codes fall back to the legacy codepage.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => TextEncoding::Utf16,
            2 => TextEncoding::Utf16BE,
            3 => TextEncoding::Utf8,
            _ => TextEncoding::Latin1,
        }
    }
}

/// Decode text with specified encoding
pub fn decode_text(data: &[u8], encoding: TextEncoding) -> String {
    let text = match encoding {
        TextEncoding::Latin1 => WINDOWS_1252.decode(data).0,
        TextEncoding::Utf16 => {
            // BOM decides byte order; none means little endian
            if data.starts_with(&[0xFF, 0xFE]) {
                UTF_16LE.decode_without_bom_handling(&data[2..]).0
            } else if data.starts_with(&[0xFE, 0xFF]) {
                UTF_16BE.decode_without_bom_handling(&data[2..]).0
            } else {
                UTF_16LE.decode_without_bom_handling(data).0
            }
        }
        TextEncoding::Utf16BE => UTF_16BE.decode_without_bom_handling(data).0,
        TextEncoding::Utf8 => UTF_8.decode(data).0,
    };
    text.trim_end_matches('\0').to_string()
}

/// Encode text with specified encoding
pub fn encode_text(text: &str, encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Latin1 => WINDOWS_1252.encode(text).0.into_owned(),
        TextEncoding::Utf16 => {
            let mut out = vec![0xFF, 0xFE];
            out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
            out
        }
        TextEncoding::Utf16BE => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        TextEncoding::Utf8 => text.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_carries_bom() {
        let bytes = encode_text("Hi", TextEncoding::Utf16);
        assert_eq!(bytes, vec![0xFF, 0xFE, b'H', 0, b'i', 0]);
        assert_eq!(decode_text(&bytes, TextEncoding::Utf16), "Hi");
    }

    #[test]
    fn utf16_big_endian_bom() {
        assert_eq!(decode_text(&[0xFE, 0xFF, 0, b'A'], TextEncoding::Utf16), "A");
    }

    #[test]
    fn legacy_codepage_and_trailing_nul() {
        assert_eq!(decode_text(b"caf\xe9\0", TextEncoding::Latin1), "café");
        assert_eq!(TextEncoding::from_byte(9), TextEncoding::Latin1);
    }
}
