// ID3 frame definitions, parsers and builders

use serde::Serialize;
use tracing::debug;

use super::v2::{synchsafe_size, Id3v2Header, ID3_SIGNATURE, MAX_SYNCHSAFE};
use crate::error::{Result, TagError};
use crate::picture::{ImageFormat, PictureType};
use crate::utils::buffer::{Field, LabeledBuffer};
use crate::utils::encoding::{decode_text, encode_text, TextEncoding};
use crate::utils::io::ByteSource;

/// Frame identifiers the readers and builders single out
pub mod frame_ids {
    pub const USER_TEXT: &str = "TXXX";
    pub const COMMENT: &str = "COMM"; // Comments
    pub const PICTURE: &str = "APIC"; // Attached picture
}

/// Text information frames: `T000`..`TZZZ` except the user-defined `TXXX`.
pub fn is_text_frame(id: &str) -> bool {
    id.starts_with('T') && id != frame_ids::USER_TEXT
}

/// Decoded text information frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextFrame {
    pub encoding: u8,
    pub text: String,
}

impl TextFrame {
    /// Decode a `length`-byte text frame body at the cursor.
    pub fn decode(buffer: &mut LabeledBuffer, length: usize) -> Result<Self> {
        if length == 0 {
            return Ok(TextFrame {
                encoding: 0,
                text: String::new(),
            });
        }
        let encoding = buffer.read_u8("text encoding")?;
        let text = decode_text(
            buffer.read(length - 1),
            TextEncoding::from_byte(encoding),
        );
        Ok(TextFrame { encoding, text })
    }
}

/// Decoded COMM frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentFrame {
    pub encoding: u8,
    pub language: String,
    pub description: String,
    pub text: String,
}

impl CommentFrame {
    /// Decode a COMM body from the cursor up to offset `end`.
    ///
    /// The description ends at the first single zero byte, whatever the
    /// encoding, so UTF-16 descriptions can cut short.
    pub fn decode(buffer: &mut LabeledBuffer, end: usize) -> Result<Self> {
        let head = buffer.unpack_fields(&[Field::U8, Field::Bytes(3)])?;
        let encoding = head[0].as_u64() as u8;
        let text_encoding = TextEncoding::from_byte(encoding);
        let language = String::from_utf8_lossy(head[1].as_bytes()).into_owned();

        let description = decode_text(buffer.read_until(0), text_encoding);
        let rest = end.saturating_sub(buffer.tell());
        let text = decode_text(buffer.read(rest), text_encoding);

        Ok(CommentFrame {
            encoding,
            language,
            description,
            text,
        })
    }
}

/// Decoded APIC frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApicFrame {
    pub encoding: u8,
    pub mime_type: String,
    pub picture_type: PictureType,
    pub description: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ApicFrame {
    /// Decode an APIC body from the cursor up to offset `end`.
    pub fn decode(buffer: &mut LabeledBuffer, end: usize) -> Result<Self> {
        let encoding = buffer.read_u8("APIC encoding")?;
        let mime_type = String::from_utf8_lossy(buffer.read_until(0)).into_owned();
        let picture_type = PictureType::from_u32(buffer.read_u8("APIC picture type")? as u32, "APIC")?;
        let description = decode_text(buffer.read_until(0), TextEncoding::from_byte(encoding));
        let rest = end.saturating_sub(buffer.tell());
        let data = buffer.read(rest).to_vec();

        Ok(ApicFrame {
            encoding,
            mime_type,
            picture_type,
            description,
            data,
        })
    }
}

/// ID3v2 frame structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id3Frame {
    /// Four ASCII characters; longer ids are cut, shorter ones padded with spaces.
    pub frame_id: String,
    pub flags: u16,
    pub data: Vec<u8>,
}

impl Id3Frame {
    pub fn new(frame_id: &str, data: Vec<u8>) -> Self {
        Id3Frame {
            frame_id: frame_id.to_string(),
            flags: 0,
            data,
        }
    }

    /// Encode with a v2.3 header (plain 32-bit size).
    ///
    /// A frame that could not fit in any tag fails with `BlockTooLarge`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let max = MAX_SYNCHSAFE - Id3v2Header::HEADER_SIZE;
        if self.data.len() > max {
            return Err(TagError::BlockTooLarge {
                block: self.frame_id.clone(),
                length: self.data.len(),
                max,
            });
        }

        let mut id = [b' '; 4];
        for (slot, byte) in id.iter_mut().zip(self.frame_id.bytes()) {
            *slot = byte;
        }

        let mut out = Vec::with_capacity(Id3v2Header::HEADER_SIZE + self.data.len());
        out.extend_from_slice(&id);
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

/// Build a text frame: encoding byte 1 followed by UTF-16 text.
pub fn build_text_frame(id: &str, text: &str) -> Result<Vec<u8>> {
    let mut payload = vec![TextEncoding::Utf16 as u8];
    payload.extend(encode_text(text, TextEncoding::Utf16));
    Id3Frame::new(id, payload).to_bytes()
}

/// One text frame per `(id, text)` pair, in iteration order.
pub fn build_text_frames<I, K, V>(texts: I) -> Result<Vec<Vec<u8>>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    texts
        .into_iter()
        .map(|(id, text)| build_text_frame(id.as_ref(), text.as_ref()))
        .collect()
}

/// Build an APIC frame around the bytes pulled from `source`, with an empty
/// description.
pub fn build_apic_frame<S>(
    source: &S,
    picture_type: PictureType,
    format: ImageFormat,
) -> Result<Vec<u8>>
where
    S: ByteSource + ?Sized,
{
    let image = source.read_bytes()?;
    let mime = format.mime_type();

    let mut payload = Vec::with_capacity(mime.len() + 4 + image.len());
    payload.push(TextEncoding::Utf16 as u8);
    payload.extend_from_slice(mime.as_bytes());
    payload.push(0);
    payload.push(picture_type.code());
    payload.push(0);
    payload.extend_from_slice(&image);
    Id3Frame::new(frame_ids::PICTURE, payload).to_bytes()
}

/// Prefix `frames` with an ID3v2.3 header whose sync-safe size covers every
/// frame (header included). More than 28 bits of frames fail with
/// `BlockTooLarge`.
pub fn assemble_tag<B: AsRef<[u8]>>(frames: &[B]) -> Result<Vec<u8>> {
    let size: usize = frames.iter().map(|f| f.as_ref().len()).sum();
    let size_word = synchsafe_size(size, "ID3v2 tag")?;

    let mut tag = Vec::with_capacity(Id3v2Header::HEADER_SIZE + size);
    tag.extend_from_slice(ID3_SIGNATURE);
    tag.extend_from_slice(&[3, 0, 0]);
    tag.extend_from_slice(&size_word.to_be_bytes());
    for frame in frames {
        tag.extend_from_slice(frame.as_ref());
    }

    debug!(frames = frames.len(), bytes = tag.len(), "assembled ID3v2 tag");
    Ok(tag)
}
