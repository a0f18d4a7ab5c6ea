// ID3v2 tag implementation

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use super::frames::{is_text_frame, ApicFrame, CommentFrame, TextFrame};
use crate::error::{Result, TagError};
use crate::utils::buffer::{Field, LabeledBuffer, Occurrence, RangeReturn, Whence};
use crate::utils::io::read_range;

/// ID3v2 file signature
pub const ID3_SIGNATURE: &[u8; 3] = b"ID3";

const EXTENDED_HEADER_FLAG: u8 = 0x40;

/// Decode a sync-safe word (7 usable bits per byte).
pub fn synchsafe_to_u32(word: u32) -> u32 {
    ((word >> 24) & 0x7F) << 21 | ((word >> 16) & 0x7F) << 14 | ((word >> 8) & 0x7F) << 7 | (word & 0x7F)
}

/// Encode `n` (at most 28 bits) as a sync-safe word.
pub fn u32_to_synchsafe(n: u32) -> u32 {
    ((n >> 21) & 0x7F) << 24 | ((n >> 14) & 0x7F) << 16 | ((n >> 7) & 0x7F) << 8 | (n & 0x7F)
}

/// Largest value a sync-safe word can hold.
pub const MAX_SYNCHSAFE: usize = 0x0FFF_FFFF;

/// Sync-safe size word for `length` bytes of `block`, or `BlockTooLarge` past
/// 28 bits.
pub fn synchsafe_size(length: usize, block: &str) -> Result<u32> {
    if length > MAX_SYNCHSAFE {
        return Err(TagError::BlockTooLarge {
            block: block.to_string(),
            length,
            max: MAX_SYNCHSAFE,
        });
    }
    Ok(u32_to_synchsafe(length as u32))
}

/// ID3v2 header structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id3v2Header {
    /// Major version and revision.
    pub version: (u8, u8),
    pub flags: u8,
    /// Declared size, header excluded.
    pub size: u32,
}

impl Id3v2Header {
    pub const HEADER_SIZE: usize = 10;

    fn mismatch(found: &[u8]) -> TagError {
        TagError::FormatMismatch {
            expected: "ID3",
            found: found.iter().take(3).copied().collect(),
        }
    }

    /// Decode the header at the buffer cursor.
    pub fn decode(buffer: &mut LabeledBuffer) -> Result<Self> {
        let fields = buffer.unpack_fields(&[
            Field::Bytes(3),
            Field::U8,
            Field::U8,
            Field::U8,
            Field::U32Be,
        ])?;
        if fields[0].as_bytes() != ID3_SIGNATURE {
            return Err(Self::mismatch(fields[0].as_bytes()));
        }
        Ok(Id3v2Header {
            version: (fields[1].as_u64() as u8, fields[2].as_u64() as u8),
            flags: fields[3].as_u64() as u8,
            size: synchsafe_to_u32(fields[4].as_u32()),
        })
    }

    /// Read ID3v2 header from reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = [0u8; Self::HEADER_SIZE];
        let mut filled = 0;
        while filled < raw.len() {
            let n = reader
                .read(&mut raw[filled..])
                .map_err(|e| TagError::io("<reader>", e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < 3 || &raw[..3] != ID3_SIGNATURE {
            return Err(Self::mismatch(&raw[..filled]));
        }
        Self::decode(&mut LabeledBuffer::new(raw[..filled].to_vec()))
    }

    /// Whole tag length: header plus declared size.
    pub fn tag_size(&self) -> usize {
        Self::HEADER_SIZE + self.size as usize
    }

    /// Frame sizes are sync-safe from v2.4 on.
    pub fn synchsafe_frames(&self) -> bool {
        self.version.0 >= 4
    }
}

/// One frame met during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEntry {
    pub id: String,
    pub size: u32,
    pub flags: u16,
    /// Offset of the 10-byte frame header within the tag.
    pub offset: usize,
    /// How many frames with the same id came before this one.
    pub occurrence: usize,
}

/// An in-memory ID3v2 tag with its frame index.
#[derive(Debug)]
pub struct Id3Context {
    buffer: LabeledBuffer,
    header: Id3v2Header,
    frames: Vec<FrameEntry>,
}

impl Id3Context {
    /// Index the tag at the start of `data`.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if !data.starts_with(ID3_SIGNATURE) {
            return Err(Id3v2Header::mismatch(&data));
        }
        let mut buffer = LabeledBuffer::new(data);
        let header = Id3v2Header::decode(&mut buffer)?;

        let mut context = Id3Context {
            buffer,
            header,
            frames: Vec::new(),
        };
        context.create_labels()?;
        Ok(context)
    }

    /// Load just the tag region of an MP3 file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| TagError::io(path, e))?;
        let header = Id3v2Header::read(&mut file).map_err(|e| match e {
            TagError::Io { source, .. } => TagError::io(path, source),
            other => other,
        })?;
        debug!(path = %path.display(), size = header.tag_size(), "loading ID3v2 tag");
        Self::from_bytes(read_range(path, 0, header.tag_size() as u64)?)
    }

    fn skip_extended_header(&mut self) -> Result<()> {
        let size = self.buffer.read_u32_be("extended header size")?;
        // v2.4 counts the size field itself, v2.3 does not
        let skip = if self.header.synchsafe_frames() {
            synchsafe_to_u32(size).saturating_sub(4)
        } else {
            size
        };
        self.buffer.seek(skip as i64, Whence::Current)?;
        Ok(())
    }

    fn create_labels(&mut self) -> Result<()> {
        self.buffer
            .seek(Id3v2Header::HEADER_SIZE as i64, Whence::Start)?;
        if self.header.flags & EXTENDED_HEADER_FLAG != 0 {
            self.skip_extended_header()?;
        }

        let declared = self.header.size as usize;
        loop {
            let offset = self.buffer.tell();
            if offset - Id3v2Header::HEADER_SIZE >= declared
                || self.buffer.len().saturating_sub(offset) < Id3v2Header::HEADER_SIZE
            {
                break;
            }

            let fields = self
                .buffer
                .unpack_fields(&[Field::Bytes(4), Field::U32Be, Field::U16Be])?;
            let raw_id = fields[0].as_bytes();
            if raw_id.iter().all(|&b| b == 0) {
                break;
            }
            let id = String::from_utf8_lossy(raw_id).into_owned();
            let size = if self.header.synchsafe_frames() {
                synchsafe_to_u32(fields[1].as_u32())
            } else {
                fields[1].as_u32()
            };
            let flags = fields[2].as_u64() as u16;

            if self.buffer.tell() + size as usize > self.buffer.len() {
                warn!(frame = %id, offset, size, "frame runs past the end of the tag");
            }

            self.buffer.define_label(&id, size as i64);
            let occurrence = self.frames.iter().filter(|f| f.id == id).count();
            debug!(frame = %id, offset, size, flags, "indexed ID3v2 frame");
            self.frames.push(FrameEntry {
                id,
                size,
                flags,
                offset,
                occurrence,
            });

            self.buffer.seek(size as i64, Whence::Current)?;
        }
        Ok(())
    }

    pub fn header(&self) -> &Id3v2Header {
        &self.header
    }

    pub fn version(&self) -> (u8, u8) {
        self.header.version
    }

    /// Byte size of the whole tag, header included. Audio starts here.
    pub fn size(&self) -> usize {
        self.header.tag_size()
    }

    pub fn frames(&self) -> &[FrameEntry] {
        &self.frames
    }

    /// Frame ids in chain order, repeats included.
    pub fn frame_ids(&self) -> Vec<&str> {
        self.frames.iter().map(|f| f.id.as_str()).collect()
    }

    /// Frame flags, parallel to [`frame_ids`](Self::frame_ids).
    pub fn frame_flags(&self) -> Vec<u16> {
        self.frames.iter().map(|f| f.flags).collect()
    }

    pub fn has_frame(&self, id: &str) -> bool {
        self.frames.iter().any(|f| f.id == id)
    }

    /// Text of the last frame labeled `id`.
    pub fn text_frame(&mut self, id: &str) -> Result<String> {
        if !is_text_frame(id) {
            return Err(TagError::NotATextFrame { id: id.to_string() });
        }
        let length = self.buffer.seek_to_label(id, RangeReturn::Length)?;
        Ok(TextFrame::decode(&mut self.buffer, length)?.text)
    }

    /// Every text frame, in chain order.
    pub fn text_frames(&mut self) -> Result<Vec<(String, String)>> {
        let targets: Vec<(String, usize)> = self
            .frames
            .iter()
            .filter(|f| is_text_frame(&f.id))
            .map(|f| (f.id.clone(), f.occurrence))
            .collect();

        let mut texts = Vec::with_capacity(targets.len());
        for (id, occurrence) in targets {
            let length =
                self.buffer
                    .seek_to_label_at(&id, Occurrence::Nth(occurrence), RangeReturn::Length)?;
            let frame = TextFrame::decode(&mut self.buffer, length)?;
            texts.push((id, frame.text));
        }
        Ok(texts)
    }

    /// The last COMM frame.
    pub fn comment(&mut self) -> Result<CommentFrame> {
        let end = self.buffer.seek_to_label("COMM", RangeReturn::End)?;
        CommentFrame::decode(&mut self.buffer, end)
    }

    /// The last APIC frame.
    pub fn apic(&mut self) -> Result<ApicFrame> {
        let end = self.buffer.seek_to_label("APIC", RangeReturn::End)?;
        ApicFrame::decode(&mut self.buffer, end)
    }

    /// Every APIC frame, in chain order.
    pub fn apics(&mut self) -> Result<Vec<ApicFrame>> {
        let count = self.buffer.labels_named("APIC").count();
        let mut pictures = Vec::with_capacity(count);
        for n in 0..count {
            let end = self
                .buffer
                .seek_to_label_at("APIC", Occurrence::Nth(n), RangeReturn::End)?;
            pictures.push(ApicFrame::decode(&mut self.buffer, end)?);
        }
        Ok(pictures)
    }
}
