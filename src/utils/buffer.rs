// In-memory byte buffer with a cursor and named byte ranges

use std::fmt;
use std::ops::Range;

use tracing::trace;

use crate::error::{Result, TagError};

/// Seek origin for [`LabeledBuffer::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute position; negative offsets are rejected.
    Start,
    /// Relative to the cursor, clamped at zero.
    Current,
    /// Relative to the end of the data, clamped at zero.
    End,
}

/// What [`LabeledBuffer::seek_to_label`] reports about the range it moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeReturn {
    /// Length of the labeled range.
    Length,
    /// Offset one past the end of the labeled range.
    End,
}

/// Selects one entry among several labels sharing a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    First,
    Last,
    /// Zero-based position among the labels with that name.
    Nth(usize),
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occurrence::First => write!(f, "first occurrence"),
            Occurrence::Last => write!(f, "last occurrence"),
            Occurrence::Nth(n) => write!(f, "occurrence #{}", n),
        }
    }
}

/// A named half-open byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub range: Range<usize>,
}

/// One fixed-width field of a binary layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    U8,
    U16Be,
    U16Le,
    U24Be,
    U32Be,
    U32Le,
    U64Be,
    /// Fixed-length raw byte string.
    Bytes(usize),
}

impl Field {
    /// Number of bytes the field occupies.
    pub fn width(&self) -> usize {
        match self {
            Field::U8 => 1,
            Field::U16Be | Field::U16Le => 2,
            Field::U24Be => 3,
            Field::U32Be | Field::U32Le => 4,
            Field::U64Be => 8,
            Field::Bytes(n) => *n,
        }
    }

    fn decode(&self, raw: &[u8]) -> Value {
        let be = |raw: &[u8]| raw.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
        let le = |raw: &[u8]| raw.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64);
        match self {
            Field::U8 | Field::U16Be | Field::U24Be | Field::U32Be | Field::U64Be => {
                Value::Uint(be(raw))
            }
            Field::U16Le | Field::U32Le => Value::Uint(le(raw)),
            Field::Bytes(_) => Value::Bytes(raw.to_vec()),
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Uint(u64),
    Bytes(Vec<u8>),
}

impl Value {
    /// Integer value; byte strings yield 0.
    pub fn as_u64(&self) -> u64 {
        match self {
            Value::Uint(v) => *v,
            Value::Bytes(_) => 0,
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.as_u64() as u32
    }

    /// Byte-string value; integers yield an empty slice.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Uint(_) => &[],
            Value::Bytes(b) => b,
        }
    }
}

/// Byte buffer with a cursor and an ordered list of named ranges.
///
/// Labels are never replaced: defining a name twice keeps both entries in
/// definition order. [`seek_to_label`](Self::seek_to_label) and
/// [`label`](Self::label) resolve a name to its *last* entry only; use the
/// `*_at` variants with an [`Occurrence`] to reach earlier ones.
#[derive(Debug, Default, Clone)]
pub struct LabeledBuffer {
    data: Vec<u8>,
    pos: usize,
    labels: Vec<Label>,
}

impl LabeledBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        LabeledBuffer {
            data,
            pos: 0,
            labels: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor position. May exceed `len()`.
    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Read up to `n` bytes. Returns a short or empty slice at end of data.
    pub fn read(&mut self, n: usize) -> &[u8] {
        let start = self.pos.min(self.data.len());
        let end = start.saturating_add(n).min(self.data.len());
        self.pos = self.pos.max(end);
        &self.data[start..end]
    }

    /// Read everything from the cursor to the end of data.
    pub fn read_to_end(&mut self) -> &[u8] {
        let n = self.remaining();
        self.read(n)
    }

    /// Read the bytes before the next `terminator` and step past it.
    ///
    /// Without a terminator the rest of the data is returned and the cursor
    /// is left one past the end.
    pub fn read_until(&mut self, terminator: u8) -> &[u8] {
        let start = self.pos.min(self.data.len());
        match self.data[start..].iter().position(|&b| b == terminator) {
            Some(i) => {
                self.pos = start + i + 1;
                &self.data[start..start + i]
            }
            None => {
                self.pos = self.data.len() + 1;
                &self.data[start..]
            }
        }
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<usize> {
        let clamp = |base: usize| {
            let target = base as i64 + offset;
            target.max(0) as usize
        };
        self.pos = match whence {
            Whence::Start => {
                if offset < 0 {
                    return Err(TagError::NegativeSeek { position: offset });
                }
                offset as usize
            }
            Whence::Current => clamp(self.pos),
            Whence::End => clamp(self.data.len()),
        };
        Ok(self.pos)
    }

    fn take(&mut self, n: usize, field: &str) -> Result<&[u8]> {
        if self.remaining() < n {
            return Err(TagError::MalformedLayout {
                field: field.to_string(),
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..start + n])
    }

    /// Decode a fixed layout at the cursor.
    ///
    /// Either every field is decoded and the cursor advances by the layout's
    /// total width, or `MalformedLayout` is returned and the cursor stays put.
    pub fn unpack_fields(&mut self, layout: &[Field]) -> Result<Vec<Value>> {
        let total: usize = layout.iter().map(Field::width).sum();
        let raw = self.take(total, &format!("{:?}", layout))?;

        let mut values = Vec::with_capacity(layout.len());
        let mut at = 0;
        for field in layout {
            let w = field.width();
            values.push(field.decode(&raw[at..at + w]));
            at += w;
        }
        Ok(values)
    }

    pub fn read_exact(&mut self, n: usize, field: &str) -> Result<Vec<u8>> {
        Ok(self.take(n, field)?.to_vec())
    }

    pub fn read_u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    pub fn read_u16_be(&mut self, field: &str) -> Result<u16> {
        let b = self.take(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24_be(&mut self, field: &str) -> Result<u32> {
        let b = self.take(3, field)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_u32_be(&mut self, field: &str) -> Result<u32> {
        let b = self.take(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u32_le(&mut self, field: &str) -> Result<u32> {
        let b = self.take(4, field)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64_be(&mut self, field: &str) -> Result<u64> {
        let b = self.take(8, field)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(b);
        Ok(u64::from_be_bytes(word))
    }

    /// Label `[cursor, cursor + length)`, or `[cursor - |length|, cursor)`
    /// for a negative length. The cursor does not move.
    pub fn define_label(&mut self, name: &str, length: i64) {
        let range = if length >= 0 {
            self.pos..self.pos + length as usize
        } else {
            self.pos.saturating_sub(length.unsigned_abs() as usize)..self.pos
        };
        trace!(label = name, start = range.start, end = range.end, "define label");
        self.labels.push(Label {
            name: name.to_string(),
            range,
        });
    }

    /// All labels in definition order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Labels carrying `name`, in definition order.
    pub fn labels_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Label> + 'a {
        self.labels.iter().filter(move |l| l.name == name)
    }

    pub fn label_at(&self, name: &str, occurrence: Occurrence) -> Result<&Label> {
        let mut named = self.labels.iter().filter(|l| l.name == name);
        let found = match occurrence {
            Occurrence::First => named.next(),
            Occurrence::Last => named.last(),
            Occurrence::Nth(n) => named.nth(n),
        };
        found.ok_or_else(|| TagError::LabelNotFound {
            name: name.to_string(),
            occurrence,
        })
    }

    /// The last label defined under `name`. Earlier entries with the same
    /// name are not returned; see [`label_at`](Self::label_at).
    pub fn label(&self, name: &str) -> Result<&Label> {
        self.label_at(name, Occurrence::Last)
    }

    /// Bytes covered by the last label named `name`, clipped to the data.
    pub fn label_bytes(&self, name: &str) -> Result<&[u8]> {
        let range = self.label(name)?.range.clone();
        let end = range.end.min(self.data.len());
        let start = range.start.min(end);
        Ok(&self.data[start..end])
    }

    pub fn seek_to_label_at(
        &mut self,
        name: &str,
        occurrence: Occurrence,
        ret: RangeReturn,
    ) -> Result<usize> {
        let range = self.label_at(name, occurrence)?.range.clone();
        self.pos = range.start;
        Ok(match ret {
            RangeReturn::Length => range.len(),
            RangeReturn::End => range.end,
        })
    }

    /// Move the cursor to the start of the last label named `name`.
    pub fn seek_to_label(&mut self, name: &str, ret: RangeReturn) -> Result<usize> {
        self.seek_to_label_at(name, Occurrence::Last, ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> LabeledBuffer {
        LabeledBuffer::new(b"abcdef\0ghij".to_vec())
    }

    #[test]
    fn read_past_end_is_empty() {
        let mut buf = buffer();
        assert_eq!(buf.read(4), b"abcd");
        assert_eq!(buf.read(100), b"ef\0ghij");
        assert!(buf.read(5).is_empty());
        buf.seek(50, Whence::Start).unwrap();
        assert!(buf.read(1).is_empty());
        assert_eq!(buf.tell(), 50);
    }

    #[test]
    fn read_until_terminator() {
        let mut buf = buffer();
        assert_eq!(buf.read_until(0), b"abcdef");
        assert_eq!(buf.tell(), 7);
        assert_eq!(buf.read_until(0), b"ghij");
        assert_eq!(buf.tell(), buf.len() + 1);
        assert!(buf.read_until(0).is_empty());
    }

    #[test]
    fn seek_modes() {
        let mut buf = buffer();
        assert_eq!(buf.seek(3, Whence::Start).unwrap(), 3);
        assert_eq!(buf.seek(-10, Whence::Current).unwrap(), 0);
        assert_eq!(buf.seek(-2, Whence::End).unwrap(), 9);
        assert_eq!(buf.seek(-100, Whence::End).unwrap(), 0);
        assert!(matches!(
            buf.seek(-1, Whence::Start),
            Err(TagError::NegativeSeek { position: -1 })
        ));
    }

    #[test]
    fn unpack_mixed_layout() {
        let mut buf = LabeledBuffer::new(vec![
            b'I', b'D', b'3', 3, 0, 0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
        ]);
        let values = buf
            .unpack_fields(&[Field::Bytes(3), Field::U8, Field::U8, Field::U8, Field::U32Be])
            .unwrap();
        assert_eq!(values[0].as_bytes(), b"ID3");
        assert_eq!(values[1].as_u64(), 3);
        assert_eq!(values[4].as_u32(), 0x0102_0304);
        assert_eq!(buf.tell(), 10);

        let le = buf.unpack_fields(&[Field::U16Le]).unwrap();
        assert_eq!(le[0].as_u64(), 0x0605);
    }

    #[test]
    fn unpack_short_data_fails_without_moving() {
        let mut buf = LabeledBuffer::new(vec![1, 2, 3]);
        buf.seek(1, Whence::Start).unwrap();
        let err = buf.unpack_fields(&[Field::U32Be]).unwrap_err();
        assert!(matches!(
            err,
            TagError::MalformedLayout {
                offset: 1,
                needed: 4,
                available: 2,
                ..
            }
        ));
        assert_eq!(buf.tell(), 1);
        assert_eq!(buf.read_u16_be("pair").unwrap(), 0x0203);
    }

    #[test]
    fn labels_keep_every_definition() {
        let mut buf = buffer();
        buf.seek(1, Whence::Start).unwrap();
        buf.define_label("BLOCK", 2);
        buf.seek(8, Whence::Start).unwrap();
        buf.define_label("BLOCK", -3);
        assert_eq!(buf.tell(), 8);

        assert_eq!(buf.label("BLOCK").unwrap().range, 5..8);
        assert_eq!(buf.label_at("BLOCK", Occurrence::First).unwrap().range, 1..3);
        assert_eq!(buf.labels_named("BLOCK").count(), 2);
        assert_eq!(buf.label_bytes("BLOCK").unwrap(), b"f\0g");

        assert_eq!(buf.seek_to_label("BLOCK", RangeReturn::Length).unwrap(), 3);
        assert_eq!(buf.tell(), 5);
        let end = buf
            .seek_to_label_at("BLOCK", Occurrence::Nth(0), RangeReturn::End)
            .unwrap();
        assert_eq!((buf.tell(), end), (1, 3));
    }

    #[test]
    fn unknown_label_fails() {
        let mut buf = buffer();
        assert!(matches!(
            buf.seek_to_label("PICTURE", RangeReturn::Length),
            Err(TagError::LabelNotFound { .. })
        ));
        buf.define_label("PICTURE", 1);
        assert!(buf.label_at("PICTURE", Occurrence::Nth(1)).is_err());
    }

    #[test]
    fn found_label_outlives_the_lookup_name() {
        let mut buf = buffer();
        buf.define_label("FRAME 0", 2);
        buf.seek(4, Whence::Start).unwrap();
        buf.define_label("FRAME 1", 3);

        let label = {
            let name = format!("FRAME {}", 1);
            buf.label_at(&name, Occurrence::First).unwrap()
        };
        assert_eq!(label.range, 4..7);

        let length = buf
            .seek_to_label_at(&format!("FRAME {}", 0), Occurrence::Last, RangeReturn::Length)
            .unwrap();
        assert_eq!((buf.tell(), length), (0, 2));
    }
}
