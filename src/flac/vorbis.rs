// VORBIS_COMMENT implementation for FLAC

use serde::Serialize;

use super::metadata::{wrap_block, FlacMetadataBlockType};
use crate::error::{Result, TagError};
use crate::utils::buffer::LabeledBuffer;

/// Vendor string written into rebuilt comment blocks.
pub const DEFAULT_VENDOR: &str = "Lavf58.29.100";

/// Suffix appended to every repeat of an already seen key.
pub const NONDEFAULT_SUFFIX: &str = " [Nondefault]";

/// Vorbis comment structure
///
/// Entries keep their on-disk order. When a key repeats, the first value is
/// kept as-is and each later value carries [`NONDEFAULT_SUFFIX`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct VorbisComment {
    pub vendor_string: String,
    pub comments: Vec<(String, String)>,
}

fn utf8(bytes: Vec<u8>, field: &'static str) -> Result<String> {
    String::from_utf8(bytes).map_err(|source| TagError::InvalidText { field, source })
}

impl VorbisComment {
    /// Decode a comment block body starting at the buffer cursor.
    pub fn decode(buffer: &mut LabeledBuffer) -> Result<Self> {
        let vendor_length = buffer.read_u32_le("VORBIS_COMMENT vendor length")? as usize;
        let vendor_string = utf8(
            buffer.read_exact(vendor_length, "VORBIS_COMMENT vendor")?,
            "VORBIS_COMMENT vendor",
        )?;

        let comment_count = buffer.read_u32_le("VORBIS_COMMENT count")? as usize;
        let mut comment = VorbisComment {
            vendor_string,
            comments: Vec::with_capacity(comment_count.min(1024)),
        };
        for _ in 0..comment_count {
            let length = buffer.read_u32_le("VORBIS_COMMENT entry length")? as usize;
            let entry = utf8(
                buffer.read_exact(length, "VORBIS_COMMENT entry")?,
                "VORBIS_COMMENT entry",
            )?;
            let (field, value) = entry
                .split_once('=')
                .ok_or_else(|| TagError::MalformedComment {
                    entry: entry.clone(),
                })?;
            comment.push(field, value);
        }
        Ok(comment)
    }

    /// Append an entry, applying the repeated-key suffix.
    pub fn push(&mut self, field: &str, value: &str) {
        let value = if self.comments.iter().any(|(f, _)| f == field) {
            format!("{}{}", value, NONDEFAULT_SUFFIX)
        } else {
            value.to_string()
        };
        self.comments.push((field.to_string(), value));
    }

    /// First value stored under `field` (ASCII case-insensitive).
    pub fn get(&self, field: &str) -> Option<&String> {
        self.comments
            .iter()
            .find(|(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    }

    /// Every value stored under `field`, first one included.
    pub fn get_all<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.comments
            .iter()
            .filter(move |(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    }

    /// Entries whose key was seen for the first time, in order.
    pub fn first_values(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.comments
            .iter()
            .enumerate()
            .filter(|(i, (f, _))| !self.comments[..*i].iter().any(|(g, _)| g == f))
            .map(|(_, (f, v))| (f.as_str(), v.as_str()))
    }
}

/// Build a complete VORBIS_COMMENT block (header included) from
/// `key=value` pairs, in iteration order. The last-block flag is left clear.
pub fn build_vorbis_comment_block<I, K, V>(comments: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let entries: Vec<String> = comments
        .into_iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect();

    let mut body = Vec::new();
    body.extend_from_slice(&(DEFAULT_VENDOR.len() as u32).to_le_bytes());
    body.extend_from_slice(DEFAULT_VENDOR.as_bytes());
    body.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in &entries {
        body.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        body.extend_from_slice(entry.as_bytes());
    }
    wrap_block(FlacMetadataBlockType::VorbisComment, &body)
}
