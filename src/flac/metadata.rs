// FLAC metadata block headers and tag assembly

use std::io::{Read, Seek, SeekFrom};

use tracing::debug;

use crate::error::{Result, TagError};

/// FLAC file signature
pub const FLAC_SIGNATURE: &[u8; 4] = b"fLaC";

const LAST_BLOCK_FLAG: u8 = 0x80;

/// FLAC metadata block types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlacMetadataBlockType {
    StreamInfo = 0,
    Padding = 1,
    Application = 2,
    SeekTable = 3,
    VorbisComment = 4,
    CueSheet = 5,
    Picture = 6,
}

impl FlacMetadataBlockType {
    pub const ALL: [FlacMetadataBlockType; 7] = [
        FlacMetadataBlockType::StreamInfo,
        FlacMetadataBlockType::Padding,
        FlacMetadataBlockType::Application,
        FlacMetadataBlockType::SeekTable,
        FlacMetadataBlockType::VorbisComment,
        FlacMetadataBlockType::CueSheet,
        FlacMetadataBlockType::Picture,
    ];

    /// Map a 7-bit type code. `offset` locates the header for the error.
    pub fn from_code(code: u8, offset: usize) -> Result<Self> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(TagError::UnknownBlockType { code, offset })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Label name used for blocks of this type.
    pub fn name(self) -> &'static str {
        match self {
            FlacMetadataBlockType::StreamInfo => "STREAMINFO",
            FlacMetadataBlockType::Padding => "PADDING",
            FlacMetadataBlockType::Application => "APPLICATION",
            FlacMetadataBlockType::SeekTable => "SEEKTABLE",
            FlacMetadataBlockType::VorbisComment => "VORBIS_COMMENT",
            FlacMetadataBlockType::CueSheet => "CUESHEET",
            FlacMetadataBlockType::Picture => "PICTURE",
        }
    }
}

/// FLAC metadata block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlacMetadataBlockHeader {
    pub is_last: bool,
    /// Raw 7-bit type code, not yet validated.
    pub type_code: u8,
    pub length: u32,
}

impl FlacMetadataBlockHeader {
    pub const HEADER_SIZE: usize = 4;
    /// Largest body the 24-bit length field can describe.
    pub const MAX_LENGTH: usize = 0x00FF_FFFF;

    /// Split a big-endian header word into flag, type code and length.
    pub fn from_word(word: u32) -> Self {
        FlacMetadataBlockHeader {
            is_last: word >> 31 == 1,
            type_code: ((word >> 24) & 0x7F) as u8,
            length: word & 0x00FF_FFFF,
        }
    }

    pub fn to_word(self) -> u32 {
        let flag = if self.is_last { 1 << 31 } else { 0 };
        flag | ((self.type_code as u32 & 0x7F) << 24) | (self.length & 0x00FF_FFFF)
    }

    /// Read FLAC metadata block header from reader
    pub fn read<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut buffer = [0u8; Self::HEADER_SIZE];
        reader.read_exact(&mut buffer)?;
        Ok(Self::from_word(u32::from_be_bytes(buffer)))
    }
}

/// Prefix `body` with a block header of type `block_type`. The last-block
/// flag is left clear.
///
/// Bodies longer than [`FlacMetadataBlockHeader::MAX_LENGTH`] fail with
/// `BlockTooLarge`.
pub fn wrap_block(block_type: FlacMetadataBlockType, body: &[u8]) -> Result<Vec<u8>> {
    if body.len() > FlacMetadataBlockHeader::MAX_LENGTH {
        return Err(TagError::BlockTooLarge {
            block: block_type.name().to_string(),
            length: body.len(),
            max: FlacMetadataBlockHeader::MAX_LENGTH,
        });
    }
    let header = FlacMetadataBlockHeader {
        is_last: false,
        type_code: block_type.code(),
        length: body.len() as u32,
    };
    let mut block = Vec::with_capacity(FlacMetadataBlockHeader::HEADER_SIZE + body.len());
    block.extend_from_slice(&header.to_word().to_be_bytes());
    block.extend_from_slice(body);
    Ok(block)
}

/// Walk the block headers of a FLAC stream and return the byte size of the
/// whole tag: magic plus every block up to and including the last one.
pub fn measure_tag_size<R: Read + Seek>(reader: &mut R) -> std::io::Result<u64> {
    let mut signature = [0u8; 4];
    reader.read_exact(&mut signature)?;
    if &signature != FLAC_SIGNATURE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "missing fLaC signature",
        ));
    }

    let mut size = FLAC_SIGNATURE.len() as u64;
    loop {
        let header = FlacMetadataBlockHeader::read(reader)?;
        reader.seek(SeekFrom::Current(header.length as i64))?;
        size += FlacMetadataBlockHeader::HEADER_SIZE as u64 + header.length as u64;
        if header.is_last {
            return Ok(size);
        }
    }
}

/// Concatenate `fLaC` and `blocks` in the order given, then set the
/// last-block flag on the final block, whatever its type.
pub fn assemble_tag<B: AsRef<[u8]>>(blocks: &[B]) -> Result<Vec<u8>> {
    match blocks.last() {
        Some(last) if !last.as_ref().is_empty() => {}
        _ => return Err(TagError::EmptyTag),
    }

    let total: usize = blocks.iter().map(|b| b.as_ref().len()).sum();
    let mut tag = Vec::with_capacity(FLAC_SIGNATURE.len() + total);
    tag.extend_from_slice(FLAC_SIGNATURE);

    let mut last_start = tag.len();
    for block in blocks {
        last_start = tag.len();
        tag.extend_from_slice(block.as_ref());
    }
    tag[last_start] |= LAST_BLOCK_FLAG;

    debug!(blocks = blocks.len(), bytes = tag.len(), "assembled FLAC tag");
    Ok(tag)
}
