// FLAC tag reader: walks the block chain once and decodes blocks on demand

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use super::metadata::{
    measure_tag_size, FlacMetadataBlockHeader, FlacMetadataBlockType, FLAC_SIGNATURE,
};
use super::picture::FlacPicture;
use super::streaminfo::StreamInfo;
use super::vorbis::VorbisComment;
use crate::error::{Result, TagError};
use crate::utils::buffer::{LabeledBuffer, Occurrence, RangeReturn, Whence};
use crate::utils::io::read_range;

/// A decoded metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlacBlock {
    StreamInfo(StreamInfo),
    /// Length of the padding run.
    Padding(usize),
    Application { id: Vec<u8>, data: Vec<u8> },
    SeekTable(Vec<u8>),
    VorbisComment(VorbisComment),
    CueSheet(Vec<u8>),
    Picture(FlacPicture),
}

/// Decoder for one block body: the cursor sits at the body start and the
/// second argument is the body length.
pub type BlockDecoder = fn(&mut LabeledBuffer, usize) -> Result<FlacBlock>;

fn decode_stream_info(buffer: &mut LabeledBuffer, _: usize) -> Result<FlacBlock> {
    StreamInfo::decode(buffer).map(FlacBlock::StreamInfo)
}

fn decode_padding(_: &mut LabeledBuffer, length: usize) -> Result<FlacBlock> {
    Ok(FlacBlock::Padding(length))
}

fn decode_application(buffer: &mut LabeledBuffer, length: usize) -> Result<FlacBlock> {
    let id = buffer.read_exact(4, "APPLICATION id")?;
    let data = buffer.read(length.saturating_sub(4)).to_vec();
    Ok(FlacBlock::Application { id, data })
}

fn decode_seek_table(buffer: &mut LabeledBuffer, length: usize) -> Result<FlacBlock> {
    Ok(FlacBlock::SeekTable(buffer.read(length).to_vec()))
}

fn decode_vorbis_comment(buffer: &mut LabeledBuffer, _: usize) -> Result<FlacBlock> {
    VorbisComment::decode(buffer).map(FlacBlock::VorbisComment)
}

fn decode_cue_sheet(buffer: &mut LabeledBuffer, length: usize) -> Result<FlacBlock> {
    Ok(FlacBlock::CueSheet(buffer.read(length).to_vec()))
}

fn decode_picture(buffer: &mut LabeledBuffer, _: usize) -> Result<FlacBlock> {
    FlacPicture::decode(buffer).map(FlacBlock::Picture)
}

impl FlacMetadataBlockType {
    /// Decoder for bodies of this type.
    pub fn decoder(self) -> BlockDecoder {
        match self {
            FlacMetadataBlockType::StreamInfo => decode_stream_info,
            FlacMetadataBlockType::Padding => decode_padding,
            FlacMetadataBlockType::Application => decode_application,
            FlacMetadataBlockType::SeekTable => decode_seek_table,
            FlacMetadataBlockType::VorbisComment => decode_vorbis_comment,
            FlacMetadataBlockType::CueSheet => decode_cue_sheet,
            FlacMetadataBlockType::Picture => decode_picture,
        }
    }
}

/// One block met during traversal.
#[derive(Debug, Clone, Copy)]
pub struct BlockEntry {
    pub block_type: FlacMetadataBlockType,
    pub is_last: bool,
    /// Offset of the 4-byte header within the tag.
    pub offset: usize,
    pub length: usize,
    /// How many blocks of the same type came before this one.
    pub occurrence: usize,
    pub decoder: BlockDecoder,
}

/// An in-memory FLAC tag with its block index.
#[derive(Debug)]
pub struct FlacContext {
    buffer: LabeledBuffer,
    size: usize,
    blocks: Vec<BlockEntry>,
}

impl FlacContext {
    /// Index the tag at the start of `data`. Bytes after the last block are
    /// kept but never read.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if !data.starts_with(FLAC_SIGNATURE) {
            return Err(TagError::FormatMismatch {
                expected: "fLaC",
                found: data.iter().take(4).copied().collect(),
            });
        }

        let mut context = FlacContext {
            buffer: LabeledBuffer::new(data),
            size: 0,
            blocks: Vec::new(),
        };
        context.create_labels()?;
        Ok(context)
    }

    /// Load just the tag region of a FLAC file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TagError::io(path, e))?;
        let size = match measure_tag_size(&mut BufReader::new(file)) {
            Ok(size) => size,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                let found = read_range(path, 0, 4)?;
                return Err(TagError::FormatMismatch {
                    expected: "fLaC",
                    found,
                });
            }
            Err(e) => return Err(TagError::io(path, e)),
        };
        debug!(path = %path.display(), size, "loading FLAC tag");
        Self::from_bytes(read_range(path, 0, size)?)
    }

    fn create_labels(&mut self) -> Result<()> {
        self.buffer.seek(FLAC_SIGNATURE.len() as i64, Whence::Start)?;
        loop {
            let offset = self.buffer.tell();
            let header =
                FlacMetadataBlockHeader::from_word(self.buffer.read_u32_be("block header")?);
            let block_type = FlacMetadataBlockType::from_code(header.type_code, offset)?;
            let length = header.length as usize;

            self.buffer.define_label(block_type.name(), length as i64);
            let occurrence = self
                .blocks
                .iter()
                .filter(|b| b.block_type == block_type)
                .count();
            self.blocks.push(BlockEntry {
                block_type,
                is_last: header.is_last,
                offset,
                length,
                occurrence,
                decoder: block_type.decoder(),
            });
            debug!(
                block = block_type.name(),
                offset,
                length,
                last = header.is_last,
                "indexed FLAC block"
            );

            self.buffer.seek(length as i64, Whence::Current)?;
            if header.is_last {
                break;
            }
        }
        self.size = self.buffer.tell();
        Ok(())
    }

    /// Byte size of the whole tag, magic included. Audio starts here.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn blocks(&self) -> &[BlockEntry] {
        &self.blocks
    }

    /// Block type names in chain order, repeats included.
    pub fn block_names(&self) -> Vec<&'static str> {
        self.blocks.iter().map(|b| b.block_type.name()).collect()
    }

    pub fn has_block(&self, block_type: FlacMetadataBlockType) -> bool {
        self.blocks.iter().any(|b| b.block_type == block_type)
    }

    /// Seek to a block body, run `decode` on it and check the decoder stayed
    /// inside the body. Overruns fail with `MalformedLayout`.
    fn decode_labeled<T>(
        &mut self,
        block_type: FlacMetadataBlockType,
        occurrence: Occurrence,
        decode: impl FnOnce(&mut LabeledBuffer, usize) -> Result<T>,
    ) -> Result<T> {
        let name = block_type.name();
        let end = self
            .buffer
            .seek_to_label_at(name, occurrence, RangeReturn::End)?;
        let start = self.buffer.tell();
        let value = decode(&mut self.buffer, end - start)?;

        let consumed = self.buffer.tell() - start;
        if consumed > end - start {
            return Err(TagError::MalformedLayout {
                field: format!("{} body", name),
                offset: start,
                needed: consumed,
                available: end - start,
            });
        }
        Ok(value)
    }

    /// Decode the `index`-th block of the chain.
    pub fn decode_block(&mut self, index: usize) -> Result<FlacBlock> {
        let entry = *self.blocks.get(index).ok_or_else(|| TagError::LabelNotFound {
            name: "block".to_string(),
            occurrence: Occurrence::Nth(index),
        })?;
        self.decode_labeled(
            entry.block_type,
            Occurrence::Nth(entry.occurrence),
            entry.decoder,
        )
    }

    /// Decode the last block of `block_type`, the one its label name resolves to.
    pub fn decode_last(&mut self, block_type: FlacMetadataBlockType) -> Result<FlacBlock> {
        self.decode_labeled(block_type, Occurrence::Last, block_type.decoder())
    }

    pub fn stream_info(&mut self) -> Result<StreamInfo> {
        self.decode_labeled(FlacMetadataBlockType::StreamInfo, Occurrence::Last, |b, _| {
            StreamInfo::decode(b)
        })
    }

    pub fn vorbis_comment(&mut self) -> Result<VorbisComment> {
        self.decode_labeled(FlacMetadataBlockType::VorbisComment, Occurrence::Last, |b, _| {
            VorbisComment::decode(b)
        })
    }

    /// The last PICTURE block.
    pub fn picture(&mut self) -> Result<FlacPicture> {
        self.decode_labeled(FlacMetadataBlockType::Picture, Occurrence::Last, |b, _| {
            FlacPicture::decode(b)
        })
    }

    /// Every PICTURE block, in chain order.
    pub fn pictures(&mut self) -> Result<Vec<FlacPicture>> {
        let count = self
            .buffer
            .labels_named(FlacMetadataBlockType::Picture.name())
            .count();
        (0..count)
            .map(|n| {
                self.decode_labeled(FlacMetadataBlockType::Picture, Occurrence::Nth(n), |b, _| {
                    FlacPicture::decode(b)
                })
            })
            .collect()
    }

    /// Raw blocks (header and body) in chain order, selected by type, or by
    /// every other type when `invert` is set.
    ///
    /// Copied headers have their last-block flag cleared so the blocks can be
    /// handed straight to [`assemble_tag`](super::metadata::assemble_tag).
    pub fn block_copy(&self, types: &[FlacMetadataBlockType], invert: bool) -> Vec<Vec<u8>> {
        let data = self.buffer.as_bytes();
        self.blocks
            .iter()
            .filter(|b| types.contains(&b.block_type) != invert)
            .map(|b| {
                let end = (b.offset + FlacMetadataBlockHeader::HEADER_SIZE + b.length)
                    .min(data.len());
                let mut raw = data[b.offset..end].to_vec();
                raw[0] &= 0x7F;
                raw
            })
            .collect()
    }
}
