//! Retag - metadata tag reading and rebuilding for FLAC and MP3 (ID3v2) files.
//!
//! Readers index the tag region of a file once and decode individual blocks or
//! frames on demand:
//!
//! ```no_run
//! use retag::FlacContext;
//!
//! let mut flac = FlacContext::open("song.flac")?;
//! println!("{:?}", flac.block_names());
//! println!("{} Hz", flac.stream_info()?.sample_rate);
//! # Ok::<(), retag::TagError>(())
//! ```
//!
//! Writers build raw blocks or frames from typed values and assemble them into
//! a complete tag that can be spliced in front of the original audio with
//! [`utils::io::copy_byte_range`].

pub mod error;
pub mod flac;
pub mod id3;
pub mod picture;
pub mod utils;

pub use error::{Result, TagError};
pub use flac::{FlacContext, FlacMetadataBlockType, FlacPicture, StreamInfo, VorbisComment};
pub use id3::{ApicFrame, CommentFrame, Id3Context};
pub use picture::{ImageFormat, PictureType};
pub use utils::{ByteSource, ExistsPolicy, FileSource, LabeledBuffer, Occurrence, RangeReturn, Whence};
