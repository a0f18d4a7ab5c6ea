// FLAC metadata handling module

pub mod context;
pub mod metadata;
pub mod picture;
pub mod streaminfo;
pub mod vorbis;

pub use context::{BlockEntry, FlacBlock, FlacContext};
pub use metadata::{assemble_tag, FlacMetadataBlockHeader, FlacMetadataBlockType, FLAC_SIGNATURE};
pub use picture::{build_picture_block, FlacPicture};
pub use streaminfo::{build_stream_info_block, StreamInfo};
pub use vorbis::{build_vorbis_comment_block, VorbisComment};
