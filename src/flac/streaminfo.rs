// STREAMINFO block implementation

use serde::Serialize;

use super::metadata::{wrap_block, FlacMetadataBlockType};
use crate::error::Result;
use crate::utils::buffer::{Field, LabeledBuffer, Whence};

/// Size of a STREAMINFO body in bytes.
pub const STREAMINFO_SIZE: usize = 34;

/// Stream parameters, in on-disk order.
///
/// `channels_minus_one` and `bits_per_sample_minus_one` are stored as
/// written; use [`channels`](Self::channels) and
/// [`bits_per_sample`](Self::bits_per_sample) for the real values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    /// 24 bits. Zero means unknown.
    pub min_frame_size: u32,
    /// 24 bits. Zero means unknown.
    pub max_frame_size: u32,
    /// 20 bits, in Hz.
    pub sample_rate: u32,
    /// 3 bits.
    pub channels_minus_one: u8,
    /// 5 bits.
    pub bits_per_sample_minus_one: u8,
    /// 36 bits of inter-channel samples. Zero means unknown.
    pub total_samples: u64,
    pub md5: [u8; 16],
}

impl StreamInfo {
    /// Decode the 34-byte body at the buffer cursor.
    pub fn decode(buffer: &mut LabeledBuffer) -> Result<Self> {
        let head = buffer.unpack_fields(&[Field::U16Be, Field::U16Be, Field::U32Be])?;
        // the two 24-bit frame sizes straddle a 32-bit word, so read the
        // second one from a word that starts two bytes back
        buffer.seek(-2, Whence::Current)?;
        let max_frame_word = buffer.read_u32_be("STREAMINFO max frame size")?;
        let packed = buffer.read_u64_be("STREAMINFO sample layout")?;
        let md5 = buffer.read_exact(16, "STREAMINFO md5")?;

        let mut digest = [0u8; 16];
        digest.copy_from_slice(&md5);

        Ok(StreamInfo {
            min_block_size: head[0].as_u64() as u16,
            max_block_size: head[1].as_u64() as u16,
            min_frame_size: head[2].as_u32() >> 8,
            max_frame_size: max_frame_word & 0x00FF_FFFF,
            sample_rate: (packed >> 44) as u32,
            channels_minus_one: ((packed >> 41) & 0x07) as u8,
            bits_per_sample_minus_one: ((packed >> 36) & 0x1F) as u8,
            total_samples: packed & 0x0F_FFFF_FFFF,
            md5: digest,
        })
    }

    pub fn channels(&self) -> u8 {
        self.channels_minus_one + 1
    }

    pub fn bits_per_sample(&self) -> u8 {
        self.bits_per_sample_minus_one + 1
    }

    /// Encode back into the 34-byte body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(STREAMINFO_SIZE);
        out.extend_from_slice(&self.min_block_size.to_be_bytes());
        out.extend_from_slice(&self.max_block_size.to_be_bytes());
        out.extend_from_slice(&self.min_frame_size.to_be_bytes()[1..]);
        out.extend_from_slice(&self.max_frame_size.to_be_bytes()[1..]);

        let packed = ((self.sample_rate as u64 & 0x0F_FFFF) << 44)
            | ((self.channels_minus_one as u64 & 0x07) << 41)
            | ((self.bits_per_sample_minus_one as u64 & 0x1F) << 36)
            | (self.total_samples & 0x0F_FFFF_FFFF);
        out.extend_from_slice(&packed.to_be_bytes());
        out.extend_from_slice(&self.md5);
        out
    }
}

/// Build a complete STREAMINFO block (header included).
pub fn build_stream_info_block(info: &StreamInfo) -> Result<Vec<u8>> {
    wrap_block(FlacMetadataBlockType::StreamInfo, &info.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cd_quality() -> StreamInfo {
        StreamInfo {
            min_block_size: 4096,
            max_block_size: 4096,
            min_frame_size: 14,
            max_frame_size: 0x00AB_CDEF,
            sample_rate: 44100,
            channels_minus_one: 1,
            bits_per_sample_minus_one: 15,
            total_samples: 12345,
            md5: [0xA5; 16],
        }
    }

    #[test]
    fn decodes_packed_fields() {
        let body = cd_quality().to_bytes();
        assert_eq!(body.len(), STREAMINFO_SIZE);

        let mut buffer = LabeledBuffer::new(body);
        let info = StreamInfo::decode(&mut buffer).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels(), 2);
        assert_eq!(info.bits_per_sample(), 16);
        assert_eq!(info.total_samples, 12345);
        assert_eq!(info.min_frame_size, 14);
        assert_eq!(info.max_frame_size, 0x00AB_CDEF);
        assert_eq!(buffer.tell(), STREAMINFO_SIZE);
    }

    #[test]
    fn hand_packed_bytes() {
        // 44100 Hz = 0x0AC44, stereo, 16 bit, 12345 = 0x3039 samples
        let mut body = vec![0x10, 0x00, 0x10, 0x00, 0, 0, 0, 0, 0, 0];
        body.extend_from_slice(&[0x0A, 0xC4, 0x42, 0xF0, 0x00, 0x00, 0x30, 0x39]);
        body.extend_from_slice(&[0; 16]);

        let info = StreamInfo::decode(&mut LabeledBuffer::new(body)).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels_minus_one, 1);
        assert_eq!(info.bits_per_sample_minus_one, 15);
        assert_eq!(info.total_samples, 12345);
    }

    #[test]
    fn truncated_body_is_malformed() {
        let mut buffer = LabeledBuffer::new(vec![0; 20]);
        assert!(StreamInfo::decode(&mut buffer).is_err());
    }

    #[test]
    fn block_has_type_zero_header() {
        let block = build_stream_info_block(&cd_quality()).unwrap();
        assert_eq!(&block[..4], &[0x00, 0x00, 0x00, 34]);
    }
}
