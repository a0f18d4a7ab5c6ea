//! Property-based tests for the tag codecs.

use proptest::prelude::*;
use retag::flac::{build_vorbis_comment_block, VorbisComment};
use retag::id3::{build_text_frame, synchsafe_to_u32, u32_to_synchsafe, TextFrame};
use retag::LabeledBuffer;

proptest! {
    /// Sync-safe encoding round-trips every 28-bit value and never sets a high bit.
    #[test]
    fn synchsafe_roundtrip(n in 0u32..(1 << 28)) {
        let word = u32_to_synchsafe(n);
        prop_assert_eq!(word & 0x8080_8080, 0);
        prop_assert_eq!(synchsafe_to_u32(word), n);
    }

    /// Comments without repeated keys come back in order and unchanged.
    #[test]
    fn vorbis_comment_roundtrip(
        fields in prop::collection::btree_map("[A-Z]{1,8}", "[ -~]{0,24}", 0..8)
    ) {
        let block = build_vorbis_comment_block(&fields).unwrap();
        let mut buffer = LabeledBuffer::new(block);
        buffer.read(4);
        let comment = VorbisComment::decode(&mut buffer).unwrap();

        let expected: Vec<(String, String)> = fields.clone().into_iter().collect();
        prop_assert_eq!(comment.comments, expected);
        prop_assert_eq!(comment.vendor_string, "Lavf58.29.100");
    }

    /// Text frames carry any printable text through UTF-16.
    #[test]
    fn text_frame_roundtrip(text in "\\PC{0,40}") {
        let frame = build_text_frame("TIT2", &text).unwrap();
        let mut buffer = LabeledBuffer::new(frame[10..].to_vec());
        let decoded = TextFrame::decode(&mut buffer, frame.len() - 10).unwrap();
        prop_assert_eq!(decoded.encoding, 1);
        prop_assert_eq!(decoded.text, text);
    }
}

