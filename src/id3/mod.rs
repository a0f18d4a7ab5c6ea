// ID3v2 metadata handling module

pub mod frames;
pub mod v2;

pub use frames::{
    assemble_tag, build_apic_frame, build_text_frame, build_text_frames, frame_ids, ApicFrame,
    CommentFrame, Id3Frame, TextFrame,
};
pub use v2::{
    synchsafe_size, synchsafe_to_u32, u32_to_synchsafe, FrameEntry, Id3Context, Id3v2Header,
    ID3_SIGNATURE, MAX_SYNCHSAFE,
};
