//! End-to-end tag rebuilds on real files: build a tag, prepend it to audio
//! bytes, index it back and splice a new tag in front of the same audio.

use retag::flac::metadata::wrap_block;
use retag::flac::{
    assemble_tag, build_picture_block, build_stream_info_block, build_vorbis_comment_block,
    StreamInfo,
};
use retag::id3::{self, build_apic_frame, build_text_frames};
use retag::utils::io::{copy_byte_range, read_all_bytes, write_bytes};
use retag::{
    ExistsPolicy, FileSource, FlacContext, FlacMetadataBlockType, Id3Context, ImageFormat,
    PictureType, TagError,
};

const FLAC_AUDIO: &[u8] = b"\xFF\xF8AUDIO-FRAMES";
const MP3_AUDIO: &[u8] = b"\xFF\xFBMPEG-FRAMES";

fn stream_info() -> StreamInfo {
    StreamInfo {
        min_block_size: 4096,
        max_block_size: 4096,
        min_frame_size: 14,
        max_frame_size: 8192,
        sample_rate: 44100,
        channels_minus_one: 1,
        bits_per_sample_minus_one: 15,
        total_samples: 1_234_567,
        md5: [7; 16],
    }
}

#[test]
fn flac_tag_is_rebuilt_in_front_of_the_audio() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("in.flac");
    let cover = dir.path().join("cover.png");
    let output = dir.path().join("out.flac");

    let tag = assemble_tag(&[
        build_stream_info_block(&stream_info()).unwrap(),
        wrap_block(FlacMetadataBlockType::Padding, &[0; 16]).unwrap(),
        build_vorbis_comment_block([("TITLE", "Old"), ("ARTIST", "Band"), ("TITLE", "Alt")])
            .unwrap(),
        build_picture_block(&vec![1, 2, 3], PictureType::CoverBack, ImageFormat::Jpeg).unwrap(),
    ])
    .unwrap();
    write_bytes(&source, &[tag.as_slice(), FLAC_AUDIO], ExistsPolicy::Fail).unwrap();
    write_bytes(&cover, &[b"\x89PNG".as_slice()], ExistsPolicy::Fail).unwrap();

    let mut context = FlacContext::open(&source).unwrap();
    assert_eq!(context.size(), tag.len());
    assert_eq!(
        context.block_names(),
        vec!["STREAMINFO", "PADDING", "VORBIS_COMMENT", "PICTURE"]
    );
    assert_eq!(context.stream_info().unwrap(), stream_info());
    let comment = context.vorbis_comment().unwrap();
    assert_eq!(comment.get("title").map(String::as_str), Some("Old"));
    assert_eq!(comment.comments[2].1, "Alt [Nondefault]");
    assert_eq!(context.picture().unwrap().data, vec![1, 2, 3]);

    let mut blocks = context.block_copy(&[FlacMetadataBlockType::StreamInfo], false);
    blocks.push(build_vorbis_comment_block([("TITLE", "New")]).unwrap());
    blocks.push(
        build_picture_block(&FileSource::new(&cover), PictureType::CoverFront, ImageFormat::Png)
            .unwrap(),
    );
    let rebuilt = assemble_tag(&blocks).unwrap();

    write_bytes(&output, &[&rebuilt], ExistsPolicy::Fail).unwrap();
    let copied = copy_byte_range(
        &source,
        &output,
        context.size() as u64,
        None,
        ExistsPolicy::Append,
    )
    .unwrap();
    assert_eq!(copied, FLAC_AUDIO.len() as u64);

    let written = read_all_bytes(&output).unwrap();
    assert!(written.ends_with(FLAC_AUDIO));
    assert_eq!(written.len(), rebuilt.len() + FLAC_AUDIO.len());

    let mut context = FlacContext::open(&output).unwrap();
    assert_eq!(
        context.block_names(),
        vec!["STREAMINFO", "VORBIS_COMMENT", "PICTURE"]
    );
    assert_eq!(context.stream_info().unwrap(), stream_info());
    assert_eq!(
        context.vorbis_comment().unwrap().comments,
        vec![("TITLE".to_string(), "New".to_string())]
    );
    let picture = context.picture().unwrap();
    assert_eq!(picture.mime_type, "image/png");
    assert_eq!(picture.data, b"\x89PNG");
}

#[test]
fn id3_tag_is_rebuilt_in_front_of_the_audio() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("in.mp3");
    let output = dir.path().join("out.mp3");

    let mut frames = build_text_frames([("TIT2", "Title"), ("TPE1", "Artist")]).unwrap();
    frames.push(
        build_apic_frame(&vec![0xFF, 0xD8], PictureType::CoverFront, ImageFormat::Jpeg).unwrap(),
    );
    let tag = id3::assemble_tag(&frames).unwrap();
    write_bytes(&source, &[tag.as_slice(), MP3_AUDIO], ExistsPolicy::Fail).unwrap();

    let mut context = Id3Context::open(&source).unwrap();
    assert_eq!(context.size(), tag.len());
    assert_eq!(context.version(), (3, 0));
    assert_eq!(context.frame_ids(), vec!["TIT2", "TPE1", "APIC"]);
    assert_eq!(context.text_frame("TIT2").unwrap(), "Title");
    assert_eq!(context.text_frame("TPE1").unwrap(), "Artist");
    let apic = context.apic().unwrap();
    assert_eq!(apic.mime_type, "image/jpeg");
    assert_eq!(apic.data, vec![0xFF, 0xD8]);
    assert!(matches!(
        context.comment(),
        Err(TagError::LabelNotFound { .. })
    ));

    let rebuilt = id3::assemble_tag(&build_text_frames([("TALB", "Album")]).unwrap()).unwrap();
    write_bytes(&output, &[&rebuilt], ExistsPolicy::Fail).unwrap();
    copy_byte_range(
        &source,
        &output,
        context.size() as u64,
        None,
        ExistsPolicy::Append,
    )
    .unwrap();

    let mut context = Id3Context::open(&output).unwrap();
    assert_eq!(context.frame_ids(), vec!["TALB"]);
    assert_eq!(context.text_frame("TALB").unwrap(), "Album");
    assert!(read_all_bytes(&output).unwrap().ends_with(MP3_AUDIO));
}

#[test]
fn opening_the_wrong_container_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.bin");
    write_bytes(&path, &[b"RIFF----WAVE".as_slice()], ExistsPolicy::Fail).unwrap();

    assert!(matches!(
        FlacContext::open(&path),
        Err(TagError::FormatMismatch { expected: "fLaC", .. })
    ));
    assert!(matches!(
        Id3Context::open(&path),
        Err(TagError::FormatMismatch { .. })
    ));
}
