// CLI command implementations
use anyhow::{bail, ensure, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use retag::flac::{self, build_picture_block, build_vorbis_comment_block, FLAC_SIGNATURE};
use retag::id3::{self, build_apic_frame, build_text_frames, frames::is_text_frame, ID3_SIGNATURE};
use retag::picture::extension_for_mime;
use retag::utils::io::{copy_byte_range, read_range, write_bytes};
use retag::{
    ExistsPolicy, FileSource, FlacContext, FlacMetadataBlockType, Id3Context, ImageFormat,
    PictureType,
};

use super::output::OutputFormatter;

/// Tag container found at the start of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFormat {
    Flac,
    Id3v2,
}

impl TagFormat {
    /// Sniff the leading magic bytes; `None` for anything else.
    pub fn detect(path: &Path) -> Result<Option<Self>> {
        let head = read_range(path, 0, 4)?;
        Ok(if head.starts_with(FLAC_SIGNATURE) {
            Some(TagFormat::Flac)
        } else if head.starts_with(ID3_SIGNATURE) {
            Some(TagFormat::Id3v2)
        } else {
            None
        })
    }
}

/// An embedded picture, whichever container it came from.
struct Cover {
    picture_type: PictureType,
    mime_type: String,
    description: String,
    data: Vec<u8>,
}

impl Cover {
    fn to_json(&self, include_data: bool) -> Value {
        let mut value = json!({
            "type": self.picture_type.code(),
            "type_description": self.picture_type.description(),
            "mime_type": self.mime_type,
            "description": self.description,
            "size": self.data.len(),
        });
        if include_data {
            value["data"] = Value::String(BASE64.encode(&self.data));
        }
        value
    }

    fn format(&self) -> ImageFormat {
        if self.mime_type == ImageFormat::Png.mime_type() {
            ImageFormat::Png
        } else {
            ImageFormat::Jpeg
        }
    }
}

fn flac_covers(context: &mut FlacContext) -> Result<Vec<Cover>> {
    Ok(context
        .pictures()?
        .into_iter()
        .map(|p| Cover {
            picture_type: p.picture_type,
            mime_type: p.mime_type,
            description: p.description,
            data: p.data,
        })
        .collect())
}

fn id3_covers(context: &mut Id3Context) -> Result<Vec<Cover>> {
    Ok(context
        .apics()?
        .into_iter()
        .map(|p| Cover {
            picture_type: p.picture_type,
            mime_type: p.mime_type,
            description: p.description,
            data: p.data,
        })
        .collect())
}

fn load_covers(path: &Path) -> Result<Vec<Cover>> {
    match TagFormat::detect(path)? {
        Some(TagFormat::Flac) => flac_covers(&mut FlacContext::open(path)?),
        Some(TagFormat::Id3v2) => id3_covers(&mut Id3Context::open(path)?),
        None => bail!("{}: no FLAC or ID3v2 tag found", path.display()),
    }
}

/// JSON summary of a FLAC tag.
pub fn flac_summary(context: &mut FlacContext, include_data: bool) -> Result<Value> {
    let mut summary = json!({
        "format": "flac",
        "tag_size": context.size(),
        "blocks": context.block_names(),
    });

    if context.has_block(FlacMetadataBlockType::StreamInfo) {
        let info = context.stream_info()?;
        let md5: String = info.md5.iter().map(|b| format!("{:02x}", b)).collect();
        summary["stream_info"] = json!({
            "sample_rate": info.sample_rate,
            "channels": info.channels(),
            "bits_per_sample": info.bits_per_sample(),
            "total_samples": info.total_samples,
            "min_block_size": info.min_block_size,
            "max_block_size": info.max_block_size,
            "md5": md5,
        });
    }

    if context.has_block(FlacMetadataBlockType::VorbisComment) {
        let comment = context.vorbis_comment()?;
        let mut tags = Map::new();
        for (field, value) in &comment.comments {
            tags.insert(field.clone(), Value::String(value.clone()));
        }
        summary["vendor"] = Value::String(comment.vendor_string);
        summary["tags"] = Value::Object(tags);
    }

    let covers: Vec<Value> = flac_covers(context)?
        .iter()
        .map(|c| c.to_json(include_data))
        .collect();
    summary["pictures"] = Value::Array(covers);
    Ok(summary)
}

/// JSON summary of an ID3v2 tag.
pub fn id3_summary(context: &mut Id3Context, include_data: bool) -> Result<Value> {
    let (major, revision) = context.version();
    let mut summary = json!({
        "format": "id3v2",
        "version": format!("2.{}.{}", major, revision),
        "tag_size": context.size(),
        "frames": context.frame_ids(),
    });

    let mut tags = Map::new();
    for (id, text) in context.text_frames()? {
        // repeated ids: the last frame wins, as with text_frame()
        tags.insert(id, Value::String(text));
    }
    summary["tags"] = Value::Object(tags);

    if context.has_frame(id3::frame_ids::COMMENT) {
        summary["comment"] = serde_json::to_value(context.comment()?)?;
    }

    let covers: Vec<Value> = id3_covers(context)?
        .iter()
        .map(|c| c.to_json(include_data))
        .collect();
    summary["pictures"] = Value::Array(covers);
    Ok(summary)
}

/// Read metadata from files
pub fn command_read(
    files: &[PathBuf],
    include_data: bool,
    output: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(std::io::stdout()),
    };

    for path in files {
        let summary = match TagFormat::detect(path) {
            Ok(Some(TagFormat::Flac)) => FlacContext::open(path)
                .map_err(anyhow::Error::from)
                .and_then(|mut c| flac_summary(&mut c, include_data)),
            Ok(Some(TagFormat::Id3v2)) => Id3Context::open(path)
                .map_err(anyhow::Error::from)
                .and_then(|mut c| id3_summary(&mut c, include_data)),
            Ok(None) => {
                formatter.print_error(&format!("{}: no FLAC or ID3v2 tag found", path.display()));
                continue;
            }
            Err(e) => Err(e),
        };

        match summary {
            Ok(mut summary) => {
                summary["file"] = Value::String(path.display().to_string());
                formatter.output_metadata(&summary, &mut writer)?;
            }
            Err(e) => formatter.print_error(&format!("{}: {:#}", path.display(), e)),
        }
    }

    writer.flush()?;
    Ok(())
}

/// Detect file format
pub fn command_detect(files: &[PathBuf], formatter: &OutputFormatter) -> Result<()> {
    for path in files {
        match TagFormat::detect(path) {
            Ok(Some(TagFormat::Flac)) => match FlacContext::open(path) {
                Ok(context) => formatter.print_info(&format!(
                    "{}: flac ({} blocks, {} byte tag)",
                    path.display(),
                    context.blocks().len(),
                    context.size()
                )),
                Err(e) => formatter.print_error(&format!("{}: flac ({})", path.display(), e)),
            },
            Ok(Some(TagFormat::Id3v2)) => match Id3Context::open(path) {
                Ok(context) => {
                    let (major, revision) = context.version();
                    formatter.print_info(&format!(
                        "{}: id3v2.{}.{} ({} frames, {} byte tag)",
                        path.display(),
                        major,
                        revision,
                        context.frames().len(),
                        context.size()
                    ))
                }
                Err(e) => formatter.print_error(&format!("{}: id3v2 ({})", path.display(), e)),
            },
            Ok(None) => formatter.print_error(&format!("{}: unknown format", path.display())),
            Err(e) => formatter.print_error(&format!("{}: {:#}", path.display(), e)),
        }
    }
    Ok(())
}

/// Export cover art; returns the written paths
pub fn command_export_cover(
    file: &Path,
    output: &Path,
    index: Option<usize>,
    formatter: &OutputFormatter,
) -> Result<Vec<PathBuf>> {
    let covers = load_covers(file)?;
    if covers.is_empty() {
        bail!("{}: no embedded pictures", file.display());
    }

    let selected: Vec<(usize, &Cover)> = match index {
        Some(i) => {
            let cover = covers.get(i).with_context(|| {
                format!("cover index {} out of range ({} pictures)", i, covers.len())
            })?;
            vec![(i, cover)]
        }
        None => covers.iter().enumerate().collect(),
    };

    std::fs::create_dir_all(output)
        .with_context(|| format!("creating {}", output.display()))?;

    let mut written = Vec::with_capacity(selected.len());
    for (i, cover) in selected {
        let name = if covers.len() == 1 {
            format!("cover.{}", extension_for_mime(&cover.mime_type))
        } else {
            format!("cover_{}.{}", i, extension_for_mime(&cover.mime_type))
        };
        let path = output.join(name);
        write_bytes(&path, &[&cover.data], ExistsPolicy::Replace)?;
        formatter.print_success(&format!(
            "{} ({}, {} bytes)",
            path.display(),
            cover.picture_type.description(),
            cover.data.len()
        ));
        written.push(path);
    }
    Ok(written)
}

/// Field updates for the rebuilt tag.
pub struct RetagOptions<'a> {
    pub set: &'a [(String, String)],
    pub cover: Option<&'a Path>,
    pub format: ImageFormat,
    pub picture_type: PictureType,
    pub policy: ExistsPolicy,
}

/// Replace the first field matching each key (ASCII case-insensitive) and drop
/// later repeats; unknown keys are appended.
fn merge_fields(fields: &mut Vec<(String, String)>, updates: &[(String, String)]) {
    for (key, value) in updates {
        match fields.iter().position(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(first) => {
                fields[first].1 = value.clone();
                let mut i = 0;
                fields.retain(|(k, _)| {
                    i += 1;
                    i - 1 <= first || !k.eq_ignore_ascii_case(key)
                });
            }
            None => fields.push((key.clone(), value.clone())),
        }
    }
}

fn rebuild_flac(file: &Path, options: &RetagOptions<'_>) -> Result<(Vec<u8>, u64)> {
    let mut context = FlacContext::open(file)?;
    ensure!(
        context.has_block(FlacMetadataBlockType::StreamInfo),
        "{}: no STREAMINFO block",
        file.display()
    );

    let mut comments: Vec<(String, String)> =
        if context.has_block(FlacMetadataBlockType::VorbisComment) {
            context
                .vorbis_comment()?
                .first_values()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        } else {
            Vec::new()
        };
    merge_fields(&mut comments, options.set);

    let mut blocks = context.block_copy(&[FlacMetadataBlockType::StreamInfo], false);
    blocks.push(build_vorbis_comment_block(
        comments.iter().map(|(k, v)| (k, v)),
    )?);
    match options.cover {
        Some(cover) => blocks.push(build_picture_block(
            &FileSource::new(cover),
            options.picture_type,
            options.format,
        )?),
        None => blocks.extend(context.block_copy(&[FlacMetadataBlockType::Picture], false)),
    }

    let tag = flac::assemble_tag(&blocks)?;
    Ok((tag, context.size() as u64))
}

fn rebuild_id3(file: &Path, options: &RetagOptions<'_>) -> Result<(Vec<u8>, u64)> {
    if let Some((id, _)) = options.set.iter().find(|(id, _)| !is_text_frame(id)) {
        bail!("{} is not a text frame id", id);
    }

    let mut context = Id3Context::open(file)?;
    let mut texts = context.text_frames()?;
    merge_fields(&mut texts, options.set);

    let mut frames = build_text_frames(texts.iter().map(|(k, v)| (k, v)))?;
    match options.cover {
        Some(cover) => frames.push(build_apic_frame(
            &FileSource::new(cover),
            options.picture_type,
            options.format,
        )?),
        None => {
            for cover in id3_covers(&mut context)? {
                frames.push(build_apic_frame(&cover.data, cover.picture_type, cover.format())?);
            }
        }
    }

    Ok((id3::assemble_tag(&frames)?, context.size() as u64))
}

/// Absolute form of `path` with symlinks and `..` resolved. A path that does not
/// exist yet resolves through its parent directory.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return path
            .canonicalize()
            .with_context(|| format!("resolving {}", path.display()));
    }
    let name = path
        .file_name()
        .with_context(|| format!("{} does not name a file", path.display()))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parent = parent
        .canonicalize()
        .with_context(|| format!("resolving {}", parent.display()))?;
    Ok(parent.join(name))
}

/// Sibling of `output` the new file is written to before it is renamed into place.
fn staging_path(output: &Path) -> Result<PathBuf> {
    let mut name = output
        .file_name()
        .with_context(|| format!("{} does not name a file", output.display()))?
        .to_os_string();
    name.push(".retag-tmp");
    Ok(output.with_file_name(name))
}

fn write_retagged(staging: &Path, tag: &[u8], file: &Path, audio_start: u64) -> Result<u64> {
    write_bytes(staging, &[tag], ExistsPolicy::Replace)
        .with_context(|| format!("writing tag to {}", staging.display()))?;
    let audio = copy_byte_range(file, staging, audio_start, None, ExistsPolicy::Append)
        .with_context(|| format!("copying audio from {}", file.display()))?;
    Ok(audio)
}

/// Rebuild the tag of `file` and write it, followed by the original audio, to `output`
pub fn command_retag(
    file: &Path,
    output: &Path,
    options: &RetagOptions<'_>,
    formatter: &OutputFormatter,
) -> Result<()> {
    ensure!(
        resolve_path(file)? != resolve_path(output)?,
        "refusing to retag {} in place",
        file.display()
    );
    if options.policy == ExistsPolicy::Fail && output.symlink_metadata().is_ok() {
        bail!("{} already exists", output.display());
    }

    let (tag, audio_start) = match TagFormat::detect(file)? {
        Some(TagFormat::Flac) => rebuild_flac(file, options)?,
        Some(TagFormat::Id3v2) => rebuild_id3(file, options)?,
        None => bail!("{}: no FLAC or ID3v2 tag found", file.display()),
    };
    debug!(tag = tag.len(), audio_start, "rebuilt tag");

    let staging = staging_path(output)?;
    let audio = match write_retagged(&staging, &tag, file, audio_start).and_then(|audio| {
        std::fs::rename(&staging, output)
            .with_context(|| format!("moving {} into place", staging.display()))?;
        Ok(audio)
    }) {
        Ok(audio) => audio,
        Err(e) => {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }
    };

    info!(output = %output.display(), tag = tag.len(), audio, "retagged");
    formatter.print_success(&format!(
        "{} ({} byte tag, {} bytes of audio)",
        output.display(),
        tag.len(),
        audio
    ));
    Ok(())
}
