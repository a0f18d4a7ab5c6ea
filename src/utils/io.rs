// File collaborators: whole-file and range reads, chunk writes, range copies

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TagError};

/// What to do when a destination file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistsPolicy {
    /// Truncate and rewrite.
    #[default]
    Replace,
    /// Append after the existing contents.
    Append,
    /// Refuse to touch it.
    Fail,
}

impl ExistsPolicy {
    fn open(self, path: &Path) -> Result<File> {
        let mut options = OpenOptions::new();
        options.write(true);
        match self {
            ExistsPolicy::Replace => options.create(true).truncate(true),
            ExistsPolicy::Append => options.create(true).append(true),
            ExistsPolicy::Fail => options.create_new(true),
        };
        options.open(path).map_err(|e| TagError::io(path, e))
    }
}

/// Somewhere image bytes can be pulled from when building picture blocks.
pub trait ByteSource {
    fn read_bytes(&self) -> Result<Vec<u8>>;
}

impl ByteSource for [u8] {
    fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl ByteSource for Vec<u8> {
    fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.clone())
    }
}

/// A file read in full each time its bytes are requested.
#[derive(Debug, Clone)]
pub struct FileSource(pub PathBuf);

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource(path.into())
    }
}

impl ByteSource for FileSource {
    fn read_bytes(&self) -> Result<Vec<u8>> {
        read_all_bytes(&self.0)
    }
}

pub fn read_all_bytes(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| TagError::io(path, e))
}

/// Read up to `length` bytes starting at `offset`. Short files give short reads.
pub fn read_range(path: impl AsRef<Path>, offset: u64, length: u64) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let read = || -> io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut data = Vec::new();
        file.take(length).read_to_end(&mut data)?;
        Ok(data)
    };
    read().map_err(|e| TagError::io(path, e))
}

/// Write `chunks` one after another into `path`.
pub fn write_bytes<C>(path: impl AsRef<Path>, chunks: &[C], policy: ExistsPolicy) -> Result<()>
where
    C: AsRef<[u8]>,
{
    let path = path.as_ref();
    let mut file = policy.open(path)?;
    for chunk in chunks {
        file.write_all(chunk.as_ref())
            .map_err(|e| TagError::io(path, e))?;
    }
    file.flush().map_err(|e| TagError::io(path, e))?;
    debug!(path = %path.display(), chunks = chunks.len(), "wrote chunks");
    Ok(())
}

/// Copy `src[start..end]` (or `src[start..]` when `end` is `None`) into `dest`.
///
/// Returns the number of bytes copied.
pub fn copy_byte_range(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    start: u64,
    end: Option<u64>,
    policy: ExistsPolicy,
) -> Result<u64> {
    let (src, dest) = (src.as_ref(), dest.as_ref());
    if let Some(end) = end {
        if end <= start {
            return Err(TagError::InvalidRange { start, end });
        }
    }

    let mut input = File::open(src).map_err(|e| TagError::io(src, e))?;
    input
        .seek(SeekFrom::Start(start))
        .map_err(|e| TagError::io(src, e))?;
    let mut output = policy.open(dest)?;

    let copied = match end {
        Some(end) => io::copy(&mut input.take(end - start), &mut output),
        None => io::copy(&mut input, &mut output),
    }
    .map_err(|e| TagError::io(dest, e))?;

    debug!(src = %src.display(), dest = %dest.display(), start, copied, "copied byte range");
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_append_then_copy() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");

        write_bytes(&src, &[b"head".as_slice(), b"AUDIO".as_slice()], ExistsPolicy::Replace).unwrap();
        assert_eq!(read_all_bytes(&src).unwrap(), b"headAUDIO");
        assert_eq!(read_range(&src, 4, 3).unwrap(), b"AUD");
        assert_eq!(read_range(&src, 7, 100).unwrap(), b"IO");

        write_bytes(&dest, &[b"TAG"], ExistsPolicy::Replace).unwrap();
        let copied = copy_byte_range(&src, &dest, 4, None, ExistsPolicy::Append).unwrap();
        assert_eq!(copied, 5);
        assert_eq!(read_all_bytes(&dest).unwrap(), b"TAGAUDIO");

        copy_byte_range(&src, &dest, 0, Some(4), ExistsPolicy::Replace).unwrap();
        assert_eq!(read_all_bytes(&dest).unwrap(), b"head");
    }

    #[test]
    fn fail_policy_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        write_bytes(&path, &[b"x"], ExistsPolicy::Fail).unwrap();
        assert!(matches!(
            write_bytes(&path, &[b"y"], ExistsPolicy::Fail),
            Err(TagError::Io { .. })
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = copy_byte_range("a", "b", 10, Some(10), ExistsPolicy::Replace).unwrap_err();
        assert!(matches!(err, TagError::InvalidRange { start: 10, end: 10 }));
    }

    #[test]
    fn byte_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.jpg");
        std::fs::write(&path, [0xFF, 0xD8]).unwrap();
        assert_eq!(FileSource::new(&path).read_bytes().unwrap(), vec![0xFF, 0xD8]);
        assert_eq!([1u8, 2].as_slice().read_bytes().unwrap(), vec![1, 2]);
        assert!(FileSource::new(dir.path().join("missing")).read_bytes().is_err());
    }
}
