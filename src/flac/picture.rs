// FLAC PICTURE block implementation

use serde::Serialize;

use super::metadata::{wrap_block, FlacMetadataBlockType};
use crate::error::{Result, TagError};
use crate::picture::{extension_for_mime, ImageFormat, PictureType};
use crate::utils::buffer::LabeledBuffer;
use crate::utils::io::ByteSource;

/// FLAC PICTURE block structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlacPicture {
    pub picture_type: PictureType,
    pub mime_type: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub colors: u32,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl FlacPicture {
    /// Decode a PICTURE body starting at the buffer cursor.
    pub fn decode(buffer: &mut LabeledBuffer) -> Result<Self> {
        let picture_type =
            PictureType::from_u32(buffer.read_u32_be("PICTURE type")?, "PICTURE")?;

        let mime_length = buffer.read_u32_be("PICTURE mime length")? as usize;
        let mime_type =
            String::from_utf8_lossy(&buffer.read_exact(mime_length, "PICTURE mime")?).into_owned();

        let desc_length = buffer.read_u32_be("PICTURE description length")? as usize;
        let description = String::from_utf8(buffer.read_exact(desc_length, "PICTURE description")?)
            .map_err(|source| TagError::InvalidText {
                field: "PICTURE description",
                source,
            })?;

        let width = buffer.read_u32_be("PICTURE width")?;
        let height = buffer.read_u32_be("PICTURE height")?;
        let depth = buffer.read_u32_be("PICTURE depth")?;
        let colors = buffer.read_u32_be("PICTURE colors")?;

        let data_length = buffer.read_u32_be("PICTURE data length")? as usize;
        let data = buffer.read_exact(data_length, "PICTURE data")?;

        Ok(FlacPicture {
            picture_type,
            mime_type,
            description,
            width,
            height,
            depth,
            colors,
            data,
        })
    }

    /// Picture with no description and unknown dimensions.
    pub fn new(data: Vec<u8>, picture_type: PictureType, format: ImageFormat) -> Self {
        FlacPicture {
            picture_type,
            mime_type: format.mime_type().to_string(),
            description: String::new(),
            width: 0,
            height: 0,
            depth: 0,
            colors: 0,
            data,
        }
    }

    /// Get file extension based on MIME type
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    /// Encode the PICTURE body (no block header).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(32 + self.mime_type.len() + self.data.len());

        result.extend_from_slice(&(self.picture_type as u32).to_be_bytes());
        result.extend_from_slice(&(self.mime_type.len() as u32).to_be_bytes());
        result.extend_from_slice(self.mime_type.as_bytes());
        result.extend_from_slice(&(self.description.len() as u32).to_be_bytes());
        result.extend_from_slice(self.description.as_bytes());
        result.extend_from_slice(&self.width.to_be_bytes());
        result.extend_from_slice(&self.height.to_be_bytes());
        result.extend_from_slice(&self.depth.to_be_bytes());
        result.extend_from_slice(&self.colors.to_be_bytes());
        result.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        result.extend_from_slice(&self.data);

        result
    }
}

/// Build a complete PICTURE block (header included) around the bytes pulled
/// from `source`.
pub fn build_picture_block<S>(
    source: &S,
    picture_type: PictureType,
    format: ImageFormat,
) -> Result<Vec<u8>>
where
    S: ByteSource + ?Sized,
{
    let picture = FlacPicture::new(source.read_bytes()?, picture_type, format);
    wrap_block(FlacMetadataBlockType::Picture, &picture.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::super::metadata::FlacMetadataBlockHeader;
    use super::*;

    #[test]
    fn jpeg_block_layout() {
        let image = vec![0xFF, 0xD8, 0xFF, 0xE0];
        let block =
            build_picture_block(&image, PictureType::CoverFront, ImageFormat::Jpeg).unwrap();

        // 42 bytes of fixed fields around a 10-byte mime
        assert_eq!(block.len(), 4 + 42 + image.len());
        assert_eq!(&block[..4], &[0x06, 0x00, 0x00, 46]);
        assert_eq!(&block[4..8], &3u32.to_be_bytes());
        assert_eq!(&block[8..12], &10u32.to_be_bytes());
        assert_eq!(&block[12..22], b"image/jpeg");
        assert_eq!(&block[22..42], &[0u8; 20]);
        assert_eq!(&block[42..46], &4u32.to_be_bytes());
        assert_eq!(&block[46..], image.as_slice());
    }

    #[test]
    fn png_block_decodes() {
        let image = [0x89, b'P', b'N', b'G'];
        let block =
            build_picture_block(image.as_slice(), PictureType::BandLogo, ImageFormat::Png).unwrap();

        let mut buffer = LabeledBuffer::new(block);
        buffer.read(4);
        let picture = FlacPicture::decode(&mut buffer).unwrap();
        assert_eq!(picture.picture_type, PictureType::BandLogo);
        assert_eq!(picture.mime_type, "image/png");
        assert_eq!(picture.extension(), "png");
        assert_eq!(picture.description, "");
        assert_eq!(picture.data, image);
    }

    #[test]
    fn oversized_image_is_rejected() {
        // 32 bytes of fixed fields and the 10-byte mime leave this much for the image
        let largest = FlacMetadataBlockHeader::MAX_LENGTH - 42;
        let block =
            build_picture_block(&vec![0xAB; largest], PictureType::CoverFront, ImageFormat::Jpeg)
                .unwrap();
        assert_eq!(&block[..4], &[0x06, 0xFF, 0xFF, 0xFF]);

        let err = build_picture_block(
            &vec![0xAB; 0x0100_0000],
            PictureType::CoverFront,
            ImageFormat::Jpeg,
        )
        .unwrap_err();
        assert!(matches!(err, TagError::BlockTooLarge { length, .. } if length == 0x0100_0000 + 42));
    }

    #[test]
    fn picture_type_21_is_rejected() {
        let mut body = FlacPicture::new(vec![1], PictureType::Other, ImageFormat::Jpeg).to_bytes();
        body[..4].copy_from_slice(&21u32.to_be_bytes());
        let err = FlacPicture::decode(&mut LabeledBuffer::new(body)).unwrap_err();
        assert!(matches!(
            err,
            TagError::UnknownPictureType {
                field: "PICTURE",
                value: 21
            }
        ));
    }
}
