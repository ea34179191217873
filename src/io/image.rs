use image::ImageFormat;

use crate::LoadError;

/// A decoded image, always RGBA8. The core never interprets compressed pixel
/// formats itself; that is this collaborator's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// The image collaborator.
pub trait ImageDecoder {
    fn decode(&self, bytes: &[u8], mime_type: Option<&str>, url: &str) -> Result<ImageData, LoadError>;
}

/// Default implementation on top of the image crate. A known MIME type pins
/// the format, otherwise it is guessed from the bytes.
pub struct CrateImageDecoder;

impl ImageDecoder for CrateImageDecoder {
    fn decode(&self, bytes: &[u8], mime_type: Option<&str>, url: &str) -> Result<ImageData, LoadError> {
        let decoded = match mime_type.and_then(ImageFormat::from_mime_type) {
            Some(format) => image::load_from_memory_with_format(bytes, format),
            None => image::load_from_memory(bytes),
        }
        .map_err(|source| LoadError::Image {
            url: url.to_owned(),
            source: Box::new(source),
        })?;

        let rgba = decoded.to_rgba8();
        Ok(ImageData {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    }
}
