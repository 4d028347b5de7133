use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::{ImageFormat, ImageReader};

use crate::{EncodingError, Resolution};

/// Image container formats accepted by the capture flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageMime {
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
    /// `image/webp`
    Webp,
    /// `image/gif`
    Gif,
}

impl ImageMime {
    /// The MIME type string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// File extension used for storage keys.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::WebP => Some(Self::Webp),
            ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }

    fn from_str(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable still-image encoding.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Arc<[u8]>,
    mime: ImageMime,
    resolution: Resolution,
}

impl EncodedImage {
    pub(crate) fn from_parts(bytes: Vec<u8>, mime: ImageMime, resolution: Resolution) -> Self {
        Self {
            bytes: bytes.into(),
            mime,
            resolution,
        }
    }

    /// Interpret arbitrary bytes, such as a user-selected file.
    ///
    /// The format is sniffed from the content and only the header is decoded.
    ///
    /// # Errors
    /// Returns [`EncodingError::UnrecognizedFormat`] for non-image input and
    /// [`EncodingError::Decode`] if the header is corrupt.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, EncodingError> {
        let format = image::guess_format(&bytes).map_err(|_| EncodingError::UnrecognizedFormat)?;
        let mime = ImageMime::from_format(format).ok_or(EncodingError::UnrecognizedFormat)?;
        let (width, height) = ImageReader::with_format(Cursor::new(&bytes), format)
            .into_dimensions()
            .map_err(|e| EncodingError::Decode(e.to_string()))?;
        Ok(Self::from_parts(bytes, mime, Resolution { width, height }))
    }

    /// Parse a base64 `data:` URL.
    ///
    /// # Errors
    /// Returns [`EncodingError::InvalidDataUrl`] if the URL is malformed, or
    /// any error from [`from_bytes`](Self::from_bytes).
    pub fn from_data_url(url: &str) -> Result<Self, EncodingError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| EncodingError::InvalidDataUrl("missing data: scheme".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| EncodingError::InvalidDataUrl("missing payload".into()))?;
        let declared = header
            .strip_suffix(";base64")
            .ok_or_else(|| EncodingError::InvalidDataUrl("payload is not base64".into()))?;
        let bytes = BASE64_STANDARD
            .decode(payload)
            .map_err(|e| EncodingError::InvalidDataUrl(e.to_string()))?;
        let image = Self::from_bytes(bytes)?;
        if ImageMime::from_str(declared).is_some_and(|mime| mime != image.mime) {
            log::debug!("data URL declared {declared} but content is {}", image.mime);
        }
        Ok(image)
    }

    /// Render as a base64 `data:` URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            BASE64_STANDARD.encode(&self.bytes)
        )
    }

    /// The encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The container format.
    #[must_use]
    pub const fn mime(&self) -> ImageMime {
        self.mime
    }

    /// Pixel dimensions.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Size of the encoding in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the encoding is empty. Never true for a decoded image.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime", &self.mime)
            .field("resolution", &self.resolution)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png_bytes() -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(3, 2, Rgb([10, 200, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn sniffs_file_bytes() {
        let image = EncodedImage::from_bytes(png_bytes()).unwrap();
        assert_eq!(image.mime(), ImageMime::Png);
        assert_eq!(image.resolution(), Resolution { width: 3, height: 2 });
    }

    #[test]
    fn rejects_non_images() {
        let err = EncodedImage::from_bytes(b"just some text".to_vec()).unwrap_err();
        assert_eq!(err, EncodingError::UnrecognizedFormat);
    }

    #[test]
    fn data_url_survives_conversion() {
        let image = EncodedImage::from_bytes(png_bytes()).unwrap();
        let url = image.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(EncodedImage::from_data_url(&url).unwrap(), image);
    }

    #[test]
    fn rejects_malformed_data_urls() {
        assert!(matches!(
            EncodedImage::from_data_url("image/png;base64,AAAA"),
            Err(EncodingError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            EncodedImage::from_data_url("data:image/png,plain"),
            Err(EncodingError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            EncodedImage::from_data_url("data:image/png;base64,!!!"),
            Err(EncodingError::InvalidDataUrl(_))
        ));
    }
}
