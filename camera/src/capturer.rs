//! Still-frame capture from a bound surface.

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};

use crate::{
    CameraFrame, CaptureError, EncodedImage, FrameFormat, FrameSource, ImageMime,
};

/// Still-capture settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { jpeg_quality: 92 }
    }
}

/// Turns the frame currently painted on a surface into a JPEG.
///
/// Capturing never touches the stream itself; the caller decides whether to
/// stop it afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCapturer {
    config: CaptureConfig,
}

impl FrameCapturer {
    /// Create a capturer with the given settings.
    #[must_use]
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config: CaptureConfig {
                jpeg_quality: config.jpeg_quality.clamp(1, 100),
            },
        }
    }

    /// Capture the current frame of `surface`.
    ///
    /// # Errors
    /// Returns [`CaptureError::SurfaceNotReady`] if nothing has been painted
    /// or the frame has a zero dimension, and
    /// [`CaptureError::EncodingUnavailable`] if the pixels cannot be encoded.
    pub fn capture(&self, surface: &impl FrameSource) -> Result<EncodedImage, CaptureError> {
        let frame = surface.current_frame().ok_or(CaptureError::SurfaceNotReady)?;
        self.encode(&frame)
    }

    /// Encode a single frame.
    ///
    /// # Errors
    /// See [`capture`](Self::capture).
    pub fn encode(&self, frame: &CameraFrame) -> Result<EncodedImage, CaptureError> {
        let resolution = frame.resolution();
        if resolution.is_empty() {
            return Err(CaptureError::SurfaceNotReady);
        }

        if frame.format == FrameFormat::Jpeg {
            return passthrough_jpeg(frame);
        }

        let rgb = to_rgb(frame)?;
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.config.jpeg_quality)
            .encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
            .map_err(|e| CaptureError::EncodingUnavailable(e.to_string()))?;

        log::debug!("captured {resolution} frame as {} byte JPEG", out.len());
        Ok(EncodedImage::from_parts(out, ImageMime::Jpeg, resolution))
    }
}

fn passthrough_jpeg(frame: &CameraFrame) -> Result<EncodedImage, CaptureError> {
    if frame.data.is_empty() {
        return Err(CaptureError::SurfaceNotReady);
    }
    let image = EncodedImage::from_bytes(frame.data.clone())
        .map_err(|e| CaptureError::EncodingUnavailable(e.to_string()))?;
    if image.mime() != ImageMime::Jpeg {
        return Err(CaptureError::EncodingUnavailable(format!(
            "jpeg frame holds {} data",
            image.mime()
        )));
    }
    if image.resolution() != frame.resolution() {
        log::debug!(
            "jpeg frame reported {} but decodes as {}",
            frame.resolution(),
            image.resolution()
        );
    }
    Ok(image)
}

fn to_rgb(frame: &CameraFrame) -> Result<Vec<u8>, CaptureError> {
    let pixels = frame.width as usize * frame.height as usize;
    let expected = match frame.format {
        FrameFormat::Rgb => pixels * 3,
        FrameFormat::Rgba | FrameFormat::Bgra => pixels * 4,
        FrameFormat::Nv12 => pixels + pixels / 2,
        FrameFormat::Jpeg => {
            return Err(CaptureError::EncodingUnavailable(
                "jpeg frames are not raw pixels".into(),
            ));
        }
    };
    if frame.data.len() < expected {
        return Err(CaptureError::EncodingUnavailable(format!(
            "{:?} frame of {} needs {expected} bytes, got {}",
            frame.format,
            frame.resolution(),
            frame.data.len()
        )));
    }

    let data = &frame.data[..expected];
    Ok(match frame.format {
        FrameFormat::Rgb => data.to_vec(),
        FrameFormat::Rgba => data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
        FrameFormat::Bgra => data
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
        FrameFormat::Nv12 | FrameFormat::Jpeg => {
            nv12_to_rgb(data, frame.width as usize, frame.height as usize)
        }
    })
}

// BT.601 limited range.
fn nv12_to_rgb(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let (luma, chroma) = data.split_at(width * height);
    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let c = (y / 2) * width + (x / 2) * 2;
            let yy = f32::from(luma[y * width + x]) - 16.0;
            let u = f32::from(chroma.get(c).copied().unwrap_or(128)) - 128.0;
            let v = f32::from(chroma.get(c + 1).copied().unwrap_or(128)) - 128.0;
            let r = 1.164 * yy + 1.596 * v;
            let g = 1.164 * yy - 0.392 * u - 0.813 * v;
            let b = 1.164 * yy + 2.017 * u;
            out.extend([clamp_channel(r), clamp_channel(g), clamp_channel(b)]);
        }
    }
    out
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Resolution;

    fn solid(format: FrameFormat, width: u32, height: u32) -> CameraFrame {
        let bpp = match format {
            FrameFormat::Rgb => 3,
            FrameFormat::Rgba | FrameFormat::Bgra => 4,
            _ => unreachable!(),
        };
        CameraFrame::new(vec![90; (width * height * bpp) as usize], width, height, format)
    }

    #[test]
    fn encodes_rgb_frames_as_jpeg() {
        let image = FrameCapturer::default()
            .encode(&solid(FrameFormat::Rgb, 16, 8))
            .unwrap();
        assert_eq!(image.mime(), ImageMime::Jpeg);
        assert_eq!(image.resolution(), Resolution { width: 16, height: 8 });
        assert_eq!(&image.bytes()[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn encodes_four_channel_frames() {
        let capturer = FrameCapturer::new(CaptureConfig { jpeg_quality: 70 });
        assert!(capturer.encode(&solid(FrameFormat::Rgba, 4, 4)).is_ok());
        assert!(capturer.encode(&solid(FrameFormat::Bgra, 4, 4)).is_ok());
    }

    #[test]
    fn encodes_nv12_frames() {
        let frame = CameraFrame::new(vec![128; 4 * 4 + 8], 4, 4, FrameFormat::Nv12);
        assert!(FrameCapturer::default().encode(&frame).is_ok());
    }

    #[test]
    fn zero_dimension_is_not_ready() {
        let frame = CameraFrame::new(Vec::new(), 0, 0, FrameFormat::Rgb);
        assert_eq!(
            FrameCapturer::default().encode(&frame),
            Err(CaptureError::SurfaceNotReady)
        );
        let frame = CameraFrame::new(vec![0; 30], 10, 0, FrameFormat::Rgb);
        assert_eq!(
            FrameCapturer::default().encode(&frame),
            Err(CaptureError::SurfaceNotReady)
        );
    }

    #[test]
    fn jpeg_frames_pass_through_with_sniffed_size() {
        let jpeg = FrameCapturer::default()
            .encode(&solid(FrameFormat::Rgb, 12, 6))
            .unwrap();
        // Dimensions reported by the surface are wrong on purpose.
        let frame = CameraFrame::new(jpeg.bytes().to_vec(), 640, 480, FrameFormat::Jpeg);

        let image = FrameCapturer::default().encode(&frame).unwrap();
        assert_eq!(image.bytes(), jpeg.bytes());
        assert_eq!(image.resolution(), Resolution { width: 12, height: 6 });
    }

    #[test]
    fn jpeg_frames_must_hold_jpeg_bytes() {
        let frame = CameraFrame::new(vec![0x42; 64], 8, 8, FrameFormat::Jpeg);
        assert!(matches!(
            FrameCapturer::default().encode(&frame),
            Err(CaptureError::EncodingUnavailable(_))
        ));

        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 4))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let frame = CameraFrame::new(png, 4, 4, FrameFormat::Jpeg);
        assert!(matches!(
            FrameCapturer::default().encode(&frame),
            Err(CaptureError::EncodingUnavailable(_))
        ));
    }

    #[test]
    fn short_buffers_are_unencodable() {
        let frame = CameraFrame::new(vec![0; 5], 4, 4, FrameFormat::Rgb);
        assert!(matches!(
            FrameCapturer::default().encode(&frame),
            Err(CaptureError::EncodingUnavailable(_))
        ));
    }
}
