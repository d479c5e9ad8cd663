//! Scaled previews and channel extraction for the asset fetch endpoint.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use easel_core::error::CoreError;

/// Encodings a preview can be served as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewFormat {
    Jpeg,
    Webp,
}

impl PreviewFormat {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(CoreError::Validation(format!(
                "Unknown preview format '{other}'. Must be one of: jpeg, webp"
            ))),
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

/// Which part of an image a channel fetch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Color planes, alpha dropped.
    Rgb,
    /// Alpha plane as its own transparent image.
    Alpha,
}

impl Channel {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "rgb" => Ok(Self::Rgb),
            "a" | "alpha" => Ok(Self::Alpha),
            other => Err(CoreError::Validation(format!(
                "Unknown channel '{other}'. Must be one of: rgb, a"
            ))),
        }
    }
}

/// Re-encode `bytes` as a preview, downscaling so neither dimension
/// exceeds `max_dimension` when given. Aspect ratio is preserved and
/// images already within bounds are not upscaled.
pub fn render_preview(
    bytes: &[u8],
    format: PreviewFormat,
    quality: u8,
    max_dimension: Option<u32>,
) -> Result<Vec<u8>, CoreError> {
    let img = decode(bytes)?;
    let img = match max_dimension {
        Some(max) if max > 0 && img.width().max(img.height()) > max => {
            img.resize(max, max, FilterType::Triangle)
        }
        _ => img,
    };

    let mut out = Cursor::new(Vec::new());
    match format {
        PreviewFormat::Jpeg => {
            // JPEG has no alpha; flatten first.
            let rgb = img.to_rgb8();
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
            rgb.write_with_encoder(encoder).map_err(encode_error)?;
        }
        PreviewFormat::Webp => {
            img.write_to(&mut out, ImageFormat::WebP)
                .map_err(encode_error)?;
        }
    }
    Ok(out.into_inner())
}

/// Extract one channel of `bytes` as a PNG.
pub fn extract_channel(bytes: &[u8], channel: Channel) -> Result<Vec<u8>, CoreError> {
    let img = decode(bytes)?;
    let out = match channel {
        Channel::Rgb => DynamicImage::ImageRgb8(img.to_rgb8()),
        Channel::Alpha => {
            let rgba = img.to_rgba8();
            let alpha = RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                Rgba([0, 0, 0, rgba.get_pixel(x, y)[3]])
            });
            DynamicImage::ImageRgba8(alpha)
        }
    };

    let mut buf = Cursor::new(Vec::new());
    out.write_to(&mut buf, ImageFormat::Png)
        .map_err(encode_error)?;
    Ok(buf.into_inner())
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, CoreError> {
    image::load_from_memory(bytes)
        .map_err(|e| CoreError::Validation(format!("cannot decode image: {e}")))
}

fn encode_error(e: image::ImageError) -> CoreError {
    CoreError::Internal(format!("image encoding failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn png_fixture(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(pixel));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn preview_downscales_to_max_dimension() {
        let src = png_fixture(400, 200, [10, 20, 30, 255]);
        let out = render_preview(&src, PreviewFormat::Jpeg, 80, Some(100)).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.width(), 100);
        assert_eq!(img.height(), 50);
    }

    #[test]
    fn preview_never_upscales() {
        let src = png_fixture(40, 20, [10, 20, 30, 255]);
        let out = render_preview(&src, PreviewFormat::Webp, 80, Some(100)).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!((img.width(), img.height()), (40, 20));
    }

    #[test]
    fn preview_formats_are_honored() {
        let src = png_fixture(8, 8, [1, 2, 3, 255]);
        let jpeg = render_preview(&src, PreviewFormat::Jpeg, 80, None).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);

        let webp = render_preview(&src, PreviewFormat::Webp, 80, None).unwrap();
        assert_eq!(image::guess_format(&webp).unwrap(), ImageFormat::WebP);
    }

    #[test]
    fn rgb_channel_drops_alpha() {
        let src = png_fixture(4, 4, [7, 8, 9, 100]);
        let out = extract_channel(&src, Channel::Rgb).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.color(), image::ColorType::Rgb8);
        assert_eq!(img.to_rgb8().get_pixel(0, 0).0, [7, 8, 9]);
    }

    #[test]
    fn alpha_channel_becomes_transparency_mask() {
        let src = png_fixture(4, 4, [7, 8, 9, 100]);
        let out = extract_channel(&src, Channel::Alpha).unwrap();
        let img = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 100]);
    }

    #[test]
    fn garbage_bytes_are_a_validation_error() {
        assert_matches!(
            render_preview(b"not an image", PreviewFormat::Jpeg, 80, None),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn format_and_channel_names_parse() {
        assert_eq!(PreviewFormat::from_name("jpg").unwrap(), PreviewFormat::Jpeg);
        assert_eq!(Channel::from_name("a").unwrap(), Channel::Alpha);
        assert_matches!(PreviewFormat::from_name("gif"), Err(CoreError::Validation(_)));
        assert_matches!(Channel::from_name("cmyk"), Err(CoreError::Validation(_)));
    }
}
