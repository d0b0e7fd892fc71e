//! Target encoders
//!
//! JPEG goes through mozjpeg and WebP through libwebp. EPS is written
//! directly; the remaining formats use the `image` crate's encoders.

use bytes::Bytes;
use convertease_core::ConversionError;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use std::io::Cursor;

/// JPEG quality when `compress` is set
pub const COMPRESSED_JPEG_QUALITY: f32 = 75.0;
/// JPEG quality otherwise
pub const DEFAULT_JPEG_QUALITY: f32 = 92.0;
/// WebP quality when `compress` is set; lossless otherwise
pub const COMPRESSED_WEBP_QUALITY: f32 = 75.0;
/// ICO entries are limited to 256x256
pub const MAX_ICO_DIMENSION: u32 = 256;
/// Largest JPEG side libjpeg accepts
pub const MAX_JPEG_DIMENSION: u32 = 65_500;
/// Largest WebP side libwebp accepts
pub const MAX_WEBP_DIMENSION: u32 = 16_383;
/// Source bytes per hex line in EPS output
const EPS_HEX_LINE_BYTES: usize = 36;

/// Encoders the image backend can produce, keyed by format code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Bmp,
    Gif,
    Tiff,
    Ico,
    Eps,
}

impl OutputFormat {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "JPG" | "JPEG" => Some(OutputFormat::Jpeg),
            "PNG" => Some(OutputFormat::Png),
            "WEBP" => Some(OutputFormat::WebP),
            "BMP" => Some(OutputFormat::Bmp),
            "GIF" => Some(OutputFormat::Gif),
            "TIFF" => Some(OutputFormat::Tiff),
            "ICO" => Some(OutputFormat::Ico),
            "EPS" => Some(OutputFormat::Eps),
            _ => None,
        }
    }

    /// Formats without an alpha channel in our output
    pub fn is_opaque(self) -> bool {
        matches!(
            self,
            OutputFormat::Jpeg | OutputFormat::Bmp | OutputFormat::Eps
        )
    }

    /// Containers img-parts can write EXIF into
    pub fn carries_exif(self) -> bool {
        matches!(
            self,
            OutputFormat::Jpeg | OutputFormat::Png | OutputFormat::WebP
        )
    }
}

pub struct ImageEncoder;

impl ImageEncoder {
    /// Composite the image over an opaque background colour.
    pub fn flatten(img: &DynamicImage, background: [u8; 3]) -> DynamicImage {
        if !img.color().has_alpha() {
            return DynamicImage::ImageRgb8(img.to_rgb8());
        }

        let rgba = img.to_rgba8();
        let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let alpha = a as u32;
            let blend = |c: u8, bg: u8| {
                ((c as u32 * alpha + bg as u32 * (255 - alpha) + 127) / 255) as u8
            };
            image::Rgb([
                blend(r, background[0]),
                blend(g, background[1]),
                blend(b, background[2]),
            ])
        });
        DynamicImage::ImageRgb8(flattened)
    }

    /// Encode `img` into `format`.
    pub fn encode(
        img: &DynamicImage,
        format: OutputFormat,
        compress: bool,
    ) -> Result<Bytes, ConversionError> {
        match format {
            OutputFormat::Jpeg => Self::encode_jpeg(
                img,
                if compress {
                    COMPRESSED_JPEG_QUALITY
                } else {
                    DEFAULT_JPEG_QUALITY
                },
            ),
            OutputFormat::WebP => Self::encode_webp(img, compress),
            OutputFormat::Png => Self::encode_png(img, compress),
            OutputFormat::Gif => {
                Self::write_with_image(&DynamicImage::ImageRgba8(img.to_rgba8()), ImageFormat::Gif)
            }
            OutputFormat::Bmp => {
                Self::write_with_image(&DynamicImage::ImageRgb8(img.to_rgb8()), ImageFormat::Bmp)
            }
            OutputFormat::Tiff => {
                let normalized = if img.color().has_alpha() {
                    DynamicImage::ImageRgba8(img.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(img.to_rgb8())
                };
                Self::write_with_image(&normalized, ImageFormat::Tiff)
            }
            OutputFormat::Ico => {
                let (width, height) = img.dimensions();
                let icon = if width > MAX_ICO_DIMENSION || height > MAX_ICO_DIMENSION {
                    img.resize(
                        MAX_ICO_DIMENSION,
                        MAX_ICO_DIMENSION,
                        image::imageops::FilterType::Lanczos3,
                    )
                } else {
                    img.clone()
                };
                Self::write_with_image(&DynamicImage::ImageRgba8(icon.to_rgba8()), ImageFormat::Ico)
            }
            OutputFormat::Eps => Self::encode_eps(img),
        }
    }

    fn check_dimensions(img: &DynamicImage, limit: u32, codec: &str) -> Result<(), ConversionError> {
        let (width, height) = img.dimensions();
        if width > limit || height > limit {
            return Err(ConversionError::EncodeFailed(format!(
                "{} output is limited to {}x{} pixels, got {}x{}",
                codec, limit, limit, width, height
            )));
        }
        Ok(())
    }

    fn encode_jpeg(img: &DynamicImage, quality: f32) -> Result<Bytes, ConversionError> {
        // libjpeg aborts through its error handler past this size
        Self::check_dimensions(img, MAX_JPEG_DIMENSION, "JPEG")?;

        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let encoded = comp
            .start_compress(Vec::new())
            .and_then(|mut comp| {
                comp.write_scanlines(rgb_img.as_raw())?;
                comp.finish()
            })
            .map_err(|e| ConversionError::EncodeFailed(format!("JPEG: {}", e)))?;

        Ok(Bytes::from(encoded))
    }

    fn encode_webp(img: &DynamicImage, compress: bool) -> Result<Bytes, ConversionError> {
        Self::check_dimensions(img, MAX_WEBP_DIMENSION, "WebP")?;

        let (width, height) = img.dimensions();
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder
            .encode_simple(!compress, COMPRESSED_WEBP_QUALITY)
            .map_err(|e| ConversionError::EncodeFailed(format!("WebP: {:?}", e)))?;

        Ok(Bytes::copy_from_slice(&webp_data))
    }

    /// Level 2 EPS wrapping the pixels in a hex-encoded `colorimage`.
    fn encode_eps(img: &DynamicImage) -> Result<Bytes, ConversionError> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();
        let raw = rgb_img.as_raw();

        let mut out = String::with_capacity(raw.len() * 2 + raw.len() / EPS_HEX_LINE_BYTES + 512);
        out.push_str("%!PS-Adobe-3.0 EPSF-3.0\n");
        out.push_str("%%Creator: ConvertEase\n");
        out.push_str(&format!("%%BoundingBox: 0 0 {} {}\n", width, height));
        out.push_str("%%LanguageLevel: 2\n");
        out.push_str("%%Pages: 1\n");
        out.push_str("%%EndComments\n");
        out.push_str("gsave\n");
        out.push_str(&format!("{} {} scale\n", width, height));
        out.push_str(&format!("/picstr {} string def\n", width as u64 * 3));
        out.push_str(&format!(
            "{} {} 8 [{} 0 0 -{} 0 {}]\n",
            width, height, width, height, height
        ));
        out.push_str("{ currentfile picstr readhexstring pop } false 3 colorimage\n");

        for line in raw.chunks(EPS_HEX_LINE_BYTES) {
            for byte in line {
                out.push_str(&format!("{:02X}", byte));
            }
            out.push('\n');
        }

        out.push_str("grestore\n");
        out.push_str("showpage\n");
        out.push_str("%%EOF\n");

        Ok(Bytes::from(out))
    }

    fn encode_png(img: &DynamicImage, compress: bool) -> Result<Bytes, ConversionError> {
        let mut buffer = Vec::new();
        let compression = if compress {
            CompressionType::Best
        } else {
            CompressionType::Default
        };
        let encoder = PngEncoder::new_with_quality(&mut buffer, compression, PngFilter::Adaptive);
        img.write_with_encoder(encoder)
            .map_err(|e| ConversionError::EncodeFailed(format!("PNG: {}", e)))?;
        Ok(Bytes::from(buffer))
    }

    fn write_with_image(img: &DynamicImage, format: ImageFormat) -> Result<Bytes, ConversionError> {
        let (width, height) = img.dimensions();
        let mut buffer = Vec::with_capacity((width as usize) * (height as usize) * 3);
        img.write_to(&mut Cursor::new(&mut buffer), format)
            .map_err(|e| ConversionError::EncodeFailed(format!("{:?}: {}", format, e)))?;
        Ok(Bytes::from(buffer))
    }
}
