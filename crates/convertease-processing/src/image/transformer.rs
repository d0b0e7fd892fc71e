//! Image converter - runs the transform pipeline for one conversion
//!
//! The request's cancellation token is checked between steps, so a cancel
//! takes effect at the next step boundary.

use super::encode::{ImageEncoder, OutputFormat};
use super::metadata::ImageMetadata;
use super::orientation::ImageOrientation;
use super::resize::ImageResize;
use crate::traits::{ConversionRequest, ConvertedOutput, Converter};
use convertease_core::models::{ConversionSettings, FormatCategory, MAX_DIMENSION};
use convertease_core::ConversionError;
use image::{DynamicImage, GenericImageView, ImageError};
use std::io::Cursor;

/// Default ceiling on output pixels (width x height)
pub const DEFAULT_MAX_OUTPUT_PIXELS: u64 = 400_000_000;

/// Converter backend for every image target
pub struct ImageConverter {
    max_output_pixels: u64,
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_PIXELS)
    }
}

impl ImageConverter {
    pub fn new(max_output_pixels: u64) -> Self {
        Self { max_output_pixels }
    }

    fn decode(&self, data: &[u8]) -> Result<DynamicImage, ConversionError> {
        let mut reader = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| ConversionError::CorruptInput(e.to_string()))?;

        let mut limits = image::Limits::default();
        limits.max_image_width = Some(MAX_DIMENSION);
        limits.max_image_height = Some(MAX_DIMENSION);
        limits.max_alloc = Some(self.max_output_pixels.saturating_mul(4));
        reader.limits(limits);

        reader.decode().map_err(|e| match e {
            ImageError::Limits(limit) => ConversionError::ResourceExhausted(limit.to_string()),
            other => ConversionError::CorruptInput(other.to_string()),
        })
    }

    fn check_output_size(&self, width: u32, height: u32) -> Result<(), ConversionError> {
        let pixels = width as u64 * height as u64;
        if pixels > self.max_output_pixels {
            return Err(ConversionError::ResourceExhausted(format!(
                "output of {}x{} exceeds {} pixels",
                width, height, self.max_output_pixels
            )));
        }
        Ok(())
    }
}

impl Converter for ImageConverter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn convert(&self, request: &ConversionRequest<'_>) -> Result<ConvertedOutput, ConversionError> {
        let target = request.target;
        let output_format = OutputFormat::from_code(&target.code)
            .filter(|_| target.category == FormatCategory::Image)
            .ok_or_else(|| ConversionError::UnsupportedConversion {
                from: request.source_type.to_string(),
                to: target.code.clone(),
            })?;

        let default_settings;
        let settings = match request.settings {
            Some(settings) => settings,
            None => {
                default_settings = ConversionSettings::default();
                &default_settings
            }
        };

        request.checkpoint("decode")?;
        let mut img = self.decode(request.input)?;

        let mut reoriented = false;
        if settings.auto_orient {
            request.checkpoint("orient")?;
            let orientation = ImageMetadata::read_orientation(request.input);
            (img, reoriented) = ImageOrientation::apply_exif_orientation(img, orientation);
        }

        request.checkpoint("resize")?;
        let (width, height) = img.dimensions();
        let (target_width, target_height) = ImageResize::target_dimensions(settings, width, height);
        self.check_output_size(target_width, target_height)?;
        img = ImageResize::resize_exact(img, target_width, target_height);

        request.checkpoint("encode")?;
        let explicit_background = settings.background_color != ConversionSettings::default().background_color;
        if output_format.is_opaque() || explicit_background {
            let background = settings
                .background_rgb()
                .map_err(|e| ConversionError::EncodeFailed(e.to_string()))?;
            img = ImageEncoder::flatten(&img, background);
        }
        let mut data = ImageEncoder::encode(&img, output_format, settings.compress)?;

        if output_format.carries_exif() {
            if settings.strip_metadata {
                data = ImageMetadata::strip_exif(data);
            } else if !reoriented {
                // Rotated pixels would disagree with the source orientation tag
                if let Some(exif) = ImageMetadata::extract_exif(request.input) {
                    data = ImageMetadata::embed_exif(data, exif);
                }
            }
        }

        tracing::debug!(
            target_format = %target.code,
            width = target_width,
            height = target_height,
            output_bytes = data.len(),
            "Image conversion finished"
        );

        Ok(ConvertedOutput::for_target(data, target))
    }

    fn supports_cancellation(&self) -> bool {
        true
    }
}
