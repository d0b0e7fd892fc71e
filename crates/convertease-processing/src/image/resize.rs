use convertease_core::models::{ConversionSettings, ResizeMode, MAX_DIMENSION, MIN_DIMENSION};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Output dimensions for a resize mode.
    ///
    /// `custom` is exact with no aspect lock; `percentage` scales both sides.
    /// Both are clamped to the supported dimension range.
    pub fn target_dimensions(settings: &ConversionSettings, width: u32, height: u32) -> (u32, u32) {
        let clamp = |v: u64| v.clamp(MIN_DIMENSION as u64, MAX_DIMENSION as u64) as u32;

        match settings.resize_mode {
            ResizeMode::Original => (width, height),
            ResizeMode::Custom => (
                clamp(settings.width as u64),
                clamp(settings.height as u64),
            ),
            ResizeMode::Percentage => {
                let scale = |v: u32| (v as u64 * settings.percentage as u64 + 50) / 100;
                (clamp(scale(width)), clamp(scale(height)))
            }
        }
    }

    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            FilterType::Triangle
        } else if max_ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    /// Resize to exact dimensions; a no-op when they already match.
    pub fn resize_exact(img: DynamicImage, width: u32, height: u32) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        if (orig_width, orig_height) == (width, height) {
            return img;
        }

        let filter = Self::select_filter(orig_width, orig_height, width, height);
        tracing::debug!(
            from_width = orig_width,
            from_height = orig_height,
            to_width = width,
            to_height = height,
            filter = ?filter,
            "Resizing image"
        );
        img.resize_exact(width, height, filter)
    }
}
