use super::metadata::ImageMetadata;
use image::DynamicImage;

/// Rotation and flipping used for EXIF auto-orientation
pub struct ImageOrientation;

impl ImageOrientation {
    /// Rotate and flip `img` upright according to an EXIF orientation value.
    ///
    /// Returns the image and whether any pixels moved.
    pub fn apply_exif_orientation(img: DynamicImage, orientation: u8) -> (DynamicImage, bool) {
        let (rotate, flip_h, flip_v) = ImageMetadata::orientation_transforms(orientation);
        if rotate.is_none() && !flip_h && !flip_v {
            return (img, false);
        }

        tracing::debug!(
            orientation = orientation,
            rotate = ?rotate,
            flip_horizontal = flip_h,
            flip_vertical = flip_v,
            "Applying EXIF orientation"
        );

        let mut img = match rotate {
            Some(angle) => Self::rotate_by_angle(img, angle),
            None => img,
        };
        if flip_h {
            img = img.fliph();
        }
        if flip_v {
            img = img.flipv();
        }

        (img, true)
    }

    /// Rotate clockwise by 90, 180 or 270 degrees. Other angles leave the image untouched.
    pub fn rotate_by_angle(img: DynamicImage, angle: u16) -> DynamicImage {
        match angle {
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            _ => img,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn marked(width: u32, height: u32) -> DynamicImage {
        // Red top-left pixel, everything else blue
        let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        DynamicImage::ImageRgba8(img)
    }

    fn is_red(img: &DynamicImage, x: u32, y: u32) -> bool {
        img.get_pixel(x, y) == Rgba([255, 0, 0, 255])
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let img = marked(4, 2);
        assert_eq!(ImageOrientation::rotate_by_angle(img.clone(), 90).dimensions(), (2, 4));
        assert_eq!(ImageOrientation::rotate_by_angle(img.clone(), 180).dimensions(), (4, 2));
        assert_eq!(ImageOrientation::rotate_by_angle(img.clone(), 270).dimensions(), (2, 4));
        assert_eq!(ImageOrientation::rotate_by_angle(img, 45).dimensions(), (4, 2));
    }

    #[test]
    fn test_normal_orientation_is_untouched() {
        let (img, changed) = ImageOrientation::apply_exif_orientation(marked(4, 2), 1);
        assert!(!changed);
        assert!(is_red(&img, 0, 0));
    }

    #[test]
    fn test_orientation_6_rotates_clockwise() {
        let (img, changed) = ImageOrientation::apply_exif_orientation(marked(4, 2), 6);
        assert!(changed);
        assert_eq!(img.dimensions(), (2, 4));
        // Top-left moves to top-right after a clockwise quarter turn
        assert!(is_red(&img, 1, 0));
    }

    #[test]
    fn test_mirror_orientations() {
        let (img, _) = ImageOrientation::apply_exif_orientation(marked(4, 2), 2);
        assert!(is_red(&img, 3, 0));

        let (img, _) = ImageOrientation::apply_exif_orientation(marked(4, 2), 4);
        assert!(is_red(&img, 0, 1));

        // Transpose keeps the top-left corner in place
        let (img, _) = ImageOrientation::apply_exif_orientation(marked(4, 2), 5);
        assert_eq!(img.dimensions(), (2, 4));
        assert!(is_red(&img, 0, 0));
    }
}
