//! EXIF handling: orientation lookup, stripping and carry-over

use bytes::Bytes;
use img_parts::{DynImage, ImageEXIF};
use std::io::Cursor;

pub struct ImageMetadata;

impl ImageMetadata {
    /// Read the EXIF orientation tag (1-8). Returns 1 when absent or unreadable.
    pub fn read_orientation(data: &[u8]) -> u8 {
        let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
            Ok(exif) => exif,
            Err(_) => return 1,
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .filter(|value| (1..=8).contains(value))
            .map(|value| value as u8)
            .unwrap_or(1)
    }

    /// Rotation and flips for an EXIF orientation: (rotate_angle, flip_horizontal, flip_vertical).
    ///
    /// The rotation is applied before the flip.
    pub fn orientation_transforms(orientation: u8) -> (Option<u16>, bool, bool) {
        match orientation {
            2 => (None, true, false),
            3 => (Some(180), false, false),
            4 => (None, false, true),
            5 => (Some(90), true, false),
            6 => (Some(90), false, false),
            7 => (Some(270), true, false),
            8 => (Some(270), false, false),
            _ => (None, false, false),
        }
    }

    /// Raw EXIF segment of a JPEG, PNG or WebP container.
    pub fn extract_exif(data: &[u8]) -> Option<Bytes> {
        match DynImage::from_bytes(Bytes::copy_from_slice(data)) {
            Ok(Some(image)) => image.exif(),
            _ => None,
        }
    }

    /// Remove EXIF from an encoded image. Containers img-parts cannot parse are returned unchanged.
    pub fn strip_exif(data: Bytes) -> Bytes {
        Self::replace_exif(data, None)
    }

    /// Write `exif` into an encoded JPEG, PNG or WebP. Other containers are returned unchanged.
    pub fn embed_exif(data: Bytes, exif: Bytes) -> Bytes {
        Self::replace_exif(data, Some(exif))
    }

    fn replace_exif(data: Bytes, exif: Option<Bytes>) -> Bytes {
        match DynImage::from_bytes(data.clone()) {
            Ok(Some(mut image)) => {
                image.set_exif(exif);
                image.encoder().bytes()
            }
            _ => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn encoded(format: ImageFormat) -> Bytes {
        let img = RgbImage::from_pixel(8, 8, Rgb([255, 0, 0]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        Bytes::from(buffer)
    }

    /// Minimal little-endian TIFF header with a single Orientation entry.
    fn exif_with_orientation(orientation: u16) -> Bytes {
        let mut tiff = vec![b'I', b'I', 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00];
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x0112u16.to_le_bytes());
        tiff.extend_from_slice(&3u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&orientation.to_le_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_le_bytes());
        Bytes::from(tiff)
    }

    #[test]
    fn test_no_exif_is_normal_orientation() {
        let png = encoded(ImageFormat::Png);
        assert_eq!(ImageMetadata::read_orientation(&png), 1);
        assert_eq!(ImageMetadata::read_orientation(b"garbage"), 1);
        assert!(ImageMetadata::extract_exif(&png).is_none());
    }

    #[test]
    fn test_embed_then_read_orientation() {
        let tagged = ImageMetadata::embed_exif(encoded(ImageFormat::Jpeg), exif_with_orientation(6));
        assert_eq!(ImageMetadata::read_orientation(&tagged), 6);
        assert!(ImageMetadata::extract_exif(&tagged).is_some());

        let stripped = ImageMetadata::strip_exif(tagged);
        assert!(ImageMetadata::extract_exif(&stripped).is_none());
        assert_eq!(ImageMetadata::read_orientation(&stripped), 1);
    }

    #[test]
    fn test_orientation_transforms() {
        assert_eq!(ImageMetadata::orientation_transforms(1), (None, false, false));
        assert_eq!(ImageMetadata::orientation_transforms(6), (Some(90), false, false));
        assert_eq!(ImageMetadata::orientation_transforms(8), (Some(270), false, false));
        assert_eq!(ImageMetadata::orientation_transforms(0), (None, false, false));
        assert_eq!(ImageMetadata::orientation_transforms(9), (None, false, false));
    }

    #[test]
    fn test_strip_unknown_container_is_noop() {
        let data = Bytes::from_static(b"BM not parsed by img-parts");
        assert_eq!(ImageMetadata::strip_exif(data.clone()), data);
    }
}
