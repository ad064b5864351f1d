use image::{imageops, DynamicImage};
use std::io::Cursor;

/// Image orientation operations (rotation and flipping)
///
/// Re-encoding drops the EXIF block, so the orientation has to be baked into the
/// pixels first or portrait photos come out sideways.
pub struct ImageOrientation;

impl ImageOrientation {
    /// Read the EXIF orientation tag (1-8); 1 (normal) when absent or unreadable
    pub fn read_exif_orientation(data: &[u8]) -> u8 {
        let mut cursor = Cursor::new(data);
        let exif = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(_) => return 1,
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .filter(|v| (1..=8).contains(v))
            .map(|v| v as u8)
            .unwrap_or(1)
    }

    /// Get rotation and flip operations needed for a given EXIF orientation
    /// Returns (rotate_angle, flip_horizontal, flip_vertical)
    pub fn get_orientation_transforms(orientation: u8) -> (Option<u16>, bool, bool) {
        match orientation {
            1 => (None, false, false),      // Normal
            2 => (None, true, false),       // Mirror horizontal
            3 => (Some(180), false, false), // Rotate 180
            4 => (None, false, true),       // Mirror vertical
            5 => (Some(270), true, false),  // Mirror horizontal + Rotate 270 CW
            6 => (Some(90), false, false),  // Rotate 90 CW
            7 => (Some(90), true, false),   // Mirror horizontal + Rotate 90 CW
            8 => (Some(270), false, false), // Rotate 270 CW
            _ => (None, false, false),
        }
    }

    /// Apply EXIF orientation correction to a decoded image
    pub fn apply_exif_orientation(mut img: DynamicImage, data: &[u8]) -> DynamicImage {
        let orientation = Self::read_exif_orientation(data);
        if orientation == 1 {
            return img;
        }

        let (rotate, flip_h, flip_v) = Self::get_orientation_transforms(orientation);

        tracing::debug!(
            orientation = orientation,
            rotate = ?rotate,
            flip_horizontal = flip_h,
            flip_vertical = flip_v,
            "Applying EXIF orientation"
        );

        if let Some(angle) = rotate {
            img = Self::rotate_by_angle(img, angle);
        }
        if flip_h {
            img = DynamicImage::ImageRgba8(imageops::flip_horizontal(&img.to_rgba8()));
        }
        if flip_v {
            img = DynamicImage::ImageRgba8(imageops::flip_vertical(&img.to_rgba8()));
        }

        img
    }

    /// Rotate image by 90, 180, or 270 degrees clockwise
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
    use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_read_exif_orientation_no_exif() {
        assert_eq!(ImageOrientation::read_exif_orientation(&png_bytes(4, 2)), 1);
        assert_eq!(ImageOrientation::read_exif_orientation(b"garbage"), 1);
    }

    #[test]
    fn test_get_orientation_transforms_all_values() {
        assert_eq!(
            ImageOrientation::get_orientation_transforms(1),
            (None, false, false)
        );
        assert_eq!(
            ImageOrientation::get_orientation_transforms(6),
            (Some(90), false, false)
        );
        assert_eq!(
            ImageOrientation::get_orientation_transforms(8),
            (Some(270), false, false)
        );
        assert_eq!(
            ImageOrientation::get_orientation_transforms(2),
            (None, true, false)
        );
        assert_eq!(
            ImageOrientation::get_orientation_transforms(42),
            (None, false, false)
        );
    }

    #[test]
    fn test_rotate_swaps_dimensions() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(40, 10));
        let rotated = ImageOrientation::rotate_by_angle(img.clone(), 90);
        assert_eq!(rotated.dimensions(), (10, 40));
        let same = ImageOrientation::rotate_by_angle(img, 180);
        assert_eq!(same.dimensions(), (40, 10));
    }

    #[test]
    fn test_apply_without_exif_is_identity() {
        let data = png_bytes(8, 3);
        let img = image::load_from_memory(&data).unwrap();
        let out = ImageOrientation::apply_exif_orientation(img, &data);
        assert_eq!(out.dimensions(), (8, 3));
    }
}
