use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use ndarray::Array3;

/// Raw upload bytes could not be decoded into an image.
#[derive(Debug, thiserror::Error)]
#[error("not a valid image: {0}")]
pub struct DecodeError(#[from] image::ImageError);

/// Turns uploaded image bytes into the fixed-shape tensor the ensemble
/// consumes: grayscale, circular vignette mask, three replicated channels,
/// bilinear resize, values scaled to [0, 1].
#[derive(Debug, Clone)]
pub struct Preprocessor {
    size: u32,
    mask_radius_ratio: f32,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            size: 224,
            mask_radius_ratio: 0.8,
        }
    }
}

impl Preprocessor {
    pub fn new(size: u32, mask_radius_ratio: f32) -> Self {
        Self {
            size,
            mask_radius_ratio,
        }
    }

    /// Decodes `bytes` and produces the normalized input tensor together with
    /// the decoded image. The tensor shape is always `(size, size, 3)` with
    /// every value in [0, 1], regardless of the source resolution or aspect
    /// ratio.
    pub fn normalize(&self, bytes: &[u8]) -> Result<(Array3<f32>, DynamicImage), DecodeError> {
        let decoded = image::load_from_memory(bytes)?;
        let gray = decoded.to_luma8();
        let (width, height) = gray.dimensions();

        let vignetted = self.vignette(&gray);

        // Replicate the masked channel so the tensor stays three-channel.
        let mut rgb = RgbImage::new(width, height);
        for (x, y, pixel) in vignetted.enumerate_pixels() {
            let v = pixel.0[0];
            rgb.put_pixel(x, y, Rgb([v, v, v]));
        }

        // Direct resize, no letterboxing; narrow uploads get distorted rather
        // than padded.
        let resized = image::imageops::resize(&rgb, self.size, self.size, FilterType::Triangle);

        let side = self.size as usize;
        let mut tensor = Array3::<f32>::zeros((side, side, 3));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[y as usize, x as usize, channel]] =
                    f32::from(pixel.0[channel]) / 255.0;
            }
        }

        Ok((tensor, decoded))
    }

    /// Zeroes every pixel strictly outside the centered circle of radius
    /// `floor(mask_radius_ratio * min(width, height) / 2)`.
    fn vignette(&self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        let cx = f64::from(width / 2);
        let cy = f64::from(height / 2);
        let half = u32::min(width, height) / 2;
        let radius = (f64::from(half) * f64::from(self.mask_radius_ratio)).floor();
        let radius_sq = radius * radius;

        let mut masked = GrayImage::new(width, height);
        for (x, y, pixel) in gray.enumerate_pixels() {
            let dx = f64::from(x) - cx;
            let dy = f64::from(y) - cy;
            let value = if dx * dx + dy * dy <= radius_sq {
                pixel.0[0]
            } else {
                0
            };
            masked.put_pixel(x, y, image::Luma([value]));
        }
        masked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat};
    use std::io::Cursor;

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn uniform_image(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    #[test]
    fn output_shape_and_range_hold_for_any_aspect_ratio() {
        let preprocessor = Preprocessor::default();
        for (w, h) in [(224, 224), (640, 480), (37, 100), (100, 37), (1, 1)] {
            let bytes = png_bytes(&uniform_image(w, h, 180));
            let (tensor, decoded) = preprocessor.normalize(&bytes).unwrap();
            assert_eq!(tensor.dim(), (224, 224, 3));
            assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
            assert_eq!(decoded.width(), w);
            assert_eq!(decoded.height(), h);
        }
    }

    #[test]
    fn uniform_gray_keeps_value_inside_mask_and_zero_outside() {
        let value = 200u8;
        let bytes = png_bytes(&uniform_image(300, 300, value));
        let (tensor, _) = Preprocessor::default().normalize(&bytes).unwrap();

        let expected = f32::from(value) / 255.0;
        let center = tensor[[112, 112, 0]];
        assert!(
            (center - expected).abs() < 1e-2,
            "center {center} vs expected {expected}"
        );
        // Corners sit well outside the 0.8 radius circle.
        for &(y, x) in &[(0, 0), (0, 223), (223, 0), (223, 223)] {
            assert_eq!(tensor[[y, x, 0]], 0.0, "corner ({y}, {x}) not masked");
        }
    }

    #[test]
    fn channels_are_replicated_from_grayscale() {
        let bytes = png_bytes(&uniform_image(128, 128, 90));
        let (tensor, _) = Preprocessor::default().normalize(&bytes).unwrap();
        for y in 0..224 {
            for x in 0..224 {
                let r = tensor[[y, x, 0]];
                assert_eq!(r, tensor[[y, x, 1]]);
                assert_eq!(r, tensor[[y, x, 2]]);
            }
        }
    }

    #[test]
    fn non_image_bytes_fail_with_decode_error() {
        let result = Preprocessor::default().normalize(b"definitely not an image");
        assert!(result.is_err());
    }

    #[test]
    fn truncated_image_fails_with_decode_error() {
        let mut bytes = png_bytes(&uniform_image(64, 64, 128));
        bytes.truncate(bytes.len() / 2);
        assert!(Preprocessor::default().normalize(&bytes).is_err());
    }
}
