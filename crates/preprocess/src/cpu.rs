use crate::config::{
    DEFAULT_INPUT_SIZE, IMAGENET_MEAN, IMAGENET_STD, LETTERBOX_COLOR, Normalization,
};
use crate::{Preprocess, PreprocessResult, TransformParams};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::{Array, IxDyn};
use schema::CanonicalImage;

pub struct CpuPreProcessor {
    pub input_size: (u32, u32),
    normalization: Normalization,
    resizer: Resizer,
    letterboxed_buffer: Vec<u8>,
}

impl CpuPreProcessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self::with_normalization(input_size, Normalization::default())
    }

    pub fn with_normalization(input_size: (u32, u32), normalization: Normalization) -> Self {
        Self {
            input_size,
            normalization,
            resizer: Resizer::new(),
            letterboxed_buffer: vec![LETTERBOX_COLOR; rgb_len(input_size.0, input_size.1)],
        }
    }

    pub fn preprocess_from_u8_slice(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<(Array<f32, IxDyn>, TransformParams)> {
        let _s = span!("preprocess_image");

        tracing::trace!(
            width,
            height,
            pixel_bytes = pixels.len(),
            "Preprocessing image dimensions"
        );

        let expected_size = rgb_len(width, height);
        if pixels.len() != expected_size {
            anyhow::bail!(
                "Buffer size mismatch: expected {}, got {} bytes",
                expected_size,
                pixels.len()
            );
        }

        let transform = self.resize_and_letterbox(pixels, width, height)?;
        let input = self.normalize()?;

        Ok((input, transform))
    }

    fn resize_and_letterbox(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<TransformParams> {
        let _s = span!("resize_and_letterbox");

        let (input_width, input_height) = self.input_size;
        let scale = (input_width as f32 / width as f32).min(input_height as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).clamp(1, input_width);
        let new_height = ((height as f32 * scale) as u32).clamp(1, input_height);

        let offset_x = (input_width - new_width) / 2;
        let offset_y = (input_height - new_height) / 2;

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;

        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        self.resizer.resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.letterboxed_buffer.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let stride = rgb_len(input_width, 1);
        let row_bytes = rgb_len(new_width, 1);

        for y in 0..new_height as usize {
            let src_row = y * row_bytes;
            let dst_row = (y + offset_y as usize) * stride + rgb_len(offset_x, 1);

            self.letterboxed_buffer[dst_row..dst_row + row_bytes]
                .copy_from_slice(&resized_data[src_row..src_row + row_bytes]);
        }

        Ok(TransformParams {
            orig_width: width,
            orig_height: height,
            input_width,
            input_height,
            scale,
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
        })
    }

    fn normalize(&self) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let width = self.input_size.0 as usize;
        let height = self.input_size.1 as usize;
        let spatial = width * height;

        let (mean, std) = match self.normalization {
            Normalization::Unit => ([0.0; 3], [1.0; 3]),
            Normalization::ImageNet => (IMAGENET_MEAN, IMAGENET_STD),
        };

        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in self.letterboxed_buffer.chunks_exact(3).enumerate() {
            for c in 0..3 {
                let value = px[c] as f32 / 255.0;
                output[i + c * spatial] = (value - mean[c]) / std[c];
            }
        }

        Ok(Array::from_shape_vec(IxDyn(&[1, 3, height, width]), output)?)
    }
}

/// Byte length of an interleaved RGB buffer, computed in `usize`.
fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

impl Default for CpuPreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}

impl Preprocess for CpuPreProcessor {
    fn preprocess(&mut self, image: &CanonicalImage) -> anyhow::Result<PreprocessResult> {
        let (data, transform) =
            self.preprocess_from_u8_slice(image.pixels(), image.width(), image.height())?;
        Ok(PreprocessResult { data, transform })
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(width: u32, height: u32, value: u8) -> CanonicalImage {
        CanonicalImage::new(width, height, vec![value; (width * height * 3) as usize]).unwrap()
    }

    /// Test RGB preprocessing
    #[test]
    fn test_rgb_preprocessing() {
        let pixels = vec![
            255, 0, 0, // Red pixel
            0, 255, 0, // Green pixel
            0, 0, 255, // Blue pixel
            255, 255, 255, // White pixel
        ];
        let image = CanonicalImage::new(2, 2, pixels).unwrap();

        let mut preprocessor = CpuPreProcessor::default();
        let result = preprocessor.preprocess(&image);

        assert!(result.is_ok(), "RGB preprocessing should succeed");
        assert_eq!(result.unwrap().data.shape(), &[1, 3, 640, 640]);
    }

    /// Test buffer size mismatch detection
    #[test]
    fn test_buffer_size_mismatch_detection() {
        let pixels = vec![0u8; 200]; // Wrong size for 10x10

        let mut preprocessor = CpuPreProcessor::default();
        let result = preprocessor.preprocess_from_u8_slice(&pixels, 10, 10);

        assert!(result.is_err(), "Size mismatch should return error");
        assert!(
            result.unwrap_err().to_string().contains("mismatch"),
            "Error should mention mismatch"
        );
    }

    #[test]
    fn test_buffer_check_handles_dimensions_beyond_u32_bytes() {
        let mut preprocessor = CpuPreProcessor::new((8, 8));
        let err = preprocessor
            .preprocess_from_u8_slice(&[0u8; 12], 70_000, 70_000)
            .unwrap_err();

        assert!(err.to_string().contains("mismatch"), "{err}");
    }

    /// Test letterboxing preserves aspect ratio
    #[test]
    fn test_letterboxing_preserves_aspect_ratio() {
        // 800x600 image (4:3 aspect ratio)
        let image = solid_image(800, 600, 128);

        let mut preprocessor = CpuPreProcessor::new((512, 512));
        let result = preprocessor.preprocess(&image).unwrap();
        let t = result.transform;

        // Scale should be min(512/800, 512/600) = 512/800 = 0.64
        assert_eq!(t.scale, 0.64, "Scale should preserve aspect ratio");

        // Resized dimensions: 800*0.64 = 512, 600*0.64 = 384
        assert_eq!(t.offset_x, 0.0, "X offset should be 0 for wide image");
        assert_eq!(t.offset_y, 64.0, "Y offset should center vertically");
        assert_eq!((t.orig_width, t.orig_height), (800, 600));

        assert_eq!(result.data.shape(), &[1, 3, 512, 512]);
    }

    /// Extreme aspect ratios still produce at least one source row
    #[test]
    fn test_degenerate_aspect_ratio() {
        let image = solid_image(2000, 1, 10);

        let mut preprocessor = CpuPreProcessor::new((64, 64));
        let result = preprocessor.preprocess(&image).unwrap();

        assert_eq!(result.data.shape(), &[1, 3, 64, 64]);
        assert_eq!(result.transform.offset_y, 31.0);
    }

    #[test]
    fn test_unit_normalization() {
        let image = solid_image(4, 4, 255);

        let mut preprocessor = CpuPreProcessor::new((4, 4));
        let result = preprocessor.preprocess(&image).unwrap();

        for c in 0..3 {
            assert!((result.data[[0, c, 2, 2]] - 1.0).abs() < 1e-6);
        }
    }

    /// Test ImageNet normalization is applied
    #[test]
    fn test_imagenet_normalization() {
        // Mid gray 128 (0.502) with ImageNet norm:
        //   R: (0.502 - 0.485) / 0.229 ≈ 0.074
        //   G: (0.502 - 0.456) / 0.224 ≈ 0.205
        //   B: (0.502 - 0.406) / 0.225 ≈ 0.427
        let image = solid_image(2, 2, 128);

        let mut preprocessor =
            CpuPreProcessor::with_normalization((512, 512), Normalization::ImageNet);
        let output = preprocessor.preprocess(&image).unwrap().data;

        let r = output[[0, 0, 256, 256]];
        let g = output[[0, 1, 256, 256]];
        let b = output[[0, 2, 256, 256]];

        assert!((r - 0.074).abs() < 0.1, "R channel should be ~0.074 (got {})", r);
        assert!((g - 0.205).abs() < 0.1, "G channel should be ~0.205 (got {})", g);
        assert!((b - 0.427).abs() < 0.1, "B channel should be ~0.427 (got {})", b);
    }

    #[test]
    fn test_inverse_transform_round_trip() {
        let image = solid_image(800, 600, 0);
        let mut preprocessor = CpuPreProcessor::new((512, 512));
        let t = preprocessor.preprocess(&image).unwrap().transform;

        // (204.8, 204.8) in input space -> (320, 220) in the original
        let (x, y) = t.to_original(204.8, 204.8);
        assert!((x - 320.0).abs() < 0.1, "x = {x}");
        assert!((y - 220.0).abs() < 0.1, "y = {y}");

        // Points in the padding clamp to the image edge
        let (_, y) = t.to_original(10.0, 10.0);
        assert_eq!(y, 0.0);
        let (x, y) = t.to_original(600.0, 600.0);
        assert_eq!((x, y), (800.0, 600.0));
    }
}
