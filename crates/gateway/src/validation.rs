use crate::error::InvalidInput;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// Containers the decoder is built with.
pub const SUPPORTED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Bmp,
    ImageFormat::WebP,
    ImageFormat::Tiff,
];

/// Cheap checks on raw upload bytes: size, emptiness, container signature and
/// header. Never decodes pixel data.
#[derive(Debug, Clone, Copy)]
pub struct ImageValidator {
    max_bytes: usize,
}

impl ImageValidator {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Returns the detected container format.
    pub fn validate(&self, bytes: &[u8], filename: &str) -> Result<ImageFormat, InvalidInput> {
        if bytes.len() > self.max_bytes {
            return Err(InvalidInput::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        if bytes.is_empty() {
            return Err(InvalidInput::Empty);
        }

        let format = image::guess_format(bytes)
            .map_err(|_| InvalidInput::MalformedImage("unrecognized file signature".into()))?;

        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(InvalidInput::MalformedImage(format!(
                "unsupported format {:?}",
                format
            )));
        }

        let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
            .into_dimensions()
            .map_err(|e| {
                tracing::debug!(filename, error = %e, "Unreadable image header");
                InvalidInput::MalformedImage(e.to_string())
            })?;

        tracing::trace!(filename, ?format, width, height, "Upload validated");
        Ok(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, RgbImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([10, 200, 30])))
    }

    #[test]
    fn accepts_every_supported_container() {
        let validator = ImageValidator::new(1024 * 1024);

        for format in SUPPORTED_FORMATS {
            let bytes = encode(rgb(16, 12), format);
            assert_eq!(
                validator.validate(&bytes, "board").unwrap(),
                format,
                "{format:?}"
            );
        }
    }

    #[test]
    fn accepts_grayscale() {
        let validator = ImageValidator::new(1024 * 1024);
        let bytes = encode(
            DynamicImage::ImageLuma8(GrayImage::new(9, 9)),
            ImageFormat::Png,
        );
        assert!(validator.validate(&bytes, "gray.png").is_ok());
    }

    #[test]
    fn rejects_empty_input() {
        let validator = ImageValidator::new(10);
        assert_eq!(validator.validate(&[], "empty.jpg"), Err(InvalidInput::Empty));
    }

    #[test]
    fn size_is_checked_before_content() {
        let validator = ImageValidator::new(4);

        // A valid image and plain garbage both fail the same way once over the cap.
        let image = encode(rgb(4, 4), ImageFormat::Png);
        assert_eq!(
            validator.validate(&image, "a.png"),
            Err(InvalidInput::TooLarge {
                size: image.len(),
                limit: 4
            })
        );
        assert!(matches!(
            validator.validate(b"not an image", "b.txt"),
            Err(InvalidInput::TooLarge { size: 12, .. })
        ));
    }

    #[test]
    fn exactly_at_limit_is_allowed() {
        let bytes = encode(rgb(4, 4), ImageFormat::Png);
        let validator = ImageValidator::new(bytes.len());
        assert!(validator.validate(&bytes, "edge.png").is_ok());
    }

    #[test]
    fn rejects_unknown_signature() {
        let validator = ImageValidator::new(1024);
        let err = validator
            .validate(b"plain text, not pixels", "notes.txt")
            .unwrap_err();
        assert!(matches!(err, InvalidInput::MalformedImage(_)));
    }

    #[test]
    fn rejects_signature_with_broken_header() {
        let validator = ImageValidator::new(1024);
        let png = encode(rgb(4, 4), ImageFormat::Png);

        // PNG magic followed by a truncated IHDR chunk
        let err = validator.validate(&png[..12], "cut.png").unwrap_err();
        assert!(matches!(err, InvalidInput::MalformedImage(_)));
    }

    #[test]
    fn rejects_recognized_but_unsupported_format() {
        let validator = ImageValidator::new(1024);
        let err = validator.validate(b"GIF89a\x01\x00\x01\x00", "anim.gif").unwrap_err();
        assert_eq!(
            err,
            InvalidInput::MalformedImage("unsupported format Gif".into())
        );
    }

    #[test]
    fn does_not_mutate_input() {
        let validator = ImageValidator::new(1024 * 1024);
        let bytes = encode(rgb(8, 8), ImageFormat::Jpeg);
        let before = bytes.clone();

        validator.validate(&bytes, "x.jpg").unwrap();
        assert_eq!(bytes, before);
    }
}
