//! Page bitmap normalization.
//!
//! Turns scanned input documents (multi-page TIFF, PNG, JPEG) into
//! provider-ready bitmaps: one RGB PNG per page, longest side capped.

use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, ImageFormat, RgbImage};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::types::page::{PageImage, ProcessedPages};

/// File extensions the preprocessor accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["tiff", "tif", "png", "jpg", "jpeg"];

/// Normalizes scanned pages into provider-ready bitmaps.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    max_dimension: u32,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePreprocessor {
    /// Create a preprocessor with the default 4096px dimension cap.
    pub fn new() -> Self {
        Self {
            max_dimension: 4096,
        }
    }

    /// Set the maximum dimension (width or height) in pixels.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    /// Process one input document into normalized pages.
    ///
    /// The format is sniffed from the bytes; multi-page TIFFs are split into
    /// one page per frame.
    pub fn process(&self, data: &[u8]) -> Result<ProcessedPages> {
        let format = image::guess_format(data)?;

        let pages = match format {
            ImageFormat::Tiff => self.split_tiff(data)?,
            ImageFormat::Png | ImageFormat::Jpeg => {
                let decoded = image::load_from_memory_with_format(data, format)?;
                vec![self.normalize(decoded, 1)?]
            }
            other => {
                return Err(ExtractionError::UnsupportedFormat {
                    format: format!("{other:?}"),
                })
            }
        };

        Ok(ProcessedPages { pages })
    }

    /// Split a (possibly multi-page) TIFF into normalized pages.
    fn split_tiff(&self, data: &[u8]) -> Result<Vec<PageImage>> {
        let mut decoder = Decoder::new(Cursor::new(data))?;
        let mut pages = Vec::new();

        loop {
            let page_number = pages.len() + 1;
            let decoded = decode_tiff_frame(&mut decoder)?;
            pages.push(self.normalize(decoded, page_number)?);

            if !decoder.more_images() {
                break;
            }
            decoder.next_image()?;
        }

        Ok(pages)
    }

    /// Convert to RGB, cap dimensions, encode as PNG.
    fn normalize(&self, image: DynamicImage, page_number: usize) -> Result<PageImage> {
        let (width, height) = (image.width(), image.height());

        let image = if width > self.max_dimension || height > self.max_dimension {
            debug!(
                width,
                height,
                max = self.max_dimension,
                "resizing page to fit provider limits"
            );
            image.resize(
                self.max_dimension,
                self.max_dimension,
                image::imageops::FilterType::Lanczos3,
            )
        } else {
            image
        };

        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut bytes = Vec::new();
        PngEncoder::new(Cursor::new(&mut bytes)).write_image(
            rgb.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )?;

        Ok(PageImage {
            bytes,
            width,
            height,
            page_number,
        })
    }
}

/// Decode the current TIFF frame into a `DynamicImage`.
fn decode_tiff_frame<R>(decoder: &mut Decoder<R>) -> Result<DynamicImage>
where
    R: std::io::Read + std::io::Seek,
{
    let (width, height) = decoder.dimensions()?;
    let color_type = decoder.colortype()?;
    let result = decoder.read_image()?;

    let buffer = match result {
        DecodingResult::U8(buffer) => buffer,
        // Scanner TIFFs are occasionally 16-bit; narrow to 8.
        DecodingResult::U16(buffer) => buffer.into_iter().map(|v| (v >> 8) as u8).collect(),
        _ => {
            return Err(ExtractionError::UnsupportedFormat {
                format: format!("TIFF sample format for {color_type:?}"),
            })
        }
    };

    let image = match color_type {
        ColorType::RGB(_) => RgbImage::from_raw(width, height, buffer)
            .map(DynamicImage::ImageRgb8),
        ColorType::RGBA(_) => image::RgbaImage::from_raw(width, height, buffer)
            .map(DynamicImage::ImageRgba8),
        ColorType::Gray(_) => image::GrayImage::from_raw(width, height, buffer)
            .map(DynamicImage::ImageLuma8),
        other => {
            return Err(ExtractionError::UnsupportedFormat {
                format: format!("TIFF color type {other:?}"),
            })
        }
    };

    image.ok_or_else(|| ExtractionError::UnsupportedFormat {
        format: "TIFF frame shorter than its dimensions".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{colortype, TiffEncoder};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let rgb = RgbImage::from_pixel(width, height, image::Rgb([250, 250, 250]));
        let mut bytes = Vec::new();
        PngEncoder::new(Cursor::new(&mut bytes))
            .write_image(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        bytes
    }

    fn multipage_tiff(pages: usize, width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut bytes).unwrap();
            for page in 0..pages {
                let shade = 255 - (page as u8) * 40;
                let data = vec![shade; (width * height * 3) as usize];
                encoder
                    .write_image::<colortype::RGB8>(width, height, &data)
                    .unwrap();
            }
        }
        bytes.into_inner()
    }

    #[test]
    fn png_becomes_a_single_page() {
        let processed = ImagePreprocessor::new().process(&png_bytes(100, 60)).unwrap();
        assert_eq!(processed.page_count(), 1);
        assert_eq!(processed.pages[0].page_number, 1);
        assert_eq!(processed.pages[0].width, 100);
        assert_eq!(processed.pages[0].mime_type(), "image/png");
    }

    #[test]
    fn multipage_tiff_is_split_in_page_order() {
        let processed = ImagePreprocessor::new()
            .process(&multipage_tiff(3, 40, 40))
            .unwrap();
        assert_eq!(processed.page_count(), 3);
        let numbers: Vec<_> = processed.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn oversized_pages_are_capped_preserving_aspect() {
        let processed = ImagePreprocessor::new()
            .with_max_dimension(64)
            .process(&png_bytes(200, 100))
            .unwrap();
        let page = &processed.pages[0];
        assert_eq!(page.width, 64);
        assert_eq!(page.height, 32);
    }

    #[test]
    fn small_pages_are_left_unscaled() {
        let processed = ImagePreprocessor::new().process(&png_bytes(32, 32)).unwrap();
        assert_eq!(processed.pages[0].width, 32);
        assert_eq!(processed.pages[0].height, 32);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let result = ImagePreprocessor::new().process(b"not an image");
        assert!(result.is_err());
    }
}
