//! Raster recoding between JPG and PNG

use super::{Converter, ConverterError};
use crate::formats::Format;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError, ImageReader};
use std::path::{Path, PathBuf};

/// Longest edge kept after recoding
pub const MAX_DIMENSION: u32 = 1920;

/// Largest encoding the recoder will hand back
pub const JPEG_SIZE_BUDGET: u64 = 10 * 1024 * 1024;

const JPEG_START_QUALITY: u8 = 95;
const JPEG_MIN_QUALITY: u8 = 60;
const JPEG_QUALITY_STEP: u8 = 5;

/// Recode an image into the requested raster format
#[derive(Debug, Clone)]
pub struct ImageRecoder {
    budget: u64,
}

impl ImageRecoder {
    pub fn new() -> Self {
        Self {
            budget: JPEG_SIZE_BUDGET,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_budget(mut self, budget: u64) -> Self {
        self.budget = budget;
        self
    }
}

impl Default for ImageRecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Converter for ImageRecoder {
    async fn convert(
        &self,
        input: &Path,
        variant: Option<Format>,
    ) -> Result<PathBuf, ConverterError> {
        let target = match variant {
            Some(format @ (Format::Jpg | Format::Png)) => format,
            other => return Err(ConverterError::UnsupportedVariant(other)),
        };
        let input = input.to_path_buf();
        let budget = self.budget;

        tokio::task::spawn_blocking(move || recode(&input, target, budget)).await?
    }
}

fn recode(input: &Path, target: Format, budget: u64) -> Result<PathBuf, ConverterError> {
    let image = fit_within(load(input)?);
    let (width, height) = image.dimensions();
    tracing::debug!(width, height, %target, "Recoding image");

    let bytes = match target {
        Format::Jpg => encode_jpeg_within_budget(&image, budget)?,
        Format::Png => {
            let bytes = encode_png(&image)?;
            if bytes.len() as u64 > budget {
                return Err(ConverterError::OverBudget { limit: budget });
            }
            bytes
        }
        other => return Err(ConverterError::UnsupportedVariant(Some(other))),
    };

    let output = input.with_extension(target.extension());
    std::fs::write(&output, &bytes)?;
    Ok(output)
}

/// Decode whatever raster format the bytes actually hold
pub(super) fn load(input: &Path) -> Result<DynamicImage, ConverterError> {
    Ok(ImageReader::open(input)?.with_guessed_format()?.decode()?)
}

/// Downscale so neither edge exceeds `MAX_DIMENSION`, keeping the aspect ratio
fn fit_within(image: DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= MAX_DIMENSION && height <= MAX_DIMENSION {
        return image;
    }
    image.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
}

pub(super) fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf)
}

/// Step quality down until the encoding fits `budget`
fn encode_jpeg_within_budget(image: &DynamicImage, budget: u64) -> Result<Vec<u8>, ConverterError> {
    let mut quality = JPEG_START_QUALITY;
    loop {
        let bytes = encode_jpeg(image, quality)?;
        if bytes.len() as u64 <= budget {
            return Ok(bytes);
        }
        if quality <= JPEG_MIN_QUALITY {
            return Err(ConverterError::OverBudget { limit: budget });
        }
        tracing::debug!(quality, bytes = bytes.len(), budget, "JPEG over budget, lowering quality");
        quality -= JPEG_QUALITY_STEP;
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    image.write_with_encoder(PngEncoder::new_with_quality(
        &mut buf,
        CompressionType::Best,
        PngFilter::Adaptive,
    ))?;
    Ok(buf)
}
