//! Single-page PDF from a raster image
//!
//! The image is flattened onto white, encoded as a baseline JPEG and embedded
//! as a DCTDecode XObject filling one page. Page size equals the pixel size
//! at 72 dpi, so nothing is scaled.

use super::raster::{encode_jpeg, load};
use super::{Converter, ConverterError};
use crate::formats::Format;
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::path::{Path, PathBuf};

const EMBED_QUALITY: u8 = 95;

#[derive(Debug, Clone, Default)]
pub struct ImagePdfWriter;

impl ImagePdfWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Converter for ImagePdfWriter {
    async fn convert(
        &self,
        input: &Path,
        _variant: Option<Format>,
    ) -> Result<PathBuf, ConverterError> {
        let input = input.to_path_buf();
        tokio::task::spawn_blocking(move || write_pdf(&input)).await?
    }
}

fn write_pdf(input: &Path) -> Result<PathBuf, ConverterError> {
    let image = load(input)?;
    let (width, height) = image.dimensions();
    let flat = DynamicImage::ImageRgb8(flatten_on_white(&image));
    let jpeg = encode_jpeg(&flat, EMBED_QUALITY)?;

    let output = input.with_extension(Format::Pdf.extension());
    std::fs::write(&output, single_image_pdf(&jpeg, width, height))?;
    tracing::debug!(width, height, path = %output.display(), "Wrote image PDF");
    Ok(output)
}

/// Composite transparent pixels over a white background
fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| {
            let (c, a) = (u16::from(c), u16::from(a));
            // (c*a + 255*(255-a)) / 255 never exceeds 255
            u8::try_from((c * a + 255 * (255 - a)) / 255).unwrap_or(u8::MAX)
        };
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Serialize a one-page PDF that draws `jpeg` across the whole page
fn single_image_pdf(jpeg: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut pdf = PdfBuilder::new();

    pdf.object(b"<< /Type /Catalog /Pages 2 0 R >>");
    pdf.object(b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    pdf.object(
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {width} {height}] \
             /Resources << /XObject << /Im0 4 0 R >> >> /Contents 5 0 R >>"
        )
        .as_bytes(),
    );
    pdf.stream(
        &format!(
            "<< /Type /XObject /Subtype /Image /Width {width} /Height {height} \
             /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode /Length {} >>",
            jpeg.len()
        ),
        jpeg,
    );
    let content = format!("q {width} 0 0 {height} 0 0 cm /Im0 Do Q");
    pdf.stream(
        &format!("<< /Length {} >>", content.len()),
        content.as_bytes(),
    );

    pdf.finish(1)
}

/// Tracks object offsets while appending so the xref table is exact
struct PdfBuilder {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfBuilder {
    fn new() -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            out,
            offsets: Vec::new(),
        }
    }

    fn begin(&mut self) {
        self.offsets.push(self.out.len());
        let number = self.offsets.len();
        self.out
            .extend_from_slice(format!("{number} 0 obj\n").as_bytes());
    }

    fn object(&mut self, body: &[u8]) {
        self.begin();
        self.out.extend_from_slice(body);
        self.out.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, dictionary: &str, data: &[u8]) {
        self.begin();
        self.out.extend_from_slice(dictionary.as_bytes());
        self.out.extend_from_slice(b"\nstream\n");
        self.out.extend_from_slice(data);
        self.out.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn finish(mut self, root: usize) -> Vec<u8> {
        let xref_offset = self.out.len();
        let size = self.offsets.len() + 1;

        let mut xref = format!("xref\n0 {size}\n0000000000 65535 f \n");
        for offset in &self.offsets {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {size} /Root {root} 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n"
        ));
        self.out.extend_from_slice(xref.as_bytes());
        self.out
    }
}
