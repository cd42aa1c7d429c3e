//! Pure Rust optimizer.
//!
//! | Format | Treatment |
//! |---|---|
//! | PNG | `oxipng` at preset `level`; Adam7 interlaced when `interlaced` |
//! | JPEG | decoded with `image`, re-encoded by `jpeg-encoder` at `jpeg_quality`, progressive when `progressive` |
//! | GIF | frames rewritten losslessly with `gif`, interlaced when `interlaced` |
//! | SVG | comments, XML declaration, doctype, `<metadata>` and inter-tag whitespace removed |

use super::backend::{ImageFormat, ImageOptimizer, OptimizeError, OptimizeParams};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, Default)]
pub struct RustOptimizer;

impl RustOptimizer {
    pub fn new() -> Self {
        Self
    }
}

/// Highest oxipng preset; the 0–7 level is clamped to it.
const MAX_PNG_PRESET: u8 = 6;

fn decode_error(format: ImageFormat, e: impl ToString) -> OptimizeError {
    OptimizeError::Decode {
        format,
        message: e.to_string(),
    }
}

fn encode_error(format: ImageFormat, e: impl ToString) -> OptimizeError {
    OptimizeError::Encode {
        format,
        message: e.to_string(),
    }
}

fn optimize_png(data: &[u8], params: &OptimizeParams) -> Result<Vec<u8>, OptimizeError> {
    let mut options = oxipng::Options::from_preset(params.level.min(MAX_PNG_PRESET));
    options.interlace = Some(if params.interlaced {
        oxipng::Interlacing::Adam7
    } else {
        oxipng::Interlacing::None
    });
    // Always re-encode; the caller keeps the original when it is smaller.
    options.force = true;
    oxipng::optimize_from_memory(data, &options).map_err(|e| encode_error(ImageFormat::Png, e))
}

fn optimize_jpeg(data: &[u8], params: &OptimizeParams) -> Result<Vec<u8>, OptimizeError> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| decode_error(ImageFormat::Jpeg, e))?;
    // JPEG has no alpha channel.
    let rgb = img.to_rgb8();
    let (width, height) = (
        u16::try_from(rgb.width()).map_err(|e| encode_error(ImageFormat::Jpeg, e))?,
        u16::try_from(rgb.height()).map_err(|e| encode_error(ImageFormat::Jpeg, e))?,
    );

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, params.jpeg_quality.clamp(1, 100));
    encoder.set_progressive(params.progressive);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| encode_error(ImageFormat::Jpeg, e))?;
    Ok(out)
}

/// Reorder the rows of an indexed frame into the four GIF interlace passes.
fn interlace_rows(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    const PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];
    let mut out = Vec::with_capacity(pixels.len());
    for (start, step) in PASSES {
        for row in (start..height).step_by(step) {
            out.extend_from_slice(&pixels[row * width..(row + 1) * width]);
        }
    }
    out
}

fn optimize_gif(data: &[u8], params: &OptimizeParams) -> Result<Vec<u8>, OptimizeError> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options
        .read_info(data)
        .map_err(|e| decode_error(ImageFormat::Gif, e))?;
    let palette = decoder.global_palette().unwrap_or_default().to_vec();
    let (width, height) = (decoder.width(), decoder.height());
    let repeat = decoder.repeat();

    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, width, height, &palette)
            .map_err(|e| encode_error(ImageFormat::Gif, e))?;
        // `Finite(0)` means the source had no loop extension.
        if repeat != gif::Repeat::Finite(0) {
            encoder
                .set_repeat(repeat)
                .map_err(|e| encode_error(ImageFormat::Gif, e))?;
        }

        while let Some(frame) = decoder
            .read_next_frame()
            .map_err(|e| decode_error(ImageFormat::Gif, e))?
        {
            let mut frame = frame.clone();
            // Decoded frames are always in display row order.
            let (w, h) = (usize::from(frame.width), usize::from(frame.height));
            if frame.buffer.len() != w * h {
                return Err(decode_error(ImageFormat::Gif, "frame size mismatch"));
            }
            if params.interlaced {
                frame.buffer = Cow::Owned(interlace_rows(&frame.buffer, w, h));
            }
            frame.interlaced = params.interlaced;
            encoder
                .write_frame(&frame)
                .map_err(|e| encode_error(ImageFormat::Gif, e))?;
        }
        // Dropping the encoder writes the trailer.
    }
    Ok(out)
}

static SVG_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<\?xml.*?\?>|<!DOCTYPE[^>\[]*(\[.*?\])?\s*>|<!--.*?-->|<metadata\b.*?</metadata>")
        .expect("valid svg noise regex")
});

static SVG_GAPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid svg whitespace regex"));

/// Strip what renderers ignore from an SVG document.
pub fn minify_svg(data: &[u8]) -> Result<Vec<u8>, OptimizeError> {
    let text = std::str::from_utf8(data).map_err(|e| decode_error(ImageFormat::Svg, e))?;
    let text = SVG_NOISE.replace_all(text, "");
    let text = SVG_GAPS.replace_all(&text, "><");
    Ok(text.trim().as_bytes().to_vec())
}

impl ImageOptimizer for RustOptimizer {
    fn optimize(
        &self,
        data: &[u8],
        format: ImageFormat,
        params: &OptimizeParams,
    ) -> Result<Vec<u8>, OptimizeError> {
        match format {
            ImageFormat::Png => optimize_png(data, params),
            ImageFormat::Jpeg => optimize_jpeg(data, params),
            ImageFormat::Gif => optimize_gif(data, params),
            ImageFormat::Svg => minify_svg(data),
        }
    }
}
