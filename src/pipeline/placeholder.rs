//! Deterministic "FAILED" placeholder image

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tracing::error;

use crate::engine::{GenerationResult, MAX_DIMENSION};
use crate::response::data_url;

/// Edge length used when a requested dimension is unusable
pub const FALLBACK_DIMENSION: u32 = 512;

const BACKGROUND: Rgb<u8> = Rgb([0x2A, 0x0A, 0x0A]);
const BORDER: Rgb<u8> = Rgb([0xFF, 0x4D, 0x4D]);
const LABEL: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);
const CAPTION: Rgb<u8> = Rgb([0xFF, 0xB3, 0xB3]);

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;

/// Render the placeholder for a failed item. Never fails; identical inputs
/// give byte-identical output.
pub fn synthesize(prompt: &str, width: u32, height: u32) -> GenerationResult {
    let width = usable_dimension(width);
    let height = usable_dimension(height);
    let image = render(width, height);

    let mut bytes = Vec::new();
    let encoded = image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png);
    if let Err(e) = encoded {
        error!(error = %e, width, height, "Failed to encode placeholder");
        bytes.clear();
    }

    GenerationResult {
        image_data: data_url::encode("image/png", &bytes),
        source_prompt: prompt.to_string(),
    }
}

/// Zero falls back to `FALLBACK_DIMENSION`; oversize is clamped.
pub fn usable_dimension(value: u32) -> u32 {
    if value == 0 {
        FALLBACK_DIMENSION
    } else {
        value.min(MAX_DIMENSION)
    }
}

fn render(width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, BACKGROUND);

    let thickness = (width.min(height) / 32).max(1);
    for y in 0..height {
        for x in 0..width {
            let edge = x < thickness || y < thickness || x >= width - thickness || y >= height - thickness;
            if edge {
                image.put_pixel(x, y, BORDER);
            }
        }
    }

    let label = "FAILED";
    let caption = format!("{}x{}", width, height);

    let label_scale = fit_scale(label, width * 4 / 5, height * 3 / 10);
    let caption_scale = (label_scale / 2).max(1);
    let gap = caption_scale * 3;

    let block_height = GLYPH_HEIGHT * label_scale + gap + GLYPH_HEIGHT * caption_scale;
    let top = height.saturating_sub(block_height) / 2;

    draw_text(&mut image, label, top, label_scale, LABEL);
    draw_text(
        &mut image,
        &caption,
        top + GLYPH_HEIGHT * label_scale + gap,
        caption_scale,
        CAPTION,
    );

    image
}

fn text_width(text: &str, scale: u32) -> u32 {
    let chars = text.chars().count() as u32;
    (chars * GLYPH_ADVANCE).saturating_sub(1) * scale
}

/// Largest integer scale that fits the box, at least 1
fn fit_scale(text: &str, max_width: u32, max_height: u32) -> u32 {
    let by_width = max_width / text_width(text, 1).max(1);
    let by_height = max_height / GLYPH_HEIGHT;
    by_width.min(by_height).max(1)
}

/// Draw `text` horizontally centered; pixels outside the image are dropped
fn draw_text(image: &mut RgbImage, text: &str, top: u32, scale: u32, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    let left = width.saturating_sub(text_width(text, scale)) / 2;

    for (index, ch) in text.chars().enumerate() {
        let origin_x = left + index as u32 * GLYPH_ADVANCE * scale;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let x0 = origin_x + col * scale;
                let y0 = top + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let (x, y) = (x0 + dx, y0 + dy);
                        if x < width && y < height {
                            image.put_pixel(x, y, color);
                        }
                    }
                }
            }
        }
    }
}

/// 5x7 bitmaps, one row per byte, high bit on the left
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'x' => [0b00000, 0b00000, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        _ => [0; 7],
    }
}
