use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, ImageResult, Rgb, RgbImage};
use std::io::Cursor;

const SIZE: u32 = 200;
const BACKGROUND: Rgb<u8> = Rgb([211, 211, 211]);
const INK: Rgb<u8> = Rgb([255, 0, 0]);
const LINES: [&str; 2] = ["IMAGE URL", "BROKEN"];

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const SCALE: u32 = 2;
const LETTER_GAP: u32 = 2;
const LINE_GAP: u32 = 6;

/// The stand-in image shown for missing or broken product images: a light
/// gray square with "IMAGE URL / BROKEN" centered in red.
///
/// Rendered once and shared; the image is embedded as a `data:` URI so it
/// never needs fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    data_uri: String,
}

impl Placeholder {
    pub fn render() -> ImageResult<Self> {
        let canvas = draw();
        let mut png = Cursor::new(Vec::new());
        canvas.write_to(&mut png, ImageFormat::Png)?;

        Ok(Self {
            data_uri: format!("data:image/png;base64,{}", STANDARD.encode(png.into_inner())),
        })
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}

fn draw() -> RgbImage {
    let mut canvas = RgbImage::from_pixel(SIZE, SIZE, BACKGROUND);

    let line_height = GLYPH_HEIGHT * SCALE;
    let block_height = LINES.len() as u32 * line_height + (LINES.len() as u32 - 1) * LINE_GAP;
    let top = (SIZE - block_height) / 2;

    for (line_no, line) in LINES.iter().enumerate() {
        let advance = GLYPH_WIDTH * SCALE + LETTER_GAP;
        let width = line.chars().count() as u32 * advance - LETTER_GAP;
        let left = (SIZE - width) / 2;
        let y0 = top + line_no as u32 * (line_height + LINE_GAP);

        for (i, ch) in line.chars().enumerate() {
            draw_glyph(&mut canvas, glyph(ch), left + i as u32 * advance, y0);
        }
    }

    canvas
}

fn draw_glyph(canvas: &mut RgbImage, rows: [u8; 7], x0: u32, y0: u32) {
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            for dy in 0..SCALE {
                for dx in 0..SCALE {
                    canvas.put_pixel(x0 + col * SCALE + dx, y0 + row as u32 * SCALE + dy, INK);
                }
            }
        }
    }
}

/// 5x7 bitmaps for the letters of the placeholder text.
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        _ => [0; 7],
    }
}
