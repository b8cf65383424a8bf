use image::{Rgb, RgbImage};

use super::glyphs;

pub const DIAGNOSTIC_WIDTH: u32 = 640;
pub const DIAGNOSTIC_HEIGHT: u32 = 480;

const MARGIN: u32 = 10;
const SCALE: u32 = 2;

/// Render an error description as a black frame with white text.
///
/// Long lines are wrapped to the frame width; text that does not fit
/// vertically is dropped.
pub fn diagnostic_frame(message: &str) -> RgbImage {
    let mut image = RgbImage::from_pixel(DIAGNOSTIC_WIDTH, DIAGNOSTIC_HEIGHT, Rgb([0, 0, 0]));
    let columns = ((DIAGNOSTIC_WIDTH - 2 * MARGIN) / glyphs::advance(SCALE)) as usize;
    let rows = ((DIAGNOSTIC_HEIGHT - 2 * MARGIN) / glyphs::line_height(SCALE)) as usize;

    let white = Rgb([255, 255, 255]);
    for (row, line) in wrap(message, columns).iter().take(rows).enumerate() {
        let y = MARGIN + row as u32 * glyphs::line_height(SCALE);
        glyphs::draw_text_line(&mut image, MARGIN as i32, y as i32, line, white, SCALE);
    }
    image
}

fn wrap(message: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in message.lines() {
        let chars: Vec<char> = paragraph.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }
        for chunk in chars.chunks(columns.max(1)) {
            lines.push(chunk.iter().collect());
        }
    }
    lines
}
