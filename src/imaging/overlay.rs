//! Annotation overlays: frames, label badges, and a tiny bitmap font.
//!
//! Labels are short and machine-generated (`#1 identity`, `S2`), so a
//! built-in 5×7 font covering digits, Latin letters (case-folded), `#`, `-`,
//! `_` and space is enough. Anything else renders as `?`.

use super::calculations::PixelRect;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

/// Annotation red (`#ef4444`).
pub const ANNOTATION_RED: Rgb<u8> = Rgb([0xef, 0x44, 0x44]);
pub const LABEL_WHITE: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
/// Pixels per font pixel.
const TEXT_SCALE: u32 = 2;
/// Horizontal advance per character, including one font pixel of spacing.
const ADVANCE: u32 = (GLYPH_W + 1) * TEXT_SCALE;

/// Rendered height of one line of label text.
pub const TEXT_HEIGHT: u32 = GLYPH_H * TEXT_SCALE;

fn rect(left: u32, top: u32, width: u32, height: u32) -> Option<Rect> {
    (width > 0 && height > 0).then(|| Rect::at(left as i32, top as i32).of_size(width, height))
}

/// Draw a rectangular frame `stroke` pixels thick, inside `area`.
pub fn draw_frame(img: &mut RgbImage, area: PixelRect, stroke: u32, color: Rgb<u8>) {
    for inset in 0..stroke {
        let (Some(w), Some(h)) = (
            area.width.checked_sub(inset * 2),
            area.height.checked_sub(inset * 2),
        ) else {
            break;
        };
        if let Some(r) = rect(area.left + inset, area.top + inset, w, h) {
            draw_hollow_rect_mut(img, r, color);
        }
    }
}

/// Pixel width of `text` once rendered.
pub fn text_width(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    (chars * ADVANCE).saturating_sub(TEXT_SCALE)
}

/// Longest prefix of `text` that renders within `max_width` pixels.
pub fn fit_text(text: &str, max_width: u32) -> &str {
    let max_chars = ((max_width + TEXT_SCALE) / ADVANCE) as usize;
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Render `text` with its top-left corner at `(x, y)`, clipped to the image.
pub fn draw_text(img: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
    let (img_w, img_h) = img.dimensions();
    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as u32 * ADVANCE;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_W {
                if (bits >> (GLYPH_W - 1 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..TEXT_SCALE {
                    for dx in 0..TEXT_SCALE {
                        let px = origin_x + col * TEXT_SCALE + dx;
                        let py = y + row as u32 * TEXT_SCALE + dy;
                        if px < img_w && py < img_h {
                            img.put_pixel(px, py, color);
                        }
                    }
                }
            }
        }
    }
}

/// A filled badge with `text` drawn `padding_x` pixels from its left edge
/// and vertically centered. Text that does not fit is truncated.
pub fn draw_badge(img: &mut RgbImage, area: PixelRect, padding_x: u32, text: &str) {
    let Some(r) = rect(area.left, area.top, area.width, area.height) else {
        return;
    };
    draw_filled_rect_mut(img, r, ANNOTATION_RED);
    let fitted = fit_text(text, area.width.saturating_sub(padding_x * 2));
    let text_y = area.top + area.height.saturating_sub(TEXT_HEIGHT) / 2;
    draw_text(img, area.left + padding_x, text_y, fitted, LABEL_WHITE);
}

/// Like [`draw_badge`] but with the text horizontally centered.
pub fn draw_centered_badge(img: &mut RgbImage, area: PixelRect, text: &str) {
    let fitted = fit_text(text, area.width);
    let padding = area.width.saturating_sub(text_width(fitted)) / 2;
    draw_badge(img, area, padding, fitted);
}

/// 5×7 glyph rows, most significant of the low five bits is the left column.
fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        ' ' => [0; 7],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '#' => [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        _ => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
    }
}
