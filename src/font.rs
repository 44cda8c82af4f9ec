//! Font loading for watermarks and frame captions.
//!
//! TTFs are cached process-wide. When neither the configured font nor any of
//! the usual system fonts load, drawing falls back to a built-in 5x7 bitmap
//! face so a caption never silently disappears; callers surface that as a
//! `FontUnavailable` warning.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::{Rgba, RgbaImage};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rusttype::{point, Font, Scale};

static FONT_CACHE: Lazy<Mutex<HashMap<PathBuf, Arc<Font<'static>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Clone)]
pub enum FontHandle {
    Ttf(Arc<Font<'static>>),
    Builtin,
}

impl FontHandle {
    pub fn is_builtin(&self) -> bool {
        matches!(self, FontHandle::Builtin)
    }
}

/// Resolve the best available font: preferred path first, then the usual
/// system locations, then the builtin bitmap face.
pub fn resolve(preferred: Option<&Path>) -> FontHandle {
    if let Some(path) = preferred {
        if let Some(f) = load_cached(path) {
            return FontHandle::Ttf(f);
        }
    }
    for path in SYSTEM_FONT_PATHS {
        if let Some(f) = load_cached(Path::new(path)) {
            return FontHandle::Ttf(f);
        }
    }
    FontHandle::Builtin
}

fn load_cached(path: &Path) -> Option<Arc<Font<'static>>> {
    if let Some(f) = FONT_CACHE.lock().get(path) {
        return Some(Arc::clone(f));
    }
    let bytes = std::fs::read(path).ok()?;
    let font = Arc::new(Font::try_from_vec(bytes)?);
    FONT_CACHE
        .lock()
        .insert(path.to_path_buf(), Arc::clone(&font));
    Some(font)
}

pub fn text_width(handle: &FontHandle, px: f32, text: &str) -> f32 {
    match handle {
        FontHandle::Ttf(font) => {
            if text.is_empty() {
                return 0.0;
            }
            let scale = Scale::uniform(px);
            let v_metrics = font.v_metrics(scale);
            let glyphs: Vec<_> = font.layout(text, scale, point(0.0, v_metrics.ascent)).collect();
            let mut width: f32 = 0.0;
            for g in &glyphs {
                if let Some(bb) = g.pixel_bounding_box() {
                    width = width.max(bb.max.x as f32);
                }
            }
            // trailing advance for glyphs without ink (spaces)
            if let Some(last) = glyphs.last() {
                width = width.max(last.position().x + last.unpositioned().h_metrics().advance_width);
            }
            width
        }
        FontHandle::Builtin => {
            let s = bitmap_scale(px);
            let n = text.chars().count() as f32;
            if n == 0.0 {
                0.0
            } else {
                n * 6.0 * s - s
            }
        }
    }
}

/// Draw `text` with its top-left corner at (x, y).
pub fn draw_text(
    img: &mut RgbaImage,
    handle: &FontHandle,
    px: f32,
    x: i32,
    y: i32,
    color: Rgba<u8>,
    text: &str,
) {
    match handle {
        FontHandle::Ttf(font) => draw_ttf(img, font, px, x, y, color, text),
        FontHandle::Builtin => draw_bitmap(img, px, x, y, color, text),
    }
}

fn draw_ttf(
    img: &mut RgbaImage,
    font: &Font<'static>,
    px: f32,
    x: i32,
    y: i32,
    color: Rgba<u8>,
    text: &str,
) {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let baseline = y as f32 + v_metrics.ascent;
    for glyph in font.layout(text, scale, point(x as f32, baseline)) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, v| {
                let px_i = gx as i32 + bb.min.x;
                let py_i = gy as i32 + bb.min.y;
                if px_i < 0 || py_i < 0 {
                    return;
                }
                let (px_u, py_u) = (px_i as u32, py_i as u32);
                if px_u >= img.width() || py_u >= img.height() {
                    return;
                }
                let a = v.clamp(0.0, 1.0);
                if a <= 0.0 {
                    return;
                }
                let dst = img.get_pixel_mut(px_u, py_u);
                let inv = 1.0 - a;
                dst.0[0] = (color.0[0] as f32 * a + dst.0[0] as f32 * inv) as u8;
                dst.0[1] = (color.0[1] as f32 * a + dst.0[1] as f32 * inv) as u8;
                dst.0[2] = (color.0[2] as f32 * a + dst.0[2] as f32 * inv) as u8;
                dst.0[3] = 255;
            });
        }
    }
}

fn bitmap_scale(px: f32) -> f32 {
    (px / 7.0).max(1.0).round()
}

fn draw_bitmap(img: &mut RgbaImage, px: f32, x: i32, y: i32, color: Rgba<u8>, text: &str) {
    let s = bitmap_scale(px) as i32;
    let mut caret = x;
    for ch in text.chars() {
        if let Some(rows) = bitmap_glyph(ch) {
            for (ry, row) in rows.iter().enumerate() {
                for rx in 0..5 {
                    if row & (0x10 >> rx) == 0 {
                        continue;
                    }
                    for dy in 0..s {
                        for dx in 0..s {
                            let px_i = caret + rx as i32 * s + dx;
                            let py_i = y + ry as i32 * s + dy;
                            if px_i < 0 || py_i < 0 {
                                continue;
                            }
                            let (px_u, py_u) = (px_i as u32, py_i as u32);
                            if px_u < img.width() && py_u < img.height() {
                                img.put_pixel(px_u, py_u, color);
                            }
                        }
                    }
                }
            }
        }
        caret += 6 * s;
    }
}

/// 5x7 glyphs, one byte per row, bit 4 = leftmost column. Lowercase maps to
/// uppercase; anything unknown renders as a blank advance.
fn bitmap_glyph(ch: char) -> Option<[u8; 7]> {
    let ch = ch.to_ascii_uppercase();
    let rows = match ch {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '?' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
        '\'' => [0x04, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        _ => return None,
    };
    Some(rows)
}
