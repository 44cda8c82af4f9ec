//! Image composer: logo, watermark and frame on top of the module image,
//! then PNG encoding.

use image::{
    codecs::png::PngEncoder, imageops::FilterType, ExtendedColorType, ImageBuffer, ImageEncoder,
    Rgba, RgbaImage,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::RenderConfig;
use crate::font::{self, FontHandle};
use crate::matrix::{fill_disc, fill_rect, ModuleImage};
use crate::style::{Color, FrameKind, FrameSpec, LogoSpec, RenderSpec};

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("png encode failed: {0}")]
    Png(String),
}

/// Recoverable conditions; rendering completed without the nice-to-have.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderWarning {
    LogoLoad { reason: String },
    FontUnavailable,
}

/// What actually got rendered.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RenderInfo {
    pub version: i16,
    pub matrix_size: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub logo_applied: bool,
    pub warnings: Vec<RenderWarning>,
}

/// Compose the final image and encode it as PNG.
///
/// `logo_bytes` is the raw uploaded file, already read by the caller; a
/// decode failure downgrades to a warning and the render completes bare.
pub fn compose_image(
    modules: ModuleImage,
    spec: &RenderSpec,
    logo_bytes: Option<&[u8]>,
    config: &RenderConfig,
) -> Result<(Vec<u8>, RenderInfo), ComposeError> {
    let mut img = modules.image;
    let mut warnings = Vec::new();
    let mut logo_applied = false;

    if let (Some(logo_spec), Some(bytes)) = (&spec.logo, logo_bytes) {
        match overlay_logo(&mut img, spec, logo_spec, bytes) {
            Ok(()) => logo_applied = true,
            Err(reason) => warnings.push(RenderWarning::LogoLoad { reason }),
        }
    }

    let wants_text =
        spec.watermark_text.is_some() || spec.frame.as_ref().is_some_and(|f| f.text.is_some());
    let font = font::resolve(config.default_font_path.as_deref());
    if wants_text && font.is_builtin() {
        warnings.push(RenderWarning::FontUnavailable);
    }

    if let Some(text) = &spec.watermark_text {
        draw_watermark(&mut img, spec, &font, text);
    }

    if let Some(frame) = &spec.frame {
        img = apply_frame(img, spec, frame, &font);
    }

    let (w, h) = img.dimensions();
    let png = encode_png(&img)?;
    Ok((
        png,
        RenderInfo {
            version: modules.version,
            matrix_size: modules.matrix_size,
            image_width: w,
            image_height: h,
            logo_applied,
            warnings,
        },
    ))
}

fn rgba(c: Color) -> Rgba<u8> {
    Rgba([c.0[0], c.0[1], c.0[2], 255])
}

fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ComposeError> {
    let mut png = Vec::new();
    let encoder = PngEncoder::new(&mut png);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| ComposeError::Png(e.to_string()))?;
    Ok(png)
}

/// Center the logo over a solid background patch. The patch runs ~10% past
/// the logo on each side and never reaches into the quiet zone.
fn overlay_logo(
    img: &mut RgbaImage,
    spec: &RenderSpec,
    logo: &LogoSpec,
    bytes: &[u8],
) -> Result<(), String> {
    let decoded = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let (w, h) = img.dimensions();

    let matrix_px = w.saturating_sub(2 * spec.quiet_zone * spec.module_size);
    let target = (w.min(h) * logo.size_percentage / 100).max(1);
    let patch = (((target as f32) * 1.2).round() as u32).min(matrix_px);
    let target = target.min(patch);

    let resized = decoded.resize(target, target, FilterType::Lanczos3).to_rgba8();
    let (lw, lh) = resized.dimensions();

    let bg = rgba(spec.background);
    let patch_x = (w - patch) / 2;
    let patch_y = (h - patch) / 2;
    if logo.round {
        fill_disc(
            img,
            w as f32 / 2.0,
            h as f32 / 2.0,
            patch as f32 / 2.0,
            bg,
        );
    } else {
        fill_rect(img, patch_x, patch_y, patch, patch, bg);
    }

    let mut overlay = resized;
    if logo.round {
        mask_circle(&mut overlay);
    }
    blend_over(img, &overlay, (w - lw) / 2, (h - lh) / 2);
    Ok(())
}

/// Zero out alpha outside the inscribed circle.
fn mask_circle(img: &mut RgbaImage) {
    let (w, h) = img.dimensions();
    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;
    let r = w.min(h) as f32 / 2.0;
    let thr = r * r;
    for (x, y, p) in img.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        if dx * dx + dy * dy > thr {
            p.0[3] = 0;
        }
    }
}

fn blend_over(base: &mut RgbaImage, over: &RgbaImage, x: u32, y: u32) {
    for oy in 0..over.height() {
        for ox in 0..over.width() {
            let p = over.get_pixel(ox, oy);
            let a = p.0[3] as f32 / 255.0;
            if a <= 0.0 {
                continue;
            }
            let bx = x + ox;
            let by = y + oy;
            if bx >= base.width() || by >= base.height() {
                continue;
            }
            let dst = base.get_pixel_mut(bx, by);
            let inv = 1.0 - a;
            dst.0[0] = (p.0[0] as f32 * a + dst.0[0] as f32 * inv) as u8;
            dst.0[1] = (p.0[1] as f32 * a + dst.0[1] as f32 * inv) as u8;
            dst.0[2] = (p.0[2] as f32 * a + dst.0[2] as f32 * inv) as u8;
            dst.0[3] = 255;
        }
    }
}

/// Caption text centered across the bottom quiet zone, in the foreground
/// color, sized to ~3% of image height.
fn draw_watermark(img: &mut RgbaImage, spec: &RenderSpec, font: &FontHandle, text: &str) {
    let band_h = spec.quiet_zone * spec.module_size;
    if band_h == 0 {
        return;
    }
    let (w, h) = img.dimensions();
    let px = (h as f32 * 0.03).max(8.0).min(band_h as f32);
    let text = fit_with_ellipsis(font, px, w as f32 * 0.9, text);
    let tw = font::text_width(font, px, &text);
    let x = ((w as f32 - tw) / 2.0).max(0.0) as i32;
    let y = (h - band_h) as i32 + ((band_h as f32 - px) / 2.0).max(0.0) as i32;
    font::draw_text(img, font, px, x, y, rgba(spec.foreground), &text);
}

/// Wrap the composed module image in a frame. The border is `max(module_size,
/// 8)` thick; a caption adds a band of ~12% of the image height below.
fn apply_frame(qr: RgbaImage, spec: &RenderSpec, frame: &FrameSpec, font: &FontHandle) -> RgbaImage {
    let t = spec.module_size.max(8);
    let (qw, qh) = qr.dimensions();
    let band_h = if frame.text.is_some() {
        ((qh as f32) * 0.12).round() as u32
    } else {
        0
    };
    let fc = rgba(frame.color);
    let bg = rgba(spec.background);

    let mut out = match frame.kind {
        FrameKind::Square | FrameKind::Rounded | FrameKind::ScanMe => {
            let (w, h) = (qw + 2 * t, qh + 2 * t + band_h);
            let mut out = ImageBuffer::from_pixel(w, h, fc);
            blit(&mut out, &qr, t, t);
            out
        }
        FrameKind::Circle => {
            let diag = (((qw * qw + qh * qh) as f32).sqrt()).ceil() as u32;
            let d = diag + 2 * t;
            let (w, h) = (d, d + band_h);
            let mut out = ImageBuffer::from_pixel(w, h, Rgba([0, 0, 0, 0]));
            let c = d as f32 / 2.0;
            fill_disc(&mut out, c, c, c, fc);
            fill_disc(&mut out, c, c, c - t as f32, bg);
            blit(&mut out, &qr, (d - qw) / 2, (d - qh) / 2);
            out
        }
    };

    if frame.text.is_some() {
        let (w, h) = out.dimensions();
        let band_y = h - band_h;
        fill_rect(&mut out, 0, band_y, w, band_h, fc);
        draw_caption(&mut out, frame, font, band_y, band_h);
    }

    // Rounded silhouettes are cut last so the band and the blitted image
    // share one outline. Only quiet-zone pixels are ever clipped.
    if matches!(frame.kind, FrameKind::Rounded | FrameKind::ScanMe) {
        round_corners(&mut out, 4 * spec.module_size);
    }
    out
}

/// Alpha-out everything outside a rounded-rect silhouette.
fn round_corners(img: &mut RgbaImage, radius: u32) {
    let (w, h) = img.dimensions();
    let r = (radius.min(w / 2).min(h / 2)) as i32;
    if r == 0 {
        return;
    }
    let (w_i, h_i) = (w as i32, h as i32);
    for y in 0..h_i {
        for x in 0..w_i {
            let corner = if x < r && y < r {
                Some((r - 1, r - 1))
            } else if x >= w_i - r && y < r {
                Some((w_i - r, r - 1))
            } else if x < r && y >= h_i - r {
                Some((r - 1, h_i - r))
            } else if x >= w_i - r && y >= h_i - r {
                Some((w_i - r, h_i - r))
            } else {
                None
            };
            if let Some((cx, cy)) = corner {
                let dx = x - cx;
                let dy = y - cy;
                if dx * dx + dy * dy > r * r {
                    img.get_pixel_mut(x as u32, y as u32).0[3] = 0;
                }
            }
        }
    }
}

fn draw_caption(out: &mut RgbaImage, frame: &FrameSpec, font: &FontHandle, band_y: u32, band_h: u32) {
    let Some(text) = frame.text.as_deref() else {
        return;
    };
    let w = out.width();
    // contrasting ink against the band
    let ink = if frame.color.luminance() > 140.0 {
        Rgba([0, 0, 0, 255])
    } else {
        Rgba([255, 255, 255, 255])
    };
    let px = (band_h as f32 * 0.55).max(8.0);
    let text = fit_with_ellipsis(font, px, w as f32 * 0.9, text);
    let tw = font::text_width(font, px, &text);
    let x = ((w as f32 - tw) / 2.0).max(0.0) as i32;
    let y = band_y as i32 + ((band_h as f32 - px) / 2.0).max(0.0) as i32;
    font::draw_text(out, font, px, x, y, ink, &text);
}

/// Truncate to fit `max_w` pixels, appending an ellipsis when shortened.
fn fit_with_ellipsis(font: &FontHandle, px: f32, max_w: f32, text: &str) -> String {
    if font::text_width(font, px, text) <= max_w {
        return text.to_string();
    }
    let mut kept: Vec<char> = text.chars().collect();
    while !kept.is_empty() {
        kept.pop();
        let candidate: String = kept.iter().collect::<String>() + "...";
        if font::text_width(font, px, &candidate) <= max_w {
            return candidate;
        }
    }
    "...".to_string()
}

fn blit(base: &mut RgbaImage, src: &RgbaImage, x: u32, y: u32) {
    for sy in 0..src.height() {
        for sx in 0..src.width() {
            let bx = x + sx;
            let by = y + sy;
            if bx < base.width() && by < base.height() {
                base.put_pixel(bx, by, *src.get_pixel(sx, sy));
            }
        }
    }
}
