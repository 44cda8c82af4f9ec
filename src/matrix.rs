//! Module drawer: encoded payload + resolved style -> RGBA matrix image.
//! Logo, watermark and frame are layered on later by the composer.

use image::{ImageBuffer, Rgba, RgbaImage};
use qrcode::{types::QrError, QrCode};
use thiserror::Error;

use crate::style::{Color, ErrorCorrection, EyeSpec, EyeStyle, GradientDirection, ModuleShape, RenderSpec};

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("payload does not fit at error correction {0:?}")]
    PayloadTooLong(ErrorCorrection),
    #[error("qr build failed: {0}")]
    Build(String),
}

/// The rendered matrix plus the facts the info bundle reports.
pub struct ModuleImage {
    pub image: RgbaImage,
    pub matrix_size: u32,
    pub version: i16,
}

/// Render the QR matrix for `payload` under `spec`.
///
/// The smallest version that fits is selected automatically; overflow at the
/// chosen correction level surfaces as `PayloadTooLong` so the caller can
/// retry lower.
pub fn render_modules(payload: &str, spec: &RenderSpec) -> Result<ModuleImage, MatrixError> {
    let code = QrCode::with_error_correction_level(
        payload.as_bytes(),
        spec.error_correction.into(),
    )
    .map_err(|e| match e {
        QrError::DataTooLong => MatrixError::PayloadTooLong(spec.error_correction),
        other => MatrixError::Build(format!("{other:?}")),
    })?;

    let n = code.width();
    let grid: Vec<bool> = {
        let mut g = Vec::with_capacity(n * n);
        for y in 0..n {
            for x in 0..n {
                g.push(code[(x, y)] == qrcode::Color::Dark);
            }
        }
        g
    };
    let version = match code.version() {
        qrcode::Version::Normal(v) => v,
        qrcode::Version::Micro(v) => -v,
    };

    let ms = spec.module_size;
    let qz = spec.quiet_zone;
    let side = (n as u32 + 2 * qz) * ms;

    let mut img = ImageBuffer::from_pixel(side, side, rgba(spec.background));

    let dark = |x: isize, y: isize| -> bool {
        x >= 0 && y >= 0 && (x as usize) < n && (y as usize) < n && grid[y as usize * n + x as usize]
    };
    let skip_finder = spec.eyes.is_some();

    for y in 0..n {
        for x in 0..n {
            if !grid[y * n + x] {
                continue;
            }
            if skip_finder && is_finder_module(x, y, n) {
                continue;
            }
            let px0 = (x as u32 + qz) * ms;
            let py0 = (y as u32 + qz) * ms;
            let color = module_fill(spec, side, px0 + ms / 2, py0 + ms / 2);
            let xi = x as isize;
            let yi = y as isize;

            match spec.shape {
                ModuleShape::Square => fill_rect(&mut img, px0, py0, ms, ms, color),
                ModuleShape::Rounded => {
                    let neigh = |dx: isize, dy: isize| {
                        let (nx, ny) = (xi + dx, yi + dy);
                        dark(nx, ny)
                            && !(skip_finder
                                && is_finder_module(nx as usize, ny as usize, n))
                    };
                    fill_cell_blob(
                        &mut img,
                        px0,
                        py0,
                        ms,
                        ms / 2,
                        color,
                        rgba(spec.background),
                        neigh(0, -1),
                        neigh(0, 1),
                        neigh(-1, 0),
                        neigh(1, 0),
                    );
                }
                ModuleShape::Circle => {
                    let r = ms as f32 / 2.0;
                    fill_disc(&mut img, px0 as f32 + r, py0 as f32 + r, r, color);
                }
                ModuleShape::GappedSquare => {
                    let inset = ((ms as f32) * 0.15).round() as u32;
                    let side_px = ms.saturating_sub(2 * inset).max(1);
                    fill_rect(&mut img, px0 + inset, py0 + inset, side_px, side_px, color);
                }
                ModuleShape::VerticalBars => {
                    // Runs of adjacent modules merge into one bar; an isolated
                    // module keeps the bar look at half width.
                    let up = dark(xi, yi - 1) && !(skip_finder && is_finder_module(x, y - 1, n));
                    let down =
                        dark(xi, yi + 1) && !(skip_finder && is_finder_module(x, y + 1, n));
                    if up || down {
                        fill_rect(&mut img, px0, py0, ms, ms, color);
                    } else {
                        fill_rect(&mut img, px0 + ms / 4, py0, ms - ms / 2, ms, color);
                    }
                }
                ModuleShape::HorizontalBars => {
                    let left =
                        dark(xi - 1, yi) && !(skip_finder && is_finder_module(x.wrapping_sub(1), y, n));
                    let right =
                        dark(xi + 1, yi) && !(skip_finder && is_finder_module(x + 1, y, n));
                    if left || right {
                        fill_rect(&mut img, px0, py0, ms, ms, color);
                    } else {
                        fill_rect(&mut img, px0, py0 + ms / 4, ms, ms - ms / 2, color);
                    }
                }
            }
        }
    }

    if let Some(eyes) = &spec.eyes {
        let nn = n as u32;
        for (ex, ey) in [(0, 0), (nn - 7, 0), (0, nn - 7)] {
            draw_eye(&mut img, spec, eyes, ex + qz, ey + qz, ms);
        }
    }

    Ok(ModuleImage {
        image: img,
        matrix_size: n as u32,
        version,
    })
}

fn is_finder_module(x: usize, y: usize, n: usize) -> bool {
    let in_tl = x < 7 && y < 7;
    let in_tr = x + 7 >= n && x < n && y < 7;
    let in_bl = x < 7 && y + 7 >= n && y < n;
    in_tl || in_tr || in_bl
}

fn rgba(c: Color) -> Rgba<u8> {
    Rgba([c.0[0], c.0[1], c.0[2], 255])
}

fn lerp(a: Color, b: Color, t: f32) -> Rgba<u8> {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Rgba([mix(a.0[0], b.0[0]), mix(a.0[1], b.0[1]), mix(a.0[2], b.0[2]), 255])
}

/// Color for one module, sampled at its center pixel.
fn module_fill(spec: &RenderSpec, side: u32, cx: u32, cy: u32) -> Rgba<u8> {
    match &spec.gradient {
        None => rgba(spec.foreground),
        Some(g) => {
            let denom = side.max(1) as f32;
            let t = match g.direction {
                GradientDirection::ToRight => cx as f32 / denom,
                GradientDirection::ToBottom => cy as f32 / denom,
                GradientDirection::Diagonal => (cx + cy) as f32 / (2.0 * denom),
            };
            lerp(g.start, g.end, t.clamp(0.0, 1.0))
        }
    }
}

/// One finder pattern: outer 7x7 block, 5x5 hole, 3x3 center, each drawn in
/// the requested style. The canonical ring/center topology is preserved for
/// every style so scanners still lock on.
fn draw_eye(
    img: &mut RgbaImage,
    spec: &RenderSpec,
    eyes: &EyeSpec,
    mx: u32,
    my: u32,
    ms: u32,
) {
    let x0 = mx * ms;
    let y0 = my * ms;
    let bg = rgba(spec.background);

    let outer = 7 * ms;
    let outer_r = match eyes.outer_style {
        EyeStyle::Square => 0,
        EyeStyle::Rounded => ((outer as f32) * 0.3).round() as u32,
        EyeStyle::Circle => outer / 2,
    };
    fill_rounded_rect(img, x0, y0, outer, outer, outer_r, rgba(eyes.outer_color));

    // Hole curvature tracks the outer ring, inset by one module.
    let hole = 5 * ms;
    let hole_r = match eyes.outer_style {
        EyeStyle::Square => 0,
        EyeStyle::Rounded => outer_r.saturating_sub(ms),
        EyeStyle::Circle => hole / 2,
    };
    fill_rounded_rect(img, x0 + ms, y0 + ms, hole, hole, hole_r, bg);

    let inner = 3 * ms;
    let inner_r = match eyes.inner_style {
        EyeStyle::Square => 0,
        EyeStyle::Rounded => ((inner as f32) * 0.3).round() as u32,
        EyeStyle::Circle => inner / 2,
    };
    fill_rounded_rect(
        img,
        x0 + 2 * ms,
        y0 + 2 * ms,
        inner,
        inner,
        inner_r,
        rgba(eyes.inner_color),
    );
}

pub(crate) fn fill_rect(img: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgba<u8>) {
    let (iw, ih) = img.dimensions();
    for y in y0..(y0 + h).min(ih) {
        for x in x0..(x0 + w).min(iw) {
            img.put_pixel(x, y, color);
        }
    }
}

/// Rounded rect with one uniform radius; `r >= side/2` degenerates into a
/// disc, which is how circle eyes are drawn.
pub(crate) fn fill_rounded_rect(
    img: &mut RgbaImage,
    x0: u32,
    y0: u32,
    w: u32,
    h: u32,
    r: u32,
    color: Rgba<u8>,
) {
    if r == 0 {
        fill_rect(img, x0, y0, w, h, color);
        return;
    }
    let r = r.min(w / 2).min(h / 2);
    let (w_i, h_i) = (w as i32, h as i32);
    let r_i = r as i32;
    let (iw, ih) = img.dimensions();
    for yy in 0..h_i {
        for xx in 0..w_i {
            let mut inside = true;
            if xx < r_i && yy < r_i {
                let dx = xx - (r_i - 1);
                let dy = yy - (r_i - 1);
                inside = dx * dx + dy * dy <= r_i * r_i;
            } else if xx >= w_i - r_i && yy < r_i {
                let dx = xx - (w_i - r_i);
                let dy = yy - (r_i - 1);
                inside = dx * dx + dy * dy <= r_i * r_i;
            } else if xx < r_i && yy >= h_i - r_i {
                let dx = xx - (r_i - 1);
                let dy = yy - (h_i - r_i);
                inside = dx * dx + dy * dy <= r_i * r_i;
            } else if xx >= w_i - r_i && yy >= h_i - r_i {
                let dx = xx - (w_i - r_i);
                let dy = yy - (h_i - r_i);
                inside = dx * dx + dy * dy <= r_i * r_i;
            }
            if inside {
                let px = x0 + xx as u32;
                let py = y0 + yy as u32;
                if px < iw && py < ih {
                    img.put_pixel(px, py, color);
                }
            }
        }
    }
}

pub(crate) fn fill_disc(img: &mut RgbaImage, cx: f32, cy: f32, r: f32, color: Rgba<u8>) {
    let (iw, ih) = img.dimensions();
    let x_min = (cx - r).floor().max(0.0) as u32;
    let x_max = ((cx + r).ceil() as u32).min(iw);
    let y_min = (cy - r).floor().max(0.0) as u32;
    let y_max = ((cy + r).ceil() as u32).min(ih);
    let thr = (r - 0.25) * (r - 0.25);
    for y in y_min..y_max {
        for x in x_min..x_max {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= thr {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Carve a quarter circle of radius r out of an r x r corner block. Uses a
/// half-pixel centered circle to avoid spike artifacts when neighbors merge.
fn carve_round_corner(
    img: &mut RgbaImage,
    x0: u32,
    y0: u32,
    r: u32,
    corner: (i32, i32),
    bg: Rgba<u8>,
) {
    if r == 0 {
        return;
    }
    let (sx, sy) = corner;
    let r_f = r as f32;
    let cx = r_f - 0.5;
    let cy = r_f - 0.5;
    let thr2 = (r_f - 0.25) * (r_f - 0.25);

    for dy in 0..r {
        for dx in 0..r {
            let lx = if sx < 0 { dx as f32 } else { (r - 1 - dx) as f32 };
            let ly = if sy < 0 { dy as f32 } else { (r - 1 - dy) as f32 };
            let ddx = lx - cx;
            let ddy = ly - cy;
            if ddx * ddx + ddy * ddy >= thr2 {
                let px = x0 + dx;
                let py = y0 + dy;
                if px < img.width() && py < img.height() {
                    img.put_pixel(px, py, bg);
                }
            }
        }
    }
}

/// Fill one module, rounding only the corners with no dark neighbor on
/// either adjacent side, so touching modules merge into blobs.
#[allow(clippy::too_many_arguments)]
fn fill_cell_blob(
    img: &mut RgbaImage,
    x0: u32,
    y0: u32,
    ms: u32,
    r: u32,
    color: Rgba<u8>,
    bg: Rgba<u8>,
    neigh_n: bool,
    neigh_s: bool,
    neigh_w: bool,
    neigh_e: bool,
) {
    fill_rect(img, x0, y0, ms, ms, color);

    if !neigh_n && !neigh_w {
        carve_round_corner(img, x0, y0, r, (-1, -1), bg);
    }
    if !neigh_n && !neigh_e {
        carve_round_corner(img, x0 + ms - r, y0, r, (1, -1), bg);
    }
    if !neigh_s && !neigh_w {
        carve_round_corner(img, x0, y0 + ms - r, r, (-1, 1), bg);
    }
    if !neigh_s && !neigh_e {
        carve_round_corner(img, x0 + ms - r, y0 + ms - r, r, (1, 1), bg);
    }
}
