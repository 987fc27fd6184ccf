// THEORY:
// The overlay is the visual feedback surface: it draws the detected hand skeleton
// (connectors and joints) so the user can see what the model is tracking. It is
// not part of the logical core; nothing it does feeds back into gesture decisions.
//
// Drawing happens on a plain `image::RgbaImage`, either a blank transparent canvas
// or a copy of the camera frame, and landmarks are mapped from normalized
// coordinates to pixels. Rendering every detected hand (not just the first) mirrors
// what the user expects to see, even though only the first hand is classified.

use crate::core_modules::landmark::{HAND_CONNECTIONS, LandmarkSet};
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::Result;
use image::RgbaImage;
use std::path::Path;

/// Colors and sizes used when drawing a hand.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub connector_color: [u8; 4],
    pub point_color: [u8; 4],
    /// Connector thickness in pixels.
    pub line_width: u32,
    /// Joint marker radius in pixels.
    pub point_radius: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            connector_color: [0xd4, 0xaf, 0x37, 0xff],
            point_color: [0xff, 0xff, 0xff, 0xff],
            line_width: 2,
            point_radius: 2,
        }
    }
}

/// Renders `hands` on a transparent canvas of the given size.
pub fn render(width: u32, height: u32, hands: &[LandmarkSet], style: &OverlayStyle) -> RgbaImage {
    let mut canvas = RgbaImage::new(width, height);
    draw_hands(&mut canvas, hands, style);
    canvas
}

/// Draws connectors first, then joints on top, for every hand.
///
/// Landmarks may fall far outside the canvas. Connectors are clipped to the canvas
/// (plus a margin for stroke width) before rasterizing, and joints outside it are
/// skipped, so the cost per hand is bounded by the canvas size.
pub fn draw_hands(canvas: &mut RgbaImage, hands: &[LandmarkSet], style: &OverlayStyle) {
    let margin = (style.line_width / 2).max(style.point_radius) as f64 + 1.0;
    let bounds = Bounds::around(canvas, margin);
    for hand in hands {
        let pixels = to_pixels(canvas, hand);
        for (a, b) in HAND_CONNECTIONS {
            if let Some((from, to)) = bounds.clip(pixels[a], pixels[b]) {
                draw_line(canvas, from, to, style.line_width, style.connector_color);
            }
        }
        for &point in &pixels {
            if let Some(center) = bounds.pixel(point) {
                draw_disc(canvas, center, style.point_radius, style.point_color);
            }
        }
    }
}

pub fn save_png<P: AsRef<Path>>(canvas: &RgbaImage, path: P) -> Result<()> {
    image_helper::save(path, canvas.width(), canvas.height(), canvas.as_raw())?;
    Ok(())
}

fn to_pixels(canvas: &RgbaImage, hand: &LandmarkSet) -> Vec<(f64, f64)> {
    let w = canvas.width() as f64;
    let h = canvas.height() as f64;
    hand.points()
        .iter()
        .map(|lm| (lm.x as f64 * w, lm.y as f64 * h))
        .collect()
}

/// The canvas rectangle grown by a margin on every side, in pixel units.
struct Bounds {
    min: (f64, f64),
    max: (f64, f64),
}

impl Bounds {
    fn around(canvas: &RgbaImage, margin: f64) -> Self {
        Self {
            min: (-margin, -margin),
            max: (canvas.width() as f64 + margin, canvas.height() as f64 + margin),
        }
    }

    fn contains(&self, (x, y): (f64, f64)) -> bool {
        x >= self.min.0 && x <= self.max.0 && y >= self.min.1 && y <= self.max.1
    }

    fn pixel(&self, point: (f64, f64)) -> Option<(i64, i64)> {
        self.contains(point)
            .then(|| (point.0.round() as i64, point.1.round() as i64))
    }

    // Liang-Barsky. NaN or infinite endpoints are rejected.
    fn clip(&self, a: (f64, f64), b: (f64, f64)) -> Option<((i64, i64), (i64, i64))> {
        if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
            return None;
        }
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let (mut t0, mut t1) = (0.0f64, 1.0f64);
        let edges = [
            (-dx, a.0 - self.min.0),
            (dx, self.max.0 - a.0),
            (-dy, a.1 - self.min.1),
            (dy, self.max.1 - a.1),
        ];
        for (p, q) in edges {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }

        let at = |t: f64| ((a.0 + t * dx).round() as i64, (a.1 + t * dy).round() as i64);
        Some((at(t0), at(t1)))
    }
}

// Bresenham, stamped with a disc for thickness. Endpoints are already clipped.
fn draw_line(canvas: &mut RgbaImage, from: (i64, i64), to: (i64, i64), width: u32, color: [u8; 4]) {
    let radius = width / 2;
    let (mut x, mut y) = from;
    let dx = to.0.saturating_sub(from.0).saturating_abs();
    let dy = to.1.saturating_sub(from.1).saturating_abs().saturating_neg();
    let sx = if from.0 < to.0 { 1 } else { -1 };
    let sy = if from.1 < to.1 { 1 } else { -1 };
    let mut err = dx.saturating_add(dy);

    loop {
        if radius == 0 {
            image_helper::blend_pixel(canvas, x, y, color);
        } else {
            draw_disc(canvas, (x, y), radius, color);
        }
        if (x, y) == to {
            break;
        }
        let e2 = err.saturating_mul(2);
        if e2 >= dy {
            err = err.saturating_add(dy);
            x += sx;
        }
        if e2 <= dx {
            err = err.saturating_add(dx);
            y += sy;
        }
    }
}

fn draw_disc(canvas: &mut RgbaImage, center: (i64, i64), radius: u32, color: [u8; 4]) {
    let r = radius as i64;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                image_helper::blend_pixel(canvas, center.0 + dx, center.1 + dy, color);
            }
        }
    }
}
