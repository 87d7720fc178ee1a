//! "Now playing" card renderer
//!
//! Draws a 1280x720 player card: blurred cover background, a translucent
//! card with a gradient border, the framed cover, title/artist, a progress
//! bar and a row of player controls.

use crate::utils::time::seconds_to_hhmmss;
use crate::{Result, VcError};
use ab_glyph::{Font, FontVec, PxScale};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut,
    draw_line_segment_mut, draw_polygon_mut, draw_text_mut, text_size,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use rand::Rng;
use std::path::Path;

pub const CANVAS_WIDTH: u32 = 1280;
pub const CANVAS_HEIGHT: u32 = 720;

const CARD_WIDTH: u32 = 700;
const CARD_HEIGHT: u32 = 380;
const CARD_BORDER: u32 = 5;
const COVER_SIZE: u32 = 200;
const COVER_BORDER: u32 = 6;
const BAR_WIDTH: u32 = 380;
const BAR_HEIGHT: u32 = 8;
const TEXT_MAX_WIDTH: u32 = CARD_WIDTH - 300;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// What the card shows
#[derive(Debug, Clone)]
pub struct CardInfo {
    pub title: String,
    pub artist: String,
    /// `None` renders as a live stream
    pub duration_secs: Option<u64>,
}

impl CardInfo {
    /// Title to draw; blank titles read "Unknown Title"
    pub fn display_title(&self) -> &str {
        non_blank(&self.title, "Unknown Title")
    }

    /// Artist to draw; blank artists read "Unknown Artist"
    pub fn display_artist(&self) -> &str {
        non_blank(&self.artist, "Unknown Artist")
    }
}

fn non_blank<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    match text.trim() {
        "" => fallback,
        trimmed => trimmed,
    }
}

/// Load a TrueType/OpenType font for card text
pub fn load_font(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path)?;
    FontVec::try_from_vec(data)
        .map_err(|e| VcError::Thumbnail(format!("invalid font {}: {}", path.display(), e)))
}

/// Random colour with every channel in `[80, 255]`
pub fn random_color<R: Rng>(rng: &mut R) -> [u8; 3] {
    [
        rng.gen_range(80..=255),
        rng.gen_range(80..=255),
        rng.gen_range(80..=255),
    ]
}

fn lerp(c1: [u8; 3], c2: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    [mix(c1[0], c2[0]), mix(c1[1], c2[1]), mix(c1[2], c2[2])]
}

/// Top-to-bottom gradient
fn vertical_gradient(width: u32, height: u32, c1: [u8; 3], c2: [u8; 3], alpha: u8) -> RgbaImage {
    RgbaImage::from_fn(width, height, |_, y| {
        let [r, g, b] = lerp(c1, c2, y as f32 / height as f32);
        Rgba([r, g, b, alpha])
    })
}

/// Whether `(x, y)` lies inside a `width`x`height` rectangle with rounded corners
pub fn inside_rounded(x: u32, y: u32, width: u32, height: u32, radius: u32) -> bool {
    if x >= width || y >= height {
        return false;
    }
    let radius = radius.min(width / 2).min(height / 2) as i64;
    let (x, y) = (x as i64, y as i64);
    let (w, h) = (width as i64, height as i64);

    let cx = if x < radius {
        radius
    } else if x >= w - radius {
        w - radius - 1
    } else {
        return true;
    };
    let cy = if y < radius {
        radius
    } else if y >= h - radius {
        h - radius - 1
    } else {
        return true;
    };

    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= radius * radius
}

/// Wrap `content` in a rounded gradient border of `border` pixels
fn framed(
    content: &RgbaImage,
    border: u32,
    outer_radius: u32,
    inner_radius: u32,
    c1: [u8; 3],
    c2: [u8; 3],
) -> RgbaImage {
    let (cw, ch) = content.dimensions();
    let (w, h) = (cw + border * 2, ch + border * 2);

    RgbaImage::from_fn(w, h, |x, y| {
        if !inside_rounded(x, y, w, h, outer_radius) {
            return Rgba([0, 0, 0, 0]);
        }
        let inner = x >= border
            && y >= border
            && inside_rounded(x - border, y - border, cw, ch, inner_radius);
        if inner {
            *content.get_pixel(x - border, y - border)
        } else {
            let [r, g, b] = lerp(c1, c2, y as f32 / h as f32);
            Rgba([r, g, b, 255])
        }
    })
}

/// Alpha-blend `color` into `(x, y)` if it is on the canvas
fn blend_pixel(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    let alpha = color[3] as f32 / 255.0;
    for i in 0..3 {
        dst[i] = (color[i] as f32 * alpha + dst[i] as f32 * (1.0 - alpha)).round() as u8;
    }
    dst[3] = dst[3].max(color[3]);
}

fn fill_rounded(canvas: &mut RgbaImage, x: i64, y: i64, w: u32, h: u32, radius: u32, color: Rgba<u8>) {
    for dy in 0..h {
        for dx in 0..w {
            if inside_rounded(dx, dy, w, h, radius) {
                blend_pixel(canvas, x + dx as i64, y + dy as i64, color);
            }
        }
    }
}

fn thick_line(canvas: &mut RgbaImage, from: (f32, f32), to: (f32, f32), width: i32, color: Rgba<u8>) {
    let half = width / 2;
    for offset in -half..=half {
        let o = offset as f32;
        draw_line_segment_mut(canvas, (from.0 + o, from.1), (to.0 + o, to.1), color);
        draw_line_segment_mut(canvas, (from.0, from.1 + o), (to.0, to.1 + o), color);
    }
}

/// Arc in degrees, clockwise from 3 o'clock. `end < start` wraps around.
fn arc(canvas: &mut RgbaImage, center: (i32, i32), radius: f32, start: i32, end: i32, width: i32, color: Rgba<u8>) {
    let end = if end < start { end + 360 } else { end };
    for deg in start..=end {
        let theta = (deg as f32).to_radians();
        let x = center.0 as f32 + radius * theta.cos();
        let y = center.1 as f32 + radius * theta.sin();
        draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), width / 2, color);
    }
}

fn rect(canvas: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let w = (x1 - x0 + 1).max(1) as u32;
    let h = (y1 - y0 + 1).max(1) as u32;
    draw_filled_rect_mut(canvas, Rect::at(x0, y0).of_size(w, h), color);
}

fn polygon(canvas: &mut RgbaImage, points: &[(i32, i32)], color: Rgba<u8>) {
    let points: Vec<Point<i32>> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
    draw_polygon_mut(canvas, &points, color);
}

/// Shorten `text` with a trailing "..." until `measure` says it fits
pub fn trim_to_width(text: &str, max_width: u32, measure: impl Fn(&str) -> u32) -> String {
    if text.is_empty() || measure(text) <= max_width {
        return text.to_string();
    }

    let mut chars: Vec<char> = text.chars().collect();
    while chars.pop().is_some() {
        let candidate = format!("{}...", chars.iter().collect::<String>().trim_end());
        if measure(&candidate) <= max_width {
            return candidate;
        }
    }
    "...".to_string()
}

/// `trim_to_width` measured with a real font
pub fn trim_text<F: Font>(text: &str, font: &F, size: f32, max_width: u32) -> String {
    let scale = PxScale::from(size);
    trim_to_width(text, max_width, |t| text_size(scale, font, t).0)
}

fn draw_controls(canvas: &mut RgbaImage, left: i32, cy: i32) {
    let step = (BAR_WIDTH / 6) as i32;
    let at = |i: i32| left + i * step;

    // shuffle
    let green = Rgba([0, 255, 120, 255]);
    let sx = at(0);
    thick_line(canvas, ((sx - 12) as f32, (cy - 8) as f32), ((sx + 8) as f32, (cy + 12) as f32), 3, green);
    polygon(canvas, &[(sx + 8, cy + 12), (sx + 16, cy + 6), (sx + 2, cy + 4)], green);
    thick_line(canvas, ((sx - 12) as f32, (cy + 8) as f32), ((sx - 2) as f32, (cy - 2) as f32), 3, green);

    // repeat
    let yellow = Rgba([255, 220, 50, 255]);
    let rx = at(1);
    arc(canvas, (rx, cy), 13.0, 30, 300, 3, yellow);
    polygon(canvas, &[(rx + 14, cy - 2), (rx + 22, cy - 6), (rx + 14, cy - 10)], yellow);

    // back
    let bx = at(2);
    polygon(canvas, &[(bx + 10, cy - 10), (bx + 10, cy + 10), (bx - 12, cy)], WHITE);
    rect(canvas, bx + 14, cy - 10, bx + 18, cy + 10, WHITE);

    // pause
    let px = at(3);
    let (bar_w, bar_h, gap) = (6, 26, 10);
    rect(canvas, px - gap - bar_w, cy - bar_h / 2, px - gap, cy + bar_h / 2, WHITE);
    rect(canvas, px + gap, cy - bar_h / 2, px + gap + bar_w, cy + bar_h / 2, WHITE);

    // forward
    let fx = at(4);
    polygon(canvas, &[(fx - 10, cy - 10), (fx - 10, cy + 10), (fx + 12, cy)], WHITE);
    rect(canvas, fx - 18, cy - 10, fx - 14, cy + 10, WHITE);

    // heart
    let hx = at(5);
    polygon(
        canvas,
        &[
            (hx, cy),
            (hx - 10, cy - 10),
            (hx - 20, cy),
            (hx, cy + 14),
            (hx + 20, cy),
            (hx + 10, cy - 10),
        ],
        RED,
    );

    // earphones
    let ex = at(6);
    arc(canvas, (ex, cy), 19.0, 200, -20, 3, WHITE);
    rect(canvas, ex - 18, cy - 4, ex - 10, cy + 12, WHITE);
    rect(canvas, ex + 10, cy - 4, ex + 18, cy + 12, WHITE);
}

/// Render the card for `cover`
pub fn render_card<R: Rng>(
    cover: &DynamicImage,
    info: &CardInfo,
    font: Option<&FontVec>,
    rng: &mut R,
) -> RgbaImage {
    let total_secs = info.duration_secs.filter(|&secs| secs > 0);
    let current_secs = match total_secs {
        Some(total) => rng.gen_range(0..=total),
        None => rng.gen_range(0..=7200),
    };
    let total_label = total_secs.map_or_else(|| "Live".to_string(), seconds_to_hhmmss);
    let current_label = seconds_to_hhmmss(current_secs);

    // Background: blur a small copy and scale it back up
    let cover = cover.to_rgba8();
    let small = imageops::resize(&cover, 320, 180, FilterType::Triangle);
    let blurred = imageops::blur(&small, 6.0);
    let mut canvas = imageops::resize(&blurred, CANVAS_WIDTH, CANVAS_HEIGHT, FilterType::Triangle);

    let overlay = vertical_gradient(
        CANVAS_WIDTH,
        CANVAS_HEIGHT,
        random_color(rng),
        random_color(rng),
        80,
    );
    imageops::overlay(&mut canvas, &overlay, 0, 0);

    // Card
    let glass = RgbaImage::from_pixel(CARD_WIDTH, CARD_HEIGHT, Rgba([255, 255, 255, 60]));
    let card = framed(&glass, CARD_BORDER, 36, 30, random_color(rng), random_color(rng));
    let x = ((CANVAS_WIDTH - card.width()) / 2) as i64;
    let y = ((CANVAS_HEIGHT - card.height()) / 2) as i64;
    imageops::overlay(&mut canvas, &card, x, y);

    // Cover
    let cover_small = imageops::resize(&cover, COVER_SIZE, COVER_SIZE, FilterType::Lanczos3);
    let framed_cover = framed(&cover_small, COVER_BORDER, 30, 26, random_color(rng), random_color(rng));
    let cover_x = x + CARD_BORDER as i64 + 30;
    let cover_y = y + (CARD_HEIGHT - framed_cover.height()) as i64 / 2 + CARD_BORDER as i64;
    imageops::overlay(&mut canvas, &framed_cover, cover_x, cover_y);

    let text_x = (cover_x + framed_cover.width() as i64 + 30) as i32;
    let y = y as i32;

    if let Some(font) = font {
        let title = trim_text(info.display_title(), font, 36.0, TEXT_MAX_WIDTH);
        let artist = trim_text(info.display_artist(), font, 28.0, TEXT_MAX_WIDTH);
        draw_text_mut(&mut canvas, WHITE, text_x, y + 86, PxScale::from(36.0), font, &title);
        draw_text_mut(&mut canvas, WHITE, text_x, y + 146, PxScale::from(28.0), font, &artist);
    }

    // Progress bar
    let (bar_x, bar_y) = (text_x, y + 206);
    let fill = match total_secs {
        Some(total) => ((current_secs as f64 / total as f64) * BAR_WIDTH as f64) as u32,
        None => BAR_WIDTH,
    };
    fill_rounded(
        &mut canvas,
        bar_x as i64,
        bar_y as i64,
        BAR_WIDTH,
        BAR_HEIGHT,
        5,
        Rgba([120, 120, 120, 160]),
    );

    let (c1, c2) = (random_color(rng), random_color(rng));
    for i in 0..fill {
        let [r, g, b] = lerp(c1, c2, i as f32 / fill.max(1) as f32);
        let column_x = (bar_x + i as i32) as f32;
        draw_line_segment_mut(
            &mut canvas,
            (column_x, bar_y as f32),
            (column_x, (bar_y + BAR_HEIGHT as i32) as f32),
            Rgba([r, g, b, 255]),
        );
    }

    let knob = (bar_x + fill as i32, bar_y + BAR_HEIGHT as i32 / 2);
    draw_filled_circle_mut(&mut canvas, knob, 6, WHITE);
    draw_hollow_circle_mut(&mut canvas, knob, 6, BLACK);
    draw_hollow_circle_mut(&mut canvas, knob, 5, BLACK);

    if let Some(font) = font {
        let scale = PxScale::from(24.0);
        draw_text_mut(&mut canvas, WHITE, bar_x, bar_y + 15, scale, font, &current_label);
        let (total_w, _) = text_size(scale, font, &total_label);
        let total_color = if total_secs.is_none() { RED } else { WHITE };
        draw_text_mut(
            &mut canvas,
            total_color,
            bar_x + BAR_WIDTH as i32 - total_w as i32,
            bar_y + 15,
            scale,
            font,
            &total_label,
        );
    }

    draw_controls(&mut canvas, bar_x, bar_y + 70);

    canvas
}

/// Render a card from a cover on disk and save it as PNG
pub fn render_to_file<R: Rng>(
    cover_path: &Path,
    info: &CardInfo,
    font: Option<&FontVec>,
    rng: &mut R,
    output: &Path,
) -> Result<()> {
    let cover = image::open(cover_path)
        .map_err(|e| VcError::Thumbnail(format!("{}: {}", cover_path.display(), e)))?;

    let card = render_card(&cover, info, font, rng);

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    card.save(output)
        .map_err(|e| VcError::Thumbnail(format!("{}: {}", output.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_inside_rounded() {
        assert!(inside_rounded(50, 50, 100, 100, 20));
        assert!(!inside_rounded(0, 0, 100, 100, 20), "corner is cut");
        assert!(inside_rounded(0, 50, 100, 100, 20), "edge midpoint kept");
        assert!(!inside_rounded(100, 50, 100, 100, 20));
        assert!(inside_rounded(0, 0, 10, 10, 0));
    }

    #[test]
    fn test_random_color_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(random_color(&mut rng).iter().all(|&c| c >= 80));
        }
    }

    #[test]
    fn test_blank_text_placeholders() {
        let info = CardInfo {
            title: "   ".into(),
            artist: String::new(),
            duration_secs: None,
        };
        assert_eq!(info.display_title(), "Unknown Title");
        assert_eq!(info.display_artist(), "Unknown Artist");

        let info = CardInfo {
            title: " Song ".into(),
            artist: "Band".into(),
            duration_secs: Some(10),
        };
        assert_eq!(info.display_title(), "Song");
        assert_eq!(info.display_artist(), "Band");
    }

    #[test]
    fn test_trim_to_width() {
        let by_chars = |t: &str| t.chars().count() as u32 * 10;
        assert_eq!(trim_to_width("short", 100, by_chars), "short");
        assert_eq!(trim_to_width("a much longer title", 100, by_chars), "a much...");
        assert_eq!(trim_to_width("", 10, by_chars), "");
        assert_eq!(trim_to_width("abcdef", 20, by_chars), "...");
    }

    #[test]
    fn test_render_card_dimensions() {
        let cover = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 64, Rgba([200, 40, 40, 255])));
        let info = CardInfo {
            title: "Title".into(),
            artist: "Artist".into(),
            duration_secs: Some(215),
        };
        let mut rng = StdRng::seed_from_u64(1);
        let card = render_card(&cover, &info, None, &mut rng);

        assert_eq!(card.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        // Centre of the cover frame is the cover itself
        let frame_x = (CANVAS_WIDTH - (CARD_WIDTH + 2 * CARD_BORDER)) / 2 + CARD_BORDER + 30;
        let frame_y = (CANVAS_HEIGHT - (CARD_HEIGHT + 2 * CARD_BORDER)) / 2
            + (CARD_HEIGHT - (COVER_SIZE + 2 * COVER_BORDER)) / 2
            + CARD_BORDER;
        let centre = card.get_pixel(
            frame_x + COVER_BORDER + COVER_SIZE / 2,
            frame_y + COVER_BORDER + COVER_SIZE / 2,
        );
        assert_eq!(centre.0[..3], [200, 40, 40]);
    }

    #[test]
    fn test_render_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let cover_path = dir.path().join("cover.png");
        RgbaImage::from_pixel(32, 32, Rgba([0, 0, 255, 255]))
            .save(&cover_path)
            .unwrap();

        let output = dir.path().join("cards").join("1_x_2.png");
        let info = CardInfo {
            title: "Live".into(),
            artist: "Somebody".into(),
            duration_secs: None,
        };
        render_to_file(&cover_path, &info, None, &mut StdRng::seed_from_u64(3), &output).unwrap();

        let saved = image::open(&output).unwrap();
        assert_eq!(saved.width(), CANVAS_WIDTH);
    }
}
