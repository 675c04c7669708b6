// ============================================================
// Layer 6 — Training Curves Plot
// ============================================================
// Renders a finished run into a single image: a title band with
// the run's peak memory and duration, then three side-by-side
// panels:
//
//   ┌────────────────────────────────────────────┐
//   │   memory: 3.21 G , duration: 1234 s        │
//   ├──────────────┬──────────────┬──────────────┤
//   │ Loss         │ Accuracy     │ Learning Rate│
//   │ red = train  │ red = train  │ red = lr     │
//   │ blue = val   │ blue = val   │              │
//   └──────────────┴──────────────┴──────────────┘
//
// Loss and accuracy have one point per epoch, the learning rate
// one point per optimizer step. Each panel scales its own y-axis
// to the range of its data and labels the two ends of it; the
// legend (swatch + label per series) sits in the top-right corner
// in series order.
//
// Drawn directly on an `image::RgbImage`, text with the 8x8
// bitmap font from `font8x8`, and saved as JPEG (format taken
// from the file extension).

use anyhow::{Context, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};
use std::{fs, path::Path};

use crate::domain::history::RunSummary;

pub const RED:   Rgb<u8> = Rgb([220, 40, 40]);
pub const BLUE:  Rgb<u8> = Rgb([40, 80, 220]);
pub const TEXT:  Rgb<u8> = Rgb([0, 0, 0]);
const WHITE:     Rgb<u8> = Rgb([255, 255, 255]);
const AXIS:      Rgb<u8> = Rgb([40, 40, 40]);
const GRID:      Rgb<u8> = Rgb([225, 225, 225]);

const PANEL_WIDTH:   u32 = 480;
const PANEL_HEIGHT:  u32 = 360;
const TITLE_BAND:    u32 = 32;
const MARGIN_LEFT:   i64 = 64;
const MARGIN_RIGHT:  i64 = 18;
const MARGIN_TOP:    i64 = 28;
const MARGIN_BOTTOM: i64 = 28;
const GRID_LINES:    i64 = 4;
const LINE_WIDTH:    u32 = 2;
const GLYPH:         i64 = 8;

/// One line of a panel
pub struct Series<'a> {
    pub label:  &'a str,
    pub values: &'a [f64],
    pub color:  Rgb<u8>,
}

/// One chart
pub struct Panel<'a> {
    pub title:   &'a str,
    pub x_label: &'a str,
    pub series:  Vec<Series<'a>>,
}

impl Panel<'_> {
    /// (min, max) of all finite values, widened when flat
    fn y_range(&self) -> (f64, f64) {
        let (lo, hi) = self
            .series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

        if !lo.is_finite() {
            return (0.0, 1.0);
        }
        if (hi - lo).abs() < f64::EPSILON {
            let pad = if lo.abs() > f64::EPSILON { lo.abs() * 0.1 } else { 1.0 };
            return (lo - pad, hi + pad);
        }
        let pad = (hi - lo) * 0.05;
        (lo - pad, hi + pad)
    }

    fn max_len(&self) -> usize {
        self.series.iter().map(|s| s.values.len()).max().unwrap_or(0)
    }
}

/// Title line of a run: peak memory and wall-clock duration
pub fn run_title(summary: &RunSummary) -> String {
    format!(
        "memory: {:.2} G , duration: {} s",
        summary.peak_memory_gb(), summary.duration_secs
    )
}

/// Render the three standard panels for a run
pub fn render_report(summary: &RunSummary) -> RgbImage {
    let history    = &summary.history;
    let train_loss = history.train_loss();
    let val_loss   = history.val_loss();
    let train_acc  = history.train_acc();
    let val_acc    = history.val_acc();

    let panels = [
        Panel { title: "Loss", x_label: "epoch", series: vec![
            Series { label: "train loss",    values: &train_loss, color: RED },
            Series { label: "validate loss", values: &val_loss,   color: BLUE },
        ]},
        Panel { title: "Accuracy", x_label: "epoch", series: vec![
            Series { label: "train acc",    values: &train_acc, color: RED },
            Series { label: "validate acc", values: &val_acc,   color: BLUE },
        ]},
        Panel { title: "Learning Rate", x_label: "step", series: vec![
            Series { label: "lr", values: &history.learning_rates, color: RED },
        ]},
    ];

    render(&panels, &run_title(summary), PANEL_WIDTH, PANEL_HEIGHT)
}

/// Render the run report and write it to `path`
pub fn save_report(summary: &RunSummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }

    render_report(summary)
        .save(path)
        .with_context(|| format!("Cannot write plot to '{}'", path.display()))?;

    tracing::info!("Saved training curves to '{}'", path.display());
    Ok(())
}

/// Title band on top, then `panels` left to right, each `panel_w` x `panel_h`
pub fn render(panels: &[Panel], title: &str, panel_w: u32, panel_h: u32) -> RgbImage {
    let width = panel_w * panels.len().max(1) as u32;
    let mut img = RgbImage::from_pixel(width, TITLE_BAND + panel_h, WHITE);

    // Suptitle, scale 2, centred in the band
    let tx = (width as i64 - text_width(title, 2)) / 2;
    let ty = (TITLE_BAND as i64 - 2 * GLYPH) / 2;
    draw_text(&mut img, (tx, ty), title, 2, TEXT);

    for (i, panel) in panels.iter().enumerate() {
        draw_panel(&mut img, panel, i as u32 * panel_w, panel_w, panel_h);
    }
    img
}

/// Plot area of a panel in image coordinates
struct Frame {
    left:   i64,
    right:  i64,
    top:    i64,
    bottom: i64,
}

fn draw_panel(img: &mut RgbImage, panel: &Panel, x0: u32, w: u32, h: u32) {
    let x0 = x0 as i64;
    let y0 = TITLE_BAND as i64;
    let frame = Frame {
        left:   x0 + MARGIN_LEFT,
        right:  x0 + w as i64 - MARGIN_RIGHT,
        top:    y0 + MARGIN_TOP,
        bottom: y0 + h as i64 - MARGIN_BOTTOM,
    };

    // Panel title above the plot area, x label below it
    let mid = (frame.left + frame.right) / 2;
    draw_text(img, (mid - text_width(panel.title, 1) / 2, y0 + (MARGIN_TOP - GLYPH) / 2), panel.title, 1, TEXT);
    draw_text(
        img,
        (mid - text_width(panel.x_label, 1) / 2, frame.bottom + (MARGIN_BOTTOM - GLYPH) / 2),
        panel.x_label,
        1,
        TEXT,
    );

    // Horizontal grid
    for g in 1..=GRID_LINES {
        let y = frame.top + (frame.bottom - frame.top) * g / (GRID_LINES + 1);
        draw_line(img, (frame.left, y), (frame.right, y), GRID, 1);
    }

    // Axes
    draw_line(img, (frame.left, frame.top), (frame.left, frame.bottom), AXIS, 1);
    draw_line(img, (frame.left, frame.bottom), (frame.right, frame.bottom), AXIS, 1);

    let (y_lo, y_hi) = panel.y_range();
    let n = panel.max_len();

    // Y tick labels at both ends of the axis, right-aligned to it
    for (v, y) in [(y_hi, frame.top), (y_lo, frame.bottom - GLYPH)] {
        let label = format_tick(v);
        draw_text(img, (frame.left - 4 - text_width(&label, 1), y), &label, 1, TEXT);
    }

    // Zero line when the range crosses zero
    if y_lo < 0.0 && y_hi > 0.0 {
        let fy = -y_lo / (y_hi - y_lo);
        let y  = (frame.bottom as f64 - fy * (frame.bottom - frame.top) as f64).round() as i64;
        draw_line(img, (frame.left, y), (frame.right, y), AXIS, 1);
    }

    let to_px = |i: usize, v: f64| -> (i64, i64) {
        let fx = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.5 };
        let fy = (v - y_lo) / (y_hi - y_lo);
        let x = frame.left as f64 + fx * (frame.right - frame.left) as f64;
        let y = frame.bottom as f64 - fy * (frame.bottom - frame.top) as f64;
        (x.round() as i64, y.round() as i64)
    };

    for series in &panel.series {
        let mut prev: Option<(i64, i64)> = None;
        for (i, &v) in series.values.iter().enumerate() {
            if !v.is_finite() {
                prev = None;
                continue;
            }
            let p = to_px(i, v);
            match prev {
                Some(q) => draw_line(img, q, p, series.color, LINE_WIDTH),
                None => draw_dot(img, p, series.color, LINE_WIDTH + 1),
            }
            prev = Some(p);
        }
    }

    // Legend, top-right, one row per series: swatch then label
    let label_w = panel.series.iter().map(|s| text_width(s.label, 1)).max().unwrap_or(0);
    let x = frame.right - 6 - label_w - 26;
    for (row, series) in panel.series.iter().enumerate() {
        let y = frame.top + 6 + row as i64 * 14;
        for dy in 0..GLYPH {
            draw_line(img, (x, y + dy), (x + 20, y + dy), series.color, 1);
        }
        draw_text(img, (x + 26, y), series.label, 1, TEXT);
    }
}

/// Short axis label: fixed point for ordinary values, exponent for tiny ones
fn format_tick(v: f64) -> String {
    if v != 0.0 && v.abs() < 0.01 {
        format!("{:.1e}", v)
    } else {
        format!("{:.3}", v)
    }
}

/// Pixel width of `text` at `scale`
fn text_width(text: &str, scale: i64) -> i64 {
    text.chars().count() as i64 * GLYPH * scale
}

/// Draw `text` with its top-left corner at (x, y). Characters outside
/// the basic Latin block are skipped but still take up a cell.
fn draw_text(img: &mut RgbImage, (x, y): (i64, i64), text: &str, scale: i64, color: Rgb<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch) else { continue };
        let cx = x + i as i64 * GLYPH * scale;

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH {
                // bit 0 is the leftmost pixel
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        put(img, cx + col * scale + sx, y + row as i64 * scale + sy, color);
                    }
                }
            }
        }
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_dot(img: &mut RgbImage, (cx, cy): (i64, i64), color: Rgb<u8>, size: u32) {
    let r = size as i64 / 2;
    for dy in -r..=r {
        for dx in -r..=r {
            put(img, cx + dx, cy + dy, color);
        }
    }
}

/// Bresenham line, thickened by stamping a square at every step
fn draw_line(img: &mut RgbImage, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: Rgb<u8>, width: u32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        if width <= 1 {
            put(img, x, y, color);
        } else {
            draw_dot(img, (x, y), color, width);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::{EpochMetrics, TrainingHistory};

    fn sample_summary() -> RunSummary {
        let mut h = TrainingHistory::new();
        h.record_epoch(EpochMetrics::new(1, 2.0, 0.3, 1.8, 0.35));
        h.record_epoch(EpochMetrics::new(2, 1.2, 0.6, 1.3, 0.55));
        h.record_epoch(EpochMetrics::new(3, 0.8, 0.75, 1.1, 0.62));
        for i in 0..30 {
            h.record_lr(0.01 * (30 - i) as f64 / 30.0);
        }
        RunSummary { history: h, peak_memory_bytes: 3_210_000_000, duration_secs: 1234 }
    }

    fn count_color(img: &RgbImage, color: Rgb<u8>) -> usize {
        img.pixels().filter(|p| **p == color).count()
    }

    fn text_in_band(img: &RgbImage) -> usize {
        img.enumerate_pixels()
            .filter(|(_, y, p)| *y < TITLE_BAND && **p == TEXT)
            .count()
    }

    fn lines<'a>(values: &'a [f64], color: Rgb<u8>, label: &'a str) -> Panel<'a> {
        Panel { title: "", x_label: "", series: vec![Series { label, values, color }] }
    }

    #[test]
    fn test_three_panels_under_a_title_band() {
        let img = render_report(&sample_summary());
        assert_eq!(img.dimensions(), (3 * PANEL_WIDTH, TITLE_BAND + PANEL_HEIGHT));
    }

    #[test]
    fn test_title_carries_memory_and_duration() {
        assert_eq!(run_title(&sample_summary()), "memory: 3.21 G , duration: 1234 s");

        let img = render_report(&sample_summary());
        assert!(text_in_band(&img) > 100);

        let untitled = render(&[lines(&[1.0, 2.0], RED, "")], "", 200, 150);
        assert_eq!(text_in_band(&untitled), 0);
    }

    #[test]
    fn test_legend_labels_are_drawn() {
        let values = [1.0, 2.0];
        let bare    = render(&[lines(&values, RED, "")], "", 300, 200);
        let labeled = render(&[lines(&values, RED, "train loss")], "", 300, 200);
        assert!(count_color(&labeled, TEXT) > count_color(&bare, TEXT));
    }

    #[test]
    fn test_glyph_bits_become_pixels() {
        let glyph = BASIC_FONTS.get('A').unwrap();
        let lit: u32 = glyph.iter().map(|row| row.count_ones()).sum();

        let mut img = RgbImage::from_pixel(20, 20, WHITE);
        draw_text(&mut img, (2, 2), "A", 1, TEXT);
        assert_eq!(count_color(&img, TEXT), lit as usize);

        let mut big = RgbImage::from_pixel(40, 40, WHITE);
        draw_text(&mut big, (0, 0), "A", 2, TEXT);
        assert_eq!(count_color(&big, TEXT), 4 * lit as usize);

        assert_eq!(text_width("lr", 1), 16);
        assert_eq!(text_width("lr", 2), 32);
    }

    #[test]
    fn test_tick_labels() {
        assert_eq!(format_tick(0.5), "0.500");
        assert_eq!(format_tick(0.0), "0.000");
        assert_eq!(format_tick(0.001), "1.0e-3");
    }

    #[test]
    fn test_series_are_drawn_in_their_colors() {
        let img = render_report(&sample_summary());
        assert!(count_color(&img, RED)  > 100);
        assert!(count_color(&img, BLUE) > 100);
    }

    #[test]
    fn test_lr_only_panel_has_no_blue() {
        let lrs = [0.0, 0.5, 1.0];
        let img = render(&[lines(&lrs, RED, "lr")], "", 200, 150);
        assert_eq!(count_color(&img, BLUE), 0);
        assert!(count_color(&img, RED) > 0);
    }

    #[test]
    fn test_flat_and_empty_ranges_do_not_divide_by_zero() {
        let flat = [0.5, 0.5];
        let (lo, hi) = lines(&flat, RED, "").y_range();
        assert!(lo < 0.5 && hi > 0.5);

        let empty = lines(&[], RED, "");
        assert_eq!(empty.y_range(), (0.0, 1.0));
        // Nothing to draw but still a valid image
        let img = render(&[empty], "", 100, 80);
        assert_eq!(img.dimensions(), (100, TITLE_BAND + 80));
    }

    #[test]
    fn test_single_point_is_drawn() {
        let one = [1.0];
        let img = render(&[lines(&one, BLUE, "")], "", 120, 100);
        assert!(count_color(&img, BLUE) > 0);
    }

    #[test]
    fn test_save_writes_jpeg() {
        let dir  = std::env::temp_dir().join(format!("cifar_ddp_plot_{}", std::process::id()));
        let path = dir.join("nested").join("run.jpg");

        save_report(&sample_summary(), &path).unwrap();

        let reread = image::open(&path).unwrap();
        assert_eq!(reread.width(), 3 * PANEL_WIDTH);
        assert_eq!(reread.height(), TITLE_BAND + PANEL_HEIGHT);
        let _ = fs::remove_dir_all(&dir);
    }
}
