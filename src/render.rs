//! Waveform rendering onto a 2D raster surface.
//!
//! [`draw`] is stateless: it clears the surface and repaints every position on
//! every call, splitting the played and unplayed parts by color.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::peaks::PeakSeries;
use crate::theme::Rgba;

/// Shortest drawn bar, so silent passages still show a baseline.
const MIN_BAR_HEIGHT: f32 = 1.0;

/// Fraction of the surface height used by the seekbar track.
const SEEKBAR_TRACK_RATIO: f32 = 0.2;

/// The drawing primitives the renderer needs from a raster surface.
///
/// Coordinates are device pixels with the origin at the top left.
pub trait Surface {
    fn width(&self) -> f32;
    fn height(&self) -> f32;
    fn clear(&mut self);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: Rgba);
    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, paint: Rgba);
    fn stroke_polyline(&mut self, points: &[(f32, f32)], line_width: f32, paint: Rgba);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformStyle {
    Bars,
    #[default]
    Mirror,
    Line,
    Blocks,
    Dots,
    Seekbar,
}

impl WaveformStyle {
    pub const ALL: [WaveformStyle; 6] = [
        WaveformStyle::Bars,
        WaveformStyle::Mirror,
        WaveformStyle::Line,
        WaveformStyle::Blocks,
        WaveformStyle::Dots,
        WaveformStyle::Seekbar,
    ];

    /// Bar width and spacing used when neither is configured explicitly.
    pub fn default_geometry(self) -> (f32, f32) {
        match self {
            WaveformStyle::Bars => (3.0, 1.0),
            WaveformStyle::Mirror => (2.0, 0.0),
            WaveformStyle::Line => (2.0, 0.0),
            WaveformStyle::Blocks => (4.0, 2.0),
            WaveformStyle::Dots => (3.0, 3.0),
            WaveformStyle::Seekbar => (1.0, 0.0),
        }
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|&s| s == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WaveformStyle::Bars => "bars",
            WaveformStyle::Mirror => "mirror",
            WaveformStyle::Line => "line",
            WaveformStyle::Blocks => "blocks",
            WaveformStyle::Dots => "dots",
            WaveformStyle::Seekbar => "seekbar",
        }
    }
}

impl fmt::Display for WaveformStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown waveform style: {0}")]
pub struct UnknownStyle(String);

impl FromStr for WaveformStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStyle(s.to_string()))
    }
}

/// Everything [`draw`] needs besides the peaks and progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    pub style: WaveformStyle,
    /// Logical bar width; the layout is scaled to the surface width.
    pub bar_width: f32,
    pub bar_spacing: f32,
    pub waveform_color: Rgba,
    pub progress_color: Rgba,
    pub button_color: Rgba,
}

/// Horizontal placement of one peak position, in device pixels.
#[derive(Debug, Clone, Copy)]
struct Slot {
    x: f32,
    width: f32,
    played: bool,
}

struct Layout {
    slots: Vec<Slot>,
    /// Device pixels per logical layout unit.
    scale: f32,
}

impl Layout {
    fn new(count: usize, width: f32, config: &RenderConfig, progress: f64) -> Self {
        let bar_width = config.bar_width.max(0.1);
        let step = (bar_width + config.bar_spacing.max(0.0)).max(1.0);
        let layout_width = count as f32 * step;
        let scale = width / layout_width;

        let slots = (0..count)
            .map(|i| {
                let logical_x = i as f32 * step;
                Slot {
                    x: logical_x * scale,
                    width: (bar_width * scale).max(1.0),
                    played: (i as f64) / (count as f64) < progress,
                }
            })
            .collect();
        Self { slots, scale }
    }
}

/// Clamp a progress fraction into `[0, 1]`; NaN counts as zero.
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

/// Draw `peaks` onto `surface`, coloring positions before `progress` as played.
///
/// An empty peak series leaves the surface untouched.
pub fn draw(surface: &mut dyn Surface, peaks: &PeakSeries, progress: f64, config: &RenderConfig) {
    if peaks.is_empty() {
        return;
    }

    let progress = clamp_progress(progress);
    let width = surface.width();
    let height = surface.height();
    surface.clear();
    if width <= 0.0 || height <= 0.0 {
        return;
    }

    let layout = Layout::new(peaks.len(), width, config, progress);
    let paint = |slot: &Slot| {
        if slot.played {
            config.progress_color
        } else {
            config.waveform_color
        }
    };
    let center = height / 2.0;

    match config.style {
        WaveformStyle::Bars => {
            for (slot, &peak) in layout.slots.iter().zip(peaks.values()) {
                let bar = (peak * height).max(MIN_BAR_HEIGHT);
                surface.fill_rect(slot.x, height - bar, slot.width, bar, paint(slot));
            }
        }
        WaveformStyle::Mirror => {
            for (slot, &peak) in layout.slots.iter().zip(peaks.values()) {
                let bar = (peak * height).max(MIN_BAR_HEIGHT);
                surface.fill_rect(slot.x, center - bar / 2.0, slot.width, bar, paint(slot));
            }
        }
        WaveformStyle::Line => draw_line(surface, &layout, peaks, center, config),
        WaveformStyle::Blocks => {
            let block = (config.bar_width * layout.scale).max(1.0);
            let gap = (config.bar_spacing * layout.scale).max(1.0);
            let unit = block + gap;
            for (slot, &peak) in layout.slots.iter().zip(peaks.values()) {
                let half = peak * center;
                let mut levels = (half / unit).round() as usize;
                if peak > 0.0 {
                    levels = levels.max(1);
                }
                for level in 0..levels {
                    let offset = level as f32 * unit + gap / 2.0;
                    let top = center - offset - block;
                    surface.fill_rect(slot.x, top, slot.width, block, paint(slot));
                    surface.fill_rect(slot.x, center + offset, slot.width, block, paint(slot));
                }
            }
        }
        WaveformStyle::Dots => {
            let max_radius = (config.bar_width * layout.scale).min(center);
            for (slot, &peak) in layout.slots.iter().zip(peaks.values()) {
                let radius = peak * max_radius;
                if radius > 0.0 {
                    surface.fill_circle(slot.x + slot.width / 2.0, center, radius, paint(slot));
                }
            }
        }
        WaveformStyle::Seekbar => {
            let track = (height * SEEKBAR_TRACK_RATIO).max(2.0);
            let top = center - track / 2.0;
            let boundary = progress as f32 * width;
            surface.fill_rect(0.0, top, width, track, config.waveform_color);
            if boundary > 0.0 {
                surface.fill_rect(0.0, top, boundary, track, config.progress_color);
            }
            surface.fill_circle(boundary, center, track.max(3.0), config.progress_color);
        }
    }
}

fn draw_line(
    surface: &mut dyn Surface,
    layout: &Layout,
    peaks: &PeakSeries,
    center: f32,
    config: &RenderConfig,
) {
    let points: Vec<(f32, f32, f32)> = layout
        .slots
        .iter()
        .zip(peaks.values())
        .map(|(slot, &peak)| {
            let x = slot.x + slot.width / 2.0;
            let offset = peak * center;
            (x, center - offset, center + offset)
        })
        .collect();
    let line_width = (config.bar_width * layout.scale / 2.0).max(1.0);
    let played = layout.slots.iter().take_while(|s| s.played).count();

    // each half is one stroke along the top edge and back along the bottom
    let outline = |range: &[(f32, f32, f32)]| -> Vec<(f32, f32)> {
        range
            .iter()
            .map(|&(x, top, _)| (x, top))
            .chain(range.iter().rev().map(|&(x, _, bottom)| (x, bottom)))
            .collect()
    };

    if played > 0 {
        surface.stroke_polyline(&outline(&points[..played]), line_width, config.progress_color);
    }
    if played < points.len() {
        // start one point early so the two halves join
        let start = played.saturating_sub(1);
        surface.stroke_polyline(&outline(&points[start..]), line_width, config.waveform_color);
    }
}

/// Draw a thin tick for each marker that falls inside the track.
pub fn draw_markers(surface: &mut dyn Surface, times: &[f64], duration: f64, paint: Rgba) {
    if !(duration.is_finite() && duration > 0.0) {
        return;
    }
    let width = surface.width();
    let height = surface.height();
    for &time in times {
        if !(0.0..=duration).contains(&time) {
            continue;
        }
        let x = (time / duration) as f32 * width;
        surface.fill_rect(x.min(width - 1.0).max(0.0), 0.0, 1.0, height, paint);
    }
}

/// An RGBA raster with source-over blending, used as a player's backing store.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    // straight (non-premultiplied) rgba, 0..1
    pixels: Vec<[f32; 4]>,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    /// Resize the raster, discarding its content.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = vec![[0.0; 4]; width as usize * height as usize];
    }

    pub fn pixel_width(&self) -> u32 {
        self.width
    }

    pub fn pixel_height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let [r, g, b, a] = self.pixels[(y * self.width + x) as usize];
        Some(Rgba {
            r: (r * 255.0).round() as u8,
            g: (g * 255.0).round() as u8,
            b: (b * 255.0).round() as u8,
            a,
        })
    }

    /// The pixel flattened onto an opaque `background`, with an extra `opacity` factor.
    pub fn composite(&self, x: u32, y: u32, background: Rgba, opacity: f32) -> Rgba {
        let Some(px) = self.pixel(x, y) else {
            return background;
        };
        let a = px.a * opacity.clamp(0.0, 1.0);
        let mix = |fg: u8, bg: u8| (f32::from(fg) * a + f32::from(bg) * (1.0 - a)).round() as u8;
        Rgba {
            r: mix(px.r, background.r),
            g: mix(px.g, background.g),
            b: mix(px.b, background.b),
            a: 1.0,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|p| p[3] == 0.0)
    }

    fn blend(&mut self, x: i64, y: i64, paint: Rgba) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let dst = &mut self.pixels[(y as usize) * self.width as usize + x as usize];
        let sa = paint.a;
        let src = [
            f32::from(paint.r) / 255.0,
            f32::from(paint.g) / 255.0,
            f32::from(paint.b) / 255.0,
        ];
        let out_a = sa + dst[3] * (1.0 - sa);
        if out_a <= 0.0 {
            return;
        }
        for c in 0..3 {
            dst[c] = (src[c] * sa + dst[c] * dst[3] * (1.0 - sa)) / out_a;
        }
        dst[3] = out_a;
    }

    /// Blend each covered pixel exactly once so translucent strokes stay even.
    fn blend_mask(&mut self, mask: &Mask, paint: Rgba) {
        for (x, y) in mask.covered() {
            self.blend(x, y, paint);
        }
    }
}

/// Pixel coverage over the bounding box of one shape, clipped to the raster.
#[derive(Debug)]
struct Mask {
    x0: i64,
    y0: i64,
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Mask {
    /// The box around `points` grown by `radius`, or `None` when it misses a
    /// `width` x `height` raster entirely.
    fn around(points: &[(f32, f32)], radius: f32, width: u32, height: u32) -> Option<Self> {
        let r = radius.max(0.5);
        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for &(x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let x0 = (min_x - r).floor().max(0.0) as i64;
        let x1 = (max_x + r).ceil().min(width as f32) as i64;
        let y0 = (min_y - r).floor().max(0.0) as i64;
        let y1 = (max_y + r).ceil().min(height as f32) as i64;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        let (w, h) = ((x1 - x0) as usize, (y1 - y0) as usize);
        Some(Self {
            x0,
            y0,
            width: w,
            height: h,
            bits: vec![false; w * h],
        })
    }

    fn stamp_disc(&mut self, cx: f32, cy: f32, radius: f32) {
        let r = radius.max(0.5);
        let x0 = ((cx - r).floor() as i64).max(self.x0);
        let x1 = ((cx + r).ceil() as i64).min(self.x0 + self.width as i64);
        let y0 = ((cy - r).floor() as i64).max(self.y0);
        let y1 = ((cy + r).ceil() as i64).min(self.y0 + self.height as i64);
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= r * r {
                    let index = (y - self.y0) as usize * self.width + (x - self.x0) as usize;
                    self.bits[index] = true;
                }
            }
        }
    }

    /// Raster coordinates of every covered pixel.
    fn covered(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, bit)| **bit)
            .map(|(index, _)| {
                let x = self.x0 + (index % self.width) as i64;
                let y = self.y0 + (index / self.width) as i64;
                (x, y)
            })
    }
}

/// Pixel span `[start, end)` covering `[pos, pos + len)`; never empty for `len > 0`.
fn span(pos: f32, len: f32) -> (i64, i64) {
    let start = pos.round() as i64;
    let end = (pos + len).round() as i64;
    (start, end.max(start + 1))
}

impl Surface for PixelSurface {
    fn width(&self) -> f32 {
        self.width as f32
    }

    fn height(&self) -> f32 {
        self.height as f32
    }

    fn clear(&mut self) {
        self.pixels.fill([0.0; 4]);
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: Rgba) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let (x0, x1) = span(x, w);
        let (y0, y1) = span(y, h);
        for py in y0.max(0)..y1.min(i64::from(self.height)) {
            for px in x0.max(0)..x1.min(i64::from(self.width)) {
                self.blend(px, py, paint);
            }
        }
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, paint: Rgba) {
        if radius <= 0.0 || self.pixels.is_empty() {
            return;
        }
        let Some(mut mask) = Mask::around(&[(cx, cy)], radius, self.width, self.height) else {
            return;
        };
        mask.stamp_disc(cx, cy, radius);
        self.blend_mask(&mask, paint);
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], line_width: f32, paint: Rgba) {
        if points.is_empty() || self.pixels.is_empty() {
            return;
        }
        let radius = line_width / 2.0;
        let Some(mut mask) = Mask::around(points, radius, self.width, self.height) else {
            return;
        };
        mask.stamp_disc(points[0].0, points[0].1, radius);
        for pair in points.windows(2) {
            let (ax, ay) = pair[0];
            let (bx, by) = pair[1];
            let length = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
            let steps = (length * 2.0).ceil().max(1.0) as usize;
            for step in 1..=steps {
                let t = step as f32 / steps as f32;
                mask.stamp_disc(ax + (bx - ax) * t, ay + (by - ay) * t, radius);
            }
        }
        self.blend_mask(&mask, paint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{rgb, rgba};

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Clear,
        Rect { x: f32, y: f32, w: f32, h: f32, paint: Rgba },
        Circle { cx: f32, radius: f32, paint: Rgba },
        Polyline { points: usize, paint: Rgba },
    }

    struct Recorder {
        width: f32,
        height: f32,
        ops: Vec<Op>,
    }

    impl Recorder {
        fn new(width: f32, height: f32) -> Self {
            Self {
                width,
                height,
                ops: Vec::new(),
            }
        }

        /// `(x, y, h)` of every rect, in drawing order.
        fn rects(&self) -> Vec<(f32, f32, f32)> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Rect { x, y, h, .. } => Some((*x, *y, *h)),
                    _ => None,
                })
                .collect()
        }

        fn rect_paints(&self) -> Vec<Rgba> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Rect { paint, .. } => Some(*paint),
                    _ => None,
                })
                .collect()
        }
    }

    impl Surface for Recorder {
        fn width(&self) -> f32 {
            self.width
        }
        fn height(&self) -> f32 {
            self.height
        }
        fn clear(&mut self) {
            self.ops.push(Op::Clear);
        }
        fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: Rgba) {
            self.ops.push(Op::Rect { x, y, w, h, paint });
        }
        fn fill_circle(&mut self, cx: f32, _cy: f32, radius: f32, paint: Rgba) {
            self.ops.push(Op::Circle { cx, radius, paint });
        }
        fn stroke_polyline(&mut self, points: &[(f32, f32)], _line_width: f32, paint: Rgba) {
            self.ops.push(Op::Polyline {
                points: points.len(),
                paint,
            });
        }
    }

    const WAVE: Rgba = rgba(255, 255, 255, 0.3);
    const PROGRESS: Rgba = rgb(255, 0, 0);

    fn config(style: WaveformStyle) -> RenderConfig {
        let (bar_width, bar_spacing) = style.default_geometry();
        RenderConfig {
            style,
            bar_width,
            bar_spacing,
            waveform_color: WAVE,
            progress_color: PROGRESS,
            button_color: PROGRESS,
        }
    }

    fn ramp(n: usize) -> PeakSeries {
        PeakSeries::from_values((1..=n).map(|i| i as f32 / n as f32).collect())
    }

    #[test]
    fn test_empty_series_draws_nothing() {
        for style in WaveformStyle::ALL {
            let mut surface = Recorder::new(100.0, 40.0);
            draw(&mut surface, &PeakSeries::empty(), 0.5, &config(style));
            assert!(surface.ops.is_empty(), "{style}");
        }
    }

    #[test]
    fn test_half_progress_splits_at_midpoint() {
        for style in [WaveformStyle::Bars, WaveformStyle::Mirror] {
            let mut surface = Recorder::new(200.0, 40.0);
            draw(&mut surface, &ramp(10), 0.5, &config(style));
            assert_eq!(surface.ops[0], Op::Clear);
            let paints = surface.rect_paints();
            assert_eq!(paints.len(), 10);
            assert!(paints[..5].iter().all(|&p| p == PROGRESS));
            assert!(paints[5..].iter().all(|&p| p == WAVE));
        }
    }

    #[test]
    fn test_played_split_ignores_bar_geometry() {
        let n = 70;
        for (bar_width, bar_spacing) in [(3.0, 1.0), (1.3, 0.3), (0.7, 2.9), (2.2, 0.0)] {
            let config = RenderConfig {
                bar_width,
                bar_spacing,
                ..config(WaveformStyle::Bars)
            };
            for k in [1, 7, 35, 69] {
                let mut surface = Recorder::new(333.0, 40.0);
                draw(&mut surface, &ramp(n), k as f64 / n as f64, &config);
                let played = surface.rect_paints().iter().filter(|&&p| p == PROGRESS).count();
                assert_eq!(played, k, "{bar_width}/{bar_spacing} at {k}/{n}");
            }
        }
    }

    #[test]
    fn test_bars_sit_on_the_baseline() {
        let mut surface = Recorder::new(200.0, 40.0);
        draw(&mut surface, &ramp(10), 0.0, &config(WaveformStyle::Bars));
        let rects = surface.rects();
        assert_eq!(rects.len(), 10);
        for (x, y, h) in rects {
            assert!((y + h - 40.0).abs() < 1e-4, "bar at {x} ends at {}", y + h);
        }
    }

    #[test]
    fn test_mirror_bars_are_centered() {
        let mut surface = Recorder::new(200.0, 40.0);
        draw(&mut surface, &ramp(10), 0.0, &config(WaveformStyle::Mirror));
        let rects = surface.rects();
        assert_eq!(rects.len(), 10);
        for (x, y, h) in rects {
            assert!((y + h / 2.0 - 20.0).abs() < 1e-4, "bar at {x} centered on {}", y + h / 2.0);
        }
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut surface = Recorder::new(100.0, 40.0);
        draw(&mut surface, &ramp(4), 1.5, &config(WaveformStyle::Bars));
        assert!(surface.rect_paints().iter().all(|&p| p == PROGRESS));

        let mut surface = Recorder::new(100.0, 40.0);
        draw(&mut surface, &ramp(4), -0.2, &config(WaveformStyle::Bars));
        assert!(surface.rect_paints().iter().all(|&p| p == WAVE));

        assert_eq!(clamp_progress(f64::NAN), 0.0);
    }

    #[test]
    fn test_layout_spans_surface_width() {
        let mut surface = Recorder::new(400.0, 40.0);
        draw(&mut surface, &ramp(4), 0.0, &config(WaveformStyle::Bars));
        let xs: Vec<f32> = surface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Rect { x, .. } => Some(*x),
                _ => None,
            })
            .collect();
        assert_eq!(xs, vec![0.0, 100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_dots_radius_follows_peak() {
        let mut surface = Recorder::new(60.0, 40.0);
        let peaks = PeakSeries::from_values(vec![0.0, 0.5, 1.0]);
        draw(&mut surface, &peaks, 0.0, &config(WaveformStyle::Dots));
        let radii: Vec<f32> = surface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Circle { radius, .. } => Some(*radius),
                _ => None,
            })
            .collect();
        // the silent position draws no dot
        assert_eq!(radii.len(), 2);
        assert!((radii[1] - 2.0 * radii[0]).abs() < 1e-4);
    }

    #[test]
    fn test_line_uses_two_strokes_when_split() {
        let mut surface = Recorder::new(100.0, 40.0);
        draw(&mut surface, &ramp(10), 0.5, &config(WaveformStyle::Line));
        let strokes: Vec<&Op> = surface
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Polyline { .. }))
            .collect();
        assert_eq!(
            strokes,
            vec![
                &Op::Polyline { points: 10, paint: PROGRESS },
                &Op::Polyline { points: 12, paint: WAVE },
            ]
        );
    }

    #[test]
    fn test_blocks_are_quantized_and_mirrored() {
        let mut surface = Recorder::new(60.0, 60.0);
        let peaks = PeakSeries::from_values(vec![1.0, 0.01]);
        draw(&mut surface, &peaks, 0.0, &config(WaveformStyle::Blocks));
        let rects = surface.rect_paints().len();
        // height 60, layout scale 5: blocks of 20px with 10px gaps give one level per half
        assert_eq!(rects % 2, 0);
        assert!(rects >= 4);
    }

    #[test]
    fn test_blocks_stack_with_peak_level() {
        // layout scale 5: 20px blocks, 10px gaps, 150px per half
        let mut surface = Recorder::new(60.0, 300.0);
        let peaks = PeakSeries::from_values(vec![1.0, 0.2]);
        draw(&mut surface, &peaks, 0.0, &config(WaveformStyle::Blocks));
        let rects = surface.rects();
        let loud = rects.iter().filter(|(x, ..)| *x == 0.0).count();
        let quiet = rects.iter().filter(|(x, ..)| *x == 30.0).count();
        assert_eq!(loud, 10);
        assert_eq!(quiet, 2);
        assert!(loud > quiet);
        assert!(rects.iter().all(|&(_, y, h)| y >= 0.0 && y + h <= 300.0));
    }

    #[test]
    fn test_seekbar_marks_boundary() {
        let mut surface = Recorder::new(100.0, 20.0);
        draw(&mut surface, &ramp(10), 0.25, &config(WaveformStyle::Seekbar));
        assert!(surface.ops.contains(&Op::Rect {
            x: 0.0,
            y: 8.0,
            w: 25.0,
            h: 4.0,
            paint: PROGRESS,
        }));
        assert!(surface.ops.iter().any(
            |op| matches!(op, Op::Circle { cx, .. } if (*cx - 25.0).abs() < 1e-4)
        ));
    }

    #[test]
    fn test_markers_skip_out_of_range() {
        let mut surface = Recorder::new(100.0, 20.0);
        draw_markers(&mut surface, &[-1.0, 5.0, 11.0], 10.0, PROGRESS);
        assert_eq!(
            surface.ops,
            vec![Op::Rect {
                x: 50.0,
                y: 0.0,
                w: 1.0,
                h: 20.0,
                paint: PROGRESS,
            }]
        );

        let mut surface = Recorder::new(100.0, 20.0);
        draw_markers(&mut surface, &[1.0], 0.0, PROGRESS);
        assert!(surface.ops.is_empty());
    }

    #[test]
    fn test_style_parse_and_cycle() {
        assert_eq!("MIRROR".parse::<WaveformStyle>().unwrap(), WaveformStyle::Mirror);
        assert!("wavy".parse::<WaveformStyle>().is_err());
        assert_eq!(WaveformStyle::Seekbar.next(), WaveformStyle::Bars);
    }

    #[test]
    fn test_pixel_surface_split_colors() {
        let mut surface = PixelSurface::new(20, 10);
        let peaks = PeakSeries::from_values(vec![1.0; 10]);
        draw(&mut surface, &peaks, 0.5, &config(WaveformStyle::Mirror));
        assert_eq!(surface.pixel(1, 5).unwrap(), PROGRESS);
        let unplayed = surface.pixel(15, 5).unwrap();
        assert_eq!((unplayed.r, unplayed.g, unplayed.b), (255, 255, 255));
        assert!((unplayed.a - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_surface_translucent_stroke_blends_once() {
        let mut surface = PixelSurface::new(20, 20);
        surface.stroke_polyline(&[(2.0, 10.0), (18.0, 10.0)], 4.0, WAVE);
        let px = surface.pixel(10, 10).unwrap();
        assert!((px.a - 0.3).abs() < 1e-6);
        surface.clear();
        assert!(surface.is_blank());
    }

    #[test]
    fn test_mask_covers_only_the_shape_box() {
        let mask = Mask::around(&[(10.0, 10.0)], 2.0, 1000, 1000).unwrap();
        assert_eq!((mask.x0, mask.y0, mask.width, mask.height), (8, 8, 4, 4));
        assert_eq!(mask.bits.len(), 16);

        let line = Mask::around(&[(-5.0, 5.0), (25.0, 5.0)], 1.0, 20, 10).unwrap();
        assert_eq!((line.x0, line.y0, line.width, line.height), (0, 4, 20, 2));

        assert!(Mask::around(&[(-50.0, -50.0)], 2.0, 20, 10).is_none());
    }

    #[test]
    fn test_pixel_surface_clips_shapes_at_edges() {
        let mut surface = PixelSurface::new(20, 10);
        surface.fill_circle(0.0, 0.0, 3.0, PROGRESS);
        assert_eq!(surface.pixel(0, 0).unwrap(), PROGRESS);
        assert_eq!(surface.pixel(5, 5).unwrap().a, 0.0);

        surface.clear();
        surface.stroke_polyline(&[(-5.0, 5.0), (25.0, 5.0)], 2.0, PROGRESS);
        assert_eq!(surface.pixel(0, 5).unwrap(), PROGRESS);
        assert_eq!(surface.pixel(19, 5).unwrap(), PROGRESS);
        assert_eq!(surface.pixel(10, 0).unwrap().a, 0.0);
    }

    #[test]
    fn test_composite_applies_opacity() {
        let mut surface = PixelSurface::new(1, 1);
        surface.fill_rect(0.0, 0.0, 1.0, 1.0, rgb(200, 200, 200));
        let dimmed = surface.composite(0, 0, rgb(0, 0, 0), 0.5);
        assert_eq!((dimmed.r, dimmed.g, dimmed.b), (100, 100, 100));
    }
}
