use std::io::Cursor;

use image::{imageops, ImageFormat, Rgba, RgbaImage};
use thiserror::Error;

use crate::decode::DecodedImage;
use crate::profile::{self, Mode};

pub const CANVAS_SIZE: (u32, u32) = (800, 800);

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("png encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("render worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    Origin,
    Center,
    TopRight { inset: f32 },
    Fraction { x: f32, y: f32 },
    /// Cell of a centred 2×2 grid whose cells are the placement's extent.
    Grid { col: u32, row: u32, gutter: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    /// Height as a fraction of the canvas height, width from the source aspect ratio.
    FitHeight(f32),
    Square(f32),
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Clip {
    RoundedRect { radius: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub color: profile::Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub source: usize,
    pub anchor: Anchor,
    pub extent: Extent,
    pub z: u8,
    pub opacity: f32,
    pub clip: Option<Clip>,
    pub shadow: Option<Shadow>,
}

impl Placement {
    pub const fn new(source: usize, anchor: Anchor, extent: Extent) -> Self {
        Self {
            source,
            anchor,
            extent,
            z: 0,
            opacity: 1.0,
            clip: None,
            shadow: None,
        }
    }

    pub const fn z(mut self, z: u8) -> Self {
        self.z = z;
        self
    }

    pub const fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub const fn clip(mut self, clip: Clip) -> Self {
        self.clip = Some(clip);
        self
    }

    pub const fn shadow(mut self, shadow: Shadow) -> Self {
        self.shadow = Some(shadow);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn resolve(placement: &Placement, canvas: (u32, u32), source: (u32, u32)) -> Rect {
    let (cw, ch) = (canvas.0 as f32, canvas.1 as f32);
    let min_side = cw.min(ch);
    let (width, height) = match placement.extent {
        Extent::FitHeight(frac) => {
            let height = ch * frac;
            let aspect = source.0.max(1) as f32 / source.1.max(1) as f32;
            (height * aspect, height)
        }
        Extent::Square(frac) => (min_side * frac, min_side * frac),
        Extent::Fill => (cw, ch),
    };
    let (x, y) = match placement.anchor {
        Anchor::Origin => (0.0, 0.0),
        Anchor::Center => ((cw - width) / 2.0, (ch - height) / 2.0),
        Anchor::TopRight { inset } => (cw - width - inset, inset),
        Anchor::Fraction { x, y } => (cw * x, ch * y),
        Anchor::Grid { col, row, gutter } => (
            (cw - width * 2.0 - gutter) / 2.0 + col as f32 * (width + gutter),
            (ch - height * 2.0 - gutter) / 2.0 + row as f32 * (height + gutter),
        ),
    };
    Rect { x, y, width, height }
}

pub fn placements(mode: Option<Mode>, images: &[DecodedImage], canvas: (u32, u32)) -> Vec<(Placement, Rect)> {
    let mut resolved: Vec<(Placement, Rect)> = profile::profile(mode)
        .recipe
        .iter()
        .filter_map(|p| {
            images
                .get(p.source)
                .map(|img| (*p, resolve(p, canvas, (img.width, img.height))))
        })
        .collect();
    resolved.sort_by_key(|(p, _)| p.z);
    resolved
}

pub fn compose(mode: Option<Mode>, images: &[DecodedImage], canvas: (u32, u32)) -> RgbaImage {
    let (start, end) = profile::profile(mode).gradient;
    let mut out = linear_gradient(canvas.0, canvas.1, start, end);
    for (placement, rect) in placements(mode, images, canvas) {
        draw(&mut out, &images[placement.source].raster, &placement, rect);
    }
    out
}

pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, CompositeError> {
    let mut buf = Cursor::new(Vec::new());
    canvas.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Top-left to bottom-right gradient; each pixel centre is projected onto the diagonal.
pub fn linear_gradient(width: u32, height: u32, start: profile::Rgba, end: profile::Rgba) -> RgbaImage {
    let (w, h) = (width as f32, height as f32);
    let len_sq = (w * w + h * h).max(f32::EPSILON);
    RgbaImage::from_fn(width, height, |x, y| {
        let t = (((x as f32 + 0.5) * w + (y as f32 + 0.5) * h) / len_sq).clamp(0.0, 1.0);
        Rgba(lerp_color(start, end, t))
    })
}

fn lerp_color(a: profile::Rgba, b: profile::Rgba, t: f32) -> profile::Rgba {
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
    }
    out
}

pub(crate) fn fill_rect(dst: &mut RgbaImage, x: i64, y: i64, width: u32, height: u32, color: profile::Rgba) {
    let bounds = (dst.width() as i64, dst.height() as i64);
    let Some(win) = Window::visible(x, y, (width, height), (0, 0), bounds) else {
        return;
    };
    let (left, top) = (x + win.left as i64, y + win.top as i64);
    for dy in 0..win.height {
        for dx in 0..win.width {
            let px = dst.get_pixel_mut(left as u32 + dx, top as u32 + dy);
            px.0 = over(px.0, color, 1.0);
        }
    }
}

/// Part of a box at (`x`, `y`) that falls inside `[min, max)`, relative to the box.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Window {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl Window {
    fn visible(x: i64, y: i64, size: (u32, u32), min: (i64, i64), max: (i64, i64)) -> Option<Self> {
        let x0 = x.max(min.0);
        let y0 = y.max(min.1);
        let x1 = x.saturating_add(size.0 as i64).min(max.0);
        let y1 = y.saturating_add(size.1 as i64).min(max.1);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            left: (x0 - x) as u32,
            top: (y0 - y) as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

fn draw(canvas: &mut RgbaImage, source: &RgbaImage, placement: &Placement, rect: Rect) {
    if source.width() == 0 || source.height() == 0 {
        return;
    }
    let x = rect.x.round() as i64;
    let y = rect.y.round() as i64;
    let size = (
        rect.width.round().max(1.0) as u32,
        rect.height.round().max(1.0) as u32,
    );

    if let Some(shadow) = placement.shadow {
        draw_shadow(canvas, x, y, size, placement.clip, shadow);
    }
    let bounds = (canvas.width() as i64, canvas.height() as i64);
    let Some(win) = Window::visible(x, y, size, (0, 0), bounds) else {
        return;
    };
    let mut scaled = resample(source, size, win);
    if let Some(Clip::RoundedRect { radius }) = placement.clip {
        mask_rounded(&mut scaled, radius, size, (win.left, win.top));
    }
    blend(canvas, &scaled, x + win.left as i64, y + win.top as i64, placement.opacity);
}

/// Resizes `source` to `size` but only materialises the `win` part of the result.
fn resample(source: &RgbaImage, size: (u32, u32), win: Window) -> RgbaImage {
    let (sw, sh) = source.dimensions();
    let fx = sw as f64 / size.0 as f64;
    let fy = sh as f64 / size.1 as f64;
    let sx0 = ((win.left as f64 * fx).floor() as u32).min(sw - 1);
    let sy0 = ((win.top as f64 * fy).floor() as u32).min(sh - 1);
    let sx1 = (((win.left + win.width) as f64 * fx).ceil() as u32).min(sw).max(sx0 + 1);
    let sy1 = (((win.top + win.height) as f64 * fy).ceil() as u32).min(sh).max(sy0 + 1);
    let crop = imageops::crop_imm(source, sx0, sy0, sx1 - sx0, sy1 - sy0).to_image();
    imageops::resize(&crop, win.width, win.height, imageops::FilterType::Triangle)
}

fn draw_shadow(canvas: &mut RgbaImage, x: i64, y: i64, size: (u32, u32), clip: Option<Clip>, shadow: Shadow) {
    // Canvas shadowBlur is twice the gaussian sigma.
    let sigma = (shadow.blur / 2.0).max(0.0);
    let pad = (sigma * 3.0).ceil() as u32;
    let reach = pad as i64;
    let [r, g, b, a] = shadow.color;

    let sx = x.saturating_add(shadow.offset_x.round() as i64);
    let sy = y.saturating_add(shadow.offset_y.round() as i64);
    let max = (canvas.width() as i64 + reach, canvas.height() as i64 + reach);
    let Some(win) = Window::visible(sx, sy, size, (-reach, -reach), max) else {
        return;
    };

    let mut shape = RgbaImage::from_pixel(win.width, win.height, Rgba([r, g, b, a]));
    if let Some(Clip::RoundedRect { radius }) = clip {
        mask_rounded(&mut shape, radius, size, (win.left, win.top));
    }
    let mut mask = RgbaImage::from_pixel(win.width + pad * 2, win.height + pad * 2, Rgba([r, g, b, 0]));
    imageops::replace(&mut mask, &shape, reach, reach);

    let blurred = if sigma > 0.0 { imageops::blur(&mask, sigma) } else { mask };
    blend(canvas, &blurred, sx + win.left as i64 - reach, sy + win.top as i64 - reach, 1.0);
}

/// Rounds the corners of a `size` box; `img` holds the part of it starting at `offset`.
fn mask_rounded(img: &mut RgbaImage, radius: f32, size: (u32, u32), offset: (u32, u32)) {
    let (w, h) = (size.0 as f32, size.1 as f32);
    let r = radius.min(w / 2.0).min(h / 2.0).max(0.0);
    if r <= 0.0 {
        return;
    }
    for (x, y, px) in img.enumerate_pixels_mut() {
        let cx = (x + offset.0) as f32 + 0.5;
        let cy = (y + offset.1) as f32 + 0.5;
        let dx = (r - cx).max(cx - (w - r)).max(0.0);
        let dy = (r - cy).max(cy - (h - r)).max(0.0);
        if dx > 0.0 && dy > 0.0 {
            let coverage = (r - (dx * dx + dy * dy).sqrt() + 0.5).clamp(0.0, 1.0);
            px[3] = (px[3] as f32 * coverage).round() as u8;
        }
    }
}

fn blend(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64, opacity: f32) {
    let (dw, dh) = (dst.width() as i64, dst.height() as i64);
    for (sx, sy, px) in src.enumerate_pixels() {
        let (tx, ty) = (x + sx as i64, y + sy as i64);
        if tx < 0 || ty < 0 || tx >= dw || ty >= dh {
            continue;
        }
        let out = dst.get_pixel_mut(tx as u32, ty as u32);
        out.0 = over(out.0, px.0, opacity);
    }
}

/// Source-over for straight alpha. An opaque destination stays opaque.
fn over(dst: profile::Rgba, src: profile::Rgba, opacity: f32) -> profile::Rgba {
    let sa = src[3] as f32 / 255.0 * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0 * (1.0 - sa);
    let oa = sa + da;
    let mut out = [0u8; 4];
    for i in 0..3 {
        out[i] = ((src[i] as f32 * sa + dst[i] as f32 * da) / oa).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (oa * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> DecodedImage {
        DecodedImage::from_raster(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    fn close(actual: [u8; 4], expected: [u8; 4], tolerance: u8) -> bool {
        actual.iter().zip(expected).all(|(a, e)| a.abs_diff(e) <= tolerance)
    }

    fn overlaps(a: &Rect, b: &Rect) -> bool {
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }

    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    #[test]
    fn flat_lay_places_four_disjoint_grid_cells() {
        let images = vec![
            solid(30, 90, RED),
            solid(400, 20, GREEN),
            solid(5, 5, BLUE),
            solid(1200, 900, RED),
        ];
        let rects: Vec<Rect> = placements(Some(Mode::FlatLay), &images, CANVAS_SIZE)
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        assert_eq!(rects.len(), 4);
        assert_eq!(rects[0], Rect { x: 60.0, y: 60.0, width: 320.0, height: 320.0 });
        assert_eq!(rects[3], Rect { x: 420.0, y: 420.0, width: 320.0, height: 320.0 });
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!overlaps(a, b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn extra_images_are_ignored_and_missing_slots_skipped() {
        let five: Vec<DecodedImage> = (0..5).map(|_| solid(10, 10, RED)).collect();
        assert_eq!(placements(Some(Mode::Collage), &five, CANVAS_SIZE).len(), 4);
        assert_eq!(placements(Some(Mode::FlatLay), &five[..3], CANVAS_SIZE).len(), 3);
        assert_eq!(placements(Some(Mode::BgSwap), &five[..1], CANVAS_SIZE).len(), 1);
        assert!(placements(Some(Mode::TryOn), &[], CANVAS_SIZE).is_empty());
    }

    #[test]
    fn zero_images_yield_gradient_only_canvas() {
        let canvas = compose(Some(Mode::FlatLay), &[], CANVAS_SIZE);
        assert_eq!(canvas.dimensions(), CANVAS_SIZE);
        let (start, end) = profile::profile(Some(Mode::FlatLay)).gradient;
        assert!(close(canvas.get_pixel(0, 0).0, start, 2));
        assert!(close(canvas.get_pixel(799, 799).0, end, 2));
    }

    #[test]
    fn bg_swap_covers_gradient_with_stretched_background() {
        let images = vec![solid(100, 200, RED), solid(50, 50, BLUE)];
        let canvas = compose(Some(Mode::BgSwap), &images, CANVAS_SIZE);
        for (x, y) in [(0, 0), (799, 0), (0, 799), (799, 799), (100, 400)] {
            assert!(close(canvas.get_pixel(x, y).0, BLUE, 2), "pixel {x},{y}");
        }
        // subject: 360x720 centred
        assert!(close(canvas.get_pixel(400, 400).0, RED, 2));
        assert!(close(canvas.get_pixel(230, 50).0, RED, 2));
    }

    #[test]
    fn try_on_overlays_garment_top_right_at_reduced_opacity() {
        let images = vec![solid(100, 200, RED), solid(64, 64, GREEN)];
        let canvas = compose(Some(Mode::TryOn), &images, CANVAS_SIZE);
        assert!(close(canvas.get_pixel(400, 400).0, RED, 2));

        // garment spans x 540..780, y 20..260; at (700,100) it sits over the gradient
        let px = canvas.get_pixel(700, 100).0;
        assert!(px[1] > 200 && px[1] < 250, "{px:?}");
        assert_eq!(px[3], 255);
    }

    #[test]
    fn collage_tiles_are_rounded() {
        let images = vec![solid(10, 10, RED)];
        let canvas = compose(Some(Mode::Collage), &images, CANVAS_SIZE);
        assert!(close(canvas.get_pixel(240, 240).0, RED, 2));
        assert!(!close(canvas.get_pixel(80, 80).0, RED, 40));
        assert!(close(canvas.get_pixel(240, 80).0, RED, 2));
    }

    #[test]
    fn compose_is_deterministic() {
        let images = vec![solid(37, 91, RED), solid(64, 48, GREEN), solid(20, 20, BLUE)];
        for mode in Mode::ALL {
            let a = encode_png(&compose(Some(mode), &images, CANVAS_SIZE)).unwrap();
            let b = encode_png(&compose(Some(mode), &images, CANVAS_SIZE)).unwrap();
            assert_eq!(a, b);
            assert!(a.starts_with(b"\x89PNG\r\n\x1a\n"));
        }
    }

    #[test]
    fn extreme_aspect_subject_renders_only_the_visible_slice() {
        let images = vec![solid(4000, 1, RED)];
        let (_, rect) = placements(Some(Mode::TryOn), &images, CANVAS_SIZE)[0];
        assert!(rect.width > 1_000_000.0);

        for mode in [Mode::TryOn, Mode::BgSwap] {
            let canvas = compose(Some(mode), &images, CANVAS_SIZE);
            assert_eq!(canvas.dimensions(), CANVAS_SIZE);
            assert!(close(canvas.get_pixel(400, 400).0, RED, 2), "{mode:?}");
            assert!(close(canvas.get_pixel(0, 400).0, RED, 2), "{mode:?}");
        }
    }

    #[test]
    fn composites_stay_opaque() {
        let images = vec![solid(30, 90, RED), solid(64, 64, GREEN), solid(20, 20, BLUE), solid(50, 10, RED)];
        for mode in Mode::ALL.into_iter().map(Some).chain([None]) {
            let canvas = compose(mode, &images, CANVAS_SIZE);
            let translucent = canvas.pixels().filter(|p| p[3] != 255).count();
            assert_eq!(translucent, 0, "{mode:?}");
        }
    }

    fn luma_sum(px: [u8; 4]) -> u32 {
        px[..3].iter().map(|&c| c as u32).sum()
    }

    fn assert_darker(mode: Mode, tiles: usize, points: &[(u32, u32)]) {
        let images: Vec<DecodedImage> = (0..tiles).map(|_| solid(10, 10, [255, 255, 255, 255])).collect();
        let bare = compose(Some(mode), &[], CANVAS_SIZE);
        let shaded = compose(Some(mode), &images, CANVAS_SIZE);
        for &(x, y) in points {
            let before = luma_sum(bare.get_pixel(x, y).0);
            let after = luma_sum(shaded.get_pixel(x, y).0);
            assert!(after + 6 <= before, "{mode:?} at {x},{y}: {after} vs {before}");
        }
    }

    #[test]
    fn flat_lay_tiles_cast_offset_shadows() {
        // cells are 320px at 60 and 420; the shadow is shifted 5px right and down
        let mut points = Vec::new();
        for (tx, ty) in [(60, 60), (420, 60), (60, 420), (420, 420)] {
            points.push((tx + 322, ty + 160));
            points.push((tx + 160, ty + 322));
        }
        assert_darker(Mode::FlatLay, 4, &points);
    }

    #[test]
    fn collage_tiles_cast_soft_shadows() {
        // outer edges of the tiles at (400,80) and (400,400)
        assert_darker(Mode::Collage, 4, &[(720, 240), (720, 560), (560, 720)]);
    }

    #[test]
    fn touching_rects_do_not_overlap() {
        let a = Rect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        let b = Rect { x: 10.0, y: 0.0, width: 10.0, height: 10.0 };
        let c = Rect { x: 9.0, y: 9.0, width: 2.0, height: 2.0 };
        assert!(!overlaps(&a, &b));
        assert!(overlaps(&a, &c));
    }
}
