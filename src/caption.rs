use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgba, RgbaImage};

use crate::layout::{fill_rect, linear_gradient};
use crate::profile;

const GLYPH: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionStyle {
    Banner,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left(i64),
    Center(i64),
}

#[derive(Debug, Clone, Copy)]
pub struct CaptionFrame {
    panel: (i64, i64, u32, u32),
    panel_color: profile::Rgba,
    text_color: profile::Rgba,
    scale: u32,
    max_chars: usize,
    align: Align,
    first_baseline: i64,
    line_step: i64,
    pub budget: u32,
    pub bound: i64,
}

impl CaptionFrame {
    pub fn new(style: CaptionStyle, (width, height): (u32, u32)) -> Self {
        let (w, h) = (width as i64, height as i64);
        match style {
            CaptionStyle::Banner => Self {
                panel: (20, h - 120, width.saturating_sub(40), 100),
                panel_color: [0, 0, 0, 179],
                text_color: [255, 255, 255, 255],
                scale: 2,
                max_chars: 150,
                align: Align::Left(40),
                first_baseline: h - 90,
                line_step: 25,
                budget: width.saturating_sub(80),
                bound: h - 30,
            },
            CaptionStyle::Card => Self {
                panel: (50, 100, width.saturating_sub(100), height.saturating_sub(200)),
                panel_color: [255, 255, 255, 230],
                text_color: [0x33, 0x33, 0x33, 255],
                scale: 2,
                max_chars: 200,
                align: Align::Center(w / 2),
                first_baseline: 320,
                line_step: 30,
                budget: width.saturating_sub(120),
                bound: h * 3 / 4,
            },
        }
    }

    pub fn measure(&self, line: &str) -> u32 {
        measure(line, self.scale)
    }

    /// Lines that fit the frame, with their baselines. Text past the bound is dropped.
    pub fn lines(&self, text: &str) -> Vec<(String, i64)> {
        let clipped: String = text.chars().take(self.max_chars).collect();
        wrap(&clipped, self.budget, GLYPH * self.scale)
            .into_iter()
            .enumerate()
            .map(|(i, line)| (line, self.first_baseline + i as i64 * self.line_step))
            .take_while(|(_, baseline)| *baseline <= self.bound)
            .collect()
    }

    fn paint_panel(&self, canvas: &mut RgbaImage) {
        let (x, y, w, h) = self.panel;
        fill_rect(canvas, x, y, w, h, self.panel_color);
    }

    fn paint_text(&self, canvas: &mut RgbaImage, text: &str) {
        for (line, baseline) in self.lines(text) {
            let x = match self.align {
                Align::Left(x) => x,
                Align::Center(cx) => cx - self.measure(&line) as i64 / 2,
            };
            draw_text(canvas, &line, x, baseline, self.scale, self.text_color);
        }
    }
}

pub fn measure(line: &str, scale: u32) -> u32 {
    line.chars().count() as u32 * GLYPH * scale
}

pub fn wrap(text: &str, budget: u32, advance: u32) -> Vec<String> {
    let max_chars = (budget / advance.max(1)).max(1) as usize;
    let mut lines = Vec::new();
    let mut line: Vec<char> = Vec::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !line.is_empty() {
                lines.push(line.drain(..).collect());
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if line.is_empty() { word.len() } else { line.len() + 1 + word.len() };
        if needed > max_chars {
            lines.push(line.drain(..).collect());
        } else if !line.is_empty() {
            line.push(' ');
        }
        line.extend(word);
    }
    if !line.is_empty() {
        lines.push(line.into_iter().collect());
    }
    lines
}

pub fn overlay(canvas: &mut RgbaImage, text: Option<&str>, style: CaptionStyle) {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return;
    };
    let frame = CaptionFrame::new(style, canvas.dimensions());
    frame.paint_panel(canvas);
    frame.paint_text(canvas, text);
}

pub fn render_card(mode_name: &str, gradient: (profile::Rgba, profile::Rgba), text: Option<&str>, size: (u32, u32)) -> RgbaImage {
    let mut canvas = linear_gradient(size.0, size.1, gradient.0, gradient.1);
    let frame = CaptionFrame::new(CaptionStyle::Card, size);
    frame.paint_panel(&mut canvas);

    let cx = size.0 as i64 / 2;
    let headline = "AI Composition Complete!";
    draw_text(&mut canvas, headline, cx - measure(headline, 3) as i64 / 2, 200, 3, frame.text_color);
    let mode_line = format!("Mode: {}", capitalize(mode_name));
    draw_text(&mut canvas, &mode_line, cx - measure(&mode_line, 2) as i64 / 2, 250, 2, frame.text_color);

    if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
        frame.paint_text(&mut canvas, text);
    }
    canvas
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Glyph cells sit on `baseline`: rows span `baseline - 8*scale .. baseline`.
fn draw_text(canvas: &mut RgbaImage, text: &str, x: i64, baseline: i64, scale: u32, color: profile::Rgba) {
    let cell = (GLYPH * scale) as i64;
    let top = baseline - cell;
    let (w, h) = (canvas.width() as i64, canvas.height() as i64);
    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as i64 * cell;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale as i64 {
                    for dx in 0..scale as i64 {
                        let px = origin_x + col as i64 * scale as i64 + dx;
                        let py = top + row as i64 * scale as i64 + dy;
                        if px >= 0 && py >= 0 && px < w && py < h {
                            canvas.put_pixel(px as u32, py as u32, Rgba(color));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::CANVAS_SIZE;
    use pretty_assertions::assert_eq;

    const LOREM: &str = "A relaxed linen shirt in sand beige drapes softly over the shoulders, paired with tapered navy chinos and white leather sneakers for a crisp, breezy weekend look that reads effortless and polished.";

    #[test]
    fn wraps_greedily_within_budget() {
        assert_eq!(wrap("aa bb cc dd", 5 * 8, 8), vec!["aa bb", "cc dd"]);
        assert_eq!(wrap("  spaced   out  ", 80, 8), vec!["spaced out"]);
        assert!(wrap("", 80, 8).is_empty());
    }

    #[test]
    fn splits_words_wider_than_budget() {
        assert_eq!(wrap("ab abcdefgh c", 4 * 8, 8), vec!["ab", "abcd", "efgh", "c"]);
    }

    #[test]
    fn banner_lines_respect_width_and_vertical_bound() {
        let frame = CaptionFrame::new(CaptionStyle::Banner, CANVAS_SIZE);
        let long = LOREM.repeat(5);
        let lines = frame.lines(&long);
        assert_eq!(lines.len(), 3);
        for (line, baseline) in &lines {
            assert!(frame.measure(line) <= frame.budget, "{line}");
            assert!(*baseline <= frame.bound);
        }
        let rendered: usize = lines.iter().map(|(l, _)| l.chars().count()).sum();
        assert!(rendered < 150);
    }

    #[test]
    fn card_allows_more_lines_than_banner() {
        let frame = CaptionFrame::new(CaptionStyle::Card, CANVAS_SIZE);
        let words = "word ".repeat(400);
        let lines = frame.lines(&words);
        assert!(lines.len() > 3);
        assert!(lines.iter().all(|(l, b)| frame.measure(l) <= frame.budget && *b <= frame.bound));
    }

    #[test]
    fn blank_text_leaves_canvas_untouched() {
        let blank = RgbaImage::from_pixel(100, 100, Rgba([9, 9, 9, 255]));
        for text in [None, Some(""), Some("   ")] {
            let mut canvas = blank.clone();
            overlay(&mut canvas, text, CaptionStyle::Banner);
            assert_eq!(canvas.as_raw(), blank.as_raw());
        }
    }

    #[test]
    fn banner_text_never_drawn_below_bound() {
        let mut canvas = RgbaImage::from_pixel(800, 800, Rgba([255, 255, 255, 255]));
        overlay(&mut canvas, Some(&LOREM.repeat(3)), CaptionStyle::Banner);
        let frame = CaptionFrame::new(CaptionStyle::Banner, CANVAS_SIZE);

        let mut text_pixels_above = 0;
        for y in 680..780u32 {
            for x in 20..780u32 {
                if canvas.get_pixel(x, y).0 == [255, 255, 255, 255] {
                    assert!(y as i64 <= frame.bound, "text pixel at {x},{y}");
                    text_pixels_above += 1;
                }
            }
        }
        assert!(text_pixels_above > 0);
    }

    #[test]
    fn banner_panel_darkens_without_losing_opacity() {
        let mut canvas = RgbaImage::from_pixel(800, 800, Rgba([200, 200, 200, 255]));
        overlay(&mut canvas, Some("Linen and denim"), CaptionStyle::Banner);
        let panel = canvas.get_pixel(700, 770).0;
        assert_eq!(panel[3], 255);
        assert!(panel[0] < 80, "{panel:?}");
        assert!(canvas.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn card_renders_headline_and_text() {
        let gradient = profile::profile(None).gradient;
        let plain = render_card("tryOn", gradient, None, CANVAS_SIZE);
        let captioned = render_card("tryOn", gradient, Some("Soft knit layers"), CANVAS_SIZE);
        assert_eq!(plain.dimensions(), CANVAS_SIZE);
        assert_ne!(plain.as_raw(), captioned.as_raw());
        assert_eq!(capitalize("bgSwap"), "BgSwap");
    }
}
