//! PDF report layout.
//!
//! The report is a US-letter document with one-inch margins:
//!
//! ```text
//!                News Summary
//! Ok News
//! • headline
//! • headline
//!
//! Depressing News
//! • headline
//!          Updated on: 2025-05-06 08:15:00
//! ```
//!
//! Pages break automatically and every page carries the timestamp footer.
//! Glyph widths are estimated rather than measured, which is close enough
//! for wrapping and centering short lines of Times-Roman.

use crate::models::ReportPartition;
use chrono::{DateTime, Local};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rgb,
};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 25.4;
const FOOTER_BASELINE_MM: f32 = 12.7;
const PT_TO_MM: f32 = 0.352_778;
/// Average glyph advance as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.5;

const TITLE_PT: f32 = 20.0;
const SUBHEADING_PT: f32 = 16.0;
const HEADLINE_PT: f32 = 12.0;
const HEADLINE_LEADING_PT: f32 = 15.0;
const FOOTER_PT: f32 = 10.0;

const LAYER_NAME: &str = "Layer 1";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("pdf error: {0}")]
    Pdf(#[from] printpdf::Error),

    #[error("could not load font {}: {source}", .path.display())]
    Font {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write report: {0}")]
    Io(#[from] io::Error),
}

/// Settings for one rendering.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub title: String,
    /// TrueType font to embed; builtin Times-Roman when `None`.
    pub font_path: Option<PathBuf>,
    /// Timestamp printed in every footer.
    pub generated_at: DateTime<Local>,
}

impl RenderOptions {
    pub fn new(font_path: Option<PathBuf>) -> Self {
        Self {
            title: "News Summary".to_string(),
            font_path,
            generated_at: Local::now(),
        }
    }
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Center,
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

fn dark_blue() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.545, None))
}

fn grey() -> Color {
    Color::Rgb(Rgb::new(0.5, 0.5, 0.5, None))
}

fn text_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * AVG_GLYPH_EM * PT_TO_MM
}

/// Greedy word wrap to at most `max_chars` characters per line.
///
/// Words longer than a line are split.
pub(crate) fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let needed = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Characters of the 0x80..=0x9F block of WinAnsiEncoding.
const WIN_ANSI_EXTRAS: [char; 27] = [
    '\u{20AC}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{017D}', '\u{2018}',
    '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}',
    '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{017E}', '\u{0178}',
];

fn in_win_ansi(c: char) -> bool {
    matches!(c as u32, 0x20..=0x7E | 0xA0..=0xFF) || WIN_ANSI_EXTRAS.contains(&c)
}

/// Builtin fonts are written in WinAnsiEncoding; anything outside it
/// becomes `?`.
pub(crate) fn fold_for_builtin_font(text: &str) -> String {
    text.chars()
        .map(|c| if in_win_ansi(c) { c } else { '?' })
        .collect()
}

struct Layout {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    builtin_font: bool,
    layer: PdfLayerReference,
    cursor_mm: f32,
    footer: String,
    pages: usize,
}

impl Layout {
    fn new(options: &RenderOptions) -> Result<Self, ReportError> {
        let (doc, page, layer) = PdfDocument::new(
            options.title.as_str(),
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            LAYER_NAME,
        );
        let (font, builtin_font) = match &options.font_path {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|source| ReportError::Font {
                    path: path.clone(),
                    source,
                })?;
                (doc.add_external_font(bytes.as_slice())?, false)
            }
            None => (doc.add_builtin_font(BuiltinFont::TimesRoman)?, true),
        };
        let layer = doc.get_page(page).get_layer(layer);

        let mut layout = Self {
            doc,
            font,
            builtin_font,
            layer,
            cursor_mm: PAGE_HEIGHT_MM - MARGIN_MM,
            footer: format!(
                "Updated on: {}",
                options.generated_at.format("%Y-%m-%d %H:%M:%S")
            ),
            pages: 1,
        };
        layout.draw_footer();
        Ok(layout)
    }

    fn prepare(&self, text: &str) -> String {
        if self.builtin_font {
            fold_for_builtin_font(text)
        } else {
            text.to_string()
        }
    }

    fn draw_footer(&mut self) {
        let footer = self.prepare(&self.footer);
        let x = (PAGE_WIDTH_MM - text_width_mm(&footer, FOOTER_PT)) / 2.0;
        self.layer.set_fill_color(grey());
        self.layer
            .use_text(footer, FOOTER_PT, Mm(x), Mm(FOOTER_BASELINE_MM), &self.font);
        self.layer.set_fill_color(black());
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;
        self.pages += 1;
        self.draw_footer();
    }

    fn space(&mut self, pt: f32) {
        self.cursor_mm -= pt * PT_TO_MM;
    }

    /// Write one line, breaking the page first if it would cross the margin.
    fn line(&mut self, text: &str, size_pt: f32, leading_pt: f32, color: Color, align: Align) {
        let advance = leading_pt * PT_TO_MM;
        if self.cursor_mm - advance < MARGIN_MM {
            self.new_page();
        }
        self.cursor_mm -= advance;

        let text = self.prepare(text);
        let x = match align {
            Align::Left => MARGIN_MM,
            Align::Center => (PAGE_WIDTH_MM - text_width_mm(&text, size_pt)) / 2.0,
        };
        self.layer.set_fill_color(color);
        self.layer
            .use_text(text, size_pt, Mm(x), Mm(self.cursor_mm), &self.font);
    }

    fn section(&mut self, heading: &str, headlines: &[String]) {
        self.space(12.0);
        self.line(heading, SUBHEADING_PT, SUBHEADING_PT * 1.2, dark_blue(), Align::Left);
        self.space(6.0);

        let usable_pt = (PAGE_WIDTH_MM - 2.0 * MARGIN_MM) / PT_TO_MM;
        let max_chars = (usable_pt / (HEADLINE_PT * AVG_GLYPH_EM)) as usize;
        for headline in headlines {
            let text = format!("\u{2022} {headline}");
            for wrapped in wrap_words(&text, max_chars) {
                self.line(&wrapped, HEADLINE_PT, HEADLINE_LEADING_PT, black(), Align::Left);
            }
        }
    }

    fn finish(self) -> Result<Vec<u8>, ReportError> {
        Ok(self.doc.save_to_bytes()?)
    }
}

fn lay_out(report: &ReportPartition, options: &RenderOptions) -> Result<Layout, ReportError> {
    let mut layout = Layout::new(options)?;
    layout.line(&options.title, TITLE_PT, TITLE_PT * 1.2, black(), Align::Center);
    layout.space(12.0);
    layout.section("Ok News", &report.ok);
    layout.space(20.0);
    layout.section("Depressing News", &report.depressing);
    Ok(layout)
}

/// Render the two report sections to PDF bytes.
#[instrument(level = "info", skip_all, fields(ok = report.ok.len(), depressing = report.depressing.len()))]
pub fn render_pdf(report: &ReportPartition, options: &RenderOptions) -> Result<Vec<u8>, ReportError> {
    let layout = lay_out(report, options)?;
    debug!(pages = layout.pages, "Laid out report");
    layout.finish()
}

/// Write the rendered report, creating parent directories as needed.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_report(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, bytes).await?;
    info!(bytes = bytes.len(), "PDF created successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(ok: usize, depressing: usize) -> ReportPartition {
        ReportPartition {
            ok: (0..ok).map(|i| format!("Good thing number {i} happened today")).collect(),
            depressing: (0..depressing)
                .map(|i| format!("Bad thing number {i} happened today"))
                .collect(),
        }
    }

    #[test]
    fn test_render_produces_pdf() {
        let bytes = render_pdf(&report(3, 2), &RenderOptions::new(None)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_empty_sections_still_render() {
        let layout = lay_out(&ReportPartition::default(), &RenderOptions::new(None)).unwrap();
        assert_eq!(layout.pages, 1);
        assert!(layout.finish().unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_long_sections_paginate() {
        let layout = lay_out(&report(60, 60), &RenderOptions::new(None)).unwrap();
        assert!(layout.pages > 1);
    }

    #[test]
    fn test_missing_font_is_reported() {
        let options = RenderOptions::new(Some(PathBuf::from("/nonexistent/font.ttf")));
        assert!(matches!(
            render_pdf(&report(1, 1), &options),
            Err(ReportError::Font { .. })
        ));
    }

    #[test]
    fn test_wrap_words() {
        assert_eq!(wrap_words("a bb ccc dd", 6), vec!["a bb", "ccc dd"]);
        assert_eq!(wrap_words("abcdefgh ij", 3), vec!["abc", "def", "gh", "ij"]);
        assert_eq!(wrap_words("short", 80), vec!["short"]);
        assert!(wrap_words("   ", 10).is_empty());
    }

    #[test]
    fn test_fold_keeps_typographic_punctuation() {
        let headline = "\u{2018}It\u{2019}s over\u{2019} \u{2013} \u{201C}caf\u{e9}\u{201D} \u{2014} \u{2022} 5\u{20AC}\u{2026}";
        assert_eq!(fold_for_builtin_font(headline), headline);
    }

    #[test]
    fn test_fold_replaces_characters_outside_win_ansi() {
        assert_eq!(fold_for_builtin_font("\u{4e2d} news \u{2212}1"), "? news ?1");
        assert_eq!(fold_for_builtin_font("tab\there"), "tab?here");
    }

    #[test]
    fn test_curly_quoted_headline_renders() {
        let report = ReportPartition {
            ok: vec!["Minister says \u{2018}we will act\u{2019} on flooding".to_string()],
            depressing: Vec::new(),
        };
        assert!(render_pdf(&report, &RenderOptions::new(None)).unwrap().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_write_report_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("news_mood_pdf_{}", std::process::id()));
        let path = dir.join("nested").join("report.pdf");
        let bytes = render_pdf(&report(2, 2), &RenderOptions::new(None)).unwrap();

        write_report(&path, &bytes).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), bytes);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
