//! # Resume PDF Module
//!
//! Renders the generated resume as an A4 PDF: a title line, an optional
//! photo in the top right corner and the body text word-wrapped over as many
//! pages as it needs.
//!
//! Layout is computed in points by [`wrap_text`] and [`paginate`], which do
//! not touch `printpdf`, and drawn by [`render_resume_pdf`].

use anyhow::{anyhow, Context, Result};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    Pt,
};
use std::fs::File;
use std::path::Path;
use tracing::{error, warn};

pub const PAGE_WIDTH_PT: f32 = 595.28;
pub const PAGE_HEIGHT_PT: f32 = 841.89;
pub const MARGIN_PT: f32 = 50.0;
pub const TITLE_FONT_SIZE: f32 = 20.0;
pub const TITLE_GAP_PT: f32 = 40.0;
pub const BODY_FONT_SIZE: f32 = 12.0;
pub const LINE_HEIGHT_PT: f32 = 18.0;
pub const PHOTO_BOX_PT: f32 = 150.0;
pub const PHOTO_LEFT_PT: f32 = 400.0;
pub const PHOTO_TOP_OFFSET_PT: f32 = 200.0;

/// Rough average glyph width relative to the font size
const AVERAGE_GLYPH_WIDTH: f32 = 0.5;

const PHOTO_DPI: f32 = 300.0;

/// Unicode TTF covering Latin and Cyrillic
const BUNDLED_FONT: &[u8] = include_bytes!("../resources/fonts/DejaVuSans.ttf");

/// What goes into the document
pub struct ResumeDocument<'a> {
    pub name: &'a str,
    pub specialty: &'a str,
    pub photo_path: Option<&'a Path>,
    pub body: &'a str,
}

impl ResumeDocument<'_> {
    pub fn title(&self) -> String {
        format!("{} — {}", self.name, self.specialty)
    }
}

/// How many body characters fit on one line
pub fn max_chars_per_line() -> usize {
    let usable = PAGE_WIDTH_PT - 2.0 * MARGIN_PT;
    (usable / (BODY_FONT_SIZE * AVERAGE_GLYPH_WIDTH)).floor() as usize
}

/// Break text into lines of at most `max_chars` characters
///
/// Paragraph breaks are kept; words longer than a line are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > max_chars {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let separator = usize::from(current_len > 0);
            if current_len + separator + word.len() > max_chars {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current_len += word.len();
            current.extend(word);
        }

        lines.push(current);
    }

    lines
}

/// A line of text placed at a baseline `y` (points from the page bottom)
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedLine {
    pub y: f32,
    pub text: String,
}

/// Distribute body lines over pages; the first page starts below the title
pub fn paginate(lines: &[String]) -> Vec<Vec<PlacedLine>> {
    let top = PAGE_HEIGHT_PT - MARGIN_PT;
    let mut pages = vec![Vec::new()];
    let mut y = top - TITLE_GAP_PT;

    for line in lines {
        if y < MARGIN_PT {
            pages.push(Vec::new());
            y = top;
        }
        if let Some(page) = pages.last_mut() {
            page.push(PlacedLine { y, text: line.clone() });
        }
        y -= LINE_HEIGHT_PT;
    }

    pages
}

/// Render the resume to PDF bytes
///
/// `font_path` overrides the bundled DejaVu Sans. Helvetica is used only
/// when neither font loads, and it drops every non-Latin glyph.
pub fn render_resume_pdf(document: &ResumeDocument<'_>, font_path: Option<&Path>) -> Result<Vec<u8>> {
    let width = Mm::from(Pt(PAGE_WIDTH_PT));
    let height = Mm::from(Pt(PAGE_HEIGHT_PT));
    let title = document.title();

    let (doc, first_page, first_layer) = PdfDocument::new(&title, width, height, "Layer 1");
    let font = load_font(&doc, font_path)?;

    let pages = paginate(&wrap_text(document.body, max_chars_per_line()));
    for (index, lines) in pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(width, height, format!("Page {}", index + 1));
            doc.get_page(page).get_layer(layer)
        };

        if index == 0 {
            layer.use_text(
                title.as_str(),
                TITLE_FONT_SIZE,
                Mm::from(Pt(MARGIN_PT)),
                Mm::from(Pt(PAGE_HEIGHT_PT - MARGIN_PT)),
                &font,
            );

            if let Some(photo_path) = document.photo_path {
                if let Err(e) = draw_photo(&layer, photo_path) {
                    error!(photo = %photo_path.display(), error = %e, "Failed to add photo to resume");
                }
            }
        }

        for line in lines {
            layer.use_text(
                line.text.as_str(),
                BODY_FONT_SIZE,
                Mm::from(Pt(MARGIN_PT)),
                Mm::from(Pt(line.y)),
                &font,
            );
        }
    }

    doc.save_to_bytes()
        .map_err(|e| anyhow!("failed to serialize resume PDF: {e:?}"))
}

fn load_font(doc: &PdfDocumentReference, font_path: Option<&Path>) -> Result<IndirectFontRef> {
    if let Some(path) = font_path {
        match load_font_file(doc, path) {
            Ok(font) => return Ok(font),
            Err(e) => warn!(error = %e, "Configured resume font failed, using bundled font"),
        }
    }

    match doc.add_external_font(BUNDLED_FONT) {
        Ok(font) => Ok(font),
        Err(e) => {
            warn!(error = ?e, "Bundled font failed to load, falling back to Helvetica");
            doc.add_builtin_font(BuiltinFont::Helvetica)
                .map_err(|e| anyhow!("failed to load builtin font: {e:?}"))
        }
    }
}

fn load_font_file(doc: &PdfDocumentReference, path: &Path) -> Result<IndirectFontRef> {
    let file = File::open(path).with_context(|| format!("failed to open font {}", path.display()))?;
    doc.add_external_font(file)
        .map_err(|e| anyhow!("failed to load font {}: {e:?}", path.display()))
}

/// Fit the photo into the photo box, keeping its aspect ratio
fn draw_photo(layer: &printpdf::PdfLayerReference, path: &Path) -> Result<()> {
    let decoded = image::open(path).with_context(|| format!("failed to decode {}", path.display()))?;
    let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());

    let (width_px, height_px) = (rgb.width() as f32, rgb.height() as f32);
    if width_px == 0.0 || height_px == 0.0 {
        return Err(anyhow!("empty image"));
    }
    let natural_width = width_px * 72.0 / PHOTO_DPI;
    let natural_height = height_px * 72.0 / PHOTO_DPI;
    let scale = (PHOTO_BOX_PT / natural_width).min(PHOTO_BOX_PT / natural_height);

    Image::from_dynamic_image(&rgb).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm::from(Pt(PHOTO_LEFT_PT))),
            translate_y: Some(Mm::from(Pt(PAGE_HEIGHT_PT - PHOTO_TOP_OFFSET_PT))),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(PHOTO_DPI),
            ..Default::default()
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let text = "alpha beta gamma delta epsilon";
        let lines = wrap_text(text, 11);
        assert_eq!(lines, ["alpha beta", "gamma delta", "epsilon"]);
    }

    #[test]
    fn test_wrap_keeps_paragraphs() {
        let lines = wrap_text("first\n\nsecond", 80);
        assert_eq!(lines, ["first", "", "second"]);
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_counts_characters_not_bytes() {
        let lines = wrap_text("привіт світ", 6);
        assert_eq!(lines, ["привіт", "світ"]);
    }

    #[test]
    fn test_paginate_single_page() {
        let lines = vec!["a".to_string(), "b".to_string()];
        let pages = paginate(&lines);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0][0].y, PAGE_HEIGHT_PT - MARGIN_PT - TITLE_GAP_PT);
        assert_eq!(pages[0][1].y, pages[0][0].y - LINE_HEIGHT_PT);
    }

    #[test]
    fn test_paginate_overflows_to_new_page() {
        let lines: Vec<String> = (0..100).map(|i| format!("line {i}")).collect();
        let pages = paginate(&lines);

        assert!(pages.len() >= 2);
        assert_eq!(pages.iter().map(Vec::len).sum::<usize>(), 100);
        for page in &pages {
            for line in page {
                assert!(line.y >= MARGIN_PT - LINE_HEIGHT_PT);
            }
        }
        assert_eq!(pages[1][0].y, PAGE_HEIGHT_PT - MARGIN_PT);
    }

    #[test]
    fn test_render_produces_pdf() {
        let document = ResumeDocument {
            name: "Ada Lovelace",
            specialty: "Engineer",
            photo_path: None,
            body: &"Analytical engines and more. ".repeat(200),
        };
        let bytes = render_resume_pdf(&document, None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_skips_broken_photo() {
        let document = ResumeDocument {
            name: "Ada",
            specialty: "Engineer",
            photo_path: Some(Path::new("/nonexistent/photo.jpg")),
            body: "Short body.",
        };
        assert!(render_resume_pdf(&document, None).is_ok());
    }

    /// Byte length of every string shown with `Tj`, and the fonts selected with `Tf`
    fn shown_text(pdf: &[u8]) -> (Vec<usize>, Vec<Vec<u8>>) {
        let parsed = lopdf::Document::load_mem(pdf).unwrap();
        let page = *parsed.get_pages().values().next().unwrap();
        let content = parsed.get_page_content(page).unwrap();
        let operations = lopdf::content::Content::decode(&content).unwrap().operations;

        let mut shown = Vec::new();
        let mut fonts = Vec::new();
        for op in operations {
            match op.operator.as_str() {
                "Tj" => {
                    if let Some(lopdf::Object::String(bytes, _)) = op.operands.first() {
                        shown.push(bytes.len());
                    }
                }
                "Tf" => fonts.push(op.operands[0].as_name().unwrap().to_vec()),
                _ => {}
            }
        }
        (shown, fonts)
    }

    #[test]
    fn test_cyrillic_text_keeps_every_glyph() {
        let document = ResumeDocument {
            name: "Олена",
            specialty: "Розробник",
            photo_path: None,
            body: "Досвідчений інженер",
        };
        let bytes = render_resume_pdf(&document, None).unwrap();
        let (shown, fonts) = shown_text(&bytes);

        assert!(!fonts.is_empty());
        assert!(fonts.iter().all(|name| name.as_slice() != b"Helvetica"));
        // Two bytes per glyph id; a dropped character would shorten the string
        assert_eq!(
            shown,
            [2 * document.title().chars().count(), 2 * document.body.chars().count()]
        );
    }

    #[test]
    fn test_unreadable_font_path_uses_bundled_font() {
        let document = ResumeDocument {
            name: "Олена",
            specialty: "Розробник",
            photo_path: None,
            body: "Текст",
        };
        let bytes = render_resume_pdf(&document, Some(Path::new("/nonexistent/font.ttf"))).unwrap();
        let (shown, fonts) = shown_text(&bytes);

        assert!(fonts.iter().all(|name| name.as_slice() != b"Helvetica"));
        assert_eq!(shown[1], 2 * "Текст".chars().count());
    }
}
