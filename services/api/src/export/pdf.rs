//! services/api/src/export/pdf.rs
//!
//! Draws a `ReportLayout` onto A4 pages with the built-in Helvetica family.

use super::layout::{wrap_text, Block, ReportLayout};
use super::ExportError;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Rgb,
};
use std::io::BufWriter;
use tracing::debug;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const PT_TO_MM: f32 = 0.3528;
// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 13.0;
const BODY_SIZE: f32 = 10.5;
const FINE_SIZE: f32 = 8.5;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

#[derive(Clone, Copy)]
enum Face {
    Regular,
    Bold,
    Italic,
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn text_color() -> Color {
    rgb(0.12, 0.16, 0.22)
}

fn accent_color() -> Color {
    rgb(0.05, 0.39, 0.64)
}

fn warning_color() -> Color {
    rgb(0.73, 0.11, 0.11)
}

fn muted_color() -> Color {
    rgb(0.42, 0.45, 0.50)
}

/// Characters that fit on one line at `size` points across `width` millimetres.
fn chars_per_line(width: f32, size: f32) -> usize {
    (width / (size * PT_TO_MM * AVG_GLYPH_WIDTH)).floor().max(1.0) as usize
}

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * 1.45
}

struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    /// Distance from the top edge of the current page, in millimetres.
    cursor: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, ExportError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let fonts = Fonts {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
            bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?,
            italic: doc.add_builtin_font(BuiltinFont::HelveticaOblique).map_err(pdf_error)?,
        };
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            fonts,
            cursor: MARGIN,
            pages: 1,
        })
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor + height <= PAGE_HEIGHT - MARGIN {
            return;
        }
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = MARGIN;
        self.pages += 1;
    }

    fn gap(&mut self, height: f32) {
        self.cursor += height;
    }

    /// Writes wrapped text starting at `indent` millimetres from the left margin.
    fn write(&mut self, text: &str, size: f32, face: Face, color: Color, indent: f32) {
        let width = CONTENT_WIDTH - indent;
        let step = line_height(size);
        for line in wrap_text(text, chars_per_line(width, size)) {
            self.ensure_space(step);
            self.cursor += step;
            // A page break starts a fresh layer with default colours.
            self.layer.set_fill_color(color.clone());
            let font = match face {
                Face::Regular => &self.fonts.regular,
                Face::Bold => &self.fonts.bold,
                Face::Italic => &self.fonts.italic,
            };
            self.layer.use_text(
                line,
                size,
                Mm(MARGIN + indent),
                Mm(PAGE_HEIGHT - self.cursor),
                font,
            );
        }
    }

    fn write_block(&mut self, block: &Block) {
        match block {
            Block::Field { label, value } => {
                self.write(&format!("{}: {}", label, value), BODY_SIZE, Face::Regular, text_color(), 0.0)
            }
            Block::Paragraph(text) => self.write(text, BODY_SIZE, Face::Regular, text_color(), 0.0),
            Block::Bullet(text) => {
                self.write(&format!("- {}", text), BODY_SIZE, Face::Regular, text_color(), 4.0)
            }
            Block::Warning(text) => {
                self.write(&format!("! {}", text), BODY_SIZE, Face::Regular, warning_color(), 4.0)
            }
            Block::Notice(text) => self.write(text, BODY_SIZE, Face::Italic, warning_color(), 0.0),
            Block::Placeholder(text) => self.write(text, BODY_SIZE, Face::Italic, muted_color(), 0.0),
            Block::FinePrint(text) => self.write(text, FINE_SIZE, Face::Regular, muted_color(), 0.0),
            Block::Table { header, rows } => {
                self.write(&header.join("  |  "), BODY_SIZE, Face::Bold, accent_color(), 0.0);
                for row in rows {
                    self.write(&row.join("  |  "), BODY_SIZE, Face::Regular, text_color(), 0.0);
                }
            }
        }
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        let mut writer = BufWriter::new(Vec::new());
        self.doc.save(&mut writer).map_err(pdf_error)?;
        writer
            .into_inner()
            .map_err(|e| ExportError::Pdf(e.to_string()))
    }
}

fn pdf_error(e: printpdf::Error) -> ExportError {
    ExportError::Pdf(e.to_string())
}

/// Renders the layout to PDF bytes, breaking onto new pages as needed.
pub fn render_pdf(layout: &ReportLayout) -> Result<Vec<u8>, ExportError> {
    let mut writer = PageWriter::new(&layout.title)?;

    writer.write(&layout.title, TITLE_SIZE, Face::Bold, accent_color(), 0.0);
    writer.write(&layout.subtitle, BODY_SIZE, Face::Regular, muted_color(), 0.0);
    writer.gap(6.0);

    for section in &layout.sections {
        // Keep a heading on the same page as its first line.
        writer.ensure_space(line_height(HEADING_SIZE) + line_height(BODY_SIZE) + 3.0);
        writer.write(&section.heading, HEADING_SIZE, Face::Bold, accent_color(), 0.0);
        writer.gap(1.5);
        for block in &section.blocks {
            writer.write_block(block);
        }
        writer.gap(5.0);
    }

    debug!("Rendered '{}' onto {} page(s)", layout.title, writer.pages);
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::layout::LayoutSection;

    #[test]
    fn line_capacity_shrinks_with_font_size() {
        assert!(chars_per_line(CONTENT_WIDTH, FINE_SIZE) > chars_per_line(CONTENT_WIDTH, BODY_SIZE));
        assert!(chars_per_line(1.0, 72.0) >= 1);
    }

    #[test]
    fn long_layout_renders_to_a_pdf_document() {
        let layout = ReportLayout {
            title: "Medical Summary Report".to_string(),
            subtitle: "Generated: 01 Jan 2024".to_string(),
            sections: vec![LayoutSection {
                heading: "1. Notes".to_string(),
                blocks: (0..200)
                    .map(|i| Block::Bullet(format!("Observation number {}", i)))
                    .collect(),
            }],
        };

        let bytes = render_pdf(&layout).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
