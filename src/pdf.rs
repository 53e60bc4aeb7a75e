use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{ColorType, ImageFormat};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str};

use crate::error::Error;
use crate::fonts::{FontSet, to_winansi_bytes};
use crate::model::{Document, Element, EmbeddedImage, Paragraph, TocSettings};
use crate::style::{Alignment, NumberFormat, PageNumbering, PageSetup};

const TOC_INDENT: f32 = 18.0;
const TOC_LABEL_WIDTH: f32 = 36.0;

pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub page_labels: Vec<String>,
}

/// The PDF under construction with its object id allocator and fonts.
struct Writer {
    pdf: Pdf,
    next_id: i32,
    fonts: FontSet,
}

impl Writer {
    fn new() -> Self {
        Self { pdf: Pdf::new(), next_id: 1, fonts: FontSet::new() }
    }

    fn alloc(&mut self) -> Ref {
        let r = Ref::new(self.next_id);
        self.next_id += 1;
        r
    }

    fn font(&mut self, family: &str, bold: bool, italic: bool) -> usize {
        let next_id = &mut self.next_id;
        let mut alloc = || {
            let r = Ref::new(*next_id);
            *next_id += 1;
            r
        };
        self.fonts.register(&mut self.pdf, &mut alloc, family, bold, italic)
    }
}

struct XObject {
    name: String,
    id: Ref,
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// JPEGs pass through as DCT data; everything else is flattened onto white
/// and stored as deflated RGB.
fn write_image(writer: &mut Writer, id: Ref, image: &EmbeddedImage) -> Result<(), Error> {
    let width = image.pixels.width() as i32;
    let height = image.pixels.height() as i32;
    let color = image.pixels.color();

    if image.format == ImageFormat::Jpeg && matches!(color, ColorType::Rgb8 | ColorType::L8) {
        let mut xobj = writer.pdf.image_xobject(id, &image.data);
        xobj.filter(Filter::DctDecode);
        xobj.width(width);
        xobj.height(height);
        if color == ColorType::L8 {
            xobj.color_space().device_gray();
        } else {
            xobj.color_space().device_rgb();
        }
        xobj.bits_per_component(8);
        return Ok(());
    }

    let rgba = image.pixels.to_rgba8();
    let rgb: Vec<u8> = rgba
        .pixels()
        .flat_map(|p| {
            let alpha = p[3] as u16;
            (0..3).map(move |c| ((p[c] as u16 * alpha + 255 * (255 - alpha)) / 255) as u8)
        })
        .collect();
    let compressed = deflate(&rgb)?;
    let mut xobj = writer.pdf.image_xobject(id, &compressed);
    xobj.filter(Filter::FlateDecode);
    xobj.width(width);
    xobj.height(height);
    xobj.color_space().device_rgb();
    xobj.bits_per_component(8);
    Ok(())
}

enum DrawOp {
    Text { x: f32, y: f32, font: usize, size: f32, color: Option<[u8; 3]>, text: String },
    Image { x: f32, y: f32, width: f32, height: f32, image: usize },
    Fill { x: f32, y: f32, width: f32, height: f32, color: [u8; 3] },
}

struct LaidOutPage {
    label: String,
    footer: Option<Alignment>,
    ops: Vec<DrawOp>,
}

#[derive(Clone)]
struct TocEntry {
    level: u8,
    text: String,
    label: String,
}

#[derive(Clone)]
struct Word {
    text: String,
    font: usize,
    size: f32,
    color: Option<[u8; 3]>,
    width: f32,
    space_before: bool,
}

enum Token {
    Word(Word),
    Break,
}

struct Line {
    words: Vec<Word>,
    width: f32,
    ends_paragraph: bool,
    hard_break: bool,
    size: f32,
    font: usize,
}

struct Layouter<'a> {
    page: &'a PageSetup,
    pages: Vec<LaidOutPage>,
    cursor_y: f32,
    at_page_top: bool,
    next_number: u32,
    numbering: PageNumbering,
    toc: Vec<TocEntry>,
    headings: Vec<TocEntry>,
    /// First page index and first page number of each section.
    section_starts: Vec<(usize, u32)>,
    next_image: usize,
}

impl<'a> Layouter<'a> {
    fn new(page: &'a PageSetup, toc: Vec<TocEntry>) -> Self {
        Self {
            page,
            pages: Vec::new(),
            cursor_y: page.height - page.margin_top,
            at_page_top: true,
            next_number: 1,
            numbering: PageNumbering::default(),
            toc,
            headings: Vec::new(),
            section_starts: Vec::new(),
            next_image: 0,
        }
    }

    fn begin_section(&mut self, numbering: &PageNumbering) {
        if let Some(start) = numbering.start {
            self.next_number = start;
        }
        self.numbering = numbering.clone();
        self.section_starts.push((self.pages.len(), self.next_number));
        self.new_page();
    }

    fn new_page(&mut self) {
        self.pages.push(LaidOutPage {
            label: self.numbering.format.format(self.next_number),
            footer: self.numbering.footer,
            ops: Vec::new(),
        });
        self.next_number = self.next_number.saturating_add(1);
        self.cursor_y = self.page.height - self.page.margin_top;
        self.at_page_top = true;
    }

    fn current_label(&self) -> String {
        self.pages.last().map(|p| p.label.clone()).unwrap_or_default()
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    /// Starts a new page unless `height` still fits above the bottom margin.
    fn reserve(&mut self, height: f32) {
        if !self.at_page_top && self.cursor_y - height < self.page.margin_bottom {
            self.new_page();
        }
    }

    fn add_space(&mut self, space: f32) {
        if !self.at_page_top {
            self.cursor_y -= space;
        }
    }

    fn layout_paragraph(&mut self, writer: &mut Writer, para: &Paragraph) {
        self.add_space(para.space_before);

        if let Some(image) = &para.image {
            self.reserve(image.display_height);
            let x = self.aligned_x(para.alignment, para.indent_left, image.display_width);
            let y = self.cursor_y - image.display_height;
            let index = self.next_image;
            self.next_image += 1;
            self.push(DrawOp::Image {
                x,
                y,
                width: image.display_width,
                height: image.display_height,
                image: index,
            });
            self.cursor_y = y;
            self.at_page_top = false;
        }

        if !para.runs.is_empty() {
            let tokens = tokenize(writer, para);
            let first_offset = if para.list_label.is_some() { 0.0 } else { para.indent_first_line };
            let avail = self.page.text_width() - para.indent_left;
            let lines = break_lines(writer, &tokens, avail - first_offset, avail);

            for (i, line) in lines.iter().enumerate() {
                let font = writer.fonts.get(line.font);
                let height = font.line_height(line.size) * para.line_spacing;
                let ascent = font.ascent(line.size);
                self.reserve(height);
                if i == 0
                    && let Some(level) = para.outline_level
                {
                    self.headings.push(TocEntry { level, text: para.text(), label: self.current_label() });
                }

                let left = self.page.margin_left + para.indent_left;
                if let Some(fill) = para.shading {
                    self.push(DrawOp::Fill {
                        x: left,
                        y: self.cursor_y - height,
                        width: self.page.text_width() - para.indent_left,
                        height,
                        color: fill,
                    });
                }

                let baseline = self.cursor_y - ascent;
                let offset = if i == 0 { first_offset } else { 0.0 };
                if i == 0
                    && let (Some(label), Some(word)) = (&para.list_label, line.words.first())
                {
                    self.push(DrawOp::Text {
                        x: left + para.indent_first_line,
                        y: baseline,
                        font: word.font,
                        size: word.size,
                        color: word.color,
                        text: label.clone(),
                    });
                }
                self.place_line(writer, line, para.alignment, left + offset, avail - offset, baseline);

                self.cursor_y -= height;
                self.at_page_top = false;
            }
        }

        self.cursor_y -= para.space_after;
    }

    fn aligned_x(&self, alignment: Alignment, indent_left: f32, width: f32) -> f32 {
        let left = self.page.margin_left + indent_left;
        let avail = self.page.text_width() - indent_left;
        match alignment {
            Alignment::Left | Alignment::Justify => left,
            Alignment::Center => left + (avail - width).max(0.0) / 2.0,
            Alignment::Right => left + (avail - width).max(0.0),
        }
    }

    fn place_line(
        &mut self,
        writer: &Writer,
        line: &Line,
        alignment: Alignment,
        left: f32,
        avail: f32,
        baseline: f32,
    ) {
        let slack = (avail - line.width).max(0.0);
        let gaps = line.words.iter().skip(1).filter(|w| w.space_before).count();
        let justify = alignment == Alignment::Justify && !line.ends_paragraph && !line.hard_break && gaps > 0;
        let (mut x, extra_gap) = match alignment {
            Alignment::Center => (left + slack / 2.0, 0.0),
            Alignment::Right => (left + slack, 0.0),
            Alignment::Justify if justify => (left, slack / gaps as f32),
            _ => (left, 0.0),
        };

        // consecutive words in the same font become one text op unless justified
        let mut pending: Option<(f32, Word)> = None;
        for (i, word) in line.words.iter().enumerate() {
            let space = if i > 0 && word.space_before {
                writer.fonts.get(word.font).text_width(" ", word.size) + extra_gap
            } else {
                0.0
            };
            x += space;

            let mergeable = !justify
                && pending.as_ref().is_some_and(|(_, p)| {
                    p.font == word.font && p.size == word.size && p.color == word.color
                });
            if mergeable {
                if let Some((_, p)) = pending.as_mut() {
                    if word.space_before {
                        p.text.push(' ');
                    }
                    p.text.push_str(&word.text);
                }
            } else {
                if let Some((px, p)) = pending.take() {
                    self.push_word(px, baseline, p);
                }
                pending = Some((x, word.clone()));
            }
            x += word.width;
        }
        if let Some((px, p)) = pending {
            self.push_word(px, baseline, p);
        }
    }

    fn push_word(&mut self, x: f32, y: f32, word: Word) {
        self.push(DrawOp::Text {
            x,
            y,
            font: word.font,
            size: word.size,
            color: word.color,
            text: word.text,
        });
    }

    fn layout_toc(&mut self, writer: &mut Writer, toc: &TocSettings) {
        let font = writer.font(&toc.font_name, false, false);
        let entries: Vec<TocEntry> = self
            .toc
            .iter()
            .filter(|e| e.level <= toc.max_level)
            .cloned()
            .collect();

        for entry in entries {
            let entry_font = writer.fonts.get(font);
            let height = entry_font.line_height(toc.font_size) * toc.line_spacing;
            let ascent = entry_font.ascent(toc.font_size);
            let indent = TOC_INDENT * entry.level.saturating_sub(1) as f32;
            let text_room = self.page.text_width() - indent - TOC_LABEL_WIDTH;
            let text = fit_text(&entry.text, text_room, |t| entry_font.text_width(t, toc.font_size));
            let text_width = entry_font.text_width(&text, toc.font_size);
            let label_width = entry_font.text_width(&entry.label, toc.font_size);
            let dot_width = entry_font.text_width(".", toc.font_size).max(0.1);

            let left = self.page.margin_left + indent;
            let right = self.page.margin_left + self.page.text_width();
            let gap = right - label_width - (left + text_width) - dot_width;
            let dots = if entry.label.is_empty() || gap <= 0.0 {
                String::new()
            } else {
                ".".repeat((gap / dot_width) as usize)
            };
            let dots_width = entry_font.text_width(&dots, toc.font_size);

            self.reserve(height);
            let baseline = self.cursor_y - ascent;
            self.push(DrawOp::Text { x: left, y: baseline, font, size: toc.font_size, color: None, text });
            if !dots.is_empty() {
                self.push(DrawOp::Text {
                    x: right - label_width - dots_width - dot_width / 2.0,
                    y: baseline,
                    font,
                    size: toc.font_size,
                    color: None,
                    text: dots,
                });
            }
            self.push(DrawOp::Text {
                x: right - label_width,
                y: baseline,
                font,
                size: toc.font_size,
                color: None,
                text: entry.label,
            });
            self.cursor_y -= height + toc.space_after;
            self.at_page_top = false;
        }
    }
}

fn fit_text(text: &str, room: f32, measure: impl Fn(&str) -> f32) -> String {
    if measure(text) <= room {
        return text.to_string();
    }
    let mut fitted: String = String::new();
    for c in text.chars() {
        fitted.push(c);
        if measure(&format!("{fitted}\u{2026}")) > room {
            fitted.pop();
            break;
        }
    }
    format!("{}\u{2026}", fitted.trim_end())
}

fn tokenize(writer: &mut Writer, para: &Paragraph) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pending_space = false;
    for run in &para.runs {
        let font = writer.font(&run.font_name, run.bold, run.italic);
        for (li, line) in run.text.split('\n').enumerate() {
            if li > 0 {
                tokens.push(Token::Break);
                pending_space = false;
            }
            let mut rest = line;
            loop {
                let trimmed = rest.trim_start_matches(' ');
                if trimmed.len() != rest.len() {
                    pending_space = true;
                }
                if trimmed.is_empty() {
                    break;
                }
                let end = trimmed.find(' ').unwrap_or(trimmed.len());
                let text = &trimmed[..end];
                tokens.push(Token::Word(Word {
                    text: text.to_string(),
                    font,
                    size: run.font_size,
                    color: run.color,
                    width: writer.fonts.get(font).text_width(text, run.font_size),
                    space_before: pending_space,
                }));
                pending_space = false;
                rest = &trimmed[end..];
            }
        }
    }
    tokens
}

/// Greedy line breaking. The first line gets `first_avail`, the rest `avail`.
fn break_lines(writer: &Writer, tokens: &[Token], first_avail: f32, avail: f32) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    let (default_font, default_size) = tokens
        .iter()
        .find_map(|t| match t {
            Token::Word(w) => Some((w.font, w.size)),
            Token::Break => None,
        })
        .unwrap_or((0, 12.0));
    let empty_line = |font, size| Line {
        words: Vec::new(),
        width: 0.0,
        ends_paragraph: false,
        hard_break: false,
        size,
        font,
    };
    let mut current = empty_line(default_font, default_size);

    for token in tokens {
        match token {
            Token::Break => {
                let (font, size) = (current.font, current.size);
                current.hard_break = true;
                lines.push(std::mem::replace(&mut current, empty_line(font, size)));
            }
            Token::Word(word) => {
                let room = if lines.is_empty() { first_avail } else { avail };
                let space = if word.space_before && !current.words.is_empty() {
                    writer.fonts.get(word.font).text_width(" ", word.size)
                } else {
                    0.0
                };
                if !current.words.is_empty() && current.width + space + word.width > room {
                    let (font, size) = (current.font, current.size);
                    lines.push(std::mem::replace(&mut current, empty_line(font, size)));
                }
                let mut word = word.clone();
                if current.words.is_empty() {
                    word.space_before = false;
                    current.width = word.width;
                    current.size = word.size;
                    current.font = word.font;
                } else {
                    current.width += space + word.width;
                    if word.size > current.size {
                        current.size = word.size;
                        current.font = word.font;
                    }
                }
                current.words.push(word);
            }
        }
    }
    current.ends_paragraph = true;
    lines.push(current);
    lines
}

fn collect_headings(doc: &Document) -> Vec<TocEntry> {
    doc.sections
        .iter()
        .flat_map(|s| s.elements.iter())
        .filter_map(|element| match element {
            Element::Paragraph(para) => para.outline_level.map(|level| TocEntry {
                level,
                text: para.text(),
                label: String::new(),
            }),
            _ => None,
        })
        .collect()
}

struct Layout {
    pages: Vec<LaidOutPage>,
    headings: Vec<TocEntry>,
    section_starts: Vec<(usize, u32)>,
}

fn layout(writer: &mut Writer, doc: &Document, toc: Vec<TocEntry>) -> Layout {
    let mut layouter = Layouter::new(&doc.page, toc);
    for section in &doc.sections {
        layouter.begin_section(&section.numbering);
        for element in &section.elements {
            match element {
                Element::Paragraph(para) => layouter.layout_paragraph(writer, para),
                Element::PageBreak => layouter.new_page(),
                Element::TableOfContents(toc) => layouter.layout_toc(writer, toc),
            }
        }
    }
    Layout {
        pages: layouter.pages,
        headings: layouter.headings,
        section_starts: layouter.section_starts,
    }
}

fn label_style(format: NumberFormat) -> &'static [u8] {
    match format {
        NumberFormat::Decimal => b"D",
        NumberFormat::LowerRoman => b"r",
        NumberFormat::UpperRoman => b"R",
        NumberFormat::LowerLetter => b"a",
        NumberFormat::UpperLetter => b"A",
    }
}

fn set_fill(content: &mut Content, color: Option<[u8; 3]>) {
    let [r, g, b] = color.unwrap_or([0, 0, 0]);
    content.set_fill_rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
}

fn draw_text(content: &mut Content, writer: &Writer, x: f32, y: f32, font: usize, size: f32, text: &str) {
    let entry = writer.fonts.get(font);
    content
        .begin_text()
        .set_font(Name(entry.pdf_name.as_bytes()), size)
        .next_line(x, y)
        .show(Str(&to_winansi_bytes(text)))
        .end_text();
}

pub fn render(doc: &Document) -> Result<RenderedPdf, Error> {
    let mut writer = Writer::new();
    let catalog_id = writer.alloc();
    let pages_id = writer.alloc();

    let mut images = Vec::new();
    for element in doc.sections.iter().flat_map(|s| s.elements.iter()) {
        if let Element::Paragraph(Paragraph { image: Some(image), .. }) = element {
            let id = writer.alloc();
            write_image(&mut writer, id, image)?;
            images.push(XObject { name: format!("Im{}", images.len() + 1), id });
        }
    }

    let body = doc.styles.body();
    let footer_font = writer.font(&body.font_family, false, false);
    let footer_size = body.font_size.min(11.0);

    let has_toc = doc
        .sections
        .iter()
        .flat_map(|s| s.elements.iter())
        .any(|e| matches!(e, Element::TableOfContents(_)));
    let mut laid_out = layout(&mut writer, doc, collect_headings(doc));
    if has_toc {
        // entry labels do not change line breaks, so one more pass settles them
        let headings = std::mem::take(&mut laid_out.headings);
        laid_out = layout(&mut writer, doc, headings);
    }
    let Layout { pages, section_starts, .. } = laid_out;
    if pages.is_empty() {
        return Err(Error::Pdf("document has no sections".into()));
    }

    let mut page_ids = Vec::with_capacity(pages.len());
    for page in &pages {
        let page_id = writer.alloc();
        let content_id = writer.alloc();
        let mut content = Content::new();

        for op in &page.ops {
            match op {
                DrawOp::Fill { x, y, width, height, color } => {
                    set_fill(&mut content, Some(*color));
                    content.rect(*x, *y, *width, *height);
                    content.fill_nonzero();
                }
                DrawOp::Text { x, y, font, size, color, text } => {
                    set_fill(&mut content, *color);
                    draw_text(&mut content, &writer, *x, *y, *font, *size, text);
                }
                DrawOp::Image { x, y, width, height, image } => {
                    let Some(xobj) = images.get(*image) else {
                        continue;
                    };
                    content.save_state();
                    content.transform([*width, 0.0, 0.0, *height, *x, *y]);
                    content.x_object(Name(xobj.name.as_bytes()));
                    content.restore_state();
                }
            }
        }

        if let Some(alignment) = page.footer {
            let width = writer.fonts.get(footer_font).text_width(&page.label, footer_size);
            let left = doc.page.margin_left;
            let x = match alignment {
                Alignment::Left | Alignment::Justify => left,
                Alignment::Center => left + (doc.page.text_width() - width) / 2.0,
                Alignment::Right => left + doc.page.text_width() - width,
            };
            set_fill(&mut content, None);
            draw_text(&mut content, &writer, x, doc.page.margin_bottom / 2.0, footer_font, footer_size, &page.label);
        }

        writer.pdf.stream(content_id, &content.finish());

        let mut pdf_page = writer.pdf.page(page_id);
        pdf_page
            .media_box(Rect::new(0.0, 0.0, doc.page.width, doc.page.height))
            .parent(pages_id)
            .contents(content_id);
        let mut resources = pdf_page.resources();
        let mut fonts = resources.fonts();
        for font in writer.fonts.entries() {
            fonts.pair(Name(font.pdf_name.as_bytes()), font.font_ref);
        }
        fonts.finish();
        if !images.is_empty() {
            let mut xobjects = resources.x_objects();
            for xobj in &images {
                xobjects.pair(Name(xobj.name.as_bytes()), xobj.id);
            }
            xobjects.finish();
        }
        resources.finish();
        pdf_page.finish();
        page_ids.push(page_id);
    }

    writer.pdf.pages(pages_id).kids(page_ids.iter().copied()).count(page_ids.len() as i32);

    {
        let mut catalog = writer.pdf.catalog(catalog_id);
        catalog.pages(pages_id);
        let mut labels = catalog.insert(Name(b"PageLabels")).dict();
        let mut nums = labels.insert(Name(b"Nums")).array();
        for (section, (page_index, start)) in doc.sections.iter().zip(&section_starts) {
            nums.item(*page_index as i32);
            let mut label = nums.push().dict();
            label.pair(Name(b"S"), Name(label_style(section.numbering.format)));
            label.pair(Name(b"St"), i32::try_from(*start).unwrap_or(i32::MAX));
        }
    }

    log::debug!("PDF: {} pages, {} fonts, {} images", pages.len(), writer.fonts.entries().len(), images.len());
    let page_labels = pages.into_iter().map(|p| p.label).collect();
    Ok(RenderedPdf { bytes: writer.pdf.finish(), page_labels })
}
