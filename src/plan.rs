use std::path::Path;

use crate::assembler::OutputFormat;
use crate::block::{AssetReference, ContentBlock, Presence, Span};
use crate::error::Error;
use crate::style::{
    Alignment, BODY_ROLE, MAX_PAGE_START, NumberFormat, PageNumbering, PageSetup, POINTS_PER_INCH,
    StyleProfile, StyleSet,
};

pub const DEFAULT_IMAGE_WIDTH: f32 = 5.5 * POINTS_PER_INCH;

#[derive(Clone, Debug, PartialEq)]
pub struct SectionPlan {
    pub numbering: PageNumbering,
    pub blocks: Vec<ContentBlock>,
}

/// Everything needed to build one document: styles, page geometry and the
/// ordered blocks of each section.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentPlan {
    pub page: PageSetup,
    pub styles: StyleSet,
    pub image_width: f32,
    pub format: Option<OutputFormat>,
    pub sections: Vec<SectionPlan>,
}

impl ContentPlan {
    pub fn new(styles: StyleSet) -> Self {
        Self {
            page: PageSetup::default(),
            styles,
            image_width: DEFAULT_IMAGE_WIDTH,
            format: None,
            sections: Vec::new(),
        }
    }

    pub fn page(mut self, page: PageSetup) -> Self {
        self.page = page;
        self
    }

    pub fn section(mut self, numbering: PageNumbering, blocks: Vec<ContentBlock>) -> Self {
        self.sections.push(SectionPlan { numbering, blocks });
        self
    }

    pub fn blocks(&self) -> impl Iterator<Item = &ContentBlock> {
        self.sections.iter().flat_map(|s| s.blocks.iter())
    }

    /// (block index, role) for every block that needs a style, in document order.
    pub fn referenced_roles(&self) -> Vec<(usize, String)> {
        self.blocks()
            .enumerate()
            .filter_map(|(index, block)| block.role().map(|role| (index, role)))
            .collect()
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let xml = std::fs::read_to_string(path)?;
        Self::parse(&xml)
    }

    pub fn parse(xml: &str) -> Result<Self, Error> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != "plan" {
            return Err(invalid(format!("expected <plan>, found <{}>", root.tag_name().name())));
        }

        let format = root.attribute("format").map(parse_format).transpose()?;
        let page = child(root, "page").map(parse_page).transpose()?.unwrap_or_default();

        let mut body = StyleProfile::new("Helvetica", 11.0);
        let defaults = child(root, "defaults");
        if let Some(defaults) = defaults {
            apply_style_attrs(defaults, &mut body)?;
        }
        let image_width = defaults
            .and_then(|n| n.attribute("image-width"))
            .map(parse_size)
            .transpose()?
            .unwrap_or(DEFAULT_IMAGE_WIDTH);

        let styles = parse_styles(child(root, "styles"), body)?;

        let mut sections = Vec::new();
        for node in root.children().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "page" | "defaults" | "styles" => {}
                "section" => sections.push(parse_section(node)?),
                other => return Err(invalid(format!("unknown element <{other}> in <plan>"))),
            }
        }
        if sections.is_empty() {
            return Err(invalid("a plan needs at least one <section>".to_string()));
        }

        Ok(ContentPlan { page, styles, image_width, format, sections })
    }
}

fn invalid(reason: String) -> Error {
    Error::InvalidPlan(reason)
}

fn child<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|n| n.is_element() && n.tag_name().name() == name)
}

fn parse_format(val: &str) -> Result<OutputFormat, Error> {
    match val {
        "docx" => Ok(OutputFormat::Docx),
        "pdf" => Ok(OutputFormat::Pdf),
        other => Err(invalid(format!("unknown format '{other}'"))),
    }
}

/// Parses a length in points. Accepts `pt`, `in`, `cm` and `mm` suffixes;
/// a bare number is points. The result is always finite but may be negative.
pub fn parse_length(val: &str) -> Result<f32, Error> {
    let val = val.trim();
    let (number, scale) = if let Some(n) = val.strip_suffix("pt") {
        (n, 1.0)
    } else if let Some(n) = val.strip_suffix("in") {
        (n, POINTS_PER_INCH)
    } else if let Some(n) = val.strip_suffix("cm") {
        (n, POINTS_PER_INCH / 2.54)
    } else if let Some(n) = val.strip_suffix("mm") {
        (n, POINTS_PER_INCH / 25.4)
    } else {
        (val, 1.0)
    };
    match number.trim().parse::<f32>() {
        Ok(n) if (n * scale).is_finite() => Ok(n * scale),
        _ => Err(invalid(format!("invalid length '{val}'"))),
    }
}

/// A length that measures something: page sizes, margins, spacing, widths.
fn parse_size(val: &str) -> Result<f32, Error> {
    let size = parse_length(val)?;
    if size < 0.0 {
        return Err(invalid(format!("length '{}' must not be negative", val.trim())));
    }
    Ok(size)
}

fn parse_number(val: &str) -> Result<f32, Error> {
    match val.trim().parse::<f32>() {
        Ok(n) if n.is_finite() && n > 0.0 => Ok(n),
        _ => Err(invalid(format!("invalid number '{val}', expected a positive value"))),
    }
}

fn parse_bool(val: &str) -> Result<bool, Error> {
    match val {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(invalid(format!("invalid boolean '{other}'"))),
    }
}

fn parse_hex_color(val: &str) -> Result<[u8; 3], Error> {
    let hex = val.strip_prefix('#').unwrap_or(val);
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range).and_then(|h| u8::from_str_radix(h, 16).ok())
    };
    match (hex.len(), channel(0..2), channel(2..4), channel(4..6)) {
        (6, Some(r), Some(g), Some(b)) => Ok([r, g, b]),
        _ => Err(invalid(format!("invalid colour '{val}'"))),
    }
}

fn parse_alignment(val: &str) -> Result<Alignment, Error> {
    match val {
        "left" | "start" => Ok(Alignment::Left),
        "center" => Ok(Alignment::Center),
        "right" | "end" => Ok(Alignment::Right),
        "justify" | "both" => Ok(Alignment::Justify),
        other => Err(invalid(format!("unknown alignment '{other}'"))),
    }
}

fn parse_page(node: roxmltree::Node) -> Result<PageSetup, Error> {
    let mut page = match node.attribute("size") {
        None | Some("letter") => PageSetup::letter(),
        Some("a4") => PageSetup::a4(),
        Some(other) => return Err(invalid(format!("unknown page size '{other}'"))),
    };
    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "size" => {}
            "width" => page.width = parse_size(value)?,
            "height" => page.height = parse_size(value)?,
            "margin-top" => page.margin_top = parse_size(value)?,
            "margin-bottom" => page.margin_bottom = parse_size(value)?,
            "margin-left" => page.margin_left = parse_size(value)?,
            "margin-right" => page.margin_right = parse_size(value)?,
            other => return Err(invalid(format!("unknown <page> attribute '{other}'"))),
        }
    }
    Ok(page)
}

fn apply_style_attrs(node: roxmltree::Node, profile: &mut StyleProfile) -> Result<(), Error> {
    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "role" | "based-on" | "preset" | "image-width" => {}
            "font" => profile.font_family = value.to_string(),
            "size" => profile.font_size = parse_number(value)?,
            "bold" => profile.bold = parse_bool(value)?,
            "italic" => profile.italic = parse_bool(value)?,
            "color" => profile.color = Some(parse_hex_color(value)?),
            "align" => profile.alignment = parse_alignment(value)?,
            "space-before" => profile.space_before = parse_size(value)?,
            "space-after" => profile.space_after = parse_size(value)?,
            "line-spacing" => profile.line_spacing = parse_number(value)?,
            "indent-left" => profile.indent_left = parse_length(value)?,
            "indent-first-line" => profile.indent_first_line = parse_length(value)?,
            "shading" => profile.shading = Some(parse_hex_color(value)?),
            "keep-with-next" => profile.keep_with_next = parse_bool(value)?,
            other => {
                return Err(invalid(format!(
                    "unknown attribute '{other}' on <{}>",
                    node.tag_name().name()
                )));
            }
        }
    }
    Ok(())
}

fn parse_styles(node: Option<roxmltree::Node>, body: StyleProfile) -> Result<StyleSet, Error> {
    let Some(node) = node else {
        return Ok(StyleSet::new(body));
    };
    let mut styles = match node.attribute("preset") {
        None => StyleSet::new(body),
        Some("academic") => StyleSet::academic_from(body),
        Some(other) => return Err(invalid(format!("unknown style preset '{other}'"))),
    };

    for style in node.children().filter(|n| n.is_element()) {
        if style.tag_name().name() != "style" {
            return Err(invalid(format!("unknown element <{}> in <styles>", style.tag_name().name())));
        }
        let role = style
            .attribute("role")
            .ok_or_else(|| invalid("<style> needs a role".to_string()))?;

        let mut profile = match style.attribute("based-on") {
            Some(base) => styles
                .get(base)
                .cloned()
                .ok_or_else(|| Error::UnknownStyleRole { role: base.to_string(), block: None })?,
            None => styles
                .get(role)
                .cloned()
                .unwrap_or_else(|| styles.body().derive()),
        };
        apply_style_attrs(style, &mut profile)?;
        styles.insert(role, profile);
    }
    Ok(styles)
}

fn parse_section(node: roxmltree::Node) -> Result<SectionPlan, Error> {
    let mut numbering = PageNumbering::default();
    match node.attribute("numbering") {
        None | Some("decimal") => {}
        Some("lower-roman") => numbering.format = NumberFormat::LowerRoman,
        Some("upper-roman") => numbering.format = NumberFormat::UpperRoman,
        Some("lower-letter") => numbering.format = NumberFormat::LowerLetter,
        Some("upper-letter") => numbering.format = NumberFormat::UpperLetter,
        Some("none") => numbering.footer = None,
        Some(other) => return Err(invalid(format!("unknown numbering '{other}'"))),
    }
    if let Some(start) = node.attribute("start") {
        let start = start
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid(format!("invalid section start '{start}'")))?;
        if start > MAX_PAGE_START {
            return Err(invalid(format!("section start {start} is above {MAX_PAGE_START}")));
        }
        numbering.start = Some(start);
    }
    match node.attribute("footer") {
        None => {}
        Some("none") => numbering.footer = None,
        Some(align) => {
            if numbering.footer.is_some() {
                numbering.footer = Some(parse_alignment(align)?);
            }
        }
    }

    let mut blocks = Vec::new();
    for el in node.children().filter(|n| n.is_element()) {
        blocks.push(parse_block(el)?);
    }
    Ok(SectionPlan { numbering, blocks })
}

fn parse_block(node: roxmltree::Node) -> Result<ContentBlock, Error> {
    let block = match node.tag_name().name() {
        "heading" => {
            let level = match node.attribute("level") {
                Some(level) => level
                    .parse::<u8>()
                    .ok()
                    .filter(|l| *l <= 9)
                    .ok_or_else(|| invalid(format!("invalid heading level '{level}'")))?,
                None => 1,
            };
            ContentBlock::Heading { level, text: plain_text(node) }
        }
        "paragraph" => {
            let style = node.attribute("style").unwrap_or(BODY_ROLE).to_string();
            let mut raw = Vec::new();
            collect_spans(node, false, false, &mut raw)?;
            ContentBlock::Paragraph { spans: normalize_spans(raw), style }
        }
        "list-item" => ContentBlock::ListItem { text: plain_text(node) },
        "image" => {
            let src = node
                .attribute("src")
                .ok_or_else(|| invalid("<image> needs a src".to_string()))?;
            let presence = match node.attribute("optional").map(parse_bool).transpose()? {
                Some(true) => Presence::Optional,
                _ => Presence::Required,
            };
            ContentBlock::Image {
                asset: AssetReference { path: src.into(), presence },
                caption: node.attribute("caption").unwrap_or_default().to_string(),
                width_hint: node.attribute("width").map(parse_size).transpose()?,
            }
        }
        "page-break" => ContentBlock::PageBreak,
        "toc" => ContentBlock::TableOfContents,
        other => return Err(invalid(format!("unknown block <{other}>"))),
    };
    Ok(block)
}

fn plain_text(node: roxmltree::Node) -> String {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    collapse_whitespace(&text).trim().to_string()
}

fn collect_spans(
    node: roxmltree::Node,
    bold: bool,
    italic: bool,
    out: &mut Vec<Span>,
) -> Result<(), Error> {
    for n in node.children() {
        if let Some(text) = n.text().filter(|_| n.is_text()) {
            out.push(Span { text: text.to_string(), bold, italic });
            continue;
        }
        if !n.is_element() {
            continue;
        }
        match n.tag_name().name() {
            "b" | "strong" => collect_spans(n, true, italic, out)?,
            "i" | "em" => collect_spans(n, bold, true, out)?,
            "br" => out.push(Span { text: "\n".to_string(), bold, italic }),
            other => return Err(invalid(format!("unknown inline element <{other}>"))),
        }
    }
    Ok(())
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    if pending_space {
        out.push(' ');
    }
    out
}

fn trim_end_in_place(text: &mut String) {
    let len = text.trim_end().len();
    text.truncate(len);
}

fn normalize_spans(raw: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::new();
    let mut at_line_start = true;
    for span in raw {
        if span.text == "\n" {
            if let Some(last) = out.last_mut().filter(|s| s.text != "\n") {
                trim_end_in_place(&mut last.text);
            }
            out.push(span);
            at_line_start = true;
            continue;
        }
        let mut text = collapse_whitespace(&span.text);
        if at_line_start || out.last().is_some_and(|s| s.text.ends_with(' ')) {
            text = text.trim_start().to_string();
        }
        if text.is_empty() {
            continue;
        }
        at_line_start = false;
        out.push(Span { text, ..span });
    }
    if let Some(last) = out.last_mut().filter(|s| s.text != "\n") {
        trim_end_in_place(&mut last.text);
    }
    out.retain(|s| !s.text.is_empty());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_accept_units() {
        assert_eq!(parse_length("12").ok(), Some(12.0));
        assert_eq!(parse_length("12pt").ok(), Some(12.0));
        assert_eq!(parse_length("1.5in").ok(), Some(108.0));
        assert!((parse_length("2.54cm").unwrap_or_default() - 72.0).abs() < 0.01);
        assert!((parse_length("25.4mm").unwrap_or_default() - 72.0).abs() < 0.01);
        assert!(parse_length("wide").is_err());
        assert_eq!(parse_length("-0.25in").ok(), Some(-18.0));
    }

    #[test]
    fn sizes_must_be_finite_and_not_negative() {
        assert_eq!(parse_size("0").ok(), Some(0.0));
        for bad in ["-1in", "NaN", "inf", "-inf", "1e39pt", "nanmm"] {
            assert!(parse_size(bad).is_err(), "{bad} should be rejected");
        }
        assert!(parse_number("0").is_err());
        assert!(parse_number("NaN").is_err());
        assert_eq!(parse_number("1.5").ok(), Some(1.5));
    }

    #[test]
    fn colours_need_six_hex_digits() {
        assert_eq!(parse_hex_color("#FF0000").ok(), Some([255, 0, 0]));
        assert_eq!(parse_hex_color("ebebeb").ok(), Some([235, 235, 235]));
        assert!(parse_hex_color("red").is_err());
        assert!(parse_hex_color("FFF").is_err());
    }

    #[test]
    fn spans_collapse_whitespace_across_boundaries() {
        let raw = vec![
            Span::plain("\n   "),
            Span::bold("Keywords: "),
            Span::plain("  Dhara,\n   Hiti  "),
        ];
        let spans = normalize_spans(raw);
        assert_eq!(spans, vec![Span::bold("Keywords: "), Span::plain("Dhara, Hiti")]);
    }

    #[test]
    fn line_breaks_survive_normalization() {
        let raw = vec![Span::plain("Proposal  "), Span::plain("\n"), Span::plain("  Submitted to")];
        let spans = normalize_spans(raw);
        let text: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(text, ["Proposal", "\n", "Submitted to"]);

        let blank_line = vec![Span::plain("a"), Span::plain("\n"), Span::plain("\n"), Span::plain("b")];
        assert_eq!(normalize_spans(blank_line).len(), 4);
    }
}
