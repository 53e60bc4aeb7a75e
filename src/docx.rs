use std::io::{Cursor, Write};

use image::ImageFormat;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use zip::write::SimpleFileOptions;

use crate::error::Error;
use crate::model::{Document, Element, EmbeddedImage, Paragraph, Run, Section, TocSettings};
use crate::style::{Alignment, BODY_ROLE, NumberFormat, PageNumbering, PageSetup, StyleProfile};

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const WPD_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CT_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WML_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml";

const BULLET_NUM_ID: u32 = 1;
const EMU_PER_POINT: f32 = 12700.0;

fn pts_to_twips(pts: f32) -> i32 {
    (pts * 20.0).round() as i32
}

fn pts_to_half_points(pts: f32) -> i32 {
    (pts * 2.0).round() as i32
}

fn hex_color(rgb: [u8; 3]) -> String {
    format!("{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

/// Word style id for a role: `body` is `Normal`, `heading-2` is `Heading2`,
/// anything else is PascalCased.
pub(crate) fn style_id(role: &str) -> String {
    if role == BODY_ROLE {
        return "Normal".to_string();
    }
    role.split(['-', '_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

// Built-in names let Word's TOC field and heading navigation pick the styles up.
fn style_name(role: &str) -> String {
    match role {
        BODY_ROLE => "Normal".to_string(),
        "title" => "Title".to_string(),
        "caption" => "caption".to_string(),
        _ => match role.strip_prefix("heading-") {
            Some(level) => format!("heading {level}"),
            None => role.to_string(),
        },
    }
}

fn heading_level(role: &str) -> Option<u8> {
    role.strip_prefix("heading-")?.parse().ok()
}

fn wml_alignment(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
        Alignment::Justify => "both",
    }
}

fn wml_number_format(format: NumberFormat) -> &'static str {
    match format {
        NumberFormat::Decimal => "decimal",
        NumberFormat::LowerRoman => "lowerRoman",
        NumberFormat::UpperRoman => "upperRoman",
        NumberFormat::LowerLetter => "lowerLetter",
        NumberFormat::UpperLetter => "upperLetter",
    }
}

/// Images are stored under their own format when Word can display it,
/// otherwise re-encoded as PNG.
fn media_payload(image: &EmbeddedImage) -> Result<(Vec<u8>, &'static str), Error> {
    let ext = match image.format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        _ => {
            let mut buf = Vec::new();
            image.pixels.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
            return Ok((buf, "png"));
        }
    };
    Ok((image.data.clone(), ext))
}

/// One XML part of the package. Text and attribute values are escaped by
/// quick-xml on the way out.
struct Part {
    xml: Writer<Vec<u8>>,
}

impl Part {
    fn new() -> Result<Self, Error> {
        let mut xml = Writer::new(Vec::new());
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(Self { xml })
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        let tag = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.xml.write_event(Event::Start(tag))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), Error> {
        self.xml.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        let tag = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.xml.write_event(Event::Empty(tag))?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), Error> {
        self.xml.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), Error> {
        self.open(name, attrs)?;
        self.text(text)?;
        self.close(name)
    }

    fn into_bytes(self) -> Vec<u8> {
        self.xml.into_inner()
    }
}

/// Drops characters XML 1.0 cannot carry.
fn xml_chars(text: &str) -> String {
    text.chars().filter(|&c| c >= ' ' || matches!(c, '\t' | '\n' | '\r')).collect()
}

struct MediaPart {
    rel_id: String,
    name: String,
    data: Vec<u8>,
}

/// A footer part. Hidden numbering gets an empty one: a section with no
/// footer reference inherits the previous section's footer.
struct FooterPart {
    rel_id: String,
    name: String,
    page_number: Option<Alignment>,
}

/// What a section's `w:sectPr` needs, computed once per section.
struct SectionProps<'a> {
    footer_rel: String,
    numbering: &'a PageNumbering,
    page: &'a PageSetup,
}

/// Accumulates document.xml and the parts it refers to.
struct PackageBuilder {
    body: Part,
    media: Vec<MediaPart>,
    footers: Vec<FooterPart>,
    next_rel: u32,
    next_drawing: u32,
}

impl PackageBuilder {
    fn new() -> Result<Self, Error> {
        let mut body = Part::new()?;
        body.open(
            "w:document",
            &[
                ("xmlns:w", WML_NS),
                ("xmlns:r", REL_NS),
                ("xmlns:wp", WPD_NS),
                ("xmlns:a", DML_NS),
                ("xmlns:pic", PIC_NS),
            ],
        )?;
        body.open("w:body", &[])?;
        // rId1..rId3 are styles, numbering and settings
        Ok(Self { body, media: Vec::new(), footers: Vec::new(), next_rel: 4, next_drawing: 1 })
    }

    fn alloc_rel(&mut self) -> String {
        let id = format!("rId{}", self.next_rel);
        self.next_rel += 1;
        id
    }

    fn add_footer(&mut self, page_number: Option<Alignment>) -> String {
        let rel_id = self.alloc_rel();
        let name = format!("footer{}.xml", self.footers.len() + 1);
        self.footers.push(FooterPart { rel_id: rel_id.clone(), name, page_number });
        rel_id
    }

    fn write_section(&mut self, section: &Section, page: &PageSetup, is_last: bool) -> Result<(), Error> {
        let props = SectionProps {
            footer_rel: self.add_footer(section.numbering.footer),
            numbering: &section.numbering,
            page,
        };
        let count = section.elements.len();

        if count == 0 && !is_last {
            self.body.open("w:p", &[])?;
            self.body.open("w:pPr", &[])?;
            self.write_section_properties(&props)?;
            self.body.close("w:pPr")?;
            return self.body.close("w:p");
        }

        for (i, element) in section.elements.iter().enumerate() {
            // a non-final section's properties ride on its last paragraph
            let carry = (!is_last && i + 1 == count).then_some(&props);
            match element {
                Element::Paragraph(para) => self.write_paragraph(para, carry)?,
                Element::PageBreak => {
                    self.body.open("w:p", &[])?;
                    if let Some(props) = carry {
                        self.body.open("w:pPr", &[])?;
                        self.write_section_properties(props)?;
                        self.body.close("w:pPr")?;
                    }
                    self.body.open("w:r", &[])?;
                    self.body.empty("w:br", &[("w:type", "page")])?;
                    self.body.close("w:r")?;
                    self.body.close("w:p")?;
                }
                Element::TableOfContents(toc) => self.write_toc(toc, carry)?,
            }
        }

        if is_last {
            self.write_section_properties(&props)?;
        }
        Ok(())
    }

    fn write_section_properties(&mut self, props: &SectionProps<'_>) -> Result<(), Error> {
        let page = props.page;
        let xml = &mut self.body;
        xml.open("w:sectPr", &[])?;
        xml.empty("w:footerReference", &[("w:type", "default"), ("r:id", &props.footer_rel)])?;
        xml.empty("w:type", &[("w:val", "nextPage")])?;
        let (width, height) = (pts_to_twips(page.width).to_string(), pts_to_twips(page.height).to_string());
        xml.empty("w:pgSz", &[("w:w", &width), ("w:h", &height)])?;
        let top = pts_to_twips(page.margin_top).to_string();
        let right = pts_to_twips(page.margin_right).to_string();
        let bottom = pts_to_twips(page.margin_bottom).to_string();
        let left = pts_to_twips(page.margin_left).to_string();
        xml.empty(
            "w:pgMar",
            &[
                ("w:top", &top),
                ("w:right", &right),
                ("w:bottom", &bottom),
                ("w:left", &left),
                ("w:header", "720"),
                ("w:footer", "720"),
                ("w:gutter", "0"),
            ],
        )?;
        let format = wml_number_format(props.numbering.format);
        match props.numbering.start {
            Some(start) => xml.empty("w:pgNumType", &[("w:fmt", format), ("w:start", &start.to_string())])?,
            None => xml.empty("w:pgNumType", &[("w:fmt", format)])?,
        }
        xml.close("w:sectPr")
    }

    fn write_paragraph(&mut self, para: &Paragraph, props: Option<&SectionProps<'_>>) -> Result<(), Error> {
        self.body.open("w:p", &[])?;
        self.body.open("w:pPr", &[])?;
        self.body.empty("w:pStyle", &[("w:val", &style_id(&para.role))])?;
        if para.keep_next {
            self.body.empty("w:keepNext", &[])?;
        }
        if para.list_label.is_some() {
            self.body.open("w:numPr", &[])?;
            self.body.empty("w:ilvl", &[("w:val", "0")])?;
            self.body.empty("w:numId", &[("w:val", &BULLET_NUM_ID.to_string())])?;
            self.body.close("w:numPr")?;
        }
        if para.image.is_some() {
            // single spacing so the picture is not clipped by an exact line height
            self.body.empty("w:spacing", &[("w:line", "240"), ("w:lineRule", "auto")])?;
        }
        self.body.empty("w:jc", &[("w:val", wml_alignment(para.alignment))])?;
        if let Some(props) = props {
            self.write_section_properties(props)?;
        }
        self.body.close("w:pPr")?;

        if let Some(image) = &para.image {
            self.write_picture(image)?;
        }
        for run in &para.runs {
            self.write_run(run)?;
        }
        self.body.close("w:p")
    }

    fn write_run(&mut self, run: &Run) -> Result<(), Error> {
        let color = run.color.map(hex_color);
        for (i, line) in run.text.split('\n').enumerate() {
            let xml = &mut self.body;
            xml.open("w:r", &[])?;
            if run.bold || run.italic || color.is_some() {
                xml.open("w:rPr", &[])?;
                if run.bold {
                    xml.empty("w:b", &[])?;
                    xml.empty("w:bCs", &[])?;
                }
                if run.italic {
                    xml.empty("w:i", &[])?;
                    xml.empty("w:iCs", &[])?;
                }
                if let Some(color) = &color {
                    xml.empty("w:color", &[("w:val", color)])?;
                }
                xml.close("w:rPr")?;
            }
            if i > 0 {
                xml.empty("w:br", &[])?;
            }
            if !line.is_empty() {
                xml.leaf("w:t", &[("xml:space", "preserve")], &xml_chars(line))?;
            }
            xml.close("w:r")?;
        }
        Ok(())
    }

    fn write_picture(&mut self, image: &EmbeddedImage) -> Result<(), Error> {
        let (data, ext) = media_payload(image)?;
        let rel_id = self.alloc_rel();
        let drawing_id = self.next_drawing;
        self.next_drawing += 1;
        let name = format!("image{drawing_id}.{ext}");

        let cx = ((image.display_width * EMU_PER_POINT).round() as i64).to_string();
        let cy = ((image.display_height * EMU_PER_POINT).round() as i64).to_string();
        let id = drawing_id.to_string();
        let title = format!("Picture {drawing_id}");

        let xml = &mut self.body;
        xml.open("w:r", &[])?;
        xml.open("w:drawing", &[])?;
        xml.open("wp:inline", &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")])?;
        xml.empty("wp:extent", &[("cx", &cx), ("cy", &cy)])?;
        xml.empty("wp:docPr", &[("id", &id), ("name", &title)])?;
        xml.open("wp:cNvGraphicFramePr", &[])?;
        xml.empty("a:graphicFrameLocks", &[("noChangeAspect", "1")])?;
        xml.close("wp:cNvGraphicFramePr")?;
        xml.open("a:graphic", &[])?;
        xml.open("a:graphicData", &[("uri", PIC_NS)])?;
        xml.open("pic:pic", &[])?;

        xml.open("pic:nvPicPr", &[])?;
        xml.empty("pic:cNvPr", &[("id", &id), ("name", &name)])?;
        xml.empty("pic:cNvPicPr", &[])?;
        xml.close("pic:nvPicPr")?;

        xml.open("pic:blipFill", &[])?;
        xml.empty("a:blip", &[("r:embed", &rel_id)])?;
        xml.open("a:stretch", &[])?;
        xml.empty("a:fillRect", &[])?;
        xml.close("a:stretch")?;
        xml.close("pic:blipFill")?;

        xml.open("pic:spPr", &[])?;
        xml.open("a:xfrm", &[])?;
        xml.empty("a:off", &[("x", "0"), ("y", "0")])?;
        xml.empty("a:ext", &[("cx", &cx), ("cy", &cy)])?;
        xml.close("a:xfrm")?;
        xml.open("a:prstGeom", &[("prst", "rect")])?;
        xml.empty("a:avLst", &[])?;
        xml.close("a:prstGeom")?;
        xml.close("pic:spPr")?;

        for tag in ["pic:pic", "a:graphicData", "a:graphic", "wp:inline", "w:drawing", "w:r"] {
            xml.close(tag)?;
        }
        self.media.push(MediaPart { rel_id, name, data });
        Ok(())
    }

    fn write_toc(&mut self, toc: &TocSettings, props: Option<&SectionProps<'_>>) -> Result<(), Error> {
        self.body.open("w:p", &[])?;
        self.body.open("w:pPr", &[])?;
        self.body.empty("w:pStyle", &[("w:val", &style_id(&toc.role))])?;
        if let Some(props) = props {
            self.write_section_properties(props)?;
        }
        self.body.close("w:pPr")?;

        let instruction = format!(r#" TOC \o "1-{}" \h \z \u "#, toc.max_level);
        write_field(&mut self.body, &instruction, "Update field to generate the table of contents.", true)?;
        self.body.close("w:p")
    }

    fn finish_document(mut self) -> Result<(Vec<u8>, Vec<MediaPart>, Vec<FooterPart>), Error> {
        self.body.close("w:body")?;
        self.body.close("w:document")?;
        Ok((self.body.into_bytes(), self.media, self.footers))
    }
}

/// A complex field (`begin`, instruction, `separate`, cached result, `end`)
/// inside the current paragraph.
fn write_field(xml: &mut Part, instruction: &str, cached: &str, dirty: bool) -> Result<(), Error> {
    xml.open("w:r", &[])?;
    if dirty {
        xml.empty("w:fldChar", &[("w:fldCharType", "begin"), ("w:dirty", "true")])?;
    } else {
        xml.empty("w:fldChar", &[("w:fldCharType", "begin")])?;
    }
    xml.close("w:r")?;
    xml.open("w:r", &[])?;
    xml.leaf("w:instrText", &[("xml:space", "preserve")], instruction)?;
    xml.close("w:r")?;
    xml.open("w:r", &[])?;
    xml.empty("w:fldChar", &[("w:fldCharType", "separate")])?;
    xml.close("w:r")?;
    xml.open("w:r", &[])?;
    xml.leaf("w:t", &[], cached)?;
    xml.close("w:r")?;
    xml.open("w:r", &[])?;
    xml.empty("w:fldChar", &[("w:fldCharType", "end")])?;
    xml.close("w:r")
}

fn write_run_properties(xml: &mut Part, profile: &StyleProfile, base: Option<&StyleProfile>) -> Result<(), Error> {
    if base.is_none_or(|b| b.font_family != profile.font_family) {
        let font = xml_chars(&profile.font_family);
        xml.empty(
            "w:rFonts",
            &[("w:ascii", &font), ("w:hAnsi", &font), ("w:eastAsia", &font), ("w:cs", &font)],
        )?;
    }
    if profile.bold {
        xml.empty("w:b", &[])?;
        xml.empty("w:bCs", &[])?;
    }
    if profile.italic {
        xml.empty("w:i", &[])?;
        xml.empty("w:iCs", &[])?;
    }
    if let Some(color) = profile.color {
        xml.empty("w:color", &[("w:val", &hex_color(color))])?;
    }
    let size = pts_to_half_points(profile.font_size).to_string();
    xml.empty("w:sz", &[("w:val", &size)])?;
    xml.empty("w:szCs", &[("w:val", &size)])
}

fn write_paragraph_properties(xml: &mut Part, profile: &StyleProfile, role: &str) -> Result<(), Error> {
    if profile.keep_with_next {
        xml.empty("w:keepNext", &[])?;
    }
    if let Some(fill) = profile.shading {
        xml.empty("w:shd", &[("w:val", "clear"), ("w:color", "auto"), ("w:fill", &hex_color(fill))])?;
    }
    let before = pts_to_twips(profile.space_before).to_string();
    let after = pts_to_twips(profile.space_after).to_string();
    let line = ((profile.line_spacing * 240.0).round() as i32).to_string();
    xml.empty(
        "w:spacing",
        &[("w:before", &before), ("w:after", &after), ("w:line", &line), ("w:lineRule", "auto")],
    )?;
    if profile.indent_left != 0.0 || profile.indent_first_line != 0.0 {
        let left = pts_to_twips(profile.indent_left).to_string();
        let first = pts_to_twips(profile.indent_first_line.abs()).to_string();
        if profile.indent_first_line < 0.0 {
            xml.empty("w:ind", &[("w:left", &left), ("w:hanging", &first)])?;
        } else if profile.indent_first_line > 0.0 {
            xml.empty("w:ind", &[("w:left", &left), ("w:firstLine", &first)])?;
        } else {
            xml.empty("w:ind", &[("w:left", &left)])?;
        }
    }
    xml.empty("w:jc", &[("w:val", wml_alignment(profile.alignment))])?;
    if let Some(level) = heading_level(role) {
        xml.empty("w:outlineLvl", &[("w:val", &level.saturating_sub(1).to_string())])?;
    }
    Ok(())
}

fn styles_xml(doc: &Document) -> Result<Vec<u8>, Error> {
    let body = doc.styles.body();
    let mut xml = Part::new()?;
    xml.open("w:styles", &[("xmlns:w", WML_NS)])?;
    xml.open("w:docDefaults", &[])?;
    xml.open("w:rPrDefault", &[])?;
    xml.open("w:rPr", &[])?;
    write_run_properties(&mut xml, body, None)?;
    xml.close("w:rPr")?;
    xml.close("w:rPrDefault")?;
    xml.open("w:pPrDefault", &[])?;
    xml.open("w:pPr", &[])?;
    let after = pts_to_twips(body.space_after).to_string();
    let line = ((body.line_spacing * 240.0).round() as i32).to_string();
    xml.empty("w:spacing", &[("w:after", &after), ("w:line", &line), ("w:lineRule", "auto")])?;
    xml.close("w:pPr")?;
    xml.close("w:pPrDefault")?;
    xml.close("w:docDefaults")?;

    for (role, profile) in doc.styles.roles() {
        let id = style_id(role);
        if role == BODY_ROLE {
            xml.open("w:style", &[("w:type", "paragraph"), ("w:styleId", &id), ("w:default", "1")])?;
        } else {
            xml.open("w:style", &[("w:type", "paragraph"), ("w:styleId", &id)])?;
        }
        xml.empty("w:name", &[("w:val", &xml_chars(&style_name(role)))])?;
        if role != BODY_ROLE {
            xml.empty("w:basedOn", &[("w:val", "Normal")])?;
            xml.empty("w:qFormat", &[])?;
        }
        xml.open("w:pPr", &[])?;
        write_paragraph_properties(&mut xml, profile, role)?;
        xml.close("w:pPr")?;
        xml.open("w:rPr", &[])?;
        write_run_properties(&mut xml, profile, Some(body))?;
        xml.close("w:rPr")?;
        xml.close("w:style")?;
    }
    xml.close("w:styles")?;
    Ok(xml.into_bytes())
}

fn numbering_xml() -> Result<Vec<u8>, Error> {
    let mut xml = Part::new()?;
    xml.open("w:numbering", &[("xmlns:w", WML_NS)])?;
    xml.open("w:abstractNum", &[("w:abstractNumId", "0")])?;
    xml.empty("w:multiLevelType", &[("w:val", "singleLevel")])?;
    xml.open("w:lvl", &[("w:ilvl", "0")])?;
    xml.empty("w:start", &[("w:val", "1")])?;
    xml.empty("w:numFmt", &[("w:val", "bullet")])?;
    xml.empty("w:lvlText", &[("w:val", "\u{2022}")])?;
    xml.empty("w:lvlJc", &[("w:val", "left")])?;
    xml.open("w:pPr", &[])?;
    xml.empty("w:ind", &[("w:left", "720"), ("w:hanging", "360")])?;
    xml.close("w:pPr")?;
    xml.close("w:lvl")?;
    xml.close("w:abstractNum")?;
    xml.open("w:num", &[("w:numId", &BULLET_NUM_ID.to_string())])?;
    xml.empty("w:abstractNumId", &[("w:val", "0")])?;
    xml.close("w:num")?;
    xml.close("w:numbering")?;
    Ok(xml.into_bytes())
}

fn settings_xml() -> Result<Vec<u8>, Error> {
    let mut xml = Part::new()?;
    xml.open("w:settings", &[("xmlns:w", WML_NS)])?;
    xml.empty("w:updateFields", &[("w:val", "true")])?;
    xml.close("w:settings")?;
    Ok(xml.into_bytes())
}

fn footer_xml(page_number: Option<Alignment>) -> Result<Vec<u8>, Error> {
    let mut xml = Part::new()?;
    xml.open("w:ftr", &[("xmlns:w", WML_NS), ("xmlns:r", REL_NS)])?;
    match page_number {
        Some(alignment) => {
            xml.open("w:p", &[])?;
            xml.open("w:pPr", &[])?;
            xml.empty("w:jc", &[("w:val", wml_alignment(alignment))])?;
            xml.close("w:pPr")?;
            write_field(&mut xml, " PAGE ", "1", false)?;
            xml.close("w:p")?;
        }
        None => xml.empty("w:p", &[])?,
    }
    xml.close("w:ftr")?;
    Ok(xml.into_bytes())
}

fn content_types_xml(footers: &[FooterPart]) -> Result<Vec<u8>, Error> {
    let mut xml = Part::new()?;
    xml.open("Types", &[("xmlns", CT_NS)])?;
    xml.empty(
        "Default",
        &[("Extension", "rels"), ("ContentType", "application/vnd.openxmlformats-package.relationships+xml")],
    )?;
    xml.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    for (ext, mime) in [
        ("png", "image/png"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("bmp", "image/bmp"),
        ("tiff", "image/tiff"),
    ] {
        xml.empty("Default", &[("Extension", ext), ("ContentType", mime)])?;
    }
    for (part, kind) in [
        ("/word/document.xml", "document.main"),
        ("/word/styles.xml", "styles"),
        ("/word/numbering.xml", "numbering"),
        ("/word/settings.xml", "settings"),
    ] {
        xml.empty("Override", &[("PartName", part), ("ContentType", &format!("{WML_TYPE}.{kind}+xml"))])?;
    }
    let footer_type = format!("{WML_TYPE}.footer+xml");
    for footer in footers {
        let part = format!("/word/{}", footer.name);
        xml.empty("Override", &[("PartName", &part), ("ContentType", &footer_type)])?;
    }
    xml.close("Types")?;
    Ok(xml.into_bytes())
}

fn package_rels_xml() -> Result<Vec<u8>, Error> {
    let mut xml = Part::new()?;
    xml.open("Relationships", &[("xmlns", PKG_REL_NS)])?;
    let kind = format!("{REL_TYPE}/officeDocument");
    xml.empty("Relationship", &[("Id", "rId1"), ("Type", &kind), ("Target", "word/document.xml")])?;
    xml.close("Relationships")?;
    Ok(xml.into_bytes())
}

fn document_rels_xml(footers: &[FooterPart], media: &[MediaPart]) -> Result<Vec<u8>, Error> {
    let mut xml = Part::new()?;
    xml.open("Relationships", &[("xmlns", PKG_REL_NS)])?;
    let mut relationship = |id: &str, kind: &str, target: &str| {
        let kind = format!("{REL_TYPE}/{kind}");
        xml.empty("Relationship", &[("Id", id), ("Type", &kind), ("Target", target)])
    };
    relationship("rId1", "styles", "styles.xml")?;
    relationship("rId2", "numbering", "numbering.xml")?;
    relationship("rId3", "settings", "settings.xml")?;
    for footer in footers {
        relationship(&footer.rel_id, "footer", &footer.name)?;
    }
    for image in media {
        relationship(&image.rel_id, "image", &format!("media/{}", image.name))?;
    }
    xml.close("Relationships")?;
    Ok(xml.into_bytes())
}

/// Serializes the document as a WordprocessingML package.
pub fn write(doc: &Document) -> Result<Vec<u8>, Error> {
    let mut package = PackageBuilder::new()?;
    let last = doc.sections.len().saturating_sub(1);
    for (i, section) in doc.sections.iter().enumerate() {
        package.write_section(section, &doc.page, i == last)?;
    }
    let (document, media, footers) = package.finish_document()?;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    // fixed timestamp: identical documents give identical bytes
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut add = |name: &str, data: &[u8]| -> Result<(), Error> {
        zip.start_file(name, options)?;
        zip.write_all(data)?;
        Ok(())
    };

    add("[Content_Types].xml", &content_types_xml(&footers)?)?;
    add("_rels/.rels", &package_rels_xml()?)?;
    add("word/document.xml", &document)?;
    add("word/styles.xml", &styles_xml(doc)?)?;
    add("word/numbering.xml", &numbering_xml()?)?;
    add("word/settings.xml", &settings_xml()?)?;
    add("word/_rels/document.xml.rels", &document_rels_xml(&footers, &media)?)?;
    for footer in &footers {
        add(&format!("word/{}", footer.name), &footer_xml(footer.page_number)?)?;
    }
    for image in &media {
        add(&format!("word/media/{}", image.name), &image.data)?;
    }

    let cursor = zip.finish()?;
    log::debug!(
        "DOCX package: {} sections, {} images, {} footers",
        doc.sections.len(),
        media.len(),
        footers.len()
    );
    Ok(cursor.into_inner())
}
