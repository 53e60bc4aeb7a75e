use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

/// Extra font directories, separated like PATH.
pub const FONT_DIRS_ENV: &str = "QUIRE_FONTS";

pub(crate) struct FontEntry {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    widths_1000: Vec<f32>,
    line_h_ratio: f32,
    ascender_ratio: f32,
}

impl FontEntry {
    pub(crate) fn text_width(&self, text: &str, size: f32) -> f32 {
        to_winansi_bytes(text)
            .iter()
            .map(|&b| {
                b.checked_sub(32)
                    .and_then(|i| self.widths_1000.get(i as usize))
                    .copied()
                    .unwrap_or(0.0)
            })
            .sum::<f32>()
            * size
            / 1000.0
    }

    /// Single-spaced line height at `size`.
    pub(crate) fn line_height(&self, size: f32) -> f32 {
        size * self.line_h_ratio
    }

    pub(crate) fn ascent(&self, size: f32) -> f32 {
        size * self.ascender_ratio
    }
}

/// (lowercase family name, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

static FONT_INDEX: OnceLock<FontLookup> = OnceLock::new();

fn name_record(face: &Face, name_id: u16) -> Option<String> {
    for name in face.names() {
        if name.name_id == name_id
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s);
        }
    }
    None
}

fn font_family_name(face: &Face) -> Option<String> {
    // ID 1 (Family) keeps "Arial" and "Arial Narrow" apart; ID 16 would merge them
    name_record(face, ttf_parser::name_id::FAMILY)
}

/// `/BaseFont` for an embedded face: its own PostScript name when the font
/// carries one, else the family with a style suffix. Either way each style
/// of a family gets a distinct name.
fn postscript_name(face: &Face, family: &str) -> String {
    name_record(face, ttf_parser::name_id::POST_SCRIPT_NAME)
        .map(|name| name.replace(' ', ""))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| styled_family_name(family, face.is_bold(), face.is_italic()))
}

fn styled_family_name(family: &str, bold: bool, italic: bool) -> String {
    let base = family.replace(' ', "");
    match (bold, italic) {
        (false, false) => base,
        (true, false) => format!("{base}-Bold"),
        (false, true) => format!("{base}-Italic"),
        (true, true) => format!("{base}-BoldItalic"),
    }
}

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(val) = std::env::var(FONT_DIRS_ENV) {
        dirs.extend(std::env::split_paths(&val).filter(|p| !p.as_os_str().is_empty()));
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        match std::env::var("WINDIR") {
            Ok(windir) => dirs.push(PathBuf::from(windir).join("Fonts")),
            Err(_) => dirs.push("C:\\Windows\\Fonts".into()),
        }
    }

    dirs
}

fn scan_font_dirs() -> FontLookup {
    let mut index = FontLookup::new();
    let mut stack = font_directories();
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let is_collection = match path.extension().and_then(|e| e.to_str()) {
                Some("ttf" | "otf" | "TTF" | "OTF") => false,
                Some("ttc" | "TTC") => true,
                _ => continue,
            };
            let Ok(data) = std::fs::read(&path) else {
                continue;
            };
            let face_count = if is_collection {
                ttf_parser::fonts_in_collection(&data).unwrap_or(1)
            } else {
                1
            };
            for face_idx in 0..face_count {
                let Ok(face) = Face::parse(&data, face_idx) else {
                    continue;
                };
                if let Some(family) = font_family_name(&face) {
                    index
                        .entry((family.to_lowercase(), face.is_bold(), face.is_italic()))
                        .or_insert((path.clone(), face_idx));
                }
            }
        }
    }
    log::debug!("Font index holds {} faces", index.len());
    index
}

/// Exact style match only: a regular face standing in for bold would lose
/// the emphasis, the standard bold face keeps it.
fn find_font_file(family: &str, bold: bool, italic: bool) -> Option<(PathBuf, u32)> {
    FONT_INDEX
        .get_or_init(scan_font_dirs)
        .get(&(family.to_lowercase(), bold, italic))
        .cloned()
}

/// Windows-1252 byte to Unicode for the 0x80..=0x9F block; other bytes map
/// to the same code point.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// Encodes text as WinAnsi for PDF strings. Characters outside the code page
/// are dropped.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .filter_map(|c| match c as u32 {
            0x0020..=0x007E | 0x00A0..=0x00FF => Some(c as u8),
            _ => (0x80u8..=0x9F).find(|&b| winansi_to_char(b) == c && b as u32 != c as u32),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum StandardFamily {
    Helvetica,
    Times,
    Courier,
}

impl StandardFamily {
    fn for_family(family: &str) -> Self {
        let lower = family.to_lowercase();
        if lower.contains("courier") || lower.contains("mono") || lower.contains("consol") {
            StandardFamily::Courier
        } else if lower.contains("times")
            || (lower.contains("serif") && !lower.contains("sans"))
            || lower.contains("georgia")
            || lower.contains("garamond")
            || lower.contains("cambria")
        {
            StandardFamily::Times
        } else {
            StandardFamily::Helvetica
        }
    }

    fn base_font(self, bold: bool, italic: bool) -> &'static str {
        match (self, bold, italic) {
            (StandardFamily::Helvetica, false, false) => "Helvetica",
            (StandardFamily::Helvetica, true, false) => "Helvetica-Bold",
            (StandardFamily::Helvetica, false, true) => "Helvetica-Oblique",
            (StandardFamily::Helvetica, true, true) => "Helvetica-BoldOblique",
            (StandardFamily::Times, false, false) => "Times-Roman",
            (StandardFamily::Times, true, false) => "Times-Bold",
            (StandardFamily::Times, false, true) => "Times-Italic",
            (StandardFamily::Times, true, true) => "Times-BoldItalic",
            (StandardFamily::Courier, false, false) => "Courier",
            (StandardFamily::Courier, true, false) => "Courier-Bold",
            (StandardFamily::Courier, false, true) => "Courier-Oblique",
            (StandardFamily::Courier, true, true) => "Courier-BoldOblique",
        }
    }

    /// Approximate advance widths at 1000 units/em for WinAnsi 32..=255.
    fn widths(self, bold: bool) -> Vec<f32> {
        let bold_extra = if bold { 30.0 } else { 0.0 };
        (32u8..=255u8)
            .map(|b| match self {
                StandardFamily::Courier => 600.0,
                StandardFamily::Helvetica => helvetica_width(b) + bold_extra,
                StandardFamily::Times => times_width(b) + bold_extra,
            })
            .collect()
    }

    fn metrics(self) -> (f32, f32) {
        // (line height, ascender) as fractions of the font size
        match self {
            StandardFamily::Helvetica => (1.15, 0.718),
            StandardFamily::Times => (1.15, 0.683),
            StandardFamily::Courier => (1.13, 0.629),
        }
    }
}

fn helvetica_width(b: u8) -> f32 {
    match b {
        32 => 278.0,
        33..=47 => 333.0,
        48..=57 => 556.0,
        58..=64 => 333.0,
        73 | 74 => 278.0,
        77 => 833.0,
        65..=90 => 667.0,
        91..=96 => 333.0,
        102 | 105 | 106 | 108 | 116 => 278.0,
        109 | 119 => 833.0,
        97..=122 => 556.0,
        _ => 556.0,
    }
}

fn times_width(b: u8) -> f32 {
    match b {
        32 => 250.0,
        33..=47 => 333.0,
        48..=57 => 500.0,
        58..=64 => 278.0,
        73 => 333.0,
        74 => 389.0,
        77 | 87 => 889.0,
        65..=90 => 667.0,
        91..=96 => 333.0,
        102 | 105 | 106 | 108 | 116 => 278.0,
        109 => 778.0,
        119 => 722.0,
        97..=122 => 472.0,
        _ => 500.0,
    }
}

/// Embeds a TrueType/OpenType face. Returns widths, line height ratio and
/// ascender ratio.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    alloc: &mut impl FnMut() -> Ref,
    family: &str,
    font_data: &[u8],
    face_index: u32,
) -> Option<(Vec<f32>, f32, f32)> {
    let face = Face::parse(font_data, face_index).ok()?;
    let descriptor_ref = alloc();
    let data_ref = alloc();

    let units = face.units_per_em() as f32;
    let scale = |v: f32| v / units * 1000.0;
    let cap_height = face.capital_height().map(|h| scale(h as f32)).unwrap_or(700.0);
    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        scale(bb.x_min as f32),
        scale(bb.y_min as f32),
        scale(bb.x_max as f32),
        scale(bb.y_max as f32),
    );

    let widths: Vec<f32> = (32u8..=255u8)
        .map(|byte| {
            face.glyph_index(winansi_to_char(byte))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map(|adv| scale(adv as f32))
                .unwrap_or(0.0)
        })
        .collect();

    let data_len = i32::try_from(font_data.len()).ok()?;
    pdf.stream(data_ref, font_data).pair(Name(b"Length1"), data_len);

    let ps_name = postscript_name(&face, family);
    let mut flags = pdf_writer::types::FontFlags::NON_SYMBOLIC;
    if face.is_italic() {
        flags |= pdf_writer::types::FontFlags::ITALIC;
    }
    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(flags)
        .bbox(bbox)
        .italic_angle(if face.is_italic() { -12.0 } else { 0.0 })
        .ascent(scale(face.ascender() as f32))
        .descent(scale(face.descender() as f32))
        .cap_height(cap_height)
        .stem_v(if face.is_bold() { 140.0 } else { 80.0 })
        .font_file2(data_ref);

    {
        let mut d = pdf.indirect(font_ref).dict();
        d.pair(Name(b"Type"), Name(b"Font"));
        d.pair(Name(b"Subtype"), Name(b"TrueType"));
        d.pair(Name(b"BaseFont"), Name(ps_name.as_bytes()));
        d.pair(Name(b"Encoding"), Name(b"WinAnsiEncoding"));
        d.pair(Name(b"FirstChar"), 32i32);
        d.pair(Name(b"LastChar"), 255i32);
        d.pair(Name(b"FontDescriptor"), descriptor_ref);
        d.insert(Name(b"Widths")).array().items(widths.iter().copied());
    }

    let line_gap = face.line_gap() as f32;
    let line_h_ratio = (face.ascender() as f32 - face.descender() as f32 + line_gap) / units;
    let ascender_ratio = face.ascender() as f32 / units;
    Some((widths, line_h_ratio, ascender_ratio))
}

/// Fonts registered in one PDF, keyed by family and style.
pub(crate) struct FontSet {
    entries: Vec<FontEntry>,
    by_key: HashMap<(String, bool, bool), usize>,
}

impl FontSet {
    pub(crate) fn new() -> Self {
        Self { entries: Vec::new(), by_key: HashMap::new() }
    }

    pub(crate) fn get(&self, index: usize) -> &FontEntry {
        &self.entries[index]
    }

    pub(crate) fn entries(&self) -> &[FontEntry] {
        &self.entries
    }

    /// Index of the font for this family and style, writing it into `pdf`
    /// the first time it is asked for.
    pub(crate) fn register(
        &mut self,
        pdf: &mut Pdf,
        alloc: &mut impl FnMut() -> Ref,
        family: &str,
        bold: bool,
        italic: bool,
    ) -> usize {
        let key = (family.to_lowercase(), bold, italic);
        if let Some(&index) = self.by_key.get(&key) {
            return index;
        }

        let font_ref = alloc();
        let pdf_name = format!("F{}", self.entries.len() + 1);
        let embedded = find_font_file(family, bold, italic).and_then(|(path, face_index)| {
            let data = std::fs::read(&path).ok()?;
            embed_truetype(pdf, font_ref, alloc, family, &data, face_index)
        });

        let entry = match embedded {
            Some((widths_1000, line_h_ratio, ascender_ratio)) => {
                FontEntry { pdf_name, font_ref, widths_1000, line_h_ratio, ascender_ratio }
            }
            None => {
                let standard = StandardFamily::for_family(family);
                let base = standard.base_font(bold, italic);
                log::warn!("Font not found: {family} bold={bold} italic={italic}, using {base}");
                pdf.type1_font(font_ref)
                    .base_font(Name(base.as_bytes()))
                    .encoding_predefined(Name(b"WinAnsiEncoding"));
                let (line_h_ratio, ascender_ratio) = standard.metrics();
                FontEntry {
                    pdf_name,
                    font_ref,
                    widths_1000: standard.widths(bold),
                    line_h_ratio,
                    ascender_ratio,
                }
            }
        };

        let index = self.entries.len();
        self.entries.push(entry);
        self.by_key.insert(key, index);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winansi_keeps_typographic_punctuation() {
        assert_eq!(to_winansi_bytes("a\u{2014}b"), vec![b'a', 0x97, b'b']);
        assert_eq!(to_winansi_bytes("\u{2019}\u{2022}"), vec![0x92, 0x95]);
        assert_eq!(to_winansi_bytes("caf\u{e9}"), vec![b'c', b'a', b'f', 0xE9]);
        // outside the code page
        assert_eq!(to_winansi_bytes("\u{0928}x"), vec![b'x']);
    }

    #[test]
    fn standard_family_guess() {
        assert_eq!(StandardFamily::for_family("Times New Roman"), StandardFamily::Times);
        assert_eq!(StandardFamily::for_family("Courier New"), StandardFamily::Courier);
        assert_eq!(StandardFamily::for_family("Helvetica"), StandardFamily::Helvetica);
        assert_eq!(StandardFamily::for_family("Open Sans"), StandardFamily::Helvetica);
        assert_eq!(StandardFamily::Times.base_font(true, true), "Times-BoldItalic");
    }

    #[test]
    fn styles_of_a_family_get_distinct_names() {
        let names = [
            styled_family_name("Times New Roman", false, false),
            styled_family_name("Times New Roman", true, false),
            styled_family_name("Times New Roman", false, true),
            styled_family_name("Times New Roman", true, true),
        ];
        assert_eq!(
            names,
            ["TimesNewRoman", "TimesNewRoman-Bold", "TimesNewRoman-Italic", "TimesNewRoman-BoldItalic"]
        );
    }
}
