use std::collections::BTreeMap;

use crate::error::Error;

pub const POINTS_PER_INCH: f32 = 72.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// Formatting for one role. Sizes and spacing are in points; `line_spacing`
/// is a multiplier of single spacing.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleProfile {
    pub font_family: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: Option<[u8; 3]>, // None = automatic (black)
    pub alignment: Alignment,
    pub space_before: f32,
    pub space_after: f32,
    pub line_spacing: f32,
    pub indent_left: f32,
    pub indent_first_line: f32, // negative = hanging
    pub shading: Option<[u8; 3]>,
    pub keep_with_next: bool,
}

impl StyleProfile {
    pub fn new(font_family: &str, font_size: f32) -> Self {
        Self {
            font_family: font_family.to_string(),
            font_size,
            bold: false,
            italic: false,
            color: None,
            alignment: Alignment::Left,
            space_before: 0.0,
            space_after: 8.0,
            line_spacing: 1.0,
            indent_left: 0.0,
            indent_first_line: 0.0,
            shading: None,
            keep_with_next: false,
        }
    }

    /// A profile for another role starting from this one's font and line spacing.
    pub fn derive(&self) -> Self {
        Self {
            line_spacing: self.line_spacing,
            space_after: self.space_after,
            ..Self::new(&self.font_family, self.font_size)
        }
    }

    pub fn size(mut self, pts: f32) -> Self {
        self.font_size = pts;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn color(mut self, rgb: [u8; 3]) -> Self {
        self.color = Some(rgb);
        self
    }

    pub fn align(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn spacing(mut self, before: f32, after: f32) -> Self {
        self.space_before = before;
        self.space_after = after;
        self
    }

    pub fn indent(mut self, left: f32, first_line: f32) -> Self {
        self.indent_left = left;
        self.indent_first_line = first_line;
        self
    }

    pub fn line_spacing(mut self, factor: f32) -> Self {
        self.line_spacing = factor;
        self
    }

    pub fn shading(mut self, rgb: [u8; 3]) -> Self {
        self.shading = Some(rgb);
        self
    }

    pub fn keep_with_next(mut self) -> Self {
        self.keep_with_next = true;
        self
    }
}

pub const BODY_ROLE: &str = "body";

/// Style profiles keyed by role. The `body` role always exists and carries the
/// document-wide defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleSet {
    roles: BTreeMap<String, StyleProfile>,
}

impl StyleSet {
    pub fn new(body: StyleProfile) -> Self {
        let mut roles = BTreeMap::new();
        roles.insert(BODY_ROLE.to_string(), body);
        Self { roles }
    }

    /// Times New Roman 12pt at 1.5 spacing, centered chapter headings,
    /// italic captions and hanging-indent references.
    pub fn academic() -> Self {
        let body = StyleProfile::new("Times New Roman", 12.0)
            .line_spacing(1.5)
            .spacing(0.0, 12.0);
        Self::academic_from(body)
    }

    pub fn academic_from(body: StyleProfile) -> Self {
        let black = [0, 0, 0];
        let mut set = Self::new(body.clone());
        set.insert(
            "title",
            body.derive().size(26.0).bold().align(Alignment::Center).spacing(0.0, 12.0).keep_with_next(),
        );
        set.insert(
            "heading-1",
            body.derive()
                .size(16.0)
                .bold()
                .color(black)
                .align(Alignment::Center)
                .spacing(24.0, 18.0)
                .keep_with_next(),
        );
        set.insert(
            "heading-2",
            body.derive().size(14.0).bold().color(black).spacing(18.0, 12.0).keep_with_next(),
        );
        set.insert(
            "heading-3",
            body.derive().size(13.0).bold().color(black).spacing(12.0, 6.0).keep_with_next(),
        );
        set.insert(
            "caption",
            body.derive().size(10.0).italic().align(Alignment::Center),
        );
        set.insert(
            "list-item",
            body.derive().indent(36.0, -18.0).spacing(0.0, 6.0),
        );
        set.insert("toc", body.derive().line_spacing(1.0).spacing(0.0, 4.0));
        set.insert(
            "reference",
            body.derive().indent(0.3 * POINTS_PER_INCH, -0.3 * POINTS_PER_INCH),
        );
        set
    }

    pub fn insert(&mut self, role: &str, profile: StyleProfile) {
        self.roles.insert(role.to_string(), profile);
    }

    pub fn get(&self, role: &str) -> Option<&StyleProfile> {
        self.roles.get(role)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    pub fn resolve(&self, role: &str, block: usize) -> Result<&StyleProfile, Error> {
        self.roles.get(role).ok_or_else(|| Error::UnknownStyleRole {
            role: role.to_string(),
            block: Some(block),
        })
    }

    pub fn body(&self) -> &StyleProfile {
        // `new` inserts the body role and nothing removes it
        &self.roles[BODY_ROLE]
    }

    pub fn roles(&self) -> impl Iterator<Item = (&str, &StyleProfile)> {
        self.roles.iter().map(|(role, profile)| (role.as_str(), profile))
    }
}

impl Default for StyleSet {
    fn default() -> Self {
        Self::new(StyleProfile::new("Helvetica", 11.0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageSetup {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl PageSetup {
    pub fn letter() -> Self {
        Self::sized(612.0, 792.0)
    }

    pub fn a4() -> Self {
        Self::sized(595.28, 841.89)
    }

    fn sized(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            margin_top: POINTS_PER_INCH,
            margin_bottom: POINTS_PER_INCH,
            margin_left: POINTS_PER_INCH,
            margin_right: POINTS_PER_INCH,
        }
    }

    pub fn margins(mut self, top: f32, right: f32, bottom: f32, left: f32) -> Self {
        self.margin_top = top;
        self.margin_right = right;
        self.margin_bottom = bottom;
        self.margin_left = left;
        self
    }

    pub fn text_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn text_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self::letter()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NumberFormat {
    #[default]
    Decimal,
    LowerRoman,
    UpperRoman,
    LowerLetter,
    UpperLetter,
}

impl NumberFormat {
    pub fn format(self, n: u32) -> String {
        match self {
            NumberFormat::Decimal => n.to_string(),
            NumberFormat::LowerRoman => roman(n).to_lowercase(),
            NumberFormat::UpperRoman => roman(n),
            NumberFormat::LowerLetter => letters(n).to_lowercase(),
            NumberFormat::UpperLetter => letters(n),
        }
    }
}

fn roman(mut n: u32) -> String {
    const NUMERALS: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    if n == 0 {
        return "0".to_string();
    }
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

// A..Z, then AA..ZZ, AAA.. (repeated letter, as word processors count)
fn letters(n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let letter = char::from(b'A' + ((n - 1) % 26) as u8);
    let repeat = ((n - 1) / 26 + 1) as usize;
    std::iter::repeat_n(letter, repeat).collect()
}

/// Highest page number a section may restart at. PDF page labels carry the
/// start as a signed 32-bit integer.
pub const MAX_PAGE_START: u32 = i32::MAX as u32;

/// Page numbering for one section. `start: None` continues from the previous
/// section; `footer: None` hides the number.
#[derive(Clone, Debug, PartialEq)]
pub struct PageNumbering {
    pub format: NumberFormat,
    pub start: Option<u32>,
    pub footer: Option<Alignment>,
}

impl PageNumbering {
    pub fn new(format: NumberFormat) -> Self {
        Self { format, start: None, footer: Some(Alignment::Center) }
    }

    pub fn restart_at(mut self, start: u32) -> Self {
        self.start = Some(start);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.footer = None;
        self
    }
}

impl Default for PageNumbering {
    fn default() -> Self {
        Self::new(NumberFormat::Decimal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roman_numerals() {
        let formatted: Vec<String> = [1, 2, 3, 4, 9, 14, 40, 1994]
            .into_iter()
            .map(|n| NumberFormat::LowerRoman.format(n))
            .collect();
        assert_eq!(formatted, ["i", "ii", "iii", "iv", "ix", "xiv", "xl", "mcmxciv"]);
        assert_eq!(NumberFormat::UpperRoman.format(12), "XII");
    }

    #[test]
    fn letters_repeat_after_z() {
        assert_eq!(NumberFormat::LowerLetter.format(1), "a");
        assert_eq!(NumberFormat::LowerLetter.format(26), "z");
        assert_eq!(NumberFormat::UpperLetter.format(27), "AA");
        assert_eq!(NumberFormat::UpperLetter.format(53), "AAA");
    }

    #[test]
    fn academic_preset_has_every_block_role() {
        let styles = StyleSet::academic();
        for role in ["body", "title", "heading-1", "heading-2", "heading-3", "caption", "list-item", "toc", "reference"] {
            assert!(styles.contains(role), "missing {role}");
        }
        assert_eq!(styles.body().font_family, "Times New Roman");
        assert_eq!(styles.get("heading-1").map(|s| s.alignment), Some(Alignment::Center));
    }

    #[test]
    fn text_area_subtracts_margins() {
        let page = PageSetup::letter().margins(72.0, 72.0, 90.0, 108.0);
        assert_eq!(page.text_width(), 612.0 - 180.0);
        assert_eq!(page.text_height(), 792.0 - 162.0);
    }
}
