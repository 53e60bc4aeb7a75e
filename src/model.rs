use image::{DynamicImage, ImageFormat};

use crate::style::{Alignment, PageNumbering, PageSetup, StyleSet};

/// The assembled document handed to a format writer.
pub struct Document {
    pub page: PageSetup,
    pub styles: StyleSet,
    pub sections: Vec<Section>,
}

pub struct Section {
    pub numbering: PageNumbering,
    pub elements: Vec<Element>,
}

#[derive(Clone, Debug)]
pub enum Element {
    Paragraph(Paragraph),
    PageBreak,
    TableOfContents(TocSettings),
}

#[derive(Clone, Debug)]
pub struct TocSettings {
    pub role: String,
    pub max_level: u8,
    pub font_size: f32,
    pub font_name: String,
    pub line_spacing: f32,
    pub space_after: f32,
}

#[derive(Clone, Debug)]
pub struct EmbeddedImage {
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub pixels: DynamicImage,
    pub display_width: f32,  // points
    pub display_height: f32, // points
}

#[derive(Clone, Debug)]
pub struct Paragraph {
    pub role: String,
    pub runs: Vec<Run>,
    pub alignment: Alignment,
    pub space_before: f32,
    pub space_after: f32,
    pub line_spacing: f32,
    pub indent_left: f32,
    pub indent_first_line: f32,
    pub list_label: Option<String>,
    pub shading: Option<[u8; 3]>,
    pub keep_next: bool,
    pub outline_level: Option<u8>,
    pub image: Option<EmbeddedImage>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Clone, Debug)]
pub struct Run {
    pub text: String,
    pub font_size: f32,
    pub font_name: String,
    pub bold: bool,
    pub italic: bool,
    pub color: Option<[u8; 3]>, // None = automatic (black)
}
