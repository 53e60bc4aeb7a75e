use std::fmt;
use std::path::PathBuf;

use crate::assets::{AssetResolver, AssetStatus, ImageAsset};
use crate::block::{AssetReference, ContentBlock, Presence, Span};
use crate::error::Error;
use crate::model::{EmbeddedImage, Element, Paragraph, Run, TocSettings};
use crate::style::{Alignment, BODY_ROLE, StyleProfile, StyleSet};

const PLACEHOLDER_RED: [u8; 3] = [255, 0, 0];
const BULLET: &str = "\u{2022}";
const TOC_DEPTH: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarningKind {
    Missing,
    Corrupt,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::Missing => f.write_str("Missing"),
            WarningKind::Corrupt => f.write_str("Corrupt"),
        }
    }
}

/// A block that was rendered with a placeholder instead of its asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub block_index: usize,
    pub kind: WarningKind,
    pub path: PathBuf,
    pub detail: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {}: {} image {}, placeholder substituted",
            self.block_index,
            self.kind,
            self.path.display()
        )?;
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RenderedBlock {
    pub index: usize,
    pub elements: Vec<Element>,
}

#[derive(Clone, Debug)]
pub enum RenderOutcome {
    Rendered(RenderedBlock),
    RenderedWithWarning(RenderedBlock, Warning),
}

impl RenderOutcome {
    pub fn block(&self) -> &RenderedBlock {
        match self {
            RenderOutcome::Rendered(block) | RenderOutcome::RenderedWithWarning(block, _) => block,
        }
    }

    pub fn warning(&self) -> Option<&Warning> {
        match self {
            RenderOutcome::Rendered(_) => None,
            RenderOutcome::RenderedWithWarning(_, warning) => Some(warning),
        }
    }

    pub fn into_parts(self) -> (RenderedBlock, Option<Warning>) {
        match self {
            RenderOutcome::Rendered(block) => (block, None),
            RenderOutcome::RenderedWithWarning(block, warning) => (block, Some(warning)),
        }
    }
}

/// Everything a block needs to render besides itself.
pub struct RenderContext<'a> {
    pub styles: &'a StyleSet,
    pub assets: &'a AssetResolver,
    pub text_width: f32,
    pub image_width: f32,
}

/// Renders one block. Asset problems become placeholders plus a warning;
/// only an unknown style role is an error.
pub fn render_block(
    index: usize,
    block: &ContentBlock,
    ctx: &RenderContext,
) -> Result<RenderOutcome, Error> {
    let role = block.role();
    let profile = match role.as_deref() {
        Some(role) => Some(ctx.styles.resolve(role, index)?),
        None => None,
    };
    let rendered = |elements| RenderedBlock { index, elements };

    let outcome = match (block, profile) {
        (ContentBlock::Heading { level, text }, Some(profile)) => {
            let mut para = paragraph(role_name(&role), profile, &[Span::plain(text.as_str())]);
            para.outline_level = (*level > 0).then_some(*level);
            RenderOutcome::Rendered(rendered(vec![Element::Paragraph(para)]))
        }
        (ContentBlock::Paragraph { spans, style }, Some(profile)) => {
            let para = paragraph(style, profile, spans);
            RenderOutcome::Rendered(rendered(vec![Element::Paragraph(para)]))
        }
        (ContentBlock::ListItem { text }, Some(profile)) => {
            let mut para = paragraph(role_name(&role), profile, &[Span::plain(text.as_str())]);
            para.list_label = Some(BULLET.to_string());
            RenderOutcome::Rendered(rendered(vec![Element::Paragraph(para)]))
        }
        (ContentBlock::Image { asset, caption, width_hint }, Some(caption_profile)) => {
            return Ok(render_image(index, asset, caption, *width_hint, caption_profile, ctx));
        }
        (ContentBlock::TableOfContents, Some(profile)) => {
            let toc = TocSettings {
                role: role_name(&role).to_string(),
                max_level: TOC_DEPTH,
                font_size: profile.font_size,
                font_name: profile.font_family.clone(),
                line_spacing: profile.line_spacing,
                space_after: profile.space_after,
            };
            RenderOutcome::Rendered(rendered(vec![Element::TableOfContents(toc)]))
        }
        (ContentBlock::PageBreak, _) => RenderOutcome::Rendered(rendered(vec![Element::PageBreak])),
        // role() returns Some for every block with text
        (_, None) => RenderOutcome::Rendered(rendered(Vec::new())),
    };
    log::debug!("Rendered block {index}");
    Ok(outcome)
}

fn role_name(role: &Option<String>) -> &str {
    role.as_deref().unwrap_or(BODY_ROLE)
}

fn paragraph(role: &str, profile: &StyleProfile, spans: &[Span]) -> Paragraph {
    let runs = spans
        .iter()
        .filter(|span| !span.text.is_empty())
        .map(|span| Run {
            text: span.text.clone(),
            font_size: profile.font_size,
            font_name: profile.font_family.clone(),
            bold: profile.bold || span.bold,
            italic: profile.italic || span.italic,
            color: profile.color,
        })
        .collect();

    Paragraph {
        role: role.to_string(),
        runs,
        alignment: profile.alignment,
        space_before: profile.space_before,
        space_after: profile.space_after,
        line_spacing: profile.line_spacing,
        indent_left: profile.indent_left,
        indent_first_line: profile.indent_first_line,
        list_label: None,
        shading: profile.shading,
        keep_next: profile.keep_with_next,
        outline_level: None,
        image: None,
    }
}

fn render_image(
    index: usize,
    asset: &AssetReference,
    caption: &str,
    width_hint: Option<f32>,
    caption_profile: &StyleProfile,
    ctx: &RenderContext,
) -> RenderOutcome {
    let rendered = |elements| RenderedBlock { index, elements };

    match ctx.assets.resolve(asset) {
        AssetStatus::Present(image) => {
            let width = width_hint.unwrap_or(ctx.image_width).min(ctx.text_width);
            let mut elements = vec![Element::Paragraph(picture(image, width, ctx.styles.body()))];
            if !caption.is_empty() {
                elements.push(Element::Paragraph(paragraph(
                    "caption",
                    caption_profile,
                    &[Span::plain(caption)],
                )));
            }
            RenderOutcome::Rendered(rendered(elements))
        }
        AssetStatus::Missing if asset.presence == Presence::Optional => {
            log::debug!("Optional image {} not found, skipped", asset.path.display());
            RenderOutcome::Rendered(rendered(Vec::new()))
        }
        AssetStatus::Missing => {
            log::warn!("Image not found: {} (placeholder inserted)", asset.path.display());
            let text = format!("[MISSING IMAGE: {}]", asset.path.display());
            let para = placeholder(caption_profile, text, true);
            let warning = Warning {
                block_index: index,
                kind: WarningKind::Missing,
                path: asset.path.clone(),
                detail: String::new(),
            };
            RenderOutcome::RenderedWithWarning(rendered(vec![Element::Paragraph(para)]), warning)
        }
        AssetStatus::Corrupt(reason) => {
            log::warn!("Image unreadable: {}: {reason} (placeholder inserted)", asset.path.display());
            let text = format!("[ERROR: Corrupted Image {}]", asset.path.display());
            let para = placeholder(caption_profile, text, false);
            let warning = Warning {
                block_index: index,
                kind: WarningKind::Corrupt,
                path: asset.path.clone(),
                detail: reason,
            };
            RenderOutcome::RenderedWithWarning(rendered(vec![Element::Paragraph(para)]), warning)
        }
    }
}

fn picture(image: ImageAsset, width: f32, body: &StyleProfile) -> Paragraph {
    let aspect = image.pixel_height() as f32 / image.pixel_width().max(1) as f32;
    let mut para = paragraph(BODY_ROLE, body, &[]);
    para.alignment = Alignment::Center;
    para.space_before = 0.0;
    para.keep_next = true;
    para.line_spacing = 1.0;
    para.image = Some(EmbeddedImage {
        data: image.data,
        format: image.format,
        pixels: image.pixels,
        display_width: width,
        display_height: width * aspect,
    });
    para
}

fn placeholder(profile: &StyleProfile, text: String, bold: bool) -> Paragraph {
    let mut para = paragraph("caption", profile, &[Span::plain(text)]);
    para.alignment = Alignment::Center;
    for run in &mut para.runs {
        run.bold = bold;
        run.italic = false;
        run.color = Some(PLACEHOLDER_RED);
    }
    para
}
