mod assembler;
mod assets;
mod block;
mod docx;
mod error;
mod fonts;
mod model;
mod pdf;
mod plan;
mod render;
mod style;

pub use assembler::{
    Assembler, BuildReport, BuildResult, BuildState, OutputFormat, RenderedSection,
    classify_write_error,
};
pub use assets::{AssetResolver, AssetStatus, ImageAsset};
pub use block::{AssetReference, ContentBlock, Presence, Span};
pub use error::Error;
pub use model::{Element, EmbeddedImage, Paragraph, Run, TocSettings};
pub use plan::{ContentPlan, DEFAULT_IMAGE_WIDTH, SectionPlan, parse_length};
pub use render::{RenderContext, RenderOutcome, RenderedBlock, Warning, WarningKind, render_block};
pub use style::{
    Alignment, BODY_ROLE, MAX_PAGE_START, NumberFormat, POINTS_PER_INCH, PageNumbering, PageSetup, StyleProfile,
    StyleSet,
};

use std::path::Path;

/// Builds `plan` into `output`. Every style role is checked before the first
/// block renders, so a bad role leaves no file behind.
pub fn build(
    plan: &ContentPlan,
    assets: &AssetResolver,
    output: &Path,
    format: OutputFormat,
) -> Result<BuildReport, Error> {
    if plan.sections.is_empty() {
        return Err(Error::InvalidPlan("plan has no sections".into()));
    }

    let roles = plan.referenced_roles();
    let mut assembler = Assembler::new(assets.clone()).with_image_width(plan.image_width);
    assembler.apply_styles(
        plan.styles.clone(),
        plan.page.clone(),
        roles.iter().map(|(block, role)| (*block, role.as_str())),
    )?;

    for section in &plan.sections {
        assembler.begin_section(section.numbering.clone())?;
        for block in &section.blocks {
            assembler.push_block(block)?;
        }
    }
    assembler.finalize(output, format)
}
