use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::assets::AssetResolver;
use crate::block::ContentBlock;
use crate::error::Error;
use crate::model::{Document, Section};
use crate::plan::DEFAULT_IMAGE_WIDTH;
use crate::render::{RenderContext, RenderedBlock, Warning, render_block};
use crate::style::{MAX_PAGE_START, PageNumbering, PageSetup, StyleSet};
use crate::{docx, pdf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Docx,
    Pdf,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "docx" => Some(OutputFormat::Docx),
            "pdf" => Some(OutputFormat::Pdf),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Pdf => "pdf",
        }
    }
}

/// Build progress. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildState {
    Uninitialized,
    StylesApplied,
    /// Index of the section currently receiving blocks (0-based).
    SectionActive(usize),
    Finalized,
    /// A block could not be rendered. Terminal: nothing will be written.
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildState::Uninitialized => f.write_str("uninitialized"),
            BuildState::StylesApplied => f.write_str("styled with no section open"),
            BuildState::SectionActive(n) => write!(f, "in section {}", n + 1),
            BuildState::Finalized => f.write_str("finalized"),
            BuildState::Failed => f.write_str("failed"),
        }
    }
}

pub struct RenderedSection {
    pub numbering: PageNumbering,
    pub blocks: Vec<RenderedBlock>,
}

/// Rendered sections plus the warnings collected while rendering them.
#[derive(Default)]
pub struct BuildResult {
    pub sections: Vec<RenderedSection>,
    pub warnings: Vec<Warning>,
}

impl BuildResult {
    pub fn block_count(&self) -> usize {
        self.sections.iter().map(|s| s.blocks.len()).sum()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &RenderedBlock> {
        self.sections.iter().flat_map(|s| s.blocks.iter())
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub output: PathBuf,
    pub blocks_rendered: usize,
    pub warnings: Vec<Warning>,
    /// Formatted page number of every page; empty for DOCX, which the word
    /// processor paginates.
    pub page_labels: Vec<String>,
}

/// Drives the block renderer over sections of content and serializes the
/// result once.
pub struct Assembler {
    state: BuildState,
    assets: AssetResolver,
    styles: StyleSet,
    page: PageSetup,
    image_width: f32,
    next_block: usize,
    result: BuildResult,
}

impl Assembler {
    pub fn new(assets: AssetResolver) -> Self {
        Self {
            state: BuildState::Uninitialized,
            assets,
            styles: StyleSet::default(),
            page: PageSetup::default(),
            image_width: DEFAULT_IMAGE_WIDTH,
            next_block: 0,
            result: BuildResult::default(),
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn result(&self) -> &BuildResult {
        &self.result
    }

    /// Default width for images without a width hint.
    pub fn with_image_width(mut self, width: f32) -> Self {
        self.image_width = width;
        self
    }

    /// Installs the style set and page setup. Every role in `roles` must be
    /// defined, otherwise nothing is applied and the first unknown role is
    /// reported.
    pub fn apply_styles<'r>(
        &mut self,
        styles: StyleSet,
        page: PageSetup,
        roles: impl IntoIterator<Item = (usize, &'r str)>,
    ) -> Result<(), Error> {
        if self.state != BuildState::Uninitialized {
            return Err(Error::transition(self.state, "apply styles"));
        }
        for (block, role) in roles {
            if !styles.contains(role) {
                return Err(Error::UnknownStyleRole { role: role.to_string(), block: Some(block) });
            }
        }
        if !(page.text_width() > 0.0 && page.text_height() > 0.0) {
            return Err(Error::InvalidPlan(format!(
                "margins leave no text area on a {}x{}pt page",
                page.width, page.height
            )));
        }

        log::debug!(
            "Styles applied: base font {} {}pt, {} roles",
            styles.body().font_family,
            styles.body().font_size,
            styles.roles().count()
        );
        self.styles = styles;
        self.page = page;
        self.state = BuildState::StylesApplied;
        Ok(())
    }

    pub fn begin_section(&mut self, numbering: PageNumbering) -> Result<(), Error> {
        let next = match self.state {
            BuildState::StylesApplied => 0,
            BuildState::SectionActive(n) => n + 1,
            state => return Err(Error::transition(state, "begin a section")),
        };
        match numbering.start {
            Some(0) => return Err(Error::transition(self.state, "restart page numbering at 0")),
            Some(start) if start > MAX_PAGE_START => {
                return Err(Error::transition(self.state, format!("restart page numbering at {start}")));
            }
            _ => {}
        }
        log::debug!("Section {} begins ({:?}, start {:?})", next + 1, numbering.format, numbering.start);
        self.result.sections.push(RenderedSection { numbering, blocks: Vec::new() });
        self.state = BuildState::SectionActive(next);
        Ok(())
    }

    pub fn push_block(&mut self, block: &ContentBlock) -> Result<(), Error> {
        let BuildState::SectionActive(_) = self.state else {
            return Err(Error::transition(self.state, "add a block"));
        };
        let ctx = RenderContext {
            styles: &self.styles,
            assets: &self.assets,
            text_width: self.page.text_width(),
            image_width: self.image_width,
        };
        let outcome = match render_block(self.next_block, block, &ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Block {} failed, abandoning the build: {e}", self.next_block);
                self.state = BuildState::Failed;
                return Err(e);
            }
        };
        let (rendered, warning) = outcome.into_parts();
        self.next_block += 1;
        if let Some(warning) = warning {
            self.result.warnings.push(warning);
        }
        if let Some(section) = self.result.sections.last_mut() {
            section.blocks.push(rendered);
        }
        Ok(())
    }

    /// Serializes the document and writes it to `output`. Once this succeeds
    /// the build is finalized; a failed write leaves the section open so the
    /// caller can retry.
    pub fn finalize(&mut self, output: &Path, format: OutputFormat) -> Result<BuildReport, Error> {
        let BuildState::SectionActive(_) = self.state else {
            return Err(Error::transition(self.state, "finalize"));
        };

        let document = self.document();
        let (bytes, page_labels) = match format {
            OutputFormat::Docx => (docx::write(&document)?, Vec::new()),
            OutputFormat::Pdf => {
                let rendered = pdf::render(&document)?;
                (rendered.bytes, rendered.page_labels)
            }
        };
        write_output(output, &bytes)?;
        self.state = BuildState::Finalized;

        let report = BuildReport {
            output: output.to_path_buf(),
            blocks_rendered: self.result.block_count(),
            warnings: self.result.warnings.clone(),
            page_labels,
        };
        log::info!(
            "Wrote {} ({} blocks, {} warnings)",
            report.output.display(),
            report.blocks_rendered,
            report.warnings.len()
        );
        Ok(report)
    }

    fn document(&self) -> Document {
        Document {
            page: self.page.clone(),
            styles: self.styles.clone(),
            sections: self
                .result
                .sections
                .iter()
                .map(|section| Section {
                    numbering: section.numbering.clone(),
                    elements: section
                        .blocks
                        .iter()
                        .flat_map(|b| b.elements.iter().cloned())
                        .collect(),
                })
                .collect(),
        }
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    std::fs::write(path, bytes).map_err(|e| classify_write_error(e, path))
}

/// Maps a failed output write to `OutputLocked` when another process holds
/// the file, `Io` otherwise.
pub fn classify_write_error(err: io::Error, path: &Path) -> Error {
    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    let sharing_violation = cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33));
    if err.kind() == io::ErrorKind::PermissionDenied || sharing_violation {
        Error::OutputLocked(path.to_path_buf())
    } else {
        Error::Io(err)
    }
}
