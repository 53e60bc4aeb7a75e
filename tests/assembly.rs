mod common;

use std::io;
use std::path::Path;

use common::{output_dir, two_section_plan, write_corrupt, write_png};
use quire::{
    Assembler, AssetResolver, BuildState, ContentBlock, ContentPlan, Error, MAX_PAGE_START,
    OutputFormat, PageNumbering, PageSetup, StyleSet, WarningKind, classify_write_error,
};

fn assembler_for(dir: &Path) -> Assembler {
    let mut assembler = Assembler::new(AssetResolver::new(dir));
    let no_roles: [(usize, &str); 0] = [];
    assembler
        .apply_styles(StyleSet::academic(), Default::default(), no_roles)
        .expect("apply styles");
    assembler
}

#[test]
fn text_only_build_has_no_warnings() {
    let dir = output_dir("text_only");
    let plan = two_section_plan(vec![
        ContentBlock::heading(1, "Introduction"),
        ContentBlock::paragraph("Plain body text."),
        ContentBlock::list_item("First point"),
    ]);
    let output = dir.join("text_only.docx");

    let report = quire::build(&plan, &AssetResolver::new(&dir), &output, OutputFormat::Docx).unwrap();

    assert!(report.warnings.is_empty(), "unexpected warnings: {:?}", report.warnings);
    assert_eq!(report.blocks_rendered, 5);
    assert!(output.is_file());
}

#[test]
fn missing_image_becomes_placeholder_and_build_finishes() {
    let dir = output_dir("missing_image");
    let output = dir.join("report.docx");
    let mut assembler = assembler_for(&dir);

    assembler.begin_section(PageNumbering::default()).unwrap();
    for block in [
        ContentBlock::heading(1, "Results"),
        ContentBlock::image("missing.jpg", "Figure 1: absent"),
        ContentBlock::paragraph("Discussion continues after the figure."),
    ] {
        assembler.push_block(&block).unwrap();
    }
    let report = assembler.finalize(&output, OutputFormat::Docx).unwrap();

    assert_eq!(assembler.state(), BuildState::Finalized);
    assert_eq!(report.blocks_rendered, 3);
    assert_eq!(report.warnings.len(), 1);
    let warning = &report.warnings[0];
    assert_eq!(warning.kind, WarningKind::Missing);
    assert_eq!(warning.block_index, 1);
    assert_eq!(warning.path, Path::new("missing.jpg"));
    assert!(output.is_file());

    let placeholder = assembler.result().blocks().nth(1).unwrap();
    let quire::Element::Paragraph(para) = &placeholder.elements[0] else {
        panic!("placeholder should be a paragraph");
    };
    assert_eq!(para.text(), "[MISSING IMAGE: missing.jpg]");
    assert!(para.runs.iter().all(|r| r.bold && r.color == Some([255, 0, 0])));
}

#[test]
fn undecodable_image_is_reported_as_corrupt() {
    let dir = output_dir("corrupt_image");
    write_corrupt(&dir, "broken.png");
    let plan = ContentPlan::new(StyleSet::academic()).section(
        PageNumbering::default(),
        vec![ContentBlock::image("broken.png", "Figure 2")],
    );

    let report = quire::build(
        &plan,
        &AssetResolver::new(&dir),
        &dir.join("corrupt.docx"),
        OutputFormat::Docx,
    )
    .unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::Corrupt);
    assert!(!report.warnings[0].detail.is_empty());
}

#[test]
fn corrupt_placeholder_is_red_and_not_bold() {
    let dir = output_dir("corrupt_placeholder");
    write_corrupt(&dir, "broken.png");
    let mut assembler = assembler_for(&dir);
    assembler.begin_section(PageNumbering::default()).unwrap();
    assembler.push_block(&ContentBlock::image("broken.png", "Figure 2")).unwrap();

    let block = assembler.result().blocks().next().unwrap();
    let quire::Element::Paragraph(para) = &block.elements[0] else {
        panic!("placeholder should be a paragraph");
    };
    assert_eq!(para.text(), "[ERROR: Corrupted Image broken.png]");
    assert!(para.runs.iter().all(|r| !r.bold && !r.italic && r.color == Some([255, 0, 0])));
    assert_eq!(para.alignment, quire::Alignment::Center);
}

#[test]
fn present_image_renders_picture_and_caption() {
    let dir = output_dir("present_image");
    write_png(&dir, "chart.png", 40, 20);
    let mut assembler = assembler_for(&dir);
    assembler.begin_section(PageNumbering::default()).unwrap();
    assembler.push_block(&ContentBlock::image("chart.png", "Figure 3: chart")).unwrap();

    let block = assembler.result().blocks().next().unwrap();
    assert_eq!(block.elements.len(), 2);
    let quire::Element::Paragraph(picture) = &block.elements[0] else {
        panic!("expected picture paragraph");
    };
    let image = picture.image.as_ref().expect("embedded image");
    assert!((image.display_height * 2.0 - image.display_width).abs() < 0.01);
    assert!(assembler.result().warnings.is_empty());
}

#[test]
fn optional_missing_image_is_skipped_silently() {
    let dir = output_dir("optional_image");
    let mut assembler = assembler_for(&dir);
    assembler.begin_section(PageNumbering::default()).unwrap();
    let block = ContentBlock::Image {
        asset: quire::AssetReference::optional("logo.png"),
        caption: String::new(),
        width_hint: None,
    };
    assembler.push_block(&block).unwrap();

    assert!(assembler.result().warnings.is_empty());
    assert!(assembler.result().blocks().next().unwrap().elements.is_empty());
}

#[test]
fn rebuilding_gives_the_same_warnings() {
    let dir = output_dir("idempotent_warnings");
    write_corrupt(&dir, "bad.jpg");
    let plan = two_section_plan(vec![
        ContentBlock::image("gone.png", ""),
        ContentBlock::image("bad.jpg", "Figure"),
    ]);
    let assets = AssetResolver::new(&dir);

    let first = quire::build(&plan, &assets, &dir.join("a.docx"), OutputFormat::Docx).unwrap();
    let second = quire::build(&plan, &assets, &dir.join("b.docx"), OutputFormat::Docx).unwrap();

    assert_eq!(first.warnings, second.warnings);
    let kinds: Vec<_> = first.warnings.iter().map(|w| w.kind).collect();
    assert_eq!(kinds, [WarningKind::Missing, WarningKind::Corrupt]);
}

#[test]
fn unknown_role_fails_before_anything_is_written() {
    let dir = output_dir("unknown_role");
    let output = dir.join("never.docx");
    let plan = ContentPlan::new(StyleSet::academic()).section(
        PageNumbering::default(),
        vec![
            ContentBlock::paragraph("fine"),
            ContentBlock::styled("needs a style", "abstract"),
        ],
    );

    let err = quire::build(&plan, &AssetResolver::new(&dir), &output, OutputFormat::Docx).unwrap_err();

    match err {
        Error::UnknownStyleRole { role, block } => {
            assert_eq!(role, "abstract");
            assert_eq!(block, Some(1));
        }
        other => panic!("expected UnknownStyleRole, got {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn unknown_role_leaves_assembler_uninitialized() {
    let mut assembler = Assembler::new(AssetResolver::default());
    let err = assembler
        .apply_styles(StyleSet::default(), Default::default(), [(0, "caption")])
        .unwrap_err();

    assert!(matches!(err, Error::UnknownStyleRole { .. }));
    assert!(!err.is_recoverable());
    assert_eq!(assembler.state(), BuildState::Uninitialized);
}

#[test]
fn operations_out_of_order_are_rejected() {
    let mut assembler = Assembler::new(AssetResolver::default());
    let block = ContentBlock::paragraph("early");

    assert!(matches!(
        assembler.begin_section(PageNumbering::default()),
        Err(Error::InvalidTransition { state: BuildState::Uninitialized, .. })
    ));

    let no_roles: [(usize, &str); 0] = [];
    assembler.apply_styles(StyleSet::default(), Default::default(), no_roles).unwrap();
    assert!(matches!(
        assembler.apply_styles(StyleSet::default(), Default::default(), no_roles),
        Err(Error::InvalidTransition { .. })
    ));
    assert!(matches!(assembler.push_block(&block), Err(Error::InvalidTransition { .. })));
    assert!(matches!(
        assembler.begin_section(PageNumbering::default().restart_at(0)),
        Err(Error::InvalidTransition { .. })
    ));

    assembler.begin_section(PageNumbering::default()).unwrap();
    assembler.push_block(&block).unwrap();
    assembler.begin_section(PageNumbering::default()).unwrap();
    assert_eq!(assembler.state(), BuildState::SectionActive(1));
}

#[test]
fn failed_block_stops_the_build_for_good() {
    let dir = output_dir("failed_block");
    let output = dir.join("partial.docx");
    let mut assembler = assembler_for(&dir);
    assembler.begin_section(PageNumbering::default()).unwrap();
    assembler.push_block(&ContentBlock::paragraph("before")).unwrap();

    let err = assembler.push_block(&ContentBlock::styled("x", "abstract")).unwrap_err();
    assert!(matches!(err, Error::UnknownStyleRole { block: Some(1), .. }));
    assert_eq!(assembler.state(), BuildState::Failed);

    assert!(matches!(
        assembler.push_block(&ContentBlock::paragraph("after")),
        Err(Error::InvalidTransition { state: BuildState::Failed, .. })
    ));
    assert!(matches!(
        assembler.begin_section(PageNumbering::default()),
        Err(Error::InvalidTransition { state: BuildState::Failed, .. })
    ));
    let err = assembler.finalize(&output, OutputFormat::Docx).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { state: BuildState::Failed, .. }));
    assert!(!output.exists());
}

#[test]
fn page_starts_beyond_the_pdf_range_are_rejected() {
    let mut assembler = assembler_for(Path::new("."));
    let too_far = PageNumbering::default().restart_at(MAX_PAGE_START + 1);
    assert!(matches!(assembler.begin_section(too_far), Err(Error::InvalidTransition { .. })));
    assert_eq!(assembler.state(), BuildState::StylesApplied);

    assembler.begin_section(PageNumbering::default().restart_at(MAX_PAGE_START)).unwrap();
}

#[test]
fn page_without_text_area_is_rejected() {
    let no_roles: [(usize, &str); 0] = [];
    for page in [
        PageSetup { margin_left: 400.0, margin_right: 400.0, ..PageSetup::default() },
        PageSetup { width: f32::NAN, ..PageSetup::default() },
    ] {
        let mut assembler = Assembler::new(AssetResolver::default());
        let err = assembler.apply_styles(StyleSet::default(), page, no_roles).unwrap_err();
        assert!(matches!(err, Error::InvalidPlan(_)), "got {err}");
        assert_eq!(assembler.state(), BuildState::Uninitialized);
    }
}

#[test]
fn finalize_twice_is_rejected() {
    let dir = output_dir("finalize_twice");
    let mut assembler = assembler_for(&dir);
    assembler.begin_section(PageNumbering::default()).unwrap();
    assembler.push_block(&ContentBlock::paragraph("once")).unwrap();
    assembler.finalize(&dir.join("once.docx"), OutputFormat::Docx).unwrap();

    let err = assembler.finalize(&dir.join("twice.docx"), OutputFormat::Docx).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { state: BuildState::Finalized, .. }));
    assert!(!dir.join("twice.docx").exists());
}

#[test]
fn failed_write_can_be_retried() {
    let dir = output_dir("retry_write");
    let mut assembler = assembler_for(&dir);
    assembler.begin_section(PageNumbering::default()).unwrap();
    assembler.push_block(&ContentBlock::paragraph("retry me")).unwrap();

    let unreachable = dir.join("no_such_dir").join("out.docx");
    let err = assembler.finalize(&unreachable, OutputFormat::Docx).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(assembler.state(), BuildState::SectionActive(0));

    let output = dir.join("out.docx");
    assembler.finalize(&output, OutputFormat::Docx).unwrap();
    assert_eq!(assembler.state(), BuildState::Finalized);
    assert!(output.is_file());
}

#[test]
fn write_errors_are_classified() {
    let path = Path::new("thesis.docx");

    let locked = classify_write_error(io::Error::from(io::ErrorKind::PermissionDenied), path);
    assert!(matches!(&locked, Error::OutputLocked(p) if p == path));
    assert!(locked.is_recoverable());
    assert!(locked.to_string().contains("close it and try again"));

    let other = classify_write_error(io::Error::from(io::ErrorKind::NotFound), path);
    assert!(matches!(other, Error::Io(_)));
    assert!(!other.is_recoverable());
}

#[test]
fn output_format_follows_extension() {
    assert_eq!(OutputFormat::from_path(Path::new("a/b.PDF")), Some(OutputFormat::Pdf));
    assert_eq!(OutputFormat::from_path(Path::new("thesis.docx")), Some(OutputFormat::Docx));
    assert_eq!(OutputFormat::from_path(Path::new("notes.txt")), None);
}

#[test]
fn demo_proposal_builds_with_placeholders() {
    let dir = output_dir("demo_proposal");
    let plan = ContentPlan::from_file(Path::new("demos/proposal.xml")).unwrap();
    let assets = AssetResolver::new("demos");

    for format in [OutputFormat::Docx, OutputFormat::Pdf] {
        let output = dir.join(format!("proposal.{}", format.extension()));
        let report = quire::build(&plan, &assets, &output, format).unwrap();

        let kinds: Vec<_> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, [WarningKind::Missing, WarningKind::Missing]);
        assert!(output.is_file());
    }
}
