mod common;

use std::fs;

use common::{output_dir, two_section_plan, write_jpeg, write_png};
use quire::{
    AssetResolver, BuildReport, ContentBlock, ContentPlan, MAX_PAGE_START, NumberFormat,
    OutputFormat, PageNumbering, StyleSet,
};

fn build_pdf(name: &str, plan: &ContentPlan) -> (BuildReport, Vec<u8>) {
    let dir = output_dir(name);
    write_png(&dir, "chart.png", 60, 30);
    write_jpeg(&dir, "photo.jpg", 24, 24);
    let output = dir.join(format!("{name}.pdf"));
    let report = quire::build(plan, &AssetResolver::new(&dir), &output, OutputFormat::Pdf)
        .expect("build pdf");
    let bytes = fs::read(&output).expect("read pdf");
    (report, bytes)
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

#[test]
fn front_matter_is_roman_and_body_restarts_at_one() {
    let plan = ContentPlan::new(StyleSet::academic())
        .section(
            PageNumbering::new(NumberFormat::LowerRoman).restart_at(1),
            vec![
                ContentBlock::heading(0, "Title Page"),
                ContentBlock::PageBreak,
                ContentBlock::paragraph("Abstract text."),
            ],
        )
        .section(
            PageNumbering::new(NumberFormat::Decimal).restart_at(1),
            vec![
                ContentBlock::heading(1, "Introduction"),
                ContentBlock::PageBreak,
                ContentBlock::paragraph("More."),
            ],
        )
        .section(PageNumbering::new(NumberFormat::Decimal), vec![ContentBlock::paragraph("Appendix.")]);

    let (report, bytes) = build_pdf("pdf_page_labels", &plan);

    assert_eq!(report.page_labels, ["i", "ii", "1", "2", "3"]);
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(count(&bytes, b"/PageLabels"), 1);
}

#[test]
fn long_text_flows_onto_more_pages() {
    let sentence = "The quick brown fox jumps over the lazy dog while the committee deliberates. ";
    let blocks = (0..40)
        .map(|_| ContentBlock::paragraph(sentence.repeat(6)))
        .collect();
    let (report, _) = build_pdf("pdf_flow", &two_section_plan(blocks));

    let body_labels: Vec<&str> = report.page_labels.iter().skip(1).map(String::as_str).collect();
    assert!(body_labels.len() > 2, "expected several body pages, got {body_labels:?}");
    for (i, label) in body_labels.iter().enumerate() {
        assert_eq!(*label, (i + 1).to_string());
    }
}

#[test]
fn images_are_embedded_and_placeholders_drawn() {
    let plan = two_section_plan(vec![
        ContentBlock::image("chart.png", "Figure 1: chart"),
        ContentBlock::image("photo.jpg", "Figure 2: photo"),
        ContentBlock::image("missing.png", "Figure 3: absent"),
    ]);
    let (report, bytes) = build_pdf("pdf_images", &plan);

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(count(&bytes, b"/Subtype /Image"), 2);
    assert_eq!(count(&bytes, b"/DCTDecode"), 1);
    assert_eq!(count(&bytes, b"[MISSING IMAGE: missing.png]"), 1);
}

#[test]
fn table_of_contents_lists_headings_with_page_labels() {
    let plan = two_section_plan(vec![
        ContentBlock::TableOfContents,
        ContentBlock::PageBreak,
        ContentBlock::heading(1, "Introduction"),
        ContentBlock::paragraph("Opening remarks."),
        ContentBlock::PageBreak,
        ContentBlock::heading(1, "Method"),
    ]);
    let (report, bytes) = build_pdf("pdf_toc", &plan);

    assert_eq!(report.page_labels, ["i", "1", "2", "3"]);
    // once in the contents, once as the heading itself
    assert_eq!(count(&bytes, b"(Introduction)"), 2);
    assert_eq!(count(&bytes, b"(Method)"), 2);
    assert!(count(&bytes, b"(3)") >= 2);
}

#[test]
fn hidden_numbering_draws_no_footer() {
    let plan = ContentPlan::new(StyleSet::academic())
        .section(
            PageNumbering::new(NumberFormat::Decimal).restart_at(70),
            vec![ContentBlock::paragraph("Numbered page.")],
        )
        .section(
            PageNumbering::new(NumberFormat::Decimal).hidden(),
            vec![ContentBlock::paragraph("Unnumbered page.")],
        );
    let (report, bytes) = build_pdf("pdf_hidden_footer", &plan);

    // the hidden page still counts, it just shows nothing
    assert_eq!(report.page_labels, ["70", "71"]);
    assert_eq!(count(&bytes, b"(70)"), 1);
    assert_eq!(count(&bytes, b"(71)"), 0);
}

#[test]
fn largest_start_does_not_overflow() {
    let plan = ContentPlan::new(StyleSet::academic()).section(
        PageNumbering::new(NumberFormat::Decimal).restart_at(MAX_PAGE_START),
        vec![
            ContentBlock::paragraph("Last representable page."),
            ContentBlock::PageBreak,
            ContentBlock::paragraph("One past it."),
        ],
    );
    let (report, bytes) = build_pdf("pdf_large_start", &plan);

    assert_eq!(report.page_labels, ["2147483647", "2147483648"]);
    assert_eq!(count(&bytes, b"/St 2147483647"), 1);
}
