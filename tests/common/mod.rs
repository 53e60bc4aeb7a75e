#![allow(dead_code)]

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb};
use quire::{ContentBlock, ContentPlan, NumberFormat, PageNumbering, StyleSet};

/// A fresh directory under `tests/output/` for one test.
pub fn output_dir(name: &str) -> PathBuf {
    let dir = Path::new("tests/output").join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create output dir");
    dir
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    let path = dir.join(name);
    img.save(&path).expect("write png fixture");
    path
}

pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(width, height, |x, _| Rgb([(x % 256) as u8, 90, 200]));
    let path = dir.join(name);
    img.save(&path).expect("write jpeg fixture");
    path
}

/// A file with an image extension whose bytes are not an image.
pub fn write_corrupt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"this is not image data at all").expect("write corrupt fixture");
    path
}

/// Front matter in roman numerals, then a body restarting at 1.
pub fn two_section_plan(body: Vec<ContentBlock>) -> ContentPlan {
    ContentPlan::new(StyleSet::academic())
        .section(
            PageNumbering::new(NumberFormat::LowerRoman).restart_at(1),
            vec![
                ContentBlock::heading(0, "A Study of Things"),
                ContentBlock::paragraph("Submitted in partial fulfilment of the requirements."),
            ],
        )
        .section(PageNumbering::new(NumberFormat::Decimal).restart_at(1), body)
}

pub fn read_zip_entry(docx: &Path, name: &str) -> String {
    let file = fs::File::open(docx).expect("open docx");
    let mut archive = zip::ZipArchive::new(file).expect("read zip");
    let mut entry = archive.by_name(name).unwrap_or_else(|_| panic!("missing part {name}"));
    let mut xml = String::new();
    entry.read_to_string(&mut xml).expect("read part");
    xml
}

pub fn zip_entry_names(docx: &Path) -> Vec<String> {
    let file = fs::File::open(docx).expect("open docx");
    let archive = zip::ZipArchive::new(file).expect("read zip");
    archive.file_names().map(String::from).collect()
}
