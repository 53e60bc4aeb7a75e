use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use quire::{AssetResolver, ContentPlan, Error, OutputFormat};

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Docx,
    Pdf,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Docx => OutputFormat::Docx,
            Format::Pdf => OutputFormat::Pdf,
        }
    }
}

#[derive(Parser)]
#[command(name = "quire", about = "Build a DOCX or PDF document from an XML content plan")]
struct Args {
    /// Content plan (XML)
    plan: PathBuf,
    /// Output file (defaults to the plan path with the format's extension)
    output: Option<PathBuf>,
    /// Output format (defaults to the output extension, then the plan, then docx)
    #[arg(long, value_enum)]
    format: Option<Format>,
    /// Directory that image paths are resolved against (defaults to the plan's directory)
    #[arg(long)]
    assets: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if !args.plan.is_file() {
        eprintln!("Error: plan not found: {}", args.plan.display());
        std::process::exit(1);
    }

    let plan = match ContentPlan::from_file(&args.plan) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {}: {e}", args.plan.display());
            std::process::exit(1);
        }
    };

    let format = args
        .format
        .map(OutputFormat::from)
        .or_else(|| args.output.as_deref().and_then(OutputFormat::from_path))
        .or(plan.format)
        .unwrap_or(OutputFormat::Docx);
    let output = args
        .output
        .unwrap_or_else(|| args.plan.with_extension(format.extension()));
    let asset_dir = args
        .assets
        .unwrap_or_else(|| plan_dir(&args.plan).to_path_buf());

    match quire::build(&plan, &AssetResolver::new(asset_dir), &output, format) {
        Ok(report) => {
            for warning in &report.warnings {
                eprintln!("Warning: {warning}");
            }
            let shown = std::path::absolute(&report.output).unwrap_or(report.output);
            println!("{}", shown.display());
        }
        Err(e @ Error::OutputLocked(_)) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn plan_dir(plan: &Path) -> &Path {
    match plan.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}
