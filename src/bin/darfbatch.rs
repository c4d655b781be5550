//! darfbatch command line interface
//!
//! スプレッドシートの各行からDARFのPDFを生成し、ディレクトリまたはZIPアーカイブに書き出す。

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use darfbatch::{
    BatchBuilder, Dataset, DirectorySink, FailurePolicy, FieldSchema, FillMode, LoadOptions,
    OutputSink, SheetSelector, TemplateDocument, ZipSink,
};

/// コマンドライン引数
#[derive(Parser, Debug)]
#[command(
    name = "darfbatch",
    version,
    about = "Fill one DARF PDF form per spreadsheet row."
)]
#[command(group(ArgGroup::new("output").required(true).args(["out_dir", "zip"])))]
struct Cli {
    /// Spreadsheet (xlsx, xls, ods) or CSV file with one payment per row
    #[arg(long)]
    data: PathBuf,

    /// AcroForm PDF template
    #[arg(long)]
    template: PathBuf,

    /// Directory that receives one PDF per row (created if missing)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// ZIP archive that receives one PDF per row
    #[arg(long)]
    zip: Option<PathBuf>,

    /// Sheet to read, by name or zero-based index (default: first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// JSON file mapping spreadsheet columns to form fields
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Bake the values into the page and remove the form fields
    #[arg(long)]
    flatten: bool,

    /// Output file name prefix
    #[arg(long, default_value = "DARF")]
    prefix: String,

    /// Number of rows processed in parallel
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Stop at the first row that fails instead of skipping it
    #[arg(long)]
    abort_on_error: bool,

    /// Write the batch report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn sheet_selector(&self) -> SheetSelector {
        match self.sheet.as_deref() {
            None => SheetSelector::default(),
            Some(value) => value
                .parse::<usize>()
                .map(SheetSelector::Index)
                .unwrap_or_else(|_| SheetSelector::Name(value.to_string())),
        }
    }

    fn run(self) -> Result<bool> {
        let template = TemplateDocument::open(&self.template)
            .with_context(|| format!("loading template {}", self.template.display()))?;
        tracing::info!(fields = template.fields().len(), "template loaded");

        let options = LoadOptions {
            sheet: self.sheet_selector(),
            ..LoadOptions::default()
        };
        let dataset = Dataset::open_with(&self.data, &options)
            .with_context(|| format!("reading data from {}", self.data.display()))?;

        let mut builder = BatchBuilder::new()
            .with_template(template)
            .with_file_prefix(&self.prefix)
            .with_parallelism(self.jobs);
        if let Some(path) = &self.schema {
            let file = File::open(path)
                .with_context(|| format!("opening schema {}", path.display()))?;
            let schema = FieldSchema::from_json_reader(file)
                .with_context(|| format!("parsing schema {}", path.display()))?;
            builder = builder.with_schema(schema);
        }
        if self.flatten {
            builder = builder.with_fill_mode(FillMode::FlattenMerge);
        }
        if self.abort_on_error {
            builder = builder.with_failure_policy(FailurePolicy::AbortBatch);
        }
        let batch = builder.build().context("invalid batch configuration")?;

        let mut sink: Box<dyn OutputSink> = match (&self.out_dir, &self.zip) {
            (Some(dir), _) => Box::new(
                DirectorySink::new(dir)
                    .with_context(|| format!("creating output directory {}", dir.display()))?,
            ),
            (None, Some(path)) => Box::new(
                ZipSink::create(path)
                    .with_context(|| format!("creating archive {}", path.display()))?,
            ),
            (None, None) => anyhow::bail!("either --out-dir or --zip is required"),
        };

        let report = batch.write_to(&dataset, &mut sink)?;

        if let Some(path) = &self.report {
            let file = File::create(path)
                .with_context(|| format!("creating report {}", path.display()))?;
            serde_json::to_writer_pretty(file, &report)
                .with_context(|| format!("writing report {}", path.display()))?;
        }

        eprintln!(
            "{} of {} rows generated, {} failed{}",
            report.generated.len(),
            report.total_rows,
            report.failed.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        for failure in &report.failed {
            eprintln!("  row {}: {}", failure.row_number, failure.message);
        }

        Ok(report.failed.is_empty())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("darfbatch=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_output_is_required() {
        let result = Cli::try_parse_from(["darfbatch", "--data", "a.xlsx", "--template", "t.pdf"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_out_dir_and_zip_conflict() {
        let result = Cli::try_parse_from([
            "darfbatch",
            "--data",
            "a.xlsx",
            "--template",
            "t.pdf",
            "--out-dir",
            "saida",
            "--zip",
            "saida.zip",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sheet_selector() {
        let cli = Cli::try_parse_from([
            "darfbatch",
            "--data",
            "a.xlsx",
            "--template",
            "t.pdf",
            "--zip",
            "out.zip",
            "--sheet",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.sheet_selector(), SheetSelector::Index(2));
        assert_eq!(cli.jobs, 1);
        assert_eq!(cli.prefix, "DARF");

        let cli = Cli::try_parse_from([
            "darfbatch",
            "--data",
            "a.xlsx",
            "--template",
            "t.pdf",
            "--out-dir",
            "saida",
            "--sheet",
            "Planilha1",
        ])
        .unwrap();
        assert_eq!(cli.sheet_selector(), SheetSelector::Name("Planilha1".to_string()));
    }
}
