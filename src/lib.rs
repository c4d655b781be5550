//! darfbatch - Batch filler for DARF tax-payment slips
//!
//! This crate reads a spreadsheet of tax-payment records (XLSX/XLS/ODS or CSV),
//! normalizes every row (pt-BR amounts, flexible dates, CPF/CNPJ identifiers),
//! and writes each row into an AcroForm PDF template, producing one filled
//! (optionally flattened) document per row.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use darfbatch::{BatchBuilder, Dataset, DirectorySink, TemplateDocument};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load the form template and the spreadsheet
//!     let template = TemplateDocument::open("modelos/darf.pdf")?;
//!     let dataset = Dataset::open("planilha_darf.xlsx")?;
//!
//!     // Create a batch with default settings (live fill, DARF schema)
//!     let batch = BatchBuilder::new().with_template(template).build()?;
//!
//!     // One PDF per row, written in row order
//!     let mut sink = DirectorySink::new("saida")?;
//!     let report = batch.write_to(&dataset, &mut sink)?;
//!     println!("{} generated, {} failed", report.generated.len(), report.failed.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Flattened Output in a ZIP Archive
//!
//! ```rust,no_run
//! use darfbatch::{BatchBuilder, Dataset, FailurePolicy, FillMode, TemplateDocument, ZipSink};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let batch = BatchBuilder::new()
//!         .with_template(TemplateDocument::open("modelos/darf.pdf")?)
//!         .with_fill_mode(FillMode::FlattenMerge)  // bake values into the page
//!         .with_failure_policy(FailurePolicy::AbortBatch)
//!         .with_parallelism(4)
//!         .build()?;
//!
//!     let dataset = Dataset::open("planilha_darf.csv")?;
//!     let mut sink = ZipSink::create("darfs.zip")?;
//!     batch.write_to(&dataset, &mut sink)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Streaming Rows
//!
//! ```rust,no_run
//! use darfbatch::{BatchBuilder, Dataset, TemplateDocument};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let batch = BatchBuilder::new()
//!         .with_template(TemplateDocument::open("modelos/darf.pdf")?)
//!         .build()?;
//!     let dataset = Dataset::open("planilha_darf.xlsx")?;
//!
//!     // Documents are produced lazily, one row at a time
//!     for document in batch.run(&dataset)? {
//!         let document = document?;
//!         println!("row {} -> {}", document.row_number, document.name);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod api;
mod builder;
mod error;
mod format;
mod formatter;
mod mapper;
mod naming;
mod output;
mod parser;
mod report;
mod schema;
mod security;
mod template;
mod types;

// 公開API
pub use api::{
    CancellationToken, FailurePolicy, FillMode, NumericPolicy, SheetSelector, TextAlignment,
};
pub use builder::{Batch, BatchBuilder, BatchRun};
pub use error::DarfError;
pub use format::{parse_flexible_date, parse_integer_code, parse_number};
pub use formatter::{format_amount, format_date, format_identifier, format_raw_decimal};
pub use naming::{NamingPolicy, MAX_NAME_BYTES};
pub use output::{DirectorySink, MemorySink, OutputSink, ZipSink};
pub use parser::{InputFormat, LoadOptions};
pub use report::{BatchReport, RowFailure};
pub use schema::{FieldKind, FieldMapping, FieldSchema};
pub use security::SecurityConfig;
pub use template::{
    fill, FieldType, FieldValues, FillOptions, FillValue, FilledDocument, FormField,
    TemplateDocument, Widget,
};
pub use types::{CellValue, Dataset, FieldValue, GeneratedDocument, NormalizedRecord, RawRow};
