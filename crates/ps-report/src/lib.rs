//! Inspection Report Compiler
//!
//! Renders an inspection (or a property's full inspection history) into a
//! deterministic, paginated PDF. Compilation runs in four phases:
//! materialise (read photos and signatures into data URIs), tier selection,
//! HTML composition, and rendering through the host's PDF collaborator.
//! Same inputs produce byte-identical HTML modulo the generated-at timestamp
//! and the report identifier.

pub mod compiler;
pub mod html;
pub mod materialise;

pub use compiler::{
    history_file_name, inspection_file_name, CompiledReport, GeneratedReport, PdfRenderer,
    RenderOptions, ReportCompiler, ReportOutcome, ShareSink,
};
pub use materialise::{
    materialise_inspection, CheckpointCard, ReportModel, RoomSection, SignaturePanel,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF render failed: {0}")]
    Render(String),

    #[error("share failed: {0}")]
    Share(String),

    #[error("print failed: {0}")]
    Print(String),

    #[error("a history report needs at least one inspection")]
    EmptyHistory,
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Short user-facing message for export failures. Never carries internals.
pub const EXPORT_FAILED_MESSAGE: &str =
    "Export Failed. Unable to generate the PDF report. Please try again.";
