//! Phase D: rendering and delivery
//!
//! Drives the full compile pipeline and hands the composed HTML to the
//! host's PDF collaborator. Export never surfaces renderer internals to the
//! caller; failures collapse to a single user-facing message while the
//! detail goes to the log.

use crate::html::{compose_history_html, compose_inspection_html};
use crate::materialise::{materialise_inspection, ReportModel, DEFAULT_BRAND_NAME};
use crate::{ReportError, ReportResult, EXPORT_FAILED_MESSAGE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ps_core::model::{new_id, Inspection, InspectionType, Property, TeamBranding};
use tracing::{error, info};

const PDF_MIME: &str = "application/pdf";
/// Address slugs are capped so filenames stay legible on every platform.
const SLUG_MAX_LEN: usize = 30;

/// Host collaborator that turns an HTML document into a PDF file.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Renders `html` to a PDF and returns the URI of the written file.
    async fn render_html_to_file(&self, html: &str, options: &RenderOptions)
        -> ReportResult<String>;
}

/// Host collaborator for delivering a finished report.
#[async_trait]
pub trait ShareSink: Send + Sync {
    async fn share(&self, uri: &str, mime: &str, dialog_title: &str) -> ReportResult<()>;
    /// Sends HTML straight to the platform print dialog, bypassing the file
    /// system.
    async fn print(&self, html: &str) -> ReportResult<()>;
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub file_name: String,
}

/// Composed document, ready for rendering.
#[derive(Debug, Clone)]
pub struct CompiledReport {
    pub html: String,
    pub file_name: String,
    pub report_id: String,
}

/// A rendered PDF on disk.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub uri: String,
    pub file_name: String,
}

/// Flattened result for callers that present rather than propagate. `error`
/// is always the generic export message, never renderer detail.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub success: bool,
    pub uri: Option<String>,
    pub error: Option<String>,
}

impl ReportOutcome {
    fn ok(report: GeneratedReport) -> Self {
        ReportOutcome {
            success: true,
            uri: Some(report.uri),
            error: None,
        }
    }

    fn failed() -> Self {
        ReportOutcome {
            success: false,
            uri: None,
            error: Some(EXPORT_FAILED_MESSAGE.to_string()),
        }
    }
}

/// `{Company}_{Type}_{address-slug}_{YYYY-MM-DD}.pdf`
pub fn inspection_file_name(
    branding: Option<&TeamBranding>,
    inspection_type: InspectionType,
    address: &str,
    date: DateTime<Utc>,
) -> String {
    let brand = branding
        .map(|b| slugify(&b.company_name, SLUG_MAX_LEN))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_BRAND_NAME.to_string());
    format!(
        "{}_{}_{}_{}.pdf",
        brand,
        inspection_type,
        slugify(address, SLUG_MAX_LEN),
        date.format("%Y-%m-%d")
    )
}

/// `{address-slug}_Inspection_History_{YYYY-MM-DD}.pdf`
pub fn history_file_name(address: &str, date: DateTime<Utc>) -> String {
    format!(
        "{}_Inspection_History_{}.pdf",
        slugify(address, SLUG_MAX_LEN),
        date.format("%Y-%m-%d")
    )
}

/// Keeps alphanumerics, collapses everything else into single hyphens, and
/// truncates without leaving a trailing hyphen.
fn slugify(raw: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(max_len);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Orchestrates materialise, compose, render, deliver.
pub struct ReportCompiler<R> {
    renderer: R,
}

impl<R: PdfRenderer> ReportCompiler<R> {
    pub fn new(renderer: R) -> Self {
        ReportCompiler { renderer }
    }

    /// Materialises and composes one inspection without rendering it. The
    /// identifier and generation timestamp are fixed here so the same
    /// compiled report can be rendered and printed consistently.
    pub async fn compile_inspection(
        &self,
        property: &Property,
        inspection: &Inspection,
        branding: Option<&TeamBranding>,
    ) -> CompiledReport {
        let model = materialise_inspection(property, inspection, branding).await;
        let report_id = new_id();
        let generated_at = Utc::now();
        let html = compose_inspection_html(&model, generated_at, &report_id);
        let file_name = inspection_file_name(
            branding,
            inspection.inspection_type,
            &property.address,
            generated_at,
        );
        CompiledReport {
            html,
            file_name,
            report_id,
        }
    }

    /// Compiles every inspection of the property, oldest first, into one
    /// document.
    pub async fn compile_history(
        &self,
        property: &Property,
        branding: Option<&TeamBranding>,
    ) -> ReportResult<CompiledReport> {
        if property.inspections.is_empty() {
            return Err(ReportError::EmptyHistory);
        }

        let mut inspections: Vec<&Inspection> = property.inspections.iter().collect();
        inspections.sort_by_key(|i| i.created_at);

        let mut models: Vec<ReportModel> = Vec::with_capacity(inspections.len());
        for inspection in inspections {
            models.push(materialise_inspection(property, inspection, branding).await);
        }

        let report_id = new_id();
        let generated_at = Utc::now();
        let html = compose_history_html(&models, generated_at, &report_id);
        let file_name = history_file_name(&property.address, generated_at);
        Ok(CompiledReport {
            html,
            file_name,
            report_id,
        })
    }

    /// Renders a compiled report to a PDF file.
    pub async fn render(&self, compiled: &CompiledReport) -> ReportResult<GeneratedReport> {
        let options = RenderOptions {
            file_name: compiled.file_name.clone(),
        };
        let uri = self
            .renderer
            .render_html_to_file(&compiled.html, &options)
            .await?;
        info!(report_id = %compiled.report_id, file_name = %compiled.file_name, "report rendered");
        Ok(GeneratedReport {
            uri,
            file_name: compiled.file_name.clone(),
        })
    }

    /// Compile-and-render for one inspection.
    pub async fn export_inspection(
        &self,
        property: &Property,
        inspection: &Inspection,
        branding: Option<&TeamBranding>,
    ) -> ReportResult<GeneratedReport> {
        let compiled = self.compile_inspection(property, inspection, branding).await;
        self.render(&compiled).await
    }

    /// Compile-and-render for the whole inspection history.
    pub async fn export_history(
        &self,
        property: &Property,
        branding: Option<&TeamBranding>,
    ) -> ReportResult<GeneratedReport> {
        let compiled = self.compile_history(property, branding).await?;
        self.render(&compiled).await
    }

    /// Export and share in one step. Never returns an error; failures are
    /// logged and reported through the outcome.
    pub async fn export_and_share(
        &self,
        property: &Property,
        inspection: &Inspection,
        branding: Option<&TeamBranding>,
        sink: &dyn ShareSink,
    ) -> ReportOutcome {
        let report = match self.export_inspection(property, inspection, branding).await {
            Ok(report) => report,
            Err(err) => {
                error!(inspection_id = %inspection.id, %err, "report export failed");
                return ReportOutcome::failed();
            }
        };

        let dialog_title = format!("Share {}", report.file_name);
        if let Err(err) = sink.share(&report.uri, PDF_MIME, &dialog_title).await {
            error!(inspection_id = %inspection.id, %err, "report share failed");
            return ReportOutcome::failed();
        }

        ReportOutcome::ok(report)
    }

    /// Sends the composed HTML directly to the print dialog. No PDF file is
    /// produced.
    pub async fn print_inspection(
        &self,
        property: &Property,
        inspection: &Inspection,
        branding: Option<&TeamBranding>,
        sink: &dyn ShareSink,
    ) -> ReportResult<()> {
        let compiled = self.compile_inspection(property, inspection, branding).await;
        sink.print(&compiled.html).await
    }
}
