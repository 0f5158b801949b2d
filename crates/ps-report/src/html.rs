//! Phase C: HTML composition
//!
//! Pure functions from the materialised model to a single HTML document.
//! Nothing here reads files or consults shared state, so identical models
//! compose to identical bytes. All glyphs are plain ASCII: PDF renderers
//! cannot be trusted with emoji fonts.

use crate::materialise::{CheckpointCard, ReportModel, RoomSection, SignaturePanel};
use chrono::{DateTime, NaiveDateTime, Utc};
use ps_core::model::{InspectionStatus, InspectionType};
use ps_photo::VerificationTier;

/// Watermark and signature timestamp format, e.g. `15 Mar 2024, 10:20`.
const TIMESTAMP_FORMAT: &str = "%d %b %Y, %H:%M";
/// Date-only format for covers and tables of contents.
const DATE_FORMAT: &str = "%d %b %Y";

const LEGAL_NOTICE: &str = "This report is a record of the property's condition at the time of \
inspection. Each photograph carries a content fingerprint (SHA-256) computed at capture, together \
with its verification status. Verified photographs were taken through the in-app camera; \
GPS-verified photographs were additionally confirmed to have been taken at the property.";

const LEGAL_DISCLAIMER: &str = "This document was generated from inspection data recorded on the \
inspector's device. Timestamps reflect the capturing device's clock unless EXIF metadata was \
available. Signatures are images supplied by the signing parties. This report should be retained \
by both parties for the duration of the tenancy.";

/// Compose the full HTML document for one inspection.
pub fn compose_inspection_html(
    model: &ReportModel,
    generated_at: DateTime<Utc>,
    report_id: &str,
) -> String {
    let title = format!("{} Inspection Report", model.inspection_type);
    let mut body = String::new();
    inspection_body(model, &title, &mut body);
    push_footer(&mut body, report_id, generated_at);
    document(&title, &body)
}

/// Compose the multi-inspection history document. Inspections render in the
/// order given (callers pass them chronologically), each behind a forced
/// page break.
pub fn compose_history_html(
    models: &[ReportModel],
    generated_at: DateTime<Utc>,
    report_id: &str,
) -> String {
    let title = "Inspection History Report".to_string();
    let mut body = String::new();
    push_history_preface(models, &mut body);

    for model in models {
        body.push_str("<div class=\"page-break\"></div>\n");
        let section_title = format!("{} Inspection", model.inspection_type);
        inspection_body(model, &section_title, &mut body);
    }

    push_footer(&mut body, report_id, generated_at);
    document(&title, &body)
}

pub fn format_watermark_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

fn inspection_body(model: &ReportModel, title: &str, out: &mut String) {
    push_cover(model, title, out);
    for room in &model.rooms {
        push_room(room, &model.property.address, out);
    }
    push_signatures(model, out);
    out.push_str("<section class=\"legal\">\n");
    out.push_str(&format!("  <p>{}</p>\n", LEGAL_DISCLAIMER));
    out.push_str("</section>\n");
}

fn push_cover(model: &ReportModel, title: &str, out: &mut String) {
    out.push_str("<section class=\"cover\">\n");

    match &model.brand_logo {
        Some(logo) => out.push_str(&format!(
            "  <img class=\"brand-logo\" src=\"{logo}\" alt=\"{}\"/>\n",
            escape_html(&model.brand_name)
        )),
        None => out.push_str(&format!(
            "  <div class=\"brand-name\">{}</div>\n",
            escape_html(&model.brand_name)
        )),
    }

    out.push_str(&format!("  <h1>{}</h1>\n", escape_html(title)));

    if let Some(cover) = &model.cover_photo {
        out.push_str(&format!(
            "  <img class=\"cover-photo\" src=\"{cover}\" alt=\"Property\"/>\n"
        ));
    }

    out.push_str("  <table class=\"summary\">\n");
    push_summary_row(out, "Address", &model.property.address);
    push_summary_row(out, "Property type", &model.property.property_type.to_string());
    push_summary_row(out, "Bedrooms", &model.property.bedrooms.to_string());
    push_summary_row(out, "Bathrooms", &model.property.bathrooms.to_string());
    if let Some(tenant) = &model.property.tenant {
        push_summary_row(out, "Tenant", &tenant.name);
    }
    push_summary_row(
        out,
        "Inspection date",
        &model.created_at.format(DATE_FORMAT).to_string(),
    );
    if let Some(completed) = model.completed_at {
        push_summary_row(out, "Completed", &completed.format(DATE_FORMAT).to_string());
    }
    push_summary_row(out, "Status", &model.status.to_string());
    out.push_str("  </table>\n");

    out.push_str(&format!("  <p class=\"legal-notice\">{}</p>\n", LEGAL_NOTICE));
    out.push_str("</section>\n");
}

fn push_summary_row(out: &mut String, label: &str, value: &str) {
    out.push_str(&format!(
        "    <tr><th>{}</th><td>{}</td></tr>\n",
        escape_html(label),
        escape_html(value)
    ));
}

fn push_room(room: &RoomSection, address: &str, out: &mut String) {
    let suffix = if room.inspected { "" } else { " (Not Inspected)" };
    out.push_str("<section class=\"room\">\n");
    out.push_str(&format!(
        "  <h2>{}{}</h2>\n",
        escape_html(&room.name),
        suffix
    ));
    out.push_str("  <div class=\"card-grid\">\n");
    for (index, card) in room.checkpoints.iter().enumerate() {
        push_card(card, index + 1, address, out);
    }
    out.push_str("  </div>\n");
    out.push_str("</section>\n");
}

fn push_card(card: &CheckpointCard, number: usize, address: &str, out: &mut String) {
    out.push_str("    <div class=\"card\">\n");
    out.push_str(&format!(
        "      <h3>Photo {number}: {}</h3>\n",
        escape_html(&card.title)
    ));

    match &card.photo {
        Some(photo) => {
            out.push_str("      <div class=\"photo-frame\">\n");
            out.push_str(&format!("        <img src=\"{photo}\" alt=\"Checkpoint\"/>\n"));
            push_watermark(address, card, out);
            out.push_str("      </div>\n");
        }
        None => out.push_str("      <div class=\"photo-placeholder\">No photo provided</div>\n"),
    }

    out.push_str(&format!(
        "      <span class=\"badge {}\">{}</span>\n",
        tier_class(card.tier),
        card.tier.label()
    ));

    if let Some(condition) = card.condition {
        out.push_str(&format!(
            "      <p class=\"condition\">{} {}</p>\n",
            condition.glyph(),
            condition.label()
        ));
    }

    if let Some(notes) = &card.notes {
        out.push_str(&format!(
            "      <p class=\"notes\">{}</p>\n",
            escape_html(notes)
        ));
    }

    out.push_str("    </div>\n");
}

fn push_watermark(address: &str, card: &CheckpointCard, out: &mut String) {
    out.push_str("        <div class=\"watermark\">\n");
    out.push_str(&format!(
        "          <span>{}</span>\n",
        escape_html(address)
    ));
    out.push_str(&format!("          <span>{}</span>\n", card.tier.label()));
    if let Some(timestamp) = &card.timestamp {
        out.push_str(&format!(
            "          <span>{}</span>\n",
            format_watermark_timestamp(timestamp)
        ));
    }
    out.push_str("        </div>\n");
}

fn push_signatures(model: &ReportModel, out: &mut String) {
    out.push_str("<section class=\"signatures\">\n");
    out.push_str("  <h2>Signatures</h2>\n");
    push_signature_panel("Landlord", model.landlord_signature.as_ref(), out);
    push_signature_panel("Tenant", model.tenant_signature.as_ref(), out);
    out.push_str("</section>\n");
}

fn push_signature_panel(party: &str, panel: Option<&SignaturePanel>, out: &mut String) {
    out.push_str("  <div class=\"signature\">\n");
    out.push_str(&format!("    <h3>{party}</h3>\n"));
    match panel {
        Some(panel) => {
            match &panel.image {
                Some(image) => out.push_str(&format!(
                    "    <img class=\"signature-image\" src=\"{image}\" alt=\"Signature\"/>\n"
                )),
                None => out
                    .push_str("    <div class=\"signature-placeholder\">Signature unavailable</div>\n"),
            }
            out.push_str(&format!(
                "    <p>{}</p>\n",
                escape_html(&panel.printed_name)
            ));
            out.push_str(&format!(
                "    <p class=\"signed-at\">Signed {}</p>\n",
                panel.signed_at.format(TIMESTAMP_FORMAT)
            ));
        }
        None => out.push_str("    <div class=\"signature-placeholder\">Not signed</div>\n"),
    }
    out.push_str("  </div>\n");
}

fn push_history_preface(models: &[ReportModel], out: &mut String) {
    out.push_str("<section class=\"cover\">\n");

    if let Some(first) = models.first() {
        match &first.brand_logo {
            Some(logo) => out.push_str(&format!(
                "  <img class=\"brand-logo\" src=\"{logo}\" alt=\"{}\"/>\n",
                escape_html(&first.brand_name)
            )),
            None => out.push_str(&format!(
                "  <div class=\"brand-name\">{}</div>\n",
                escape_html(&first.brand_name)
            )),
        }
        out.push_str("  <h1>Inspection History</h1>\n");
        out.push_str(&format!(
            "  <p class=\"address\">{}</p>\n",
            escape_html(&first.property.address)
        ));
    }

    out.push_str("  <table class=\"summary\">\n");
    push_summary_row(out, "Inspections", &models.len().to_string());
    for kind in [
        InspectionType::MoveIn,
        InspectionType::MoveOut,
        InspectionType::Routine,
    ] {
        let count = models.iter().filter(|m| m.inspection_type == kind).count();
        if count > 0 {
            push_summary_row(out, &kind.to_string(), &count.to_string());
        }
    }
    for status in [
        InspectionStatus::Pending,
        InspectionStatus::Completed,
        InspectionStatus::Archived,
    ] {
        let count = models.iter().filter(|m| m.status == status).count();
        if count > 0 {
            push_summary_row(out, &status.to_string(), &count.to_string());
        }
    }
    if let (Some(first), Some(last)) = (models.first(), models.last()) {
        push_summary_row(
            out,
            "Period",
            &format!(
                "{} to {}",
                first.created_at.format(DATE_FORMAT),
                last.created_at.format(DATE_FORMAT)
            ),
        );
    }
    out.push_str("  </table>\n");

    out.push_str("  <ol class=\"toc\">\n");
    for model in models {
        out.push_str(&format!(
            "    <li>{} Inspection, {}</li>\n",
            model.inspection_type,
            model.created_at.format(DATE_FORMAT)
        ));
    }
    out.push_str("  </ol>\n");
    out.push_str("</section>\n");
}

fn push_footer(out: &mut String, report_id: &str, generated_at: DateTime<Utc>) {
    out.push_str(&format!(
        "<footer>Report ID: {} | Generated at {} UTC</footer>\n",
        escape_html(report_id),
        generated_at.format(TIMESTAMP_FORMAT)
    ));
}

fn tier_class(tier: VerificationTier) -> &'static str {
    match tier {
        VerificationTier::VerifiedGps => "badge-verified-gps",
        VerificationTier::Verified => "badge-verified",
        VerificationTier::Unverified => "badge-unverified",
    }
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n<title>{}</title>\n<style>\n{}\n</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        STYLE,
        body
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const STYLE: &str = r#"@page { size: A4; margin: 25mm 30mm; }
body { font-family: Helvetica, Arial, sans-serif; font-size: 11pt; color: #1a1a1a; }
.cover { text-align: center; page-break-after: always; }
.brand-name { font-size: 20pt; font-weight: bold; margin-bottom: 8mm; }
.brand-logo { max-height: 30mm; margin-bottom: 8mm; }
.cover-photo { max-width: 120mm; max-height: 80mm; margin: 6mm 0; }
.summary { margin: 6mm auto; border-collapse: collapse; }
.summary th, .summary td { padding: 2mm 4mm; border: 1px solid #cccccc; text-align: left; }
.legal-notice, .legal { font-size: 9pt; color: #555555; }
.room { margin-top: 8mm; }
.room h2 { border-bottom: 1px solid #cccccc; padding-bottom: 2mm; }
.card-grid { display: flex; flex-wrap: wrap; gap: 4mm; }
.card { width: 80mm; page-break-inside: avoid; border: 1px solid #dddddd; padding: 3mm; }
.photo-frame { position: relative; }
.photo-frame img { width: 100%; }
.watermark { position: absolute; bottom: 0; left: 0; right: 0; background: rgba(0,0,0,0.55); color: #ffffff; font-size: 8pt; padding: 1mm 2mm; display: flex; justify-content: space-between; }
.photo-placeholder { border: 1px dashed #aaaaaa; color: #888888; text-align: center; padding: 18mm 0; }
.badge { display: inline-block; font-size: 8pt; font-weight: bold; padding: 1mm 2mm; margin-top: 2mm; }
.badge-verified-gps { background: #dcf5dc; color: #1c6b1c; }
.badge-verified { background: #e2ecf9; color: #174f8a; }
.badge-unverified { background: #f6e3e3; color: #8a1717; }
.condition { font-weight: bold; }
.notes { font-size: 9pt; color: #444444; }
.signatures { margin-top: 10mm; page-break-inside: avoid; }
.signature { display: inline-block; width: 45%; vertical-align: top; margin-right: 4%; }
.signature-image { max-height: 25mm; }
.signature-placeholder { border: 1px dashed #aaaaaa; color: #888888; text-align: center; padding: 8mm 0; }
.signed-at { font-size: 9pt; color: #555555; }
.page-break { page-break-after: always; }
.toc { text-align: left; margin: 6mm auto; display: inline-block; }
footer { margin-top: 10mm; font-size: 8pt; color: #888888; text-align: center; }"#;
