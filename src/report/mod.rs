// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Report assembly for exported analyses
//!
//! An export joins an analysis record with its catalog entry. Rendering is left
//! to the callers: JSON through serde, documents through [`pdf::render_pdf`].

pub mod pdf;

use serde::Serialize;

use crate::db::{AnalysisRecord, Database, DiseaseInfo};
use crate::{DermaError, Result};

pub use pdf::render_pdf;

/// Title shared by every rendered report
pub const REPORT_TITLE: &str = "Skin Disease Analysis Report";

/// An analysis together with the catalog entry for its class, if any
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisExport {
    pub analysis: AnalysisRecord,
    pub disease_info: Option<DiseaseInfo>,
}

/// One element of a report, in reading order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportBlock {
    Title(String),
    Heading(String),
    Paragraph(String),
}

/// Fetch an analysis and join it with its catalog entry.
///
/// A missing catalog entry is not an error; the label may simply have drifted
/// from the catalog.
pub fn build_export(db: &Database, id: &str) -> Result<AnalysisExport> {
    let analysis = db
        .get_analysis(id)?
        .ok_or_else(|| DermaError::NotFound(id.to_string()))?;

    let disease_info = db.lookup_disease(&analysis.disease_class)?;
    if disease_info.is_none() {
        tracing::debug!("No catalog entry for class {:?}", analysis.disease_class);
    }

    Ok(AnalysisExport { analysis, disease_info })
}

impl AnalysisExport {
    pub fn title(&self) -> &'static str {
        REPORT_TITLE
    }

    /// Suggested download name for a rendered document
    pub fn file_name(&self, extension: &str) -> String {
        format!("skin_analysis_{}.{}", self.analysis.id, extension)
    }

    /// Semantic content of the report, independent of output format
    pub fn blocks(&self) -> Vec<ReportBlock> {
        let mut blocks = vec![
            ReportBlock::Title(self.title().to_string()),
            ReportBlock::Paragraph(format!("Analysis ID: {}", self.analysis.id)),
            ReportBlock::Paragraph(format!("Disease Class: {}", self.analysis.disease_class)),
            ReportBlock::Paragraph(format!("Confidence: {:.2}%", self.analysis.confidence)),
            ReportBlock::Paragraph(format!(
                "Date: {}",
                self.analysis.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            )),
        ];

        if let Some(info) = &self.disease_info {
            blocks.push(ReportBlock::Heading("Disease Information".to_string()));
            blocks.push(ReportBlock::Paragraph(format!("Description: {}", info.description)));
            blocks.push(ReportBlock::Paragraph(format!("Symptoms: {}", info.symptoms)));
            blocks.push(ReportBlock::Paragraph(format!("Treatments: {}", info.treatments)));
            blocks.push(ReportBlock::Paragraph(format!("Prevention: {}", info.prevention)));
        }

        blocks
    }
}
