// ABOUTME: Report generation for chat logs and analysis results
// ABOUTME: Writes xlsx/csv/json/text files and zip bundles under the export directory
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! # Export
//!
//! File-based report generation. Chat logs export to spreadsheet or CSV;
//! analysis results export to spreadsheet, JSON, or a plain-text report.
//! Requesting more than one format produces a zip bundle. Files are written
//! under the configured export directory with timestamped names and left in
//! place after download.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use rust_xlsxwriter::Workbook;
use serde_json::{json, Value};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::database::{AnalysisRecord, ChatLineRecord};
use crate::errors::{AppError, AppResult};

/// Spreadsheet MIME type
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
/// CSV MIME type
pub const CSV_MIME: &str = "text/csv";
/// JSON MIME type
pub const JSON_MIME: &str = "application/json";
/// Plain text MIME type
pub const TEXT_MIME: &str = "text/plain; charset=utf-8";
/// Zip MIME type
pub const ZIP_MIME: &str = "application/zip";

/// The four personality dimensions, in report order, with display labels
const DIMENSIONS: [(&str, &str); 4] = [
    ("核心特质", "core_traits"),
    ("行为偏好", "behavior_preferences"),
    ("社交互动", "social_interaction"),
    ("认知思维", "cognitive_thinking"),
];

/// Chat log export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatLogFormat {
    /// Spreadsheet
    Xlsx,
    /// Comma-separated values with UTF-8 BOM
    Csv,
}

impl ChatLogFormat {
    /// Parse a format token from the query string; unknown tokens are `None`
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Analysis report export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisFormat {
    /// Multi-sheet spreadsheet
    Xlsx,
    /// Structured JSON report
    Json,
    /// Plain-text report
    Text,
}

impl AnalysisFormat {
    /// Parse a format token from the query string; unknown tokens are `None`
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "xlsx" => Some(Self::Xlsx),
            "json" => Some(Self::Json),
            "text" | "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Section toggles for analysis reports
#[derive(Debug, Clone, Copy)]
pub struct AnalysisSections {
    /// Include the four personality dimensions
    pub personality: bool,
    /// Include interest keywords
    pub interests: bool,
    /// Include the dos-and-donts guide
    pub guide: bool,
}

impl Default for AnalysisSections {
    fn default() -> Self {
        Self {
            personality: true,
            interests: true,
            guide: true,
        }
    }
}

/// A generated export file
#[derive(Debug, Clone)]
pub struct ExportFile {
    /// Path on disk
    pub path: PathBuf,
    /// Download filename
    pub filename: String,
    /// Response content type
    pub content_type: &'static str,
}

// ============================================================================
// Export Manager
// ============================================================================

/// Report file generator
pub struct ExportManager {
    export_dir: PathBuf,
}

impl ExportManager {
    /// Create a manager writing under the given directory
    #[must_use]
    pub const fn new(export_dir: PathBuf) -> Self {
        Self { export_dir }
    }

    /// Export chat lines in the requested formats
    ///
    /// One format produces that file directly; several produce a zip bundle.
    ///
    /// # Errors
    ///
    /// Returns an error when file generation or writing fails.
    pub fn export_chat_lines(
        &self,
        lines: &[ChatLineRecord],
        contact_name: &str,
        formats: &[ChatLogFormat],
        include_analysis_column: bool,
    ) -> AppResult<ExportFile> {
        match formats {
            [] => Err(AppError::invalid_input("No export format requested")),
            [ChatLogFormat::Xlsx] => self.write_file(
                &format!("聊天记录_{contact_name}_{}.xlsx", Self::timestamp()),
                &chat_lines_xlsx_bytes(lines, include_analysis_column)?,
                XLSX_MIME,
            ),
            [ChatLogFormat::Csv] => self.write_file(
                &format!("聊天记录_{contact_name}_{}.csv", Self::timestamp()),
                &chat_lines_csv_bytes(lines)?,
                CSV_MIME,
            ),
            _ => {
                let mut parts = Vec::new();
                if formats.contains(&ChatLogFormat::Xlsx) {
                    parts.push((
                        format!("聊天记录_{contact_name}.xlsx"),
                        chat_lines_xlsx_bytes(lines, include_analysis_column)?,
                    ));
                }
                if formats.contains(&ChatLogFormat::Csv) {
                    parts.push((
                        format!("聊天记录_{contact_name}.csv"),
                        chat_lines_csv_bytes(lines)?,
                    ));
                }
                self.write_file(
                    &format!("聊天记录_{contact_name}_{}.zip", Self::timestamp()),
                    &zip_bytes(&parts)?,
                    ZIP_MIME,
                )
            }
        }
    }

    /// Export an analysis report in the requested formats
    ///
    /// # Errors
    ///
    /// Returns an error when file generation or writing fails.
    pub fn export_analysis(
        &self,
        analysis: &AnalysisRecord,
        contact_name: &str,
        formats: &[AnalysisFormat],
        sections: AnalysisSections,
    ) -> AppResult<ExportFile> {
        match formats {
            [] => Err(AppError::invalid_input("No export format requested")),
            [AnalysisFormat::Xlsx] => self.write_file(
                &format!("分析报告_{contact_name}_{}.xlsx", Self::timestamp()),
                &analysis_xlsx_bytes(analysis, contact_name, sections)?,
                XLSX_MIME,
            ),
            [AnalysisFormat::Json] => self.write_file(
                &format!("分析报告_{contact_name}_{}.json", Self::timestamp()),
                &analysis_json_bytes(analysis, contact_name)?,
                JSON_MIME,
            ),
            [AnalysisFormat::Text] => self.write_file(
                &format!("分析报告_{contact_name}_{}.txt", Self::timestamp()),
                analysis_text_report(analysis, contact_name).as_bytes(),
                TEXT_MIME,
            ),
            _ => {
                let mut parts = Vec::new();
                if formats.contains(&AnalysisFormat::Xlsx) {
                    parts.push((
                        format!("分析报告_{contact_name}.xlsx"),
                        analysis_xlsx_bytes(analysis, contact_name, sections)?,
                    ));
                }
                if formats.contains(&AnalysisFormat::Json) {
                    parts.push((
                        format!("分析报告_{contact_name}.json"),
                        analysis_json_bytes(analysis, contact_name)?,
                    ));
                }
                if formats.contains(&AnalysisFormat::Text) {
                    parts.push((
                        format!("分析报告_{contact_name}.txt"),
                        analysis_text_report(analysis, contact_name).into_bytes(),
                    ));
                }
                self.write_file(
                    &format!("分析报告_{contact_name}_{}.zip", Self::timestamp()),
                    &zip_bytes(&parts)?,
                    ZIP_MIME,
                )
            }
        }
    }

    fn write_file(
        &self,
        filename: &str,
        bytes: &[u8],
        content_type: &'static str,
    ) -> AppResult<ExportFile> {
        fs::create_dir_all(&self.export_dir)
            .map_err(|e| AppError::internal(format!("Failed to create export dir: {e}")))?;

        let path = self.export_dir.join(filename);
        fs::write(&path, bytes)
            .map_err(|e| AppError::internal(format!("Failed to write export file: {e}")))?;

        Ok(ExportFile {
            path,
            filename: filename.to_owned(),
            content_type,
        })
    }

    fn timestamp() -> String {
        chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
    }
}

// ============================================================================
// File Builders
// ============================================================================

/// Parse a stored JSON field, falling back to the raw text when it is not
/// valid JSON (legacy rows)
fn parse_json_field(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

fn xlsx_error(e: rust_xlsxwriter::XlsxError) -> AppError {
    AppError::internal(format!("Failed to build spreadsheet: {e}"))
}

/// Chat log sheet: one row per line with date, speaker, and content columns
fn chat_lines_xlsx_bytes(
    lines: &[ChatLineRecord],
    include_analysis_column: bool,
) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    let mut headers = vec!["日期", "发言者", "内容"];
    if include_analysis_column {
        headers.push("分析备注");
    }
    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string(0, u16::try_from(col).unwrap_or(0), *header)
            .map_err(xlsx_error)?;
    }

    for (row, line) in lines.iter().enumerate() {
        let row = u32::try_from(row + 1).unwrap_or(u32::MAX);
        sheet
            .write_string(row, 0, &line.chat_date)
            .map_err(xlsx_error)?;
        sheet
            .write_string(row, 1, &line.speaker)
            .map_err(xlsx_error)?;
        sheet
            .write_string(row, 2, &line.content)
            .map_err(xlsx_error)?;
        if include_analysis_column {
            sheet.write_string(row, 3, "").map_err(xlsx_error)?;
        }
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

/// CSV with a UTF-8 BOM so spreadsheet apps detect the encoding
fn chat_lines_csv_bytes(lines: &[ChatLineRecord]) -> AppResult<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .write_all("\u{feff}".as_bytes())
        .map_err(|e| AppError::internal(format!("Failed to write CSV: {e}")))?;

    let mut writer = csv::Writer::from_writer(buffer);
    writer
        .write_record(["日期", "发言者", "内容"])
        .map_err(|e| AppError::internal(format!("Failed to write CSV: {e}")))?;

    for line in lines {
        writer
            .write_record([&line.chat_date, &line.speaker, &line.content])
            .map_err(|e| AppError::internal(format!("Failed to write CSV: {e}")))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::internal(format!("Failed to write CSV: {e}")))
}

/// Multi-sheet analysis workbook: summary, interest keywords, personality
/// dimensions, and the dos-and-donts guide
fn analysis_xlsx_bytes(
    analysis: &AnalysisRecord,
    contact_name: &str,
    sections: AnalysisSections,
) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();

    let summary_sheet = workbook.add_worksheet();
    summary_sheet.set_name("摘要").map_err(xlsx_error)?;
    for (col, header) in ["联系人", "分析摘要", "创建时间"].iter().enumerate() {
        summary_sheet
            .write_string(0, u16::try_from(col).unwrap_or(0), *header)
            .map_err(xlsx_error)?;
    }
    summary_sheet
        .write_string(1, 0, contact_name)
        .map_err(xlsx_error)?;
    summary_sheet
        .write_string(1, 1, &analysis.summary)
        .map_err(xlsx_error)?;
    summary_sheet
        .write_string(1, 2, &analysis.created_at)
        .map_err(xlsx_error)?;

    if sections.interests {
        let sheet = workbook.add_worksheet();
        sheet.set_name("兴趣关键词").map_err(xlsx_error)?;
        sheet.write_string(0, 0, "关键词").map_err(xlsx_error)?;
        if let Value::Array(keywords) = parse_json_field(&analysis.interests) {
            for (row, keyword) in keywords.iter().enumerate() {
                let row = u32::try_from(row + 1).unwrap_or(u32::MAX);
                sheet
                    .write_string(row, 0, keyword.as_str().unwrap_or_default())
                    .map_err(xlsx_error)?;
            }
        }
    }

    if sections.personality {
        let sheet = workbook.add_worksheet();
        sheet.set_name("性格特质").map_err(xlsx_error)?;
        for (col, header) in ["维度", "特质", "描述"].iter().enumerate() {
            sheet
                .write_string(0, u16::try_from(col).unwrap_or(0), *header)
                .map_err(xlsx_error)?;
        }

        let mut row = 1u32;
        for (label, field) in DIMENSIONS {
            let value = match field {
                "core_traits" => &analysis.core_traits,
                "behavior_preferences" => &analysis.behavior_preferences,
                "social_interaction" => &analysis.social_interaction,
                _ => &analysis.cognitive_thinking,
            };
            if let Value::Object(traits) = parse_json_field(value) {
                for (key, description) in traits {
                    sheet.write_string(row, 0, label).map_err(xlsx_error)?;
                    sheet.write_string(row, 1, &key).map_err(xlsx_error)?;
                    sheet
                        .write_string(row, 2, &value_to_text(&description))
                        .map_err(xlsx_error)?;
                    row += 1;
                }
            }
        }
    }

    if sections.guide {
        let sheet = workbook.add_worksheet();
        sheet.set_name("相处指南").map_err(xlsx_error)?;
        sheet.write_string(0, 0, "类型").map_err(xlsx_error)?;
        sheet.write_string(0, 1, "事项").map_err(xlsx_error)?;

        let guide = parse_json_field(&analysis.dos_and_donts);
        let mut row = 1u32;
        for (label, key) in [("应该做", "dos"), ("不应该做", "donts")] {
            if let Some(Value::Array(items)) = guide.get(key) {
                for item in items {
                    sheet.write_string(row, 0, label).map_err(xlsx_error)?;
                    sheet
                        .write_string(row, 1, item.as_str().unwrap_or_default())
                        .map_err(xlsx_error)?;
                    row += 1;
                }
            }
        }
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

/// Structured JSON report with parsed fields
fn analysis_json_bytes(analysis: &AnalysisRecord, contact_name: &str) -> AppResult<Vec<u8>> {
    let report = json!({
        "contact_name": contact_name,
        "summary": analysis.summary,
        "interests": parse_json_field(&analysis.interests),
        "core_traits": parse_json_field(&analysis.core_traits),
        "behavior_preferences": parse_json_field(&analysis.behavior_preferences),
        "social_interaction": parse_json_field(&analysis.social_interaction),
        "cognitive_thinking": parse_json_field(&analysis.cognitive_thinking),
        "dos_and_donts": parse_json_field(&analysis.dos_and_donts),
        "created_at": analysis.created_at,
    });

    serde_json::to_vec_pretty(&report)
        .map_err(|e| AppError::serialization(format!("Failed to encode report: {e}")))
}

/// Plain-text report with section dividers
fn analysis_text_report(analysis: &AnalysisRecord, contact_name: &str) -> String {
    let mut report = String::new();

    report.push_str(&format!("分析报告 - {contact_name}\n"));
    report.push_str(&"=".repeat(50));
    report.push_str("\n\n分析摘要\n");
    report.push_str(&"-".repeat(30));
    report.push_str(&format!("\n{}\n", analysis.summary));

    report.push_str("\n兴趣关键词\n");
    report.push_str(&"-".repeat(30));
    report.push('\n');
    if let Value::Array(keywords) = parse_json_field(&analysis.interests) {
        let joined: Vec<&str> = keywords.iter().filter_map(Value::as_str).collect();
        report.push_str(&joined.join(", "));
    }
    report.push('\n');

    report.push_str("\n性格特质\n");
    report.push_str(&"-".repeat(30));
    report.push('\n');
    for (label, field) in DIMENSIONS {
        let value = match field {
            "core_traits" => &analysis.core_traits,
            "behavior_preferences" => &analysis.behavior_preferences,
            "social_interaction" => &analysis.social_interaction,
            _ => &analysis.cognitive_thinking,
        };
        if let Value::Object(traits) = parse_json_field(value) {
            report.push_str(&format!("\n{label}:\n"));
            for (key, description) in traits {
                report.push_str(&format!("  - {key}: {}\n", value_to_text(&description)));
            }
        }
    }

    let guide = parse_json_field(&analysis.dos_and_donts);
    report.push_str("\n相处指南\n");
    report.push_str(&"-".repeat(30));
    report.push_str("\n应该做:\n");
    if let Some(Value::Array(items)) = guide.get("dos") {
        for item in items {
            report.push_str(&format!("  + {}\n", item.as_str().unwrap_or_default()));
        }
    }
    report.push_str("不应该做:\n");
    if let Some(Value::Array(items)) = guide.get("donts") {
        for item in items {
            report.push_str(&format!("  - {}\n", item.as_str().unwrap_or_default()));
        }
    }

    report
}

/// Render a JSON value as display text (strings verbatim, others serialized)
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a deflated zip archive from named parts
fn zip_bytes(parts: &[(String, Vec<u8>)]) -> AppResult<Vec<u8>> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut archive = zip::ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, bytes) in parts {
            archive
                .start_file(name.as_str(), options)
                .map_err(|e| AppError::internal(format!("Failed to build zip: {e}")))?;
            archive
                .write_all(bytes)
                .map_err(|e| AppError::internal(format!("Failed to build zip: {e}")))?;
        }

        archive
            .finish()
            .map_err(|e| AppError::internal(format!("Failed to build zip: {e}")))?;
    }

    Ok(cursor.into_inner())
}
