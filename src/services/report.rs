// src/services/report.rs

//! Per-student reports: plain text, PDF and Excel renditions.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use rust_xlsxwriter::{Format, Workbook};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{student::Student, test_record::TestRecordDetail},
    services::{records, students},
    utils::files::report_file_name,
};

/// Text returned in place of a report for a student without records.
pub const NO_RECORDS_TEXT: &str = "该学生暂无检测记录";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// A4 portrait, 12pt text on 15pt lines.
const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN_MM: f32 = 17.6;
const FONT_SIZE: f32 = 12.0;
const LINE_HEIGHT_MM: f32 = 15.0 * 0.3528;

/// A student together with all of its records, oldest first.
#[derive(Debug, Clone)]
pub struct StudentReport {
    pub student: Student,
    pub records: Vec<TestRecordDetail>,
}

/// Output format of a downloadable report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Pdf,
    Excel,
}

impl ReportFormat {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "pdf" => Ok(ReportFormat::Pdf),
            "excel" => Ok(ReportFormat::Excel),
            other => Err(AppError::BadRequest(format!(
                "不支持的报告格式 '{}'，可选值: pdf, excel",
                other
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// Loads the report data, or `None` for an unknown student.
pub async fn load(pool: &SqlitePool, student_id: &str) -> Result<Option<StudentReport>, sqlx::Error> {
    let Some(student) = students::find_by_student_id(pool, student_id).await? else {
        return Ok(None);
    };

    let mut records = records::details_for_student(pool, student.id).await?;
    records.reverse();

    Ok(Some(StudentReport { student, records }))
}

/// `{REPORT_DIR}/{safe_name}_{student_id}.{ext}`
pub fn report_path(dir: &Path, student: &Student, format: ReportFormat) -> PathBuf {
    dir.join(report_file_name(
        Some(&student.name),
        &student.student_id,
        format.extension(),
    ))
}

impl StudentReport {
    /// Plain text report: a header block, then one section per record.
    pub fn render_text(&self, generated_at: NaiveDateTime) -> String {
        if self.records.is_empty() {
            return NO_RECORDS_TEXT.to_string();
        }

        let mut lines = vec![
            "=== 学生检测报告 ===".to_string(),
            format!("学生姓名: {}", self.student.name),
            format!("学号: {}", self.student.student_id),
            format!("班级: {}", self.student.class_name),
            format!("生成时间: {}", generated_at.format(TIME_FORMAT)),
            String::new(),
        ];

        for (idx, record) in self.records.iter().enumerate() {
            lines.push(format!("--- 检测记录 {} ---", idx + 1));
            lines.push(format!("检测时间: {}", record.test_time.format(TIME_FORMAT)));
            lines.push(format!(
                "AI评估总结: {}",
                record.ai_summary.as_deref().unwrap_or("无")
            ));
            lines.push(format!("是否异常: {}", yes_no(record.is_abnormal)));

            if !record.scores.is_empty() {
                lines.push("问卷得分:".to_string());
                lines.extend(
                    record
                        .scores
                        .iter()
                        .map(|s| format!("- {}: {}", s.module_name, s.score)),
                );
            }

            if !record.physiological_data.is_empty() {
                lines.push("生理数据:".to_string());
                lines.extend(
                    record
                        .physiological_data
                        .iter()
                        .map(|d| format!("- {}: {}", d.data_key, d.data_value)),
                );
            }

            lines.push(String::new());
        }

        lines.join("\n")
    }

    /// One row per score or physiological reading, repeating the record
    /// columns.
    pub fn write_excel(&self, path: &Path) -> Result<(), AppError> {
        if self.records.is_empty() {
            return Err(AppError::NotFound(NO_RECORDS_TEXT.to_string()));
        }

        let mut workbook = Workbook::new();
        let header_fmt = Format::new().set_bold();
        let sheet = workbook.add_worksheet();
        sheet.set_name("检测报告")?;

        let headers = [
            "学生姓名", "学号", "班级", "检测时间", "AI总结", "是否异常", "数据类型", "项目名称", "数值",
        ];
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &header_fmt)?;
        }

        let mut row: u32 = 1;
        for record in &self.records {
            let items = record
                .scores
                .iter()
                .map(|s| ("问卷得分", s.module_name.as_str(), s.score as f64))
                .chain(
                    record
                        .physiological_data
                        .iter()
                        .map(|d| ("生理数据", d.data_key.as_str(), d.data_value)),
                );

            for (kind, item_name, value) in items {
                sheet.write_string(row, 0, &self.student.name)?;
                sheet.write_string(row, 1, &self.student.student_id)?;
                sheet.write_string(row, 2, &self.student.class_name)?;
                sheet.write_string(row, 3, record.test_time.format(TIME_FORMAT).to_string())?;
                sheet.write_string(row, 4, record.ai_summary.as_deref().unwrap_or("无"))?;
                sheet.write_string(row, 5, yes_no(record.is_abnormal))?;
                sheet.write_string(row, 6, kind)?;
                sheet.write_string(row, 7, item_name)?;
                sheet.write_number(row, 8, value)?;
                row += 1;
            }
        }

        sheet.set_column_width(4, 40)?;
        workbook.save(path)?;
        Ok(())
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "是" } else { "否" }
}

fn pdf_error(e: printpdf::Error) -> AppError {
    AppError::InternalServerError(format!("PDF generation failed: {}", e))
}

fn load_font(doc: &PdfDocumentReference, font_path: Option<&Path>) -> Result<IndirectFontRef, AppError> {
    if let Some(path) = font_path {
        match File::open(path) {
            Ok(file) => return doc.add_external_font(file).map_err(pdf_error),
            Err(e) => tracing::warn!(
                "Report font {} unavailable, falling back to Helvetica: {}",
                path.display(),
                e
            ),
        }
    }

    doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)
}

/// Lays the text out line by line, starting a new page when the bottom
/// margin is reached.
pub fn write_pdf(content: &str, title: &str, font_path: Option<&Path>, path: &Path) -> Result<(), AppError> {
    let (doc, first_page, first_layer) = PdfDocument::new(title, PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
    let font = load_font(&doc, font_path)?;

    let top = PAGE_HEIGHT.0 - MARGIN_MM;
    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    let mut y = top;

    for line in content.lines() {
        if y < MARGIN_MM {
            let (page, page_layer) = doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
            layer = doc.get_page(page).get_layer(page_layer);
            y = top;
        }
        layer.use_text(line, FONT_SIZE, Mm(MARGIN_MM), Mm(y), &font);
        y -= LINE_HEIGHT_MM;
    }

    let file = File::create(path)?;
    doc.save(&mut BufWriter::new(file)).map_err(pdf_error)?;
    Ok(())
}

/// Renders the report into the report directory and returns the file path.
/// Runs on a blocking thread.
pub fn render_to_file(
    report: &StudentReport,
    format: ReportFormat,
    report_dir: &Path,
    font_path: Option<&Path>,
) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(report_dir)?;
    let path = report_path(report_dir, &report.student, format);

    match format {
        ReportFormat::Pdf => {
            let content = report.render_text(Local::now().naive_local());
            let title = format!("{} 检测报告", report.student.name);
            write_pdf(&content, &title, font_path, &path)?;
        }
        ReportFormat::Excel => report.write_excel(&path)?,
    }

    tracing::info!("Report written to {}", path.display());
    Ok(path)
}
