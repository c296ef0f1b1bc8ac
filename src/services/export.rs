// src/services/export.rs

//! Excel exports of the roster, the record list and the dashboard.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::{
    error::AppError,
    models::{student::Student, test_record::TestRecordDetail},
    services::dashboard::{DashboardStats, ScoreDistribution},
    utils::files::timestamped_xlsx_name,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which export a file holds; decides the file name prefix.
#[derive(Debug, Clone, Copy)]
pub enum ExportKind {
    Students,
    TestRecords,
    DashboardStats,
}

impl ExportKind {
    fn prefix(self) -> &'static str {
        match self {
            ExportKind::Students => "学生数据",
            ExportKind::TestRecords => "检测记录数据",
            ExportKind::DashboardStats => "仪表板统计数据",
        }
    }

    /// Fresh timestamped path inside the export directory.
    pub fn path_in(self, export_dir: &Path) -> PathBuf {
        export_dir.join(timestamped_xlsx_name(self.prefix()))
    }
}

fn write_header(sheet: &mut Worksheet, headers: &[&str]) -> Result<(), XlsxError> {
    let bold = Format::new().set_bold();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    Ok(())
}

pub fn write_students(students: &[Student], path: &Path) -> Result<(), AppError> {
    if students.is_empty() {
        return Err(AppError::NotFound("没有可导出的学生数据".to_string()));
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    write_header(sheet, &["学号", "姓名", "班级", "性别", "创建时间"])?;

    for (idx, student) in students.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, &student.student_id)?;
        sheet.write_string(row, 1, &student.name)?;
        sheet.write_string(row, 2, &student.class_name)?;
        sheet.write_string(row, 3, &student.gender)?;
        sheet.write_string(row, 4, student.created_at.format(TIME_FORMAT).to_string())?;
    }

    workbook.save(path)?;
    Ok(())
}

/// Fixed record columns followed by one column per score module and per
/// physiological key, in order of first appearance.
pub fn write_test_records(records: &[TestRecordDetail], path: &Path) -> Result<(), AppError> {
    if records.is_empty() {
        return Err(AppError::NotFound("没有可导出的检测记录数据".to_string()));
    }

    let mut extra_columns: Vec<String> = Vec::new();
    for record in records {
        let keys = record
            .scores
            .iter()
            .map(|s| &s.module_name)
            .chain(record.physiological_data.iter().map(|d| &d.data_key));
        for key in keys {
            if !extra_columns.contains(key) {
                extra_columns.push(key.clone());
            }
        }
    }

    let mut headers = vec![
        "记录ID", "学号", "姓名", "班级", "性别", "检测时间", "AI评估总结", "是否异常", "状态",
        "报告文件路径",
    ];
    let fixed = headers.len() as u16;
    headers.extend(extra_columns.iter().map(String::as_str));

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    write_header(sheet, &headers)?;

    for (idx, record) in records.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_number(row, 0, record.id as f64)?;
        sheet.write_string(row, 1, &record.student.student_id)?;
        sheet.write_string(row, 2, &record.student.name)?;
        sheet.write_string(row, 3, &record.student.class_name)?;
        sheet.write_string(row, 4, &record.student.gender)?;
        sheet.write_string(row, 5, record.test_time.format(TIME_FORMAT).to_string())?;
        sheet.write_string(row, 6, record.ai_summary.as_deref().unwrap_or_default())?;
        sheet.write_string(row, 7, if record.is_abnormal { "是" } else { "否" })?;
        sheet.write_string(row, 8, &record.status)?;
        sheet.write_string(row, 9, record.report_file_path.as_deref().unwrap_or_default())?;

        let values = record
            .scores
            .iter()
            .map(|s| (&s.module_name, s.score as f64))
            .chain(
                record
                    .physiological_data
                    .iter()
                    .map(|d| (&d.data_key, d.data_value)),
            );
        for (key, value) in values {
            if let Some(pos) = extra_columns.iter().position(|c| c == key) {
                sheet.write_number(row, fixed + pos as u16, value)?;
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// Three sheets: 统计概览, 班级分布, 得分分布.
pub fn write_dashboard(
    stats: &DashboardStats,
    classes: &BTreeMap<String, i64>,
    scores: &ScoreDistribution,
    path: &Path,
) -> Result<(), AppError> {
    let mut workbook = Workbook::new();

    let overview = workbook.add_worksheet();
    overview.set_name("统计概览")?;
    write_header(overview, &["指标", "数值"])?;
    let rows = [
        ("总学生数", stats.total_students),
        ("总检测记录数", stats.total_records),
        ("异常记录数", stats.abnormal_count),
        ("今日检测数", stats.today_records),
    ];
    for (idx, (label, value)) in rows.iter().enumerate() {
        let row = idx as u32 + 1;
        overview.write_string(row, 0, *label)?;
        overview.write_number(row, 1, *value as f64)?;
    }

    let class_sheet = workbook.add_worksheet();
    class_sheet.set_name("班级分布")?;
    write_header(class_sheet, &["班级", "学生数"])?;
    for (idx, (class_name, count)) in classes.iter().enumerate() {
        let row = idx as u32 + 1;
        class_sheet.write_string(row, 0, class_name)?;
        class_sheet.write_number(row, 1, *count as f64)?;
    }

    let score_sheet = workbook.add_worksheet();
    score_sheet.set_name("得分分布")?;
    write_header(score_sheet, &["模块", "分数段", "人数"])?;
    let mut row: u32 = 1;
    for (module_name, buckets) in scores {
        for (bucket, count) in buckets {
            score_sheet.write_string(row, 0, module_name)?;
            score_sheet.write_string(row, 1, bucket)?;
            score_sheet.write_number(row, 2, *count as f64)?;
            row += 1;
        }
    }

    workbook.save(path)?;
    Ok(())
}
