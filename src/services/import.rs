// src/services/import.rs

//! Roster import from an uploaded `.xlsx` sheet.

use std::collections::HashSet;
use std::io::Cursor;

use calamine::{DataType, Reader, Xlsx};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{error::AppError, models::student::CreateStudentRequest, services::students};

/// Header cells the first row must contain, in any order.
pub const REQUIRED_COLUMNS: [&str; 4] = ["name", "student_id", "class_name", "gender"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRow {
    /// Spreadsheet row number, header is row 1.
    pub row: usize,
    pub student_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRow {
    pub row: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub success_count: usize,
    pub duplicate_count: usize,
    pub error_count: usize,
    pub duplicate_students: Vec<DuplicateRow>,
    pub error_rows: Vec<ErrorRow>,
    pub detail: String,
}

/// Rows sorted into what will be inserted and what is reported back.
#[derive(Debug, Default)]
pub struct ImportPlan {
    pub valid: Vec<CreateStudentRequest>,
    pub duplicates: Vec<DuplicateRow>,
    pub errors: Vec<ErrorRow>,
}

impl ImportPlan {
    pub fn into_summary(self, success_count: usize) -> ImportSummary {
        let detail = format!(
            "导入完成：成功 {} 条学生，重复 {} 条，错误 {} 条",
            success_count,
            self.duplicates.len(),
            self.errors.len()
        );

        ImportSummary {
            success_count,
            duplicate_count: self.duplicates.len(),
            error_count: self.errors.len(),
            duplicate_students: self.duplicates,
            error_rows: self.errors,
            detail,
        }
    }
}

fn cell_text(cell: Option<&DataType>) -> String {
    cell.map(|c| c.to_string().trim().to_string())
        .unwrap_or_default()
}

/// Reads the first sheet and classifies every data row against the ids
/// already stored. Ids repeated inside the file count as duplicates after
/// their first occurrence.
pub fn plan_import(bytes: Vec<u8>, existing_ids: &HashSet<String>) -> Result<ImportPlan, AppError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| AppError::BadRequest(format!("Excel读取失败: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::BadRequest("Excel读取失败: 文件中没有工作表".to_string()))?
        .map_err(|e| AppError::BadRequest(format!("Excel读取失败: {}", e)))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|c| c.to_string().trim().to_string()).collect())
        .unwrap_or_default();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|col| !header.iter().any(|h| h == col))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!("缺少必要列: {}", missing.join(", "))));
    }

    let column = |name: &str| header.iter().position(|h| h == name).unwrap_or_default();
    let (name_col, id_col, class_col, gender_col) = (
        column("name"),
        column("student_id"),
        column("class_name"),
        column("gender"),
    );

    let mut plan = ImportPlan::default();
    let mut seen: HashSet<String> = existing_ids.clone();

    for (idx, row) in rows.enumerate() {
        let row_number = idx + 2;
        let name = cell_text(row.get(name_col));
        let student_id = cell_text(row.get(id_col));
        let class_name = cell_text(row.get(class_col));
        let gender = cell_text(row.get(gender_col));

        // Fully blank rows are trailing formatting, not data.
        if [&name, &student_id, &class_name, &gender]
            .iter()
            .all(|v| v.is_empty())
        {
            continue;
        }

        if [&name, &student_id, &class_name, &gender]
            .iter()
            .any(|v| v.is_empty())
        {
            plan.errors.push(ErrorRow {
                row: row_number,
                error: "必填字段不能为空".to_string(),
            });
            continue;
        }

        if !seen.insert(student_id.clone()) {
            plan.duplicates.push(DuplicateRow {
                row: row_number,
                student_id,
                name,
            });
            continue;
        }

        plan.valid.push(CreateStudentRequest {
            name,
            student_id,
            class_name,
            gender,
        });
    }

    Ok(plan)
}

/// Plans the import on a blocking thread, then inserts the valid rows in
/// one transaction.
pub async fn import_students(pool: &SqlitePool, bytes: Vec<u8>) -> Result<ImportSummary, AppError> {
    let existing = students::all_student_ids(pool).await?;
    let plan = tokio::task::spawn_blocking(move || plan_import(bytes, &existing))
        .await
        .map_err(|e| AppError::InternalServerError(format!("import task failed: {}", e)))??;

    let inserted = students::insert_many(pool, &plan.valid).await?;
    let summary = plan.into_summary(inserted);
    tracing::info!("{}", summary.detail);
    Ok(summary)
}
