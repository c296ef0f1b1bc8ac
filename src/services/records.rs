// src/services/records.rs

//! Queries over test records and their child rows.

use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    models::test_record::{
        PhysiologicalData, RecordStatus, Score, TEST_WITH_STUDENT_SELECT, TestRecordDetail,
        TestRecordFilter, TestStatus, TestWithStudentRow,
    },
};

/// Default page size of the record list.
pub const DEFAULT_RECORD_LIMIT: i64 = 100;

fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

/// Loads scores and physiological rows for all given tests in two queries.
async fn attach_children(
    pool: &SqlitePool,
    rows: Vec<TestWithStudentRow>,
) -> Result<Vec<TestRecordDetail>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, test_fk_id, module_name, score, max_score, level, questionnaire_feedback
         FROM scores WHERE test_fk_id IN (",
    );
    push_id_list(&mut builder, &ids);
    builder.push(" ORDER BY id");
    let scores = builder.build_query_as::<Score>().fetch_all(pool).await?;

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, test_fk_id, data_key, data_value FROM physiological_data WHERE test_fk_id IN (",
    );
    push_id_list(&mut builder, &ids);
    builder.push(" ORDER BY id");
    let readings = builder
        .build_query_as::<PhysiologicalData>()
        .fetch_all(pool)
        .await?;

    let mut scores_by_test: HashMap<i64, Vec<Score>> = HashMap::new();
    for score in scores {
        scores_by_test.entry(score.test_fk_id).or_default().push(score);
    }

    let mut readings_by_test: HashMap<i64, Vec<PhysiologicalData>> = HashMap::new();
    for reading in readings {
        readings_by_test
            .entry(reading.test_fk_id)
            .or_default()
            .push(reading);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let scores = scores_by_test.remove(&row.id).unwrap_or_default();
            let readings = readings_by_test.remove(&row.id).unwrap_or_default();
            row.into_detail(scores, readings)
        })
        .collect())
}

pub async fn fetch_detail(pool: &SqlitePool, id: i64) -> Result<Option<TestRecordDetail>, sqlx::Error> {
    let row = sqlx::query_as::<_, TestWithStudentRow>(&format!(
        "{} WHERE t.id = ?",
        TEST_WITH_STUDENT_SELECT
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(attach_children(pool, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Details for the given ids, newest first. Unknown ids are skipped.
pub async fn fetch_details(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<TestRecordDetail>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("{} WHERE t.id IN (", TEST_WITH_STUDENT_SELECT));
    push_id_list(&mut builder, ids);
    builder.push(" ORDER BY t.test_time DESC, t.id DESC");

    let rows = builder
        .build_query_as::<TestWithStudentRow>()
        .fetch_all(pool)
        .await?;
    attach_children(pool, rows).await
}

/// All records of one student, newest first.
pub async fn details_for_student(
    pool: &SqlitePool,
    student_fk_id: i64,
) -> Result<Vec<TestRecordDetail>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TestWithStudentRow>(&format!(
        "{} WHERE t.student_fk_id = ? ORDER BY t.test_time DESC, t.id DESC",
        TEST_WITH_STUDENT_SELECT
    ))
    .bind(student_fk_id)
    .fetch_all(pool)
    .await?;

    attach_children(pool, rows).await
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &TestRecordFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(user_id) = filter.user_id.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND s.student_id = ");
        builder.push_bind(user_id.to_string());
    }

    if let Some(user_name) = filter.user_name.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND s.name LIKE ");
        builder.push_bind(format!("%{}%", user_name));
    }

    if let Some(gender) = filter.gender.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND s.gender = ");
        builder.push_bind(gender.to_string());
    }

    if let Some(class_name) = filter.class_name.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND s.class_name = ");
        builder.push_bind(class_name.to_string());
    }

    if let Some(start) = filter.start_time {
        builder.push(" AND t.test_time >= ");
        builder.push_bind(start);
    }

    if let Some(end) = filter.end_time {
        builder.push(" AND t.test_time <= ");
        builder.push_bind(end);
    }

    if let Some(is_abnormal) = filter.is_abnormal {
        builder.push(" AND t.is_abnormal = ");
        builder.push_bind(is_abnormal);
    }

    if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND t.status = ");
        builder.push_bind(status.to_string());
    }
}

/// Filtered record list, newest first.
///
/// `limit = None` means the default page; exports pass an explicit bound.
pub async fn list(pool: &SqlitePool, filter: &TestRecordFilter) -> Result<Vec<TestRecordDetail>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(TEST_WITH_STUDENT_SELECT);
    push_filter(&mut builder, filter);

    builder.push(" ORDER BY t.test_time DESC, t.id DESC LIMIT ");
    builder.push_bind(filter.limit.unwrap_or(DEFAULT_RECORD_LIMIT).max(0));
    builder.push(" OFFSET ");
    builder.push_bind(filter.skip.unwrap_or(0).max(0));

    let rows = builder
        .build_query_as::<TestWithStudentRow>()
        .fetch_all(pool)
        .await?;
    attach_children(pool, rows).await
}

/// Deletes a record; scores and physiological rows cascade.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tests WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_many(pool: &SqlitePool, ids: &[i64]) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM tests WHERE id IN (");
    push_id_list(&mut builder, ids);
    Ok(builder.build().execute(pool).await?.rows_affected())
}

/// Writes the new status and, when given, the replacement summary.
/// Returns false when the record does not exist.
pub async fn update_status(
    pool: &SqlitePool,
    id: i64,
    status: TestStatus,
    ai_summary: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = match ai_summary {
        Some(summary) => {
            sqlx::query("UPDATE tests SET status = ?, ai_summary = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(summary)
                .bind(id)
                .execute(pool)
                .await?
        }
        None => {
            sqlx::query("UPDATE tests SET status = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(id)
                .execute(pool)
                .await?
        }
    };

    Ok(result.rows_affected() > 0)
}

/// Status rows for the given students (all students when empty), newest first.
pub async fn statuses_for_students(
    pool: &SqlitePool,
    student_ids: &[String],
) -> Result<Vec<RecordStatus>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT t.id, t.test_time, t.is_abnormal, t.status, t.ai_summary
         FROM tests t JOIN students s ON t.student_fk_id = s.id",
    );

    if !student_ids.is_empty() {
        builder.push(" WHERE s.student_id IN (");
        let mut separated = builder.separated(", ");
        for id in student_ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");
    }

    builder.push(" ORDER BY t.test_time DESC, t.id DESC");
    builder.build_query_as::<RecordStatus>().fetch_all(pool).await
}

/// Latest record of a student and the student's record count.
pub async fn latest_for_student(
    pool: &SqlitePool,
    student_fk_id: i64,
) -> Result<(Option<RecordStatus>, i64), sqlx::Error> {
    let latest = sqlx::query_as::<_, RecordStatus>(
        "SELECT id, test_time, is_abnormal, status, ai_summary FROM tests
         WHERE student_fk_id = ? ORDER BY test_time DESC, id DESC LIMIT 1",
    )
    .bind(student_fk_id)
    .fetch_optional(pool)
    .await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tests WHERE student_fk_id = ?")
        .bind(student_fk_id)
        .fetch_one(pool)
        .await?;

    Ok((latest, count))
}
