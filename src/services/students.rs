// src/services/students.rs

//! Data access for the student roster.

use std::collections::{BTreeMap, HashSet};

use chrono::Local;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

use crate::{
    config::MAX_LIST_LIMIT,
    error::{AppError, is_unique_violation},
    models::student::{
        CreateStudentRequest, STUDENT_COLUMNS, Student, StudentListParams, UpdateStudentRequest,
        sort_column,
    },
};

pub async fn find_by_student_id<'e, E>(
    executor: E,
    student_id: &str,
) -> Result<Option<Student>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Student>(&format!(
        "SELECT {} FROM students WHERE student_id = ?",
        STUDENT_COLUMNS
    ))
    .bind(student_id)
    .fetch_optional(executor)
    .await
}

/// Inserts a student and returns the stored row.
pub async fn insert<'e, E>(executor: E, student: &CreateStudentRequest) -> Result<Student, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let created_at = Local::now().naive_local();
    let id = sqlx::query(
        "INSERT INTO students (student_id, name, class_name, gender, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&student.student_id)
    .bind(&student.name)
    .bind(&student.class_name)
    .bind(&student.gender)
    .bind(created_at)
    .execute(executor)
    .await?
    .last_insert_rowid();

    Ok(Student {
        id,
        student_id: student.student_id.clone(),
        name: student.name.clone(),
        class_name: student.class_name.clone(),
        gender: student.gender.clone(),
        created_at,
    })
}

/// Creates a student; a taken `student_id` is a 400.
pub async fn create(pool: &SqlitePool, student: &CreateStudentRequest) -> Result<Student, AppError> {
    if find_by_student_id(pool, &student.student_id).await?.is_some() {
        return Err(duplicate(&student.student_id));
    }

    insert(pool, student).await.map_err(|e| {
        // Lost a race with a concurrent insert of the same id.
        if is_unique_violation(&e) {
            duplicate(&student.student_id)
        } else {
            tracing::error!("Failed to create student: {:?}", e);
            AppError::from(e)
        }
    })
}

fn duplicate(student_id: &str) -> AppError {
    AppError::BadRequest(format!("学号 {} 已存在", student_id))
}

/// Filtered, sorted, paginated roster.
pub async fn list(pool: &SqlitePool, params: &StudentListParams) -> Result<Vec<Student>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM students WHERE 1 = 1", STUDENT_COLUMNS));

    if let Some(class_name) = params.class_name.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND class_name = ");
        builder.push_bind(class_name.to_string());
    }

    if let Some(gender) = params.gender.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND gender = ");
        builder.push_bind(gender.to_string());
    }

    let direction = match params.sort_order.as_deref() {
        Some("desc") => "DESC",
        _ => "ASC",
    };
    builder.push(format!(
        " ORDER BY {} {}, id ASC",
        sort_column(params.sort_by.as_deref()),
        direction
    ));

    builder.push(" LIMIT ");
    builder.push_bind(params.limit.unwrap_or(MAX_LIST_LIMIT).clamp(0, MAX_LIST_LIMIT));
    builder.push(" OFFSET ");
    builder.push_bind(params.skip.unwrap_or(0).max(0));

    builder.build_query_as::<Student>().fetch_all(pool).await
}

/// Applies the present fields. Returns `None` when the student does not exist.
pub async fn update(
    pool: &SqlitePool,
    student_id: &str,
    changes: &UpdateStudentRequest,
) -> Result<Option<Student>, AppError> {
    let Some(existing) = find_by_student_id(pool, student_id).await? else {
        return Ok(None);
    };

    if changes.is_empty() {
        return Ok(Some(existing));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE students SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = &changes.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.clone());
    }

    if let Some(new_id) = &changes.student_id {
        separated.push("student_id = ");
        separated.push_bind_unseparated(new_id.clone());
    }

    if let Some(class_name) = &changes.class_name {
        separated.push("class_name = ");
        separated.push_bind_unseparated(class_name.clone());
    }

    if let Some(gender) = &changes.gender {
        separated.push("gender = ");
        separated.push_bind_unseparated(gender.clone());
    }

    builder.push(" WHERE id = ");
    builder.push_bind(existing.id);

    builder.build().execute(pool).await.map_err(|e| {
        if is_unique_violation(&e) {
            duplicate(changes.student_id.as_deref().unwrap_or(student_id))
        } else {
            tracing::error!("Failed to update student: {:?}", e);
            AppError::from(e)
        }
    })?;

    let current_id = changes.student_id.as_deref().unwrap_or(student_id);
    Ok(find_by_student_id(pool, current_id).await?)
}

/// Deletes a student; tests, scores and physiological data cascade.
pub async fn delete(pool: &SqlitePool, student_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM students WHERE student_id = ?")
        .bind(student_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_many(pool: &SqlitePool, student_ids: &[String]) -> Result<u64, sqlx::Error> {
    if student_ids.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("DELETE FROM students WHERE student_id IN (");
    let mut separated = builder.separated(", ");
    for id in student_ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");

    Ok(builder.build().execute(pool).await?.rows_affected())
}

/// Students for the given natural keys, in request order, skipping unknown ids.
pub async fn find_many(pool: &SqlitePool, student_ids: &[String]) -> Result<Vec<Student>, sqlx::Error> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM students WHERE student_id IN (",
        STUDENT_COLUMNS
    ));
    let mut separated = builder.separated(", ");
    for id in student_ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");

    let found = builder.build_query_as::<Student>().fetch_all(pool).await?;

    Ok(student_ids
        .iter()
        .filter_map(|id| found.iter().find(|s| &s.student_id == id).cloned())
        .collect())
}

pub async fn all_student_ids(pool: &SqlitePool) -> Result<HashSet<String>, sqlx::Error> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT student_id FROM students")
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().collect())
}

/// Inserts all students in one transaction; either all land or none.
pub async fn insert_many(pool: &SqlitePool, students: &[CreateStudentRequest]) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;
    for student in students {
        insert(&mut *tx, student).await?;
    }
    tx.commit().await?;
    Ok(students.len())
}

/// Class name → number of students.
pub async fn class_distribution(pool: &SqlitePool) -> Result<BTreeMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT class_name, COUNT(*) FROM students GROUP BY class_name ORDER BY class_name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}
