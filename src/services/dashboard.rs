// src/services/dashboard.rs

//! Aggregates behind the admin dashboard.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::services::classifier::Module;

/// Score ranges of the distribution chart, in display order.
pub const SCORE_BUCKETS: [&str; 5] = ["0-10", "11-15", "16-20", "21-25", "26-30"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_students: i64,
    pub total_records: i64,
    pub abnormal_count: i64,
    pub today_records: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendData {
    pub dates: Vec<String>,
    pub values: Vec<i64>,
}

/// Module label → bucket label → count.
pub type ScoreDistribution = BTreeMap<String, BTreeMap<String, i64>>;

/// Bucket of a score. Anything above 25 lands in the last bucket, anything
/// below 0 in the first.
pub fn score_bucket(score: i64) -> &'static str {
    match score {
        i64::MIN..=10 => SCORE_BUCKETS[0],
        11..=15 => SCORE_BUCKETS[1],
        16..=20 => SCORE_BUCKETS[2],
        21..=25 => SCORE_BUCKETS[3],
        _ => SCORE_BUCKETS[4],
    }
}

pub async fn stats(pool: &SqlitePool) -> Result<DashboardStats, sqlx::Error> {
    let today_start = Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default();

    let (total_students,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students")
        .fetch_one(pool)
        .await?;

    let (total_records, abnormal_count, today_records): (i64, i64, i64) = sqlx::query_as(
        "SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN is_abnormal THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN test_time >= ? THEN 1 ELSE 0 END), 0)
         FROM tests",
    )
    .bind(today_start)
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        total_students,
        total_records,
        abnormal_count,
        today_records,
    })
}

/// Daily record counts from `today - days` to today, both inclusive.
pub async fn trend(pool: &SqlitePool, days: u32, today: NaiveDate) -> Result<TrendData, sqlx::Error> {
    let start = today - Duration::days(i64::from(days));
    let start_time = start.and_hms_opt(0, 0, 0).unwrap_or_default();

    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT substr(test_time, 1, 10) AS day, COUNT(*) FROM tests
         WHERE test_time >= ? GROUP BY day",
    )
    .bind(start_time)
    .fetch_all(pool)
    .await?;
    let per_day: HashMap<String, i64> = rows.into_iter().collect();

    let (dates, values) = start
        .iter_days()
        .take_while(|day| *day <= today)
        .map(|day| {
            let key = day.format("%Y-%m-%d").to_string();
            let value = per_day.get(&key).copied().unwrap_or(0);
            (key, value)
        })
        .unzip();

    Ok(TrendData { dates, values })
}

/// Bucketed scores of the classified modules over the newest `limit` records.
pub async fn score_distribution(pool: &SqlitePool, limit: i64) -> Result<ScoreDistribution, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT module_name, score FROM scores
         WHERE test_fk_id IN (SELECT id FROM tests ORDER BY test_time DESC, id DESC LIMIT ?)",
    )
    .bind(limit.max(0))
    .fetch_all(pool)
    .await?;

    let mut distribution: ScoreDistribution = Module::ALL
        .into_iter()
        .map(|module| {
            let buckets = SCORE_BUCKETS.iter().map(|b| (b.to_string(), 0)).collect();
            (module.label().to_string(), buckets)
        })
        .collect();

    for (module_name, score) in rows {
        if let Some(buckets) = distribution.get_mut(&module_name) {
            *buckets.entry(score_bucket(score).to_string()).or_default() += 1;
        }
    }

    Ok(distribution)
}
