// src/handlers/dashboard.rs

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Local;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    config::STATS_CACHE_TTL_SECS,
    error::AppError,
    services::{
        dashboard::{self, DashboardStats},
        students,
    },
    utils::cache::{DASHBOARD_STATS_KEY, TtlCache},
};

/// Headline counters, served from the cache for up to a minute.
pub async fn cached_stats(pool: &SqlitePool, cache: &TtlCache) -> Result<DashboardStats, AppError> {
    if let Some(stats) = cache.get::<DashboardStats>(DASHBOARD_STATS_KEY) {
        return Ok(stats);
    }

    let stats = dashboard::stats(pool).await?;
    cache.insert(
        DASHBOARD_STATS_KEY,
        &stats,
        Duration::from_secs(STATS_CACHE_TTL_SECS),
    );
    Ok(stats)
}

pub async fn get_stats(
    State(pool): State<SqlitePool>,
    State(cache): State<Arc<TtlCache>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(cached_stats(&pool, &cache).await?))
}

#[derive(Debug, Deserialize)]
pub struct TrendParams {
    pub days: Option<u32>,
}

pub async fn get_trend(
    State(pool): State<SqlitePool>,
    Query(params): Query<TrendParams>,
) -> Result<impl IntoResponse, AppError> {
    // A year is the longest range the chart offers.
    let days = params.days.unwrap_or(7).min(366);
    let trend = dashboard::trend(&pool, days, Local::now().date_naive()).await?;
    Ok(Json(trend))
}

#[derive(Debug, Deserialize)]
pub struct ScoreStatsParams {
    pub limit: Option<i64>,
}

pub async fn get_score_stats(
    State(pool): State<SqlitePool>,
    Query(params): Query<ScoreStatsParams>,
) -> Result<impl IntoResponse, AppError> {
    let distribution = dashboard::score_distribution(&pool, params.limit.unwrap_or(100)).await?;
    Ok(Json(distribution))
}

pub async fn get_class_distribution(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(students::class_distribution(&pool).await?))
}
