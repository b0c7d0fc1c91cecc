//! 数据库连接池、迁移与 RBAC 表结构检查

use crate::{
    config::DatabaseConfig,
    error::{AppError, Result},
};
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// 用户保存流程依赖的表
pub const REQUIRED_TABLES: &[&str] = &["auth_items", "users", "auth_assignments"];

/// 权限项类型枚举
pub const ITEM_KIND_TYPE: &str = "item_kind";

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect(config.url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            e
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool ready"
    );
    Ok(pool)
}

/// 执行内嵌迁移（migrations/）
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("RBAC schema migrated");
    Ok(())
}

/// 缺失的表结构对象名称（枚举类型在前，表按 `REQUIRED_TABLES` 顺序）
pub async fn missing_schema(pool: &PgPool) -> Result<Vec<&'static str>> {
    let mut missing = Vec::new();

    let has_kind: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_type WHERE typname = $1)")
            .bind(ITEM_KIND_TYPE)
            .fetch_one(pool)
            .await?;
    if !has_kind {
        missing.push(ITEM_KIND_TYPE);
    }

    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(*table)
            .fetch_one(pool)
            .await?;
        if !exists {
            missing.push(*table);
        }
    }

    Ok(missing)
}

/// 表结构不完整时返回配置错误
pub async fn verify_schema(pool: &PgPool) -> Result<()> {
    match schema_status(&missing_schema(pool).await?) {
        HealthStatus::Healthy => Ok(()),
        HealthStatus::Unhealthy(reason) => Err(AppError::Config(reason)),
    }
}

/// 连通性与表结构检查
pub async fn health_check(pool: &PgPool) -> HealthStatus {
    match missing_schema(pool).await {
        Ok(missing) => schema_status(&missing),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            HealthStatus::Unhealthy(e.to_string())
        }
    }
}

fn schema_status(missing: &[&str]) -> HealthStatus {
    if missing.is_empty() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy(format!(
            "RBAC schema incomplete, missing: {} (run `srbac-admin migrate`)",
            missing.join(", ")
        ))
    }
}

pub fn record_pool_metrics(pool: &PgPool) {
    metrics::gauge!("srbac.db.pool.size").set(pool.size() as f64);
    metrics::gauge!("srbac.db.pool.idle").set(pool.num_idle() as f64);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}
