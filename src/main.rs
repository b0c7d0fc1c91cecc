//! RBAC 管理命令行入口

use clap::Parser;
use srbac_admin::{
    auth::Argon2Security,
    cli::{self, AppContext, Cli, Commands},
    config::AppConfig,
    db,
    repository::{PgIdentityRepository, PgItemRepository},
    services::UserUpsertService,
    telemetry,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.local > .env.development > .env
    // 生产环境应该直接设置环境变量，不依赖 .env 文件
    if let Ok(env) = std::env::var("SRBAC_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志与指标
    telemetry::init_telemetry(&config);
    telemetry::init_metrics();

    // 3. 数据库连接池
    let db_pool = db::create_pool(&config.database).await?;
    if !matches!(cli.command, Commands::Migrate | Commands::Health) {
        db::run_migrations(&db_pool).await?;
        db::verify_schema(&db_pool).await?;
    }

    // 4. 组装服务（存储实现在此处选定）
    let identities = PgIdentityRepository::new(db_pool.clone());
    let items = PgItemRepository::new(db_pool.clone());
    let security = Arc::new(Argon2Security::from_config(&config.security)?);
    let users = UserUpsertService::new(
        identities.clone(),
        items.clone(),
        security,
        config.security.clone(),
    );

    let ctx = AppContext {
        config,
        db: db_pool,
        identities,
        items,
        users,
    };

    let ok = cli::execute_command(cli, &ctx).await?;
    ctx.db.close().await;

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
