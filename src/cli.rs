//! 命令行：管理用户、权限项与规则视图

use crate::{
    config::AppConfig,
    db::{self, HealthStatus},
    error::AppError,
    forms::UserFormInput,
    models::{
        item::{CreateItemRequest, ItemKind},
        user::UserWithRoles,
    },
    repository::{IdentityRepository, PgIdentityRepository, PgItemRepository, RoleCatalog},
    services::{SaveOutcome, UserUpsertService},
    views::RuleEditView,
};
use clap::{Parser, Subcommand};
use secrecy::Secret;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "srbac-admin", version)]
#[command(about = "RBAC user and rule administration", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run database migrations
    Migrate,

    /// Check database connectivity
    Health,

    /// Role catalog commands
    #[command(subcommand)]
    Role(RoleCommands),

    /// RBAC item commands
    #[command(subcommand)]
    Item(ItemCommands),

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Rule dialog commands
    #[command(subcommand)]
    Rule(RuleCommands),
}

#[derive(Subcommand)]
pub enum RoleCommands {
    /// List assignable role names
    List,
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// Create a role, permission or rule item
    Add {
        name: String,
        #[arg(long, value_parser = parse_kind)]
        kind: ItemKind,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        class_name: Option<String>,
    },

    /// Show an item by name
    Show { name: String },

    /// Remove an item and its assignments
    Remove { name: String },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List users with their roles
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Show the edit form state of a user (create mode when absent)
    Show { id: Option<Uuid> },

    /// Create or update a user and replace its roles
    Save {
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum RuleCommands {
    /// Render the edit dialog of a rule
    Edit { name: String },
}

fn parse_kind(value: &str) -> Result<ItemKind, String> {
    value.parse()
}

/// 命令执行所需的依赖
pub struct AppContext {
    pub config: AppConfig,
    pub db: sqlx::PgPool,
    pub identities: PgIdentityRepository,
    pub items: PgItemRepository,
    pub users: UserUpsertService<PgIdentityRepository, PgItemRepository>,
}

/// 执行命令；输入被拒绝时返回 Ok(false)
pub async fn execute_command(cli: Cli, ctx: &AppContext) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&ctx.db).await?;
            println!("migrations applied");
        }
        Commands::Health => match db::health_check(&ctx.db).await {
            HealthStatus::Healthy => println!("database: healthy"),
            HealthStatus::Unhealthy(reason) => {
                eprintln!("database: unhealthy ({})", reason);
                return Ok(false);
            }
        },
        Commands::Role(RoleCommands::List) => {
            for name in ctx.items.role_names().await? {
                println!("{}", name);
            }
        }
        Commands::Item(ItemCommands::Add {
            name,
            kind,
            description,
            class_name,
        }) => {
            let req = CreateItemRequest {
                name,
                kind,
                description,
                class_name,
            };
            match ctx.items.create(&req).await {
                Ok(item) => println!("{}", serde_json::to_string_pretty(&item)?),
                Err(AppError::Rejected(errors)) => {
                    eprintln!("{}", errors);
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Item(ItemCommands::Show { name }) => match ctx.items.find_by_name(&name).await? {
            Some(item) => println!("{}", serde_json::to_string_pretty(&item)?),
            None => {
                eprintln!("item not found: {}", name);
                return Ok(false);
            }
        },
        Commands::Item(ItemCommands::Remove { name }) => {
            if !ctx.items.delete(&name).await? {
                eprintln!("item not found: {}", name);
                return Ok(false);
            }
            println!("removed {}", name);
        }
        Commands::User(UserCommands::List { limit, offset }) => {
            let total = ctx.identities.count().await?;
            let mut listed = Vec::new();
            for user in ctx.identities.list(limit, offset).await? {
                let roles = ctx.identities.assigned_roles(user.id).await?;
                listed.push(UserWithRoles { user, roles });
            }
            tracing::debug!(total, shown = listed.len(), "Listed users");
            println!("{}", serde_json::to_string_pretty(&listed)?);
        }
        Commands::User(UserCommands::Show { id }) => {
            let form = ctx.users.load_for_edit(id).await?;
            println!("{}", serde_json::to_string_pretty(&form.view())?);
        }
        Commands::User(UserCommands::Save {
            id,
            username,
            password,
            roles,
        }) => {
            let mut form = ctx.users.load_for_edit(id).await?;
            let generate = form.is_new_user && password.as_deref().map_or(true, str::is_empty);
            form.load(UserFormInput {
                username: Some(username),
                password: password.map(Secret::new),
                roles,
            });

            match ctx.users.submit(&mut form).await {
                SaveOutcome::Saved(user) => {
                    println!("{}", serde_json::to_string_pretty(&form.view())?);
                    if generate {
                        if let Some(generated) = form.password() {
                            eprintln!("generated password for {}: {}", user.username, generated);
                        }
                    }
                }
                SaveOutcome::Rejected(errors) => {
                    eprintln!("{}", serde_json::to_string_pretty(&errors)?);
                    return Ok(false);
                }
                SaveOutcome::Failed => anyhow::bail!("failed to save user"),
            }
        }
        Commands::Rule(RuleCommands::Edit { name }) => {
            let rule = ctx
                .items
                .find_rule(&name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("rule not found: {}", name))?;
            let view = RuleEditView::from_config(&ctx.config)?;
            print!("{}", view.render(&rule)?);
        }
    }

    db::record_pool_metrics(&ctx.db);
    Ok(true)
}
