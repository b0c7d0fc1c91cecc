//! Item repository (权限项数据访问)

use super::RoleCatalog;
use crate::{
    error::{AppError, Result},
    models::item::*,
};
use async_trait::async_trait;
use sqlx::PgPool;
use validator::Validate;

#[derive(Clone)]
pub struct PgItemRepository {
    db: PgPool,
}

impl PgItemRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 创建权限项
    pub async fn create(&self, req: &CreateItemRequest) -> Result<Item> {
        req.validate()?;

        let result = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO auth_items (name, kind, description, class_name)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(req.kind)
        .bind(&req.description)
        .bind(&req.class_name)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(item) => Ok(item),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::rejected("name", "Name has already been taken."))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 根据名称查找权限项
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM auth_items WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;

        Ok(item)
    }

    /// 列出某类型的全部名称
    pub async fn list_names(&self, kind: ItemKind) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM auth_items WHERE kind = $1 ORDER BY name")
                .bind(kind)
                .fetch_all(&self.db)
                .await?;

        Ok(names)
    }

    /// 查找规则
    pub async fn find_rule(&self, name: &str) -> Result<Option<Rule>> {
        let item = sqlx::query_as::<_, Item>(
            "SELECT * FROM auth_items WHERE name = $1 AND kind = $2",
        )
        .bind(name)
        .bind(ItemKind::Rule)
        .fetch_optional(&self.db)
        .await?;

        Ok(item.and_then(|item| Rule::try_from(item).ok()))
    }

    /// 删除权限项（分配关系级联删除）
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auth_items WHERE name = $1")
            .bind(name)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleCatalog for PgItemRepository {
    async fn role_names(&self) -> Result<Vec<String>> {
        self.list_names(ItemKind::Role).await
    }
}
