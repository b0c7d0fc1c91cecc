//! User repository (数据库访问层)

use super::{IdentityRepository, IdentityTransaction};
use crate::{
    error::{AppError, Result},
    models::{item::NewAssignment, user::*},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct PgIdentityRepository {
    db: PgPool,
}

impl PgIdentityRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 列出所有用户
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    /// 统计用户数量
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?
            .get(0);

        Ok(count)
    }
}

#[async_trait]
impl IdentityRepository for PgIdentityRepository {
    type Tx = PgIdentityTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.db.begin().await?;
        Ok(PgIdentityTransaction { tx })
    }

    /// 根据 ID 查找用户
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 根据用户名查找用户
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn assigned_roles(&self, user_id: Uuid) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT item_name
            FROM auth_assignments
            WHERE user_id = $1
            ORDER BY created_at, item_name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(names)
    }
}

pub struct PgIdentityTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl IdentityTransaction for PgIdentityTransaction {
    async fn save_user(&mut self, draft: &UserDraft) -> Result<Uuid> {
        draft.validate()?;

        let result = match draft.id {
            Some(id) => {
                sqlx::query_scalar::<_, Uuid>(
                    r#"
                    UPDATE users
                    SET
                        username = $2,
                        password_hash = $3,
                        auth_key = $4,
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING id
                    "#,
                )
                .bind(id)
                .bind(&draft.username)
                .bind(&draft.password_hash)
                .bind(&draft.auth_key)
                .fetch_optional(&mut *self.tx)
                .await
            }
            None => {
                sqlx::query_scalar::<_, Uuid>(
                    r#"
                    INSERT INTO users (username, password_hash, auth_key)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(&draft.username)
                .bind(&draft.password_hash)
                .bind(&draft.auth_key)
                .fetch_optional(&mut *self.tx)
                .await
            }
        };

        match result {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(AppError::not_found("user")),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                AppError::rejected("username", "Username has been taken."),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn reload(&mut self, id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::not_found("user"))
    }

    async fn delete_assignments(&mut self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM auth_assignments WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_assignment(&mut self, assignment: &NewAssignment) -> Result<()> {
        assignment.validate()?;

        let result = sqlx::query(
            "INSERT INTO auth_assignments (user_id, item_name) VALUES ($1, $2)",
        )
        .bind(assignment.user_id)
        .bind(&assignment.item_name)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => Err(
                AppError::rejected("item_name", "Item name is invalid."),
            ),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                AppError::rejected("item_name", "Item name has already been assigned."),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
