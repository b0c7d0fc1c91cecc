//! User domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub auth_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待写入的用户记录（id 为空表示新建）
///
/// 存储实现在写入前调用 `validate()`，失败时以字段错误拒绝写入。
#[derive(Debug, Clone, Default, Validate)]
pub struct UserDraft {
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "Username must be 1 to 255 characters."))]
    pub username: String,
    #[validate(length(min = 1, max = 255, message = "Password hash is invalid."))]
    pub password_hash: String,
    #[validate(length(min = 1, max = 255, message = "Auth key is invalid."))]
    pub auth_key: String,
}

impl From<&User> for UserDraft {
    fn from(user: &User) -> Self {
        Self {
            id: Some(user.id),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            auth_key: user.auth_key.clone(),
        }
    }
}

/// User with roles
#[derive(Debug, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
}
