//! RBAC item and assignment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// 权限项类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// 角色，可分配给用户
    Role,
    /// 权限
    Permission,
    /// 规则
    Rule,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Role => "role",
            ItemKind::Permission => "permission",
            ItemKind::Rule => "rule",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "role" => Ok(ItemKind::Role),
            "permission" => Ok(ItemKind::Permission),
            "rule" => Ok(ItemKind::Rule),
            other => Err(format!("unknown item kind: {}", other)),
        }
    }
}

/// 权限项（角色 / 权限 / 规则）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub name: String,
    pub kind: ItemKind,
    pub description: Option<String>,
    pub class_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create item request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 64, message = "Name must be 1 to 64 characters."))]
    pub name: String,
    pub kind: ItemKind,
    pub description: Option<String>,
    #[validate(length(max = 255, message = "Class name must be at most 255 characters."))]
    pub class_name: Option<String>,
}

/// 规则：rule 类型权限项的投影，主键为 name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub name: String,
    pub class_name: String,
}

impl Rule {
    pub fn primary_key(&self) -> &str {
        &self.name
    }
}

impl TryFrom<Item> for Rule {
    type Error = Item;

    fn try_from(item: Item) -> Result<Self, Self::Error> {
        if item.kind != ItemKind::Rule {
            return Err(item);
        }
        Ok(Rule {
            name: item.name,
            class_name: item.class_name.unwrap_or_default(),
        })
    }
}

/// 用户与角色的分配关系
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assignment {
    pub user_id: Uuid,
    pub item_name: String,
    pub created_at: DateTime<Utc>,
}

/// 待写入的分配记录
#[derive(Debug, Clone, Validate)]
pub struct NewAssignment {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 64, message = "Item name must be 1 to 64 characters."))]
    pub item_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_kind_parse() {
        assert_eq!("role".parse::<ItemKind>().unwrap(), ItemKind::Role);
        assert_eq!("Permission".parse::<ItemKind>().unwrap(), ItemKind::Permission);
        assert!("group".parse::<ItemKind>().is_err());
    }

    #[test]
    fn test_rule_from_item() {
        let item = Item {
            name: "isAuthor".to_string(),
            kind: ItemKind::Rule,
            description: None,
            class_name: Some("app\\rbac\\AuthorRule".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let rule = Rule::try_from(item).unwrap();
        assert_eq!(rule.primary_key(), "isAuthor");

        let role = Item {
            name: "editor".to_string(),
            kind: ItemKind::Role,
            description: None,
            class_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(Rule::try_from(role).is_err());
    }
}
