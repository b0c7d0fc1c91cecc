//! 用户编辑表单
//!
//! 每次请求创建一个表单：先由 `UserUpsertService::load_for_edit` 装载已有用户，
//! 再用提交的输入覆盖字段，校验并保存后丢弃。

use crate::{error::FieldErrors, models::user::User};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// 字段标签（用于展示）
const ATTRIBUTE_LABELS: &[(&str, &str)] = &[
    ("username", "Username"),
    ("password", "Password"),
    ("roles", "Roles"),
];

/// 提交的表单输入
#[derive(Debug, Default, Deserialize)]
pub struct UserFormInput {
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Validate)]
pub struct UserForm {
    pub id: Option<Uuid>,

    #[validate(
        required(message = "Username cannot be blank."),
        length(min = 1, message = "Username cannot be blank.")
    )]
    pub username: Option<String>,

    pub password: Option<Secret<String>>,

    #[validate(length(min = 1, message = "Roles cannot be blank."))]
    pub roles: Vec<String>,

    pub is_new_user: bool,

    errors: FieldErrors,
    user: Option<User>,
}

/// 默认为新建模式
impl Default for UserForm {
    fn default() -> Self {
        Self {
            id: None,
            username: None,
            password: None,
            roles: Vec::new(),
            is_new_user: true,
            errors: FieldErrors::new(),
            user: None,
        }
    }
}

impl UserForm {
    /// 新用户表单
    pub fn new_user(id: Option<Uuid>) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// 编辑已有用户的表单
    pub fn for_user(user: User, roles: Vec<String>) -> Self {
        Self {
            id: Some(user.id),
            username: Some(user.username.clone()),
            roles,
            is_new_user: false,
            user: Some(user),
            ..Self::default()
        }
    }

    /// 应用提交的输入。空密码视为未提供，重复角色只保留首次出现
    pub fn load(&mut self, input: UserFormInput) {
        self.username = input.username;
        self.password = input
            .password
            .filter(|p| !p.expose_secret().is_empty());

        let mut roles: Vec<String> = Vec::with_capacity(input.roles.len());
        for role in input.roles {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        self.roles = roles;
    }

    /// 已装载的用户记录（新用户为 None）
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret().as_str())
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn add_errors(&mut self, errors: &FieldErrors) {
        self.errors.extend(errors);
    }

    pub(crate) fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub(crate) fn set_user(&mut self, user: User) {
        self.user = Some(user);
    }

    pub fn attribute_labels() -> &'static [(&'static str, &'static str)] {
        ATTRIBUTE_LABELS
    }

    pub fn label(field: &str) -> Option<&'static str> {
        ATTRIBUTE_LABELS
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, label)| *label)
    }

    /// 供展示层使用的快照，不包含密码
    pub fn view(&self) -> UserFormView {
        UserFormView {
            id: self.id,
            username: self.username.clone(),
            roles: self.roles.clone(),
            is_new_user: self.is_new_user,
            errors: self.errors.clone(),
            labels: ATTRIBUTE_LABELS
                .iter()
                .map(|(field, label)| ((*field).to_string(), (*label).to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserFormView {
    pub id: Option<Uuid>,
    pub username: Option<String>,
    pub roles: Vec<String>,
    pub is_new_user: bool,
    pub errors: FieldErrors,
    pub labels: Vec<(String, String)>,
}
