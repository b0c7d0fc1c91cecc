//! 用户保存服务：校验并在单个事务内写入用户及其角色分配

use crate::{
    auth::{password::PasswordHasher, security::Security},
    config::SecurityConfig,
    error::{AppError, FieldErrors},
    forms::user_form::UserForm,
    models::{item::NewAssignment, user::{User, UserDraft}},
    repository::{IdentityRepository, IdentityTransaction, RoleCatalog},
};
use secrecy::Secret;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 保存结果
#[derive(Debug)]
pub enum SaveOutcome {
    /// 已提交
    Saved(User),
    /// 校验或记录约束失败，未写入任何数据
    Rejected(FieldErrors),
    /// 意外错误，事务已回滚
    Failed,
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }
}

pub struct UserUpsertService<R, C> {
    identities: R,
    catalog: C,
    security: Arc<dyn Security>,
    policy: SecurityConfig,
}

impl<R, C> UserUpsertService<R, C>
where
    R: IdentityRepository,
    C: RoleCatalog,
{
    pub fn new(identities: R, catalog: C, security: Arc<dyn Security>, policy: SecurityConfig) -> Self {
        Self {
            identities,
            catalog,
            security,
            policy,
        }
    }

    /// 装载表单：id 为空或用户不存在时进入新建模式
    pub async fn load_for_edit(&self, id: Option<Uuid>) -> Result<UserForm, AppError> {
        let Some(id) = id else {
            return Ok(UserForm::new_user(None));
        };

        match self.identities.find_by_id(id).await? {
            Some(user) => {
                let roles = self.identities.assigned_roles(user.id).await?;
                Ok(UserForm::for_user(user, roles))
            }
            None => {
                tracing::debug!(user_id = %id, "User not found, switching to create mode");
                Ok(UserForm::new_user(Some(id)))
            }
        }
    }

    /// 校验表单，错误同时写回表单
    pub async fn validate(&self, form: &mut UserForm) -> Result<FieldErrors, AppError> {
        form.clear_errors();

        let mut errors = match form.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from(e),
        };

        if let Some(password) = form.password() {
            if let Some(message) = PasswordHasher::validate_password_policy(password, &self.policy) {
                errors.add("password", message);
            }
        }

        if !form.roles.is_empty() {
            let allowed = self.catalog.role_names().await?;
            if form.roles.iter().any(|role| !allowed.contains(role)) {
                errors.add("roles", "Roles is invalid.");
            }
        }

        if let Some(username) = form.username.as_deref().filter(|u| !u.is_empty()) {
            if let Some(existing) = self.identities.find_by_username(username).await? {
                if Some(existing.id) != form.id {
                    errors.add("username", "Username has been taken.");
                }
            }
        }

        form.add_errors(&errors);
        Ok(errors)
    }

    /// 校验并保存；校验失败时不会尝试写入
    pub async fn submit(&self, form: &mut UserForm) -> SaveOutcome {
        match self.validate(form).await {
            Ok(errors) if errors.is_empty() => self.save(form).await,
            Ok(errors) => {
                metrics::counter!("srbac.user.rejected").increment(1);
                SaveOutcome::Rejected(errors)
            }
            Err(e) => {
                tracing::error!(error = %e, "User validation failed unexpectedly");
                metrics::counter!("srbac.user.failed").increment(1);
                SaveOutcome::Failed
            }
        }
    }

    /// 在单个事务内保存用户并重建角色分配，调用前须已通过校验
    pub async fn save(&self, form: &mut UserForm) -> SaveOutcome {
        let mut tx = match self.identities.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!(error = %e, "Failed to begin transaction");
                metrics::counter!("srbac.user.failed").increment(1);
                return SaveOutcome::Failed;
            }
        };

        match self.write(&mut tx, form).await {
            Ok(user) => match tx.commit().await {
                Ok(()) => {
                    tracing::info!(
                        user_id = %user.id,
                        username = %user.username,
                        roles = form.roles.len(),
                        created = form.is_new_user,
                        "User saved"
                    );
                    metrics::counter!("srbac.user.saved").increment(1);
                    form.set_user(user.clone());
                    form.id = Some(user.id);
                    form.is_new_user = false;
                    SaveOutcome::Saved(user)
                }
                Err(AppError::Rejected(errors)) => {
                    // 提交时约束复查失败（并发写入）
                    form.add_errors(&errors);
                    tracing::warn!(errors = %errors, "User save rejected at commit");
                    metrics::counter!("srbac.user.rejected").increment(1);
                    SaveOutcome::Rejected(errors)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to commit user save");
                    metrics::counter!("srbac.user.failed").increment(1);
                    SaveOutcome::Failed
                }
            },
            Err(AppError::Rejected(errors)) => {
                form.add_errors(&errors);
                Self::rollback(tx).await;
                tracing::warn!(errors = %errors, "User save rejected by store");
                metrics::counter!("srbac.user.rejected").increment(1);
                SaveOutcome::Rejected(errors)
            }
            Err(e) => {
                Self::rollback(tx).await;
                tracing::error!(error = %e, "User save failed, transaction rolled back");
                metrics::counter!("srbac.user.failed").increment(1);
                SaveOutcome::Failed
            }
        }
    }

    async fn write(&self, tx: &mut R::Tx, form: &mut UserForm) -> Result<User, AppError> {
        let mut draft = match form.user() {
            Some(user) if !form.is_new_user => UserDraft::from(user),
            _ => UserDraft::default(),
        };

        if form.is_new_user {
            draft.auth_key = self.security.generate_random_key(self.policy.auth_key_length);
            if form.password().is_none() {
                let generated = self
                    .security
                    .generate_random_key(self.policy.generated_password_length);
                form.password = Some(Secret::new(generated));
            }
            let password = form
                .password()
                .ok_or_else(|| AppError::internal_error("effective password missing"))?;
            draft.password_hash = self.security.generate_password_hash(password)?;
        } else if let Some(password) = form.password() {
            // 与当前哈希一致时不重新计算
            if !self.security.validate_password(password, &draft.password_hash) {
                draft.password_hash = self.security.generate_password_hash(password)?;
            }
        }

        draft.username = form.username.clone().unwrap_or_default();

        let id = tx.save_user(&draft).await?;
        let user = tx.reload(id).await?;

        let removed = tx.delete_assignments(user.id).await?;
        tracing::debug!(user_id = %user.id, removed, "Cleared role assignments");

        for role in &form.roles {
            tx.insert_assignment(&NewAssignment {
                user_id: user.id,
                item_name: role.clone(),
            })
            .await?;
        }

        Ok(user)
    }

    async fn rollback(tx: R::Tx) {
        if let Err(e) = tx.rollback().await {
            tracing::error!(error = %e, "Failed to roll back transaction");
        }
    }
}
