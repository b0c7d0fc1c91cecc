//! Database repository layer
//!
//! 用户保存流程只依赖这里定义的 trait；具体存储（PostgreSQL 或内存）
//! 在组装时选定一次。

pub mod item_repo;
pub mod memory;
pub mod user_repo;

pub use item_repo::*;
pub use memory::*;
pub use user_repo::*;

use crate::{
    error::Result,
    models::{item::NewAssignment, user::{User, UserDraft}},
};
use async_trait::async_trait;
use uuid::Uuid;

/// 用户身份存储
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    type Tx: IdentityTransaction;

    /// 开启事务，用户与角色分配的写入都在其中完成
    async fn begin(&self) -> Result<Self::Tx>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// 用户当前的角色名，按分配先后排序
    async fn assigned_roles(&self, user_id: Uuid) -> Result<Vec<String>>;
}

/// 事务内的写操作
///
/// 记录自身约束不满足时返回 `AppError::Rejected`，其余错误视为意外。
#[async_trait]
pub trait IdentityTransaction: Send {
    /// 插入或更新用户，返回记录 id
    async fn save_user(&mut self, draft: &UserDraft) -> Result<Uuid>;

    /// 重新读取记录（获取数据库生成的字段）
    async fn reload(&mut self, id: Uuid) -> Result<User>;

    /// 删除用户的全部角色分配，返回删除行数
    async fn delete_assignments(&mut self, user_id: Uuid) -> Result<u64>;

    async fn insert_assignment(&mut self, assignment: &NewAssignment) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// 角色目录（只读）
#[async_trait]
pub trait RoleCatalog: Send + Sync {
    /// 当前所有 role 类型权限项的名称
    async fn role_names(&self) -> Result<Vec<String>>;
}
