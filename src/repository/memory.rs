//! In-memory identity store
//!
//! 进程内存储，用于嵌入式部署与测试。事务在 `begin` 时取快照供事务内读取，
//! 并记录自身的写操作；`commit` 时在持有写锁的情况下把这些操作重放到
//! 最新状态上，其他事务已提交的数据不受影响。同一用户的并发保存以最后提交者为准。

use super::{IdentityRepository, IdentityTransaction, RoleCatalog};
use crate::{
    error::{AppError, Result},
    models::{item::*, user::*},
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Vec<User>,
    items: Vec<Item>,
    assignments: Vec<Assignment>,
}

impl MemoryState {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn roles_of(&self, user_id: Uuid) -> Vec<String> {
        self.assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.item_name.clone())
            .collect()
    }

    /// 写入用户记录；用户名须唯一，更新时记录须存在
    fn put_user(&mut self, user: User) -> Result<()> {
        if self
            .users
            .iter()
            .any(|u| u.username == user.username && u.id != user.id)
        {
            return Err(AppError::rejected("username", "Username has been taken."));
        }

        match self.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => {
                existing.username = user.username;
                existing.password_hash = user.password_hash;
                existing.auth_key = user.auth_key;
                existing.updated_at = user.updated_at;
            }
            None => self.users.push(user),
        }
        Ok(())
    }

    fn clear_assignments(&mut self, user_id: Uuid) -> u64 {
        let before = self.assignments.len();
        self.assignments.retain(|a| a.user_id != user_id);
        (before - self.assignments.len()) as u64
    }

    /// 写入分配；用户与权限项须存在且不重复
    fn put_assignment(&mut self, assignment: Assignment) -> Result<()> {
        if self.user(assignment.user_id).is_none() {
            return Err(AppError::rejected("user_id", "User ID is invalid."));
        }
        if !self.items.iter().any(|i| i.name == assignment.item_name) {
            return Err(AppError::rejected("item_name", "Item name is invalid."));
        }
        if self
            .assignments
            .iter()
            .any(|a| a.user_id == assignment.user_id && a.item_name == assignment.item_name)
        {
            return Err(AppError::rejected(
                "item_name",
                "Item name has already been assigned.",
            ));
        }

        self.assignments.push(assignment);
        Ok(())
    }

    fn apply(&mut self, change: Change) -> Result<()> {
        match change {
            Change::PutUser(user) => self.put_user(user),
            Change::ClearAssignments(user_id) => {
                self.clear_assignments(user_id);
                Ok(())
            }
            Change::PutAssignment(assignment) => self.put_assignment(assignment),
        }
    }
}

/// 事务内记录的写操作，提交时按顺序重放
#[derive(Debug, Clone)]
enum Change {
    PutUser(User),
    ClearAssignments(Uuid),
    PutAssignment(Assignment),
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加权限项
    pub async fn add_item(&self, req: &CreateItemRequest) -> Result<Item> {
        req.validate()?;

        let mut state = self.state.write().await;
        if state.items.iter().any(|i| i.name == req.name) {
            return Err(AppError::rejected("name", "Name has already been taken."));
        }

        let now = Utc::now();
        let item = Item {
            name: req.name.clone(),
            kind: req.kind,
            description: req.description.clone(),
            class_name: req.class_name.clone(),
            created_at: now,
            updated_at: now,
        };
        state.items.push(item.clone());
        Ok(item)
    }

    /// 删除权限项，同时删除相关分配
    pub async fn remove_item(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        let before = state.items.len();
        state.items.retain(|i| i.name != name);
        state.assignments.retain(|a| a.item_name != name);
        state.items.len() != before
    }

    pub async fn find_rule(&self, name: &str) -> Option<Rule> {
        let state = self.state.read().await;
        state
            .items
            .iter()
            .find(|i| i.name == name)
            .cloned()
            .and_then(|item| Rule::try_from(item).ok())
    }

    /// 某用户的分配记录（按分配先后）
    pub async fn assignments(&self, user_id: Uuid) -> Vec<Assignment> {
        let state = self.state.read().await;
        state
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

#[async_trait]
impl IdentityRepository for InMemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let working = self.state.read().await.clone();
        Ok(MemoryTransaction {
            shared: Arc::clone(&self.state),
            working,
            changes: Vec::new(),
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.user(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn assigned_roles(&self, user_id: Uuid) -> Result<Vec<String>> {
        Ok(self.state.read().await.roles_of(user_id))
    }
}

#[async_trait]
impl RoleCatalog for InMemoryStore {
    async fn role_names(&self) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state
            .items
            .iter()
            .filter(|i| i.kind == ItemKind::Role)
            .map(|i| i.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

pub struct MemoryTransaction {
    shared: Arc<RwLock<MemoryState>>,
    /// 开始时的快照叠加本事务的写入，供事务内读取
    working: MemoryState,
    changes: Vec<Change>,
}

impl MemoryTransaction {
    fn record(&mut self, change: Change) -> Result<()> {
        self.working.apply(change.clone())?;
        self.changes.push(change);
        Ok(())
    }
}

#[async_trait]
impl IdentityTransaction for MemoryTransaction {
    async fn save_user(&mut self, draft: &UserDraft) -> Result<Uuid> {
        draft.validate()?;

        let now = Utc::now();
        let user = match draft.id {
            Some(id) => {
                let current = self
                    .working
                    .user(id)
                    .ok_or_else(|| AppError::not_found("user"))?;
                User {
                    id,
                    username: draft.username.clone(),
                    password_hash: draft.password_hash.clone(),
                    auth_key: draft.auth_key.clone(),
                    created_at: current.created_at,
                    updated_at: now,
                }
            }
            None => User {
                id: Uuid::new_v4(),
                username: draft.username.clone(),
                password_hash: draft.password_hash.clone(),
                auth_key: draft.auth_key.clone(),
                created_at: now,
                updated_at: now,
            },
        };

        let id = user.id;
        self.record(Change::PutUser(user))?;
        Ok(id)
    }

    async fn reload(&mut self, id: Uuid) -> Result<User> {
        self.working
            .user(id)
            .cloned()
            .ok_or_else(|| AppError::not_found("user"))
    }

    async fn delete_assignments(&mut self, user_id: Uuid) -> Result<u64> {
        let removed = self.working.clear_assignments(user_id);
        self.changes.push(Change::ClearAssignments(user_id));
        Ok(removed)
    }

    async fn insert_assignment(&mut self, assignment: &NewAssignment) -> Result<()> {
        assignment.validate()?;

        self.record(Change::PutAssignment(Assignment {
            user_id: assignment.user_id,
            item_name: assignment.item_name.clone(),
            created_at: Utc::now(),
        }))
    }

    /// 在当前共享状态上重放本事务的写入，约束重新检查，全部成功才生效
    async fn commit(self) -> Result<()> {
        let mut shared = self.shared.write().await;
        let mut next = shared.clone();
        for change in self.changes {
            next.apply(change)?;
        }
        *shared = next;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str) -> CreateItemRequest {
        CreateItemRequest {
            name: name.to_string(),
            kind: ItemKind::Role,
            description: None,
            class_name: None,
        }
    }

    fn draft(username: &str) -> UserDraft {
        UserDraft {
            id: None,
            username: username.to_string(),
            password_hash: "$argon2id$v=19$test".to_string(),
            auth_key: "auth-key".to_string(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.save_user(&draft("alice")).await.unwrap();

        assert!(store.find_by_id(id).await.unwrap().is_none());
        tx.rollback().await.unwrap();
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = InMemoryStore::new();
        store.add_item(&role("editor")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let id = tx.save_user(&draft("alice")).await.unwrap();
        tx.insert_assignment(&NewAssignment {
            user_id: id,
            item_name: "editor".to_string(),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.assigned_roles(id).await.unwrap(), vec!["editor"]);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.save_user(&draft("alice")).await.unwrap();

        match tx.save_user(&draft("alice")).await {
            Err(AppError::Rejected(errors)) => assert!(errors.has("username")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_item_rejected() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.save_user(&draft("alice")).await.unwrap();

        let result = tx
            .insert_assignment(&NewAssignment {
                user_id: id,
                item_name: "ghost".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_role_names_only_roles() {
        let store = InMemoryStore::new();
        store.add_item(&role("viewer")).await.unwrap();
        store.add_item(&role("editor")).await.unwrap();
        store
            .add_item(&CreateItemRequest {
                name: "post.update".to_string(),
                kind: ItemKind::Permission,
                description: None,
                class_name: None,
            })
            .await
            .unwrap();

        assert_eq!(store.role_names().await.unwrap(), vec!["editor", "viewer"]);
    }

    #[tokio::test]
    async fn test_interleaved_commits_keep_both_users() {
        let store = InMemoryStore::new();
        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();

        let alice = a.save_user(&draft("alice")).await.unwrap();
        let bob = b.save_user(&draft("bob")).await.unwrap();
        a.commit().await.unwrap();
        b.commit().await.unwrap();

        assert!(store.find_by_id(alice).await.unwrap().is_some());
        assert!(store.find_by_id(bob).await.unwrap().is_some());
        assert_eq!(store.user_count().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_same_username_second_commit_rejected() {
        let store = InMemoryStore::new();
        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();

        a.save_user(&draft("alice")).await.unwrap();
        b.save_user(&draft("alice")).await.unwrap();
        a.commit().await.unwrap();

        match b.commit().await {
            Err(AppError::Rejected(errors)) => assert!(errors.has("username")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_commit_rechecks_removed_item() {
        let store = InMemoryStore::new();
        store.add_item(&role("editor")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let id = tx.save_user(&draft("alice")).await.unwrap();
        tx.insert_assignment(&NewAssignment {
            user_id: id,
            item_name: "editor".to_string(),
        })
        .await
        .unwrap();
        assert!(store.remove_item("editor").await);

        match tx.commit().await {
            Err(AppError::Rejected(errors)) => assert!(errors.has("item_name")),
            other => panic!("unexpected result: {:?}", other),
        }
        // 提交失败时不留下部分写入
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_reassignment_replays_in_order() {
        let store = InMemoryStore::new();
        store.add_item(&role("editor")).await.unwrap();
        store.add_item(&role("viewer")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let id = tx.save_user(&draft("alice")).await.unwrap();
        for name in ["editor", "viewer"] {
            tx.insert_assignment(&NewAssignment {
                user_id: id,
                item_name: name.to_string(),
            })
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.delete_assignments(id).await.unwrap(), 2);
        tx.insert_assignment(&NewAssignment {
            user_id: id,
            item_name: "viewer".to_string(),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.assigned_roles(id).await.unwrap(), vec!["viewer"]);
    }
}
