//! 数据模型模块
//! 用户、权限项与角色分配

pub mod item;
pub mod user;
