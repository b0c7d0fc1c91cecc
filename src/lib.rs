//! RBAC 管理库
//! 用户保存（含角色分配同步）与规则编辑视图

pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod models;
pub mod repository;
pub mod services;
pub mod telemetry;
pub mod views;
