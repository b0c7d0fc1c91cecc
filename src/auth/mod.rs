//! 安全模块：密码哈希与随机密钥

pub mod password;
pub mod security;

pub use password::PasswordHasher;
pub use security::{Argon2Security, Security};
