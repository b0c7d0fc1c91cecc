//! 安全工具：随机密钥生成与密码哈希

use crate::{auth::password::PasswordHasher, config::SecurityConfig, error::AppError};
use rand::{distributions::Alphanumeric, Rng};

/// 用户保存流程依赖的安全能力
pub trait Security: Send + Sync {
    /// 生成指定长度的随机字符串
    fn generate_random_key(&self, length: usize) -> String;

    /// 计算密码哈希
    fn generate_password_hash(&self, password: &str) -> Result<String, AppError>;

    /// 校验密码是否与哈希匹配
    fn validate_password(&self, password: &str, hash: &str) -> bool;
}

/// 基于 Argon2id 与系统随机源的实现
#[derive(Clone)]
pub struct Argon2Security {
    hasher: PasswordHasher,
}

impl Argon2Security {
    pub fn new(hasher: PasswordHasher) -> Self {
        Self { hasher }
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        Ok(Self::new(PasswordHasher::from_config(config)?))
    }
}

impl Security for Argon2Security {
    fn generate_random_key(&self, length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }

    fn generate_password_hash(&self, password: &str) -> Result<String, AppError> {
        self.hasher.hash(password)
    }

    fn validate_password(&self, password: &str, hash: &str) -> bool {
        self.hasher.verify(password, hash)
    }
}
