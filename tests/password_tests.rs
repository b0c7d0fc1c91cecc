//! 密码哈希功能单元测试
//!
//! 测试 Argon2id 密码哈希、验证与密码策略

use srbac_admin::auth::password::PasswordHasher;
use srbac_admin::config::SecurityConfig;

mod common;
use common::{create_test_config, test_security_config};

fn hasher() -> PasswordHasher {
    PasswordHasher::from_config(&test_security_config()).expect("valid test params")
}

// ==================== 密码哈希测试 ====================

#[test]
fn test_hash_produces_argon2id_phc_string() {
    let hash = hasher().hash("secret1").unwrap();

    assert!(hash.starts_with("$argon2id$"));
    assert!(hash.contains("m=8,t=1,p=1"));
}

#[test]
fn test_verify_correct_and_wrong_password() {
    let hasher = hasher();
    let hash = hasher.hash("MySecurePassword123!").unwrap();

    assert!(hasher.verify("MySecurePassword123!", &hash));
    assert!(!hasher.verify("mysecurepassword123!", &hash));
    assert!(!hasher.verify("", &hash));
}

#[test]
fn test_verify_uses_params_embedded_in_hash() {
    // 以不同参数计算的哈希仍可验证
    let other = PasswordHasher::from_config(&SecurityConfig {
        argon2_memory_kib: 16,
        argon2_iterations: 2,
        argon2_parallelism: 1,
        ..SecurityConfig::default()
    })
    .unwrap();
    let hash = other.hash("secret1").unwrap();

    assert!(hasher().verify("secret1", &hash));
}

#[test]
fn test_verify_rejects_malformed_hash() {
    let hasher = hasher();
    assert!(!hasher.verify("secret1", ""));
    assert!(!hasher.verify("secret1", "$2y$13$abcdefghijklmnopqrstuv"));
}

#[test]
fn test_unicode_password() {
    let hasher = hasher();
    let hash = hasher.hash("密码テスト🔐").unwrap();
    assert!(hasher.verify("密码テスト🔐", &hash));
}

// ==================== 密码策略测试 ====================

#[test]
fn test_policy_minimum_length() {
    let config = create_test_config();

    let message = PasswordHasher::validate_password_policy("12345", &config.security);
    assert_eq!(
        message.as_deref(),
        Some("Password should contain at least 6 characters.")
    );
    assert!(PasswordHasher::validate_password_policy("123456", &config.security).is_none());
}

#[test]
fn test_policy_counts_characters_not_bytes() {
    let config = SecurityConfig {
        password_min_length: 6,
        ..SecurityConfig::default()
    };
    // 五个字符，十五个字节
    assert!(PasswordHasher::validate_password_policy("密码密码密", &config).is_some());
    assert!(PasswordHasher::validate_password_policy("密码密码密码", &config).is_none());
}

#[test]
fn test_policy_respects_configured_length() {
    let config = SecurityConfig {
        password_min_length: 12,
        ..SecurityConfig::default()
    };
    let message = PasswordHasher::validate_password_policy("secret123", &config).unwrap();
    assert!(message.contains("12"));
}
