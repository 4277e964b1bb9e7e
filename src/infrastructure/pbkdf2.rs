//! PBKDF2 密钥派生模块
//! 用于从用户密码派生 AES-256 加密密钥

use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

/// PBKDF2 密钥派生参数
pub const DEFAULT_ITERATIONS: u32 = 310_000;
pub const MIN_ITERATIONS: u32 = 250_000;
/// 存储中读出的迭代次数上限，超出视为数据被篡改
pub const MAX_ITERATIONS: u32 = 5_000_000;
pub const SALT_LENGTH: usize = 32; // 32字节盐值
pub const KEY_LENGTH: usize = 32; // 32字节密钥（AES-256）

/// 生成随机盐值
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// 从密码和盐值派生密钥
///
/// # Arguments
/// * `password` - 用户密码
/// * `salt` - 盐值
/// * `iterations` - 迭代次数
///
/// # Returns
/// 返回派生出的密钥，离开作用域时清零
pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LENGTH]> {
    let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key[..]);
    key
}

/// 迭代次数是否在允许范围内
pub fn iterations_in_range(iterations: u32) -> bool {
    (MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations)
}
