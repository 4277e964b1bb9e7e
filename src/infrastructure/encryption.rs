//! AES-256-GCM 信封加密模块
//!
//! 密码 → PBKDF2-HMAC-SHA256 → 256 位密钥 → AES-256-GCM（分离式认证标签）。
//! 每次加密都使用新的随机盐值和 nonce，解密时先验证认证标签再解释明文。

use std::fmt;

use aes_gcm::{
    aead::{AeadCore, AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    domain::errors::{CustodyError, CustodyResult},
    infrastructure::pbkdf2::{self, SALT_LENGTH},
};

pub const IV_LENGTH: usize = 12;
pub const TAG_LENGTH: usize = 16;

/// 密封后的秘密（四个字段分开存储，外加 KDF 迭代次数）
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSecret {
    pub ciphertext: Vec<u8>,
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
    pub kdf_iterations: u32,
}

impl fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedSecret")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("kdf_iterations", &self.kdf_iterations)
            .finish_non_exhaustive()
    }
}

/// 秘密编解码器
#[derive(Debug, Clone)]
pub struct SecretCodec {
    iterations: u32,
}

impl Default for SecretCodec {
    fn default() -> Self {
        Self {
            iterations: pbkdf2::DEFAULT_ITERATIONS,
        }
    }
}

impl SecretCodec {
    /// 使用指定的 KDF 迭代次数（不得低于安全下限）
    pub fn new(iterations: u32) -> CustodyResult<Self> {
        if !pbkdf2::iterations_in_range(iterations) {
            return Err(CustodyError::validation(format!(
                "kdf iterations must be between {} and {}",
                pbkdf2::MIN_ITERATIONS,
                pbkdf2::MAX_ITERATIONS
            )));
        }
        Ok(Self { iterations })
    }

    /// 加密
    ///
    /// # Arguments
    /// * `plaintext` - 要加密的秘密
    /// * `password` - 用户密码
    pub fn seal(&self, plaintext: &[u8], password: &str) -> CustodyResult<SealedSecret> {
        let salt = pbkdf2::generate_salt();
        let key = pbkdf2::derive_key(password, &salt, self.iterations);

        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| CustodyError::internal(format!("invalid key: {}", e)))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(&nonce, b"", &mut buffer)
            .map_err(|_| CustodyError::internal("encryption failed"))?;

        Ok(SealedSecret {
            ciphertext: buffer,
            salt: salt.to_vec(),
            iv: nonce.to_vec(),
            auth_tag: tag.to_vec(),
            kdf_iterations: self.iterations,
        })
    }

    /// 解密
    ///
    /// 密码错误、任一字段被篡改或长度异常都返回同一个 `AuthenticationFailed`
    pub fn unseal(&self, sealed: &SealedSecret, password: &str) -> CustodyResult<Zeroizing<Vec<u8>>> {
        if sealed.salt.len() != SALT_LENGTH
            || sealed.iv.len() != IV_LENGTH
            || sealed.auth_tag.len() != TAG_LENGTH
            || !pbkdf2::iterations_in_range(sealed.kdf_iterations)
        {
            return Err(CustodyError::AuthenticationFailed);
        }

        let key = pbkdf2::derive_key(password, &sealed.salt, sealed.kdf_iterations);
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|_| CustodyError::AuthenticationFailed)?;

        let mut buffer = Zeroizing::new(sealed.ciphertext.clone());
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&sealed.iv),
                b"",
                &mut buffer,
                Tag::from_slice(&sealed.auth_tag),
            )
            .map_err(|_| CustodyError::AuthenticationFailed)?;

        Ok(buffer)
    }

    /// 解密为 UTF-8 字符串
    pub fn unseal_string(&self, sealed: &SealedSecret, password: &str) -> CustodyResult<Zeroizing<String>> {
        let bytes = self.unseal(sealed, password)?;
        let text = std::str::from_utf8(&bytes).map_err(|_| CustodyError::AuthenticationFailed)?;
        Ok(Zeroizing::new(text.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test test test test test test test test test test test junk";

    #[test]
    fn test_seal_unseal_round_trip() {
        let codec = SecretCodec::default();
        let sealed = codec.seal(SECRET.as_bytes(), "pw12345").unwrap();

        assert_eq!(sealed.salt.len(), SALT_LENGTH);
        assert_eq!(sealed.iv.len(), IV_LENGTH);
        assert_eq!(sealed.auth_tag.len(), TAG_LENGTH);
        assert_eq!(sealed.kdf_iterations, pbkdf2::DEFAULT_ITERATIONS);
        assert_ne!(sealed.ciphertext, SECRET.as_bytes());

        let plain = codec.unseal_string(&sealed, "pw12345").unwrap();
        assert_eq!(plain.as_str(), SECRET);
    }

    #[test]
    fn test_seal_is_not_deterministic() {
        let codec = SecretCodec::default();
        let a = codec.seal(SECRET.as_bytes(), "pw12345").unwrap();
        let b = codec.seal(SECRET.as_bytes(), "pw12345").unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_tampering_any_field_fails_authentication() {
        let codec = SecretCodec::default();
        let sealed = codec.seal(SECRET.as_bytes(), "pw12345").unwrap();

        let mut tampered_variants = Vec::new();

        let mut t = sealed.clone();
        t.ciphertext[0] ^= 0x01;
        tampered_variants.push(("ciphertext", t));

        let mut t = sealed.clone();
        t.auth_tag[15] ^= 0x80;
        tampered_variants.push(("auth_tag", t));

        let mut t = sealed.clone();
        t.salt[7] ^= 0x01;
        tampered_variants.push(("salt", t));

        let mut t = sealed.clone();
        t.iv[0] ^= 0x01;
        tampered_variants.push(("iv", t));

        for (field, tampered) in tampered_variants {
            let result = codec.unseal(&tampered, "pw12345");
            assert!(
                matches!(result, Err(CustodyError::AuthenticationFailed)),
                "tampered {} should fail authentication",
                field
            );
        }
    }

    #[test]
    fn test_wrong_password_matches_tamper_error() {
        let codec = SecretCodec::default();
        let sealed = codec.seal(SECRET.as_bytes(), "pw12345").unwrap();

        let err = codec.unseal(&sealed, "pw12346").unwrap_err();
        assert!(matches!(err, CustodyError::AuthenticationFailed));
        assert_eq!(err.to_string(), "invalid password");
    }

    #[test]
    fn test_malformed_lengths_fail_without_panicking() {
        let codec = SecretCodec::default();
        let mut sealed = codec.seal(SECRET.as_bytes(), "pw12345").unwrap();
        sealed.iv.truncate(8);

        assert!(matches!(
            codec.unseal(&sealed, "pw12345"),
            Err(CustodyError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_out_of_range_iterations_rejected() {
        assert!(SecretCodec::new(1_000).is_err());
        assert!(SecretCodec::new(pbkdf2::MIN_ITERATIONS).is_ok());

        let codec = SecretCodec::default();
        let mut sealed = codec.seal(SECRET.as_bytes(), "pw12345").unwrap();
        sealed.kdf_iterations = u32::MAX;
        assert!(matches!(
            codec.unseal(&sealed, "pw12345"),
            Err(CustodyError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_debug_does_not_print_ciphertext() {
        let codec = SecretCodec::default();
        let sealed = codec.seal(SECRET.as_bytes(), "pw12345").unwrap();
        let printed = format!("{:?}", sealed);
        assert!(!printed.contains("salt"));
        assert!(printed.contains("ciphertext_len"));
    }
}
