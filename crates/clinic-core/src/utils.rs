//! 通用工具函数

use sha2::{Digest, Sha256};

/// 计算密码哈希
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 校验密码
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    hash_password(password) == password_hash
}

/// 简单的邮箱格式验证
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// 提取邮箱域名（小写）
pub fn email_domain(email: &str) -> Option<String> {
    email.split_once('@').map(|(_, domain)| domain.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_roundtrip() {
        let hash = hash_password("secret123");
        assert!(verify_password("secret123", &hash));
        assert!(!verify_password("secret124", &hash));
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("a@university.edu"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("@university.edu"));
        assert!(!is_valid_email("a@invalid"));
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(
            email_domain("A@University.EDU"),
            Some("university.edu".to_string())
        );
        assert_eq!(email_domain("invalid"), None);
    }
}
