/// Password hashing and password policy
///
/// Hashes use Argon2id (64 MB memory, 3 iterations, 4 lanes, 32-byte
/// output) in PHC string format, so parameters travel with the hash.
///
/// New passwords must pass [`validate_password_policy`]:
///
/// - at least 8 characters
/// - not entirely numeric
/// - not one of the well-known common passwords
/// - not too similar to the username or other personal attributes
///
/// # Example
///
/// ```
/// use corpdesk_shared::auth::password::{hash_password, verify_password, validate_password_policy};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// validate_password_policy("granite-otter-42", &["employee1"])?;
///
/// let hash = hash_password("granite-otter-42")?;
/// assert!(verify_password("granite-otter-42", &hash)?);
/// assert!(!verify_password("wrong_password", &hash)?);
/// # Ok(())
/// # }
/// ```

use std::fmt;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum password length, in characters
pub const MIN_LENGTH: usize = 8;

/// Similarity ratio at or above which a password counts as too similar to a
/// personal attribute
pub const MAX_SIMILARITY: f64 = 0.7;

const COMMON_PASSWORDS: &[&str] = &[
    "123456", "123456789", "12345678", "password", "qwerty", "qwerty123", "1234567890",
    "1234567", "password1", "password123", "111111", "123123", "abc123", "iloveyou",
    "admin123", "welcome", "welcome1", "letmein", "monkey", "dragon", "football",
    "baseball", "sunshine", "princess", "trustno1", "passw0rd", "superman", "michael",
    "shadow", "master", "qwertyuiop", "1q2w3e4r", "asdfghjkl", "zaq12wsx", "changeme",
    "administrator", "p@ssw0rd", "starwars", "whatever", "computer",
];

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// The password fails one or more policy rules
    #[error("{}", join_violations(.0))]
    Weak(Vec<PolicyViolation>),
}

/// A failed password policy rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    TooShort,
    EntirelyNumeric,
    TooCommon,
    TooSimilar,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyViolation::TooShort => write!(
                f,
                "This password is too short. It must contain at least {MIN_LENGTH} characters."
            ),
            PolicyViolation::EntirelyNumeric => f.write_str("This password is entirely numeric."),
            PolicyViolation::TooCommon => f.write_str("This password is too common."),
            PolicyViolation::TooSimilar => {
                f.write_str("The password is too similar to your personal information.")
            }
        }
    }
}

fn join_violations(violations: &[PolicyViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hashes a password using Argon2id with a random 16-byte salt
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a PHC hash in constant time
///
/// Returns `Ok(false)` on a wrong password and `Err` on an unparseable hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks a new password against every policy rule
///
/// `attributes` are the user's personal values (username, names, email) that
/// the password must not resemble.
///
/// # Errors
///
/// Returns `PasswordError::Weak` listing every failed rule
pub fn validate_password_policy(password: &str, attributes: &[&str]) -> Result<(), PasswordError> {
    let mut violations = Vec::new();
    let lowered = password.to_lowercase();

    if password.chars().count() < MIN_LENGTH {
        violations.push(PolicyViolation::TooShort);
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        violations.push(PolicyViolation::EntirelyNumeric);
    }
    if COMMON_PASSWORDS.contains(&lowered.trim()) {
        violations.push(PolicyViolation::TooCommon);
    }
    if is_too_similar(&lowered, attributes) {
        violations.push(PolicyViolation::TooSimilar);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(PasswordError::Weak(violations))
    }
}

/// Compares the password with each attribute and with each word of it
/// (an email splits into `alice`, `example`, `com`)
fn is_too_similar(password: &str, attributes: &[&str]) -> bool {
    attributes.iter().any(|attribute| {
        let attribute = attribute.to_lowercase();
        if attribute.is_empty() {
            return false;
        }

        std::iter::once(attribute.as_str())
            .chain(attribute.split(|c: char| !c.is_alphanumeric()))
            .filter(|part| part.chars().count() >= 3)
            .any(|part| similarity(password, part) >= MAX_SIMILARITY)
    })
}

/// Ratio `2 * M / T` where `M` is the longest common subsequence length and
/// `T` the combined length, 1.0 for identical strings
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    2.0 * prev[b.len()] as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violations(password: &str, attributes: &[&str]) -> Vec<PolicyViolation> {
        match validate_password_policy(password, attributes) {
            Ok(()) => Vec::new(),
            Err(PasswordError::Weak(v)) => v,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password").unwrap();

        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(matches!(
            verify_password("password", "invalid_hash"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_policy_accepts_reasonable_password() {
        assert!(violations("granite-otter-42", &["employee1", "Jane", "jane@corp.example"]).is_empty());
    }

    #[test]
    fn test_policy_too_short() {
        assert_eq!(violations("k9#vQ", &[]), vec![PolicyViolation::TooShort]);
    }

    #[test]
    fn test_policy_entirely_numeric() {
        assert_eq!(violations("90817263", &[]), vec![PolicyViolation::EntirelyNumeric]);
    }

    #[test]
    fn test_policy_common_password_any_case() {
        assert_eq!(violations("PassWord123", &[]), vec![PolicyViolation::TooCommon]);
    }

    #[test]
    fn test_policy_reports_every_failure() {
        let v = violations("123456", &[]);
        assert!(v.contains(&PolicyViolation::TooShort));
        assert!(v.contains(&PolicyViolation::EntirelyNumeric));
        assert!(v.contains(&PolicyViolation::TooCommon));
    }

    #[test]
    fn test_policy_similar_to_username() {
        assert_eq!(
            violations("employee12", &["employee1"]),
            vec![PolicyViolation::TooSimilar]
        );
        assert_eq!(
            violations("margaretta!", &["m.hamilton@corp.example", "Margaret"]),
            vec![PolicyViolation::TooSimilar]
        );
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("abcd", "wxyz"), 0.0);
        assert_eq!(similarity("abcd", "abxy"), 0.5);
    }

    #[test]
    fn test_weak_error_message_lists_rules() {
        let err = validate_password_policy("1234", &[]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("too short"));
        assert!(message.contains("entirely numeric"));
    }
}
