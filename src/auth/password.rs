use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Marker this crate writes in front of the Argon2 PHC string.
pub const ARGON2_PREFIX: &str = "argon2";

/// Prefixes of values that are already password hashes.
pub const HASH_PREFIXES: [&str; 3] = ["pbkdf2_", "bcrypt$", "argon2$"];

/// `argon2$` values only count when the rest parses as a PHC string, so a
/// plaintext that merely starts with the marker still gets hashed.
pub fn is_hashed(value: &str) -> bool {
    match value.strip_prefix(ARGON2_PREFIX) {
        Some(phc) if phc.starts_with('$') => PasswordHash::new(phc)
            .map(|h| h.hash.is_some() && h.salt.is_some())
            .unwrap_or(false),
        _ => HASH_PREFIXES.iter().any(|p| value.starts_with(p)),
    }
}

/// Hashes with Argon2 defaults, encoded as `argon2$argon2id$v=19$...`.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(format!("{ARGON2_PREFIX}{phc}"))
}

pub fn verify_password(plain: &str, encoded: &str) -> anyhow::Result<bool> {
    let Some(phc) = encoded
        .strip_prefix(ARGON2_PREFIX)
        .filter(|rest| rest.starts_with('$'))
    else {
        anyhow::bail!("unsupported password hash scheme");
    };
    let parsed = PasswordHash::new(phc).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
