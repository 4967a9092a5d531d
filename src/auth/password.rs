use crate::error::AppError;

pub fn hash_password(secret: &str, cost: u32) -> Result<String, AppError> {
    Ok(bcrypt::hash(secret, cost)?)
}

/// Malformed digests count as a mismatch rather than an error.
pub fn verify_password(secret: &str, digest: &str) -> bool {
    bcrypt::verify(secret, digest).unwrap_or(false)
}
