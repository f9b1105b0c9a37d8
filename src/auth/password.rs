use crate::error::AppResult;

/// Hashes a password with bcrypt. Runs on the blocking pool since bcrypt is CPU bound.
pub async fn hash(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hashed)
}

/// Checks a password against a stored bcrypt hash.
///
/// A malformed stored hash counts as a mismatch rather than an error, so callers
/// can answer with the same generic credentials message in both cases.
pub async fn verify(password: &str, hashed: &str) -> AppResult<bool> {
    let password = password.to_owned();
    let hashed = hashed.to_owned();
    let ok = tokio::task::spawn_blocking(move || match bcrypt::verify(password, &hashed) {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    })
    .await?;
    Ok(ok)
}
