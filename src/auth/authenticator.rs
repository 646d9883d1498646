use sqlx::PgConnection;
use thiserror::Error;

use crate::auth::password::{self, PasswordError};
use crate::models::user::{self, User};

/// Why a login attempt failed. The variants exist for internal logging; the
/// HTTP boundary collapses every credential-shaped failure into one uniform
/// response so callers cannot probe which usernames exist.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown user")]
    UnknownUser,

    #[error("user is not active")]
    InactiveUser,

    #[error("wrong password")]
    WrongPassword,

    #[error(transparent)]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Check a username/password pair against the shared-schema directory.
/// Lookup is restricted to non-deleted rows; only an active user with a
/// matching bcrypt hash authenticates.
pub async fn authenticate(
    conn: &mut PgConnection,
    username: &str,
    plaintext: &str,
) -> Result<User, AuthError> {
    let user = user::find_by_name(conn, username)
        .await?
        .ok_or(AuthError::UnknownUser)?;

    if !user.active {
        return Err(AuthError::InactiveUser);
    }

    if password::verify(plaintext, &user.password).await? {
        Ok(user)
    } else {
        Err(AuthError::WrongPassword)
    }
}
