//! Password hashing, credential checks and access tokens.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::{
    model::User,
    repository::{Fields, Logic, Repository, RepositoryError},
};

pub const TOKEN_TYPE: &str = "bearer";

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("username already registered")]
    UsernameTaken,

    /// The insert hit a unique index, on either username or email.
    #[error("username or email already registered")]
    AlreadyRegistered,

    #[error("password hashing error")]
    PasswordHash,

    /// Missing, malformed, badly signed or expired token.
    #[error("invalid token")]
    InvalidToken,

    /// The configured lifetime pushes the expiry past the representable range.
    #[error("token expiry out of range")]
    ExpiryOutOfRange,

    #[error("token encoding error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub exp: usize,
}

/// Hash a password using Argon2id with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Check a password against a stored hash. Unparseable hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Signs and checks HS256 access tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: &[u8], expiry: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            expiry,
        }
    }

    /// Issue a token for `user` that expires after the configured lifetime.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_with_expiry(user, self.expiry)
    }

    pub fn issue_with_expiry(&self, user: &User, expiry: Duration) -> Result<String, AuthError> {
        let exp = Utc::now()
            .checked_add_signed(expiry)
            .ok_or(AuthError::ExpiryOutOfRange)?
            .timestamp()
            .max(0) as usize;
        let claims = Claims {
            sub: user.username.clone(),
            user_id: user.id,
            exp,
        };

        Ok(encode(&Header::new(ALGORITHM), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(ALGORITHM))
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "rejected access token");
                AuthError::InvalidToken
            })
    }
}

/// Look up `username` and check `password` against its stored hash.
pub async fn authenticate(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let user = find_by_username(pool, username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(password, &user.hashed_password) {
        tracing::info!(username, "password mismatch");
        return Err(AuthError::InvalidCredentials);
    }
    Ok(user)
}

/// Create a user with a hashed password, rejecting taken usernames and emails.
pub async fn register(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    if find_by_username(pool, username).await?.is_some() {
        return Err(AuthError::UsernameTaken);
    }

    let hashed_password = hash_password(password)?;
    let fields = Fields::new()
        .set("username", username)
        .set("email", email)
        .set("hashed_password", hashed_password);

    match Repository::<User>::new(pool).create(fields).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, username, "user registered");
            Ok(user)
        }
        Err(RepositoryError::Conflict(_)) => Err(AuthError::AlreadyRegistered),
        Err(err) => Err(err.into()),
    }
}

async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>, AuthError> {
    let users = Repository::<User>::new(pool)
        .filter(Fields::new().set("username", username), Logic::And)
        .await?;
    Ok(users.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn tokens() -> TokenService {
        TokenService::new(b"test-signing-key", Duration::minutes(30))
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("pw1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("pw1", &hash));
        assert!(!verify_password("pw2", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        assert_ne!(hash_password("pw1").unwrap(), hash_password("pw1").unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("pw1", "pw1"));
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let pool = test_pool().await;
        let user = register(&pool, "alice", "a@x.com", "pw1").await.unwrap();
        assert_ne!(user.hashed_password, "pw1");

        let found = authenticate(&pool, "alice", "pw1").await.unwrap();
        assert_eq!(found.id, user.id);

        assert!(matches!(
            authenticate(&pool, "alice", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&pool, "nobody", "pw1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_taken_username_and_email() {
        let pool = test_pool().await;
        register(&pool, "alice", "a@x.com", "pw1").await.unwrap();

        assert!(matches!(
            register(&pool, "alice", "b@x.com", "pw2").await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(matches!(
            register(&pool, "bob", "a@x.com", "pw2").await,
            Err(AuthError::AlreadyRegistered)
        ));
        assert_eq!(Repository::<User>::new(&pool).count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let pool = test_pool().await;
        let user = register(&pool, "alice", "a@x.com", "pw1").await.unwrap();
        let tokens = tokens();

        let token = tokens.issue(&user).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.user_id, user.id);

        let now = Utc::now().timestamp() as usize;
        assert!(claims.exp > now + 29 * 60 && claims.exp <= now + 30 * 60 + 1);
    }

    #[test]
    fn test_verify_rejects_bad_tokens() {
        let user = User {
            id: 1,
            username: "alice".to_owned(),
            email: "a@x.com".to_owned(),
            hashed_password: String::new(),
        };
        let tokens = tokens();

        let expired = tokens
            .issue_with_expiry(&user, Duration::minutes(-10))
            .unwrap();
        assert!(matches!(tokens.verify(&expired), Err(AuthError::InvalidToken)));

        let foreign = TokenService::new(b"another-key", Duration::minutes(30))
            .issue(&user)
            .unwrap();
        assert!(matches!(tokens.verify(&foreign), Err(AuthError::InvalidToken)));

        assert!(matches!(tokens.verify("not.a.token"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_issue_rejects_unrepresentable_expiry() {
        let user = User {
            id: 1,
            username: "alice".to_owned(),
            email: "a@x.com".to_owned(),
            hashed_password: String::new(),
        };

        let result = tokens().issue_with_expiry(&user, Duration::days(100_000_000));
        assert!(matches!(result, Err(AuthError::ExpiryOutOfRange)));
    }
}
