use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::{info, warn};
use validator::Validate;

use super::dto::{LoginRequest, RegisterRequest};
use crate::{
    accounts::{
        repo::AccountRepo,
        repo_types::{NewUser, User},
    },
    error::{AppError, AppResult, FieldErrors},
    store::Store,
};

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2 hash_password: {e}"))?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("argon2 parse hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Validates the form, hashes the password and inserts the account.
pub async fn register_user(store: &dyn Store, mut req: RegisterRequest) -> AppResult<User> {
    req.username = req.username.trim().to_string();
    req.email = req.email.trim().to_lowercase();

    let mut errors = FieldErrors::new();
    if let Err(e) = req.validate() {
        errors.extend_from(&e);
    }
    if !req.username.is_empty() && !is_valid_username(&req.username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    if req.password2.as_deref().is_some_and(|p2| p2 != req.password) {
        errors.add("password", "Password fields didn't match.");
    }
    if let Err(e) = errors.into_result() {
        warn!(username = %req.username, "registration rejected by validation");
        return Err(e);
    }

    let password_hash = hash_password(&req.password)?;
    let created = store
        .create_user(NewUser {
            username: req.username.clone(),
            email: req.email,
            password_hash,
            bio: req.bio,
        })
        .await?;

    let Some(user) = created else {
        warn!(username = %req.username, "username already registered");
        return Err(AppError::Validation(FieldErrors::single(
            "username",
            "A user with that username already exists.",
        )));
    };

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Checks the credentials; every failure looks the same to the caller.
pub async fn authenticate(store: &dyn Store, req: LoginRequest) -> AppResult<User> {
    let invalid = || {
        AppError::Validation(FieldErrors::single(
            "non_field_errors",
            "Unable to log in with provided credentials.",
        ))
    };

    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(invalid());
    }

    let Some(user) = store.find_user_by_username(username).await? else {
        warn!(%username, "login unknown username");
        return Err(invalid());
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn register_req(username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: format!("{username}@Example.com"),
            password: password.into(),
            password2: None,
            bio: String::new(),
        }
    }

    fn field_errors(err: AppError) -> FieldErrors {
        match err {
            AppError::Validation(fields) => fields,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn username_pattern() {
        assert!(is_valid_username("alice_01"));
        assert!(is_valid_username("a.b@c+d-e"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("semi;colon"));
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("Secur3P@ssw0rd!").expect("hashing should succeed");
        assert!(verify_password("Secur3P@ssw0rd!", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[tokio::test]
    async fn register_normalizes_and_stores_hash() {
        let store = MemoryStore::new();
        let user = register_user(&store, register_req("  alice ", "testpass123"))
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");
        assert_ne!(user.password_hash, "testpass123");
    }

    #[tokio::test]
    async fn register_reports_every_bad_field() {
        let store = MemoryStore::new();
        let mut req = register_req("bad name", "short");
        req.email = "nope".into();
        let fields = field_errors(register_user(&store, req).await.unwrap_err());
        assert!(fields.0.contains_key("username"));
        assert!(fields.0.contains_key("email"));
        assert!(fields.0.contains_key("password"));
    }

    #[tokio::test]
    async fn register_rejects_mismatched_confirmation_and_duplicates() {
        let store = MemoryStore::new();
        let mut req = register_req("bob", "testpass123");
        req.password2 = Some("testpass124".into());
        let fields = field_errors(register_user(&store, req).await.unwrap_err());
        assert_eq!(fields.0["password"], vec!["Password fields didn't match."]);

        register_user(&store, register_req("bob", "testpass123"))
            .await
            .unwrap();
        let fields = field_errors(
            register_user(&store, register_req("bob", "testpass123"))
                .await
                .unwrap_err(),
        );
        assert!(fields.0.contains_key("username"));
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let store = MemoryStore::new();
        let user = register_user(&store, register_req("carol", "testpass123"))
            .await
            .unwrap();

        let ok = authenticate(
            &store,
            LoginRequest {
                username: "carol".into(),
                password: "testpass123".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(ok.id, user.id);

        let err = authenticate(
            &store,
            LoginRequest {
                username: "carol".into(),
                password: "wrong".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(field_errors(err).0.contains_key("non_field_errors"));

        let err = authenticate(
            &store,
            LoginRequest {
                username: "nobody".into(),
                password: "testpass123".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
