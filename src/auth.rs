/*!
Password hashing, password checking, and session keys.

Passwords are stored as bcrypt hashes in the `users` table. Logging in
successfully issues a random session key, which then has to accompany
project store requests (see `inter::key_authenticate()`).
*/
use std::time::Duration;

use rand::{distributions, Rng};
use time::OffsetDateTime;

use crate::store::{AccountStore, DbError};

pub const DEFAULT_BCRYPT_COST: u32 = 10;
pub const DEFAULT_KEY_LENGTH: usize = 32;
pub const DEFAULT_KEY_LIFETIME: Duration = Duration::from_secs(60 * 60 * 8);

const KEY_CHARS: &[char] = &[
    'a','b','c','d','e','f','g','h','i','j','k','l','m',
    'n','o','p','q','r','s','t','u','v','w','x','y','z',
    'A','B','C','D','E','F','G','H','I','J','K','L','M',
    'N','O','P','Q','R','S','T','U','V','W','X','Y','Z',
    '0','1','2','3','4','5','6','7','8','9',
];

#[derive(Debug, PartialEq)]
pub enum AuthResult {
    Ok,
    NoSuchUser,
    BadPassword,
    InvalidKey,
    Key(String),
}

#[derive(Clone, Debug)]
pub struct SessionKey {
    pub key: String,
    pub issued: OffsetDateTime,
}

impl SessionKey {
    pub fn generate(length: usize) -> Self {
        // KEY_CHARS is a nonempty constant, so this can't fail.
        let dist = distributions::Slice::new(KEY_CHARS).unwrap();
        let key: String = rand::thread_rng()
            .sample_iter(&dist)
            .take(length.max(1))
            .collect();

        Self { key, issued: OffsetDateTime::now_utc() }
    }

    fn expired(&self, lifetime: Duration) -> bool {
        OffsetDateTime::now_utc() - self.issued > lifetime
    }
}

/// bcrypt is deliberately slow, so it runs off the async worker threads.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| format!("Password hashing task failed: {}", &e))?
        .map_err(|e| format!("Unable to hash password: {}", &e))
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| format!("Password checking task failed: {}", &e))?
        .map_err(|e| format!("Unable to check password: {}", &e))
}

/**
Check `password` for the user with `email`; if it's good, generate and store
a new session key and return it as `AuthResult::Key`.
*/
pub async fn check_password_and_issue_key(
    store: &dyn AccountStore,
    email: &str,
    password: &str,
    key_length: usize,
) -> Result<AuthResult, DbError> {
    log::trace!("check_password_and_issue_key( {:?}, [ password ] ) called.", email);

    let user = match store.get_user_by_email(email).await? {
        Some(u) => u,
        None => { return Ok(AuthResult::NoSuchUser); },
    };

    if !verify_password(password, &user.password).await? {
        return Ok(AuthResult::BadPassword);
    }

    let key = SessionKey::generate(key_length);
    store.set_key(email, &key).await?;
    log::trace!("Issued key to {:?}.", email);

    Ok(AuthResult::Key(key.key))
}

pub async fn check_key(
    store: &dyn AccountStore,
    email: &str,
    key: &str,
    lifetime: Duration,
) -> Result<AuthResult, DbError> {
    log::trace!("check_key( {:?}, [ key ] ) called.", email);

    match store.get_key(email).await? {
        None => Ok(AuthResult::InvalidKey),
        Some(k) if k.key != key => Ok(AuthResult::InvalidKey),
        Some(k) if k.expired(lifetime) => {
            log::trace!("Key for {:?} expired (issued {}).", email, &k.issued);
            Ok(AuthResult::InvalidKey)
        },
        Some(_) => Ok(AuthResult::Ok),
    }
}
