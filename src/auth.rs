// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Users, password hashing and bearer tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Bearer tokens are HS256
//! JSON Web Tokens whose subject is the user id.

use crate::base::RecordId;
use crate::store::{Collection, Document, MemoryCollection};
use crate::LedgerError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A registered account holder. The password hash is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    id: RecordId,
    name: String,
    email: String,
    #[serde(skip_serializing)]
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl User {
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Document for User {
    const COLLECTION: &'static str = "user";

    fn id(&self) -> RecordId {
        self.id
    }
}

/// Sign-up request.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn credential_error(err: impl std::fmt::Display) -> LedgerError {
    LedgerError::Credential(err.to_string())
}

/// Hashes a password with Argon2id and a random salt.
///
/// # Errors
///
/// [`LedgerError::Credential`] if the hasher rejects its input.
pub fn hash_password(password: &str) -> Result<String, LedgerError> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>()).map_err(credential_error)?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(credential_error)
}

/// Checks a password against a stored PHC string.
///
/// Malformed stored hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(hash) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

/// Registered claims carried by a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated user.
    pub sub: RecordId,
    /// Expiry as unix seconds.
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> RecordId {
        self.sub
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Issues and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: TimeDelta,
}

impl TokenIssuer {
    pub fn new(secret: &str, lifetime: TimeDelta) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
        }
    }

    /// # Errors
    ///
    /// [`LedgerError::Credential`] if the token cannot be signed.
    pub fn issue(&self, user_id: RecordId) -> Result<String, LedgerError> {
        self.issue_at(user_id, Utc::now())
    }

    fn issue_at(&self, user_id: RecordId, now: DateTime<Utc>) -> Result<String, LedgerError> {
        let claims = Claims {
            sub: user_id,
            exp: (now + self.lifetime).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(credential_error)
    }

    /// # Errors
    ///
    /// [`LedgerError::InvalidToken`] if the token is malformed, was not signed
    /// with this issuer's secret, or has expired.
    pub fn verify(&self, token: &str) -> Result<Claims, LedgerError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                LedgerError::InvalidToken
            })
    }
}

/// Registration, lookup and login.
pub struct UserService {
    users: Arc<dyn Collection<User>>,
    tokens: TokenIssuer,
    /// Serializes the email uniqueness check with the insert.
    registration: Mutex<()>,
}

impl UserService {
    pub fn new(users: Arc<dyn Collection<User>>, tokens: TokenIssuer) -> Self {
        Self {
            users,
            tokens,
            registration: Mutex::new(()),
        }
    }

    pub fn in_memory(tokens: TokenIssuer) -> Self {
        Self::new(Arc::new(MemoryCollection::<User>::new()), tokens)
    }

    /// # Errors
    ///
    /// - [`LedgerError::InvalidField`] - Empty name or password, or an email without `@`.
    /// - [`LedgerError::EmailTaken`] - The email is already registered.
    pub fn register(&self, registration: Registration) -> Result<User, LedgerError> {
        let email = normalize_email(&registration.email);
        if registration.name.trim().is_empty() {
            return Err(LedgerError::InvalidField {
                field: "name",
                reason: "must not be empty",
            });
        }
        if !email.contains('@') {
            return Err(LedgerError::InvalidField {
                field: "email",
                reason: "must be an email address",
            });
        }
        if registration.password.is_empty() {
            return Err(LedgerError::InvalidField {
                field: "password",
                reason: "must not be empty",
            });
        }

        let _guard = self.registration.lock();
        if self.lookup(&email)?.is_some() {
            return Err(LedgerError::EmailTaken);
        }

        let user = User {
            id: RecordId::new(),
            name: registration.name.trim().to_string(),
            email,
            password_hash: hash_password(&registration.password)?,
            created_at: Utc::now(),
        };
        self.users.insert(user.clone())?;
        info!(user = %user.id, "user registered");
        Ok(user)
    }

    fn lookup(&self, email: &str) -> Result<Option<User>, LedgerError> {
        Ok(self
            .users
            .find_by_filter(&|user| user.email == email)?
            .into_iter()
            .next())
    }

    /// Case-insensitive lookup by email.
    pub fn find_by_email(&self, email: &str) -> Result<User, LedgerError> {
        self.lookup(&normalize_email(email))?
            .ok_or(LedgerError::NotFound("user"))
    }

    /// Verifies credentials and issues a bearer token.
    ///
    /// Unknown emails and wrong passwords fail the same way.
    pub fn login(&self, email: &str, password: &str) -> Result<String, LedgerError> {
        let Some(user) = self.lookup(&normalize_email(email))? else {
            warn!("login for unknown email");
            return Err(LedgerError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash) {
            warn!(user = %user.id, "login with wrong password");
            return Err(LedgerError::InvalidCredentials);
        }
        info!(user = %user.id, "user logged in");
        self.tokens.issue(user.id)
    }

    pub fn authenticate(&self, token: &str) -> Result<Claims, LedgerError> {
        self.tokens.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test secret", TimeDelta::hours(1))
    }

    fn service() -> UserService {
        UserService::in_memory(issuer())
    }

    fn registration(email: &str) -> Registration {
        Registration {
            name: "Ana".to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[test]
    fn password_hash_verifies_and_is_salted() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first));
        assert!(verify_password("hunter2", &second));
        assert!(!verify_password("hunter3", &first));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "no-dollar"));
        assert!(!verify_password("x", "zz$00"));
        assert!(!verify_password("x", "$argon2id$v=19$m=19456,t=2,p=1$bm9wZQ"));
    }

    #[test]
    fn token_round_trip() {
        let issuer = issuer();
        let user_id = RecordId::new();
        let claims = issuer.verify(&issuer.issue(user_id).unwrap()).unwrap();
        assert_eq!(claims.user_id(), user_id);
        assert!(claims.expires_at().unwrap() > Utc::now());
    }

    #[test]
    fn token_is_a_jwt_with_the_user_as_subject() {
        let issuer = issuer();
        let user_id = RecordId::new();
        let token = issuer.issue(user_id).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(issuer.verify(&token).unwrap().sub, user_id);
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let issued = Utc::now() - TimeDelta::hours(2);
        let token = issuer.issue_at(RecordId::new(), issued).unwrap();
        assert_eq!(issuer.verify(&token), Err(LedgerError::InvalidToken));
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let issuer = issuer();
        let token = issuer.issue(RecordId::new()).unwrap();

        let other = TokenIssuer::new("other secret", TimeDelta::hours(1));
        assert_eq!(other.verify(&token), Err(LedgerError::InvalidToken));

        // Another user's claims under this token's signature
        let stolen = issuer.issue(RecordId::new()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let claims = stolen.split('.').nth(1).unwrap();
        let forged = format!("{}.{claims}.{}", parts[0], parts[2]);
        assert_eq!(issuer.verify(&forged), Err(LedgerError::InvalidToken));

        assert_eq!(issuer.verify("garbage"), Err(LedgerError::InvalidToken));
        assert_eq!(issuer.verify(""), Err(LedgerError::InvalidToken));
    }

    #[test]
    fn token_with_malformed_subject_is_rejected() {
        #[derive(Serialize)]
        struct Raw {
            sub: &'static str,
            exp: i64,
        }

        let raw = Raw {
            sub: "not-an-id",
            exp: (Utc::now() + TimeDelta::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &raw,
            &EncodingKey::from_secret(b"test secret"),
        )
        .unwrap();
        assert_eq!(issuer().verify(&token), Err(LedgerError::InvalidToken));
    }

    #[test]
    fn register_then_login() {
        let users = service();
        let user = users.register(registration("Ana@Example.com ")).unwrap();
        assert_eq!(user.email(), "ana@example.com");

        let token = users.login("ANA@example.com", "correct horse").unwrap();
        assert_eq!(users.authenticate(&token).unwrap().user_id(), user.id());
        assert_eq!(users.find_by_email("ana@EXAMPLE.com").unwrap(), user);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let users = service();
        users.register(registration("ana@example.com")).unwrap();
        assert_eq!(
            users.register(registration("ANA@example.com")),
            Err(LedgerError::EmailTaken)
        );
    }

    #[test]
    fn bad_credentials_fail_identically() {
        let users = service();
        users.register(registration("ana@example.com")).unwrap();
        assert_eq!(
            users.login("ana@example.com", "wrong"),
            Err(LedgerError::InvalidCredentials)
        );
        assert_eq!(
            users.login("bob@example.com", "correct horse"),
            Err(LedgerError::InvalidCredentials)
        );
    }

    #[test]
    fn registration_fields_are_validated() {
        let users = service();
        let mut bad = registration("not-an-email");
        assert!(matches!(
            users.register(bad.clone()),
            Err(LedgerError::InvalidField { field: "email", .. })
        ));
        bad.email = "ana@example.com".to_string();
        bad.password.clear();
        assert!(matches!(
            users.register(bad),
            Err(LedgerError::InvalidField { field: "password", .. })
        ));
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let user = service().register(registration("ana@example.com")).unwrap();
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["email"], "ana@example.com");
    }
}
