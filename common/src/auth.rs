//! Store session bootstrap.
//!
//! A session is obtained with a password exchange against the standard user
//! collection first and the superuser collection second. Once held, a session
//! is reused until its token expires.

use crate::error::error_type_str;
use crate::{SyncError, SyncResult};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_LEEWAY_SECS: i64 = 10;

/// Which principal the session was issued to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthTier {
    User,
    Superuser,
}

impl AuthTier {
    fn collection(self) -> &'static str {
        match self {
            AuthTier::User => "users",
            AuthTier::Superuser => "_superusers",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub identity: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub tier: AuthTier,
}

impl Session {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// A session is valid while its JWT `exp` claim is in the future.
    /// Tokens that cannot be decoded are never valid.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        token_expiry(&self.token).is_some_and(|exp| exp - EXPIRY_LEEWAY_SECS > now.timestamp())
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: i64,
}

fn token_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<Claims>(&bytes).ok().map(|c| c.exp)
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

/// Holds the credentials and the current session, if any.
pub struct Authenticator {
    base_url: String,
    credentials: Credentials,
    session: Option<Session>,
}

impl Authenticator {
    #[must_use]
    pub fn new(base_url: &str, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            session: None,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Return the held session if still valid, otherwise exchange credentials
    /// for a new one.
    ///
    /// # Errors
    /// Returns [`SyncError::Auth`] with the superuser attempt's message when
    /// both tiers are rejected.
    pub fn authenticate(&mut self, client: &Client) -> SyncResult<&Session> {
        if self.session.as_ref().is_some_and(Session::is_valid) {
            debug!("Reusing existing store session");
        } else {
            let session = self.exchange(client)?;
            info!("Authenticated against the store as {:?}", session.tier);
            self.session = Some(session);
        }
        self.session
            .as_ref()
            .ok_or_else(|| SyncError::Auth("no session after authentication".to_string()))
    }

    fn exchange(&self, client: &Client) -> SyncResult<Session> {
        match self.auth_with_password(client, AuthTier::User) {
            Ok(session) => Ok(session),
            Err(user_err) => {
                warn!("User authentication failed ({user_err}), trying superuser");
                self.auth_with_password(client, AuthTier::Superuser)
                    .map_err(SyncError::Auth)
            }
        }
    }

    fn auth_with_password(&self, client: &Client, tier: AuthTier) -> Result<Session, String> {
        let url = format!(
            "{}/api/collections/{}/auth-with-password",
            self.base_url,
            tier.collection()
        );

        let response = client
            .post(&url)
            .json(&self.credentials)
            .send()
            .map_err(|e| format!("network error ({}): {e}", error_type_str(&e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let msg = response.text().unwrap_or_default();
            return Err(format!("store returned {status}: {msg}"));
        }

        let body: AuthResponse = response
            .json()
            .map_err(|e| format!("could not decode auth response: {e}"))?;
        Ok(Session {
            token: body.token,
            tier,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    /// Build an unsigned JWT carrying only an `exp` claim.
    pub(crate) fn fake_jwt(exp: i64) -> String {
        let claims = URL_SAFE_NO_PAD.encode(json!({ "exp": exp }).to_string());
        format!("eyJhbGciOiJIUzI1NiJ9.{claims}.c2ln")
    }

    fn fresh_jwt() -> String {
        fake_jwt(Utc::now().timestamp() + 3600)
    }

    fn credentials() -> Credentials {
        Credentials {
            identity: "sync@example.org".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_session_validity_from_exp_claim() {
        let now = Utc::now();
        let live = Session {
            token: fake_jwt(now.timestamp() + 600),
            tier: AuthTier::User,
        };
        let expired = Session {
            token: fake_jwt(now.timestamp() - 1),
            tier: AuthTier::User,
        };
        let garbage = Session {
            token: "not-a-jwt".to_string(),
            tier: AuthTier::User,
        };
        assert!(live.is_valid_at(now));
        assert!(!expired.is_valid_at(now));
        assert!(!garbage.is_valid_at(now));
    }

    #[test_log::test]
    fn test_user_tier_succeeds_and_session_is_reused() {
        let server = MockServer::start();
        let token = fresh_jwt();
        let user = server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/users/auth-with-password")
                .json_body(json!({ "identity": "sync@example.org", "password": "hunter2" }));
            then.status(200).json_body(json!({ "token": token, "record": {} }));
        });

        let client = Client::new();
        let mut auth = Authenticator::new(&server.base_url(), credentials());
        let first = auth.authenticate(&client).unwrap().clone();
        let second = auth.authenticate(&client).unwrap().clone();

        assert_eq!(first.tier, AuthTier::User);
        assert_eq!(first, second);
        user.assert_hits(1);
    }

    #[test_log::test]
    fn test_falls_back_to_superuser() {
        let server = MockServer::start();
        let token = fresh_jwt();
        let user = server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/users/auth-with-password");
            then.status(400).body("Failed to authenticate.");
        });
        let admin = server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/_superusers/auth-with-password");
            then.status(200).json_body(json!({ "token": token }));
        });

        let client = Client::new();
        let mut auth = Authenticator::new(&server.base_url(), credentials());
        let session = auth.authenticate(&client).unwrap();

        assert_eq!(session.tier, AuthTier::Superuser);
        user.assert_hits(1);
        admin.assert_hits(1);
    }

    #[test_log::test]
    fn test_both_tiers_rejected_carries_last_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/users/auth-with-password");
            then.status(400).body("user rejected");
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/_superusers/auth-with-password");
            then.status(403).body("superuser rejected");
        });

        let client = Client::new();
        let mut auth = Authenticator::new(&server.base_url(), credentials());
        let err = auth.authenticate(&client).unwrap_err();

        assert!(matches!(err, SyncError::Auth(_)));
        assert!(err.to_string().contains("superuser rejected"));
        assert!(auth.session().is_none());
    }

    #[test]
    fn test_expired_session_is_replaced() {
        let server = MockServer::start();
        let token = fresh_jwt();
        let user = server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/users/auth-with-password");
            then.status(200).json_body(json!({ "token": token }));
        });

        let client = Client::new();
        let mut auth = Authenticator::new(&server.base_url(), credentials());
        auth.session = Some(Session {
            token: fake_jwt(Utc::now().timestamp() - 60),
            tier: AuthTier::User,
        });
        let session = auth.authenticate(&client).unwrap();

        assert_eq!(session.token, token);
        user.assert_hits(1);
    }
}
