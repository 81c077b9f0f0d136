//! Request-scoped identity and the role guard.
//!
//! The caller's identity travels in a signed session cookie. The
//! [`SessionLoader`](crate::middleware::SessionLoader) middleware decodes it
//! into a [`SessionContext`] stored in the request extensions; handlers pull
//! it out with the [`Caller`] extractor and ask it to authorize an
//! [`Operation`] before touching any service.

use crate::config::SessionConfig;
use crate::errors::{BloodBankError, Result};
use crate::models::Credential;
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use bloodbank_types::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

/// Authenticated identity for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub credential_id: i64,
    pub role: Role,
}

/// Who may perform an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Donor,
    Staff,
}

impl Access {
    pub fn permits(&self, session: Option<&SessionContext>) -> bool {
        match (self, session) {
            (Access::Public, _) => true,
            (Access::Authenticated, Some(_)) => true,
            (Access::Donor, Some(s)) => s.role == Role::Donor,
            (Access::Staff, Some(s)) => s.role == Role::Staff,
            (_, None) => false,
        }
    }
}

/// Every guarded operation exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ViewInfoPages,
    Login,
    Register,
    RegisterDonor,
    Logout,
    ViewDashboard,
    ViewInventoryStats,
    ViewOwnDashboard,
    SubmitDonation,
    ViewDonationHistory,
    ViewInventory,
    SearchInventory,
    MarkUnitUsed,
    SubmitBloodRequest,
    ViewAggregateStats,
}

impl Operation {
    pub fn required_access(&self) -> Access {
        match self {
            Operation::ViewInfoPages
            | Operation::Login
            | Operation::Register
            | Operation::RegisterDonor
            | Operation::Logout => Access::Public,
            Operation::ViewDashboard | Operation::ViewInventoryStats => Access::Authenticated,
            Operation::ViewOwnDashboard
            | Operation::SubmitDonation
            | Operation::ViewDonationHistory => Access::Donor,
            Operation::ViewInventory
            | Operation::SearchInventory
            | Operation::MarkUnitUsed
            | Operation::SubmitBloodRequest
            | Operation::ViewAggregateStats => Access::Staff,
        }
    }
}

/// The (possibly anonymous) caller of the current request
#[derive(Debug, Clone, Copy, Default)]
pub struct Caller(pub Option<SessionContext>);

impl Caller {
    pub fn session(&self) -> Option<&SessionContext> {
        self.0.as_ref()
    }

    /// Permit or deny `operation`; denial is `Unauthorized` (redirect to login).
    pub fn authorize(&self, operation: Operation) -> Result<Option<SessionContext>> {
        if operation.required_access().permits(self.session()) {
            Ok(self.0)
        } else {
            tracing::debug!(?operation, caller = ?self.0, "access denied");
            Err(BloodBankError::Unauthorized)
        }
    }

    /// Like [`Caller::authorize`] for operations that need a logged-in caller.
    pub fn require(&self, operation: Operation) -> Result<SessionContext> {
        self.authorize(operation)?.ok_or(BloodBankError::Unauthorized)
    }
}

impl FromRequest for Caller {
    type Error = actix_web::Error;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(Caller(req.extensions().get::<SessionContext>().copied())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    cookie_name: String,
    ttl: Duration,
    secure: bool,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("cookie_name", &self.cookie_name)
            .field("ttl", &self.ttl)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: &[u8], cookie_name: impl Into<String>, ttl: Duration, secure: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            cookie_name: cookie_name.into(),
            ttl,
            secure,
        }
    }

    /// Keys from configuration. An empty secret gets a random one, which
    /// invalidates all sessions on restart.
    pub fn from_config(config: &SessionConfig) -> Self {
        let secret = if config.secret.is_empty() {
            tracing::warn!("session.secret not set, using a random per-process secret");
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes);
            bytes.to_vec()
        } else {
            config.secret.as_bytes().to_vec()
        };

        Self::new(
            &secret,
            config.cookie_name.clone(),
            Duration::hours(config.ttl_hours),
            config.secure_cookie,
        )
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn issue(&self, credential: &Credential) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: credential.id.to_string(),
            role: credential.role,
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| BloodBankError::Internal(format!("failed to sign session: {}", e)))
    }

    /// Decode a token; any failure (bad signature, expired, malformed) yields `None`.
    pub fn verify(&self, token: &str) -> Option<SessionContext> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => {
                let credential_id = data.claims.sub.parse().ok()?;
                Some(SessionContext {
                    credential_id,
                    role: data.claims.role,
                })
            }
            Err(err) => {
                tracing::debug!("session token rejected: {}", err);
                None
            }
        }
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(self.cookie_name.clone(), token)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.ttl.num_seconds()))
            .finish()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(self.cookie_name.clone(), "")
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .finish();
        cookie.make_removal();
        cookie
    }
}
