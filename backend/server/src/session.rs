//! # Sessions
//!
//! Server-side sessions stored in the `sessions` table.
//!
//! ## Cookie
//! - `sessionid`: random UUID v4 token, HttpOnly, SameSite=Lax, Path=/
//! - The row holds the logged-in user (if any) and a JSON payload
//!
//! ## Payload
//! - `signup_email`: set by signup step one, consumed by step two
//! - `messages`: flash messages, drained by the next rendered page
//!
//! ## Notes
//! - A row is only written once there is something to keep.
//! - Logging in rotates the token. Logging out deletes the row.
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use bank::{models::User, sessions::SessionRow, users};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    state::State,
    utils::{found, login_redirect},
};

pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signup_email: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Flash>,
}

impl SessionData {
    fn is_empty(&self) -> bool {
        self.signup_email.is_none() && self.messages.is_empty()
    }
}

pub struct Session {
    jar: CookieJar,
    token: Option<String>,
    stale_token: Option<String>,
    pub user_id: Option<i64>,
    pub data: SessionData,
}

impl Session {
    pub async fn load(state: &Arc<State>, jar: CookieJar) -> Result<Self, AppError> {
        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return Ok(Self::empty(jar));
        };

        let now = Utc::now().timestamp();
        let lookup = token.clone();
        let row = state
            .db
            .call(move |conn| bank::sessions::load(conn, &lookup, now))
            .await?;

        let Some(row) = row else {
            debug!("Unknown or expired session token");
            return Ok(Self::empty(jar));
        };

        let data = serde_json::from_str(&row.data).unwrap_or_else(|e| {
            warn!("Discarding unreadable session payload: {e}");
            SessionData::default()
        });

        Ok(Self {
            jar,
            token: Some(token),
            stale_token: None,
            user_id: row.user_id,
            data,
        })
    }

    fn empty(jar: CookieJar) -> Self {
        Self {
            jar,
            token: None,
            stale_token: None,
            user_id: None,
            data: SessionData::default(),
        }
    }

    pub async fn user(&self, state: &Arc<State>) -> Result<Option<User>, AppError> {
        let Some(user_id) = self.user_id else {
            return Ok(None);
        };

        state
            .db
            .call(move |conn| match users::get_user(conn, user_id) {
                Ok(user) => Ok(Some(user)),
                Err(bank::BankError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            })
            .await
    }

    /// Binds the session to `user_id` under a fresh token.
    pub fn login(&mut self, user_id: i64) {
        self.stale_token = self.token.take().or(self.stale_token.take());
        self.user_id = Some(user_id);
    }

    pub fn flash(&mut self, level: Level, text: impl Into<String>) {
        self.data.messages.push(Flash {
            level,
            text: text.into(),
        });
    }

    pub fn take_messages(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.data.messages)
    }

    /// Persists the session and returns the cookie jar to send back.
    pub async fn commit(self, state: &Arc<State>) -> Result<CookieJar, AppError> {
        let Session {
            jar,
            token,
            stale_token,
            user_id,
            data,
        } = self;

        if let Some(stale) = stale_token {
            state
                .db
                .call(move |conn| bank::sessions::delete(conn, &stale))
                .await?;
        }

        if user_id.is_none() && data.is_empty() {
            return match token {
                Some(token) => {
                    state
                        .db
                        .call(move |conn| bank::sessions::delete(conn, &token))
                        .await?;
                    Ok(jar.remove(removal_cookie()))
                }
                None => Ok(jar),
            };
        }

        let token = token.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let payload =
            serde_json::to_string(&data).map_err(|e| AppError::InternalError(Box::new(e)))?;
        let row = SessionRow {
            token: token.clone(),
            user_id,
            data: payload,
            expires_at: Utc::now().timestamp() + state.config.session_ttl_secs,
        };

        state
            .db
            .call(move |conn| bank::sessions::save(conn, &row))
            .await?;

        Ok(jar.add(session_cookie(token, state.config.session_ttl_secs)))
    }

    /// Deletes the session entirely.
    pub async fn destroy(self, state: &Arc<State>) -> Result<CookieJar, AppError> {
        for token in [self.token, self.stale_token].into_iter().flatten() {
            state
                .db
                .call(move |conn| bank::sessions::delete(conn, &token))
                .await?;
        }

        Ok(self.jar.remove(removal_cookie()))
    }
}

fn session_cookie(token: String, ttl_secs: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(ttl_secs))
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

impl FromRequestParts<Arc<State>> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        Session::load(state, CookieJar::from_headers(&parts.headers)).await
    }
}

/// A logged-in user together with their session. Anonymous requests are
/// redirected to the login page with `next` pointing back.
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl FromRequestParts<Arc<State>> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match session.user(state).await.map_err(IntoResponse::into_response)? {
            Some(user) => Ok(Self { user, session }),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");

                Err(found(&login_redirect(next)))
            }
        }
    }
}
