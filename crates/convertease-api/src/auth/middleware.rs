use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use convertease_core::models::{ClientIdentity, Tier};
use convertease_core::{ApiKeyEntry, AppError, Config};
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Clone)]
pub struct AuthState {
    pub api_keys: Vec<ApiKeyEntry>,
    /// Requests without credentials run as this client when set
    pub anonymous: Option<ClientIdentity>,
}

impl AuthState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_keys: config.api_keys.clone(),
            anonymous: config
                .allow_anonymous
                .then(|| ClientIdentity::new(config.anonymous_client_id(), Tier::Free)),
        }
    }

    /// Look up a bearer token. Every key is compared so the time taken does
    /// not depend on which entry matched.
    fn authenticate(&self, token: &str) -> Option<ClientIdentity> {
        let mut found = None;
        for entry in &self.api_keys {
            if secure_compare(token, &entry.key) && found.is_none() {
                found = Some(ClientIdentity::new(entry.client_id.clone(), entry.tier));
            }
        }
        found
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized(message: &str) -> Response {
    HttpAppError(AppError::Unauthorized(message.to_string())).into_response()
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match request.headers().get(AUTHORIZATION) {
        None => match &auth_state.anonymous {
            Some(anonymous) => anonymous.clone(),
            None => {
                tracing::debug!("Rejecting request without authorization header");
                return unauthorized("Missing authorization header");
            }
        },
        Some(value) => {
            let Some(token) = value
                .to_str()
                .ok()
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::trim)
            else {
                return unauthorized("Invalid authorization header format");
            };

            match auth_state.authenticate(token) {
                Some(identity) => identity,
                None => {
                    tracing::warn!("Rejecting request with unknown API key");
                    return unauthorized("Invalid API key");
                }
            }
        }
    };

    tracing::debug!(client_id = %identity.client_id, tier = %identity.tier, "Authenticated");

    request.extensions_mut().insert(identity);
    next.run(request).await
}
