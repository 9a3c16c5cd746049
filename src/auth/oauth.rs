//! Third-party sign-in.
//!
//! Google and LinkedIn use the authorization-code flow: `/authorize` redirects
//! to the provider with a signed `state`, `/callback` verifies that state,
//! exchanges the code, reads the userinfo endpoint and signs the user in.
//! Apple is a stand-in that never leaves the process and answers with a fixed
//! demo profile when enabled.

use axum::{
    extract::{FromRef, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use super::dto::AuthResponse;
use super::jwt::JwtKeys;
use super::repo_types::AuthProvider;
use super::services::{issue_tokens, upsert_oauth_user, OAuthProfile};
use crate::config::{OAuthClient, OAuthConfig};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::validation::{is_valid_email, normalize_email};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/oauth/providers", get(providers))
        .route("/auth/oauth/:provider/authorize", get(authorize))
        .route("/auth/oauth/:provider/callback", get(callback))
}

struct Endpoints {
    authorize: &'static str,
    token: &'static str,
    userinfo: &'static str,
    scope: &'static str,
}

const GOOGLE: Endpoints = Endpoints {
    authorize: "https://accounts.google.com/o/oauth2/v2/auth",
    token: "https://oauth2.googleapis.com/token",
    userinfo: "https://openidconnect.googleapis.com/v1/userinfo",
    scope: "openid email profile",
};

const LINKEDIN: Endpoints = Endpoints {
    authorize: "https://www.linkedin.com/oauth/v2/authorization",
    token: "https://www.linkedin.com/oauth/v2/accessToken",
    userinfo: "https://api.linkedin.com/v2/userinfo",
    scope: "openid profile email",
};

/// A provider that can currently be used to sign in.
enum Provider<'a> {
    Remote {
        kind: AuthProvider,
        client: &'a OAuthClient,
        endpoints: &'static Endpoints,
    },
    AppleMock,
}

impl<'a> Provider<'a> {
    fn resolve(config: &'a OAuthConfig, name: &str) -> AppResult<Self> {
        let unavailable = || AppError::BadRequest(format!("OAuth provider {name:?} is not enabled"));
        match name {
            "google" => config
                .google
                .as_ref()
                .map(|client| Provider::Remote {
                    kind: AuthProvider::Google,
                    client,
                    endpoints: &GOOGLE,
                })
                .ok_or_else(unavailable),
            "linkedin" => config
                .linkedin
                .as_ref()
                .map(|client| Provider::Remote {
                    kind: AuthProvider::Linkedin,
                    client,
                    endpoints: &LINKEDIN,
                })
                .ok_or_else(unavailable),
            "apple" if config.apple_mock => Ok(Provider::AppleMock),
            _ => Err(unavailable()),
        }
    }

    fn kind(&self) -> AuthProvider {
        match self {
            Provider::Remote { kind, .. } => *kind,
            Provider::AppleMock => AuthProvider::Apple,
        }
    }
}

pub fn enabled_providers(config: &OAuthConfig) -> Vec<AuthProvider> {
    let mut out = Vec::new();
    if config.google.is_some() {
        out.push(AuthProvider::Google);
    }
    if config.linkedin.is_some() {
        out.push(AuthProvider::Linkedin);
    }
    if config.apple_mock {
        out.push(AuthProvider::Apple);
    }
    out
}

fn redirect_uri(public_url: &str, provider: AuthProvider) -> String {
    format!("{public_url}/api/v1/auth/oauth/{}/callback", provider.as_str())
}

fn authorize_url(
    endpoints: &Endpoints,
    client: &OAuthClient,
    redirect_uri: &str,
    state: &str,
) -> anyhow::Result<Url> {
    let url = Url::parse_with_params(
        endpoints.authorize,
        &[
            ("client_id", client.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", endpoints.scope),
            ("state", state),
        ],
    )?;
    Ok(url)
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<AuthProvider>,
}

#[instrument(skip(state))]
pub async fn providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: enabled_providers(&state.config.oauth),
    })
}

#[instrument(skip(state))]
pub async fn authorize(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let provider = Provider::resolve(&state.config.oauth, &name)?;
    let kind = provider.kind();
    let keys = JwtKeys::from_ref(&state);
    let signed_state = keys.sign_oauth_state(kind)?;
    let callback = redirect_uri(&state.config.public_url, kind);

    let target = match provider {
        Provider::Remote {
            client, endpoints, ..
        } => authorize_url(endpoints, client, &callback, &signed_state)?.to_string(),
        // the mock "provider" answers immediately
        Provider::AppleMock => {
            let mut url = Url::parse(&callback).map_err(anyhow::Error::from)?;
            url.query_pairs_mut()
                .append_pair("code", "mock")
                .append_pair("state", &signed_state);
            url.to_string()
        }
    };

    info!(provider = kind.as_str(), "redirecting to oauth provider");
    Ok((StatusCode::FOUND, [(header::LOCATION, target)]).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[instrument(skip(state, params))]
pub async fn callback(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Json<AuthResponse>> {
    let provider = Provider::resolve(&state.config.oauth, &name)?;
    let kind = provider.kind();

    if let Some(error) = params.error {
        warn!(provider = kind.as_str(), %error, "provider returned an error");
        return Err(AppError::Unauthorized(format!("OAuth sign-in failed: {error}")));
    }
    let (Some(code), Some(signed_state)) = (params.code, params.state) else {
        return Err(AppError::BadRequest("Missing code or state".into()));
    };

    let keys = JwtKeys::from_ref(&state);
    if let Err(e) = keys.verify_oauth_state(&signed_state, kind) {
        warn!(provider = kind.as_str(), error = %e, "invalid oauth state");
        return Err(AppError::Unauthorized("Invalid or expired OAuth state".into()));
    }

    let profile = match provider {
        Provider::Remote {
            client, endpoints, ..
        } => {
            let callback = redirect_uri(&state.config.public_url, kind);
            fetch_profile(endpoints, client, &code, &callback).await?
        }
        Provider::AppleMock => apple_demo_profile(),
    };

    let user = upsert_oauth_user(state.store.as_ref(), kind, profile).await?;
    info!(user_id = %user.id, provider = kind.as_str(), "user signed in via oauth");
    Ok(Json(issue_tokens(&keys, user)?))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OpenID Connect userinfo claims both providers return.
#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl UserInfo {
    fn normalize(self) -> AppResult<OAuthProfile> {
        let email = self
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| is_valid_email(e))
            .ok_or_else(|| AppError::Unauthorized("OAuth profile has no usable email".into()))?;
        Ok(OAuthProfile {
            id: self.sub,
            email,
            name: self.name.filter(|n| !n.trim().is_empty()),
            image: self.picture,
        })
    }
}

async fn fetch_profile(
    endpoints: &Endpoints,
    client: &OAuthClient,
    code: &str,
    redirect_uri: &str,
) -> AppResult<OAuthProfile> {
    let http = reqwest::Client::new();
    let token_response = http
        .post(endpoints.token)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
        ])
        .send()
        .await
        .map_err(|e| {
            error!(error = %e, "token request failed");
            AppError::Unavailable("OAuth token endpoint unreachable".into())
        })?;

    if !token_response.status().is_success() {
        // the body may echo credentials; log the status only
        error!(status = %token_response.status(), "token endpoint returned error");
        return Err(AppError::Unauthorized("Failed to exchange authorization code".into()));
    }
    let tokens: TokenResponse = token_response.json().await.map_err(|e| {
        error!(error = %e, "failed to parse token response");
        AppError::Unauthorized("Invalid token response".into())
    })?;

    let userinfo_response = http
        .get(endpoints.userinfo)
        .bearer_auth(&tokens.access_token)
        .send()
        .await
        .map_err(|e| {
            error!(error = %e, "userinfo request failed");
            AppError::Unavailable("OAuth userinfo endpoint unreachable".into())
        })?;

    if !userinfo_response.status().is_success() {
        error!(status = %userinfo_response.status(), "userinfo endpoint returned error");
        return Err(AppError::Unauthorized("Failed to fetch user information".into()));
    }
    let info: UserInfo = userinfo_response.json().await.map_err(|e| {
        error!(error = %e, "failed to parse userinfo response");
        AppError::Unauthorized("Invalid userinfo response".into())
    })?;
    info.normalize()
}

fn apple_demo_profile() -> OAuthProfile {
    OAuthProfile {
        id: "apple-demo-user".into(),
        email: "user@icloud.com".into(),
        name: Some("Apple User".into()),
        image: Some("/apple-avatar.jpg".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient {
            client_id: "cid".into(),
            client_secret: "secret".into(),
        }
    }

    #[test]
    fn only_configured_providers_are_enabled() {
        let config = OAuthConfig {
            google: None,
            linkedin: Some(client()),
            apple_mock: true,
        };
        assert_eq!(
            enabled_providers(&config),
            vec![AuthProvider::Linkedin, AuthProvider::Apple]
        );
        assert!(Provider::resolve(&config, "google").is_err());
        assert!(Provider::resolve(&config, "github").is_err());
        assert!(matches!(
            Provider::resolve(&config, "apple"),
            Ok(Provider::AppleMock)
        ));
    }

    #[test]
    fn linkedin_authorize_url_carries_oidc_params() {
        let url = authorize_url(
            &LINKEDIN,
            &client(),
            "http://localhost:3000/api/v1/auth/oauth/linkedin/callback",
            "st",
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("www.linkedin.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("scope".into(), "openid profile email".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("client_id".into(), "cid".into())));
        assert!(pairs.contains(&("state".into(), "st".into())));
    }

    #[test]
    fn userinfo_is_normalized() {
        let info = UserInfo {
            sub: "abc".into(),
            email: Some(" Jane@LinkedIn.com ".into()),
            name: Some("Jane Smith".into()),
            picture: Some("https://media.licdn.com/p.jpg".into()),
        };
        let profile = info.normalize().unwrap();
        assert_eq!(profile.id, "abc");
        assert_eq!(profile.email, "jane@linkedin.com");
        assert_eq!(profile.image.as_deref(), Some("https://media.licdn.com/p.jpg"));

        let no_email = UserInfo {
            sub: "x".into(),
            email: None,
            name: None,
            picture: None,
        };
        assert!(no_email.normalize().is_err());
    }
}
