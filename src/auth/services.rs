use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::info;

use super::dto::AuthResponse;
use super::jwt::JwtKeys;
use super::repo_types::{AuthProvider, NewUser, User};
use crate::store::Store;

/// Fresh access/refresh pair for `user`.
pub fn issue_tokens(keys: &JwtKeys, user: User) -> anyhow::Result<AuthResponse> {
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        user: user.into(),
    })
}

/// 32 random bytes, hex encoded. Only ever handed out inside the reset link.
pub fn generate_reset_token() -> String {
    let mut raw = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut raw);
    raw.iter().map(|b| format!("{b:02x}")).collect()
}

/// SHA-256 hex digest; the only form of a reset token the store ever sees.
pub fn hash_reset_token(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    format!("{hash:x}")
}

pub fn reset_link(public_url: &str, token: &str) -> String {
    format!("{public_url}/auth/reset-password?token={token}")
}

/// Profile returned by a provider's userinfo endpoint, already normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Resolve an OAuth identity to a local user: by linked account first, then
/// by email (linking the identity), else a new account.
pub async fn upsert_oauth_user(
    store: &dyn Store,
    provider: AuthProvider,
    profile: OAuthProfile,
) -> anyhow::Result<User> {
    if let Some(user) = store.find_user_by_account(provider, &profile.id).await? {
        return Ok(user);
    }

    let user = match store.find_user_by_email(&profile.email).await? {
        Some(existing) => {
            info!(user_id = %existing.id, provider = provider.as_str(), "linking oauth identity");
            existing
        }
        None => {
            let created = store
                .create_user(NewUser {
                    email: profile.email.clone(),
                    name: profile.name.clone(),
                    image: profile.image.clone(),
                    provider,
                    password_hash: None,
                })
                .await?;
            info!(user_id = %created.id, provider = provider.as_str(), "user created via oauth");
            created
        }
    };
    store.link_account(user.id, provider, &profile.id).await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LocalStore, UserRepo};

    #[test]
    fn reset_tokens_are_random_hex() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_hash_is_sha256_hex() {
        assert_eq!(
            hash_reset_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn reset_link_points_at_public_url() {
        assert_eq!(
            reset_link("https://worksync.app", "t0k"),
            "https://worksync.app/auth/reset-password?token=t0k"
        );
    }

    #[tokio::test]
    async fn oauth_upsert_links_existing_email_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        let existing = store
            .create_user(NewUser {
                email: "jane@linkedin.com".into(),
                name: None,
                image: None,
                provider: AuthProvider::Credentials,
                password_hash: Some("hash".into()),
            })
            .await
            .unwrap();

        let profile = OAuthProfile {
            id: "li-42".into(),
            email: "jane@linkedin.com".into(),
            name: Some("Jane Smith".into()),
            image: None,
        };
        let first = upsert_oauth_user(&store, AuthProvider::Linkedin, profile.clone())
            .await
            .unwrap();
        let second = upsert_oauth_user(&store, AuthProvider::Linkedin, profile)
            .await
            .unwrap();
        assert_eq!(first.id, existing.id);
        assert_eq!(second.id, existing.id);

        let fresh = upsert_oauth_user(
            &store,
            AuthProvider::Google,
            OAuthProfile {
                id: "g-7".into(),
                email: "john@gmail.com".into(),
                name: Some("John Doe".into()),
                image: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(fresh.provider, AuthProvider::Google);
        assert!(fresh.password_hash.is_none());
    }
}
