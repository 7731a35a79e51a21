use anyhow::Context;
use sqlx::SqlitePool;

use crate::client::ApiClient;
use crate::db;
use crate::error::SessionError;
use crate::models::{AuthTokens, UserInfo, AUTH_TOKENS_KEY};

pub async fn load_tokens(pool: &SqlitePool) -> anyhow::Result<AuthTokens> {
    let raw = db::get_item(pool, AUTH_TOKENS_KEY)
        .await?
        .ok_or(SessionError::Missing)?;
    let tokens = serde_json::from_str(&raw).map_err(SessionError::Corrupt)?;
    Ok(tokens)
}

/// Stamps `issued_at` so expiry can be judged later.
pub async fn save_tokens(
    pool: &SqlitePool,
    mut tokens: AuthTokens,
    now_ms: i64,
) -> anyhow::Result<AuthTokens> {
    tokens.issued_at = Some(now_ms);
    let raw = serde_json::to_string(&tokens)?;
    db::set_item(pool, AUTH_TOKENS_KEY, &raw, now_ms).await?;
    Ok(tokens)
}

pub async fn clear(pool: &SqlitePool) -> anyhow::Result<bool> {
    db::remove_item(pool, AUTH_TOKENS_KEY).await
}

/// A usable access token, refreshing the saved session when it has expired.
pub async fn access_token(
    pool: &SqlitePool,
    client: &ApiClient,
    now_ms: i64,
) -> anyhow::Result<String> {
    let tokens = load_tokens(pool).await?;
    if !tokens.is_expired(now_ms) {
        return Ok(tokens.access_token);
    }

    tracing::debug!("access token expired, refreshing");
    let refreshed = client
        .refresh(&tokens.refresh_token)
        .await
        .context("failed to refresh the session")?;
    let saved = save_tokens(pool, refreshed, now_ms).await?;
    Ok(saved.access_token)
}

pub async fn current_user(client: &ApiClient, access_token: &str) -> anyhow::Result<UserInfo> {
    let user = client
        .check(access_token)
        .await
        .context("failed to fetch user info")?
        .ok_or(SessionError::Rejected)?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> AuthTokens {
        AuthTokens {
            token_type: "Bearer".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 3600,
            expires_refresh_in: 86_400,
            issued_at: None,
        }
    }

    #[tokio::test]
    async fn missing_session_is_reported() {
        let pool = db::memory_pool().await;
        let err = load_tokens(&pool).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::Missing)
        ));
    }

    #[tokio::test]
    async fn saved_tokens_carry_issue_time() {
        let pool = db::memory_pool().await;
        save_tokens(&pool, tokens(), 42).await.unwrap();

        let loaded = load_tokens(&pool).await.unwrap();
        assert_eq!(loaded.issued_at, Some(42));
        assert_eq!(loaded.access_token, "access");
    }

    #[tokio::test]
    async fn corrupt_session_is_reported() {
        let pool = db::memory_pool().await;
        db::set_item(&pool, AUTH_TOKENS_KEY, "nope", 0).await.unwrap();

        let err = load_tokens(&pool).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn fresh_token_is_used_without_refresh() {
        let pool = db::memory_pool().await;
        save_tokens(&pool, tokens(), 0).await.unwrap();
        let client = ApiClient::new(&crate::config::Config::for_tests()).unwrap();

        let token = access_token(&pool, &client, 3_600_000).await.unwrap();
        assert_eq!(token, "access");
    }

    #[tokio::test]
    async fn clear_removes_session() {
        let pool = db::memory_pool().await;
        save_tokens(&pool, tokens(), 0).await.unwrap();

        assert!(clear(&pool).await.unwrap());
        assert!(load_tokens(&pool).await.is_err());
    }
}
