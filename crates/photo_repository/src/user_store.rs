use common_types::{Error, Id, OAuthLink, Result, User};
use sqlx::{Executor, Postgres};

pub struct UserStore;

impl UserStore {
    pub async fn find_by_id(
        executor: impl Executor<'_, Database = Postgres>,
        user_id: &str,
    ) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, email, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(executor)
            .await
            .map_err(|e| Error::Internal(e.to_string()))
    }

    pub async fn find_oauth_link(
        executor: impl Executor<'_, Database = Postgres>,
        user_id: &Id,
        provider: &str,
    ) -> Result<Option<OAuthLink>> {
        sqlx::query_as::<_, OAuthLink>(
            r"
            SELECT id, user_id, provider, provider_user_id, refresh_token, access_token,
                   access_token_expires_at, revoked_at
            FROM oauth_links WHERE user_id = $1 AND provider = $2
            ",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))
    }
}
