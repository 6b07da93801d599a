//! Convenience REST operations on the client
//!
//! Thin wrappers over the rate-limited pipeline for the endpoints used
//! most. Anything else goes through [`Client::api`] directly.

use serde_json::{json, Value};

use tether_common::error::{AppError, AppResult};
use tether_core::{MemberData, Snowflake};
use tether_rest::{ApiRequest, ApiResponse};

use crate::cache::MemberView;
use crate::orchestrator::Client;

impl Client {
    /// Posts a message to a channel
    pub async fn send_message(&self, channel_id: Snowflake, content: &str) -> AppResult<Value> {
        let response = self
            .api()
            .request(ApiRequest::post(
                &format!("channels/{channel_id}/messages"),
                json!({ "content": content }),
            ))
            .await
            .map_err(|err| AppError::Transport(err.to_string()))?;
        Self::require_success(response)
    }

    /// Replaces a message's content
    pub async fn edit_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        content: &str,
    ) -> AppResult<Value> {
        let response = self
            .api()
            .request(ApiRequest::patch(
                &format!("channels/{channel_id}/messages/{message_id}"),
                json!({ "content": content }),
            ))
            .await
            .map_err(|err| AppError::Transport(err.to_string()))?;
        Self::require_success(response)
    }

    /// Fetches one guild member and folds it into the cache, so a
    /// subsequent gateway update lands on the same records
    pub async fn fetch_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> AppResult<MemberView> {
        let response = self
            .api()
            .request(ApiRequest::get(&format!(
                "guilds/{guild_id}/members/{user_id}"
            )))
            .await
            .map_err(|err| AppError::Transport(err.to_string()))?;
        let body = Self::require_success(response)?;

        let data: MemberData = serde_json::from_value(body).map_err(AppError::internal)?;
        self.cache().upsert_member(guild_id, data.clone());
        let (member, user) = data.into_parts();
        debug_assert_eq!(member.user_id, user_id);
        Ok(MemberView { member, user })
    }

    fn require_success(response: ApiResponse) -> AppResult<Value> {
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(AppError::Transport(format!(
                "request answered {}",
                response.status
            )))
        }
    }
}
