use std::time::Duration;

use async_trait::async_trait;
use docbot_agent::conversation::ThreadMessage;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::blocks::{Block, MessageTemplate, ModalView};

pub const SLACK_API_BASE_URL: &str = "https://slack.com/api";
pub const THREAD_HISTORY_LIMIT: u32 = 50;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack request to {method} failed: {message}")]
    Request { method: String, message: String },
    #[error("slack {method} returned error `{error}`")]
    Api { method: String, error: String },
    #[error("could not decode slack {method} response: {message}")]
    Decode { method: String, message: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl OutgoingMessage {
    pub fn text(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self { channel: channel.into(), text: text.into(), ..Self::default() }
    }

    pub fn from_template(channel: impl Into<String>, template: MessageTemplate) -> Self {
        Self {
            channel: channel.into(),
            text: template.fallback_text,
            blocks: template.blocks,
            thread_ts: None,
        }
    }

    pub fn in_thread(mut self, thread_ts: Option<&str>) -> Self {
        self.thread_ts = thread_ts.filter(|ts| !ts.is_empty()).map(str::to_owned);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    pub user_id: String,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    pub real_name: Option<String>,
    pub email: Option<String>,
}

impl SlackUser {
    /// Real name when set, otherwise the handle.
    pub fn display_name(&self) -> &str {
        self.real_name.as_deref().filter(|name| !name.is_empty()).unwrap_or(&self.name)
    }
}

/// Slack Web API surface the bot uses.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Returns the posted message's `ts`.
    async fn post_message(&self, message: OutgoingMessage) -> Result<String, SlackApiError>;

    async fn conversation_replies(
        &self,
        channel: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, SlackApiError>;

    async fn auth_test(&self) -> Result<BotIdentity, SlackApiError>;

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, SlackApiError>;

    /// Returns the opened view's id.
    async fn views_open(&self, trigger_id: &str, view: &ModalView) -> Result<String, SlackApiError>;

    async fn views_update(&self, view_id: &str, view: &ModalView) -> Result<(), SlackApiError>;
}

/// reqwest-backed client for `https://slack.com/api/*`.
#[derive(Clone)]
pub struct SlackWebClient {
    client: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString) -> Result<Self, SlackApiError> {
        Self::with_base_url(bot_token, SLACK_API_BASE_URL)
    }

    pub fn with_base_url(
        bot_token: SecretString,
        base_url: impl Into<String>,
    ) -> Result<Self, SlackApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| SlackApiError::Request {
                method: "client".to_owned(),
                message: error.to_string(),
            })?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_owned(), bot_token })
    }

    /// `apps.connections.open`: a fresh Socket Mode WebSocket URL for the app token.
    pub async fn open_socket_connection(
        &self,
        app_token: &SecretString,
    ) -> Result<String, SlackApiError> {
        let method = "apps.connections.open";
        let request = self.client.post(self.url(method)).bearer_auth(app_token.expose_secret());
        let body = Self::send(method, request).await?;
        body.get("url").and_then(Value::as_str).map(str::to_owned).ok_or_else(|| {
            SlackApiError::Decode { method: method.to_owned(), message: "missing url".to_owned() }
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn post_json(&self, method: &str, body: Value) -> Result<Value, SlackApiError> {
        let request = self
            .client
            .post(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body);
        Self::send(method, request).await
    }

    async fn get(&self, method: &str, query: &[(&str, &str)]) -> Result<Value, SlackApiError> {
        let request = self
            .client
            .get(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query);
        Self::send(method, request).await
    }

    async fn send(method: &str, request: reqwest::RequestBuilder) -> Result<Value, SlackApiError> {
        let response = request.send().await.map_err(|error| SlackApiError::Request {
            method: method.to_owned(),
            message: error.to_string(),
        })?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|error| SlackApiError::Decode {
            method: method.to_owned(),
            message: format!("{status}: {error}"),
        })?;

        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(body)
        } else {
            let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
            Err(SlackApiError::Api { method: method.to_owned(), error: error.to_owned() })
        }
    }

    fn decode<T: for<'de> Deserialize<'de>>(method: &str, value: Value) -> Result<T, SlackApiError> {
        serde_json::from_value(value).map_err(|error| SlackApiError::Decode {
            method: method.to_owned(),
            message: error.to_string(),
        })
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn post_message(&self, message: OutgoingMessage) -> Result<String, SlackApiError> {
        let body = serde_json::to_value(&message).map_err(|error| SlackApiError::Decode {
            method: "chat.postMessage".to_owned(),
            message: error.to_string(),
        })?;
        let response = self.post_json("chat.postMessage", body).await?;
        Ok(response.get("ts").and_then(Value::as_str).unwrap_or_default().to_owned())
    }

    async fn conversation_replies(
        &self,
        channel: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, SlackApiError> {
        let method = "conversations.replies";
        let limit = limit.to_string();
        let response =
            self.get(method, &[("channel", channel), ("ts", thread_ts), ("limit", &limit)]).await?;
        let messages = response.get("messages").cloned().unwrap_or_else(|| json!([]));
        Self::decode(method, messages)
    }

    async fn auth_test(&self) -> Result<BotIdentity, SlackApiError> {
        let method = "auth.test";
        let response = self.post_json(method, json!({})).await?;
        Self::decode(method, response)
    }

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, SlackApiError> {
        let response = self.get("users.info", &[("user", user_id)]).await?;
        let user = response.get("user").unwrap_or(&Value::Null);
        let text = |pointer: &str| {
            user.pointer(pointer).and_then(Value::as_str).filter(|text| !text.is_empty())
        };
        Ok(SlackUser {
            id: text("/id").unwrap_or(user_id).to_owned(),
            name: text("/name").unwrap_or(user_id).to_owned(),
            real_name: text("/real_name").or_else(|| text("/profile/real_name")).map(str::to_owned),
            email: text("/profile/email").map(str::to_owned),
        })
    }

    async fn views_open(&self, trigger_id: &str, view: &ModalView) -> Result<String, SlackApiError> {
        let method = "views.open";
        let response =
            self.post_json(method, json!({ "trigger_id": trigger_id, "view": view })).await?;
        response.pointer("/view/id").and_then(Value::as_str).map(str::to_owned).ok_or_else(|| {
            SlackApiError::Decode { method: method.to_owned(), message: "missing view id".to_owned() }
        })
    }

    async fn views_update(&self, view_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.post_json("views.update", json!({ "view_id": view_id, "view": view })).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use secrecy::SecretString;
    use serde_json::json;

    use super::{OutgoingMessage, SlackApi, SlackApiError, SlackWebClient};
    use crate::blocks::{ticket_modal, TicketModalState};

    fn client(url: &str) -> SlackWebClient {
        SlackWebClient::with_base_url(SecretString::from("xoxb-test"), url)
            .expect("client should build")
    }

    #[tokio::test]
    async fn post_message_sends_thread_and_returns_ts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat.postMessage")
            .match_header("authorization", "Bearer xoxb-test")
            .match_body(Matcher::Json(json!({
                "channel": "C1",
                "text": "🔍 Searching ngrok documentation...",
                "thread_ts": "171.1"
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"ts":"171.2"}"#)
            .create_async()
            .await;

        let ts = client(&server.url())
            .post_message(
                OutgoingMessage::text("C1", "🔍 Searching ngrok documentation...")
                    .in_thread(Some("171.1")),
            )
            .await
            .expect("post succeeds");

        assert_eq!(ts, "171.2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_ok_responses_become_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat.postMessage")
            .with_status(200)
            .with_body(r#"{"ok":false,"error":"channel_not_found"}"#)
            .create_async()
            .await;

        let error = client(&server.url())
            .post_message(OutgoingMessage::text("C404", "hi"))
            .await
            .expect_err("slack rejected");

        assert_eq!(
            error,
            SlackApiError::Api {
                method: "chat.postMessage".to_owned(),
                error: "channel_not_found".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn replies_are_decoded_into_thread_messages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/conversations.replies")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("channel".into(), "C1".into()),
                Matcher::UrlEncoded("ts".into(), "171.1".into()),
                Matcher::UrlEncoded("limit".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "ok": true,
                    "messages": [
                        {"user": "U1", "text": "How do I add OAuth?", "ts": "171.1"},
                        {"bot_id": "B1", "user": "UBOT", "text": "Use the oauth action.", "ts": "171.2"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let messages = client(&server.url())
            .conversation_replies("C1", "171.1", 50)
            .await
            .expect("replies decode");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].bot_id.as_deref(), Some("B1"));
    }

    #[tokio::test]
    async fn user_info_reads_profile_email_and_names() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users.info")
            .match_query(Matcher::UrlEncoded("user".into(), "U1".into()))
            .with_status(200)
            .with_body(
                r#"{"ok":true,"user":{"id":"U1","name":"dev","real_name":"","profile":{"email":"dev@example.com"}}}"#,
            )
            .create_async()
            .await;

        let user = client(&server.url()).user_info("U1").await.expect("user decodes");

        assert_eq!(user.display_name(), "dev");
        assert_eq!(user.email.as_deref(), Some("dev@example.com"));
    }

    #[tokio::test]
    async fn views_open_returns_view_id_and_update_posts_view() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/views.open")
            .match_body(Matcher::PartialJson(json!({
                "trigger_id": "trig-1",
                "view": {"type": "modal", "callback_id": "ticket_submission"}
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"view":{"id":"V123"}}"#)
            .create_async()
            .await;
        let update = server
            .mock("POST", "/views.update")
            .match_body(Matcher::PartialJson(json!({"view_id": "V123"})))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        let view = ticket_modal(&TicketModalState::loading("dev@example.com"));
        let view_id = client.views_open("trig-1", &view).await.expect("view opens");
        client.views_update(&view_id, &view).await.expect("view updates");

        assert_eq!(view_id, "V123");
        update.assert_async().await;
    }

    #[tokio::test]
    async fn socket_connection_uses_app_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/apps.connections.open")
            .match_header("authorization", "Bearer xapp-test")
            .with_status(200)
            .with_body(r#"{"ok":true,"url":"wss://wss-primary.slack.com/link/?ticket=abc"}"#)
            .create_async()
            .await;

        let url = client(&server.url())
            .open_socket_connection(&SecretString::from("xapp-test"))
            .await
            .expect("connection opens");

        assert!(url.starts_with("wss://"));
    }
}
