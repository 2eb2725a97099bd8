use std::time::Duration;

use async_trait::async_trait;
use docbot_core::config::SupportConfig;
use docbot_core::support::{SupportTicket, TicketReceipt};
use docbot_slack::handlers::{SupportTicketService, TicketError};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::info;

/// Zendesk Tickets API client, authenticated with an agent email plus API token.
#[derive(Clone)]
pub struct ZendeskClient {
    client: Client,
    base_url: String,
    email: String,
    api_token: SecretString,
}

impl ZendeskClient {
    pub fn new(
        subdomain: &str,
        email: impl Into<String>,
        api_token: SecretString,
    ) -> Result<Self, TicketError> {
        Self::with_base_url(format!("https://{subdomain}.zendesk.com"), email, api_token)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        email: impl Into<String>,
        api_token: SecretString,
    ) -> Result<Self, TicketError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| TicketError::Request(error.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            email: email.into(),
            api_token,
        })
    }

    /// `None` unless subdomain, email and token are all set.
    pub fn from_config(config: &SupportConfig) -> Result<Option<Self>, TicketError> {
        match (&config.zendesk_subdomain, &config.zendesk_email, &config.zendesk_api_token) {
            (Some(subdomain), Some(email), Some(token)) => {
                Self::new(subdomain, email.clone(), token.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn ticket_url(&self, ticket_id: u64) -> String {
        format!("{}/agent/tickets/{ticket_id}", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(format!("{}/token", self.email), Some(self.api_token.expose_secret()))
    }
}

fn ticket_body(ticket: &SupportTicket) -> Value {
    let mut body = json!({
        "subject": ticket.subject,
        "comment": { "body": ticket.description },
        "priority": ticket.priority.as_str(),
    });
    if let (Some(name), Some(email)) = (&ticket.requester_name, &ticket.requester_email) {
        body["requester"] = json!({ "name": name, "email": email });
    }
    if !ticket.tags.is_empty() {
        body["tags"] = json!(ticket.tags);
    }
    json!({ "ticket": body })
}

/// Zendesk reports errors as `{"error": "..."}` or `{"error": {"title", "message"}}`.
fn error_message(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return body.to_owned();
    };
    match parsed.get("error") {
        Some(Value::String(error)) => match parsed.get("description").and_then(Value::as_str) {
            Some(description) => format!("{error}: {description}"),
            None => error.clone(),
        },
        Some(Value::Object(error)) => {
            let title = error.get("title").and_then(Value::as_str);
            let message = error.get("message").and_then(Value::as_str);
            match (title, message) {
                (Some(title), Some(message)) => format!("{title}: {message}"),
                (Some(text), None) | (None, Some(text)) => text.to_owned(),
                (None, None) => Value::Object(error.clone()).to_string(),
            }
        }
        Some(other) => other.to_string(),
        None => body.to_owned(),
    }
}

#[async_trait]
impl SupportTicketService for ZendeskClient {
    async fn create_ticket(&self, ticket: SupportTicket) -> Result<TicketReceipt, TicketError> {
        let url = format!("{}/api/v2/tickets.json", self.base_url);
        let response = self
            .authorized(self.client.post(url))
            .json(&ticket_body(&ticket))
            .send()
            .await
            .map_err(|error| TicketError::Request(error.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|error| TicketError::Request(error.to_string()))?;
        if status != StatusCode::CREATED {
            return Err(TicketError::Rejected { status: status.as_u16(), message: error_message(&text) });
        }

        let id = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.pointer("/ticket/id").and_then(Value::as_u64))
            .ok_or_else(|| TicketError::Request("ticket id missing from response".to_owned()))?;
        info!(event_name = "support.zendesk.ticket_created", ticket_id = id, "zendesk ticket created");
        Ok(TicketReceipt { id, url: self.ticket_url(id) })
    }
}
