/// Slack delivery of progress reports.
///
/// One base message is posted when the reporter connects. Every status
/// update edits that message in place, and the end-of-run ping lands as a
/// threaded reply mentioning the user. Any API failure is logged and
/// swallowed: a run must never die because Slack did.
use crate::notify::{NotifyError, ProgressReporter};
use crate::status::RunStatus;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Status line rendering. Emoji are presentation, so they live here and
/// not on the status enum.
fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Started => "⚪ STARTED",
        RunStatus::Running => "🔵 RUNNING",
        RunStatus::Completed => "🟢 COMPLETED",
        RunStatus::CompletedWithErrors => "🟠 COMPLETED WITH ERRORS",
        RunStatus::Interrupted => "🔴 INTERRUPTED",
        RunStatus::Crashed => "🔴 CRASHED",
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
    ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationsListResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    channels: Vec<Channel>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

/// Thin client over the handful of Slack Web API methods drover needs.
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
}

impl SlackClient {
    pub fn new(token: String) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, token })
    }

    /// Resolve a channel name to its id, walking the cursor-paginated
    /// conversation list.
    pub async fn find_channel_id(&self, name: &str) -> Result<Option<String>, NotifyError> {
        let mut cursor = String::new();
        loop {
            let mut request = self
                .http
                .get(format!("{SLACK_API_BASE}/conversations.list"))
                .bearer_auth(&self.token)
                .query(&[("limit", "200"), ("exclude_archived", "true")]);
            if !cursor.is_empty() {
                request = request.query(&[("cursor", cursor.as_str())]);
            }

            let page: ConversationsListResponse = request.send().await?.json().await?;
            if !page.ok {
                return Err(NotifyError::Api {
                    method: "conversations.list",
                    error: page.error.unwrap_or_else(|| "unknown error".to_string()),
                });
            }

            if let Some(channel) = page.channels.iter().find(|c| c.name == name) {
                return Ok(Some(channel.id.clone()));
            }

            cursor = page
                .response_metadata
                .map(|meta| meta.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                return Ok(None);
            }
        }
    }

    /// Post a message, returning its ts: the id later updates and thread
    /// replies hang off.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, NotifyError> {
        let mut payload = serde_json::json!({ "channel": channel, "text": text });
        if let Some(ts) = thread_ts {
            payload["thread_ts"] = serde_json::Value::String(ts.to_string());
        }

        let response: PostMessageResponse = self
            .http
            .post(format!("{SLACK_API_BASE}/chat.postMessage"))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(NotifyError::Api {
                method: "chat.postMessage",
                error: response.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        response.ts.ok_or_else(|| NotifyError::Api {
            method: "chat.postMessage",
            error: "response carried no ts".to_string(),
        })
    }

    /// Replace the text of an existing message.
    pub async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), NotifyError> {
        let payload = serde_json::json!({ "channel": channel, "ts": ts, "text": text });
        let response: UpdateResponse = self
            .http
            .post(format!("{SLACK_API_BASE}/chat.update"))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(NotifyError::Api {
                method: "chat.update",
                error: response.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(())
    }
}

/// The production reporter: one base message, edited in place for every
/// update. When the channel or base message cannot be set up, the reporter
/// degrades to a logged no-op so the run still happens.
pub struct SlackReporter {
    client: Option<SlackClient>,
    user_id: String,
    channel_id: Option<String>,
    base_ts: Option<String>,
}

impl SlackReporter {
    /// Resolve the channel and post the base message. Never fails: every
    /// setup problem downgrades to a disabled reporter with an error in
    /// the log.
    pub async fn connect(token: String, user_id: String, channel: &str, base_text: &str) -> Self {
        let client = match SlackClient::new(token) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "failed to build Slack client; notifications disabled");
                return Self {
                    client: None,
                    user_id,
                    channel_id: None,
                    base_ts: None,
                };
            }
        };

        let channel_id = match client.find_channel_id(channel).await {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                tracing::error!(channel, "channel not found; notifications disabled");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, channel, "channel lookup failed; notifications disabled");
                None
            }
        };

        let base_ts = match &channel_id {
            Some(id) => match client.post_message(id, base_text, None).await {
                Ok(ts) => Some(ts),
                Err(e) => {
                    tracing::error!(error = %e, "failed to post base message; notifications disabled");
                    None
                }
            },
            None => None,
        };

        Self {
            client: Some(client),
            user_id,
            channel_id,
            base_ts,
        }
    }

    fn destination(&self) -> Option<(&SlackClient, &str, &str)> {
        match (&self.client, &self.channel_id, &self.base_ts) {
            (Some(client), Some(channel), Some(ts)) => {
                Some((client, channel.as_str(), ts.as_str()))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl ProgressReporter for SlackReporter {
    async fn report(&mut self, status: RunStatus, header: &[String], body: &str) {
        let Some((client, channel, ts)) = self.destination() else {
            return;
        };

        let mut lines = vec![status_label(status).to_string()];
        lines.extend_from_slice(header);
        if !body.is_empty() {
            lines.push(body.to_string());
        }
        lines.push(format!("Last updated {}", chrono::Local::now().to_rfc3339()));
        let text = lines.join("\n");

        if let Err(e) = client.update_message(channel, ts, &text).await {
            tracing::error!(error = %e, "failed to update status message");
        }
    }

    async fn ping(&mut self, text: &str) {
        let Some((client, channel, ts)) = self.destination() else {
            return;
        };

        let mention = if text.is_empty() {
            format!("<@{}>", self.user_id)
        } else {
            format!("<@{}> {}", self.user_id, text)
        };

        if let Err(e) = client.post_message(channel, &mention, Some(ts)).await {
            tracing::error!(error = %e, "failed to post completion ping");
        }
    }
}
