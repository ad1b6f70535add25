use async_trait::async_trait;
use skybot_core::activity::Activity;

use crate::integrations::connector::ConnectorClient;

/// Receives activities once the webhook has authorized the call and
/// decoded the body.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn handle(&self, activity: Activity);
}

/// Writes every activity to the log.
pub struct LogActivityHandler;

#[async_trait]
impl ActivityHandler for LogActivityHandler {
    async fn handle(&self, activity: Activity) {
        match serde_json::to_string_pretty(&activity) {
            Ok(json) => tracing::info!(
                activity_type = activity.activity_type.as_str(),
                conversation = activity.conversation.id.as_str(),
                "activity received:\n{}",
                json
            ),
            Err(e) => tracing::error!("failed to serialize activity: {}", e),
        }
    }
}

/// Replies to each message activity with the text it received.
pub struct EchoActivityHandler {
    connector: ConnectorClient,
    app_id: String,
    app_password: String,
}

impl EchoActivityHandler {
    pub fn new(connector: ConnectorClient, app_id: &str, app_password: &str) -> Self {
        Self {
            connector,
            app_id: app_id.to_string(),
            app_password: app_password.to_string(),
        }
    }
}

#[async_trait]
impl ActivityHandler for EchoActivityHandler {
    async fn handle(&self, activity: Activity) {
        LogActivityHandler.handle(activity.clone()).await;

        if !activity.is_message() || activity.text.is_empty() {
            return;
        }

        let token = match self
            .connector
            .request_access_token(&self.app_id, &self.app_password)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("failed to obtain connector access token: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .connector
            .send_reply_message(&activity, &activity.text, &token.access_token)
            .await
        {
            tracing::error!(
                conversation = activity.conversation.id.as_str(),
                "failed to send reply: {}",
                e
            );
        }
    }
}
