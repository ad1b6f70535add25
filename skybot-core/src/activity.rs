//! Bot framework activity schema, as posted to the webhook and sent back
//! through the connector.
//!
//! Channel-specific payloads (`channelData`, `entities`, adaptive card
//! bodies) are kept as opaque JSON values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MESSAGE_ACTIVITY_TYPE: &str = "message";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Activity {
    /// `message`, `conversationUpdate`, `contactRelationUpdate`, `typing`, ...
    #[serde(
        rename = "type",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub activity_type: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub channel_id: String,
    /// Base URL replies to this activity are posted to.
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub service_url: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "ChannelAccount::is_empty")]
    pub from: ChannelAccount,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "ConversationAccount::is_empty")]
    pub conversation: ConversationAccount,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "ChannelAccount::is_empty")]
    pub recipient: ChannelAccount,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// `carousel` or `list`.
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub attachment_layout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Value>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Value>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "is_false")]
    pub history_disclosed: bool,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub input_hint: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub locale: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub local_timestamp: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub members_removed: Vec<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relates_to: Option<ConversationReference>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub reply_to_id: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub speak: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<SuggestedActions>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// `markdown`, `plain` or `xml`.
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub text_format: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub topic_name: String,
}

impl Activity {
    pub fn is_message(&self) -> bool {
        self.activity_type == MESSAGE_ACTIVITY_TYPE
    }

    /// A reply to this activity: same type and conversation, sender and
    /// recipient swapped.
    pub fn reply(&self, text: &str) -> Activity {
        Activity {
            activity_type: self.activity_type.clone(),
            from: self.recipient.clone(),
            conversation: self.conversation.clone(),
            recipient: self.from.clone(),
            text: text.to_string(),
            reply_to_id: self.id.clone(),
            ..Activity::default()
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Reads an explicit `null` as the field's default, the same as a missing
/// field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestedActions {
    /// IDs of the recipients the actions are shown to.
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<CardAction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CardAction {
    #[serde(
        rename = "type",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub action_type: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationReference {
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub activity_id: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "ChannelAccount::is_empty")]
    pub bot: ChannelAccount,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub channel_id: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "ConversationAccount::is_empty")]
    pub conversation: ConversationAccount,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub service_url: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "ChannelAccount::is_empty")]
    pub user: ChannelAccount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Attachment {
    /// Media type, or a `application/vnd.microsoft.card.*` type for rich cards.
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub content_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<AttachmentContent>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachmentContent {
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(
        rename = "type",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub content_type: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<CardImage>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<CardAction>,
    /// Adaptive card body elements, e.g. [`TextBlock`] or [`Select`].
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<Value>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tap: Option<CardAction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardImage {
    pub url: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty", default)]
    pub alt: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tap: Option<CardAction>,
}

/// `Input.ChoiceSet` adaptive card element.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Select {
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty", default)]
    pub id: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty", default)]
    pub style: String,
    pub choices: Vec<SelectChoice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SelectChoice {
    pub title: String,
    pub value: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "is_false", default)]
    pub is_selected: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    #[serde(rename = "type")]
    pub element_type: String,
    pub text: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty", default)]
    pub size: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty", default)]
    pub weight: String,
}

/// Adaptive card action, e.g. `Action.Http`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Action {
    #[serde(
        rename = "type",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub action_type: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelAccount {
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl ChannelAccount {
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.name.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationAccount {
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "is_false")]
    pub is_group: bool,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl ConversationAccount {
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && !self.is_group && self.name.is_empty()
    }
}
