//! Boundary types for the authorization bridge.
//!
//! `BridgeMessage` is the discriminated payload union delivered over the
//! message bus; `SlackRedirect` is what a redirect-style callback carries in
//! its query string. Both are validated here, before anything reaches the
//! context store.

use serde::{Deserialize, Serialize};

/// Message posted from a popup-role bridge back to the main session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Extracted Slack context, ready to append.
    SlackContext { name: String, content: String },
    /// A GitHub identity was established; repository listing can begin.
    GithubConnected { user_id: String, username: String },
}

impl BridgeMessage {
    /// Validate an untyped payload at the bus boundary. Unknown or
    /// malformed messages are rejected here and never reach the store.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MessageError> {
        serde_json::from_value(value).map_err(|e| MessageError::Invalid {
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Invalid bridge message: {reason}")]
    Invalid { reason: String },
}

/// Result markers carried by a redirect-style OAuth callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackRedirect {
    Success {
        session: String,
        workspace: Option<String>,
        channels: Option<u32>,
        messages: Option<u32>,
    },
    Error {
        message: Option<String>,
    },
}

impl SlackRedirect {
    /// Parse the query string of an incoming redirect. Returns `None` when
    /// neither success nor error markers are present (the load was not a
    /// callback).
    pub fn from_query(query: &str) -> Option<Self> {
        let mut success = false;
        let mut error = false;
        let mut session = None;
        let mut workspace = None;
        let mut channels = None;
        let mut messages = None;
        let mut message = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "slack_success" => success = value == "true",
                "slack_error" => error = value == "true",
                "session" => session = Some(value.into_owned()),
                "workspace" => workspace = Some(value.into_owned()),
                "channels" => channels = value.parse().ok(),
                "messages" => messages = value.parse().ok(),
                "message" => message = Some(value.into_owned()),
                _ => {}
            }
        }

        if error {
            return Some(SlackRedirect::Error { message });
        }
        // Success without a session identifier is unusable.
        if success {
            if let Some(session) = session {
                return Some(SlackRedirect::Success {
                    session,
                    workspace,
                    channels,
                    messages,
                });
            }
        }
        None
    }

    /// The `"<workspace> (<channels> channels, <messages> messages)"` label
    /// shown for the extracted item.
    pub fn context_name(&self) -> String {
        match self {
            SlackRedirect::Success {
                workspace,
                channels,
                messages,
                ..
            } => format!(
                "{} ({} channels, {} messages)",
                workspace.as_deref().unwrap_or("Slack Workspace"),
                channels.map(|c| c.to_string()).unwrap_or_default(),
                messages.map(|m| m.to_string()).unwrap_or_default(),
            ),
            SlackRedirect::Error { .. } => String::new(),
        }
    }
}

/// A redirect that carries an established GitHub identity, as posted by the
/// backend's install callback. Becomes a `GithubConnected` bus message.
pub fn github_connected_from_query(query: &str) -> Option<BridgeMessage> {
    let mut user_id = None;
    let mut username = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "user_id" => user_id = Some(value.into_owned()),
            "username" => username = Some(value.into_owned()),
            _ => {}
        }
    }
    Some(BridgeMessage::GithubConnected {
        user_id: user_id?,
        username: username?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slack_context_round_trip() {
        let value = json!({
            "type": "slack_context",
            "name": "Acme (3 channels, 40 messages)",
            "content": "X",
        });
        let msg = BridgeMessage::from_value(value).unwrap();
        assert_eq!(
            msg,
            BridgeMessage::SlackContext {
                name: "Acme (3 channels, 40 messages)".to_string(),
                content: "X".to_string(),
            }
        );
    }

    #[test]
    fn test_github_connected_parses() {
        let value = json!({
            "type": "github_connected",
            "user_id": "42",
            "username": "octocat",
        });
        let msg = BridgeMessage::from_value(value).unwrap();
        assert_eq!(
            msg,
            BridgeMessage::GithubConnected {
                user_id: "42".to_string(),
                username: "octocat".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let value = json!({ "type": "mystery", "name": "n" });
        assert!(BridgeMessage::from_value(value).is_err());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let value = json!({ "type": "slack_context", "name": "n" });
        assert!(BridgeMessage::from_value(value).is_err());
    }

    #[test]
    fn test_success_redirect_parses() {
        let redirect = SlackRedirect::from_query(
            "slack_success=true&session=S1&workspace=Acme&channels=3&messages=40",
        )
        .unwrap();
        assert_eq!(
            redirect,
            SlackRedirect::Success {
                session: "S1".to_string(),
                workspace: Some("Acme".to_string()),
                channels: Some(3),
                messages: Some(40),
            }
        );
        assert_eq!(redirect.context_name(), "Acme (3 channels, 40 messages)");
    }

    #[test]
    fn test_error_redirect_parses() {
        let redirect =
            SlackRedirect::from_query("slack_error=true&message=access_denied").unwrap();
        assert_eq!(
            redirect,
            SlackRedirect::Error {
                message: Some("access_denied".to_string()),
            }
        );
    }

    #[test]
    fn test_github_connected_from_query() {
        let msg = github_connected_from_query("user_id=42&username=octocat").unwrap();
        assert_eq!(
            msg,
            BridgeMessage::GithubConnected {
                user_id: "42".to_string(),
                username: "octocat".to_string(),
            }
        );
        assert!(github_connected_from_query("username=octocat").is_none());
    }

    #[test]
    fn test_plain_load_is_not_a_callback() {
        assert!(SlackRedirect::from_query("").is_none());
        assert!(SlackRedirect::from_query("utm_source=x").is_none());
        // Success marker without a session is unusable.
        assert!(SlackRedirect::from_query("slack_success=true").is_none());
    }
}
