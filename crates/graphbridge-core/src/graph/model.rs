//! Graph request and response bodies.

use serde::{Deserialize, Serialize};

/// Signed-in user, from `GET /me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Display name.
    pub display_name: Option<String>,
    /// User principal name (sign-in name).
    pub user_principal_name: Option<String>,
    /// Primary SMTP address.
    pub mail: Option<String>,
}

/// Body of `POST /me/sendMail`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMailRequest {
    /// Message to send.
    pub message: OutgoingMessage,
    /// Whether Graph keeps a copy in Sent Items.
    pub save_to_sent_items: bool,
}

/// Message resource in a send request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Subject line.
    pub subject: String,
    /// Body content and type.
    pub body: ItemBody,
    /// To recipients.
    pub to_recipients: Vec<Recipient>,
    /// Cc recipients; omitted when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc_recipients: Vec<Recipient>,
}

/// Message body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    /// `HTML` or `Text`.
    pub content_type: BodyType,
    /// Body content.
    pub content: String,
}

/// Body content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BodyType {
    /// HTML body.
    #[serde(rename = "HTML")]
    Html,
    /// Plain text body.
    #[serde(rename = "Text")]
    Text,
}

/// A message recipient.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    /// Address wrapper.
    pub email_address: EmailAddress,
}

/// Email address of a recipient.
#[derive(Debug, Clone, Serialize)]
pub struct EmailAddress {
    /// Bare address.
    pub address: String,
}

impl Recipient {
    fn new(address: &str) -> Self {
        Self {
            email_address: EmailAddress {
                address: address.to_string(),
            },
        }
    }
}

impl SendMailRequest {
    /// Builds a request that is saved to Sent Items.
    pub fn new<'a>(
        to: impl IntoIterator<Item = &'a str>,
        cc: impl IntoIterator<Item = &'a str>,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> Self {
        Self {
            message: OutgoingMessage {
                subject: subject.to_string(),
                body: ItemBody {
                    content_type: if is_html { BodyType::Html } else { BodyType::Text },
                    content: body.to_string(),
                },
                to_recipients: to.into_iter().map(Recipient::new).collect(),
                cc_recipients: cc.into_iter().map(Recipient::new).collect(),
            },
            save_to_sent_items: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_recipient_json() {
        let request = SendMailRequest::new(["a@example.com"], [], "Hi", "Hello", false);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "message": {
                    "subject": "Hi",
                    "body": {"contentType": "Text", "content": "Hello"},
                    "toRecipients": [{"emailAddress": {"address": "a@example.com"}}]
                },
                "saveToSentItems": true
            })
        );
    }

    #[test]
    fn test_cc_and_html_json() {
        let request = SendMailRequest::new(
            ["a@example.com", "b@example.com"],
            ["c@example.com"],
            "Report",
            "<p>x</p>",
            true,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message"]["body"]["contentType"], "HTML");
        assert_eq!(value["message"]["toRecipients"].as_array().unwrap().len(), 2);
        assert_eq!(
            value["message"]["ccRecipients"][0]["emailAddress"]["address"],
            "c@example.com"
        );
    }

    #[test]
    fn test_user_info_nullable_fields() {
        let info: UserInfo = serde_json::from_str(
            r#"{"displayName": "Ada", "userPrincipalName": "ada@contoso.com", "mail": null, "id": "1"}"#,
        )
        .unwrap();
        assert_eq!(info.display_name.as_deref(), Some("Ada"));
        assert_eq!(info.user_principal_name.as_deref(), Some("ada@contoso.com"));
        assert_eq!(info.mail, None);
    }
}
