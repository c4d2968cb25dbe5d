//! Microsoft Graph mail client.

mod model;

pub use model::{
    BodyType, EmailAddress, ItemBody, OutgoingMessage, Recipient, SendMailRequest, UserInfo,
};

use graphbridge_smtp::MailSender;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Default Graph API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Graph client bound to one bearer token.
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GraphClient {
    /// Creates a client for `api_base_url` (e.g. [`DEFAULT_API_BASE_URL`]).
    #[must_use]
    pub fn new(access_token: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        let base_url = api_base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
            base_url,
        }
    }

    /// Fetches the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for a non-success status, or an HTTP/JSON
    /// error.
    pub async fn user_info(&self) -> Result<UserInfo> {
        debug!("fetching user info");
        let response = self
            .http
            .get(format!("{}/me", self.base_url))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let response = check_status(response).await?;
        let info: UserInfo = serde_json::from_str(&response.text().await?)?;

        info!(
            display_name = info.display_name.as_deref().unwrap_or_default(),
            user_principal_name = info.user_principal_name.as_deref().unwrap_or_default(),
            mail = info.mail.as_deref().unwrap_or_default(),
            "user info retrieved"
        );
        Ok(info)
    }

    /// Posts a `sendMail` request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for a non-success status, or an HTTP error.
    pub async fn send(&self, request: &SendMailRequest) -> Result<()> {
        debug!(
            subject = %request.message.subject,
            to_count = request.message.to_recipients.len(),
            cc_count = request.message.cc_recipients.len(),
            "sending mail"
        );

        let response = self
            .http
            .post(format!("{}/me/sendMail", self.base_url))
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await?;

        if let Err(e) = check_status(response).await {
            error!(error = %e, "mail send failed");
            return Err(e);
        }

        info!(
            to_count = request.message.to_recipients.len(),
            cc_count = request.message.cc_recipients.len(),
            "mail sent"
        );
        Ok(())
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl MailSender for GraphClient {
    type Error = Error;

    async fn send_mail(&self, to: &str, subject: &str, body: &str, is_html: bool) -> Result<()> {
        let request = SendMailRequest::new([to], [], subject, body, is_html);
        self.send(&request).await
    }

    async fn send_mail_multiple(
        &self,
        to: &[String],
        cc: &[String],
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> Result<()> {
        let request = SendMailRequest::new(
            to.iter().map(String::as_str),
            cc.iter().map(String::as_str),
            subject,
            body,
            is_html,
        );
        self.send(&request).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}
