//! Outbound delivery seam.

use std::future::Future;

/// Delivers an extracted message on behalf of the gateway.
///
/// The gateway calls exactly one of the two methods per DATA transaction:
/// [`send_mail_multiple`](Self::send_mail_multiple) when the message carries
/// a Cc header, otherwise [`send_mail`](Self::send_mail) with the first
/// envelope recipient.
pub trait MailSender: Send + Sync + 'static {
    /// Error returned when delivery fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends a message to a single recipient.
    fn send_mail(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Sends a message to several To and Cc recipients.
    fn send_mail_multiple(
        &self,
        to: &[String],
        cc: &[String],
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
