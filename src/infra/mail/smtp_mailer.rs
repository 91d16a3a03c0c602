use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::core::certificates::{CertificateEmail, CertificateMailer, MailError};

/// SMTP submission over STARTTLS with the sender's credentials.
///
/// Every message goes through one configured relay. The default is the Gmail
/// submission endpoint because the original deployment routed all senders
/// through it regardless of their domain; a non-Gmail sender must override
/// `SMTP_RELAY` or authentication will fail at Gmail's door.
pub struct SmtpMailer {
    sender: String,
    relay: String,
    port: u16,
    credentials: Credentials,
}

impl SmtpMailer {
    pub const DEFAULT_RELAY: &'static str = "smtp.gmail.com";
    pub const DEFAULT_PORT: u16 = 587;

    pub fn new(sender: String, password: String, relay: String, port: u16) -> Self {
        let credentials = Credentials::new(sender.clone(), password);
        Self {
            sender,
            relay,
            port,
            credentials,
        }
    }

    /// Builds the multipart message: a plain-text part plus the named PDF
    /// attachment.
    fn build_message(&self, email: &CertificateEmail) -> Result<Message, MailError> {
        let from: Mailbox = self
            .sender
            .parse()
            .map_err(|e| MailError(format!("invalid sender address: {}", e)))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| MailError(format!("invalid recipient address: {}", e)))?;

        let pdf_type = ContentType::parse("application/pdf")
            .map_err(|e| MailError(e.to_string()))?;
        let attachment =
            Attachment::new(email.attachment_name.clone()).body(email.pdf_bytes.clone(), pdf_type);

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(email.body.clone()))
                    .singlepart(attachment),
            )
            .map_err(|e| MailError(e.to_string()))
    }
}

#[async_trait]
impl CertificateMailer for SmtpMailer {
    async fn send(&self, email: &CertificateEmail) -> Result<(), MailError> {
        let message = self.build_message(email)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.relay)
            .map_err(|e| MailError(e.to_string()))?
            .port(self.port)
            .credentials(self.credentials.clone())
            .build();

        transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| MailError(e.to_string()))
    }
}
