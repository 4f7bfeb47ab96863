use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::email::{EmailError, EmailMessage, SendEmail};

pub struct SmtpSender {
    transport: SmtpTransport,
}

impl SmtpSender {
    pub fn new(
        relay_address: &str,
        username: String,
        password: String,
    ) -> Result<Self, EmailError> {
        let transport = SmtpTransport::relay(relay_address)
            .map_err(|e| EmailError::RelayConnectionFailed(e.to_string()))?
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self { transport })
    }
}

impl SendEmail for SmtpSender {
    fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let destination = message
            .destination
            .parse::<Mailbox>()
            .map_err(|_| EmailError::InvalidDestination)?;

        let content_type = if message.is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        let email = Message::builder()
            .from(message.from)
            .reply_to(message.reply_to)
            .to(destination)
            .subject(message.subject)
            .header(content_type)
            .body(message.body)
            .map_err(EmailError::InvalidMessage)?;

        self.transport.send(&email).map_err(EmailError::FailedToSend)?;

        Ok(())
    }
}
