use std::sync::Mutex;

use crate::email::{EmailError, EmailMessage, SendEmail};

/// Owned copy of a message handed to the mock, kept for assertions.
#[derive(Clone, Debug)]
pub struct SentEmail {
    pub body: String,
    pub subject: String,
    pub destination: String,
    pub is_html: bool,
}

#[derive(Default)]
pub struct MockSender {
    sent_messages: Mutex<Vec<SentEmail>>,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_messages(&self) -> Vec<SentEmail> {
        self.sent_messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl SendEmail for MockSender {
    fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        self.sent_messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentEmail {
                body: message.body,
                subject: message.subject.to_owned(),
                destination: message.destination.to_owned(),
                is_html: message.is_html,
            });

        Ok(())
    }
}
