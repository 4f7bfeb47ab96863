pub mod mock_sender;
pub mod smtp;

pub use mock_sender::MockSender;
pub use smtp::SmtpSender;
