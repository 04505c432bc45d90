// Notification channel implementations
pub mod email;
pub mod telegram;

pub use email::{ReportEmail, SmtpEmailSender};
pub use telegram::{ReportFormatter, TelegramNotifier};
