pub mod notifier;

pub use notifier::{ChatTransport, EmailTransport};
