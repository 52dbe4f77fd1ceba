pub mod message;
pub mod notifier;
pub mod sink;
pub mod telegram;

pub use notifier::{Notifier, NotifierSettings, NotifyReport};
pub use sink::{NotificationSink, SinkError};
pub use telegram::TelegramSink;
