pub mod brian;
pub mod telegram;

pub use brian::{BrianClient, IntentClassifier};
pub use telegram::TelegramClient;
