//! Messenger driver for Waypost.

pub mod driver;
pub mod error;
pub mod telegram;

pub use driver::{ContentHandle, MessengerDriver};
pub use error::{MessengerError, Result};
pub use telegram::TelegramMessenger;
