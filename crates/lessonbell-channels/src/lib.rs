//! # LessonBell Channels
//! Admin endpoint implementations.

pub mod telegram;

pub use telegram::{TelegramChannel, TelegramConfig, TelegramPollingStream};
