//! cutout-bot — a Telegram bot that cuts the background out of photos.

pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod telegram;
pub mod transform;
