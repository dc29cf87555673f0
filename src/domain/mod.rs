//! Domain layer - core types.
//!
//! This layer contains the record model, configuration model and error
//! types without any I/O.

pub mod config;
pub mod error;
pub mod models;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use models::{
    Attachment, Conversation, ConversationStub, ExportStats, Message, TextSource,
};
