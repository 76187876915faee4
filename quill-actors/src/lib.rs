//! Small Tokio actor runtime plus the actor that runs article generations.
//!
//! - [`actor`]: `Actor` trait, bounded mailboxes, reserved spawns
//! - [`system`]: task tracking and cooperative shutdown
//! - [`builder`]: named wiring of actors for the binary
//! - [`article`]: [`ArticleActor`](article::ArticleActor), one generation at a time
pub mod actor;
pub mod article;
pub mod builder;
pub mod system;

pub use article::{ArticleActor, ArticleMsg, ArticleReply};
