//! Voice-platform webhook: turns skill requests into model prompts grounded
//! on the session's recent exchanges and speaks the reply back.

pub mod config;
pub mod dispatcher;
pub mod inference;
pub mod prompt;
pub mod routes;

pub use config::Config;
pub use dispatcher::Dispatcher;
pub use inference::Inference;
pub use routes::{router, AppState};
