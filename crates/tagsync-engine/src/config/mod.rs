//! Query configuration: YAML documents, validation and the live file source.

pub mod parser;
pub mod source;
pub mod types;
pub mod validator;

pub use parser::QueryDocument;
pub use source::{ConfigListener, ConfigSource};
pub use types::{ActivityTypeQueryDoc, SyncSettings, TagQueryDoc};
