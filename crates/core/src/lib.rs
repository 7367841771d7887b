pub mod catalog;
pub mod config;
pub mod types;

pub use catalog::{FunctionCatalog, FunctionCatalogEntry};
pub use config::{AppConfig, HuggingFaceConfig, OpenAiConfig};
pub use types::{FunctionCallRequest, Message, Role};
