pub mod client;
pub mod error;
pub mod models;

pub use client::{HuggingFaceClient, OBJECT_DETECTION_MODEL};
pub use error::HuggingFaceError;
