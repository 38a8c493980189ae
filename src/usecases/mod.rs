//! Application use cases. Orchestrate domain logic via ports.

pub mod chat_service;
pub mod vod_service;

pub use chat_service::ChatService;
pub use vod_service::VodService;
