//! Twitch adapters: GQL chat pages and the Helix metadata catalog.

pub mod gql_client;
pub mod helix_client;
pub mod http;
pub mod mapper;

pub use gql_client::GqlChatSource;
pub use helix_client::HelixCatalog;
