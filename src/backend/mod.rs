//! Backend module - provider traits and the HTTP clients behind them

pub mod chat_client;
pub mod rest_store;
pub mod stability;
pub mod traits;

pub use chat_client::ChatClient;
pub use rest_store::RestStore;
pub use stability::StabilityClient;
pub use traits::{ChatModel, DataStore, ImageGenerator};
