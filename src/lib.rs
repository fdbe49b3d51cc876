pub mod clock;
pub mod config;
pub mod http;
pub mod logging;
pub mod merkle_proof;
pub mod merkle_tree;
pub mod node;
pub mod session;
pub mod transport;

pub mod prelude {
    pub use super::clock::*;
    pub use super::config::{LoggingConfig, Settings, TransportConfig};
    pub use super::http::HttpClient;
    pub use super::merkle_proof::*;
    pub use super::merkle_tree::*;
    pub use super::node::*;
    pub use super::session::*;
    pub use super::transport::*;
}
