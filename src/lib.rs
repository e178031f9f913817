//! AI Studio: a mock style-transfer backend plus the client-side machinery that
//! talks to it (generation controller, HTTP transport, local history).

pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod image_utils;
pub mod models;
pub mod routes;
pub mod storage;
pub mod transport;

pub use config::{ClientConfig, RetryPolicy, ServerConfig};
pub use controller::{ControllerEvent, GenerationController, GenerationStatus, Phase};
pub use error::TransportError;
pub use history::{HistoryStore, KvFile};
pub use models::{Generation, GenerationRequest, Style};
pub use transport::{HttpTransport, Transport};
