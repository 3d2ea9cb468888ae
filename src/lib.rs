pub mod access;
pub mod api;
pub mod blob;
pub mod clock;
pub mod config;
pub mod dto;
pub mod error;
pub mod models;
pub mod passphrase;
pub mod router;
pub mod scheduler;
pub mod state;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod web;

pub use config::*;
pub use dto::*;
pub use error::*;

pub use models::*;
pub use router::*;
pub use state::*;
