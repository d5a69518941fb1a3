// socialpulse: cached social activity snapshots for a link-hub page.
// Platform adapters fetch and normalize upstream data; the server caches and serves it.

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod platforms;
pub mod server;
pub mod upstream;

pub use config::Config;
pub use error::{PulseError, Result};
