pub mod config;
pub mod credentials;
pub mod harvest_toml;
pub mod logger;
pub mod tempfiles;

pub use config::*;
pub use credentials::get_login_password;
pub use logger::setup_logging;
pub use tempfiles::write_atomic;
