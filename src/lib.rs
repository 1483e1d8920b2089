//! STOMP relay - main library
//!
//! Wires the `stompsockets` connection manager to file/env configuration
//! and logging for the console binary.
//!
//! ## Layout
//!
//! - **stompsockets**: STOMP-over-SockJS client (re-exported from workspace)
//! - **config**: YAML + `.env` configuration
//! - **logging**: tracing setup
//! - **bin_common**: helpers shared by binaries
//!
//! ## Usage in Binaries
//!
//! ```rust,no_run
//! use stomp_relay::bin_common::{load_config_from_env, ConfigType};
//! use stomp_relay::config::StompConfig;
//!
//! let path = load_config_from_env(ConfigType::Stomp);
//! let config = StompConfig::load(path).unwrap();
//! ```

// Re-export workspace libraries for convenience
pub use stompsockets;

pub mod config;
pub mod logging;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
}
