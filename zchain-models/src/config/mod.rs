//! Node configuration defaults and the settings loader
//!
//! The constants below are hard-coded defaults. Workers never read them
//! directly: they are copied into each worker `cfg` by the node's
//! `settings.rs`, which keeps tests free to inject other values.

pub mod constants;
pub use constants::*;

// Export tool to read user setting file
mod settings_builder;
pub use settings_builder::build_zchain_settings;
