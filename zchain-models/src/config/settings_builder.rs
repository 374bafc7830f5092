//! Build the settings of an object that implements `Deserialize`
//!
//! ---
//! The node configuration comes from 4 layers, later ones overriding earlier
//! ones:
//!
//! 1. the file named by `ZCHAIN_CONFIG_PATH` (`base_config/config.toml` by
//!    default), which is pushed in the repository and must exist;
//! 2. the file named by `ZCHAIN_CONFIG_OVERRIDE_PATH` (`config/config.toml` by
//!    default), if present;
//! 3. the user configuration directory of the application, if present;
//! 4. environment variables prefixed with `env_prefix`, nested keys separated
//!    by `__` (`ZCHAIN_SERVER_CHAIN__VIEW_CHANGE_OFFSET=6`).
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Merge the settings layers and deserialize them into `T`
pub fn build_zchain_settings<T: DeserializeOwned>(
    app_name: &str,
    env_prefix: &str,
) -> Result<T, config::ConfigError> {
    let mut builder = config::Config::builder();
    let config_path = std::env::var("ZCHAIN_CONFIG_PATH")
        .unwrap_or_else(|_| "base_config/config.toml".to_string());

    builder = builder.add_source(config::File::with_name(&config_path));

    let config_override_path = std::env::var("ZCHAIN_CONFIG_OVERRIDE_PATH")
        .unwrap_or_else(|_| "config/config.toml".to_string());

    if Path::new(&config_override_path).is_file() {
        builder = builder.add_source(config::File::with_name(&config_override_path));
    }

    if let Some(proj_dirs) = ProjectDirs::from("net", "zchain", app_name) {
        // Portable user config loading
        let user_config_path = proj_dirs.config_dir().join("config.toml");
        if user_config_path.is_file() {
            builder = builder.add_source(config::File::from(user_config_path));
        }
    }

    builder
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serial_test::serial;
    use std::io::Write;

    #[derive(Deserialize)]
    struct Section {
        view_change_offset: u64,
        name: String,
    }

    #[derive(Deserialize)]
    struct TestSettings {
        server_chain: Section,
    }

    #[test]
    #[serial]
    fn test_file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server_chain]\nview_change_offset = 4\nname = \"base\"").unwrap();
        std::env::set_var("ZCHAIN_CONFIG_PATH", file.path());
        std::env::set_var("ZCHAINTEST_SERVER_CHAIN__NAME", "env");

        let settings: TestSettings = build_zchain_settings("zchain-test", "ZCHAINTEST").unwrap();
        assert_eq!(settings.server_chain.view_change_offset, 4);
        assert_eq!(settings.server_chain.name, "env");

        std::env::remove_var("ZCHAINTEST_SERVER_CHAIN__NAME");
        std::env::remove_var("ZCHAIN_CONFIG_PATH");
    }

    #[test]
    #[serial]
    fn test_missing_base_file() {
        std::env::set_var("ZCHAIN_CONFIG_PATH", "/nonexistent/zchain/config.toml");
        assert!(build_zchain_settings::<TestSettings>("zchain-test", "ZCHAINTEST").is_err());
        std::env::remove_var("ZCHAIN_CONFIG_PATH");
    }
}
