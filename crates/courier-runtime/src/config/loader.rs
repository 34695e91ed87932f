//! Layered configuration loading on top of figment.
//!
//! Sources, lowest priority first:
//!
//! 1. [`CourierConfig::default`]
//! 2. Values passed to [`ConfigLoader::merge`]
//! 3. `courier.{profile}.toml` (or `.yaml`/`.yml` with `yaml-config`)
//! 4. `courier.toml`, falling back to `config.toml`
//! 5. `COURIER_*` environment variables, with `__` separating nested keys:
//!    `COURIER_DISPATCH__MAX_CONCURRENCY=8` sets `dispatch.max_concurrency`
//!
//! `COURIER_PROFILE` picks the profile and is never read as a setting.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .search_path("/etc/courier")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CourierConfig;

const ENV_PREFIX: &str = "COURIER_";
const PROFILE_ENV: &str = "COURIER_PROFILE";
const APP_DIR: &str = "courier";

/// Named set of overrides, loaded from `courier.{profile}.*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting `prod` and `dev` as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `COURIER_PROFILE`, defaulting to [`Profile::Development`].
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File formats compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    const ENABLED: &'static [Self] = &[
        #[cfg(feature = "toml-config")]
        Self::Toml,
        #[cfg(feature = "yaml-config")]
        Self::Yaml,
    ];

    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ENABLED
            .iter()
            .copied()
            .find(|format| format.extensions().contains(&ext))
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_variables)
    )]
    fn merge_into(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(figment::providers::Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(figment::providers::Yaml::file(path)),
        }
    }
}

/// Layered configuration loader.
///
/// Without explicit search paths, the current directory and the user config
/// directory (`~/.config/courier` on Linux) are searched. In each, `courier.*`
/// wins over `config.*`, and the profile variant of a file is merged beneath
/// it.
#[derive(Debug)]
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
    env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader for the profile named by `COURIER_PROFILE`.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            file: None,
            env: true,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join(APP_DIR)),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Reads `COURIER_*` environment variables (the default).
    pub fn with_env(mut self) -> Self {
        self.env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Merges application defaults, which files and the environment still
    /// override.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Resolves every source and deserializes the result.
    pub fn load(self) -> ConfigResult<CourierConfig> {
        let profile = self.profile.clone();
        let config: CourierConfig = self.into_figment()?.extract().map_err(Box::new)?;

        debug!(
            %profile,
            logging_level = %config.logging.level,
            max_concurrency = config.dispatch.max_concurrency,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn into_figment(mut self) -> ConfigResult<Figment> {
        let overrides = std::mem::take(&mut self.overrides);
        let mut figment =
            Figment::from(Serialized::defaults(CourierConfig::default())).merge(overrides);

        figment = match &self.file {
            Some(path) => Self::merge_file(figment, path)?,
            None => self.merge_discovered(figment),
        };

        if self.env {
            trace!(prefix = ENV_PREFIX, "Reading environment overrides");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["profile"]).split("__"));
        }
        Ok(figment)
    }

    fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let format = FileFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        info!(path = %path.display(), "Loading configuration file");
        Ok(format.merge_into(figment, path))
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(APP_DIR)))
            .collect()
    }

    /// Merges, per enabled format, the first `courier.*` or `config.*` found
    /// along the search path, preceded by its profile variant.
    fn merge_discovered(&self, mut figment: Figment) -> Figment {
        let dirs = self.search_dirs();
        let mut found = false;

        for &format in FileFormat::ENABLED {
            let candidates: Vec<_> = ["courier", "config"]
                .into_iter()
                .flat_map(|stem| format.extensions().iter().map(move |ext| (stem, *ext)))
                .collect();

            'search: for dir in &dirs {
                for &(stem, ext) in &candidates {
                    let profiled = dir.join(format!("{stem}.{}.{ext}", self.profile));
                    if profiled.exists() {
                        debug!(path = %profiled.display(), "Loading profile configuration");
                        figment = format.merge_into(figment, &profiled);
                    }

                    let base = dir.join(format!("{stem}.{ext}"));
                    if base.exists() {
                        info!(path = %base.display(), "Loading configuration file");
                        figment = format.merge_into(figment, &base);
                        found = true;
                        break 'search;
                    }
                }
            }
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<CourierConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<CourierConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogLevel;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config, CourierConfig::default());
            assert_eq!(config.logging.level.as_str(), "info");
            Ok(())
        });
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_ENV, "prod");
            assert_eq!(Profile::from_env(), Profile::Production);

            jail.set_env(PROFILE_ENV, "Staging");
            assert_eq!(Profile::from_env(), Profile::Custom("staging".into()));
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                r#"
                [logging]
                level = "warn"

                [dispatch]
                max_concurrency = 8
                "#,
            )?;
            jail.set_env("COURIER_DISPATCH__MAX_CONCURRENCY", "16");
            jail.set_env(PROFILE_ENV, "production");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();

            assert_eq!(config.logging.level, LogLevel::Warn);
            assert_eq!(config.dispatch.max_concurrency, 16);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_below_main_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "courier.production.toml",
                r#"
                [dispatch]
                max_concurrency = 4
                shutdown_grace_ms = 100
                "#,
            )?;
            jail.create_file("courier.toml", "[dispatch]\nmax_concurrency = 32\n")?;

            let config = ConfigLoader::new()
                .profile("production")
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config.dispatch.max_concurrency, 32);
            assert_eq!(config.dispatch.shutdown_grace_ms, 100);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_errors() {
        Jail::expect_with(|jail| {
            let missing = ConfigLoader::new().file("nope.toml").without_env().load();
            assert!(matches!(missing, Err(ConfigError::NotFound(_))));

            jail.create_file("courier.ini", "level = debug")?;
            let unsupported = ConfigLoader::new().file("courier.ini").without_env().load();
            assert!(matches!(unsupported, Err(ConfigError::UnsupportedFormat(_))));
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_merge() {
        Jail::expect_with(|jail| {
            let mut overrides = CourierConfig::default();
            overrides.dispatch.dispatch_timeout_ms = Some(750);

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(overrides)
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config.dispatch.dispatch_timeout_ms, Some(750));
            Ok(())
        });
    }
}
