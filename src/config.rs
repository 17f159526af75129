use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::assets::{
    AppDirectoriesFinder, AssetFinder, AssetStorage, DirectoryFinder, IgnorePatterns,
    DEFAULT_IGNORE_PATTERNS,
};
use crate::static_url::StaticPrefix;
use crate::webpack::{self, CompileMode, HostProject, Strictness, WebpackSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL under which built static files are served
    #[serde(default = "default_static_url")]
    pub static_url: String,
    pub paths: PathsConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub serve: ServeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Host project root holding package.json, yarn.lock and node_modules
    pub base_dir: String,
    /// Second place to look for package.json and yarn.lock
    #[serde(default)]
    pub fallback_dir: Option<String>,
    /// Build output root; relative paths resolve against base_dir
    #[serde(default)]
    pub public_root: Option<String>,
    /// Directory for logs and other runtime state
    pub state: String,
}

fn default_static_url() -> String {
    "/static/".to_string()
}

/// A configured static directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaticDirConfig {
    pub path: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Project-level static directories, searched before apps
    #[serde(default)]
    pub dirs: Vec<StaticDirConfig>,
    /// Application roots whose `static/` directory is searched
    #[serde(default)]
    pub apps: Vec<String>,
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|p| (*p).to_string()).collect()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            apps: Vec::new(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub mode: CompileMode,
    /// Explicit package manager binary; looked up on PATH when unset
    #[serde(default)]
    pub yarn_bin: Option<String>,
    #[serde(default = "default_config_filename")]
    pub config_filename: String,
    #[serde(default = "default_entry_filename")]
    pub entry_filename: String,
    /// Custom webpack config template
    #[serde(default)]
    pub template: Option<String>,
    /// Extra template parameters, replacing built-ins on collision
    #[serde(default)]
    pub extra_context: Map<String, Value>,
    /// Fail on non-zero exits from install or webpack
    #[serde(default)]
    pub strict: bool,
}

fn default_config_filename() -> String {
    webpack::DEFAULT_CONFIG_FILENAME.to_string()
}

fn default_entry_filename() -> String {
    webpack::DEFAULT_ENTRY_FILENAME.to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mode: CompileMode::default(),
            yarn_bin: None,
            config_filename: default_config_filename(),
            entry_filename: default_entry_filename(),
            template: None,
            extra_context: Map::new(),
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub ipv6: bool,
    /// Run webpack in watch mode alongside the server
    #[serde(default = "default_serve_build")]
    pub build: bool,
}

fn default_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_serve_build() -> bool {
    true
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
            ipv6: false,
            build: default_serve_build(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to `<state>/logs/`
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Project-local config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from("assetpack.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so assetpack works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // User config in ~/.config/assetpack/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("assetpack").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(Self::environment());

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Environment overrides such as `ASSETPACK_SERVE__PORT=9000`
    fn environment() -> config::Environment {
        config::Environment::with_prefix("ASSETPACK")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Write config as TOML, refusing to replace an existing file
    pub fn save(&self, path: &Path) -> Result<()> {
        if path.exists() {
            bail!("{} already exists", path.display());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to the host project root
    pub fn base_dir(&self) -> PathBuf {
        absolute(&self.paths.base_dir)
    }

    fn resolve_in_base(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.base_dir().join(path)
        }
    }

    /// Configured output root, defaulting to `<base_dir>/public`
    pub fn public_root(&self) -> PathBuf {
        self.paths
            .public_root
            .as_deref()
            .map(|p| self.resolve_in_base(p))
            .unwrap_or_else(|| self.base_dir().join("public"))
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        absolute(&self.paths.state)
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }

    pub fn static_prefix(&self) -> StaticPrefix {
        StaticPrefix::new(&self.static_url)
    }

    pub fn host_project(&self) -> HostProject {
        HostProject::new(self.base_dir())
            .with_fallback(self.paths.fallback_dir.as_deref().map(|p| self.resolve_in_base(p)))
    }

    pub fn ignore_patterns(&self) -> Result<IgnorePatterns> {
        IgnorePatterns::new(&self.sources.ignore_patterns).context("Invalid ignore pattern")
    }

    /// Finders in precedence order: configured directories, then apps
    pub fn finders(&self) -> Vec<Box<dyn AssetFinder>> {
        let dirs = self
            .sources
            .dirs
            .iter()
            .map(|d| {
                let storage = AssetStorage::new(self.resolve_in_base(&d.path));
                match &d.prefix {
                    Some(prefix) => storage.with_prefix(prefix.clone()),
                    None => storage,
                }
            })
            .collect();
        let apps = self
            .sources
            .apps
            .iter()
            .map(|a| self.resolve_in_base(a))
            .collect();

        vec![
            Box::new(DirectoryFinder::new(dirs)),
            Box::new(AppDirectoriesFinder::new(apps)),
        ]
    }

    /// Orchestrator settings for one run
    pub fn webpack_settings(
        &self,
        yarn_bin: PathBuf,
        document_root: PathBuf,
        mode: CompileMode,
    ) -> Result<WebpackSettings> {
        let template = match &self.build.template {
            Some(path) => webpack::read_template(&self.resolve_in_base(path))?,
            None => webpack::WEBPACK_CONFIG_TEMPLATE.to_string(),
        };
        let strictness = if self.build.strict {
            Strictness::FailFast
        } else {
            Strictness::Lenient
        };

        let mut settings = WebpackSettings::new(yarn_bin, self.host_project())
            .document_root(document_root)
            .static_prefix(self.static_prefix())
            .mode(mode)
            .template(template)
            .extra_context(self.build.extra_context.clone())
            .ignore(self.ignore_patterns()?)
            .strictness(strictness);
        settings.config_filename = self.build.config_filename.clone();
        settings.entry_filename = self.build.entry_filename.clone();
        Ok(settings)
    }
}

fn absolute(path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            static_url: default_static_url(),
            paths: PathsConfig {
                base_dir: ".".to_string(),
                fallback_dir: None,
                public_root: None,
                state: ".assetpack".to_string(),
            },
            sources: SourcesConfig::default(),
            build: BuildConfig::default(),
            serve: ServeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.paths.base_dir = dir.to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.static_prefix().as_str(), "static");
        assert_eq!(config.build.mode, CompileMode::Development);
        assert_eq!(config.build.config_filename, "webpack.config.js");
        assert_eq!(config.sources.ignore_patterns, vec!["CVS", ".*", "*~"]);
        assert_eq!(config.serve.port, 8000);
        assert!(!config.build.strict);
    }

    #[test]
    fn test_public_root_resolution() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(temp.path());
        assert_eq!(config.public_root(), temp.path().join("public"));

        config.paths.public_root = Some("out".to_string());
        assert_eq!(config.public_root(), temp.path().join("out"));

        config.paths.public_root = Some("/srv/www".to_string());
        assert_eq!(config.public_root(), PathBuf::from("/srv/www"));
    }

    #[test]
    fn test_finders_order_dirs_before_apps() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("assets")).unwrap();
        std::fs::create_dir_all(temp.path().join("blog/static")).unwrap();
        std::fs::write(temp.path().join("assets/site.css"), "project").unwrap();
        std::fs::write(temp.path().join("blog/static/site.css"), "app").unwrap();

        let mut config = config_in(temp.path());
        config.sources.dirs.push(StaticDirConfig {
            path: "assets".to_string(),
            prefix: None,
        });
        config.sources.apps.push("blog".to_string());

        let registry =
            crate::assets::collect(&config.finders(), &config.ignore_patterns().unwrap()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("site.css").unwrap().location,
            temp.path().join("assets")
        );
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("assetpack.toml");
        let mut config = Config::default();
        config.build.mode = CompileMode::Production;
        config.sources.dirs.push(StaticDirConfig {
            path: "assets".to_string(),
            prefix: Some("vendor".to_string()),
        });
        config.save(&path).unwrap();

        let loaded = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded.build.mode, CompileMode::Production);
        assert_eq!(loaded.sources.dirs, config.sources.dirs);
    }

    #[test]
    fn test_environment_keys_use_single_underscore_prefix() {
        let vars = [
            ("ASSETPACK_BUILD__STRICT", "true"),
            ("ASSETPACK_SERVE__ADDR", "0.0.0.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                &serde_json::to_string(&Config::default()).unwrap(),
                config::FileFormat::Json,
            ))
            .add_source(Config::environment().source(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert!(config.build.strict);
        assert_eq!(config.serve.addr, "0.0.0.0");
    }

    #[test]
    fn test_load_reads_environment_overrides() {
        std::env::set_var("ASSETPACK_SERVE__PORT", "9123");
        let loaded = Config::load(None);
        std::env::remove_var("ASSETPACK_SERVE__PORT");

        assert_eq!(loaded.unwrap().serve.port, 9123);
    }

    #[test]
    fn test_save_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("assetpack.toml");
        std::fs::write(&path, "").unwrap();
        assert!(Config::default().save(&path).is_err());
    }

    #[test]
    fn test_webpack_settings_strictness() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(temp.path());
        config.build.strict = true;
        let settings = config
            .webpack_settings(PathBuf::from("yarn"), temp.path().join("public"), CompileMode::None)
            .unwrap();
        assert_eq!(settings.strictness, Strictness::FailFast);
        assert_eq!(settings.mode, CompileMode::None);
        assert_eq!(settings.document_root, Some(temp.path().join("public")));
    }
}
