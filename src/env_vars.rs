//! Environment variables understood by assetpack.
//!
//! Config keys can be overridden with the `ASSETPACK_` prefix and `__`
//! separator for nested paths (e.g. `ASSETPACK_BUILD__MODE`). `PUBLIC_ROOT`
//! is read directly and overrides both config and `--public-root`.

use std::path::PathBuf;

/// Output root override used by deploy scripts
pub const PUBLIC_ROOT: &str = "PUBLIC_ROOT";

/// An environment variable definition
#[derive(Debug, Clone)]
pub struct EnvVar {
    pub name: &'static str,
    pub description: &'static str,
    pub category: EnvVarCategory,
    pub default: Option<&'static str>,
    pub example: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvVarCategory {
    Paths,
    Build,
    Serve,
    Logging,
}

impl EnvVarCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            EnvVarCategory::Paths => "Paths",
            EnvVarCategory::Build => "Build",
            EnvVarCategory::Serve => "Serve",
            EnvVarCategory::Logging => "Logging",
        }
    }

    /// All categories in display order
    pub fn all() -> &'static [EnvVarCategory] {
        &[
            EnvVarCategory::Paths,
            EnvVarCategory::Build,
            EnvVarCategory::Serve,
            EnvVarCategory::Logging,
        ]
    }
}

pub static ENV_VARS: &[EnvVar] = &[
    // === Paths ===
    EnvVar {
        name: PUBLIC_ROOT,
        description: "Build output root; wins over config and --public-root",
        category: EnvVarCategory::Paths,
        default: None,
        example: Some("/srv/www/public"),
    },
    EnvVar {
        name: "ASSETPACK_PATHS__BASE_DIR",
        description: "Project root holding package.json, yarn.lock and node_modules",
        category: EnvVarCategory::Paths,
        default: Some("."),
        example: Some("/srv/site"),
    },
    EnvVar {
        name: "ASSETPACK_PATHS__STATE",
        description: "Directory for runtime state and log files",
        category: EnvVarCategory::Paths,
        default: Some(".assetpack"),
        example: None,
    },
    EnvVar {
        name: "ASSETPACK_STATIC_URL",
        description: "URL prefix under which built files are served",
        category: EnvVarCategory::Paths,
        default: Some("/static/"),
        example: Some("/assets/"),
    },
    // === Build ===
    EnvVar {
        name: "ASSETPACK_BUILD__MODE",
        description: "Webpack mode: development, production or none",
        category: EnvVarCategory::Build,
        default: Some("development"),
        example: Some("production"),
    },
    EnvVar {
        name: "ASSETPACK_BUILD__YARN_BIN",
        description: "Package manager binary; looked up on PATH when unset",
        category: EnvVarCategory::Build,
        default: None,
        example: Some("/usr/local/bin/yarn"),
    },
    EnvVar {
        name: "ASSETPACK_BUILD__STRICT",
        description: "Abort on non-zero exits from install or webpack",
        category: EnvVarCategory::Build,
        default: Some("false"),
        example: Some("true"),
    },
    // === Serve ===
    EnvVar {
        name: "ASSETPACK_SERVE__ADDR",
        description: "Address the development server binds to",
        category: EnvVarCategory::Serve,
        default: Some("127.0.0.1"),
        example: Some("0.0.0.0"),
    },
    EnvVar {
        name: "ASSETPACK_SERVE__PORT",
        description: "Port the development server binds to",
        category: EnvVarCategory::Serve,
        default: Some("8000"),
        example: Some("8080"),
    },
    // === Logging ===
    EnvVar {
        name: "RUST_LOG",
        description: "Log filter directive; replaces the configured level unless --debug is given",
        category: EnvVarCategory::Logging,
        default: None,
        example: Some("assetpack=debug"),
    },
    EnvVar {
        name: "ASSETPACK_LOGGING__LEVEL",
        description: "Log level (trace, debug, info, warn, error)",
        category: EnvVarCategory::Logging,
        default: Some("info"),
        example: Some("debug"),
    },
    EnvVar {
        name: "ASSETPACK_LOGGING__TO_FILE",
        description: "Write logs to the state directory instead of stderr",
        category: EnvVarCategory::Logging,
        default: Some("false"),
        example: Some("true"),
    },
];

pub fn env_vars_for_category(category: EnvVarCategory) -> impl Iterator<Item = &'static EnvVar> {
    ENV_VARS.iter().filter(move |v| v.category == category)
}

/// Get environment variables grouped by category
pub fn env_vars_by_category() -> Vec<(EnvVarCategory, Vec<&'static EnvVar>)> {
    EnvVarCategory::all()
        .iter()
        .map(|cat| {
            let vars: Vec<&EnvVar> = env_vars_for_category(*cat).collect();
            (*cat, vars)
        })
        .filter(|(_, vars)| !vars.is_empty())
        .collect()
}

/// Pick the output root: a non-empty `PUBLIC_ROOT` value, then `cli`, then `configured`
pub fn resolve_public_root(
    env_value: Option<String>,
    cli: Option<PathBuf>,
    configured: PathBuf,
) -> PathBuf {
    env_value
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .or(cli)
        .unwrap_or(configured)
}

/// [`resolve_public_root`] reading `PUBLIC_ROOT` from the process environment
pub fn public_root(cli: Option<PathBuf>, configured: PathBuf) -> PathBuf {
    resolve_public_root(std::env::var(PUBLIC_ROOT).ok(), cli, configured)
}
