//! Webpack build orchestration.
//!
//! [`Webpack`] ties the pieces together: it collects static files from the
//! configured finders, renders a config into an exclusive [`WorkDir`], mounts
//! the host project's package files, runs the package manager's install step
//! and finally invokes webpack, streaming its output to the caller.
//!
//! Non-zero exits are reported, not raised, unless [`Strictness::FailFast`]
//! is selected. Spawn failures are always returned as values under the
//! default strictness.

pub mod process;
pub mod template;
pub mod workdir;

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::assets::{self, AssetFinder, AssetRegistry, IgnorePatterns};
use crate::error::{DiscoveryError, WebpackError};
use crate::static_url::StaticPrefix;

pub use process::{run_inherited, stream_subprocess, Invocation, ProcessOutcome};
pub use template::{
    BuildConfig, CompileMode, ConfigRenderer, CopyDirective, WEBPACK_CONFIG_TEMPLATE,
};
pub use workdir::{HostProject, WorkDir};

pub const DEFAULT_CONFIG_FILENAME: &str = "webpack.config.js";
pub const DEFAULT_ENTRY_FILENAME: &str = "dummy.js";

const ENTRY_PLACEHOLDER: &str = "// empty file, since webpack needs an entrypoint\n";

/// How non-zero exits and spawn failures are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Report and carry on
    #[default]
    Lenient,
    /// Turn any unsuccessful subprocess into a [`WebpackError`]
    FailFast,
}

/// Everything the orchestrator needs, passed in explicitly
#[derive(Debug, Clone)]
pub struct WebpackSettings {
    /// Package manager used both for `install` and to invoke webpack
    pub yarn_bin: PathBuf,
    pub host: HostProject,
    /// Webpack `--output-path`; defaults to `<work dir>/dist`
    pub document_root: Option<PathBuf>,
    pub static_prefix: StaticPrefix,
    pub mode: CompileMode,
    pub template: String,
    pub extra_context: Map<String, Value>,
    pub config_filename: String,
    pub entry_filename: String,
    pub ignore: IgnorePatterns,
    pub strictness: Strictness,
}

impl WebpackSettings {
    pub fn new(yarn_bin: impl Into<PathBuf>, host: HostProject) -> Self {
        Self {
            yarn_bin: yarn_bin.into(),
            host,
            document_root: None,
            static_prefix: StaticPrefix::new("/static/"),
            mode: CompileMode::default(),
            template: WEBPACK_CONFIG_TEMPLATE.to_string(),
            extra_context: Map::new(),
            config_filename: DEFAULT_CONFIG_FILENAME.to_string(),
            entry_filename: DEFAULT_ENTRY_FILENAME.to_string(),
            ignore: IgnorePatterns::none(),
            strictness: Strictness::default(),
        }
    }

    pub fn document_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.document_root = Some(path.into());
        self
    }

    pub fn static_prefix(mut self, prefix: StaticPrefix) -> Self {
        self.static_prefix = prefix;
        self
    }

    pub fn mode(mut self, mode: CompileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn extra_context(mut self, extra: Map<String, Value>) -> Self {
        self.extra_context = extra;
        self
    }

    pub fn ignore(mut self, ignore: IgnorePatterns) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }
}

/// Read a custom template from disk
pub fn read_template(path: &Path) -> Result<String, WebpackError> {
    std::fs::read_to_string(path).map_err(|source| WebpackError::TemplateFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Result of [`Webpack::prepare_root`]
#[derive(Debug)]
pub struct PreparedRoot {
    pub asset_count: usize,
    pub config_path: PathBuf,
    pub entry_path: PathBuf,
    pub install: ProcessOutcome,
}

/// Webpack orchestrator owning one exclusive working directory
pub struct Webpack {
    settings: WebpackSettings,
    finders: Vec<Box<dyn AssetFinder>>,
    work_dir: WorkDir,
    renderer: ConfigRenderer,
}

impl Webpack {
    /// Create an orchestrator with a fresh temporary working directory
    pub fn new(
        settings: WebpackSettings,
        finders: Vec<Box<dyn AssetFinder>>,
    ) -> Result<Self, WebpackError> {
        Ok(Self::with_work_dir(settings, finders, WorkDir::temporary()?))
    }

    pub fn with_work_dir(
        settings: WebpackSettings,
        finders: Vec<Box<dyn AssetFinder>>,
        work_dir: WorkDir,
    ) -> Self {
        Self {
            settings,
            finders,
            work_dir,
            renderer: ConfigRenderer::new(),
        }
    }

    pub fn settings(&self) -> &WebpackSettings {
        &self.settings
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.work_dir.path().join(&self.settings.config_filename)
    }

    pub fn document_root(&self) -> PathBuf {
        self.settings
            .document_root
            .clone()
            .unwrap_or_else(|| self.work_dir.path().join("dist"))
    }

    /// Run every finder and build the deduplicated registry
    pub fn collect_assets(&self) -> Result<AssetRegistry, DiscoveryError> {
        assets::collect(&self.finders, &self.settings.ignore)
    }

    /// Render the webpack config for the current set of static files
    pub fn render_config(&self, registry: &AssetRegistry) -> Result<String, WebpackError> {
        let build_config = BuildConfig::from_registry(
            registry,
            self.settings.mode,
            self.settings.static_prefix.clone(),
        )
        .with_entry(format!("./{}", self.settings.entry_filename));

        Ok(self.renderer.render(
            &self.settings.template,
            &build_config,
            &self.settings.extra_context,
        )?)
    }

    /// Populate the working directory and install dependencies.
    ///
    /// Discovery and template failures happen before anything is written; a
    /// missing manifest fails before any subprocess is started.
    #[instrument(skip_all, fields(work_dir = %self.work_dir.path().display(), mode = %self.settings.mode))]
    pub async fn prepare_root(&self) -> Result<PreparedRoot, WebpackError> {
        let registry = self.collect_assets()?;
        let rendered = self.render_config(&registry)?;
        let manifest = self.settings.host.manifest()?;

        let config_path = self
            .work_dir
            .write_file(&self.settings.config_filename, &rendered)?;
        let entry_path = self
            .work_dir
            .write_file(&self.settings.entry_filename, ENTRY_PLACEHOLDER)?;

        self.work_dir.mount(&manifest, workdir::MANIFEST_FILE)?;
        match self.settings.host.lockfile() {
            Some(lockfile) => {
                self.work_dir.mount(&lockfile, workdir::LOCK_FILE)?;
            }
            None => warn!("No {} found, installing without a lockfile", workdir::LOCK_FILE),
        }
        if let Some(cache) = self.settings.host.dependency_cache() {
            self.work_dir.mount(&cache, workdir::DEPENDENCY_CACHE_DIR)?;
        }

        info!(assets = registry.len(), config = %config_path.display(), "Prepared webpack root");

        let install = Invocation::new(&self.settings.yarn_bin).cwd(self.work_dir.path());
        let install = self.check("install", run_inherited(&install).await)?;

        Ok(PreparedRoot {
            asset_count: registry.len(),
            config_path,
            entry_path,
            install,
        })
    }

    /// Arguments used to run webpack through the package manager
    pub fn build_invocation(&self, watch: bool) -> Invocation {
        let invocation = Invocation::new(&self.settings.yarn_bin)
            .arg("webpack")
            .arg("--config")
            .arg(self.config_path())
            .arg("--output-path")
            .arg(self.document_root())
            .cwd(self.work_dir.path());

        if watch {
            invocation.arg("--watch")
        } else {
            invocation
        }
    }

    /// Run webpack, handing each output line to the callbacks.
    ///
    /// In watch mode this only returns once the webpack process is terminated
    /// from outside.
    #[instrument(skip_all, fields(watch = watch, output = %self.document_root().display()))]
    pub async fn build<O, E>(
        &self,
        watch: bool,
        on_stdout: O,
        on_stderr: E,
    ) -> Result<ProcessOutcome, WebpackError>
    where
        O: FnMut(&str),
        E: FnMut(&str),
    {
        let invocation = self.build_invocation(watch);
        info!(command = %invocation, "Running webpack");

        let outcome = stream_subprocess(&invocation, on_stdout, on_stderr).await;
        self.check("webpack", outcome)
    }

    /// Apply the configured strictness to a finished subprocess
    fn check(&self, step: &str, outcome: ProcessOutcome) -> Result<ProcessOutcome, WebpackError> {
        if outcome.success() {
            return Ok(outcome);
        }
        warn!(step, outcome = %outcome, "Subprocess did not succeed");

        match (self.settings.strictness, outcome) {
            (Strictness::Lenient, outcome) => Ok(outcome),
            (Strictness::FailFast, ProcessOutcome::SpawnFailed(e)) => Err(e.into()),
            (Strictness::FailFast, ProcessOutcome::Exited { code, .. }) => {
                Err(WebpackError::NonZeroExit {
                    program: self.settings.yarn_bin.display().to_string(),
                    code,
                })
            }
        }
    }
}
