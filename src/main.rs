use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;

use assetpack::config::Config;
use assetpack::env_vars;
use assetpack::logging;
use assetpack::serve::{self, ServeState};
use assetpack::webpack::{CompileMode, Webpack};

#[derive(Parser)]
#[command(name = "assetpack")]
#[command(about = "Collect static files and bundle them with webpack")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

/// Options shared by commands that run webpack
#[derive(clap::Args)]
struct BuildArgs {
    /// Output root (PUBLIC_ROOT wins when set)
    #[arg(long)]
    public_root: Option<PathBuf>,

    /// Webpack mode
    #[arg(long, value_enum)]
    mode: Option<CompileMode>,

    /// Package manager binary (default: `yarn` on PATH)
    #[arg(long)]
    yarn_bin: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListFormat {
    Json,
    Raw,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect all static files and run webpack
    Build {
        #[command(flatten)]
        build: BuildArgs,

        /// Keep webpack running and rebuild on changes
        #[arg(long)]
        watch: bool,
    },

    /// List all static files
    List {
        #[arg(long, value_enum, default_value = "json")]
        format: ListFormat,
    },

    /// Serve the built static files, running a watch build alongside
    Serve {
        /// Optional port number, or ipaddr:port
        addrport: Option<String>,

        /// Use an IPv6 address
        #[arg(short = '6', long)]
        ipv6: bool,

        #[command(flatten)]
        build: BuildArgs,

        /// Serve existing output without running webpack
        #[arg(long)]
        no_build: bool,
    },

    /// Write a default assetpack.toml
    Init {
        /// Destination (default: ./assetpack.toml)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// List environment variables assetpack reads
    Env,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    match cli.command {
        Commands::Build { build, watch } => {
            cmd_build(&config, build, watch).await?;
        }
        Commands::List { format } => {
            cmd_list(&config, format)?;
        }
        Commands::Serve {
            addrport,
            ipv6,
            build,
            no_build,
        } => {
            cmd_serve(&config, addrport, ipv6, build, no_build).await?;
        }
        Commands::Init { path } => {
            cmd_init(path)?;
        }
        Commands::Env => {
            cmd_env();
        }
    }

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    Ok(())
}

fn print_stdout_line(line: &str) {
    println!("[webpack] {line}");
}

fn print_stderr_line(line: &str) {
    eprintln!("[webpack:err] {line}");
}

/// Explicit flag, then config, then `yarn` on PATH
fn resolve_yarn(config: &Config, cli: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli.or_else(|| config.build.yarn_bin.as_ref().map(PathBuf::from)) {
        return Ok(path);
    }
    match which::which("yarn") {
        Ok(path) => Ok(path),
        Err(_) => bail!("yarn binary not found."),
    }
}

fn webpack_for(config: &Config, args: BuildArgs) -> Result<(Webpack, PathBuf)> {
    let yarn_bin = resolve_yarn(config, args.yarn_bin)?;
    let public_root = env_vars::public_root(args.public_root, config.public_root());
    let mode = args.mode.unwrap_or(config.build.mode);

    let settings = config.webpack_settings(yarn_bin, public_root.clone(), mode)?;
    let webpack = Webpack::new(settings, config.finders())?;
    Ok((webpack, public_root))
}

async fn cmd_build(config: &Config, args: BuildArgs, watch: bool) -> Result<()> {
    let (webpack, public_root) = webpack_for(config, args)?;

    let prepared = webpack.prepare_root().await?;
    println!(
        "Collected {} static files into {}",
        prepared.asset_count,
        prepared.config_path.display()
    );
    if !prepared.install.success() {
        eprintln!("Dependency install {}", prepared.install);
    }

    let outcome = webpack
        .build(watch, print_stdout_line, print_stderr_line)
        .await?;
    if outcome.success() {
        println!("Built into {}", public_root.display());
    } else {
        eprintln!("webpack {outcome}");
    }

    Ok(())
}

fn cmd_list(config: &Config, format: ListFormat) -> Result<()> {
    let registry = assetpack::assets::collect(&config.finders(), &config.ignore_patterns()?)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        ListFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &registry.listing())?;
            writeln!(out)?;
        }
        ListFormat::Raw => {
            for asset in registry.iter() {
                writeln!(out, "{}", asset.source_path().display())?;
            }
        }
    }

    Ok(())
}

async fn cmd_serve(
    config: &Config,
    addrport: Option<String>,
    ipv6: bool,
    args: BuildArgs,
    no_build: bool,
) -> Result<()> {
    let addr = serve::parse_addrport(
        addrport.as_deref(),
        ipv6 || config.serve.ipv6,
        &config.serve.addr,
        config.serve.port,
    )?;

    let public_root = if no_build || !config.serve.build {
        env_vars::public_root(args.public_root, config.public_root())
    } else {
        let (webpack, public_root) = webpack_for(config, args)?;
        serve::spawn_watch_build(webpack, print_stdout_line, print_stderr_line)?;
        public_root
    };

    println!("Starting development server at {addr}");
    println!("Quit the server with CONTROL-C.");

    let state = ServeState::new(&public_root, config.static_prefix());
    serve::serve(&addr, state, serve::ctrl_c()).await
}

fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(Config::project_config_path);
    Config::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn cmd_env() {
    for (category, vars) in env_vars::env_vars_by_category() {
        println!("{}", category.display_name());
        for var in vars {
            let default = var
                .default
                .map(|d| format!(" (default: {d})"))
                .unwrap_or_default();
            println!("  {:<32} {}{}", var.name, var.description, default);
        }
        println!();
    }
}
