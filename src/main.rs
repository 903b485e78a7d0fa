use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing_subscriber::EnvFilter;
use treeweave::{build, config, output, serve, watch};

fn version_string() -> &'static str {
    let hash = env!("GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{}@{hash}", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "treeweave")]
#[command(about = "Static site composer for multilingual websites")]
#[command(long_about = "\
Static site composer for multilingual websites

Every directory under the source root becomes one page per language,
rendered from a shared template.

Project structure:

  project/
  ├── treeweave.toml       # Project settings (optional)
  ├── config.yaml          # LOCATION, STATIC, DEFAULT_LANGUAGE, ALT_LANGUAGES
  ├── template.html        # Shared page template
  ├── variables.yaml       # Global variables (optional)
  ├── locale.yaml          # Global locale strings (optional)
  ├── website/             # One page per directory
  │   ├── tag.yaml         # tag: home
  │   ├── variables.yaml   # title: Home
  │   ├── locale.yaml      # greeting: {en: Hello, fr: Bonjour}
  │   ├── body.html        # Fragment, included with {#body#}
  │   └── news/
  │       └── locale.yaml  # path_name: {fr: nouvelles}
  ├── static/              # Copied to public/STATIC
  └── public/              # Output

Template markers:
  {#name#}               fragment
  {$name$}               variable
  {%(name)default%}      locale string with fallback
  {_tag_}  {_tag[fr]_}   link to a tagged directory

Run 'treeweave gen-config' to generate a documented treeweave.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Verbose logging (overrides RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that build.
#[derive(clap::Args, Clone)]
struct StaticArgs {
    /// Copy only the static files and directories listed in FILE
    #[arg(long, value_name = "FILE")]
    static_list: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site once
    Build(StaticArgs),
    /// Rebuild on every change and serve a preview
    Watch {
        #[command(flatten)]
        assets: StaticArgs,
        /// Preview server address (overrides treeweave.toml)
        #[arg(long)]
        address: Option<String>,
        /// Preview server port (overrides treeweave.toml)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a stock treeweave.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Build(assets) => {
            let project = config::load_project_config(&cli.root)?;
            println!("==> Building {}", cli.root.display());
            let report = build::build(&cli.root, &project, assets.static_list.as_deref())?;
            output::print_build_output(&report);
            println!("==> Build complete: {}", report.output_dir.display());
        }
        Command::Watch {
            assets,
            address,
            port,
        } => {
            let mut project = config::load_project_config(&cli.root)?;
            if let Some(address) = address {
                project.serve.address = address;
            }
            if let Some(port) = port {
                project.serve.port = port;
            }

            let preview = serve::PreviewServer::start(
                &cli.root.join(&project.output_dir),
                &project.serve.address,
                project.serve.port,
            )?;
            println!("==> Serving http://{}/", preview.addr());
            println!("==> Watching {} (press Enter to stop)", cli.root.display());

            let stop = Arc::new(AtomicBool::new(false));
            watch::install_stop_handlers(Arc::clone(&stop))?;
            let mut watcher = watch::Watcher::new(&cli.root, project, assets.static_list);
            watcher.run(&stop, output::print_build_output);

            preview.stop();
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
