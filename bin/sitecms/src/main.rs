//! sitecms CLI
//!
//! Single binary content manager website serving schema-validated JSON
//! documents through templates.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for sitecms.
#[derive(Parser)]
#[command(
    name = "sitecms",
    version,
    about = "A file-backed content manager website"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: std::path::PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Serve the site
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind (overrides server.address)
        #[arg(short, long)]
        address: Option<String>,
        /// Reload content and templates when files change
        #[arg(long)]
        watch: bool,
        /// Open browser automatically
        #[arg(long)]
        open: bool,
    },
    /// Render every known route to static HTML
    Freeze {
        /// Output directory (overrides freeze.output_dir)
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Validate configuration and content
    Check {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
    /// Create a new content document with default fields
    New {
        /// Content type (site, page, node, menu, link, meta)
        content_type: String,
        /// Document name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    sitecms::init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve {
            port,
            address,
            watch,
            open,
        } => {
            sitecms::cmd::serve::run(&cli.config, port, address, watch, open).await?;
        }
        Commands::Freeze { output } => {
            sitecms::cmd::freeze::run(&cli.config, output).await?;
        }
        Commands::Check { strict } => {
            sitecms::cmd::check::run(&cli.config, strict)?;
        }
        Commands::New { content_type, name } => {
            sitecms::cmd::new::run(&cli.config, &content_type, &name)?;
        }
    }

    Ok(())
}
