//! drivecat CLI - Unified file catalog over connected drive sources
//!
//! Usage:
//!   drivecat-cli sources               List configured sources with masked tokens
//!   drivecat-cli recent                Most recently modified files
//!   drivecat-cli favorites --mark <id> Mark files and list favorites
//!   drivecat-cli drives                Drive trees of every connected source
//!   drivecat-cli search <query>        Search names, types and modifiers
//!   drivecat-cli mask <secret>         Show how a token is displayed

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{warn, Level};

use drivecat::gateway::{Folder, TreeNode};
use drivecat::{
    load_config, load_config_from, mask_secret, CatalogConfig, CatalogService, DoorayGateway,
    DriveGateway, FileRecord, NewCredential, Tab, TabView,
};

#[derive(Parser)]
#[command(
    name = "drivecat-cli",
    about = "drivecat CLI - Unified file catalog over connected drive sources",
    version,
    long_about = "Sources and local roots are read from the config file.\nDefault location: <config dir>/drivecat/config.json"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Owner label attached to log lines
    #[arg(long, default_value = "cli", global = true)]
    owner: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured sources and their connection state
    Sources,
    /// List the most recently modified files
    Recent,
    /// Mark files as favorites and list the favorites tab
    Favorites {
        /// File id to mark (repeatable)
        #[arg(long)]
        mark: Vec<String>,
    },
    /// Show the drive trees of every connected source
    Drives,
    /// Search the catalog
    Search {
        /// Case-insensitive text matched against name, type and modifier
        query: String,
    },
    /// Print the masked form of a token
    Mask {
        secret: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Mask { secret } = &cli.command {
        println!("{}", mask_secret(secret));
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => load_config(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(execute(cli, config))
}

async fn execute(cli: Cli, config: CatalogConfig) -> Result<()> {
    let gateway: Arc<dyn DriveGateway> = Arc::new(
        DoorayGateway::new(config.dooray_base_url.clone(), config.max_traversal_depth)
            .context("Failed to create the Dooray gateway")?,
    );
    let service = CatalogService::new(cli.owner, gateway, &config);

    for source in &config.sources {
        if let Err(e) = service
            .register(NewCredential::new(source.title.clone(), source.token.clone()))
            .await
        {
            warn!("Skipping source {}: {}", source.title, e);
        }
    }
    for root in &config.local_roots {
        if let Err(e) = service.add_local_root(root).await {
            warn!("Skipping local root {}: {}", root.display(), e);
        }
    }

    for (id, outcome) in service.connect_all().await {
        if let Err(e) = outcome {
            warn!("Source {} unavailable: {}", id, e);
        }
    }

    match cli.command {
        Commands::Sources => {
            let credentials = service.credentials().await;
            if credentials.is_empty() {
                println!("No sources configured.");
            }
            for c in credentials {
                println!("{:<24} {:<14} {:<12} retries: {}", c.title, c.masked_secret, c.state.to_string(), c.retry_count);
            }
        }
        Commands::Recent => print_view(service.list(Tab::Recent).await),
        Commands::Favorites { mark } => {
            for id in &mark {
                if service.toggle_favorite(id).await.is_none() {
                    eprintln!("Unknown file id: {}", id);
                }
            }
            print_view(service.list(Tab::Favorites).await);
        }
        Commands::Drives => print_view(service.list(Tab::Drive).await),
        Commands::Search { query } => print_files(&service.search(&query).await),
        Commands::Mask { .. } => {}
    }

    for issue in service.issues().await {
        eprintln!("! {}: {}", issue.title, issue.message);
    }
    Ok(())
}

fn print_view(view: TabView) {
    match view {
        TabView::Files(files) => print_files(&files),
        TabView::Drives(sources) => {
            for source in sources {
                println!("{}", source.title);
                for drive in &source.tree.drives {
                    println!("  {}", drive.name);
                    for folder in &drive.folders {
                        print_folder(folder, 2);
                    }
                }
            }
        }
    }
}

fn print_folder(folder: &Folder, indent: usize) {
    println!("{}📁 {}", "  ".repeat(indent), folder.name);
    for child in &folder.children {
        match child {
            TreeNode::Folder(sub) => print_folder(sub, indent + 1),
            TreeNode::File(file) => {
                println!("{}{} {}", "  ".repeat(indent + 1), file.kind().icon(), file.name)
            }
        }
    }
}

fn print_files(files: &[FileRecord]) {
    if files.is_empty() {
        println!("No files.");
        return;
    }
    for f in files {
        let star = if f.favorite { "★" } else { " " };
        println!(
            "{} {} {:<40} {:<12} {:<12} {}",
            star,
            f.icon(),
            f.name,
            f.file_type,
            f.modified_by,
            f.modified.display()
        );
    }
}
