use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "Offline-capable request cache for installable web front ends",
    long_about = "Runs the haven cache engine against a live origin.\n\
                  \n\
                  The engine loads its configuration from the origin (or a local file),\n\
                  installs and activates the current cache generation, then answers each\n\
                  requested path through the configured caching strategy. Run it again\n\
                  with the origin offline to see what cached and fallback responses\n\
                  the engine would serve."
)]
pub struct CliArgs {
    /// Origin the engine serves
    #[arg(required = true, help = "Origin URL, e.g. http://localhost:3000")]
    pub origin: String,

    /// Paths to request through the engine
    #[arg(help = "Paths to request through the engine, e.g. / /assets/app.css")]
    pub paths: Vec<String>,

    /// Directory of the persistent cache store
    #[arg(
        short,
        long,
        default_value = "./haven-cache",
        help = "Directory where cache generations are persisted"
    )]
    pub storage_dir: PathBuf,

    /// Keep the cache in memory only
    #[arg(long, help = "Keep cache generations in memory instead of on disk")]
    pub memory: bool,

    /// Path of the configuration endpoint
    #[arg(
        long,
        default_value = haven_engine::config::CONFIG_PATH,
        help = "Path of the configuration endpoint on the origin"
    )]
    pub config_path: String,

    /// Local configuration document
    #[arg(
        short,
        long,
        help = "Read the configuration document from this file instead of the origin"
    )]
    pub config_file: Option<PathBuf>,

    /// Additional paths to precache on install
    #[arg(long, value_name = "PATH", help = "Additional path to precache on install (can be used multiple times)")]
    pub precache: Vec<String>,

    /// Issue requests as top-level navigations
    #[arg(short = 'N', long, help = "Issue requests as page navigations instead of programmatic fetches")]
    pub navigate: bool,

    /// Skip install and activate
    #[arg(long, help = "Serve requests without running install and activate first")]
    pub skip_lifecycle: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Overall timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Overall timeout in seconds for HTTP requests (0 disables it)"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Custom HTTP headers
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Disable all proxy settings
    #[arg(long, help = "Disable all proxy settings (including system proxy)")]
    pub no_proxy: bool,

    /// Log file
    #[arg(long, default_value = "haven.log", help = "File receiving a copy of the log output")]
    pub log_file: PathBuf,
}
