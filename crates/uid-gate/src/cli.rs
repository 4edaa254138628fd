use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "uid-gate",
    version,
    about = "Whitelist gate for a game login flow"
)]
pub struct Cli {
    /// Path to the configuration file (YAML or JSON)
    #[arg(short, long, default_value = "config/config.json")]
    pub config: PathBuf,

    /// Proxy listen port (overrides config file setting)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Transform service URL (overrides config file setting)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Path to the whitelist file (overrides config file setting)
    #[arg(short, long)]
    pub whitelist: Option<PathBuf>,
}
