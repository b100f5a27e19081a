use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "catfeed")]
#[command(version)]
#[command(about = "Page through a remote image catalog with a memory-bounded cache", long_about = None)]
pub struct Args {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Catalog base URL (overrides config)
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// Number of pages to walk before exiting
    #[arg(short, long, default_value_t = 3)]
    pub pages: usize,

    /// Write a default config file to the given path and exit
    #[arg(long)]
    pub generate_config: Option<PathBuf>,
}
