use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "apiscout")]
#[command(version, about = "Crawls a web property and inventories the API endpoints it exposes")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Html,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl a domain and list its API endpoints
    Scan {
        /// Domain to crawl (example.com), or a full http(s) URL
        domain: String,

        /// JSON file with scanner settings; flags below override it
        #[arg(long)]
        config: Option<String>,

        #[arg(long)]
        max_depth: Option<usize>,

        #[arg(long)]
        max_pages: Option<usize>,

        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Per-request timeout in milliseconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Delay before each page fetch in milliseconds
        #[arg(long)]
        crawl_delay: Option<u64>,

        /// Global request rate ceiling
        #[arg(long)]
        rps: Option<u32>,

        /// Fetch pages statically instead of rendering them
        #[arg(long)]
        no_js: bool,

        #[arg(long)]
        respect_robots: bool,

        /// Never follow links to other origins
        #[arg(long)]
        same_origin: bool,

        /// Stop following links deeper than --max-depth
        #[arg(long)]
        depth_limited: bool,

        #[arg(short, long)]
        output: Option<String>,

        #[arg(short, long, value_enum, default_value = "json")]
        format: ReportFormat,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Re-render a saved JSON result
    Report {
        #[arg(short, long)]
        input: String,

        #[arg(short, long, value_enum, default_value = "html")]
        format: ReportFormat,

        #[arg(short, long)]
        output: Option<String>,
    },

    /// Print the probe catalogs used by the discovery strategies
    Catalog,
}
