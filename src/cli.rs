use clap::{Parser, Subcommand};

/// Command line for the warmer: run the control plane or drive single operations.
#[derive(Parser, Debug)]
#[command(name = "sitemap_warmer")]
#[command(about = "Regional cache warmer driven by XML sitemaps")]
#[command(version)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        default_value = "./data",
        help = "Directory holding warmer state and logs"
    )]
    pub data_dir: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP control plane and run the fixed-interval scheduler.
    Serve {
        #[arg(short, long, default_value = "0.0.0.0:8080", help = "Address to bind")]
        bind: String,

        #[arg(long, help = "Serve HTTP only, without the scheduled trigger")]
        no_schedule: bool,
    },

    /// Warm the next page for the next region once and print the result.
    Run {
        #[arg(long, help = "Warm only a small fixed number of URLs without moving the cursor")]
        test: bool,
    },

    /// Print the latest result and progress for every region.
    Status,

    /// Print stored run results with cross-run totals.
    History {
        #[arg(short, long, help = "Only this region (all regions when omitted)")]
        region: Option<String>,

        #[arg(short, long, default_value_t = 10, help = "Results per region")]
        limit: usize,
    },

    /// Restart region rotation at the first configured region.
    ResetRegion,

    /// Fetch the configured sitemaps and report the discovered catalog.
    Discover {
        #[arg(long, default_value_t = 10, help = "How many URLs to print")]
        show: usize,
    },
}

impl Cli {
    /// On error, clap prints help and exits with code 2 (usage error).
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
