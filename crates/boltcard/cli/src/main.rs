use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod utils;

use commands::*;

#[derive(Parser)]
#[command(version, about = "Bolt Card tools: keys, templates and SUN verification")]
struct Cli {
    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the p and c parameters of a tapped card
    Verify {
        /// Full URL read from the card, instead of --p and --c
        #[arg(long, conflicts_with_all = ["p", "c"])]
        url: Option<String>,

        /// Encrypted PICC data (32 hex characters)
        #[arg(short, long, requires = "c")]
        p: Option<String>,

        /// SUN MAC (16 hex characters)
        #[arg(short, long, requires = "p")]
        c: Option<String>,

        /// Expected card UID (14 hex characters)
        #[arg(long)]
        uid: String,

        /// SDM meta read key (k1)
        #[arg(long)]
        k1: String,

        /// SDM file read key (k2)
        #[arg(long)]
        k2: String,

        /// Highest read counter accepted so far
        #[arg(long)]
        last_counter: Option<u32>,
    },

    /// Generate a random key set
    Keygen {
        /// LNURL-withdraw base, emits card details instead of a bare key set
        #[arg(long)]
        lnurlw_base: Option<String>,

        /// Write the JSON to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Produce a wipe backup from a key set file
    Backup {
        /// JSON file with k0..k4
        #[arg(required = true)]
        keys: PathBuf,

        /// Write the backup to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the NDEF template and SDM offsets for a base URL
    Template {
        /// LNURL-withdraw base URL
        #[arg(required = true)]
        lnurlw_base: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Verify {
            url,
            p,
            c,
            uid,
            k1,
            k2,
            last_counter,
        } => {
            let message = sun_message(url.as_deref(), p, c)?;
            verify_command(&message, &uid, &k1, &k2, last_counter)
        }
        Commands::Keygen {
            lnurlw_base,
            output,
        } => keygen_command(lnurlw_base, output.as_ref()),
        Commands::Backup { keys, output } => backup_command(&keys, output.as_ref()),
        Commands::Template { lnurlw_base } => template_command(&lnurlw_base),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}
