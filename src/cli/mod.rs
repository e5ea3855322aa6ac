//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "selfquery",
    version,
    author = "neur0map",
    about = "Self-querying document retriever",
    long_about = "selfquery asks a language model to split a natural-language question into a \
                  refined search string and a structured metadata filter, then runs the filtered \
                  search over a document collection."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/selfquery/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply on top of the config (e.g., "local")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve documents relevant to a natural-language query
    Query {
        /// Search query text
        query: String,

        /// JSON file with the documents to search (overrides store.documents_file)
        #[arg(short, long, value_name = "FILE")]
        documents: Option<PathBuf>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show how the model decomposes a query, without searching
    Explain {
        /// Query text to decompose
        query: String,

        /// Show the structured query in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the query-constructor prompt
    Prompt {
        /// Fill the prompt with this query (prints the raw template otherwise)
        query: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section (retriever, llm, store)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
