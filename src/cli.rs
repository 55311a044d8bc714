use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lexdesk", about = "Upload and review contracts", version)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Keep the session in memory only (nothing is read from or written to disk)
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LEXDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and its tenant
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LEXDESK_PASSWORD", hide_env_values = true)]
        password: String,
        /// Organisation name for the new tenant
        #[arg(long)]
        tenant: String,
    },
    /// Forget the stored session
    Signout,
    /// Show the current session
    Status,
    /// Upload a PDF or DOCX contract
    Upload {
        file: PathBuf,
        /// Trigger the analysis function after uploading
        #[arg(long)]
        analyze: bool,
        /// Existing document id for the analysis request. A generated id is not saved by the backend
        #[arg(long)]
        document_id: Option<String>,
    },
    /// Analyze a local contract directly with the configured model
    Analyze {
        file: PathBuf,
        /// Print the raw analysis JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a downloadable PDF report for an analyzed document
    Report {
        document_id: String,
    },
    /// List documents
    Documents,
    /// Show the analysis for a document
    Show {
        document_id: String,
    },
    /// Serve the local JSON API
    Serve {
        #[arg(long, default_value = "3141")]
        port: u16,
    },
}

impl Commands {
    /// Name used in error reports and guard redirects.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Signin { .. } => "signin",
            Commands::Signup { .. } => "signup",
            Commands::Signout => "signout",
            Commands::Status => "status",
            Commands::Upload { .. } => "upload",
            Commands::Analyze { .. } => "analyze",
            Commands::Report { .. } => "report",
            Commands::Documents => "documents",
            Commands::Show { .. } => "show",
            Commands::Serve { .. } => "serve",
        }
    }
}
