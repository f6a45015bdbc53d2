//! Sigdesk CLI - place signatures on PDFs and sign them through a signing service.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod plan;
mod utils;

use commands::batch::BatchArgs;
use commands::sign::SignArgs;
use commands::{OverlayArgs, ServiceArgs};
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (e.g. missing certificate id)
  65  A document failed to sign or a signature did not verify
  66  Input file missing or unreadable
  69  Signing service unavailable
  74  Output could not be written

Environment:
  SIGDESK_API_URL, SIGDESK_ACCESS_TOKEN, SIGDESK_REFRESH_TOKEN,
  SIGDESK_TIMEOUT_SECS, SIGDESK_MAX_RETRIES, SIGDESK_LOG";

#[derive(Parser)]
#[command(name = "sigdesk")]
#[command(author, version, about = "Place signatures on PDF documents and sign them remotely", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Signing service base URL (overrides SIGDESK_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Bearer token for the signing service (overrides SIGDESK_ACCESS_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    access_token: Option<String>,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug output to stderr (SIGDESK_LOG or RUST_LOG take precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print page sizes in PDF points and display pixels
    Pages {
        /// PDF files to measure
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Render placement previews as PNG images
    Preview {
        /// PDF files to preview (one overlay each, from the overlay flags)
        #[arg(value_name = "FILE", required_unless_present = "plan")]
        files: Vec<PathBuf>,

        /// JSON signing plan describing documents and overlays
        #[arg(long, value_name = "PLAN", conflicts_with = "files")]
        plan: Option<PathBuf>,

        #[command(flatten)]
        overlay: OverlayArgs,

        /// Directory for the PNG files
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Sign documents one by one, applying each overlay in order
    Sign {
        /// PDF files to sign (one overlay each, from the overlay flags)
        #[arg(value_name = "FILE", required_unless_present = "plan")]
        files: Vec<PathBuf>,

        /// JSON signing plan describing documents and overlays
        #[arg(long, value_name = "PLAN", conflicts_with = "files")]
        plan: Option<PathBuf>,

        /// Certificate used for every signature (overrides the plan)
        #[arg(short, long, value_name = "ID")]
        certificate: Option<String>,

        #[command(flatten)]
        overlay: OverlayArgs,

        /// Do not request an RFC 3161 timestamp
        #[arg(long)]
        no_tsa: bool,

        /// Embed long-term-validation material
        #[arg(long)]
        ltv: bool,

        /// Directory for signed files
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Stamp documents locally instead of calling the signing service
        #[arg(long)]
        dry_run: bool,
    },

    /// Sign several documents in one request with invisible signatures
    BatchSign {
        /// PDF files to sign
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Certificate used for every signature
        #[arg(short, long, value_name = "ID")]
        certificate: String,

        /// Seal image id
        #[arg(long, value_name = "SEAL_ID")]
        seal: Option<String>,

        /// Reason embedded in the signatures
        #[arg(long)]
        reason: Option<String>,

        /// Location embedded in the signatures
        #[arg(long)]
        location: Option<String>,

        /// Contact information embedded in the signatures
        #[arg(long)]
        contact: Option<String>,

        /// Do not request an RFC 3161 timestamp
        #[arg(long)]
        no_tsa: bool,

        /// Embed long-term-validation material
        #[arg(long)]
        ltv: bool,

        /// Print the service report as JSON
        #[arg(long)]
        json: bool,

        /// Report locally instead of calling the signing service
        #[arg(long)]
        dry_run: bool,
    },

    /// Verify the signatures embedded in a PDF
    Verify {
        /// Signed PDF to verify
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the service report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List seal images stored by the signing service
    Seals {
        /// Check a local PNG or SVG seal image instead of listing
        #[arg(long, value_name = "IMAGE")]
        check: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "sigdesk_core=debug,sigdesk=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_env("SIGDESK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let service = ServiceArgs {
        api_url: cli.api_url,
        access_token: cli.access_token,
    };
    let quiet = cli.quiet;

    match cli.command {
        Commands::Pages { files, json } => commands::pages::execute(files, json, quiet).await,
        Commands::Preview {
            files,
            plan,
            overlay,
            output,
        } => commands::preview::execute(files, plan, overlay, output, quiet).await,
        Commands::Sign {
            files,
            plan,
            certificate,
            overlay,
            no_tsa,
            ltv,
            output,
            dry_run,
        } => {
            let args = SignArgs {
                files,
                plan,
                certificate,
                overlay,
                no_tsa,
                ltv,
                output,
                dry_run,
            };
            commands::sign::execute(args, &service, quiet).await
        }
        Commands::BatchSign {
            files,
            certificate,
            seal,
            reason,
            location,
            contact,
            no_tsa,
            ltv,
            json,
            dry_run,
        } => {
            let args = BatchArgs {
                files,
                certificate,
                seal,
                reason,
                location,
                contact,
                no_tsa,
                ltv,
                json,
                dry_run,
            };
            commands::batch::execute(args, &service, quiet).await
        }
        Commands::Verify { file, json } => {
            commands::verify::execute(file, json, &service, quiet).await
        }
        Commands::Seals { check, json } => {
            commands::seals::execute(check, json, &service, quiet).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = exit.message {
            eprintln!("{} {message}", "error:".red().bold());
        }
        std::process::exit(exit.code);
    }
    std::process::exit(exit_codes::SUCCESS);
}
