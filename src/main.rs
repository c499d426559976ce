use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{ArgGroup, Parser, Subcommand};

mod config;
mod db;
mod digest;
mod export;
mod models;
mod report;
mod stats;

use crate::config::Config;
use crate::db::{MemberFilter, MemberStore};
use crate::export::ExportOutcome;
use crate::models::MemberStatus;

#[derive(Parser)]
#[command(name = "csa-member-reports")]
#[command(about = "Member export and weekly digest tooling for the CSA member database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export member records to a CSV file
    #[command(group(
        ArgGroup::new("status_scope")
            .args(["status", "verified_only"])
            .multiple(false)
    ))]
    Export {
        /// Output file, defaults to members-YYYYMMDD.csv
        #[arg(long)]
        output: Option<PathBuf>,
        /// Restrict to a single status
        #[arg(long, value_enum)]
        status: Option<MemberStatus>,
        /// Keep BLOCKED members in the export
        #[arg(long)]
        include_blocked: bool,
        /// Shortcut for --status verified
        #[arg(long)]
        verified_only: bool,
    },
    /// Render and send the weekly digest email
    Digest {
        /// Render and print everything without opening an SMTP connection
        #[arg(long)]
        dry_run: bool,
        /// Override the configured recipient list
        #[arg(long)]
        recipients: Vec<String>,
        /// Write the HTML body to a file for preview
        #[arg(long)]
        save_html: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::from_env();

    if let Err(err) = run(cli.command, &config).await {
        eprintln!("error: {err:#}");
        eprintln!();
        eprintln!("Troubleshooting:");
        eprintln!("  - check the database connection settings");
        eprintln!("  - make sure the database server is running");
        eprintln!("  - verify the SMTP host and credentials");
        eprintln!("  - check file permissions for the output directory");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &Config) -> anyhow::Result<()> {
    let store = db::connect(&config.db).await?;
    let result = dispatch(command, store.as_ref(), config).await;
    // Release the connection on the failure path too.
    store.close().await;
    result
}

async fn dispatch(
    command: Commands,
    store: &dyn MemberStore,
    config: &Config,
) -> anyhow::Result<()> {
    match command {
        Commands::Export {
            output,
            status,
            include_blocked,
            verified_only,
        } => {
            let status = if verified_only {
                Some(MemberStatus::Verified)
            } else {
                status
            };
            let filter = MemberFilter {
                status,
                include_blocked,
            };
            let members = store.list_members(&filter).await?;
            let path = output.unwrap_or_else(default_export_path);

            match export::export_csv(&members, &path)? {
                ExportOutcome::Written(count) => {
                    println!("Exported {count} members to {}.", path.display());
                }
                ExportOutcome::Empty => {
                    println!("No members matched the export filters; nothing written.");
                }
            }
        }
        Commands::Digest {
            dry_run,
            recipients,
            save_html,
        } => {
            let now = Utc::now().naive_utc();
            let stats = stats::compute_weekly_stats(store, now).await?;
            let rendered = report::render(&stats, &config.app.name, Utc::now().naive_utc());
            let subject = digest::subject(&config.app.name, &stats);
            let recipients = digest::resolve_recipients(&recipients, &config.app);

            if let Some(path) = save_html {
                std::fs::write(&path, &rendered.html)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("HTML preview saved to {}.", path.display());
            }

            if dry_run {
                println!("=== DRY RUN ===");
                println!("Subject: {subject}");
                println!("Recipients: {}", recipients.join(", "));
                println!();
                println!("{}", rendered.text);
            } else {
                let message = digest::compose(&config.smtp, &subject, &recipients, &rendered)?;
                digest::deliver(&config.smtp, &message)?;
                println!("Weekly digest sent to {}.", recipients.join(", "));
                println!(
                    "{} new registrations, {} pending verifications this week.",
                    stats.new_registrations, stats.pending_verifications
                );
            }
        }
    }

    Ok(())
}

fn default_export_path() -> PathBuf {
    PathBuf::from(format!("members-{}.csv", Local::now().format("%Y%m%d")))
}
