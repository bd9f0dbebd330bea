//! Command line interface
//!
//! `nlpers` with no subcommand starts the HTTP server. The other
//! subcommands are one-shot management tasks run against the configured
//! database, cache and media directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::services::maintenance::{ArchiveCheckReport, ClearReport, OptimizeReport};
use crate::services::Services;

#[derive(Debug, Parser)]
#[command(name = "nlpers", version, about = "NLPers content platform")]
pub struct CliArgs {
    /// Path to the YAML configuration file
    #[arg(
        long = "config-file",
        env = "NLPERS_CONFIG_FILE",
        value_name = "PATH",
        default_value = "config.yml"
    )]
    pub config_file: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Remove cached entries
    ClearCache(ClearCacheArgs),
    /// Apply migrations, refresh statistics and check integrity
    OptimizeDb(OptimizeDbArgs),
    /// Regenerate empty or malformed slugs
    FixSlugs,
    /// Create the site settings row if it is missing
    CreateSiteSettings,
    /// Find archive entries whose stored file is gone
    CheckArchiveFiles(CheckArchiveArgs),
}

#[derive(Debug, Args, Clone, Default, PartialEq)]
pub struct ClearCacheArgs {
    /// Flush the whole cache
    #[arg(long, conflicts_with = "pattern")]
    pub all: bool,

    /// Only remove keys matching this glob, e.g. `post_detail:*`
    #[arg(long, value_name = "GLOB")]
    pub pattern: Option<String>,
}

#[derive(Debug, Args, Clone, Default, PartialEq)]
pub struct OptimizeDbArgs {
    /// Rebuild the database file
    #[arg(long)]
    pub vacuum: bool,

    /// Print row counts per table and the index list
    #[arg(long)]
    pub analyze: bool,
}

#[derive(Debug, Args, Clone, Default, PartialEq)]
pub struct CheckArchiveArgs {
    /// Delete the entries whose file is missing
    #[arg(long)]
    pub delete: bool,
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

/// Run a management task and print its report
pub async fn run_task(services: &Services, command: Command) -> Result<()> {
    let maintenance = &services.maintenance;
    match command {
        Command::Serve => anyhow::bail!("serve is not a management task"),
        Command::ClearCache(args) => {
            let report = maintenance
                .clear_cache(args.all, args.pattern.as_deref())
                .await?;
            print_clear_report(&report);
        }
        Command::OptimizeDb(args) => {
            let report = maintenance.optimize_db(args.vacuum, args.analyze).await?;
            print_optimize_report(&report);
        }
        Command::FixSlugs => {
            let report = maintenance.fix_slugs().await?;
            println!("Posts: {}", report.posts);
            println!("Blog categories: {}", report.categories);
            println!("Tags: {}", report.tags);
            println!("File categories: {}", report.file_categories);
            println!("Files: {}", report.files);
            println!("Fixed {} slugs", report.total());
        }
        Command::CreateSiteSettings => {
            let (settings, created) = maintenance.create_site_settings().await?;
            if created {
                println!("Created site settings for \"{}\"", settings.site_name);
            } else {
                println!("Site settings already exist (\"{}\")", settings.site_name);
            }
        }
        Command::CheckArchiveFiles(args) => {
            let report = maintenance.check_archive_files(args.delete).await?;
            print_archive_report(&report, args.delete);
        }
    }
    Ok(())
}

fn print_clear_report(report: &ClearReport) {
    match report {
        ClearReport::All => println!("Cleared the whole cache"),
        ClearReport::Patterns(removed) => {
            for (pattern, count) in removed {
                println!("{:<28} {}", pattern, count);
            }
            let total: u64 = removed.iter().map(|(_, count)| count).sum();
            println!("Removed {} keys", total);
        }
    }
}

fn print_optimize_report(report: &OptimizeReport) {
    println!("Migrations applied: {}", report.migrations_applied);
    if report.vacuumed {
        println!("Database vacuumed");
    }
    println!("Integrity check: {}", report.integrity);
    if !report.tables.is_empty() {
        println!("\nTables:");
        for table in &report.tables {
            println!("  {:<28} {}", table.name, table.rows);
        }
    }
    if !report.indexes.is_empty() {
        println!("\nIndexes:");
        for index in &report.indexes {
            println!("  {}", index);
        }
    }
}

fn print_archive_report(report: &ArchiveCheckReport, delete: bool) {
    println!("Checked {} files, {} ok", report.total, report.ok);
    for missing in &report.missing {
        let path = if missing.file_path.is_empty() {
            "<no file>"
        } else {
            missing.file_path.as_str()
        };
        println!("  missing #{} {} ({})", missing.id, missing.title, path);
    }
    if delete {
        println!("Deleted {} entries", report.deleted);
    } else if !report.missing.is_empty() {
        println!("Run again with --delete to remove them");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestApp;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_default_command_is_serve() {
        let args = parse(&["nlpers"]);
        assert_eq!(args.command(), Command::Serve);
        assert_eq!(args.config_file, PathBuf::from("config.yml"));
    }

    #[test]
    fn test_parse_management_commands() {
        assert_eq!(
            parse(&["nlpers", "clear-cache", "--pattern", "post_detail:*"]).command(),
            Command::ClearCache(ClearCacheArgs {
                all: false,
                pattern: Some("post_detail:*".to_string()),
            })
        );
        assert_eq!(
            parse(&["nlpers", "optimize-db", "--vacuum"]).command(),
            Command::OptimizeDb(OptimizeDbArgs {
                vacuum: true,
                analyze: false,
            })
        );
        assert_eq!(
            parse(&["nlpers", "--config-file", "prod.yml", "check-archive-files", "--delete"])
                .command(),
            Command::CheckArchiveFiles(CheckArchiveArgs { delete: true })
        );
        assert_eq!(parse(&["nlpers", "fix-slugs"]).command(), Command::FixSlugs);
        assert_eq!(
            parse(&["nlpers", "create-site-settings"]).command(),
            Command::CreateSiteSettings
        );
    }

    #[test]
    fn test_all_conflicts_with_pattern() {
        assert!(
            CliArgs::try_parse_from(["nlpers", "clear-cache", "--all", "--pattern", "x:*"])
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_run_tasks() {
        let app = TestApp::new().await;
        run_task(&app, Command::CreateSiteSettings).await.unwrap();
        run_task(&app, Command::FixSlugs).await.unwrap();
        run_task(&app, Command::ClearCache(ClearCacheArgs::default()))
            .await
            .unwrap();
        run_task(
            &app,
            Command::CheckArchiveFiles(CheckArchiveArgs { delete: false }),
        )
        .await
        .unwrap();
        assert!(run_task(&app, Command::Serve).await.is_err());
    }
}
