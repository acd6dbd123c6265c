use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use apiscout::cli::{Cli, Commands, ReportFormat};
use apiscout::crawler::{Orchestrator, ProgressSink};
use apiscout::discovery::ProbeCatalog;
use apiscout::models::{CrawlResult, ScanProgress, ScanStage};
use apiscout::{ConsoleReporter, CrawlMode, HtmlExporter, JsonExporter, ScannerConfig};

/// Mirrors session progress onto a terminal progress bar.
struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl ProgressSink for BarSink {
    fn publish_progress(&self, _session: Uuid, progress: &ScanProgress) {
        self.bar.set_position(progress.progress as u64);
        self.bar.set_message(format!(
            "{} | {} pages | {} endpoints | {}",
            progress.stage, progress.pages_scanned, progress.endpoints_found, progress.message
        ));
        match progress.stage {
            ScanStage::Completed => self.bar.finish_with_message("Scan complete"),
            ScanStage::Error => self.bar.abandon_with_message(progress.message.clone()),
            _ => {}
        }
    }

    fn publish_result(&self, _session: Uuid, _result: &CrawlResult) {}
}

fn init_logging(verbose: bool) {
    let default = if verbose { "apiscout=debug" } else { "apiscout=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            domain,
            config,
            max_depth,
            max_pages,
            concurrency,
            timeout,
            crawl_delay,
            rps,
            no_js,
            respect_robots,
            same_origin,
            depth_limited,
            output,
            format,
            verbose,
        } => {
            init_logging(verbose);

            let mut scanner_config = match config {
                Some(path) => ScannerConfig::from_file(&path)?,
                None => ScannerConfig::default(),
            };
            if let Some(v) = max_depth {
                scanner_config.max_depth = v;
            }
            if let Some(v) = max_pages {
                scanner_config.max_pages = v;
            }
            if let Some(v) = concurrency {
                scanner_config.concurrency = v;
            }
            if let Some(v) = timeout {
                scanner_config.timeout = v;
            }
            if let Some(v) = crawl_delay {
                scanner_config.crawl_delay = v;
            }
            if let Some(v) = rps {
                scanner_config.requests_per_second = v;
            }
            if no_js {
                scanner_config.enable_javascript = false;
            }
            if respect_robots {
                scanner_config.respect_robots = true;
            }
            if same_origin {
                scanner_config.include_external_links = false;
            }
            if depth_limited {
                scanner_config.crawl_mode = CrawlMode::DepthLimited;
            }

            println!("{} {}", "Scanning".bold(), domain.cyan());

            let orchestrator = Orchestrator::new(scanner_config, Arc::new(BarSink::new()));
            let stop = orchestrator.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stop.stop();
                }
            });

            let result = orchestrator
                .run(&domain)
                .await
                .with_context(|| format!("Scan of {} failed", domain))?;

            let reporter = ConsoleReporter::new();
            reporter.print_endpoints(&result);
            reporter.print_details(&result);
            reporter.print_summary(&result);

            if let Some(path) = output {
                match format {
                    ReportFormat::Json => JsonExporter::export(&result, &path)?,
                    ReportFormat::Html => HtmlExporter::export(&result, &path)?,
                }
                println!("Results saved to {}", path.green());
            }
        }

        Commands::Report {
            input,
            format,
            output,
        } => {
            let result = JsonExporter::load(&input)?;

            match format {
                ReportFormat::Html => {
                    let out = output.unwrap_or_else(|| "report.html".to_string());
                    HtmlExporter::export(&result, &out)?;
                    println!("HTML report saved to {}", out.green());
                }
                ReportFormat::Json => match output {
                    Some(out) => {
                        JsonExporter::export(&result, &out)?;
                        println!("JSON report saved to {}", out.green());
                    }
                    None => {
                        let reporter = ConsoleReporter::new();
                        reporter.print_endpoints(&result);
                        reporter.print_summary(&result);
                    }
                },
            }
        }

        Commands::Catalog => {
            let section = |title: &str, items: &[&str]| {
                println!("\n{} ({})", title.bold().underline(), items.len());
                for item in items {
                    println!("  {}", item);
                }
            };

            section("Well-known paths", ProbeCatalog::well_known_paths());
            section("Brute-force paths", ProbeCatalog::brute_force_paths());
            section("API roots", ProbeCatalog::api_roots());
            section("Subdomain labels", ProbeCatalog::subdomain_labels());

            println!("\n{}", "Framework routes".bold().underline());
            for profile in ProbeCatalog::frameworks() {
                println!("  {}: {}", profile.framework.to_string().cyan(), profile.api_paths.join(", "));
            }
        }
    }

    Ok(())
}
