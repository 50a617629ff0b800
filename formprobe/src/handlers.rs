use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use formprobe_core::report::{ReportData, ReportFormat, generate_report, save_report};
use formprobe_core::{
    Category, Driver, ScanOptions, ScanOutcome, default_payloads, execute_scan, validate_max_depth,
};
use formprobe_scanner::crawler::{DEFAULT_USER_AGENT, build_client};
use formprobe_scanner::{Origin, RobotsPolicy, StaticCrawler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info};
use url::Url;

pub fn print_banner() {
    let banner = r#"
   __                                     _
  / _| ___  _ __ _ __ ___  _ __  _ __ ___ | |__   ___
 | |_ / _ \| '__| '_ ` _ \| '_ \| '__/ _ \| '_ \ / _ \
 |  _| (_) | |  | | | | | | |_) | | | (_) | |_) |  __/
 |_|  \___/|_|  |_| |_| |_| .__/|_|  \___/|_.__/ \___|
                          |_|
"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_white(),
        "For authorized security testing only.".dimmed()
    );
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

/// Maps the global verbosity flags onto a max log level.
pub fn log_level(quiet: bool, verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    }
}

/// Installs the process-wide tracing subscriber. Only the binary does this.
pub fn init_logging(quiet: bool, verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(quiet, verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Expands `~` in an operator-supplied output path.
pub fn resolve_output_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Builds scan options from the `scan` subcommand's arguments.
///
/// Validation happens here, before anything touches the network.
pub fn build_scan_options(args: &ArgMatches) -> Result<ScanOptions> {
    let url = args
        .get_one::<Url>("url")
        .ok_or_else(|| anyhow!("--url is required"))?;
    let depth = args
        .get_one::<String>("depth")
        .map(String::as_str)
        .unwrap_or("2");
    let max_depth = validate_max_depth(depth)?;

    let mut options = ScanOptions::new(url.as_str(), max_depth);
    if let Some(concurrency) = args.get_one::<usize>("concurrency") {
        options.concurrency = *concurrency;
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        options.fetch_timeout = Duration::from_secs(*timeout);
    }
    if let Some(timeout) = args.get_one::<u64>("body-timeout") {
        options.body_timeout = Duration::from_secs(*timeout);
    }
    if let Some(driver) = args.get_one::<String>("driver") {
        options.driver =
            Driver::from_str(driver).ok_or_else(|| anyhow!("unknown driver '{}'", driver))?;
    }
    options.render = !args.get_flag("no-render");
    options.show_progress_bars = !args.get_flag("quiet");

    Ok(options)
}

pub async fn handle_scan(args: &ArgMatches) -> Result<()> {
    let options = build_scan_options(args)?;
    let quiet = args.get_flag("quiet");
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let output = args.get_one::<String>("output").map(|p| resolve_output_path(p));

    if !quiet {
        print_divider();
        println!("{}", "  FORMPROBE SCAN".bright_white().bold());
        print_divider();
        println!("{} Target:      {}", "→".blue(), options.base_url.bright_white());
        println!("{} Max depth:   {}", "→".blue(), options.max_depth);
        println!("{} Concurrency: {}", "→".blue(), options.concurrency);
        println!(
            "{} Rendering:   {}\n",
            "→".blue(),
            if options.render {
                format!("{:?}", options.driver).to_lowercase()
            } else {
                "disabled".to_string()
            }
        );
    }

    let outcome = execute_scan(options).await.context("scan aborted")?;
    let data = ReportData::from_outcome(&outcome);

    match output {
        Some(path) => {
            if let Err(e) = write_report(&data, format, &path) {
                error!(path = %path.display(), error = %e, "could not write report");
                eprintln!("{} {:#}", "✗ Report not saved:".red().bold(), e);
            } else {
                println!(
                    "{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => match generate_report(&data, format) {
            Ok(report) => print!("{}", report),
            Err(e) => {
                error!(error = %e, "could not render report");
                eprintln!("{} {}", "✗ Report not rendered:".red().bold(), e);
            }
        },
    }

    print_summary(&outcome);
    Ok(())
}

pub fn write_report(data: &ReportData, format: ReportFormat, path: &Path) -> Result<()> {
    let content = generate_report(data, format).context("failed to render report")?;
    save_report(&content, path)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    info!(path = %path.display(), "report written");
    Ok(())
}

pub fn print_summary(outcome: &ScanOutcome) {
    let sqli = outcome
        .vulnerabilities
        .iter()
        .filter(|v| v.category == Category::Sqli)
        .count();
    let xss = outcome.vulnerabilities.len() - sqli;

    println!();
    print_divider();
    println!("{}", "  SUMMARY".bright_white().bold());
    print_divider();
    println!("  Pages visited:   {}", outcome.combined_urls().len());
    println!("  Forms fuzzed:    {}", outcome.forms.len());
    println!("  Attempts:        {}", outcome.attempts.len());

    if outcome.vulnerabilities.is_empty() {
        println!("  {}", "No vulnerabilities found".green());
    } else {
        println!(
            "  {} {}",
            "Vulnerabilities:".red().bold(),
            outcome.vulnerabilities.len().to_string().red().bold()
        );
        println!("    SQL injection: {}", sqli);
        println!("    Reflected XSS: {}", xss);
        for v in &outcome.vulnerabilities {
            println!(
                "  {} {} {} {}",
                "•".red(),
                v.category.title().bright_white(),
                v.form_action,
                format!("[{}]", v.payload).dimmed()
            );
        }
    }
    println!();
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let url = args
        .get_one::<Url>("url")
        .ok_or_else(|| anyhow!("--url is required"))?;
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&10);

    let origin = Origin::of(url).context("invalid crawl target")?;
    let client = build_client(Duration::from_secs(timeout), DEFAULT_USER_AGENT)?;
    let robots = Arc::new(RobotsPolicy::load(&client, &origin).await);

    println!("\n{} Crawling {}\n", "🕷".bright_cyan(), url.as_str().bright_white());
    let visited = StaticCrawler::new(client)
        .crawl(url.as_str(), robots)
        .await
        .context("crawl failed")?;

    println!("{} Crawl complete: {} pages\n", "✓".green().bold(), visited.len());
    for page in &visited {
        println!("  {}", page);
    }
    Ok(())
}

pub fn handle_payloads() {
    for payload in default_payloads() {
        let tag = match payload.category {
            Category::Sqli => "[SQLI]".yellow().bold(),
            Category::Xss => "[XSS] ".magenta().bold(),
        };
        println!("{} {}", tag, payload.value);
    }
}
