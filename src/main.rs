//! quire - a rule-driven static site generator with incremental rebuilds.

mod build;
mod cli;
mod config;
mod deps;
mod logger;
mod processors;
mod serve;
mod site;
mod utils;
mod watch;

use anyhow::{Context, Result, bail};
use build::BuildReport;
use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use config::SiteConfig;
use processors::ProcessorRegistry;
use site::Site;
use std::{process::ExitCode, sync::Arc};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logger::set_verbose(cli.verbose);
    let registry = Arc::new(processors::builtin());

    if let Commands::Processors = cli.command {
        list_processors(&registry);
        return Ok(ExitCode::SUCCESS);
    }

    let config = Arc::new(load_config(&cli)?);

    match &cli.command {
        Commands::Build { .. } => {
            let (_, report) = build_site(&cli, config, registry)?;
            Ok(exit_code(&report))
        }
        Commands::Serve { .. } => {
            let (mut site, _) = build_site(&cli, config, registry)?;
            site.force_refresh = false;
            serve::serve_site(site)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Summary { .. } => {
            let (site, report) = build_site(&cli, config, registry)?;
            print_summary(&site, &report);
            Ok(exit_code(&report))
        }
        Commands::Dump { path } => {
            let mut site = Site::new(config, registry)?;
            build::dry_run(&mut site)?;
            let page = site
                .find(path)
                .with_context(|| format!("No page with source or destination `{}`", path.display()))?;
            println!("{}", serde_json::to_string_pretty(page)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&*config)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Processors => Ok(ExitCode::SUCCESS),
    }
}

/// Load configuration and apply command line overrides.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    if !cli.config.exists() {
        bail!("Config file not found: {}", cli.config.display());
    }
    let mut config = SiteConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    config.update_with_cli(cli);
    Ok(config)
}

/// One full pass over a fresh site.
fn build_site(
    cli: &Cli,
    config: Arc<SiteConfig>,
    registry: Arc<ProcessorRegistry>,
) -> Result<(Site, BuildReport)> {
    let mut site = Site::new(config, registry)?;
    site.force_refresh = cli.force();
    let report = build::render(&mut site)?;
    report.log();
    Ok((site, report))
}

fn exit_code(report: &BuildReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn list_processors(registry: &ProcessorRegistry) {
    let width = registry.iter().map(|p| p.name().len()).max().unwrap_or(0);
    for processor in registry.iter() {
        let name = format!("{:width$}", processor.name());
        println!("{}  {}", name.bold(), processor.description());
    }
}

fn print_summary(site: &Site, report: &BuildReport) {
    for (source, status) in report.statuses(site) {
        let dest = site
            .page(source)
            .map(|p| p.dest().display().to_string())
            .unwrap_or_default();
        println!("{status:>8}  {} -> {dest}", source.display());
    }
}
