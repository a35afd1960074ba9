use anyhow::Context;
use clap::Parser;
use rental_scout::models::AreaRadius;
use rental_scout::orchestrator::{CrawlPolicy, RunReport, ScrapeOrchestrator};
use rental_scout::config::LoggingConfig;
use rental_scout::scrapers::{
    ChromeSession, OlxListing, OlxOffer, OtodomListing, OtodomOffer, RecordSink,
};
use rental_scout::sink::offer_progress_bar;
use rental_scout::{Config, CsvRecordSink, ProgressSink, SearchCriteria};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Scrape rental offers from OLX and Otodom into CSV files
#[derive(Parser, Debug)]
#[command(name = "rental-scout", version, about)]
struct Args {
    /// Location to search for, e.g. "Katowice, Śląskie"
    location_query: Option<String>,

    /// Search radius in km: 0, 5, 10, 15, 25, 50 or 75
    area_radius: Option<u32>,

    /// Maximum number of offers to save across all sites
    offer_cap: Option<u32>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop on the first failure and log everything
    #[arg(long)]
    debug: bool,

    /// Show the browser window
    #[arg(long)]
    visible: bool,

    /// Folder for scraped records (overrides data.output_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(location) = &self.location_query {
            config.scraper.location_query = location.clone();
        }
        if let Some(km) = self.area_radius {
            config.scraper.area_radius = AreaRadius::from_km(km)?;
        }
        if let Some(cap) = self.offer_cap {
            config.scraper.offer_cap = cap;
        }
        if self.debug {
            config.logging.debug = true;
        }
        if self.visible {
            config.browser.headless = false;
        }
        if let Some(output) = &self.output {
            config.data.output_dir = output.clone();
        }

        config.validate()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config =
        Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config).context("Invalid arguments")?;

    // Dropping the guard flushes the file writer, so it lives until main returns
    let _log_guard = init_logging(&config.logging)?;

    info!("🏠 Rental Scout - OLX & Otodom");
    info!("==============================");

    let criteria = config.scraper.criteria()?;
    let output_dir = config.data.output_dir.clone();

    // The browser client blocks, so the whole scrape runs off the async runtime
    let (result, files) = tokio::task::spawn_blocking(move || scrape(&config, criteria))
        .await
        .context("Scrape task panicked")?;

    for file in &files {
        info!("💾 Saved records to {}", file.display());
    }

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            error!("Scrape failed: {}", err);
            return Err(err).context("Scrape aborted");
        }
    };

    println!("\n✅ Scraped {} new offers\n", report.records);
    for site in &report.sites {
        println!(
            "{}: {:?} ({} pages, {} saved, {} duplicates, {} failed)",
            site.site,
            site.state,
            site.pages,
            site.records,
            site.duplicates_skipped,
            site.failed_offers
        );
        if let Some(reason) = &site.abort_reason {
            println!("   Aborted: {}", reason);
        }
    }

    tokio::fs::create_dir_all(&output_dir).await?;
    let summary_path = output_dir.join("run_summary.json");
    let json = serde_json::to_string_pretty(&report)?;
    tokio::fs::write(&summary_path, json).await?;
    info!("💾 Saved run summary to {}", summary_path.display());

    Ok(())
}

/// Log to the console and to `logging.dir/logging.file`
fn init_logging(logging: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.dir)
        .with_context(|| format!("Failed to create log folder {}", logging.dir.display()))?;

    let file_appender = RollingFileAppender::new(Rotation::NEVER, &logging.dir, &logging.file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.default_filter()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(guard)
}

/// Launch the browser, crawl every site and release the browser again.
///
/// Also returns the files written, which exist even when the run failed.
fn scrape(
    config: &Config,
    criteria: SearchCriteria,
) -> (rental_scout::Result<RunReport>, Vec<PathBuf>) {
    let mut browser = match ChromeSession::launch(&config.browser) {
        Ok(browser) => browser,
        Err(err) => return (Err(err), Vec::new()),
    };
    let mut sink = ProgressSink::new(
        CsvRecordSink::new(&config.data.output_dir, config.sites.domains.clone()),
        offer_progress_bar(criteria.offer_cap),
    );

    let scraper = &config.scraper;
    let sites = &config.sites;
    let setup_timeout = scraper.multi_wait_timeout();

    let result = {
        let mut orchestrator = ScrapeOrchestrator::new(
            &mut browser,
            &mut sink,
            sites.domains.clone(),
            scraper.pacing(),
            CrawlPolicy {
                debug: config.debug(),
                budget: scraper.retry_budget(),
            },
        )
        .with_site(OlxListing::new(
            sites.olx.clone(),
            sites.domains.olx.clone(),
            sites.olx_category.clone(),
            setup_timeout,
        ))
        .with_site(OtodomListing::new(
            sites.otodom.clone(),
            sites.domains.otodom.clone(),
            scraper.wait_timeout(),
        ))
        .with_extractor(OlxOffer::new(sites.olx.clone()))
        .with_extractor(OtodomOffer::new(sites.otodom.clone()));

        orchestrator.run(criteria)
    };

    match &result {
        Ok(report) => sink
            .bar()
            .finish_with_message(format!("{} new offers", report.records)),
        Err(_) => sink.bar().abandon_with_message("run stopped"),
    }

    browser.quit();
    (result, sink.locations())
}
