//! Command-line front end for the search pipeline.
//!
//! Runs one request and prints the response as JSON on stdout. Logs go to
//! stderr so the output can be piped.
//!
//! ```text
//! search "tech reviewers on YouTube" --min 5 --source youtube --source tiktok
//! ```

use std::num::NonZeroU32;

use anyhow::{Context, Result};
use clap::Parser;
use search_pipeline::{
    FetcherExt, FirecrawlScraper, HttpScraper, OpenAiModel, PageScraper, Pipeline, PipelineConfig,
    SearchRequest, TavilySearch, WebFetcher,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "search")]
#[command(about = "Search the web and always get structured results back")]
struct Cli {
    /// Free-text query
    query: String,

    /// Maximum records to return
    #[arg(long, default_value_t = 10)]
    max: usize,

    /// Records the response must contain
    #[arg(long, default_value_t = 3)]
    min: usize,

    /// Target platform or site (repeatable)
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Extra keyword appended to the query (repeatable)
    #[arg(long = "keyword")]
    keywords: Vec<String>,

    #[arg(long)]
    locale: Option<String>,

    /// Country or region preference
    #[arg(long)]
    geo: Option<String>,

    /// Prefer content from the last N days
    #[arg(long)]
    recency_days: Option<u32>,

    /// OpenAI chat model
    #[arg(long, default_value = "gpt-4o")]
    model: String,

    /// Scrape pages with plain HTTP instead of Firecrawl
    #[arg(long)]
    plain_http: bool,

    /// Outbound fetches per second
    #[arg(long, default_value_t = 5)]
    rate: u32,

    /// Pretty-print the JSON response
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,search_pipeline=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();

    let cli = Cli::parse();

    // Loads .env as a side effect
    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;

    let model = OpenAiModel::from_env()
        .context("Failed to create OpenAI model")?
        .with_model(cli.model.clone());

    let search = TavilySearch::from_env()
        .context("Failed to create Tavily client")?
        .with_max_results(cli.max.max(5));
    let scraper: PageScraper = if cli.plain_http {
        HttpScraper::new().context("Failed to create HTTP scraper")?.into()
    } else {
        FirecrawlScraper::from_env()
            .context("Failed to create Firecrawl client")?
            .into()
    };
    let rate = NonZeroU32::new(cli.rate).context("--rate must be greater than zero")?;
    let fetcher = WebFetcher::new(search, scraper).rate_limited(rate);

    let pipeline = Pipeline::new(model, fetcher, config).context("Failed to build pipeline")?;

    let mut request = SearchRequest::new(cli.query)
        .with_max_results(cli.max)
        .with_min_results(cli.min)
        .with_target_sources(cli.sources)
        .with_keywords(cli.keywords);
    if let Some(locale) = cli.locale {
        request = request.with_locale(locale);
    }
    if let Some(geo) = cli.geo {
        request = request.with_geo(geo);
    }
    if let Some(days) = cli.recency_days {
        request = request.with_recency_days(days);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing with partial results");
            on_interrupt.cancel();
        }
    });

    let response = pipeline.run_with_cancel(&request, cancel).await;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    }
    .context("Failed to serialize response")?;
    println!("{output}");

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}
