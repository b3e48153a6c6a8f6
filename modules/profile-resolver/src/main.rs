use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use profile_resolver::discovery::{NoopSearcher, TavilySearcher, WebSearcher};
use profile_resolver::server::build_router;
use profile_resolver::transport::ReqwestTransport;
use profile_resolver::{
    cancel_pair, load_config, AppConfig, CompanyQuery, OpenAiExtractor, ResolverConfig,
    ResolverError, Resolver,
};
use tavily_client::TavilyClient;

#[derive(Parser)]
#[command(
    name = "profile-resolver",
    about = "Find a company's authoritative business-profile page and extract its details"
)]
struct Cli {
    /// Company name, used for discovery and logo matching
    #[arg(long, default_value = "")]
    name: String,

    /// Seed URL (LinkedIn page, website, ...). Repeatable.
    #[arg(long = "url")]
    urls: Vec<String>,

    /// Reference logo image used to disambiguate candidates
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Path to resolver config TOML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after selection, do not call the extraction service
    #[arg(long, conflicts_with = "listen")]
    skip_extraction: bool,

    /// Serve `POST /company-details` on this address instead of resolving once
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("profile_resolver=info,tavily_client=info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResolverConfig::default(),
    };
    let app = AppConfig::from_env();

    let searcher: Arc<dyn WebSearcher> = match &app.tavily_api_key {
        Some(key) => Arc::new(TavilySearcher::new(
            TavilyClient::with_timeout(key.clone(), config.search_timeout())
                .context("Failed to build Tavily client")?,
        )),
        None => {
            warn!("TAVILY_API_KEY not set, discovery disabled");
            Arc::new(NoopSearcher)
        }
    };
    let transport = Arc::new(ReqwestTransport::new(&config).context("Failed to build HTTP client")?);

    let mut resolver = Resolver::new(config, searcher, transport);
    if !cli.skip_extraction {
        let key = app
            .openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY is required unless --skip-extraction is set")?;
        let mut extractor = OpenAiExtractor::new(key);
        if let Some(model) = &app.openai_model {
            extractor = extractor.with_model(model);
        }
        if let Some(url) = &app.openai_base_url {
            extractor = extractor.with_base_url(url);
        }
        resolver = resolver.with_extractor(Arc::new(extractor));
    }

    if let Some(addr) = &cli.listen {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(addr = %addr, "Serving company-details API");
        axum::serve(listener, build_router(Arc::new(resolver)))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        return Ok(());
    }

    let mut query = CompanyQuery::new(cli.name.clone()).with_seed_urls(cli.urls.clone());
    if let Some(path) = &cli.logo {
        let bytes = std::fs::read(path).map_err(|e| {
            ResolverError::InvalidInput(format!("cannot read logo {}: {e}", path.display()))
        })?;
        query = query.with_logo(bytes);
    }

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight work");
            handle.cancel();
        }
    });

    let resolution = resolver.run_with_cancel(&query, signal).await?;
    let outcome = &resolution.outcome;

    info!(reason = %outcome.decision_reason, "Done");
    for ranked in &outcome.all_ranked {
        eprintln!(
            "#{:<2} {:>7.3}  {:<16} sim={:<6} {:?}  {}",
            ranked.rank,
            ranked.composite_score,
            ranked.candidate.classification.to_string(),
            ranked
                .candidate
                .similarity_score
                .map(|s| format!("{s:.3}"))
                .unwrap_or_else(|| "-".to_string()),
            ranked.candidate.fetch_status,
            ranked.candidate.url,
        );
    }

    println!("{}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}
