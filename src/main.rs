mod app;
mod config;
mod errors;
mod external;
mod jobs;
mod logging;
mod models;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::external::ai_provider::{AiProvider, FallbackAi};
use crate::external::alphavantage::AlphaVantageProvider;
use crate::external::gemini::GeminiProvider;
use crate::external::market_provider::MarketDataProvider;
use crate::external::multi_provider::MultiProvider;
use crate::external::openai::OpenAiProvider;
use crate::external::yahoo::YahooProvider;
use crate::services::classifier::SectorClassifier;
use crate::services::data_store::DataStore;
use crate::services::recommendation_service::RecommendationEngine;
use crate::services::task_tracker::TaskTracker;
use crate::services::upload_service::UploadAnalyzer;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logging::init_logging(&logging::LoggingConfig::from_env());

    let settings = Arc::new(config::Settings::from_env());
    let market = select_market_provider()?;
    let ai = configure_ai();

    let state = AppState {
        store: Arc::new(DataStore::new(&settings)),
        tasks: Arc::new(TaskTracker::new()),
        market,
        classifier: Arc::new(SectorClassifier::new(ai.clone(), &settings)),
        engine: Arc::new(RecommendationEngine::new(ai.clone(), &settings)),
        analyzer: Arc::new(UploadAnalyzer::new(ai, &settings)),
        settings: settings.clone(),
    };
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(&addr).await?;
    info!("🚀 StockScope backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Select the market-data backend via MARKET_PROVIDER (defaults to multi:
/// Yahoo primary with Alpha Vantage fallback).
fn select_market_provider() -> Result<Arc<dyn MarketDataProvider>, Box<dyn std::error::Error>> {
    let provider_name =
        std::env::var("MARKET_PROVIDER").unwrap_or_else(|_| "multi".to_string());

    let provider: Arc<dyn MarketDataProvider> = match provider_name.to_lowercase().as_str() {
        "yahoo" => {
            info!("📊 Using market provider: Yahoo Finance only");
            Arc::new(YahooProvider::new())
        }
        "alphavantage" => {
            info!("📊 Using market provider: Alpha Vantage only");
            Arc::new(AlphaVantageProvider::from_env()?)
        }
        "multi" => match AlphaVantageProvider::from_env() {
            Ok(fallback) => {
                info!("📊 Using market provider: Multi (Yahoo + Alpha Vantage fallback)");
                Arc::new(MultiProvider::new(
                    Box::new(YahooProvider::new()),
                    Box::new(fallback),
                ))
            }
            Err(e) => {
                warn!("Alpha Vantage fallback unavailable ({e}); using Yahoo Finance only");
                Arc::new(YahooProvider::new())
            }
        },
        other => {
            return Err(format!(
                "Invalid MARKET_PROVIDER: {other}. Must be 'yahoo', 'alphavantage', or 'multi'"
            )
            .into());
        }
    };
    Ok(provider)
}

/// Assemble the AI fallback chain from whatever keys are present. Missing
/// keys are not fatal; classification and recommendations degrade instead.
fn configure_ai() -> Arc<FallbackAi> {
    let mut providers: Vec<Arc<dyn AiProvider>> = Vec::new();

    match OpenAiProvider::from_env() {
        Some(Ok(provider)) => {
            info!("🤖 AI provider configured: OpenAI");
            providers.push(Arc::new(provider));
        }
        Some(Err(e)) => warn!("OpenAI provider failed to initialize: {e}"),
        None => {}
    }

    match GeminiProvider::from_env() {
        Some(Ok(provider)) => {
            info!("🤖 AI provider configured: Gemini (fallback)");
            providers.push(Arc::new(provider));
        }
        Some(Err(e)) => warn!("Gemini provider failed to initialize: {e}"),
        None => {}
    }

    if providers.is_empty() {
        warn!("No AI provider configured; classification and recommendations will degrade");
    }

    Arc::new(FallbackAi::new(providers))
}
