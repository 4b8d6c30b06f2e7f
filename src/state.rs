use std::sync::Arc;

use crate::config::Settings;
use crate::external::market_provider::MarketDataProvider;
use crate::services::classifier::SectorClassifier;
use crate::services::data_store::DataStore;
use crate::services::recommendation_service::RecommendationEngine;
use crate::services::task_tracker::TaskTracker;
use crate::services::upload_service::UploadAnalyzer;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<DataStore>,
    pub tasks: Arc<TaskTracker>,
    pub market: Arc<dyn MarketDataProvider>,
    pub classifier: Arc<SectorClassifier>,
    pub engine: Arc<RecommendationEngine>,
    pub analyzer: Arc<UploadAnalyzer>,
}
