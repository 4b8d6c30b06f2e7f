pub mod classifier;
pub mod data_store;
pub mod rate_limiter;
pub mod recommendation_service;
pub mod retry;
pub mod task_tracker;
pub mod upload_service;
