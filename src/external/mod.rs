pub mod ai_provider;
pub mod alphavantage;
pub mod gemini;
pub mod market_provider;
pub mod multi_provider;
pub mod openai;
pub mod yahoo;
