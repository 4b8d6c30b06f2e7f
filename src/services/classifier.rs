use std::sync::Arc;

use tracing::warn;

use crate::config::Settings;
use crate::external::ai_provider::{AiProvider, FallbackAi};
use crate::services::rate_limiter::Throttle;
use crate::services::retry::RetryPolicy;

/// Maps a company name onto the fixed sector enumeration via an AI call.
///
/// The raw response is validated against the enumeration; anything that
/// cannot be resolved (including provider failure after retries) degrades to
/// the configured default sector. This call never fails.
pub struct SectorClassifier {
    ai: Arc<FallbackAi>,
    sectors: Vec<String>,
    default_sector: String,
    retry: RetryPolicy,
    throttle: Throttle,
}

impl SectorClassifier {
    pub fn new(ai: Arc<FallbackAi>, settings: &Settings) -> Self {
        Self {
            ai,
            sectors: settings.sectors(),
            default_sector: settings.default_sector.clone(),
            retry: RetryPolicy::new(
                settings.classify_max_retries,
                settings.retry_base_delay,
                settings.retry_max_delay,
            ),
            throttle: Throttle::new(settings.classify_min_delay),
        }
    }

    #[cfg(test)]
    fn for_tests(ai: Arc<FallbackAi>, default_sector: &str) -> Self {
        use std::time::Duration;
        let settings = Settings::from_env();
        Self {
            ai,
            sectors: settings.sectors(),
            default_sector: default_sector.to_string(),
            retry: RetryPolicy::immediate(2),
            throttle: Throttle::new(Duration::ZERO),
        }
    }

    pub async fn classify(&self, company: &str) -> String {
        if !self.ai.is_configured() {
            return self.default_sector.clone();
        }

        self.throttle.acquire().await;

        let prompt = self.prompt(company);
        match self
            .retry
            .run(&format!("classify {company}"), |_| self.ai.complete(&prompt))
            .await
        {
            Ok(raw) => self.resolve(&raw).unwrap_or_else(|| {
                warn!(
                    "Unrecognized sector response for {company}: {:?}. Using default",
                    raw.trim()
                );
                self.default_sector.clone()
            }),
            Err(e) => {
                warn!("Sector classification failed for {company}: {e}. Using default");
                self.default_sector.clone()
            }
        }
    }

    /// Deterministic prompt listing the full enumeration.
    fn prompt(&self, company: &str) -> String {
        format!(
            "Classify the company \"{company}\" into exactly one of the following sectors:\n{}\n\
             Respond with the sector name only, nothing else.",
            self.sectors.join(", ")
        )
    }

    /// Exact member match first, then a case-insensitive substring match
    /// against the enumeration.
    pub fn resolve(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();

        if let Some(sector) = self.sectors.iter().find(|s| s.as_str() == trimmed) {
            return Some(sector.clone());
        }

        let lowered = trimmed.to_lowercase();
        self.sectors
            .iter()
            .find(|s| lowered.contains(&s.to_lowercase()))
            .cloned()
    }
}
