use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tracing::info;

use crate::config::Settings;
use crate::errors::AppError;
use crate::external::ai_provider::{AiError, AiProvider, FallbackAi};
use crate::models::StockRecord;
use crate::services::retry::RetryPolicy;

/// A persisted recommendation run: the raw AI text plus the two artifact
/// files it was written to. Artifacts are date-stamped, so a second run on
/// the same calendar day overwrites them.
pub struct RecommendationOutcome {
    pub markdown_path: PathBuf,
    pub text_path: PathBuf,
    pub content: String,
}

/// Builds a structured prompt from ranked YTD data and turns the AI response
/// into markdown/plain-text artifacts under the results directory.
pub struct RecommendationEngine {
    ai: Arc<FallbackAi>,
    results_dir: PathBuf,
    retry: RetryPolicy,
}

impl RecommendationEngine {
    pub fn new(ai: Arc<FallbackAi>, settings: &Settings) -> Self {
        Self {
            ai,
            results_dir: settings.results_dir.clone(),
            retry: RetryPolicy::new(
                settings.classify_max_retries,
                settings.retry_base_delay,
                settings.retry_max_delay,
            ),
        }
    }

    pub async fn recommend(
        &self,
        records: &[StockRecord],
        top_n: usize,
        bottom_n: usize,
    ) -> Result<RecommendationOutcome, AppError> {
        if !self.ai.is_configured() {
            return Err(AppError::AiNotConfigured);
        }
        if records.is_empty() {
            return Err(AppError::Validation(
                "No stock data available. Please fetch data first.".to_string(),
            ));
        }

        let prompt = build_prompt(records, top_n, bottom_n);
        let content = self
            .retry
            .run("recommendation completion", |_| self.ai.complete(&prompt))
            .await
            .map_err(|e| match e {
                AiError::NotConfigured => AppError::AiNotConfigured,
                other => AppError::External(format!("AI recommendation failed: {other}")),
            })?;

        self.persist(&content)
    }

    fn persist(&self, content: &str) -> Result<RecommendationOutcome, AppError> {
        fs::create_dir_all(&self.results_dir)?;

        let date = Local::now().format("%Y-%m-%d");
        let text_path = self
            .results_dir
            .join(format!("stock_recommendations_{date}.txt"));
        let markdown_path = self
            .results_dir
            .join(format!("stock_recommendations_{date}.md"));

        fs::write(
            &text_path,
            format!("Stock Recommendations ({date}):\n\n{content}"),
        )?;
        fs::write(
            &markdown_path,
            format!("# Stock Recommendations ({date})\n\n{content}"),
        )?;

        info!("Recommendations saved to {}", markdown_path.display());
        Ok(RecommendationOutcome {
            markdown_path,
            text_path,
            content: content.to_string(),
        })
    }
}

/// Top `n` records by YTD, descending.
pub fn top_performers(records: &[StockRecord], n: usize) -> Vec<StockRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.ytd.partial_cmp(&a.ytd).unwrap_or(Ordering::Equal));
    sorted.truncate(n);
    sorted
}

/// Bottom `n` records by YTD, ascending (worst first).
pub fn bottom_performers(records: &[StockRecord], n: usize) -> Vec<StockRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| a.ytd.partial_cmp(&b.ytd).unwrap_or(Ordering::Equal));
    sorted.truncate(n);
    sorted
}

/// Mean YTD per sector, sorted descending by the mean.
pub fn sector_averages(records: &[StockRecord]) -> Vec<(String, f64)> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for record in records {
        let entry = sums.entry(record.sector.as_str()).or_insert((0.0, 0));
        entry.0 += record.ytd;
        entry.1 += 1;
    }

    let mut averages: Vec<(String, f64)> = sums
        .into_iter()
        .map(|(sector, (sum, count))| (sector.to_string(), sum / count as f64))
        .collect();
    averages.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    averages
}

fn build_prompt(records: &[StockRecord], top_n: usize, bottom_n: usize) -> String {
    let table = |rows: &[StockRecord]| {
        rows.iter()
            .map(|r| {
                format!(
                    "{}  {}  {:.2}%  {}",
                    r.symbol, r.name, r.ytd, r.sector
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let sector_table = sector_averages(records)
        .into_iter()
        .map(|(sector, avg)| format!("{sector}  {avg:.2}%"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Based on the following NASDAQ-100 stock data, provide investment recommendations:\n\n\
         Top {top_n} Performers (YTD):\n{top}\n\n\
         Bottom {bottom_n} Performers (YTD):\n{bottom}\n\n\
         Sector Performance (Average YTD %):\n{sector_table}\n\n\
         Please provide:\n\
         1. A brief market overview based on this data\n\
         2. 3-5 specific stock recommendations with rationale\n\
         3. Sector-based investment strategy\n",
        top = table(&top_performers(records, top_n)),
        bottom = table(&bottom_performers(records, bottom_n)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ai_provider::test_support::ScriptedAi;
    use tempfile::TempDir;

    fn record(symbol: &str, ytd: f64, sector: &str) -> StockRecord {
        let mut r = StockRecord::unknown(symbol);
        r.ytd = ytd;
        r.sector = sector.to_string();
        r
    }

    fn sample() -> Vec<StockRecord> {
        vec![
            record("A", 10.0, "Technology"),
            record("B", -5.0, "Energy"),
            record("C", 20.0, "Technology"),
            record("D", 0.0, "Healthcare"),
            record("E", -15.0, "Energy"),
        ]
    }

    #[test]
    fn top_performers_are_descending() {
        let top = top_performers(&sample(), 2);
        let ytds: Vec<f64> = top.iter().map(|r| r.ytd).collect();
        assert_eq!(ytds, vec![20.0, 10.0]);
    }

    #[test]
    fn bottom_performers_are_ascending() {
        let bottom = bottom_performers(&sample(), 2);
        let ytds: Vec<f64> = bottom.iter().map(|r| r.ytd).collect();
        assert_eq!(ytds, vec![-15.0, -5.0]);
    }

    #[test]
    fn sector_means_are_sorted_descending() {
        let averages = sector_averages(&sample());
        assert_eq!(averages[0], ("Technology".to_string(), 15.0));
        assert_eq!(averages[1], ("Healthcare".to_string(), 0.0));
        assert_eq!(averages[2], ("Energy".to_string(), -10.0));
    }

    #[test]
    fn prompt_embeds_all_three_tables() {
        let prompt = build_prompt(&sample(), 2, 2);
        assert!(prompt.contains("Top 2 Performers (YTD):"));
        assert!(prompt.contains("Bottom 2 Performers (YTD):"));
        assert!(prompt.contains("Sector Performance (Average YTD %):"));
        assert!(prompt.contains("C  C  20.00%  Technology"));
        assert!(prompt.contains("E  E  -15.00%  Energy"));
        assert!(prompt.contains("Technology  15.00%"));
    }

    fn engine_in(dir: &TempDir, ai: FallbackAi) -> RecommendationEngine {
        let mut settings = crate::config::Settings::from_env();
        settings.results_dir = dir.path().join("results");
        RecommendationEngine {
            ai: Arc::new(ai),
            results_dir: settings.results_dir.clone(),
            retry: RetryPolicy::immediate(2),
        }
    }

    #[tokio::test]
    async fn recommend_persists_both_artifacts() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir, FallbackAi::new(vec![Arc::new(ScriptedAi::always("Buy C."))]));

        let outcome = engine.recommend(&sample(), 2, 2).await.unwrap();
        assert_eq!(outcome.content, "Buy C.");

        let text = std::fs::read_to_string(&outcome.text_path).unwrap();
        assert!(text.starts_with("Stock Recommendations ("));
        assert!(text.ends_with("Buy C."));

        let md = std::fs::read_to_string(&outcome.markdown_path).unwrap();
        assert!(md.starts_with("# Stock Recommendations ("));
    }

    #[tokio::test]
    async fn recommend_without_provider_is_a_recoverable_error() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir, FallbackAi::new(vec![]));
        assert!(matches!(
            engine.recommend(&sample(), 2, 2).await,
            Err(AppError::AiNotConfigured)
        ));
    }

    #[tokio::test]
    async fn recommend_rejects_empty_collection() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir, FallbackAi::new(vec![Arc::new(ScriptedAi::always("x"))]));
        assert!(matches!(
            engine.recommend(&[], 2, 2).await,
            Err(AppError::Validation(_))
        ));
    }
}
