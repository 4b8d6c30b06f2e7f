use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::Settings;
use crate::errors::AppError;
use crate::models::{ResultFile, StockRecord};

const DATA_FILE_PREFIX: &str = "nasdaq100_data_";
const MOCK_DATA_FILE: &str = "nasdaq100_mock_data.csv";
const SYMBOLS_FILE: &str = "nasdaq100.csv";

/// Allowed extensions for recommendation artifacts served over the API.
const RESULT_EXTENSIONS: &[&str] = &["md", "txt"];

/// Layered store for the current stock collection.
///
/// `load` resolves through: in-memory cache -> most recent dated CSV ->
/// static mock seed -> empty. It never fails; IO problems degrade to the
/// next layer. A new fetch replaces the whole collection via `save`.
pub struct DataStore {
    data_dir: PathBuf,
    results_dir: PathBuf,
    uploads_dir: PathBuf,
    current: RwLock<Option<Arc<Vec<StockRecord>>>>,
}

impl DataStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            data_dir: settings.data_dir.clone(),
            results_dir: settings.results_dir.clone(),
            uploads_dir: settings.uploads_dir.clone(),
            current: RwLock::new(None),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// In-memory collection from this process lifetime, if any.
    pub fn current(&self) -> Option<Arc<Vec<StockRecord>>> {
        self.current.read().clone()
    }

    /// Swap in a freshly fetched collection.
    pub fn replace(&self, records: Vec<StockRecord>) -> Arc<Vec<StockRecord>> {
        let records = Arc::new(records);
        *self.current.write() = Some(records.clone());
        records
    }

    /// Resolve the current collection through the fallback chain.
    pub fn load(&self) -> Arc<Vec<StockRecord>> {
        if let Some(records) = self.current() {
            return records;
        }

        if let Some(path) = self.latest_data_file() {
            match read_csv(&path) {
                Ok(records) => {
                    info!("Loaded {} records from {}", records.len(), path.display());
                    return self.replace(records);
                }
                Err(e) => warn!("Failed to read {}: {e:#}", path.display()),
            }
        }

        match self.load_mock() {
            Ok(records) => {
                info!("Falling back to mock seed data ({} records)", records.len());
                self.replace(records)
            }
            Err(e) => {
                warn!("No cached or mock data available: {e:#}");
                Arc::new(Vec::new())
            }
        }
    }

    pub fn has_data(&self) -> bool {
        !self.load().is_empty()
    }

    /// Write the dated CSV for today (same-day saves overwrite) and update
    /// the in-memory cache.
    pub fn save(&self, records: &[StockRecord]) -> Result<PathBuf> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;

        let date = Local::now().format("%Y-%m-%d");
        let path = self.data_dir.join(format!("{DATA_FILE_PREFIX}{date}.csv"));

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        self.replace(records.to_vec());
        info!("Saved {} records to {}", records.len(), path.display());
        Ok(path)
    }

    /// Most recently modified dated data file, if any.
    fn latest_data_file(&self) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.data_dir).ok()?;
        entries
            .flatten()
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|n| n.starts_with(DATA_FILE_PREFIX) && n.ends_with(".csv"))
                    .unwrap_or(false)
            })
            .filter_map(|e| {
                let mtime = e.metadata().ok()?.modified().ok()?;
                Some((e.path(), mtime))
            })
            .max_by_key(|(_, mtime)| *mtime)
            .map(|(path, _)| path)
    }

    /// Pregenerated seed records, used both as the last cache layer and as
    /// the source for mock fetches.
    pub fn load_mock(&self) -> Result<Vec<StockRecord>> {
        read_csv(&self.data_dir.join(MOCK_DATA_FILE))
    }

    /// NASDAQ-100 symbols from the symbols CSV: the `symbol` column when
    /// present, otherwise the first column. Missing file yields an empty
    /// list rather than an error.
    pub fn load_symbols(&self) -> Vec<String> {
        let path = self.data_dir.join(SYMBOLS_FILE);
        match read_symbols(&path) {
            Ok(symbols) => symbols,
            Err(e) => {
                warn!("Could not load symbols from {}: {e:#}", path.display());
                Vec::new()
            }
        }
    }

    /// Mock collection for the given symbols: seed records where available,
    /// randomly generated records for the rest.
    pub fn mock_collection(&self, symbols: &[String]) -> Vec<StockRecord> {
        let seed = self.load_mock().unwrap_or_default();
        symbols
            .iter()
            .map(|symbol| {
                seed.iter()
                    .find(|r| &r.symbol == symbol)
                    .cloned()
                    .unwrap_or_else(|| generate_mock_record(symbol))
            })
            .collect()
    }

    /// Persisted recommendation artifacts, newest first.
    pub fn list_results(&self) -> Vec<ResultFile> {
        let entries = match fs::read_dir(&self.results_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut files: Vec<(SystemTime, ResultFile)> = entries
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().to_str()?.to_string();
                let ext = name.rsplit('.').next()?;
                if !RESULT_EXTENSIONS.contains(&ext) {
                    return None;
                }
                let meta = e.metadata().ok()?;
                let mtime = meta.modified().ok()?;
                let date: DateTime<Utc> = mtime.into();
                Some((
                    mtime,
                    ResultFile {
                        name,
                        date: date.to_rfc3339(),
                        size: meta.len(),
                    },
                ))
            })
            .collect();

        files.sort_by(|a, b| b.0.cmp(&a.0));
        files.into_iter().map(|(_, f)| f).collect()
    }

    /// Validated path to a recommendation artifact. Rejection happens before
    /// any filesystem access.
    pub fn result_path(&self, filename: &str) -> Result<PathBuf, AppError> {
        validate_result_filename(filename)?;
        Ok(self.results_dir.join(filename))
    }

    pub fn read_result(&self, filename: &str) -> Result<String, AppError> {
        let path = self.result_path(filename)?;
        if !path.is_file() {
            return Err(AppError::NotFound);
        }
        Ok(fs::read_to_string(path)?)
    }

    /// Store an uploaded file under the uploads directory.
    pub fn save_upload(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.uploads_dir)
            .with_context(|| format!("creating {}", self.uploads_dir.display()))?;
        let path = self.uploads_dir.join(filename);
        fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

/// Reject path traversal and disallowed extensions for artifact filenames.
pub fn validate_result_filename(filename: &str) -> Result<(), AppError> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(AppError::Validation(format!(
            "Invalid filename: {filename}"
        )));
    }

    let allowed = filename
        .rsplit_once('.')
        .map(|(_, ext)| RESULT_EXTENSIONS.contains(&ext))
        .unwrap_or(false);
    if !allowed {
        return Err(AppError::Validation(format!(
            "Disallowed file extension: {filename}"
        )));
    }
    Ok(())
}

fn read_csv(path: &Path) -> Result<Vec<StockRecord>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut records = Vec::new();
    for row in reader.deserialize::<StockRecord>() {
        records.push(row.with_context(|| format!("parsing {}", path.display()))?);
    }
    Ok(records)
}

fn read_symbols(path: &Path) -> Result<Vec<String>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;

    let column = reader
        .headers()?
        .iter()
        .position(|h| h.eq_ignore_ascii_case("symbol"))
        .unwrap_or(0);

    let mut symbols = Vec::new();
    for row in reader.records() {
        let row = row?;
        if let Some(symbol) = row.get(column) {
            let symbol = symbol.trim();
            if !symbol.is_empty() {
                symbols.push(symbol.to_string());
            }
        }
    }
    Ok(symbols)
}

/// Synthetic record for a symbol missing from the seed file.
fn generate_mock_record(symbol: &str) -> StockRecord {
    use crate::config::SECTORS;

    let sector = SECTORS[rand::random_range(0..SECTORS.len())].to_string();
    StockRecord {
        symbol: symbol.to_string(),
        name: format!("{symbol} Inc."),
        price: (rand::random_range(10.0..1000.0_f64) * 100.0).round() / 100.0,
        ytd: (rand::random_range(-30.0..30.0_f64) * 100.0).round() / 100.0,
        sector,
        industry: format!("Industry {}", rand::random_range(1..=10)),
        market_cap: rand::random_range(1_000_000..2_000_000_000_u64).to_string(),
        pe_ratio: format!("{:.2}", rand::random_range(5.0..50.0_f64)),
        dividend_yield: format!("{:.2}", rand::random_range(0.0..5.0_f64)),
    }
}
