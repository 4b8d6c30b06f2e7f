use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::errors::AppError;
use crate::external::ai_provider::{AiError, AiProvider, FallbackAi};
use crate::services::data_store::DataStore;
use crate::services::retry::RetryPolicy;

/// Extensions accepted by the upload endpoint. Spreadsheets are stored but
/// their binary content is not inlined into the analysis prompt.
const UPLOAD_EXTENSIONS: &[&str] = &["csv", "md", "txt", "xlsx", "json"];

pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Persists uploaded documents and runs one AI analysis pass over their
/// textual content.
pub struct UploadAnalyzer {
    ai: Arc<FallbackAi>,
    retry: RetryPolicy,
}

impl UploadAnalyzer {
    pub fn new(ai: Arc<FallbackAi>, settings: &Settings) -> Self {
        Self {
            ai,
            retry: RetryPolicy::new(
                settings.classify_max_retries,
                settings.retry_base_delay,
                settings.retry_max_delay,
            ),
        }
    }

    pub async fn analyze(
        &self,
        store: &DataStore,
        files: Vec<UploadedFile>,
    ) -> Result<String, AppError> {
        if files.is_empty() {
            return Err(AppError::Validation("No files uploaded".to_string()));
        }
        for file in &files {
            validate_upload_filename(&file.name)?;
        }
        if !self.ai.is_configured() {
            return Err(AppError::AiNotConfigured);
        }

        let mut sections = Vec::new();
        for file in &files {
            store
                .save_upload(&file.name, &file.bytes)
                .map_err(|e| AppError::External(format!("Failed to store upload: {e:#}")))?;

            if extension_of(&file.name) != Some("xlsx") {
                sections.push(format!(
                    "--- {} ---\n{}",
                    file.name,
                    String::from_utf8_lossy(&file.bytes)
                ));
            }
        }
        info!("Stored {} uploaded file(s) for analysis", files.len());

        let prompt = format!(
            "Analyze the following uploaded documents in the context of stock market \
             performance. Summarize the key findings and any notable risks or \
             opportunities they suggest.\n\n{}",
            sections.join("\n\n")
        );

        self.retry
            .run("upload analysis", |_| self.ai.complete(&prompt))
            .await
            .map_err(|e| match e {
                AiError::NotConfigured => AppError::AiNotConfigured,
                other => AppError::External(format!("AI analysis failed: {other}")),
            })
    }
}

fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

pub fn validate_upload_filename(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(AppError::Validation(format!("Invalid filename: {name}")));
    }
    match extension_of(name) {
        Some(ext) if UPLOAD_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => Ok(()),
        _ => Err(AppError::Validation(format!(
            "Disallowed file type: {name}"
        ))),
    }
}
