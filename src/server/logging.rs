//! Usage metrics and JSONL access logging.

use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

/// Maximum number of rotated access log files to keep.
const MAX_ACCESS_LOG_ROTATIONS: usize = 5;

pub struct UsageMetrics {
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,

    pub ep_classify: AtomicU64,
    pub ep_classify_batch: AtomicU64,
    pub ep_health: AtomicU64,
    pub ep_model_info: AtomicU64,

    pub access_log: std::sync::Mutex<Option<File>>,
    access_log_path: String,
    access_log_bytes: AtomicU64,
    max_access_log_bytes: u64,
}

impl UsageMetrics {
    pub fn new(access_log_path: &str, max_access_log_bytes: u64) -> Self {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(access_log_path)
            .ok();
        if file.is_none() {
            warn!(path = access_log_path, "could not open access log");
        }
        let current_size = std::fs::metadata(access_log_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            ep_classify: AtomicU64::new(0),
            ep_classify_batch: AtomicU64::new(0),
            ep_health: AtomicU64::new(0),
            ep_model_info: AtomicU64::new(0),
            access_log: std::sync::Mutex::new(file),
            access_log_path: access_log_path.to_string(),
            access_log_bytes: AtomicU64::new(current_size),
            max_access_log_bytes,
        }
    }

    /// Record a completed single classification and append it to the access log.
    pub fn record(&self, endpoint: &str, intent: &str, confidence: f64, processing_time_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.append_log_line(serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "endpoint": endpoint,
            "intent": intent,
            "confidence": confidence,
            "processing_time_ms": processing_time_ms,
        }));
    }

    /// Record a completed batch request as a single unit of work, logging
    /// the item count instead of per-item results.
    pub fn record_batch(&self, endpoint: &str, items: usize, processing_time_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.append_log_line(serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "endpoint": endpoint,
            "items": items,
            "processing_time_ms": processing_time_ms,
        }));
    }

    fn append_log_line(&self, entry: serde_json::Value) {
        if let Ok(mut guard) = self.access_log.try_lock() {
            if let Some(ref mut file) = *guard {
                let mut line = entry.to_string();
                line.push('\n');
                let line_len = line.len() as u64;
                if let Err(e) = file.write_all(line.as_bytes()) {
                    warn!(error = %e, "failed to write access log entry");
                }
                let new_size =
                    self.access_log_bytes.fetch_add(line_len, Ordering::Relaxed) + line_len;

                // Rotate if over size limit (0 = no limit)
                if self.max_access_log_bytes > 0 && new_size >= self.max_access_log_bytes {
                    for i in (1..MAX_ACCESS_LOG_ROTATIONS).rev() {
                        let from = format!("{}.{}", self.access_log_path, i);
                        let to = format!("{}.{}", self.access_log_path, i + 1);
                        if std::path::Path::new(&from).exists() {
                            if let Err(e) = std::fs::rename(&from, &to) {
                                warn!(from = %from, to = %to, error = %e, "log rotation rename failed");
                            }
                        }
                    }
                    let rotated = format!("{}.1", self.access_log_path);
                    if let Err(e) = std::fs::rename(&self.access_log_path, &rotated) {
                        warn!(from = %self.access_log_path, to = %rotated, error = %e, "log rotation rename failed");
                    }
                    if let Ok(new_file) = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&self.access_log_path)
                    {
                        *file = new_file;
                        self.access_log_bytes.store(0, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    /// Record a request that ended in a client or server error.
    pub fn record_error(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }
}
