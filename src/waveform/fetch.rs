// Waveform payload fetching
//
// HTTP(S) paths go through ureq on the blocking pool; anything else is read
// from disk relative to a base directory (recordings mounted locally).

use std::future::Future;
use std::path::PathBuf;

use super::{WaveformError, WaveformPayload};

/// Source of waveform payloads
pub trait WaveformFetcher: Send + Sync + 'static {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<WaveformPayload, WaveformError>> + Send;
}

/// Fetcher used by the dashboard host and the inspection binary
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    /// Prefix joined onto relative paths before an HTTP fetch, e.g. `http://recorder.local/`
    base_url: Option<String>,
    /// Directory that relative paths resolve against for local reads
    base_dir: PathBuf,
}

impl DefaultFetcher {
    pub fn new(base_url: Option<String>, base_dir: PathBuf) -> Self {
        Self { base_url, base_dir }
    }

    /// Fetcher that only reads local files
    pub fn local(base_dir: PathBuf) -> Self {
        Self::new(None, base_dir)
    }

    /// Resolve a waveform path into either a URL or a local file
    fn resolve(&self, path: &str) -> Target {
        if is_http(path) {
            return Target::Url(path.to_string());
        }
        match &self.base_url {
            Some(base) => Target::Url(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            )),
            None => Target::File(self.base_dir.join(path)),
        }
    }
}

enum Target {
    Url(String),
    File(PathBuf),
}

fn is_http(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl WaveformFetcher for DefaultFetcher {
    async fn fetch(&self, path: &str) -> Result<WaveformPayload, WaveformError> {
        match self.resolve(path) {
            Target::Url(url) => {
                let body = tokio::task::spawn_blocking(move || fetch_http(&url))
                    .await
                    .map_err(|e| WaveformError::Transport(e.to_string()))??;
                WaveformPayload::parse(&body)
            }
            Target::File(file) => {
                let body = tokio::fs::read_to_string(&file).await?;
                WaveformPayload::parse(&body)
            }
        }
    }
}

/// Blocking GET, non-2xx is an error
fn fetch_http(url: &str) -> Result<String, WaveformError> {
    log::debug!("Fetching waveform {}", url);

    let response = match ureq::get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => return Err(WaveformError::Http(code)),
        Err(e) => return Err(WaveformError::Transport(e.to_string())),
    };

    response
        .into_string()
        .map_err(WaveformError::Io)
}
