//! Disk-backed response cache used by the default engine.
//!
//! Entries are JSON files named by the UUIDv5 of the request URL. Only
//! successful GET responses that declare a positive `max-age` are stored, and
//! an entry is served only while it is fresh and the request headers named by
//! its `Vary` match the ones it was stored for. `Vary: *` is never stored.
//! The directory is trimmed oldest-first whenever it grows past its byte
//! budget.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::http::{Header, HttpResponse};

const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    url: String,
    stored_at: u64,
    max_age: u64,
    /// Lowercased header names from `Vary` with the request values they were
    /// stored for.
    #[serde(default)]
    vary: Vec<(String, Option<String>)>,
    response: HttpResponse,
}

impl Entry {
    fn is_fresh(&self, now: u64) -> bool {
        now < self.stored_at.saturating_add(self.max_age)
    }

    fn matches(&self, request_headers: &[Header]) -> bool {
        self.vary
            .iter()
            .all(|(name, value)| request_value(request_headers, name) == *value)
    }
}

/// A size-bounded response cache rooted at a directory.
#[derive(Debug)]
pub struct DiskCache {
    directory: PathBuf,
    max_size: u64,
    closed: AtomicBool,
    requests: AtomicU64,
    hits: AtomicU64,
    writes: Mutex<()>,
}

impl DiskCache {
    /// The directory is created lazily, on the first store.
    pub fn open(directory: impl Into<PathBuf>, max_size: u64) -> Self {
        Self {
            directory: directory.into(),
            max_size,
            closed: AtomicBool::new(false),
            requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            writes: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of lookups made against this cache.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Number of lookups answered from disk.
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Fresh cached response for a request to `url` with `request_headers`.
    pub fn get(&self, url: &str, request_headers: &[Header]) -> Option<HttpResponse> {
        self.get_at(url, request_headers, now_secs())
    }

    fn get_at(&self, url: &str, request_headers: &[Header], now: u64) -> Option<HttpResponse> {
        if self.is_closed() {
            return None;
        }
        self.requests.fetch_add(1, Ordering::Relaxed);

        let path = self.entry_path(url);
        let raw = fs::read_to_string(&path).ok()?;
        let entry = match serde_json::from_str::<Entry>(&raw) {
            Ok(entry) if entry.url == url => entry,
            _ => {
                let _ = fs::remove_file(&path);
                return None;
            }
        };
        if !entry.is_fresh(now) {
            let _ = fs::remove_file(&path);
            return None;
        }
        if !entry.matches(request_headers) {
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.response)
    }

    /// Store `response` to a request made with `request_headers` if its
    /// headers allow it. Returns whether it was stored.
    pub fn put(
        &self,
        url: &str,
        request_headers: &[Header],
        response: &HttpResponse,
    ) -> io::Result<bool> {
        self.put_at(url, request_headers, response, now_secs())
    }

    fn put_at(
        &self,
        url: &str,
        request_headers: &[Header],
        response: &HttpResponse,
        now: u64,
    ) -> io::Result<bool> {
        if self.is_closed() || !response.is_successful() {
            return Ok(false);
        }
        let Some(max_age) = freshness_lifetime(&response.headers) else {
            return Ok(false);
        };
        let Some(vary) = vary_selection(&response.headers, request_headers) else {
            return Ok(false);
        };

        let entry = Entry {
            url: url.to_string(),
            stored_at: now,
            max_age,
            vary,
            response: response.clone(),
        };
        let bytes = serde_json::to_vec(&entry).map_err(io::Error::other)?;
        if bytes.len() as u64 > self.max_size {
            return Ok(false);
        }

        let _guard = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        fs::create_dir_all(&self.directory)?;
        let path = self.entry_path(url);
        let staging = path.with_extension("tmp");
        fs::write(&staging, &bytes)?;
        fs::rename(&staging, &path)?;
        self.trim()?;
        Ok(true)
    }

    /// Total bytes currently held on disk.
    pub fn size(&self) -> u64 {
        self.entries()
            .map(|entries| entries.iter().map(|(_, len, _)| len).sum())
            .unwrap_or(0)
    }

    /// Remove every stored entry.
    pub fn evict_all(&self) -> io::Result<()> {
        let _guard = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        for (path, _, _) in self.entries()? {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Stop serving and storing entries. Stored files stay on disk so a later
    /// cache over the same directory can pick them up.
    pub fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _guard = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        match fs::read_dir(&self.directory) {
            Ok(dir) => {
                for item in dir {
                    let path = item?.path();
                    if path.extension().is_some_and(|ext| ext == "tmp") {
                        fs::remove_file(path)?;
                    }
                }
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        let key = Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes());
        self.directory
            .join(format!("{}.{ENTRY_EXTENSION}", key.simple()))
    }

    fn entries(&self) -> io::Result<Vec<(PathBuf, u64, SystemTime)>> {
        let dir = match fs::read_dir(&self.directory) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut entries = Vec::new();
        for item in dir {
            let item = item?;
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                let meta = item.metadata()?;
                let modified = meta.modified().unwrap_or(UNIX_EPOCH);
                entries.push((path, meta.len(), modified));
            }
        }
        Ok(entries)
    }

    // Caller holds `writes`.
    fn trim(&self) -> io::Result<()> {
        let mut entries = self.entries()?;
        let mut total: u64 = entries.iter().map(|(_, len, _)| len).sum();
        if total <= self.max_size {
            return Ok(());
        }
        entries.sort_by_key(|(_, _, modified)| *modified);
        for (path, len, _) in entries {
            if total <= self.max_size {
                break;
            }
            fs::remove_file(&path)?;
            total -= len;
            debug!(path = %path.display(), "evicted cache entry");
        }
        Ok(())
    }
}

/// Seconds a response may be served from cache, from its `Cache-Control`.
pub(crate) fn freshness_lifetime(headers: &[Header]) -> Option<u64> {
    let mut max_age = None;
    for directive in cache_directives(headers) {
        match directive.as_str() {
            "no-store" | "no-cache" => return None,
            d => {
                if let Some(value) = d.strip_prefix("max-age=") {
                    max_age = value.trim_matches('"').parse::<u64>().ok();
                }
            }
        }
    }
    max_age.filter(|&secs| secs > 0)
}

/// True when the request asks to skip any cached response.
pub(crate) fn bypasses_cache(headers: &[Header]) -> bool {
    cache_directives(headers).any(|d| d == "no-cache" || d == "no-store")
}

/// Request values for the headers a response `Vary`s on. `None` for
/// `Vary: *`, which no later request can be shown to match.
fn vary_selection(
    response_headers: &[Header],
    request_headers: &[Header],
) -> Option<Vec<(String, Option<String>)>> {
    let names = response_headers
        .iter()
        .filter(|h| h.is("vary"))
        .flat_map(|h| h.value().split(','))
        .map(|n| n.trim().to_ascii_lowercase())
        .filter(|n| !n.is_empty());

    let mut selected: Vec<(String, Option<String>)> = Vec::new();
    for name in names {
        if name == "*" {
            return None;
        }
        if selected.iter().any(|(seen, _)| *seen == name) {
            continue;
        }
        let value = request_value(request_headers, &name);
        selected.push((name, value));
    }
    Some(selected)
}

/// All values of `name` in request order, comma-joined.
fn request_value(headers: &[Header], name: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .iter()
        .filter(|h| h.is(name))
        .map(Header::value)
        .collect();
    (!values.is_empty()).then(|| values.join(", "))
}

fn cache_directives(headers: &[Header]) -> impl Iterator<Item = String> + '_ {
    headers
        .iter()
        .filter(|h| h.is("cache-control"))
        .flat_map(|h| h.value().split(','))
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
