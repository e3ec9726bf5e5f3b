use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::{error, info};

pub type TitleMap = HashMap<String, String>;

struct CachedTitles {
    titles: Arc<TitleMap>,
    modified: Option<SystemTime>,
}

/// Program-title lookup backed by `key;"value"` files.
///
/// Each file is loaded on first use and reloaded when its modification time
/// moves forward. Callers get a shared snapshot, so a reload never exposes a
/// half-built map.
#[derive(Default)]
pub struct TitleCache {
    entries: RwLock<HashMap<PathBuf, CachedTitles>>,
}

impl TitleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, path: &Path) -> Arc<TitleMap> {
        let modified = modified_time(path);

        if let Ok(entries) = self.entries.read() {
            if let Some(cached) = entries.get(path) {
                let stale = match (cached.modified, modified) {
                    (Some(loaded), Some(current)) => current > loaded,
                    (None, Some(_)) => true,
                    _ => false,
                };
                if !stale {
                    return Arc::clone(&cached.titles);
                }
            }
        }

        self.reload(path)
    }

    /// Loads the file again regardless of its modification time.
    pub fn reload(&self, path: &Path) -> Arc<TitleMap> {
        let modified = modified_time(path);
        if let Some(time) = modified {
            info!("Loading titles from {} (modified {:?})", path.display(), time);
        }

        let titles = Arc::new(load_titles(path));
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(
                    path.to_path_buf(),
                    CachedTitles {
                        titles: Arc::clone(&titles),
                        modified,
                    },
                );
            }
            Err(e) => error!("Title cache lock poisoned: {}", e),
        }
        titles
    }

    pub fn title(&self, path: &Path, key: &str) -> Option<String> {
        self.lookup(path).get(key).cloned()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => Some(time),
        Err(e) => {
            error!("Error checking modification time of {}: {}", path.display(), e);
            None
        }
    }
}

fn load_titles(path: &Path) -> TitleMap {
    let mut reader = match csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => {
            error!("Error opening titles file {}: {}", path.display(), e);
            return TitleMap::new();
        }
    };

    let mut titles = TitleMap::new();
    for record in reader.records() {
        match record {
            Ok(record) => {
                if let (Some(key), Some(value)) = (record.get(0), record.get(1)) {
                    titles.insert(key.to_string(), value.trim_matches('"').to_string());
                }
            }
            Err(e) => {
                error!("Error loading program titles from {}: {}", path.display(), e);
                return TitleMap::new();
            }
        }
    }

    info!("Program titles loaded successfully: {} entries", titles.len());
    titles
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_with_mtime(path: &Path, contents: &str, mtime: SystemTime) {
        fs::write(path, contents).unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(mtime).unwrap();
    }

    #[test]
    fn parses_semicolon_file_and_strips_quotes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("titles.csv");
        fs::write(&path, "WIA;\"Wiadomości\"\nSPO;Sport\n").unwrap();

        let cache = TitleCache::new();
        let titles = cache.lookup(&path);
        assert_eq!(titles.get("WIA").map(String::as_str), Some("Wiadomości"));
        assert_eq!(cache.title(&path, "SPO").as_deref(), Some("Sport"));
        assert_eq!(cache.title(&path, "XYZ"), None);
    }

    #[test]
    fn reloads_only_when_file_gets_newer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("titles.csv");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        write_with_mtime(&path, "A;\"one\"\n", t0);
        let cache = TitleCache::new();
        let first = cache.lookup(&path);
        assert_eq!(first.get("A").map(String::as_str), Some("one"));

        // same mtime: cached snapshot is kept
        write_with_mtime(&path, "A;\"two\"\n", t0);
        assert!(Arc::ptr_eq(&first, &cache.lookup(&path)));

        write_with_mtime(&path, "A;\"three\"\n", t0 + Duration::from_secs(10));
        let refreshed = cache.lookup(&path);
        assert_eq!(refreshed.get("A").map(String::as_str), Some("three"));
        // earlier readers still hold the old map
        assert_eq!(first.get("A").map(String::as_str), Some("one"));
    }

    #[test]
    fn forced_reload_ignores_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("titles.csv");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        write_with_mtime(&path, "A;\"one\"\n", t0);
        let cache = TitleCache::new();
        cache.lookup(&path);

        write_with_mtime(&path, "A;\"two\"\n", t0);
        assert_eq!(cache.reload(&path).get("A").map(String::as_str), Some("two"));
    }

    #[test]
    fn missing_file_gives_empty_map() {
        let dir = TempDir::new().unwrap();
        let cache = TitleCache::new();
        assert!(cache.lookup(&dir.path().join("absent.csv")).is_empty());
    }
}
