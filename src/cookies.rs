//! Persistent, file-backed cookie jar.
//!
//! One jar per engine. Requests that opt into cookie persistence share the
//! same jar by reference; every `Set-Cookie` the transport hands to the jar is
//! written to disk straight away. Every jar bound to a path shares one write
//! lock, so concurrent requests cannot interleave partial files, and a jar
//! replaced by [`CookieStore::clear`] never writes to that path again.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use reqwest::cookie::CookieStore as ReqwestCookieStore;
use reqwest::header::HeaderValue;
use reqwest_cookie_store::CookieStoreMutex;
use tokio::sync::RwLock;
use url::Url;

use crate::config::{COOKIE_FILE_NAME, DATA_DIR_NAME};
use crate::error_handling::InitializationError;

/// Default location of the cookie file: `~/.rest-engine/cookie.json`.
pub fn default_cookie_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
        .join(COOKIE_FILE_NAME)
}

/// Cookie jar bound to a JSON file.
#[derive(Debug)]
pub struct PersistentCookieJar {
    path: PathBuf,
    store: CookieStoreMutex,
    /// Serializes writes to `path` across every jar bound to it
    file_lock: Arc<Mutex<()>>,
    /// Set once the jar has been replaced; a detached jar keeps serving
    /// cookies in memory but no longer writes the file
    detached: AtomicBool,
}

impl PersistentCookieJar {
    /// Opens the jar at `path`, loading any cookies already saved there.
    ///
    /// An unreadable or corrupt file is logged and the jar starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_with_lock(path, Arc::default())
    }

    fn open_with_lock(path: impl Into<PathBuf>, file_lock: Arc<Mutex<()>>) -> Self {
        let path = path.into();
        let store = match File::open(&path) {
            Ok(file) => cookie_store::serde::json::load_all(BufReader::new(file))
                .unwrap_or_else(|e| {
                    log::warn!("Ignoring unreadable cookie file {}: {}", path.display(), e);
                    cookie_store::CookieStore::default()
                }),
            Err(_) => cookie_store::CookieStore::default(),
        };
        Self {
            path,
            store: CookieStoreMutex::new(store),
            file_lock,
            detached: AtomicBool::new(false),
        }
    }

    /// Empty jar bound to `path`, without reading it.
    fn empty_with_lock(path: impl Into<PathBuf>, file_lock: Arc<Mutex<()>>) -> Self {
        Self {
            path: path.into(),
            store: CookieStoreMutex::new(cookie_store::CookieStore::default()),
            file_lock,
            detached: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of unexpired cookies held.
    pub fn len(&self) -> usize {
        self.store
            .lock()
            .map(|store| store.iter_unexpired().count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Stops this jar from writing its file. Waits for a write in progress.
    fn detach(&self) {
        let _guard = self
            .file_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.detached.store(true, Ordering::SeqCst);
    }

    /// Writes the jar to its file via a temp file and rename.
    fn persist(&self) -> std::io::Result<()> {
        let _guard = self
            .file_lock
            .lock()
            .map_err(|e| std::io::Error::other(format!("cookie file lock poisoned: {}", e)))?;
        if self.is_detached() {
            log::debug!("Cookie jar for {} was cleared; not persisting", self.path.display());
            return Ok(());
        }

        let store = self
            .store
            .lock()
            .map_err(|e| std::io::Error::other(format!("cookie jar lock poisoned: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            cookie_store::serde::json::save_incl_expired_and_nonpersistent(&store, &mut writer)
                .map_err(std::io::Error::other)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp_path, &self.path)
    }
}

impl ReqwestCookieStore for PersistentCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.store.set_cookies(cookie_headers, url);
        if let Err(e) = self.persist() {
            log::warn!(
                "Failed to persist cookies to {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.store.cookies(url)
    }
}

/// The engine's cookie store: owns the current jar and can reset it.
#[derive(Debug)]
pub struct CookieStore {
    path: PathBuf,
    file_lock: Arc<Mutex<()>>,
    jar: RwLock<Arc<PersistentCookieJar>>,
}

impl CookieStore {
    /// Opens the store at a fixed path, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::CookieStoreError` if the directory cannot
    /// be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, InitializationError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file_lock = Arc::new(Mutex::new(()));
        let jar = Arc::new(PersistentCookieJar::open_with_lock(
            path.clone(),
            Arc::clone(&file_lock),
        ));
        log::debug!("Cookie jar at {} ({} cookies)", path.display(), jar.len());
        Ok(Self {
            path,
            file_lock,
            jar: RwLock::new(jar),
        })
    }

    /// Opens the store at [`default_cookie_path`].
    pub fn open_default() -> Result<Self, InitializationError> {
        Self::new(default_cookie_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle to the current jar, shared with in-flight requests.
    pub async fn jar(&self) -> Arc<PersistentCookieJar> {
        self.jar.read().await.clone()
    }

    /// Deletes the backing file and replaces the jar with an empty one bound
    /// to the same path.
    ///
    /// Requests already holding the old jar keep it in memory, but it is
    /// detached first and never writes the file again; every request started
    /// afterwards sees the empty jar.
    pub async fn clear(&self) -> std::io::Result<()> {
        let mut jar = self.jar.write().await;
        jar.detach();
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        *jar = Arc::new(PersistentCookieJar::empty_with_lock(
            self.path.clone(),
            Arc::clone(&self.file_lock),
        ));
        log::info!("Cleared cookies at {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_cookie(jar: &PersistentCookieJar, url: &Url, cookie: &'static str) {
        let header = HeaderValue::from_static(cookie);
        let mut headers = std::iter::once(&header);
        jar.set_cookies(&mut headers, url);
    }

    #[test]
    fn test_set_cookie_is_persisted_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookie.json");
        let url = Url::parse("http://example.com/").unwrap();

        let jar = PersistentCookieJar::open(&path);
        set_cookie(&jar, &url, "session=abc; Path=/");
        assert!(path.exists());

        let reopened = PersistentCookieJar::open(&path);
        let header = reopened.cookies(&url).expect("cookie should be reloaded");
        assert_eq!(header.to_str().unwrap(), "session=abc");
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookie.json");
        std::fs::write(&path, "{ not json").unwrap();

        let jar = PersistentCookieJar::open(&path);

        assert!(jar.is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_file_and_empties_jar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cookie.json");
        let url = Url::parse("http://example.com/").unwrap();
        let store = CookieStore::new(&path).unwrap();

        let jar = store.jar().await;
        set_cookie(&jar, &url, "session=abc; Path=/");
        assert!(path.exists());

        store.clear().await.unwrap();

        assert!(!path.exists());
        let fresh = store.jar().await;
        assert!(fresh.cookies(&url).is_none());
        assert_eq!(fresh.path(), path.as_path());
        assert!(!Arc::ptr_eq(&jar, &fresh));
    }

    #[tokio::test]
    async fn test_stale_jar_set_cookie_after_clear_stays_off_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookie.json");
        let url = Url::parse("http://example.com/").unwrap();
        let store = CookieStore::new(&path).unwrap();

        // A request in flight keeps the jar it started with
        let stale = store.jar().await;
        set_cookie(&stale, &url, "a=1; Path=/");

        store.clear().await.unwrap();
        assert!(stale.is_detached());

        set_cookie(&stale, &url, "b=2; Path=/");
        assert!(!path.exists());

        let fresh = store.jar().await;
        assert!(!fresh.is_detached());
        set_cookie(&fresh, &url, "c=3; Path=/");

        let reopened = CookieStore::new(&path).unwrap().jar().await;
        let header = reopened.cookies(&url).expect("fresh cookie should be saved");
        assert_eq!(header.to_str().unwrap(), "c=3");
    }

    #[test]
    fn test_concurrent_writes_leave_a_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookie.json");
        let url = Url::parse("http://example.com/").unwrap();
        let lock = Arc::new(Mutex::new(()));
        let first = Arc::new(PersistentCookieJar::empty_with_lock(&path, Arc::clone(&lock)));
        let second = Arc::new(PersistentCookieJar::empty_with_lock(&path, lock));

        let writers: Vec<_> = [(first, "x"), (second, "y")]
            .into_iter()
            .map(|(jar, name)| {
                let url = url.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let header = HeaderValue::from_str(&format!("{}{}={}; Path=/", name, i, i))
                            .unwrap();
                        let mut headers = std::iter::once(&header);
                        jar.set_cookies(&mut headers, &url);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let file = File::open(&path).unwrap();
        let loaded = cookie_store::serde::json::load_all(BufReader::new(file)).unwrap();
        assert_eq!(loaded.iter_any().count(), 25);
    }

    #[tokio::test]
    async fn test_clear_without_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = CookieStore::new(dir.path().join("cookie.json")).unwrap();

        assert!(store.clear().await.is_ok());
    }

    #[tokio::test]
    async fn test_jar_is_shared_not_copied() {
        let dir = tempfile::tempdir().unwrap();
        let store = CookieStore::new(dir.path().join("cookie.json")).unwrap();

        let first = store.jar().await;
        let second = store.jar().await;

        assert!(Arc::ptr_eq(&first, &second));
    }
}
