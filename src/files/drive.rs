//! Google Drive file provider
//!
//! Lists publicly shared folders through the Drive v3 API, keeps the flat
//! result in a TTL cache and downloads single files through the public
//! `uc?export=download` endpoint.

use super::mime::mime_type_for;
use super::{FileEntry, FileLocation, FileSize};
use crate::config::{
    get_download_max_redirects, get_drive_folder_delay_ms, get_drive_max_depth,
    get_drive_page_delay_ms, DRIVE_PAGE_SIZE,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_regex::regex;
use moka::future::Cache;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client as HttpClient, StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_DOWNLOAD_BASE: &str = "https://drive.google.com/uc?export=download";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Errors raised by Drive listing and download calls
#[derive(Debug, Error)]
pub enum DriveError {
    /// Transport level failure (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(String),
    /// The listing API answered with an error object
    #[error("Drive API error: {0}")]
    Api(String),
    /// The listing response could not be decoded
    #[error("Invalid Drive response: {0}")]
    Parse(String),
    /// Download answered with a non-200 status
    #[error("Download failed: HTTP {0}")]
    HttpStatus(u16),
    /// Download answered with an HTML page carrying no confirmation token
    #[error("Download returned HTML instead of file")]
    HtmlInsteadOfFile,
    /// Redirect chain exceeded the hop limit
    #[error("Too many redirects")]
    TooManyRedirects,
    /// Redirect status without a usable `Location` header
    #[error("Invalid redirect target: {0}")]
    InvalidRedirect(String),
    /// Entry does not point at a Drive object
    #[error("File {0} is not stored on Drive")]
    NotRemote(String),
}

fn network_error(e: reqwest::Error) -> DriveError {
    // The listing URL carries the API key
    DriveError::Network(e.without_url().to_string())
}

/// One child of a folder as returned by `files.list`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    /// Drive object id
    pub id: String,
    /// Display name
    pub name: String,
    /// Drive MIME type; folders use `application/vnd.google-apps.folder`
    #[serde(default)]
    pub mime_type: String,
    /// Size in bytes, encoded as a decimal string by the API
    #[serde(default)]
    pub size: Option<String>,
}

impl DriveItem {
    /// Returns true if the item is a folder
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Parsed size, `None` when omitted or malformed
    #[must_use]
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

/// One page of a folder listing
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DrivePage {
    /// Children on this page
    #[serde(default, rename = "files")]
    pub items: Vec<DriveItem>,
    /// Continuation token, absent on the last page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Paginated child listing by folder id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriveLister: Send + Sync {
    /// Fetch one page of children of `folder_id`
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<DrivePage, DriveError>;
}

/// `files.list` client authenticated with an API key
pub struct GoogleDriveApi {
    client: HttpClient,
    api_key: String,
    base_url: String,
}

impl GoogleDriveApi {
    /// Create a client against the public Drive endpoint
    #[must_use]
    pub fn new(client: HttpClient, api_key: String) -> Self {
        Self::with_base_url(client, api_key, DRIVE_API_BASE.to_string())
    }

    /// Create a client against a custom endpoint
    #[must_use]
    pub fn with_base_url(client: HttpClient, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl DriveLister for GoogleDriveApi {
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<DrivePage, DriveError> {
        let mut query = vec![
            ("q", format!("'{folder_id}' in parents")),
            ("key", self.api_key.clone()),
            (
                "fields",
                "nextPageToken,files(id,name,mimeType,size)".to_string(),
            ),
            ("pageSize", DRIVE_PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .client
            .get(format!("{}/files", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error)
                .ok();
            let message = detail.as_ref().map_or_else(
                || format!("HTTP {status}"),
                |d| format!("{} ({})", d.message, d.status),
            );
            if detail.is_some_and(|d| d.status == "PERMISSION_DENIED" || d.message.contains("disabled"))
            {
                error!("Google Drive API is disabled or the key lacks access; enable the Drive API for this project");
            }
            return Err(DriveError::Api(message));
        }

        response
            .json::<DrivePage>()
            .await
            .map_err(|e| DriveError::Parse(e.without_url().to_string()))
    }
}

/// Bytes of a downloaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// File content
    pub bytes: Vec<u8>,
    /// File name to present to the recipient
    pub name: String,
    /// MIME type derived from the name
    pub mime_type: &'static str,
}

/// Public-link downloader with manual redirect handling
#[derive(Clone)]
pub struct DriveDownloader {
    client: HttpClient,
    max_redirects: usize,
}

impl DriveDownloader {
    /// `client` must be built with redirects disabled
    /// (see [`crate::http::create_download_client`]).
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            max_redirects: get_download_max_redirects(),
        }
    }

    /// Download a remote entry.
    ///
    /// # Errors
    ///
    /// Returns `DriveError::NotRemote` for local entries, otherwise see
    /// [`Self::download_url`].
    pub async fn download(&self, entry: &FileEntry) -> Result<DownloadedFile, DriveError> {
        let FileLocation::Remote { download_url, .. } = &entry.location else {
            return Err(DriveError::NotRemote(entry.name.clone()));
        };
        self.download_url(download_url, &entry.name).await
    }

    /// Download `download_url`, following at most
    /// [`crate::config::DOWNLOAD_MAX_REDIRECTS`] redirects (env overridable).
    ///
    /// Large files are answered with an HTML virus-scan warning; the
    /// `confirm=<token>` found in that page is appended to the original URL
    /// and the request is re-issued.
    ///
    /// # Errors
    ///
    /// Returns `DriveError` on network failure, non-200 status, an HTML page
    /// without a token, or a redirect chain that is too long.
    pub async fn download_url(
        &self,
        download_url: &str,
        name: &str,
    ) -> Result<DownloadedFile, DriveError> {
        info!(file_name = %name, "Downloading from Drive");
        let mut url = download_url.to_string();

        for hop in 0..=self.max_redirects {
            let response = self.client.get(&url).send().await.map_err(network_error)?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| DriveError::InvalidRedirect("missing location".to_string()))?;
                url = Url::parse(&url)
                    .and_then(|base| base.join(location))
                    .map_err(|e| DriveError::InvalidRedirect(e.to_string()))?
                    .to_string();
                debug!(hop, "Following download redirect");
                continue;
            }

            let is_html = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.contains("text/html"));

            if status == StatusCode::OK && is_html {
                let html = response.text().await.map_err(network_error)?;
                let token = regex!(r"confirm=([a-zA-Z0-9_-]+)")
                    .captures(&html)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .ok_or(DriveError::HtmlInsteadOfFile)?;
                debug!(file_name = %name, "Confirming virus-scan warning");
                url = format!("{download_url}&confirm={token}");
                continue;
            }

            if status != StatusCode::OK {
                return Err(DriveError::HttpStatus(status.as_u16()));
            }

            let bytes = response.bytes().await.map_err(network_error)?.to_vec();
            info!(file_name = %name, bytes = bytes.len(), "Downloaded from Drive");
            return Ok(DownloadedFile {
                bytes,
                name: name.to_string(),
                mime_type: mime_type_for(name),
            });
        }

        Err(DriveError::TooManyRedirects)
    }
}

/// Flat listing of every configured root folder
#[derive(Debug, Clone)]
pub struct DriveSnapshot {
    /// Files in walk order
    pub files: Vec<FileEntry>,
    /// Completion time of the walk
    pub last_updated: DateTime<Utc>,
}

/// Cached, searchable view over the configured Drive folders.
pub struct DriveProvider {
    lister: Arc<dyn DriveLister>,
    downloader: DriveDownloader,
    folder_ids: Vec<String>,
    cache: Cache<(), Arc<DriveSnapshot>>,
    page_delay: Duration,
    folder_delay: Duration,
    max_depth: usize,
}

impl DriveProvider {
    /// Create a provider over `folder_ids` whose listing is cached for `ttl`
    #[must_use]
    pub fn new(
        lister: Arc<dyn DriveLister>,
        downloader: DriveDownloader,
        folder_ids: Vec<String>,
        ttl: Duration,
    ) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self {
            lister,
            downloader,
            folder_ids,
            cache,
            page_delay: Duration::from_millis(get_drive_page_delay_ms()),
            folder_delay: Duration::from_millis(get_drive_folder_delay_ms()),
            max_depth: get_drive_max_depth(),
        }
    }

    /// Override the rate-limit pauses between listing calls
    #[must_use]
    pub const fn with_delays(mut self, page_delay: Duration, folder_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self.folder_delay = folder_delay;
        self
    }

    /// Returns true if at least one root folder is configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.folder_ids.is_empty()
    }

    /// Number of files in the current cache, 0 if empty or expired
    pub async fn cached_file_count(&self) -> usize {
        self.cache.get(&()).await.map_or(0, |s| s.files.len())
    }

    /// Return the cached snapshot, walking the folders if it is missing,
    /// expired or `force` is set.
    ///
    /// Concurrent callers share a single walk.
    pub async fn refresh_cache(&self, force: bool) -> Arc<DriveSnapshot> {
        if force {
            self.cache.invalidate(&()).await;
        }
        self.load().await.0
    }

    /// Snapshot plus whether it was produced by this call
    async fn load(&self) -> (Arc<DriveSnapshot>, bool) {
        let entry = self.cache.entry(()).or_insert_with(self.walk_all()).await;
        let fresh = entry.is_fresh();
        (entry.into_value(), fresh)
    }

    /// Replace `stale` unless another caller already did
    async fn reload(&self, stale: &Arc<DriveSnapshot>) -> Arc<DriveSnapshot> {
        let current = self.cache.get(&()).await;
        if current.is_some_and(|c| Arc::ptr_eq(&c, stale)) {
            self.cache.invalidate(&()).await;
        }
        self.load().await.0
    }

    /// Files whose name or path contains `code` (case-insensitive)
    pub async fn search_by_subject_code(&self, code: &str) -> Vec<FileEntry> {
        let code = code.trim().to_string();
        if code.is_empty() {
            return Vec::new();
        }
        self.search_with(&code, |f| f.matches_subject_code(&code))
            .await
    }

    /// Files whose name or path contains `query` (case-insensitive)
    pub async fn search_by_query(&self, query: &str) -> Vec<FileEntry> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Vec::new();
        }
        self.search_with(&query, |f| f.matches_query(&query)).await
    }

    async fn search_with<F>(&self, label: &str, matches: F) -> Vec<FileEntry>
    where
        F: Fn(&FileEntry) -> bool,
    {
        if !self.is_configured() {
            return Vec::new();
        }

        let (snapshot, fresh) = self.load().await;
        let hits = filter_snapshot(&snapshot, &matches);
        if !hits.is_empty() || fresh {
            return hits;
        }

        info!(query = %label, "No Drive results, refreshing cache and searching again");
        let snapshot = self.reload(&snapshot).await;
        filter_snapshot(&snapshot, &matches)
    }

    /// Download a remote entry.
    ///
    /// # Errors
    ///
    /// See [`DriveDownloader::download`].
    pub async fn download(&self, entry: &FileEntry) -> Result<DownloadedFile, DriveError> {
        self.downloader.download(entry).await
    }

    async fn walk_all(&self) -> Arc<DriveSnapshot> {
        info!(folders = self.folder_ids.len(), "Refreshing Google Drive file cache");
        let mut files = Vec::new();

        for (index, folder_id) in self.folder_ids.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.folder_delay).await;
            }
            files.extend(self.walk_root(folder_id).await);
        }

        info!(files = files.len(), "Drive cache updated");
        Arc::new(DriveSnapshot {
            files,
            last_updated: Utc::now(),
        })
    }

    /// Depth-first walk of one root folder.
    ///
    /// A folder that fails to list contributes no files; the walk goes on.
    async fn walk_root(&self, root_id: &str) -> Vec<FileEntry> {
        let mut files = Vec::new();
        let mut stack = vec![(root_id.to_string(), String::new(), 0usize)];
        let mut first = true;

        while let Some((folder_id, folder_path, depth)) = stack.pop() {
            if depth > self.max_depth {
                warn!(folder_id = %folder_id, max_depth = self.max_depth, "Max folder depth reached");
                continue;
            }
            if !first {
                tokio::time::sleep(self.page_delay).await;
            }
            first = false;

            let items = match self.list_folder(&folder_id).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(folder_id = %folder_id, error = %e, "Failed to list Drive folder");
                    continue;
                }
            };

            let mut subfolders = Vec::new();
            let before = files.len();
            for item in items {
                let path = join_path(&folder_path, &item.name);
                if item.is_folder() {
                    subfolders.push((item.id, path));
                } else {
                    files.push(remote_entry(item, path));
                }
            }
            debug!(
                folder_id = %folder_id,
                depth,
                files = files.len() - before,
                subfolders = subfolders.len(),
                "Scanned Drive folder"
            );

            // Reversed so siblings are visited in listing order
            for (id, path) in subfolders.into_iter().rev() {
                stack.push((id, path, depth + 1));
            }
        }

        files
    }

    /// All children of one folder, following page tokens until exhausted
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveItem>, DriveError> {
        let mut items = Vec::new();
        let mut page_token = None;

        loop {
            let page = self.lister.list_children(folder_id, page_token).await?;
            items.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => {
                    page_token = Some(token);
                    tokio::time::sleep(self.page_delay).await;
                }
                _ => break,
            }
        }

        Ok(items)
    }
}

fn filter_snapshot<F>(snapshot: &DriveSnapshot, matches: &F) -> Vec<FileEntry>
where
    F: Fn(&FileEntry) -> bool,
{
    snapshot
        .files
        .iter()
        .filter(|f| matches(f))
        .cloned()
        .collect()
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Public download URL for a Drive object id
#[must_use]
pub fn download_url_for(id: &str) -> String {
    format!("{DRIVE_DOWNLOAD_BASE}&id={id}")
}

fn remote_entry(item: DriveItem, relative_path: String) -> FileEntry {
    FileEntry {
        size: FileSize::from(item.size_bytes()),
        mime_type: mime_type_for(&item.name),
        name: item.name,
        relative_path,
        modified: None,
        location: FileLocation::Remote {
            download_url: download_url_for(&item.id),
            id: item.id,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn file(id: &str, name: &str, size: Option<&str>) -> DriveItem {
        DriveItem {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: "application/pdf".to_string(),
            size: size.map(str::to_string),
        }
    }

    fn folder(id: &str, name: &str) -> DriveItem {
        DriveItem {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            size: None,
        }
    }

    fn page(items: Vec<DriveItem>, next: Option<&str>) -> DrivePage {
        DrivePage {
            items,
            next_page_token: next.map(str::to_string),
        }
    }

    fn provider(lister: MockDriveLister, roots: &[&str]) -> DriveProvider {
        DriveProvider::new(
            Arc::new(lister),
            DriveDownloader::new(HttpClient::new()),
            roots.iter().map(|s| (*s).to_string()).collect(),
            Duration::from_secs(60),
        )
        .with_delays(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_drive_page_deserializes_api_shape() {
        let json = r#"{
            "nextPageToken": "tok",
            "files": [
                {"id": "1", "name": "CS101 handout.pdf", "mimeType": "application/pdf", "size": "2048"},
                {"id": "2", "name": "CS101", "mimeType": "application/vnd.google-apps.folder"}
            ]
        }"#;
        let page: DrivePage = serde_json::from_str(json).expect("valid page");
        assert_eq!(page.next_page_token.as_deref(), Some("tok"));
        assert_eq!(page.items[0].size_bytes(), Some(2048));
        assert!(!page.items[0].is_folder());
        assert!(page.items[1].is_folder());
        assert_eq!(page.items[1].size_bytes(), None);
    }

    #[tokio::test]
    async fn test_walk_follows_pages_and_subfolders() {
        let mut lister = MockDriveLister::new();
        lister
            .expect_list_children()
            .withf(|folder, token| folder == "root" && token.is_none())
            .times(1)
            .returning(|_, _| {
                Ok(page(
                    vec![file("a", "CS101 handout.pdf", Some("10")), folder("sub", "CS101")],
                    Some("p2"),
                ))
            });
        lister
            .expect_list_children()
            .withf(|folder, token| folder == "root" && token.as_deref() == Some("p2"))
            .times(1)
            .returning(|_, _| Ok(page(vec![file("b", "MTH302 quiz.pdf", None)], None)));
        lister
            .expect_list_children()
            .withf(|folder, _| folder == "sub")
            .times(1)
            .returning(|_, _| Ok(page(vec![file("c", "notes.pdf", Some("5"))], None)));

        let provider = provider(lister, &["root"]);
        let snapshot = provider.refresh_cache(false).await;

        let paths: Vec<_> = snapshot.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["CS101 handout.pdf", "MTH302 quiz.pdf", "CS101/notes.pdf"]);
        assert_eq!(snapshot.files[1].size, FileSize::Unknown);
        assert_eq!(
            snapshot.files[2].location,
            FileLocation::Remote {
                id: "c".to_string(),
                download_url: "https://drive.google.com/uc?export=download&id=c".to_string(),
            }
        );
        assert_eq!(provider.cached_file_count().await, 3);
    }

    #[tokio::test]
    async fn test_failing_folder_contributes_nothing() {
        let mut lister = MockDriveLister::new();
        lister
            .expect_list_children()
            .withf(|folder, _| folder == "broken")
            .returning(|_, _| Err(DriveError::Api("boom".to_string())));
        lister
            .expect_list_children()
            .withf(|folder, _| folder == "good")
            .returning(|_, _| Ok(page(vec![file("x", "CS101 x.pdf", Some("1"))], None)));

        let provider = provider(lister, &["broken", "good"]);
        let hits = provider.search_by_subject_code("cs101").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "CS101 x.pdf");
    }

    #[tokio::test]
    async fn test_depth_is_bounded() {
        let mut lister = MockDriveLister::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        // Every folder contains one more folder, forever
        lister.expect_list_children().returning(move |_, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(page(vec![folder(&format!("f{n}"), "deeper")], None))
        });

        let provider = provider(lister, &["root"]);
        let snapshot = provider.refresh_cache(false).await;
        assert!(snapshot.files.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), crate::config::DRIVE_MAX_DEPTH + 1);
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_relist() {
        let mut lister = MockDriveLister::new();
        lister
            .expect_list_children()
            .times(1)
            .returning(|_, _| Ok(page(vec![file("a", "CS101 a.pdf", Some("1"))], None)));

        let provider = provider(lister, &["root"]);
        assert_eq!(provider.search_by_subject_code("CS101").await.len(), 1);
        assert_eq!(provider.search_by_query("a.pdf").await.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_hits_on_cached_listing_refreshes_once() {
        let mut lister = MockDriveLister::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        lister.expect_list_children().returning(move |_, _| {
            // The file shows up on Drive after the first walk
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(page(vec![file("a", "CS101 a.pdf", Some("1"))], None))
            } else {
                Ok(page(
                    vec![
                        file("a", "CS101 a.pdf", Some("1")),
                        file("b", "CS999 new.pdf", Some("1")),
                    ],
                    None,
                ))
            }
        });

        let provider = provider(lister, &["root"]);
        provider.refresh_cache(false).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let hits = provider.search_by_subject_code("CS999").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Still nothing after the forced walk: exactly one extra walk, no loop
        assert!(provider.search_by_subject_code("ZZ000").await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fresh_walk_with_zero_hits_is_not_repeated() {
        let mut lister = MockDriveLister::new();
        lister
            .expect_list_children()
            .times(1)
            .returning(|_, _| Ok(page(Vec::new(), None)));

        let provider = provider(lister, &["root"]);
        assert!(provider.search_by_subject_code("CS101").await.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_never_lists() {
        let lister = MockDriveLister::new();
        let provider = provider(lister, &[]);
        assert!(provider.search_by_subject_code("CS101").await.is_empty());
        assert_eq!(provider.cached_file_count().await, 0);
    }

    #[tokio::test]
    async fn test_download_rejects_local_entry() {
        let downloader = DriveDownloader::new(HttpClient::new());
        let entry = crate::files::test_support::local("a.pdf", 1);
        let err = downloader.download(&entry).await.expect_err("local entry");
        assert!(matches!(err, DriveError::NotRemote(_)));
    }
}
