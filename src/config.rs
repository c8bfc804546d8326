//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the tunable constants of the file-sharing pipeline.

use config::{Config, ConfigError, Environment, File};
use lazy_regex::regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Application settings loaded from config files and environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Display name used in bot replies
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Command prefix (`.` is always accepted as well)
    #[serde(default = "default_bot_prefix")]
    pub bot_prefix: String,
    /// Phone number shown to users when a search finds nothing
    #[serde(default = "default_owner_help_number")]
    pub owner_help_number: String,
    /// Comma-separated list of owner phone numbers
    #[serde(rename = "admin_numbers")]
    pub admin_numbers_str: Option<String>,

    /// Root directory of the local file share
    #[serde(default = "default_files_dir")]
    pub files_dir: String,
    /// Directory holding the JSON settings stores
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Path of the WhatsApp session database
    #[serde(default = "default_whatsapp_db_path")]
    pub whatsapp_db_path: String,

    /// Comma-separated Google Drive folder links or ids
    pub gdrive_folder_links: Option<String>,
    /// Google API key, used for both Drive listing and Gemini
    pub gemini_api_key: Option<String>,
    /// Gemini model used for AI answers
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Global default for subject-code file sharing
    #[serde(default = "default_true")]
    pub feature_file_sharing: bool,
    /// Global default for link moderation in groups
    #[serde(default = "default_true")]
    pub feature_link_moderation: bool,
    /// Global default for duplicate-message spam protection
    #[serde(default)]
    pub feature_antispam: bool,
    /// Enables the AI answerer
    #[serde(default = "default_true")]
    pub feature_ai_enabled: bool,
    /// Warnings a member may collect before being removed
    #[serde(default = "default_warning_limit")]
    pub default_warning_limit: u32,
}

fn default_bot_name() -> String {
    "StudyShare Bot".to_string()
}

fn default_bot_prefix() -> String {
    "!".to_string()
}

fn default_owner_help_number() -> String {
    String::new()
}

fn default_files_dir() -> String {
    "VU_Files".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_whatsapp_db_path() -> String {
    "whatsapp.db".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_warning_limit() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            bot_prefix: default_bot_prefix(),
            owner_help_number: default_owner_help_number(),
            admin_numbers_str: None,
            files_dir: default_files_dir(),
            data_dir: default_data_dir(),
            whatsapp_db_path: default_whatsapp_db_path(),
            gdrive_folder_links: None,
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            feature_file_sharing: true,
            feature_link_moderation: true,
            feature_antispam: false,
            feature_ai_enabled: true,
            default_warning_limit: default_warning_limit(),
        }
    }
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Returns the owner phone numbers (digits only)
    #[must_use]
    pub fn admin_numbers(&self) -> Vec<String> {
        self.admin_numbers_str
            .as_ref()
            .map(|s| {
                s.split([',', ';'])
                    .map(|token| token.chars().filter(char::is_ascii_digit).collect::<String>())
                    .filter(|token| !token.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns true if the sender (phone or JID) is a configured owner
    #[must_use]
    pub fn is_owner(&self, sender: &str) -> bool {
        let number = sender.split('@').next().unwrap_or(sender);
        self.admin_numbers().iter().any(|n| n == number)
    }

    /// Returns the Drive folder ids extracted from `gdrive_folder_links`
    #[must_use]
    pub fn drive_folder_ids(&self) -> Vec<String> {
        self.gdrive_folder_links
            .as_deref()
            .map(|links| {
                links
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .filter_map(extract_folder_id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Extract a Drive folder id from a share URL, or accept a bare id.
#[must_use]
pub fn extract_folder_id(url_or_id: &str) -> Option<String> {
    if regex!(r"^[a-zA-Z0-9_-]{20,50}$").is_match(url_or_id) {
        return Some(url_or_id.to_string());
    }

    let patterns = [
        regex!(r"/folders/([a-zA-Z0-9_-]+)"),
        regex!(r"id=([a-zA-Z0-9_-]+)"),
        regex!(r"/d/([a-zA-Z0-9_-]+)"),
    ];

    patterns
        .iter()
        .find_map(|re| re.captures(url_or_id))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// File delivery
/// Files sent in the first batch of a search
pub const FILE_BATCH_SIZE: usize = 10;
/// Files added to the batch limit by a "send more" request
pub const FILE_MORE_INCREMENT: usize = 10;
/// Cap applied by the prioritizer to the visible short-list
pub const MAX_PRIORITIZED_FILES: usize = 10;
/// Delay between two consecutive document sends
pub const FILE_SEND_DELAY_MS: u64 = 1000;

// Google Drive
/// Lifetime of the Drive listing cache (30 minutes)
pub const DRIVE_CACHE_TTL_SECS: u64 = 1800;
/// Maximum folder nesting followed by the tree walk
pub const DRIVE_MAX_DEPTH: usize = 20;
/// Page size requested from the listing API
pub const DRIVE_PAGE_SIZE: u32 = 1000;
/// Delay between paginated listing calls
pub const DRIVE_PAGE_DELAY_MS: u64 = 100;
/// Delay between sibling folder scans
pub const DRIVE_FOLDER_DELAY_MS: u64 = 500;
/// Redirect hops followed by the downloader
pub const DOWNLOAD_MAX_REDIRECTS: usize = 5;
/// Per-request timeout for outbound HTTP
pub const HTTP_TIMEOUT_SECS: u64 = 60;

// Chat transport retries
/// Maximum retry attempts for chat sends
pub const SEND_MAX_RETRIES: usize = 3;
/// Initial backoff for chat send retries
pub const SEND_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for chat send retries
pub const SEND_MAX_BACKOFF_MS: u64 = 4000;

/// Parse an environment override, falling back to `default` when the
/// variable is unset or malformed
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    parse_or(std::env::var(name).ok().as_deref(), default)
}

fn parse_or<T: FromStr>(value: Option<&str>, default: T) -> T {
    value
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Get the first batch size of a search from env or default.
///
/// Environment variable: `FILE_BATCH_SIZE`.
#[must_use]
pub fn get_file_batch_size() -> usize {
    env_or("FILE_BATCH_SIZE", FILE_BATCH_SIZE)
}

/// Get the "send more" increment from env or default.
///
/// Environment variable: `FILE_MORE_INCREMENT`.
#[must_use]
pub fn get_file_more_increment() -> usize {
    env_or("FILE_MORE_INCREMENT", FILE_MORE_INCREMENT)
}

/// Get the maximum Drive folder depth from env or default.
///
/// Environment variable: `DRIVE_MAX_DEPTH`.
#[must_use]
pub fn get_drive_max_depth() -> usize {
    env_or("DRIVE_MAX_DEPTH", DRIVE_MAX_DEPTH)
}

/// Environment variable: `DRIVE_PAGE_DELAY_MS`.
#[must_use]
pub fn get_drive_page_delay_ms() -> u64 {
    env_or("DRIVE_PAGE_DELAY_MS", DRIVE_PAGE_DELAY_MS)
}

/// Environment variable: `DRIVE_FOLDER_DELAY_MS`.
#[must_use]
pub fn get_drive_folder_delay_ms() -> u64 {
    env_or("DRIVE_FOLDER_DELAY_MS", DRIVE_FOLDER_DELAY_MS)
}

/// Get the downloader's redirect bound from env or default.
///
/// Environment variable: `DOWNLOAD_MAX_REDIRECTS`.
#[must_use]
pub fn get_download_max_redirects() -> usize {
    env_or("DOWNLOAD_MAX_REDIRECTS", DOWNLOAD_MAX_REDIRECTS)
}

/// Get the inter-file send delay from env or default.
///
/// Environment variable: `FILE_SEND_DELAY_MS`.
#[must_use]
pub fn get_file_send_delay_ms() -> u64 {
    env_or("FILE_SEND_DELAY_MS", FILE_SEND_DELAY_MS)
}

/// Get the Drive cache TTL from env or default.
///
/// Environment variable: `DRIVE_CACHE_TTL_SECS`.
#[must_use]
pub fn get_drive_cache_ttl_secs() -> u64 {
    env_or("DRIVE_CACHE_TTL_SECS", DRIVE_CACHE_TTL_SECS)
}

/// Get the outbound HTTP timeout from env or default.
///
/// Environment variable: `HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_http_timeout_secs() -> u64 {
    env_or("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_number_parsing() {
        let mut settings = Settings::default();

        settings.admin_numbers_str = Some("923001234567,+92 300 7654321".to_string());
        let admins = settings.admin_numbers();
        assert_eq!(admins, vec!["923001234567", "923007654321"]);

        settings.admin_numbers_str = Some("923001234567; 15551234567".to_string());
        assert!(settings.is_owner("923001234567@s.whatsapp.net"));
        assert!(settings.is_owner("15551234567"));
        assert!(!settings.is_owner("111@s.whatsapp.net"));

        settings.admin_numbers_str = None;
        assert!(settings.admin_numbers().is_empty());
    }

    #[test]
    fn test_env_override_parsing() {
        assert_eq!(parse_or(Some("25"), FILE_BATCH_SIZE), 25);
        assert_eq!(parse_or(Some(" 3 "), DOWNLOAD_MAX_REDIRECTS), 3);
        assert_eq!(parse_or(Some("lots"), FILE_MORE_INCREMENT), FILE_MORE_INCREMENT);
        assert_eq!(parse_or(Some("-1"), DRIVE_MAX_DEPTH), DRIVE_MAX_DEPTH);
        assert_eq!(parse_or::<u64>(None, DRIVE_PAGE_DELAY_MS), DRIVE_PAGE_DELAY_MS);
    }

    #[test]
    fn test_extract_folder_id() {
        let bare = "11iCga1LlWk5EvpcZykWNr_glURgUeNeo";
        assert_eq!(extract_folder_id(bare).as_deref(), Some(bare));

        let url = "https://drive.google.com/drive/folders/1AbCdEfGhIjKlMnOpQrStUv?usp=sharing";
        assert_eq!(
            extract_folder_id(url).as_deref(),
            Some("1AbCdEfGhIjKlMnOpQrStUv")
        );

        let open = "https://drive.google.com/open?id=1ZyXwVuTsRqPoNmLkJiHgFe";
        assert_eq!(
            extract_folder_id(open).as_deref(),
            Some("1ZyXwVuTsRqPoNmLkJiHgFe")
        );

        assert_eq!(extract_folder_id("not a link"), None);
    }

    #[test]
    fn test_drive_folder_ids_skips_garbage() {
        let settings = Settings {
            gdrive_folder_links: Some(
                "https://drive.google.com/drive/folders/AAAAAAAAAAAAAAAAAAAAAA, nonsense ,"
                    .to_string(),
            ),
            ..Settings::default()
        };
        assert_eq!(settings.drive_folder_ids(), vec!["AAAAAAAAAAAAAAAAAAAAAA"]);
    }
}
