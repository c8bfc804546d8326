#![deny(missing_docs)]
//! StudyShare Bot
//!
//! A WhatsApp group assistant that finds study files by subject code in a
//! local share and public Google Drive folders, delivers them page by page,
//! moderates links and spam, and answers questions through Gemini.

/// Gemini question answering
pub mod ai;
/// Chat commands and message dispatch
pub mod bot;
/// Configuration management
pub mod config;
/// File search and paginated delivery
pub mod delivery;
/// Local and Drive file sources
pub mod files;
/// HTTP client construction
pub mod http;
/// Free-text intent detection
pub mod intent;
/// Link and spam moderation
pub mod moderation;
/// Usage counters
pub mod stats;
/// JSON settings stores
pub mod store;
/// Chat transport seam and the WhatsApp implementation
pub mod transport;
/// Utility functions
pub mod utils;
