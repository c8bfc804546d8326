//! Small shared helpers.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use studyshare_bot::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retry a chat transport operation with exponential backoff.
///
/// Intended for sends that may fail on transient network errors:
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max attempts: 3 (see constants in `config.rs`)
///
/// # Examples
///
/// ```no_run
/// use studyshare_bot::utils::retry_send_operation;
/// use anyhow::Result;
///
/// async fn send() -> Result<String> {
///     Ok("message-id".to_string())
/// }
///
/// # async fn example() -> Result<()> {
/// let id = retry_send_operation(|| async { send().await }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_send_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{SEND_INITIAL_BACKOFF_MS, SEND_MAX_BACKOFF_MS, SEND_MAX_RETRIES};

    let retry_strategy = ExponentialBackoff::from_millis(SEND_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(SEND_MAX_BACKOFF_MS))
        .map(jitter)
        .take(SEND_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Chat send operation failed after {} attempts: {}",
            SEND_MAX_RETRIES, e
        );
        e
    })
}

/// Strip the server part of a JID (`92300...@s.whatsapp.net` -> `92300...`).
#[must_use]
pub fn jid_user(jid: &str) -> &str {
    jid.split('@').next().unwrap_or(jid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    #[test]
    fn test_jid_user() {
        assert_eq!(jid_user("923001234567@s.whatsapp.net"), "923001234567");
        assert_eq!(jid_user("plain"), "plain");
    }

    #[tokio::test]
    async fn test_retry_send_operation_recovers() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result = retry_send_operation(|| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("transient");
                }
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
