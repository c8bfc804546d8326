//! WhatsApp transport over `whatsapp-rust`
//!
//! The bot runs in the background; its event handler keeps the connected
//! [`Client`] in a shared slot and forwards text messages to an mpsc channel.

use super::groups::GroupQueries;
use super::{ChatTransport, GroupAdmin, IncomingMessage, OutgoingDocument, TransportError};
use crate::utils::retry_send_operation;
use async_trait::async_trait;
use moka::future::Cache;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use wacore::types::events::Event;
use wacore_binary::jid::Jid;
use whatsapp_rust::bot::Bot;
use whatsapp_rust::client::Client;
use whatsapp_rust::store::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

/// WhatsApp text messages are cut at this many bytes
pub const MAX_MESSAGE_LEN: usize = 4096;

const ADMIN_CACHE_TTL_SECS: u64 = 300;
const ADMIN_CACHE_CAPACITY: u64 = 1_000;

type ClientSlot = Arc<Mutex<Option<Arc<Client>>>>;

/// Chat transport backed by a `whatsapp-rust` client
#[derive(Clone)]
pub struct WhatsAppTransport {
    client: ClientSlot,
    /// group JID -> admin user parts
    admins: Cache<String, Arc<Vec<String>>>,
}

impl Default for WhatsAppTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WhatsAppTransport {
    /// Transport with no client; sends fail until the bot connects
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Arc::new(Mutex::new(None)),
            admins: Cache::builder()
                .max_capacity(ADMIN_CACHE_CAPACITY)
                .time_to_live(Duration::from_secs(ADMIN_CACHE_TTL_SECS))
                .build(),
        }
    }

    /// Returns true while a client is connected
    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    async fn client(&self) -> Result<Arc<Client>, TransportError> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or(TransportError::NotConnected)
    }

    /// Build the bot, start it in the background and forward inbound text
    /// messages to `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be opened or the bot
    /// fails to start.
    pub async fn run_bot(&self, db_path: &Path, tx: mpsc::Sender<IncomingMessage>) -> anyhow::Result<()> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db_path = db_path.to_string_lossy().to_string();
        info!(session = %db_path, "WhatsApp bot building");

        let backend = Arc::new(SqliteStore::new(&db_path).await?);
        let client_slot = self.client.clone();
        let admins = self.admins.clone();

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .on_event(move |event, client| {
                let tx = tx.clone();
                let client_slot = client_slot.clone();
                let admins = admins.clone();
                async move {
                    match event {
                        Event::PairingQrCode { code, .. } => match generate_qr_terminal(&code) {
                            Ok(qr) => info!("Scan this QR code with WhatsApp to pair:\n{qr}"),
                            Err(e) => error!(error = %e, "Failed to render pairing QR code"),
                        },
                        Event::PairSuccess(_) => info!("WhatsApp pairing successful"),
                        Event::Connected(_) => {
                            info!("WhatsApp connected");
                            *client_slot.lock().await = Some(client);
                        }
                        Event::Disconnected(_) => {
                            warn!("WhatsApp disconnected");
                            *client_slot.lock().await = None;
                        }
                        Event::LoggedOut(_) => {
                            warn!("WhatsApp logged out, delete the session file to pair again");
                            *client_slot.lock().await = None;
                            admins.invalidate_all();
                        }
                        Event::Message(msg, info) => {
                            if let Some(incoming) = incoming_message(&msg, &info) {
                                if tx.send(incoming).await.is_err() {
                                    warn!("Inbound channel closed, dropping message");
                                }
                            }
                        }
                        _ => {}
                    }
                }
            })
            .build()
            .await?;

        *self.client.lock().await = Some(bot.client());
        let _handle = bot.run().await?;
        info!("WhatsApp bot started");
        Ok(())
    }

    async fn send_message(
        &self,
        chat_id: &str,
        message: waproto::whatsapp::Message,
    ) -> Result<String, TransportError> {
        let client = self.client().await?;
        let jid = parse_jid(chat_id)?;
        retry_send_operation(|| {
            let client = client.clone();
            let jid = jid.clone();
            let message = message.clone();
            async move {
                client
                    .send_message(jid, message)
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))
            }
        })
        .await
        .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn admins_of(&self, group: &str) -> Result<Arc<Vec<String>>, TransportError> {
        let client = self.client().await?;
        let jid = parse_jid(group)?;
        self.admins
            .try_get_with(group.to_string(), async move {
                client.group_admins(&jid).await.map(Arc::new)
            })
            .await
            .map_err(|e| TransportError::Group(e.to_string()))
    }
}

#[async_trait]
impl ChatTransport for WhatsAppTransport {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        let sanitized = sanitize_for_whatsapp(text);
        for chunk in split_message(&sanitized, MAX_MESSAGE_LEN) {
            let message = waproto::whatsapp::Message {
                conversation: Some(chunk.to_string()),
                ..Default::default()
            };
            self.send_message(chat_id, message).await?;
        }
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: &str,
        document: OutgoingDocument,
    ) -> Result<(), TransportError> {
        let client = self.client().await?;
        let size = document.bytes.len();
        let upload = client
            .upload(document.bytes, whatsapp_rust::download::MediaType::Document)
            .await
            .map_err(|e| TransportError::Upload(e.to_string()))?;
        debug!(chat_id = %chat_id, file_name = %document.file_name, size, "Document uploaded");

        let message = waproto::whatsapp::Message {
            document_message: Some(Box::new(waproto::whatsapp::message::DocumentMessage {
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                mimetype: Some(document.mime_type),
                title: Some(document.file_name.clone()),
                file_name: Some(document.file_name),
                ..Default::default()
            })),
            ..Default::default()
        };
        self.send_message(chat_id, message).await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        chat_id: &str,
        message_id: &str,
        sender: &str,
    ) -> Result<(), TransportError> {
        let message = waproto::whatsapp::Message {
            protocol_message: Some(Box::new(waproto::whatsapp::message::ProtocolMessage {
                key: Some(waproto::whatsapp::MessageKey {
                    remote_jid: Some(chat_id.to_string()),
                    from_me: Some(false),
                    id: Some(message_id.to_string()),
                    participant: Some(sender.to_string()),
                }),
                r#type: Some(
                    waproto::whatsapp::message::protocol_message::Type::Revoke as i32,
                ),
                ..Default::default()
            })),
            ..Default::default()
        };
        self.send_message(chat_id, message).await?;
        info!(chat_id = %chat_id, message_id = %message_id, "Message deleted");
        Ok(())
    }
}

#[async_trait]
impl GroupAdmin for WhatsAppTransport {
    async fn is_group_admin(&self, group: &str, user: &str) -> Result<bool, TransportError> {
        let admins = self.admins_of(group).await?;
        let user = crate::utils::jid_user(user);
        Ok(admins.iter().any(|admin| admin == user))
    }

    async fn remove_participant(&self, group: &str, user: &str) -> Result<(), TransportError> {
        let client = self.client().await?;
        let group_jid = parse_jid(group)?;
        let user_jid = parse_jid(user)?;

        let results = client
            .remove_group_participants(&group_jid, &[user_jid])
            .await
            .map_err(|e| TransportError::Group(e.to_string()))?;
        if results.iter().any(|(_, removed)| !removed) {
            return Err(TransportError::Group(format!("could not remove {user}")));
        }
        info!(group = %group, user = %user, "Participant removed");
        Ok(())
    }
}

fn parse_jid(value: &str) -> Result<Jid, TransportError> {
    value
        .parse::<Jid>()
        .map_err(|e| TransportError::InvalidChat(format!("{value}: {e}")))
}

/// Plain text of a message, unwrapping device-sent, ephemeral and
/// view-once wrappers; captions count as text
fn message_text(msg: &waproto::whatsapp::Message) -> Option<String> {
    let inner = msg
        .device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(msg);

    inner
        .conversation
        .as_deref()
        .or_else(|| {
            inner
                .extended_text_message
                .as_ref()
                .and_then(|e| e.text.as_deref())
        })
        .or_else(|| inner.image_message.as_ref().and_then(|i| i.caption.as_deref()))
        .or_else(|| inner.document_message.as_ref().and_then(|d| d.caption.as_deref()))
        .filter(|text| !text.trim().is_empty())
        .map(ToString::to_string)
}

fn incoming_message(
    msg: &waproto::whatsapp::Message,
    info: &wacore::types::message::MessageInfo,
) -> Option<IncomingMessage> {
    let Some(text) = message_text(msg) else {
        debug!(message_id = %info.id, "Ignoring message without text");
        return None;
    };
    Some(IncomingMessage {
        id: info.id.clone(),
        chat_id: info.source.chat.to_string(),
        sender: info.source.sender.to_string(),
        push_name: info.push_name.clone(),
        text,
        is_group: info.source.is_group,
        is_from_me: info.source.is_from_me,
    })
}

/// Render a QR code for the terminal using half-block characters, two
/// module rows per text line
///
/// # Errors
///
/// Returns an error if the data does not fit in a QR code.
pub fn generate_qr_terminal(qr_data: &str) -> Result<String, qrcode::types::QrError> {
    use qrcode::{Color, EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)?;
    let width = code.width();
    let colors = code.into_colors();
    let is_dark = |row: usize, col: usize| {
        row < width && col < width && colors[row * width + col] == Color::Dark
    };

    let mut out = String::with_capacity((width + 1) * width.div_ceil(2));
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (is_dark(row, col), is_dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}

/// Convert Markdown to WhatsApp formatting.
///
/// Headers become bold uppercase, `**bold**` becomes `*bold*`, links become
/// `text (url)` and horizontal rules are dropped.
#[must_use]
pub fn sanitize_for_whatsapp(text: &str) -> String {
    let mut out = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.len() >= 3 && trimmed.chars().all(|c| c == '-') {
            continue;
        }

        let header = ["### ", "## ", "# "]
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix));
        if let Some(header) = header {
            out.push(format!("*{}*", header.trim().to_uppercase()));
            continue;
        }

        let line = lazy_regex::regex_replace_all!(r"\[([^\]]+)\]\(([^)\s]+)\)", line, |_, text, url| {
            format!("{text} ({url})")
        });
        let line = lazy_regex::regex_replace_all!(r"\*\*([^*]+)\*\*", &line, |_, inner| {
            format!("*{inner}*")
        });
        out.push(line.into_owned());
    }

    let mut joined = out.join("\n");
    if text.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

/// Split text into chunks of at most `max_len` bytes, preferring newlines
/// and never cutting inside a UTF-8 character
#[must_use]
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // max_len smaller than one character
            end = text[start..]
                .chars()
                .next()
                .map_or(text.len(), |c| start + c.len_utf8());
        }

        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map_or(end, |i| start + i + 1)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }
    chunks
}
