use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use studyshare_bot::ai::AiClient;
use studyshare_bot::bot::{HandlerContext, MessageHandler};
use studyshare_bot::config::{get_drive_cache_ttl_secs, Settings};
use studyshare_bot::delivery::{DeliveryManager, DeliveryOptions, LocalFiles, RemoteFiles};
use studyshare_bot::files::drive::{DriveDownloader, GoogleDriveApi};
use studyshare_bot::files::{DriveProvider, LocalFileIndex};
use studyshare_bot::http::{create_download_client, create_http_client};
use studyshare_bot::stats::BotStats;
use studyshare_bot::store::Stores;
use studyshare_bot::transport::whatsapp::WhatsAppTransport;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Inbound messages buffered between the socket and the dispatcher
const INCOMING_QUEUE: usize = 256;

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    google_key: Regex,
    key_param: Regex,
    env_key: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            google_key: Regex::new(r"AIza[0-9A-Za-z_-]{35}")?,
            key_param: Regex::new(r"([?&]key=)[^\s&]+")?,
            env_key: Regex::new(r"(GEMINI_API_KEY=)[^\s&]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = self
            .google_key
            .replace_all(input, "[GOOGLE_API_KEY]")
            .to_string();
        output = self
            .key_param
            .replace_all(&output, "${1}[MASKED]")
            .to_string();
        output = self
            .env_key
            .replace_all(&output, "${1}[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may differ
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting StudyShare Bot...");

    let settings = init_settings();

    let stores = match Stores::open(&settings.data_dir) {
        Ok(stores) => Arc::new(stores),
        Err(e) => {
            error!("Failed to open settings stores: {}", e);
            std::process::exit(1);
        }
    };

    let local = LocalFileIndex::new(&settings.files_dir);
    if let Err(e) = local.ensure_root() {
        warn!(path = %local.root().display(), error = %e, "Could not create the local file directory");
    }

    let stats = Arc::new(BotStats::new());
    let remote = match init_drive(&settings) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!("Failed to build the Drive download client: {}", e);
            std::process::exit(1);
        }
    };
    let transport = Arc::new(WhatsAppTransport::new());

    let local_files: Arc<dyn LocalFiles> = Arc::new(local.clone());
    let remote_files: Arc<dyn RemoteFiles> = remote.clone();
    let delivery = DeliveryManager::new(
        transport.clone(),
        local_files,
        remote_files.clone(),
        stats.clone(),
        DeliveryOptions::from_settings(&settings),
    );

    let ai = Arc::new(AiClient::new(
        settings.gemini_api_key.clone(),
        settings.gemini_model.clone(),
    ));
    if settings.feature_ai_enabled && !ai.is_configured() {
        warn!("GEMINI_API_KEY is not set; AI answers are disabled");
    }

    let handler = Arc::new(MessageHandler::new(HandlerContext {
        settings: settings.clone(),
        transport: transport.clone(),
        delivery,
        local,
        remote: remote_files,
        stores,
        stats,
        ai,
    }));

    // Warm the Drive listing so the first search does not pay for the walk
    if remote.is_configured() {
        let remote = remote.clone();
        tokio::spawn(async move {
            let snapshot = remote.refresh_cache(false).await;
            info!(files = snapshot.files.len(), "Drive cache warmed");
        });
    }

    let (tx, mut rx) = mpsc::channel(INCOMING_QUEUE);
    let bot_transport = transport.clone();
    let db_path = settings.whatsapp_db_path.clone();
    let mut bot_task = tokio::spawn(async move {
        bot_transport.run_bot(Path::new(&db_path), tx).await
    });

    let dispatcher = {
        let handler = handler.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let handler = handler.clone();
                tokio::spawn(async move {
                    handler.handle(&msg).await;
                });
            }
        })
    };

    info!("Bot is running...");

    tokio::select! {
        result = &mut bot_task => match result {
            Ok(Ok(())) => info!("WhatsApp connection closed"),
            Ok(Err(e)) => error!("WhatsApp bot stopped: {:#}", e),
            Err(e) => error!("WhatsApp bot task failed: {}", e),
        },
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    bot_task.abort();
    dispatcher.abort();
    handler.delivery().shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_drive(settings: &Settings) -> Result<DriveProvider, reqwest::Error> {
    let folder_ids = settings.drive_folder_ids();
    let api_key = settings.gemini_api_key.clone().unwrap_or_default();
    if folder_ids.is_empty() {
        info!("No Google Drive folders configured; searching local files only");
    } else if api_key.is_empty() {
        warn!("Google Drive folders configured without an API key; listing will fail");
    }

    let ttl = Duration::from_secs(get_drive_cache_ttl_secs());
    info!(folders = folder_ids.len(), ttl_secs = ttl.as_secs(), "Initializing Drive provider");

    let lister = Arc::new(GoogleDriveApi::new(create_http_client(), api_key));
    let downloader = DriveDownloader::new(create_download_client()?);
    Ok(DriveProvider::new(lister, downloader, folder_ids, ttl))
}
