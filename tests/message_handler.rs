use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use studyshare_bot::ai::AiClient;
use studyshare_bot::bot::{HandlerContext, MessageHandler};
use studyshare_bot::config::Settings;
use studyshare_bot::delivery::{DeliveryManager, DeliveryOptions, RemoteFiles};
use studyshare_bot::files::drive::DriveError;
use studyshare_bot::files::{DownloadedFile, FileEntry, LocalFileIndex};
use studyshare_bot::stats::BotStats;
use studyshare_bot::store::Stores;
use studyshare_bot::transport::{
    ChatTransport, GroupAdmin, IncomingMessage, OutgoingDocument, TransportError,
};
use tempfile::TempDir;

const GROUP: &str = "120363000000000001@g.us";
const ADMIN: &str = "923000000001@s.whatsapp.net";
const MEMBER: &str = "923000000002@s.whatsapp.net";

#[derive(Default)]
struct FakeWhatsApp {
    texts: Mutex<Vec<(String, String)>>,
    documents: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
}

impl FakeWhatsApp {
    fn texts(&self) -> Vec<String> {
        self.texts
            .lock()
            .expect("lock")
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    fn last_text(&self) -> String {
        self.texts().pop().unwrap_or_default()
    }
}

#[async_trait]
impl ChatTransport for FakeWhatsApp {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        self.texts
            .lock()
            .expect("lock")
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        _chat_id: &str,
        document: OutgoingDocument,
    ) -> Result<(), TransportError> {
        self.documents.lock().expect("lock").push(document.file_name);
        Ok(())
    }

    async fn delete_message(
        &self,
        _chat_id: &str,
        message_id: &str,
        _sender: &str,
    ) -> Result<(), TransportError> {
        self.deleted.lock().expect("lock").push(message_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl GroupAdmin for FakeWhatsApp {
    async fn is_group_admin(&self, _group: &str, user: &str) -> Result<bool, TransportError> {
        Ok(user == ADMIN)
    }

    async fn remove_participant(&self, _group: &str, user: &str) -> Result<(), TransportError> {
        self.removed.lock().expect("lock").push(user.to_string());
        Ok(())
    }
}

struct NoDrive;

#[async_trait]
impl RemoteFiles for NoDrive {
    async fn search_by_subject_code(&self, _code: &str) -> Vec<FileEntry> {
        Vec::new()
    }

    async fn download(&self, entry: &FileEntry) -> Result<DownloadedFile, DriveError> {
        Err(DriveError::NotRemote(entry.name.clone()))
    }

    async fn cached_file_count(&self) -> usize {
        0
    }
}

struct Harness {
    handler: MessageHandler<FakeWhatsApp>,
    transport: Arc<FakeWhatsApp>,
    _data: TempDir,
    _share: TempDir,
}

fn harness() -> Harness {
    let data = TempDir::new().expect("data dir");
    let share = TempDir::new().expect("share dir");
    std::fs::create_dir_all(share.path().join("CS101")).expect("mkdir");
    std::fs::write(share.path().join("CS101/CS101 handout.pdf"), vec![1u8; 64]).expect("write");
    std::fs::write(share.path().join("CS101/CS101 quiz 1.pdf"), vec![2u8; 32]).expect("write");

    let settings = Arc::new(Settings {
        admin_numbers_str: Some("15550000000".to_string()),
        ..Settings::default()
    });
    let transport = Arc::new(FakeWhatsApp::default());
    let stats = Arc::new(BotStats::new());
    let local = LocalFileIndex::new(share.path());
    let remote: Arc<dyn RemoteFiles> = Arc::new(NoDrive);

    let delivery = DeliveryManager::new(
        transport.clone(),
        Arc::new(local.clone()),
        remote.clone(),
        stats.clone(),
        DeliveryOptions {
            send_delay: Duration::ZERO,
            ..DeliveryOptions::default()
        },
    );

    let handler = MessageHandler::new(HandlerContext {
        settings,
        transport: transport.clone(),
        delivery,
        local,
        remote,
        stores: Arc::new(Stores::open(data.path()).expect("stores")),
        stats,
        ai: Arc::new(AiClient::new(None, "gemini-test")),
    });

    Harness {
        handler,
        transport,
        _data: data,
        _share: share,
    }
}

fn group_message(sender: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        id: format!("MSG-{}", text.len()),
        chat_id: GROUP.to_string(),
        sender: sender.to_string(),
        push_name: String::new(),
        text: text.to_string(),
        is_group: true,
        is_from_me: false,
    }
}

#[tokio::test]
async fn subject_code_request_delivers_files() {
    let h = harness();
    h.handler
        .handle(&group_message(MEMBER, "CS101 handouts please"))
        .await;
    h.handler.delivery().wait_for_drain(GROUP).await;

    let documents = h.transport.documents.lock().expect("lock").clone();
    assert_eq!(
        documents,
        vec!["CS101 handout.pdf".to_string(), "CS101 quiz 1.pdf".to_string()]
    );
    assert!(h.transport.texts()[0].contains("Found 2 files"));
}

#[tokio::test]
async fn file_sharing_can_be_disabled_per_chat() {
    let h = harness();
    h.handler
        .handle(&group_message(ADMIN, "!filesharing off"))
        .await;
    assert!(h.transport.last_text().contains("Status changed to: *OFF*"));

    h.handler.handle(&group_message(MEMBER, "CS101")).await;
    h.handler.delivery().wait_for_drain(GROUP).await;
    assert!(h.transport.documents.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn admin_commands_are_refused_to_members() {
    let h = harness();
    h.handler.handle(&group_message(MEMBER, "!antilink off")).await;
    assert_eq!(h.transport.last_text(), "❌ Only admins can use this command.");

    h.handler.handle(&group_message(MEMBER, "!antilink")).await;
    assert!(h.transport.last_text().contains("Current Status: *ON*"));
}

#[tokio::test]
async fn group_commands_are_refused_in_direct_chats() {
    let h = harness();
    let dm = IncomingMessage {
        chat_id: "15550000000@s.whatsapp.net".to_string(),
        sender: "15550000000@s.whatsapp.net".to_string(),
        is_group: false,
        ..group_message(MEMBER, "!setwarnlimit 5")
    };
    h.handler.handle(&dm).await;
    assert_eq!(
        h.transport.last_text(),
        "❌ This command can only be used in groups."
    );
}

#[tokio::test]
async fn group_links_are_deleted_and_repeat_offenders_removed() {
    let h = harness();
    let link = "join https://chat.whatsapp.com/AbCdEf123";

    for round in 1..=3 {
        h.handler.handle(&group_message(MEMBER, link)).await;
        assert_eq!(h.transport.deleted.lock().expect("lock").len(), round);
    }

    let texts = h.transport.texts();
    assert!(texts.iter().any(|t| t.contains("📊 Warnings: 1/3")));
    assert!(texts.iter().any(|t| t.contains("📊 Warnings: 3/3")));
    assert_eq!(
        h.transport.removed.lock().expect("lock").clone(),
        vec![MEMBER.to_string()]
    );

    // Warnings start over after the removal
    h.handler.handle(&group_message(MEMBER, link)).await;
    assert!(h.transport.last_text().contains("📊 Warnings: 1/3"));
}

#[tokio::test]
async fn admins_may_post_links() {
    let h = harness();
    h.handler
        .handle(&group_message(ADMIN, "https://chat.whatsapp.com/AbCdEf123"))
        .await;
    assert!(h.transport.deleted.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn locked_member_is_removed_on_third_message() {
    let h = harness();
    h.handler
        .handle(&group_message(ADMIN, "!lock @923000000002"))
        .await;
    assert!(h.transport.last_text().contains("User Locked"));

    for text in ["one", "two"] {
        h.handler.handle(&group_message(MEMBER, text)).await;
    }
    assert_eq!(h.transport.deleted.lock().expect("lock").len(), 2);
    assert!(h.transport.removed.lock().expect("lock").is_empty());

    h.handler.handle(&group_message(MEMBER, "three")).await;
    assert_eq!(
        h.transport.removed.lock().expect("lock").clone(),
        vec![MEMBER.to_string()]
    );
}

#[tokio::test]
async fn own_status_texts_are_not_reprocessed() {
    let h = harness();
    let own = IncomingMessage {
        is_from_me: true,
        ..group_message(ADMIN, "📚 *Found 2 files* for CS101")
    };
    h.handler.handle(&own).await;
    h.handler.delivery().wait_for_drain(GROUP).await;
    assert!(h.transport.texts().is_empty());
    assert!(h.transport.documents.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn resume_without_code_shows_usage() {
    let h = harness();
    h.handler.handle(&group_message(MEMBER, ".resume")).await;
    assert_eq!(
        h.transport.last_text(),
        "❌ Please specify subject code\n\nUsage: !resume CS101"
    );
}

#[tokio::test]
async fn admins_inspect_and_clear_warnings() {
    let h = harness();
    for _ in 0..2 {
        h.handler
            .handle(&group_message(MEMBER, "https://chat.whatsapp.com/AbCdEf123"))
            .await;
    }

    h.handler.handle(&group_message(MEMBER, "!warnlist")).await;
    assert_eq!(h.transport.last_text(), "❌ Only admins can use this command.");

    h.handler
        .handle(&group_message(ADMIN, "!showwarn @923000000002"))
        .await;
    assert!(h.transport.last_text().contains("Warnings: 2 / 3"));

    h.handler.handle(&group_message(ADMIN, "!warnlist")).await;
    assert!(h.transport.last_text().contains("1. @923000000002 - *2*"));

    h.handler.handle(&group_message(ADMIN, "!resetwarn all")).await;
    assert!(h
        .transport
        .last_text()
        .contains("Cleared warnings for 1 users."));

    h.handler.handle(&group_message(ADMIN, "!warnlist")).await;
    assert_eq!(h.transport.last_text(), "✅ No active warnings in this group.");
}

#[tokio::test]
async fn admins_can_kick_by_number() {
    let h = harness();
    h.handler
        .handle(&group_message(MEMBER, "!kick 923000000001"))
        .await;
    assert!(h.transport.removed.lock().expect("lock").is_empty());

    h.handler
        .handle(&group_message(ADMIN, "!kick 923000000002"))
        .await;
    assert_eq!(
        h.transport.removed.lock().expect("lock").clone(),
        vec![MEMBER.to_string()]
    );
    assert_eq!(h.transport.last_text(), "👞 User kicked successfully.");
}

#[tokio::test]
async fn warning_limit_must_stay_in_range() {
    let h = harness();
    h.handler
        .handle(&group_message(ADMIN, "!setwarnlimit 11"))
        .await;
    assert_eq!(h.transport.last_text(), "❌ Limit must be between 1 and 10.");

    h.handler
        .handle(&group_message(ADMIN, "!setwarnlimit 0"))
        .await;
    assert_eq!(h.transport.last_text(), "❌ Limit must be between 1 and 10.");

    h.handler
        .handle(&group_message(ADMIN, "!setwarnlimit 2"))
        .await;
    assert!(h.transport.last_text().contains("New Limit: 2 warnings"));
}
