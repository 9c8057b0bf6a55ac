#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use convenios_storage::MemoryStorage;
use convenios_workflow::catalog::seed_builtin;
use convenios_workflow::documents::{FsDocumentStore, TemplateAssembler};
use convenios_workflow::identity::{hash_token, StaticAccount, StaticIdentityProvider};
use convenios_workflow::ports::{
    DocumentStore, Folder, Notification, Notifier, ServiceError, StoredDocument,
};
use convenios_workflow::{CreateAgreement, Workflow};
use tempfile::TempDir;
use time::macros::datetime;
use time::OffsetDateTime;

pub const ADMIN: Option<&str> = Some("admin-token");
pub const OWNER: Option<&str> = Some("owner-token");
pub const OTHER: Option<&str> = Some("other-token");

/// Filesystem store whose operations can be switched to fail.
pub struct FlakyDocumentStore {
    pub inner: FsDocumentStore,
    pub fail_upload: AtomicBool,
    pub fail_move: AtomicBool,
}

#[async_trait]
impl DocumentStore for FlakyDocumentStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<StoredDocument, ServiceError> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(ServiceError::new("document store", "quota exceeded"));
        }
        self.inner.upload(bytes, file_name).await
    }

    async fn move_to_folder(&self, file_id: &str, folder: Folder) -> Result<(), ServiceError> {
        if self.fail_move.load(Ordering::SeqCst) {
            return Err(ServiceError::new("document store", "move refused"));
        }
        self.inner.move_to_folder(file_id, folder).await
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::new("notifier", "mail relay unreachable"));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct Harness {
    pub workflow: Workflow<MemoryStorage>,
    pub storage: Arc<MemoryStorage>,
    pub documents: Arc<FlakyDocumentStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub now: Arc<Mutex<OffsetDateTime>>,
    pub dir: TempDir,
}

impl Harness {
    pub fn set_now(&self, at: OffsetDateTime) {
        *self.now.lock().unwrap() = at;
    }
}

fn account(id: &str, token: &str, role: &str, name: &str, email: Option<&str>) -> StaticAccount {
    StaticAccount {
        id: id.to_string(),
        token_sha256: hash_token(token),
        role: role.to_string(),
        display_name: Some(name.to_string()),
        email: email.map(str::to_string),
    }
}

pub async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new());
    seed_builtin(storage.as_ref()).await.unwrap();

    let identity = Arc::new(StaticIdentityProvider::new([
        account("admin-1", "admin-token", "admin", "Ana Admin", Some("admin@uni.test")),
        account("owner-1", "owner-token", "user", "Olga Owner", Some("owner@uni.test")),
        account("other-1", "other-token", "user", "Oscar Other", None),
    ]));
    let documents = Arc::new(FlakyDocumentStore {
        inner: FsDocumentStore::new(dir.path()),
        fail_upload: AtomicBool::new(false),
        fail_move: AtomicBool::new(false),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let now = Arc::new(Mutex::new(datetime!(2025-05-20 10:00:00 UTC)));
    let clock_now = now.clone();

    let workflow = Workflow::new(
        storage.clone(),
        identity,
        Arc::new(TemplateAssembler),
        documents.clone(),
        notifier.clone(),
    )
    .with_clock(Arc::new(move || *clock_now.lock().unwrap()));

    Harness {
        workflow,
        storage,
        documents,
        notifier,
        now,
        dir,
    }
}

pub fn request(title: &str) -> CreateAgreement {
    CreateAgreement {
        title: Some(title.to_string()),
        type_id: Some(1),
        content: Some(
            serde_json::json!({
                "entidad_nombre": "ACME S.A.",
                "representante_nombre": "Rita Rep",
            })
            .as_object()
            .cloned()
            .unwrap(),
        ),
    }
}
