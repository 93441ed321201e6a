//! Fakes for the lifecycle ports

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tabula_lifecycle::{Clock, FileStore, FileStoreError, Notifier, StatusMessage, StoredFile};
use tokio::sync::Notify;

/// Clock frozen at a date the test controls
#[derive(Debug)]
pub struct FixedClock {
    today: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        *self.today.lock() = today;
    }

    pub fn advance_days(&self, days: u64) {
        let mut today = self.today.lock();
        *today = today.checked_add_days(Days::new(days)).unwrap();
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock()
    }
}

/// Notifier that keeps every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<StatusMessage>>,
    undeliverable: AtomicBool,
    changed: Notify,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every delivery as failed (messages are still recorded)
    pub fn fail_deliveries(&self, fail: bool) {
        self.undeliverable.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<StatusMessage> {
        self.sent.lock().clone()
    }

    /// Wait until at least `count` messages arrived; `false` on timeout
    pub async fn wait_for(&self, count: usize) -> bool {
        let wait = async {
            loop {
                let changed = self.changed.notified();
                if self.sent.lock().len() >= count {
                    return;
                }
                changed.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait).await.is_ok()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_status_change(&self, to: &str, subject: &str, body: &str) -> bool {
        self.sent.lock().push(StatusMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        self.changed.notify_waiters();
        !self.undeliverable.load(Ordering::SeqCst)
    }
}

/// A file held by [`MemoryFileStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub folder: String,
    pub name: String,
    pub mime_type: String,
    pub size: usize,
}

/// File store keeping metadata only
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<Vec<UploadedFile>>,
    deleted: Mutex<Vec<String>>,
    next_id: AtomicU64,
    reject_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link format of stored files
    pub fn url_for(id: &str) -> String {
        format!("https://drive.google.com/file/d/{id}/view")
    }

    pub fn reject_uploads(&self, reject: bool) {
        self.reject_uploads.store(reject, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Files currently stored
    pub fn files(&self) -> Vec<UploadedFile> {
        self.files.lock().clone()
    }

    /// Ids passed to `delete_file`, in order
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn upload_file(
        &self,
        folder: &str,
        name: &str,
        mime_type: &str,
        content: Vec<u8>,
    ) -> Result<StoredFile, FileStoreError> {
        if self.reject_uploads.load(Ordering::SeqCst) {
            return Err(FileStoreError::Rejected(name.to_string()));
        }
        let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.files.lock().push(UploadedFile {
            id: id.clone(),
            folder: folder.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: content.len(),
        });
        Ok(StoredFile {
            url: Self::url_for(&id),
            id,
        })
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), FileStoreError> {
        self.deleted.lock().push(file_id.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(FileStoreError::Unavailable("delete failed".to_string()));
        }
        let mut files = self.files.lock();
        let before = files.len();
        files.retain(|file| file.id != file_id);
        if files.len() == before {
            return Err(FileStoreError::NotFound(file_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[tokio::test]
    async fn notifier_waits_for_messages() {
        let notifier = std::sync::Arc::new(RecordingNotifier::new());
        let sender = std::sync::Arc::clone(&notifier);
        tokio::spawn(async move {
            sender.send_status_change("a@b.co", "s", "b").await;
        });
        assert!(notifier.wait_for(1).await);
        assert_eq!(notifier.sent()[0].to, "a@b.co");
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let files = MemoryFileStore::new();
        let stored = files
            .upload_file("u-1", "a.pdf", "application/pdf", vec![1, 2])
            .await
            .unwrap();
        assert_eq!(stored.url, "https://drive.google.com/file/d/file-1/view");
        files.delete_file(&stored.id).await.unwrap();
        assert!(files.files().is_empty());
        assert!(matches!(files.delete_file("nope").await, Err(FileStoreError::NotFound(_))));
    }
}
