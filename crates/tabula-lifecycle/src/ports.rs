//! Collaborators outside the spreadsheet
//!
//! File storage and mail are only specified at this boundary; deployments
//! plug in their own implementations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};

/// A file accepted by the [`FileStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Store-specific id, used for deletion
    pub id: String,
    /// Link written to the document row
    pub url: String,
}

/// File storage failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileStoreError {
    /// The store refused the file
    #[error("upload rejected: {0}")]
    Rejected(String),

    /// No such file
    #[error("file not found: {0}")]
    NotFound(String),

    /// The store could not be reached
    #[error("file store unavailable: {0}")]
    Unavailable(String),
}

impl FileStoreError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Blob storage for uploaded files
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store `content` as `name` inside `folder`
    async fn upload_file(
        &self,
        folder: &str,
        name: &str,
        mime_type: &str,
        content: Vec<u8>,
    ) -> Result<StoredFile, FileStoreError>;

    /// Remove a stored file
    async fn delete_file(&self, file_id: &str) -> Result<(), FileStoreError>;
}

/// Outbound status-change notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message; `false` when it could not be sent
    async fn send_status_change(&self, to: &str, subject: &str, body: &str) -> bool;
}

/// Source of "today"
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// Current calendar date
    fn today(&self) -> NaiveDate;

    /// Current instant; midnight UTC of [`Clock::today`] unless overridden
    fn now(&self) -> DateTime<Utc> {
        self.today().and_time(NaiveTime::MIN).and_utc()
    }
}

/// Calendar date in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Notifier that only logs, for deployments without a mail transport
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_status_change(&self, to: &str, subject: &str, _body: &str) -> bool {
        info!(to, subject, "status change notification");
        true
    }
}

/// File store for deployments that only review and report
///
/// Every upload is rejected; deletes succeed without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFileStore;

#[async_trait]
impl FileStore for DisabledFileStore {
    async fn upload_file(
        &self,
        _folder: &str,
        name: &str,
        _mime_type: &str,
        _content: Vec<u8>,
    ) -> Result<StoredFile, FileStoreError> {
        Err(FileStoreError::Rejected(format!("{name}: no file store configured")))
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), FileStoreError> {
        debug!(file_id, "file store disabled, delete skipped");
        Ok(())
    }
}

/// File id embedded in a stored-file link
///
/// Understands `.../d/<id>/...` paths and `?id=<id>` queries.
#[must_use]
pub fn file_id_from_url(url: &str) -> Option<&str> {
    if let Some((_, rest)) = url.split_once("/d/") {
        let id = rest.split(['/', '?', '#']).next().unwrap_or_default();
        return (!id.is_empty()).then_some(id);
    }
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("id="))
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_from_view_link() {
        assert_eq!(
            file_id_from_url("https://drive.google.com/file/d/1AbC_xyz/view?usp=drivesdk"),
            Some("1AbC_xyz")
        );
        assert_eq!(file_id_from_url("https://drive.google.com/file/d/1AbC"), Some("1AbC"));
    }

    #[test]
    fn file_id_from_query() {
        assert_eq!(
            file_id_from_url("https://drive.google.com/open?id=42&authuser=0"),
            Some("42")
        );
    }

    #[test]
    fn no_file_id() {
        assert_eq!(file_id_from_url(""), None);
        assert_eq!(file_id_from_url("https://example.com/file.pdf"), None);
        assert_eq!(file_id_from_url("https://drive.google.com/file/d//view"), None);
    }

    #[tokio::test]
    async fn disabled_file_store_rejects_uploads() {
        let err = DisabledFileStore
            .upload_file("u-1", "a.pdf", "application/pdf", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FileStoreError::Rejected(_)));
        assert!(DisabledFileStore.delete_file("f-1").await.is_ok());
    }

    #[test]
    fn clock_instant_defaults_to_midnight() {
        struct NewYear;
        impl Clock for NewYear {
            fn today(&self) -> NaiveDate {
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
            }
        }
        assert_eq!(NewYear.now().timestamp_millis(), 1_704_067_200_000);
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.send_status_change("a@b.co", "subject", "body").await);
    }
}
