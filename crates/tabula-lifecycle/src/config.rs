//! Lifecycle configuration

use serde::{Deserialize, Serialize};

/// File types accepted for upload: PDF, DOCX, XLSX, JPEG, PNG
pub const DEFAULT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "image/jpeg",
    "image/png",
];

/// Upload and notification policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// MIME types accepted by `upload`
    pub allowed_mime_types: Vec<String>,
    /// Notify owners when a reviewer changes a status
    pub notify_on_review: bool,
    /// Notify owners when the sweep expires a document
    pub notify_on_expiry: bool,
}

impl LifecycleConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a different allowlist
    #[must_use]
    pub fn with_allowed_mime_types<S: Into<String>>(
        mut self,
        mime_types: impl IntoIterator<Item = S>,
    ) -> Self {
        self.allowed_mime_types = mime_types.into_iter().map(Into::into).collect();
        self
    }

    /// With notifications on or off
    #[inline]
    #[must_use]
    pub fn with_notifications(mut self, on_review: bool, on_expiry: bool) -> Self {
        self.notify_on_review = on_review;
        self.notify_on_expiry = on_expiry;
        self
    }

    /// Whether `mime_type` may be uploaded (case-insensitive)
    #[must_use]
    pub fn accepts_mime_type(&self, mime_type: &str) -> bool {
        let mime_type = mime_type.trim();
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime_type))
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            allowed_mime_types: DEFAULT_MIME_TYPES.iter().map(ToString::to_string).collect(),
            notify_on_review: true,
            notify_on_expiry: true,
        }
    }
}
