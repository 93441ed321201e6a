//! Tabula Lifecycle - what happens to an uploaded document
//!
//! ```text
//!            Upload                 Review(outcome)
//!   (any) ----------> Sin revisar ------------------> Cumplido | Rechazado
//!                                                     Expirado | No aplica
//!                      Expire (window passed)
//!   Cumplido --------------------------------------> Expirado
//! ```
//!
//! Collaborators outside the spreadsheet (file storage, mail, the calendar)
//! are ports in [`ports`]; notifications are fire-and-forget.

pub mod config;
pub mod error;
pub mod expiration;
pub mod notify;
pub mod ports;
pub mod service;
pub mod transitions;

pub use config::LifecycleConfig;
pub use error::LifecycleError;
pub use expiration::{expiration_date, is_expired, ExpirationSweep, SweepReport};
pub use notify::{status_change_message, Notifications, StatusMessage};
pub use ports::{
    file_id_from_url, Clock, DisabledFileStore, FileStore, FileStoreError, LogNotifier, Notifier,
    StoredFile, SystemClock,
};
pub use service::{DocumentService, DocumentView, ReviewUpdate, Statistics, UploadRequest};
pub use transitions::{allowed_transitions, validate_transition, Trigger};

/// Result alias for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
