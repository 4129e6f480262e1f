//! Single-slot status notifications
//!
//! Every post replaces the slot outright. Expiry is a timestamp stored with
//! the notification and checked whenever the slot is read, so a superseded
//! status can never be dismissed by a stale timer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Status of the operation shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Pending,
    Success,
    Error,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Pending => write!(f, "pending"),
            StatusKind::Success => write!(f, "success"),
            StatusKind::Error => write!(f, "error"),
        }
    }
}

/// Auto-dismiss delays
#[derive(Debug, Clone, Copy)]
pub struct StatusConfig {
    pub success_ttl: Duration,
    pub error_ttl: Duration,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            success_ttl: Duration::from_secs(2),
            error_ttl: Duration::from_secs(3),
        }
    }
}

impl StatusConfig {
    fn ttl(&self, kind: StatusKind) -> Option<Duration> {
        match kind {
            StatusKind::Pending => None,
            StatusKind::Success => Some(self.success_ttl),
            StatusKind::Error => Some(self.error_ttl),
        }
    }
}

/// A posted status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Increases with every post
    pub seq: u64,
    pub kind: StatusKind,
    pub message: String,
    pub posted_at: Instant,
    /// `None` while pending; pending statuses stay until replaced
    pub expires_at: Option<Instant>,
}

impl Notification {
    pub fn is_visible_at(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

/// Holds the one status currently on display.
#[derive(Debug, Default)]
pub struct StatusBoard {
    config: StatusConfig,
    slot: RwLock<Option<Notification>>,
    seq: AtomicU64,
}

impl StatusBoard {
    pub fn new(config: StatusConfig) -> Self {
        Self {
            config,
            slot: RwLock::new(None),
            seq: AtomicU64::new(0),
        }
    }

    pub fn pending(&self, message: impl Into<String>) -> u64 {
        self.post(StatusKind::Pending, message)
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.post(StatusKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.post(StatusKind::Error, message)
    }

    pub fn post(&self, kind: StatusKind, message: impl Into<String>) -> u64 {
        self.post_at(kind, message, Instant::now())
    }

    /// Replace the slot, returning the new notification's sequence number
    pub fn post_at(&self, kind: StatusKind, message: impl Into<String>, now: Instant) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let notification = Notification {
            seq,
            kind,
            message: message.into(),
            posted_at: now,
            expires_at: self.config.ttl(kind).map(|ttl| now + ttl),
        };
        tracing::debug!(seq, status = %kind, message = %notification.message, "Status posted");
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(notification);
        seq
    }

    /// The visible status, if any
    pub fn current(&self) -> Option<Notification> {
        self.current_at(Instant::now())
    }

    pub fn current_at(&self, now: Instant) -> Option<Notification> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|n| n.is_visible_at(now))
            .cloned()
    }

    /// The last posted status regardless of expiry
    pub fn last(&self) -> Option<Notification> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clear the slot only if `seq` is still the one on display
    pub fn dismiss(&self, seq: u64) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(current) if current.seq == seq => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}
