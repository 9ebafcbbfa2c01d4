use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Event Kind ───────────────────────────────────────────────────

/// Server-push notification categories a bot can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    GroupMessage,
    GroupInvite,
    PrivateMessage,
    Post,
    PostStatus,
    TipProgress,
    TipReceived,
    KxCompleted,
}

impl EventKind {
    pub const ALL: [Self; 8] = [
        Self::GroupMessage,
        Self::GroupInvite,
        Self::PrivateMessage,
        Self::Post,
        Self::PostStatus,
        Self::TipProgress,
        Self::TipReceived,
        Self::KxCompleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GroupMessage => "group_message",
            Self::GroupInvite => "group_invite",
            Self::PrivateMessage => "private_message",
            Self::Post => "post",
            Self::PostStatus => "post_status",
            Self::TipProgress => "tip_progress",
            Self::TipReceived => "tip_received",
            Self::KxCompleted => "kx_completed",
        }
    }

    /// Logging subsystem conventionally used for this kind.
    pub fn subsystem(self) -> &'static str {
        match self {
            Self::GroupMessage => "GC",
            Self::GroupInvite => "INVT",
            Self::PrivateMessage => "PM",
            Self::Post => "POST",
            Self::PostStatus => "PSTS",
            Self::TipProgress => "TIP",
            Self::TipReceived => "TIPR",
            Self::KxCompleted => "KX",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownEventKind(s.to_owned()))
    }
}

// ─── Payloads ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcReceivedMsg {
    pub uid: String,
    pub nick: String,
    pub gc_alias: String,
    pub gc_id: String,
    pub message: String,
    pub timestamp_ms: i64,
    pub sequence_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedGcInvite {
    pub inviter_uid: String,
    pub inviter_nick: String,
    pub invite_id: u64,
    pub gc_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedPm {
    pub uid: String,
    pub nick: String,
    pub message: String,
    pub timestamp_ms: i64,
    pub sequence_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedPost {
    pub relayer_uid: String,
    pub post_id: String,
    pub author_id: String,
    pub author_nick: String,
    pub title: String,
    pub sequence_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedPostStatus {
    pub relayer_uid: String,
    pub post_id: String,
    pub status_from: String,
    pub status_from_nick: String,
    pub comment: String,
    pub sequence_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipProgressEvent {
    pub uid: String,
    pub nick: String,
    pub amount_matoms: i64,
    pub completed: bool,
    pub attempt: u32,
    #[serde(default)]
    pub attempt_err: String,
    pub will_retry: bool,
    pub sequence_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedTip {
    pub uid: String,
    pub amount_matoms: i64,
    pub sequence_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KxCompleted {
    pub uid: String,
    pub nick: String,
    pub sequence_id: u64,
}

// ─── Envelope ─────────────────────────────────────────────────────

/// One decoded item from a transport stream.
///
/// Serialized with a `kind` tag, e.g.
/// `{"kind":"tip_received","uid":"ab..","amount_matoms":1000,"sequence_id":7}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    GroupMessage(GcReceivedMsg),
    GroupInvite(ReceivedGcInvite),
    PrivateMessage(ReceivedPm),
    Post(ReceivedPost),
    PostStatus(ReceivedPostStatus),
    TipProgress(TipProgressEvent),
    TipReceived(ReceivedTip),
    KxCompleted(KxCompleted),
}

impl Notification {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::GroupMessage(_) => EventKind::GroupMessage,
            Self::GroupInvite(_) => EventKind::GroupInvite,
            Self::PrivateMessage(_) => EventKind::PrivateMessage,
            Self::Post(_) => EventKind::Post,
            Self::PostStatus(_) => EventKind::PostStatus,
            Self::TipProgress(_) => EventKind::TipProgress,
            Self::TipReceived(_) => EventKind::TipReceived,
            Self::KxCompleted(_) => EventKind::KxCompleted,
        }
    }
}

/// A typed payload that can be pulled out of a [`Notification`].
///
/// Decoding hands back the original notification on a kind mismatch so the
/// caller can report what it actually received.
pub trait Event: TryFrom<Notification, Error = Notification> + Send + 'static {
    const KIND: EventKind;

    /// Sequence number to acknowledge, for kinds the server tracks.
    fn sequence_id(&self) -> Option<u64>;
}

macro_rules! notification_event {
    (@impl $payload:ty, $variant:ident, $seq:expr) => {
        impl TryFrom<Notification> for $payload {
            type Error = Notification;

            fn try_from(n: Notification) -> Result<Self, Self::Error> {
                match n {
                    Notification::$variant(ev) => Ok(ev),
                    other => Err(other),
                }
            }
        }

        impl From<$payload> for Notification {
            fn from(ev: $payload) -> Self {
                Notification::$variant(ev)
            }
        }

        impl Event for $payload {
            const KIND: EventKind = EventKind::$variant;

            fn sequence_id(&self) -> Option<u64> {
                ($seq)(self)
            }
        }
    };
    ($payload:ty, $variant:ident) => {
        notification_event!(@impl $payload, $variant, |ev: &$payload| Some(ev.sequence_id));
    };
    ($payload:ty, $variant:ident, unsequenced) => {
        notification_event!(@impl $payload, $variant, |_: &$payload| None);
    };
}

notification_event!(GcReceivedMsg, GroupMessage);
notification_event!(ReceivedGcInvite, GroupInvite, unsequenced);
notification_event!(ReceivedPm, PrivateMessage);
notification_event!(ReceivedPost, Post);
notification_event!(ReceivedPostStatus, PostStatus);
notification_event!(TipProgressEvent, TipProgress);
notification_event!(ReceivedTip, TipReceived);
notification_event!(KxCompleted, KxCompleted);
