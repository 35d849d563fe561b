use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category assigned by the membership service to each notification it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    Membership,
    Payment,
    Reservation,
    Promotion,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Notification owned and created by the remote membership service.
/// The client only mirrors these; field names follow the service's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipNotification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub category: NotificationCategory,
    pub priority: NotificationPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Reminder,
    Confirmation,
    Cancellation,
    Update,
}

/// Snapshot of the reservation that triggered a reminder, embedded so the
/// reminder stays meaningful after the booking list changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationSnapshot {
    pub reservation_id: String,
    pub activity_type: String,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ReservationSnapshot {
    /// Instant the reservation starts. Scheduled times are civil UTC.
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.scheduled_date.and_time(self.start_time).and_utc()
    }
}

/// Notification created locally by the reminder scheduler. Never synced to a
/// backend; persisted through the storage layer instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationReminder {
    pub id: String,
    pub kind: ReminderKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub reservation: ReservationSnapshot,
}

/// One upcoming booking as returned by the reservation query service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingReservation {
    pub reservation_id: String,
    pub activity_type: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_start_time: NaiveTime,
    pub scheduled_end_time: NaiveTime,
}

impl UpcomingReservation {
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.scheduled_date
            .and_time(self.scheduled_start_time)
            .and_utc()
    }

    pub fn snapshot(&self) -> ReservationSnapshot {
        ReservationSnapshot {
            reservation_id: self.reservation_id.clone(),
            activity_type: self.activity_type.clone(),
            scheduled_date: self.scheduled_date,
            start_time: self.scheduled_start_time,
            end_time: self.scheduled_end_time,
        }
    }
}

/// Originating subsystem of a unified item. Ordering matters: the variant
/// order is half of the aggregator's deterministic tiebreak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSource {
    Membership,
    Reservation,
}

impl std::fmt::Display for NotificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationSource::Membership => write!(f, "membership"),
            NotificationSource::Reservation => write!(f, "reservation"),
        }
    }
}

/// Item in the unified view: one of the two concrete notification shapes,
/// tagged at ingestion. Consumers match on the variant rather than probing
/// fields.
#[derive(Debug, Clone, PartialEq)]
pub enum UnifiedNotification {
    Membership(MembershipNotification),
    Reservation(ReservationReminder),
}

impl UnifiedNotification {
    pub fn source(&self) -> NotificationSource {
        match self {
            UnifiedNotification::Membership(_) => NotificationSource::Membership,
            UnifiedNotification::Reservation(_) => NotificationSource::Reservation,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            UnifiedNotification::Membership(n) => &n.id,
            UnifiedNotification::Reservation(r) => &r.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            UnifiedNotification::Membership(n) => &n.title,
            UnifiedNotification::Reservation(r) => &r.title,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UnifiedNotification::Membership(n) => &n.message,
            UnifiedNotification::Reservation(r) => &r.message,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            UnifiedNotification::Membership(n) => n.timestamp,
            UnifiedNotification::Reservation(r) => r.timestamp,
        }
    }

    pub fn read(&self) -> bool {
        match self {
            UnifiedNotification::Membership(n) => n.read,
            UnifiedNotification::Reservation(r) => r.read,
        }
    }

    /// Category of a membership item; reservation reminders carry none.
    pub fn category(&self) -> Option<NotificationCategory> {
        match self {
            UnifiedNotification::Membership(n) => Some(n.category),
            UnifiedNotification::Reservation(_) => None,
        }
    }
}

/// Transient record handed to the display sink when a reminder fires.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub title: String,
    pub message: String,
}
