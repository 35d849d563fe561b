use std::sync::Arc;

use crate::models::{NotificationCategory, NotificationSource, UnifiedNotification};
use crate::store::{MembershipStore, ReminderStore};

/// Source filter for the unified projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter {
    All,
    Membership,
    Reservation,
}

/// Merged projection over the membership store and the reminder store.
/// Projections are pure reads; mutations are routed back to the store that
/// owns the item, identified by its source tag.
pub struct UnifiedView {
    membership: Arc<MembershipStore>,
    reminders: Arc<ReminderStore>,
}

impl UnifiedView {
    pub fn new(membership: Arc<MembershipStore>, reminders: Arc<ReminderStore>) -> Self {
        Self {
            membership,
            reminders,
        }
    }

    pub fn snapshot(&self) -> Vec<UnifiedNotification> {
        self.filtered(SourceFilter::All, None)
    }

    /// Filtered projection. The category filter applies to membership items
    /// only; reservation reminders carry no category and drop out when one
    /// is active.
    pub fn filtered(
        &self,
        source: SourceFilter,
        category: Option<NotificationCategory>,
    ) -> Vec<UnifiedNotification> {
        let mut items: Vec<UnifiedNotification> = Vec::new();

        if matches!(source, SourceFilter::All | SourceFilter::Membership) {
            items.extend(
                self.membership
                    .items()
                    .into_iter()
                    .map(UnifiedNotification::Membership),
            );
        }
        if matches!(source, SourceFilter::All | SourceFilter::Reservation) {
            items.extend(
                self.reminders
                    .items()
                    .into_iter()
                    .map(UnifiedNotification::Reservation),
            );
        }

        if let Some(category) = category {
            items.retain(|item| item.category() == Some(category));
        }

        // Unread first, newest first within each partition, (source, id)
        // tiebreak so equal timestamps order reproducibly
        items.sort_by(|a, b| {
            a.read()
                .cmp(&b.read())
                .then_with(|| b.timestamp().cmp(&a.timestamp()))
                .then_with(|| a.source().cmp(&b.source()))
                .then_with(|| a.id().cmp(b.id()))
        });

        items
    }

    pub fn unread_count(&self) -> usize {
        self.membership.unread_count() + self.reminders.unread_count()
    }

    pub fn mark_read(&self, source: NotificationSource, id: &str) {
        match source {
            NotificationSource::Membership => self.membership.mark_read(&[id.to_string()]),
            NotificationSource::Reservation => self.reminders.mark_read(&[id.to_string()]),
        }
    }

    pub fn delete(&self, source: NotificationSource, id: &str) {
        match source {
            NotificationSource::Membership => self.membership.delete(id),
            NotificationSource::Reservation => self.reminders.delete(id),
        }
    }

    pub fn mark_all_read(&self) {
        self.membership.mark_all_read();
        self.reminders.mark_all_read();
    }

    pub fn clear_all(&self) {
        self.membership.clear();
        self.reminders.clear();
    }
}
