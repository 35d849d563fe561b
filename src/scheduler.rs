use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::models::{DisplayMessage, ReminderKind, ReservationReminder, UpcomingReservation};
use crate::reservations::ReservationService;
use crate::store::ReminderStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Lead time at which a reminder fires. The windows are contiguous, so a
/// delayed poll lands in the next window down instead of skipping a lead
/// time entirely; the fired-set keeps any window from firing twice.
#[derive(Debug, Clone, Copy)]
pub struct ReminderThreshold {
    pub id: &'static str,
    pub upper_hours: f64,
    pub lower_hours: f64,
    pub label: &'static str,
}

pub const THRESHOLDS: [ReminderThreshold; 3] = [
    ReminderThreshold {
        id: "24h",
        upper_hours: 24.0,
        lower_hours: 2.0,
        label: "24 hours",
    },
    ReminderThreshold {
        id: "2h",
        upper_hours: 2.0,
        lower_hours: 0.5,
        label: "2 hours",
    },
    ReminderThreshold {
        id: "30m",
        upper_hours: 0.5,
        lower_hours: 0.0,
        label: "30 minutes",
    },
];

/// Polls upcoming reservations on a fixed cadence and turns time-to-event
/// thresholds into reservation reminders, at most once per
/// (reservation, threshold) pair.
pub struct ReminderScheduler {
    service: Arc<dyn ReservationService>,
    store: Arc<ReminderStore>,
    display: mpsc::Sender<DisplayMessage>,
    user_id: String,
    poll_interval: Duration,
    fired: HashSet<(String, &'static str)>,
}

impl ReminderScheduler {
    pub fn new(
        service: Arc<dyn ReservationService>,
        store: Arc<ReminderStore>,
        display: mpsc::Sender<DisplayMessage>,
        user_id: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            service,
            store,
            display,
            user_id: user_id.into(),
            poll_interval,
            fired: HashSet::new(),
        }
    }

    /// Run until the shutdown signal fires. The first cycle runs
    /// immediately; a fetch in flight at shutdown is left to resolve but its
    /// result is discarded.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<()> {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            "Starting reminder scheduler"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut shutdown => {
                    info!("Received shutdown signal, stopping reminder scheduler");
                    break;
                }
            }

            let service = Arc::clone(&self.service);
            let user_id = self.user_id.clone();
            let timer = metrics::REMINDER_CYCLE_TIME.start_timer();

            tokio::select! {
                result = service.get_upcoming(&user_id) => {
                    match result {
                        Ok(upcoming) => {
                            let fired = self.process(&upcoming, Utc::now()).await;
                            if fired > 0 {
                                info!(fired, upcoming = upcoming.len(), "Reminder cycle complete");
                            }
                        }
                        Err(e) => {
                            // Skip the cycle; the next tick retries unconditionally
                            metrics::RESERVATION_FETCH_FAILURES.inc();
                            debug!(error = %e, "Reservation lookup failed, skipping cycle");
                        }
                    }
                    timer.observe_duration();
                }
                _ = &mut shutdown => {
                    info!("Received shutdown signal, discarding in-flight reservation lookup");
                    break;
                }
            }
        }

        info!("Reminder scheduler stopped");
        Ok(())
    }

    /// One poll cycle over a fetched reservation list. Returns how many
    /// reminders fired. Each reminder is persisted into the store before its
    /// display message is emitted, so a reload right after the toast is
    /// guaranteed to include it.
    async fn process(&mut self, upcoming: &[UpcomingReservation], now: DateTime<Utc>) -> usize {
        let mut fired_count = 0;

        for reservation in upcoming {
            let hours_until =
                (reservation.starts_at() - now).num_seconds() as f64 / 3600.0;
            if hours_until <= 0.0 {
                continue;
            }

            for threshold in THRESHOLDS {
                if hours_until <= threshold.lower_hours || hours_until > threshold.upper_hours {
                    continue;
                }

                // Check-and-set before creating anything: window membership
                // alone double-fires under delayed polling or clock drift.
                let key = (reservation.reservation_id.clone(), threshold.id);
                if !self.fired.insert(key) {
                    continue;
                }

                let reminder = build_reminder(reservation, &threshold, now);
                let display = DisplayMessage {
                    title: reminder.title.clone(),
                    message: reminder.message.clone(),
                };

                self.store.add(reminder);
                metrics::REMINDERS_FIRED.inc();
                fired_count += 1;

                debug!(
                    reservation_id = %reservation.reservation_id,
                    threshold = threshold.id,
                    hours_until,
                    "Fired reservation reminder"
                );

                if let Err(e) = self.display.send(display).await {
                    warn!(error = %e, "Display sink unavailable, reminder persisted anyway");
                }
            }
        }

        fired_count
    }
}

fn build_reminder(
    reservation: &UpcomingReservation,
    threshold: &ReminderThreshold,
    now: DateTime<Utc>,
) -> ReservationReminder {
    ReservationReminder {
        id: Uuid::new_v4().to_string(),
        kind: ReminderKind::Reminder,
        title: "Upcoming reservation".to_string(),
        message: format!(
            "Your {} reservation on {} at {} starts in about {}",
            reservation.activity_type,
            reservation.scheduled_date,
            reservation.scheduled_start_time,
            threshold.label
        ),
        timestamp: now,
        read: false,
        reservation: reservation.snapshot(),
    }
}
