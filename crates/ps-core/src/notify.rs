//! Notification scheduling
//!
//! Computes fire-times for inspection lifecycle events and hands them to the
//! host's notification sink. The scheduler keeps its own index of issued
//! identifiers, written synchronously on every change, so cancellation
//! survives a crash between schedule and fire.

use crate::persist::{KeyValueStore, NOTIFICATION_PREFERENCES_KEY, SCHEDULED_NOTIFICATIONS_KEY};
use crate::{CoreResult, SignatureParty};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A request handed to the host's notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    /// Inspection the notification is about; echoed back in taps.
    pub inspection_id: String,
    /// Absolute fire-time, or `None` for immediate delivery.
    pub trigger: Option<DateTime<Utc>>,
}

/// Host-supplied notification delivery collaborator.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Returns an opaque identifier for later cancellation.
    async fn schedule(&self, request: NotificationRequest) -> CoreResult<String>;
    /// Cancelling an unknown identifier is not an error.
    async fn cancel(&self, notification_id: &str) -> CoreResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Reminder,
    DueDate,
    Completion,
    TenantAction,
}

/// How far ahead of the due date a reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderLead {
    #[serde(rename = "1_day")]
    OneDay,
    #[serde(rename = "3_days")]
    ThreeDays,
    #[serde(rename = "1_week")]
    OneWeek,
}

impl ReminderLead {
    pub fn duration(self) -> Duration {
        match self {
            ReminderLead::OneDay => Duration::days(1),
            ReminderLead::ThreeDays => Duration::days(3),
            ReminderLead::OneWeek => Duration::weeks(1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReminderLead::OneDay => "1 day",
            ReminderLead::ThreeDays => "3 days",
            ReminderLead::OneWeek => "1 week",
        }
    }
}

/// Persisted preferences blob (`@notification_preferences`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub enabled: bool,
    pub reminders: bool,
    pub due_date_alerts: bool,
    pub completion_alerts: bool,
    pub reminder_lead: ReminderLead,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            reminders: true,
            due_date_alerts: true,
            completion_alerts: true,
            reminder_lead: ReminderLead::OneDay,
        }
    }
}

/// One entry of the scheduled-notification index
/// (`@scheduled_notifications`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotification {
    pub notification_id: String,
    pub inspection_id: String,
    pub kind: NotificationKind,
    pub scheduled_at: DateTime<Utc>,
}

/// Reacts to inspection lifecycle transitions with scheduled or immediate
/// notifications.
pub struct NotificationScheduler<S, K> {
    sink: S,
    kv: K,
    preferences: NotificationPreferences,
    index: Vec<ScheduledNotification>,
}

impl<S, K> NotificationScheduler<S, K>
where
    S: NotificationSink,
    K: KeyValueStore,
{
    /// Restore preferences and the pending index from the host's store.
    pub async fn load(sink: S, kv: K) -> CoreResult<Self> {
        let preferences = match kv.get(NOTIFICATION_PREFERENCES_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|error| {
                warn!(%error, "unreadable notification preferences; using defaults");
                NotificationPreferences::default()
            }),
            None => NotificationPreferences::default(),
        };

        let index = match kv.get(SCHEDULED_NOTIFICATIONS_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|error| {
                warn!(%error, "unreadable notification index; starting empty");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Ok(Self {
            sink,
            kv,
            preferences,
            index,
        })
    }

    pub fn preferences(&self) -> &NotificationPreferences {
        &self.preferences
    }

    pub async fn set_preferences(&mut self, preferences: NotificationPreferences) -> CoreResult<()> {
        self.preferences = preferences;
        let bytes = serde_json::to_vec(&self.preferences)?;
        self.kv.put(NOTIFICATION_PREFERENCES_KEY, bytes).await
    }

    /// Pending entries for an inspection.
    pub fn scheduled_for(&self, inspection_id: &str) -> Vec<&ScheduledNotification> {
        self.index
            .iter()
            .filter(|n| n.inspection_id == inspection_id)
            .collect()
    }

    /// Schedule a reminder ahead of the due date. Returns `None` without
    /// scheduling when reminders are off or the fire-time is already past.
    pub async fn schedule_reminder(
        &mut self,
        inspection_id: &str,
        due_date: DateTime<Utc>,
        lead: ReminderLead,
    ) -> CoreResult<Option<String>> {
        if !self.preferences.enabled || !self.preferences.reminders {
            return Ok(None);
        }

        let fire_at = due_date - lead.duration();
        if fire_at <= Utc::now() {
            debug!(inspection_id, "reminder fire-time already past; skipped");
            return Ok(None);
        }

        let request = NotificationRequest {
            title: "Inspection Reminder".to_string(),
            body: format!("An inspection is due in {}.", lead.label()),
            inspection_id: inspection_id.to_string(),
            trigger: Some(fire_at),
        };
        let id = self
            .record(inspection_id, NotificationKind::Reminder, fire_at, request)
            .await?;
        Ok(Some(id))
    }

    /// Schedule an alert for 09:00 local time on the due date. Skipped when
    /// that instant is already past.
    pub async fn schedule_due_date_alert(
        &mut self,
        inspection_id: &str,
        due_date: DateTime<Utc>,
    ) -> CoreResult<Option<String>> {
        if !self.preferences.enabled || !self.preferences.due_date_alerts {
            return Ok(None);
        }

        let fire_at = match nine_am_local(due_date) {
            Some(instant) => instant,
            None => return Ok(None),
        };
        if fire_at <= Utc::now() {
            debug!(inspection_id, "due-date alert fire-time already past; skipped");
            return Ok(None);
        }

        let request = NotificationRequest {
            title: "Inspection Due Today".to_string(),
            body: "An inspection is due today.".to_string(),
            inspection_id: inspection_id.to_string(),
            trigger: Some(fire_at),
        };
        let id = self
            .record(inspection_id, NotificationKind::DueDate, fire_at, request)
            .await?;
        Ok(Some(id))
    }

    /// Immediate, fire-and-forget completion notice.
    pub async fn send_completion(
        &self,
        inspection_id: &str,
        signed_by: SignatureParty,
    ) -> CoreResult<()> {
        if !self.preferences.enabled || !self.preferences.completion_alerts {
            return Ok(());
        }

        let request = NotificationRequest {
            title: "Inspection Completed".to_string(),
            body: format!("The {signed_by} has signed the inspection report."),
            inspection_id: inspection_id.to_string(),
            trigger: None,
        };
        self.sink.schedule(request).await?;
        Ok(())
    }

    /// Immediate notice that the tenant must act.
    pub async fn send_tenant_action_required(
        &self,
        inspection_id: &str,
        message: &str,
    ) -> CoreResult<()> {
        if !self.preferences.enabled {
            return Ok(());
        }

        let request = NotificationRequest {
            title: "Action Required".to_string(),
            body: message.to_string(),
            inspection_id: inspection_id.to_string(),
            trigger: None,
        };
        self.sink.schedule(request).await?;
        Ok(())
    }

    /// Cancel every scheduled notification for an inspection. Idempotent;
    /// individual sink failures are logged, the index entry is dropped
    /// regardless.
    pub async fn cancel_for_inspection(&mut self, inspection_id: &str) -> CoreResult<()> {
        let (matched, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut self.index)
            .into_iter()
            .partition(|n| n.inspection_id == inspection_id);
        self.index = remaining;

        for entry in &matched {
            if let Err(error) = self.sink.cancel(&entry.notification_id).await {
                warn!(%error, notification_id = %entry.notification_id, "sink cancel failed");
            }
        }

        if !matched.is_empty() {
            info!(inspection_id, count = matched.len(), "notifications cancelled");
        }
        self.save_index().await
    }

    async fn record(
        &mut self,
        inspection_id: &str,
        kind: NotificationKind,
        scheduled_at: DateTime<Utc>,
        request: NotificationRequest,
    ) -> CoreResult<String> {
        let notification_id = self.sink.schedule(request).await?;
        self.index.push(ScheduledNotification {
            notification_id: notification_id.clone(),
            inspection_id: inspection_id.to_string(),
            kind,
            scheduled_at,
        });
        // Written synchronously so identifiers survive a crash.
        self.save_index().await?;
        Ok(notification_id)
    }

    async fn save_index(&self) -> CoreResult<()> {
        let bytes = serde_json::to_vec(&self.index)?;
        self.kv.put(SCHEDULED_NOTIFICATIONS_KEY, bytes).await
    }
}

/// 09:00 local time on the calendar day of the given instant, as UTC.
/// `None` when that wall-clock time does not exist locally (DST gap).
fn nine_am_local(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let local_day = instant.with_timezone(&Local).date_naive();
    let naive = local_day.and_hms_opt(9, 0, 0)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;
    use crate::CoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        scheduled: Mutex<Vec<NotificationRequest>>,
        cancelled: Mutex<Vec<String>>,
        next_id: AtomicUsize,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn schedule(&self, request: NotificationRequest) -> CoreResult<String> {
            self.scheduled.lock().await.push(request);
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(format!("n-{id}"))
        }

        async fn cancel(&self, notification_id: &str) -> CoreResult<()> {
            self.cancelled
                .lock()
                .await
                .push(notification_id.to_string());
            Ok(())
        }
    }

    async fn scheduler() -> NotificationScheduler<RecordingSink, MemoryStore> {
        NotificationScheduler::load(RecordingSink::default(), MemoryStore::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_defaults_are_all_on_one_day() {
        let scheduler = scheduler().await;
        let prefs = scheduler.preferences();
        assert!(prefs.enabled && prefs.reminders && prefs.due_date_alerts);
        assert_eq!(prefs.reminder_lead, ReminderLead::OneDay);
    }

    #[tokio::test]
    async fn test_reminder_fires_lead_before_due() {
        let mut scheduler = scheduler().await;
        let due = Utc::now() + Duration::days(10);

        let id = scheduler
            .schedule_reminder("insp-1", due, ReminderLead::OneWeek)
            .await
            .unwrap();
        assert!(id.is_some());

        let requests = scheduler.sink.scheduled.lock().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].trigger, Some(due - Duration::weeks(1)));
    }

    #[tokio::test]
    async fn test_due_date_alert_fires_at_nine_local() {
        let mut scheduler = scheduler().await;
        let due = Utc::now() + Duration::days(10);

        let id = scheduler
            .schedule_due_date_alert("insp-1", due)
            .await
            .unwrap();
        assert!(id.is_some());

        let requests = scheduler.sink.scheduled.lock().await;
        let trigger = requests[0].trigger.unwrap();
        let local = trigger.with_timezone(&Local);
        assert_eq!(local.date_naive(), due.with_timezone(&Local).date_naive());
        assert_eq!(local.format("%H:%M:%S").to_string(), "09:00:00");
    }

    #[tokio::test]
    async fn test_past_due_dates_schedule_nothing() {
        let mut scheduler = scheduler().await;
        let past = Utc::now() - Duration::days(1);

        let reminder = scheduler
            .schedule_reminder("insp-1", past, ReminderLead::OneDay)
            .await
            .unwrap();
        let alert = scheduler.schedule_due_date_alert("insp-1", past).await.unwrap();

        assert!(reminder.is_none());
        assert!(alert.is_none());
        assert!(scheduler.sink.scheduled.lock().await.is_empty());
        assert!(scheduler.index.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_preferences_suppress_scheduling() {
        let mut scheduler = scheduler().await;
        scheduler
            .set_preferences(NotificationPreferences {
                enabled: false,
                ..Default::default()
            })
            .await
            .unwrap();

        let due = Utc::now() + Duration::days(5);
        let id = scheduler
            .schedule_reminder("insp-1", due, ReminderLead::OneDay)
            .await
            .unwrap();
        assert!(id.is_none());

        scheduler.send_completion("insp-1", SignatureParty::Landlord).await.unwrap();
        assert!(scheduler.sink.scheduled.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_clears_index_for_inspection() {
        let mut scheduler = scheduler().await;
        let due = Utc::now() + Duration::days(10);

        scheduler
            .schedule_reminder("insp-1", due, ReminderLead::ThreeDays)
            .await
            .unwrap();
        scheduler.schedule_due_date_alert("insp-1", due).await.unwrap();
        scheduler
            .schedule_reminder("insp-2", due, ReminderLead::OneDay)
            .await
            .unwrap();

        scheduler.cancel_for_inspection("insp-1").await.unwrap();

        assert!(scheduler.scheduled_for("insp-1").is_empty());
        assert_eq!(scheduler.scheduled_for("insp-2").len(), 1);
        assert_eq!(scheduler.sink.cancelled.lock().await.len(), 2);

        // The persisted index agrees.
        let bytes = scheduler
            .kv
            .get(SCHEDULED_NOTIFICATIONS_KEY)
            .await
            .unwrap()
            .unwrap();
        let persisted: Vec<ScheduledNotification> = serde_json::from_slice(&bytes).unwrap();
        assert!(persisted.iter().all(|n| n.inspection_id != "insp-1"));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let mut scheduler = scheduler().await;
        scheduler.cancel_for_inspection("never-scheduled").await.unwrap();
        scheduler.cancel_for_inspection("never-scheduled").await.unwrap();
        assert!(scheduler.sink.cancelled.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_completion_is_immediate() {
        let scheduler = scheduler().await;
        scheduler
            .send_completion("insp-1", SignatureParty::Tenant)
            .await
            .unwrap();

        let requests = scheduler.sink.scheduled.lock().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].trigger.is_none());
        assert!(requests[0].body.contains("Tenant"));
    }

    #[tokio::test]
    async fn test_tenant_action_notice_is_immediate() {
        let scheduler = scheduler().await;
        scheduler
            .send_tenant_action_required("insp-1", "Please review and sign the report.")
            .await
            .unwrap();

        let requests = scheduler.sink.scheduled.lock().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].trigger.is_none());
        assert_eq!(requests[0].title, "Action Required");
        assert_eq!(requests[0].body, "Please review and sign the report.");
        assert_eq!(requests[0].inspection_id, "insp-1");
        // Immediate sends are never indexed for cancellation.
        assert!(scheduler.index.is_empty());
    }

    #[tokio::test]
    async fn test_tenant_action_respects_enabled_gate() {
        let mut scheduler = scheduler().await;
        scheduler
            .set_preferences(NotificationPreferences {
                enabled: false,
                ..Default::default()
            })
            .await
            .unwrap();

        scheduler
            .send_tenant_action_required("insp-1", "Please sign.")
            .await
            .unwrap();
        assert!(scheduler.sink.scheduled.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_preferences_roundtrip_through_store() {
        let kv = MemoryStore::new();
        {
            let mut scheduler = NotificationScheduler::load(RecordingSink::default(), kv)
                .await
                .unwrap();
            scheduler
                .set_preferences(NotificationPreferences {
                    reminder_lead: ReminderLead::OneWeek,
                    ..Default::default()
                })
                .await
                .unwrap();

            // Index survives reload through the same store.
            let due = Utc::now() + Duration::days(10);
            scheduler
                .schedule_reminder("insp-1", due, ReminderLead::OneWeek)
                .await
                .unwrap();

            let reloaded =
                NotificationScheduler::load(RecordingSink::default(), scheduler.kv)
                    .await
                    .unwrap();
            assert_eq!(reloaded.preferences().reminder_lead, ReminderLead::OneWeek);
            assert_eq!(reloaded.scheduled_for("insp-1").len(), 1);
        }
    }

    #[tokio::test]
    async fn test_sink_failure_surfaces_as_value() {
        struct FailingSink;

        #[async_trait]
        impl NotificationSink for FailingSink {
            async fn schedule(&self, _request: NotificationRequest) -> CoreResult<String> {
                Err(CoreError::Notification("sink offline".to_string()))
            }
            async fn cancel(&self, _notification_id: &str) -> CoreResult<()> {
                Ok(())
            }
        }

        let mut scheduler = NotificationScheduler::load(FailingSink, MemoryStore::new())
            .await
            .unwrap();
        let due = Utc::now() + Duration::days(10);
        let result = scheduler
            .schedule_reminder("insp-1", due, ReminderLead::OneDay)
            .await;
        assert!(matches!(result, Err(CoreError::Notification(_))));
        assert!(scheduler.index.is_empty());
    }
}
