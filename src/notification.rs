//! Notification dispatch (out of scope per spec §1, modeled as an
//! external collaborator). The default sink just logs — a real deployment
//! would publish to a message bus.

use crate::model::Lease;
use async_trait::async_trait;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, lease: &Lease, events: &[&str]);
}

pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn send(&self, lease: &Lease, events: &[&str]) {
        for event in events {
            log::info!("notification {} for lease {} ({})", qualify(event), lease.id, lease.name);
        }
    }
}

/// Mirrors `_send_notification`'s `'lease.%s' % event`: callers pass bare
/// event names (`"create"`, `"event.<type>"`), the sink prepends the
/// `lease.` prefix exactly once.
fn qualify(event: &str) -> String {
    format!("lease.{event}")
}

#[cfg(test)]
pub struct RecordingNotificationSink {
    pub sent: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self { sent: std::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(test)]
#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn send(&self, _lease: &Lease, events: &[&str]) {
        let mut sent = self.sent.lock().unwrap();
        sent.extend(events.iter().map(|e| qualify(e)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_prepends_lease_prefix_exactly_once() {
        assert_eq!(qualify("create"), "lease.create");
        assert_eq!(qualify("event.before_end_lease.stop"), "lease.event.before_end_lease.stop");
    }
}
