//! Registry of connection attempts and established camera links.
//!
//! One entry per device the engine currently owns. Reserving an entry is
//! the mutual-exclusion point that keeps concurrent sync triggers down to
//! a single attempt per camera; the established link handles hang off the
//! same entry once the attempt reaches the syncing phase.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::transport::ChannelTransport;
use crate::core::bluetooth::types::DeviceId;
use crate::core::camera::CameraDelegate;

/// Handles of one camera in the syncing phase.
#[derive(Clone)]
pub struct ActiveLink {
    pub device_id: DeviceId,
    pub delegate: Arc<dyn CameraDelegate>,
    pub transport: Arc<dyn ChannelTransport>,
}

struct TrackedDevice {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    link: Option<ActiveLink>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<DeviceId, TrackedDevice>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the device for a new connection attempt. Returns false when
    /// another attempt already owns it, making concurrent start requests
    /// collapse into one.
    pub async fn try_reserve(&self, id: &DeviceId, cancel: CancellationToken) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.contains_key(id) {
            return false;
        }
        inner.insert(
            id.clone(),
            TrackedDevice {
                cancel,
                task: None,
                link: None,
            },
        );
        true
    }

    /// Records the attempt task so a later stop can join it.
    pub async fn set_task(&self, id: &DeviceId, task: JoinHandle<()>) {
        if let Some(tracked) = self.inner.lock().await.get_mut(id) {
            tracked.task = Some(task);
        }
    }

    /// Attaches the established link handles once setup succeeded.
    pub async fn attach_link(&self, id: &DeviceId, link: ActiveLink) {
        if let Some(tracked) = self.inner.lock().await.get_mut(id) {
            tracked.link = Some(link);
        }
    }

    /// Removes the entry; attempt tasks call this on the way out.
    pub async fn remove(&self, id: &DeviceId) {
        self.inner.lock().await.remove(id);
    }

    /// Takes the entry for a deliberate stop, handing back the pieces the
    /// caller needs to cancel and join the attempt. The entry is gone
    /// afterwards, so the device can be reserved again immediately.
    pub async fn take(&self, id: &DeviceId) -> Option<(CancellationToken, Option<JoinHandle<()>>)> {
        self.inner
            .lock()
            .await
            .remove(id)
            .map(|tracked| (tracked.cancel, tracked.task))
    }

    /// Snapshot of every established link, for the location fan-out.
    pub async fn links(&self) -> Vec<ActiveLink> {
        self.inner
            .lock()
            .await
            .values()
            .filter_map(|tracked| tracked.link.clone())
            .collect()
    }

    /// True once the device has a live link attached.
    pub async fn is_linked(&self, id: &DeviceId) -> bool {
        self.inner
            .lock()
            .await
            .get(id)
            .is_some_and(|tracked| tracked.link.is_some())
    }

    pub async fn linked_count(&self) -> usize {
        self.inner
            .lock()
            .await
            .values()
            .filter(|tracked| tracked.link.is_some())
            .count()
    }

    /// Ids of every device currently owned by an attempt or link.
    pub async fn tracked_ids(&self) -> Vec<DeviceId> {
        self.inner.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> DeviceId {
        DeviceId::new(format!("AA:00:00:00:00:{n:02X}"))
    }

    #[tokio::test]
    async fn second_reservation_is_rejected() {
        let registry = ConnectionRegistry::new();
        assert!(registry.try_reserve(&id(1), CancellationToken::new()).await);
        assert!(!registry.try_reserve(&id(1), CancellationToken::new()).await);
        assert!(registry.try_reserve(&id(2), CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn take_frees_the_slot_for_a_new_attempt() {
        let registry = ConnectionRegistry::new();
        let token = CancellationToken::new();
        registry.try_reserve(&id(1), token.clone()).await;

        let (taken, task) = registry.take(&id(1)).await.unwrap();
        assert!(task.is_none());
        taken.cancel();
        assert!(token.is_cancelled());

        assert!(registry.try_reserve(&id(1), CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn remove_after_take_is_harmless() {
        let registry = ConnectionRegistry::new();
        registry.try_reserve(&id(1), CancellationToken::new()).await;
        registry.take(&id(1)).await;
        registry.remove(&id(1)).await;
        assert!(registry.tracked_ids().await.is_empty());
    }

    #[tokio::test]
    async fn reserved_but_unlinked_devices_are_not_counted_as_linked() {
        let registry = ConnectionRegistry::new();
        registry.try_reserve(&id(1), CancellationToken::new()).await;
        assert!(!registry.is_linked(&id(1)).await);
        assert_eq!(registry.linked_count().await, 0);
        assert!(registry.links().await.is_empty());
        assert_eq!(registry.tracked_ids().await, vec![id(1)]);
    }
}
