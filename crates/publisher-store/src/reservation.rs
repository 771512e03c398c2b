use blogpipe_common::PublisherId;

use crate::store::PublisherStore;

/// RAII guard returned by [`PublisherStore::reserve_slot`].
///
/// A reservation holds one unit of `blog_slots_reserved` against the
/// publisher's `max_total_blogs` cap. If the caller drops the guard without
/// calling [`commit`](SlotReservation::commit) or
/// [`release`](SlotReservation::release) — because job creation failed, or a
/// task panicked before either could run — the slot is released
/// asynchronously so it never leaks.
pub struct SlotReservation {
    store: PublisherStore,
    publisher_id: PublisherId,
    committed: bool,
}

impl SlotReservation {
    pub(crate) fn new(store: PublisherStore, publisher_id: PublisherId) -> Self {
        Self {
            store,
            publisher_id,
            committed: false,
        }
    }

    /// The publisher this reservation was taken against.
    pub fn publisher_id(&self) -> PublisherId {
        self.publisher_id
    }

    /// Commit the reservation: the slot now belongs to a real job and the
    /// guard's `Drop` impl becomes a no-op. Call this once the job the slot
    /// was reserved for has actually been persisted.
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Explicitly release the reservation (`processed = false`), awaiting the
    /// result instead of leaving it to the fire-and-forget `Drop` path. Used
    /// on the synchronous error branches of job intake where the
    /// caller can afford to await the release before returning an error.
    pub async fn release(mut self) -> blogpipe_common::Result<()> {
        self.committed = true;
        self.store
            .release_slot(self.publisher_id, false)
            .await
            .map_err(blogpipe_common::BlogPipeError::from)
    }
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let store = self.store.clone();
        let publisher_id = self.publisher_id;
        tracing::warn!(
            publisher_id = %publisher_id,
            "slot reservation dropped without commit, releasing"
        );
        tokio::spawn(async move {
            if let Err(e) = store.release_slot(publisher_id, false).await {
                tracing::error!(
                    publisher_id = %publisher_id,
                    error = %e,
                    "failed to release slot on drop"
                );
            }
        });
    }
}
