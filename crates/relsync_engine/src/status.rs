//! Sync progress and notifications.

use parking_lot::Mutex;
use relsync_remote::RemoteEvent;
use tokio::sync::broadcast;

/// A snapshot of sync progress.
///
/// Counters reset when a new batch starts after the previous one drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Uploads are in flight.
    pub uploading: bool,
    /// Remote changes are being applied.
    pub downloading: bool,
    /// Uploads acknowledged in the current batch.
    pub uploaded_records: u64,
    /// Uploads started in the current batch.
    pub total_records_to_upload: u64,
    /// Remote changes applied in the current batch.
    pub downloaded_records: u64,
    /// Remote changes received in the current batch.
    pub total_records_to_download: u64,
}

impl SyncStatus {
    /// Returns true when nothing is in flight.
    pub fn is_idle(&self) -> bool {
        !self.uploading && !self.downloading
    }
}

/// Remote changes received for one table, before they are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingChanges {
    /// The table the event belongs to.
    pub table_id: String,
    /// The raw remote event.
    pub event: RemoteEvent,
}

/// A notification published by a sync manager.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncNotification {
    /// Upload or download state changed.
    StatusChanged(SyncStatus),
    /// Remote changes arrived.
    IncomingChanges(IncomingChanges),
}

#[derive(Default)]
struct Progress {
    status: SyncStatus,
    pending_uploads: u64,
    pending_downloads: u64,
}

/// Tracks progress and broadcasts it.
pub(crate) struct StatusBoard {
    progress: Mutex<Progress>,
    sender: broadcast::Sender<SyncNotification>,
}

impl StatusBoard {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            progress: Mutex::new(Progress::default()),
            sender,
        }
    }

    pub(crate) fn current(&self) -> SyncStatus {
        self.progress.lock().status
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.sender.subscribe()
    }

    pub(crate) fn begin_uploads(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.update(|progress| {
            if progress.pending_uploads == 0 {
                progress.status.uploaded_records = 0;
                progress.status.total_records_to_upload = 0;
            }
            progress.pending_uploads += count;
            progress.status.total_records_to_upload += count;
            progress.status.uploading = true;
        });
    }

    pub(crate) fn finish_upload(&self, succeeded: bool) {
        self.update(|progress| {
            progress.pending_uploads = progress.pending_uploads.saturating_sub(1);
            if succeeded {
                progress.status.uploaded_records += 1;
            }
            progress.status.uploading = progress.pending_uploads > 0;
        });
    }

    pub(crate) fn begin_download(&self) {
        self.update(|progress| {
            if progress.pending_downloads == 0 {
                progress.status.downloaded_records = 0;
                progress.status.total_records_to_download = 0;
            }
            progress.pending_downloads += 1;
            progress.status.total_records_to_download += 1;
            progress.status.downloading = true;
        });
    }

    pub(crate) fn finish_download(&self, applied: bool) {
        self.update(|progress| {
            progress.pending_downloads = progress.pending_downloads.saturating_sub(1);
            if applied {
                progress.status.downloaded_records += 1;
            }
            progress.status.downloading = progress.pending_downloads > 0;
        });
    }

    pub(crate) fn publish_incoming(&self, table_id: &str, event: &RemoteEvent) {
        self.publish(SyncNotification::IncomingChanges(IncomingChanges {
            table_id: table_id.to_string(),
            event: event.clone(),
        }));
    }

    fn update(&self, apply: impl FnOnce(&mut Progress)) {
        let snapshot = {
            let mut progress = self.progress.lock();
            apply(&mut progress);
            progress.status
        };
        self.publish(SyncNotification::StatusChanged(snapshot));
    }

    fn publish(&self, notification: SyncNotification) {
        // Sending only fails when nobody listens.
        let _ = self.sender.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsync_remote::Value;

    fn drain(receiver: &mut broadcast::Receiver<SyncNotification>) -> Vec<SyncNotification> {
        let mut seen = Vec::new();
        while let Ok(notification) = receiver.try_recv() {
            seen.push(notification);
        }
        seen
    }

    #[test]
    fn upload_batch_progress() {
        let board = StatusBoard::new(16);
        board.begin_uploads(2);
        assert_eq!(
            board.current(),
            SyncStatus {
                uploading: true,
                total_records_to_upload: 2,
                ..SyncStatus::default()
            }
        );

        board.finish_upload(true);
        assert!(board.current().uploading);
        board.finish_upload(false);

        let status = board.current();
        assert!(!status.uploading);
        assert_eq!(status.uploaded_records, 1);
        assert_eq!(status.total_records_to_upload, 2);
    }

    #[test]
    fn counters_reset_per_batch() {
        let board = StatusBoard::new(16);
        board.begin_uploads(3);
        for _ in 0..3 {
            board.finish_upload(true);
        }
        board.begin_uploads(1);
        let status = board.current();
        assert_eq!(status.uploaded_records, 0);
        assert_eq!(status.total_records_to_upload, 1);
    }

    #[test]
    fn overlapping_batches_accumulate() {
        let board = StatusBoard::new(16);
        board.begin_uploads(1);
        board.begin_uploads(2);
        board.finish_upload(true);
        let status = board.current();
        assert!(status.uploading);
        assert_eq!(status.total_records_to_upload, 3);
        assert_eq!(status.uploaded_records, 1);
    }

    #[test]
    fn download_progress() {
        let board = StatusBoard::new(16);
        board.begin_download();
        assert!(board.current().downloading);
        board.finish_download(true);
        let status = board.current();
        assert!(status.is_idle());
        assert_eq!(status.downloaded_records, 1);
        assert_eq!(status.total_records_to_download, 1);
    }

    #[test]
    fn every_transition_is_broadcast() {
        let board = StatusBoard::new(16);
        let mut receiver = board.subscribe();

        board.begin_uploads(1);
        board.finish_upload(true);
        board.publish_incoming("tasks", &RemoteEvent::added("a", Value::Null));
        board.begin_uploads(0);

        let seen = drain(&mut receiver);
        assert_eq!(seen.len(), 3);
        assert!(matches!(
            seen[0],
            SyncNotification::StatusChanged(SyncStatus { uploading: true, .. })
        ));
        assert!(matches!(
            seen[1],
            SyncNotification::StatusChanged(SyncStatus { uploading: false, .. })
        ));
        assert!(matches!(
            &seen[2],
            SyncNotification::IncomingChanges(IncomingChanges { table_id, .. }) if table_id == "tasks"
        ));
    }
}
