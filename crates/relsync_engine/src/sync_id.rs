//! Sync ID generation.

use std::sync::Arc;
use uuid::Uuid;

/// Produces new sync IDs.
///
/// IDs become remote path segments, so a factory must never return an empty
/// string or one containing `. # $ [ ] /`.
pub type SyncIdFactory = Arc<dyn Fn() -> String + Send + Sync>;

/// Generates a fresh sync ID: 32 lowercase hex digits of a random UUID.
pub fn sync_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The default factory, backed by [`sync_id`].
pub fn default_factory() -> SyncIdFactory {
    Arc::new(sync_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sync_ids_are_path_safe() {
        let id = sync_id();
        assert_eq!(id.len(), 32);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn sync_ids_are_unique() {
        let factory = default_factory();
        let ids: HashSet<String> = (0..1000).map(|_| factory()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
