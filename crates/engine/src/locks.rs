use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Guard held while an account ledger is being appended to.
pub type AccountGuard = OwnedMutexGuard<()>;

/// Per-account async mutexes.
///
/// Appends for the same account are serialized; different accounts never
/// wait on each other.
#[derive(Debug, Default)]
pub(crate) struct AccountLocks {
    slots: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl AccountLocks {
    pub(crate) async fn lock(&self, account_id: i64) -> AccountGuard {
        let slot = {
            // A poisoned map still holds valid mutexes.
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.retain(|id, m| *id == account_id || Arc::strong_count(m) > 1);
            slots.entry(account_id).or_default().clone()
        };
        slot.lock_owned().await
    }
}
