//! Shared online/offline flag.

use std::sync::Arc;

use tokio::sync::watch;

/// Device connectivity as seen by the executor.
///
/// Cheap to clone; all clones observe the same flag.
#[derive(Debug, Clone)]
pub struct Connectivity {
    sender: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (sender, _receiver) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    #[must_use]
    pub fn online() -> Self {
        Self::new(true)
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "Connectivity changed");
        }
    }

    /// Receiver that wakes on every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online()
    }
}
