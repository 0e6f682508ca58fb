use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::{rngs::OsRng, RngCore};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub const KEY_LEN: usize = 16;

/// Process-wide token key, shared by reference between the bot handlers and
/// the web access layer.
///
/// The key is never persisted; a restart (like a rotation) invalidates every
/// token issued before it. Readers take a copy so no lock is held while
/// cipher work runs.
pub struct KeyRing {
    key: RwLock<[u8; KEY_LEN]>,
}

impl KeyRing {
    pub fn generate() -> Self {
        Self {
            key: RwLock::new(random_key()),
        }
    }

    /// Copy of the current key.
    pub fn snapshot(&self) -> [u8; KEY_LEN] {
        *self.key.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the key with fresh random bytes, invalidating all tokens
    /// issued under the old one.
    pub fn rotate(&self) -> [u8; KEY_LEN] {
        let fresh = random_key();
        *self.key.write().unwrap_or_else(|e| e.into_inner()) = fresh;
        fresh
    }

    /// Rotate on a fixed period until cancelled.
    pub fn spawn_rotation(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(every) => {
                        self.rotate();
                        tracing::info!("access key rotated");
                    }
                }
            }
        })
    }
}

fn random_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_replaces_the_key() {
        let ring = KeyRing::generate();
        let before = ring.snapshot();
        let after = ring.rotate();
        assert_ne!(before, after);
        assert_eq!(ring.snapshot(), after);
    }

    #[tokio::test]
    async fn rotation_task_stops_on_cancel() {
        let ring = Arc::new(KeyRing::generate());
        let cancel = CancellationToken::new();
        let handle = ring
            .clone()
            .spawn_rotation(Duration::from_secs(3600), cancel.clone());
        cancel.cancel();
        handle.await.expect("rotation task joins");
    }
}
