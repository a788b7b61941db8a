/*!
Utilitaires de test pour le kernel Command Center

- Init du logging une seule fois par binaire de test
- Attente active bornée sur une condition (tâches de fond, refresher)
*/

use std::time::Duration;

/// Init env_logger (ignore les appels répétés)
pub fn init_test_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// Vérifie `condition` toutes les 20 ms jusqu'à `deadline`.
/// Retourne false si la condition n'est jamais devenue vraie.
pub async fn wait_until<F>(deadline: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();

    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let last = condition();
    if !last {
        log::warn!("⏰ Condition still false after {:?}", deadline);
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_until_sees_background_change() {
        let counter = Arc::new(AtomicUsize::new(0));
        let writer = counter.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            writer.store(3, Ordering::SeqCst);
        });

        let probe = counter.clone();
        assert!(wait_until(Duration::from_secs(2), move || probe.load(Ordering::SeqCst) == 3).await);
    }

    #[tokio::test]
    async fn test_wait_until_gives_up() {
        assert!(!wait_until(Duration::from_millis(60), || false).await);
    }
}
