//! Shared browser lifecycle
//!
//! A long-running service keeps at most one browser process alive. The first
//! caller of [`SharedBrowser::acquire`] launches it, later callers reuse it and
//! open their own tabs. When health checks are enabled a browser that stopped
//! answering is dropped and relaunched on the next acquire. [`SharedBrowser::shutdown`]
//! releases the process and refuses further work.

use crate::{Error, Result};
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

/// Starts browser processes and probes their health
pub trait Launcher: Send + Sync {
    /// Handle to a running browser
    type Browser: Send + Sync;

    /// Launch a new browser process
    fn launch(&self) -> Result<Self::Browser>;

    /// Whether `browser` still answers
    fn is_alive(&self, browser: &Self::Browser) -> bool;
}

enum Slot<B> {
    Empty,
    Ready(Arc<B>),
    Closed,
}

/// A lazily launched browser shared by every render of one service
pub struct SharedBrowser<L: Launcher> {
    launcher: L,
    health_check: bool,
    slot: Mutex<Slot<L::Browser>>,
}

impl<L: Launcher> SharedBrowser<L> {
    pub fn new(launcher: L, health_check: bool) -> Self {
        Self {
            launcher,
            health_check,
            slot: Mutex::new(Slot::Empty),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<L::Browser>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the running browser, launching it if none is alive
    pub fn acquire(&self) -> Result<Arc<L::Browser>> {
        let seen = match &*self.lock() {
            Slot::Closed => return Err(Error::ShuttingDown),
            Slot::Ready(browser) => Some(browser.clone()),
            Slot::Empty => None,
        };

        // Probed without the lock; a hung browser must not stall other acquires.
        if let Some(browser) = &seen {
            if !self.health_check || self.launcher.is_alive(browser) {
                return Ok(browser.clone());
            }
            warn!("Shared browser stopped responding; relaunching");
        }

        // Launches happen under the lock so concurrent callers share one process.
        let mut slot = self.lock();
        match &*slot {
            Slot::Closed => return Err(Error::ShuttingDown),
            Slot::Ready(current) if !seen.as_ref().is_some_and(|dead| Arc::ptr_eq(dead, current)) => {
                return Ok(current.clone());
            }
            _ => {}
        }

        // Drop the dead handle before launching its replacement.
        *slot = Slot::Empty;
        let browser = Arc::new(self.launcher.launch()?);
        info!("Launched shared browser");
        *slot = Slot::Ready(browser.clone());
        Ok(browser)
    }

    /// Forget `browser` if it is still the shared one, so the next acquire relaunches
    pub fn invalidate(&self, browser: &Arc<L::Browser>) {
        let mut slot = self.lock();
        if let Slot::Ready(current) = &*slot {
            if Arc::ptr_eq(current, browser) {
                *slot = Slot::Empty;
            }
        }
    }

    /// Whether a browser is currently held
    pub fn is_launched(&self) -> bool {
        matches!(&*self.lock(), Slot::Ready(_))
    }

    /// Release the browser and refuse further acquires.
    ///
    /// Returns whether a browser was running. Renders still holding the
    /// handle finish before the process goes away.
    pub fn shutdown(&self) -> bool {
        let previous = std::mem::replace(&mut *self.lock(), Slot::Closed);
        match previous {
            Slot::Ready(browser) => {
                drop(browser);
                info!("Shared browser closed");
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    struct FakeBrowser {
        alive: AtomicBool,
    }

    #[derive(Default)]
    struct FakeLauncher {
        launches: AtomicUsize,
        fail: AtomicBool,
        probe_ms: AtomicU64,
    }

    impl Launcher for Arc<FakeLauncher> {
        type Browser = FakeBrowser;

        fn launch(&self) -> Result<FakeBrowser> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::InitializationError("no chrome here".into()));
            }
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(FakeBrowser { alive: AtomicBool::new(true) })
        }

        fn is_alive(&self, browser: &FakeBrowser) -> bool {
            std::thread::sleep(Duration::from_millis(self.probe_ms.load(Ordering::SeqCst)));
            browser.alive.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_lazy_launch_and_reuse() {
        let launcher = Arc::new(FakeLauncher::default());
        let shared = SharedBrowser::new(launcher.clone(), true);
        assert!(!shared.is_launched());
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);

        let a = shared.acquire().unwrap();
        let b = shared.acquire().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        assert!(shared.is_launched());
    }

    #[test]
    fn test_concurrent_first_acquire_launches_once() {
        let launcher = Arc::new(FakeLauncher::default());
        let shared = Arc::new(SharedBrowser::new(launcher.clone(), true));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.acquire().map(|_| ()))
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dead_browser_is_relaunched() {
        let launcher = Arc::new(FakeLauncher::default());
        let shared = SharedBrowser::new(launcher.clone(), true);
        let first = shared.acquire().unwrap();
        first.alive.store(false, Ordering::SeqCst);

        let second = shared.acquire().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_health_probe_runs_outside_the_lock() {
        let launcher = Arc::new(FakeLauncher::default());
        let shared = Arc::new(SharedBrowser::new(launcher.clone(), true));
        shared.acquire().unwrap();
        launcher.probe_ms.store(300, Ordering::SeqCst);

        let prober = {
            let shared = shared.clone();
            std::thread::spawn(move || shared.acquire().map(|_| ()))
        };
        std::thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        assert!(shared.is_launched());
        assert!(start.elapsed() < Duration::from_millis(200));
        prober.join().unwrap().unwrap();
    }

    #[test]
    fn test_concurrent_probes_of_dead_browser_relaunch_once() {
        let launcher = Arc::new(FakeLauncher::default());
        let shared = Arc::new(SharedBrowser::new(launcher.clone(), true));
        let first = shared.acquire().unwrap();
        first.alive.store(false, Ordering::SeqCst);
        launcher.probe_ms.store(50, Ordering::SeqCst);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.acquire())
            })
            .collect();
        let browsers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();

        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
        for b in &browsers {
            assert!(!Arc::ptr_eq(b, &first));
            assert!(Arc::ptr_eq(b, &browsers[0]));
        }
    }

    #[test]
    fn test_dead_browser_kept_without_health_check() {
        let launcher = Arc::new(FakeLauncher::default());
        let shared = SharedBrowser::new(launcher.clone(), false);
        let first = shared.acquire().unwrap();
        first.alive.store(false, Ordering::SeqCst);

        let second = shared.acquire().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_only_matching_browser() {
        let launcher = Arc::new(FakeLauncher::default());
        let shared = SharedBrowser::new(launcher.clone(), false);
        let first = shared.acquire().unwrap();
        shared.invalidate(&first);
        let second = shared.acquire().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        // A stale handle must not evict the current browser
        shared.invalidate(&first);
        let third = shared.acquire().unwrap();
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[test]
    fn test_launch_failure_is_retried_next_time() {
        let launcher = Arc::new(FakeLauncher::default());
        launcher.fail.store(true, Ordering::SeqCst);
        let shared = SharedBrowser::new(launcher.clone(), true);
        assert!(matches!(shared.acquire(), Err(Error::InitializationError(_))));
        assert!(!shared.is_launched());

        launcher.fail.store(false, Ordering::SeqCst);
        assert!(shared.acquire().is_ok());
    }

    #[test]
    fn test_shutdown_refuses_further_acquires() {
        let launcher = Arc::new(FakeLauncher::default());
        let shared = SharedBrowser::new(launcher.clone(), true);
        assert!(!shared.shutdown());

        let shared = SharedBrowser::new(launcher.clone(), true);
        shared.acquire().unwrap();
        assert!(shared.shutdown());
        assert!(!shared.is_launched());
        assert!(matches!(shared.acquire(), Err(Error::ShuttingDown)));
    }
}
