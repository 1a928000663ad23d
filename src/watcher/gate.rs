use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Global on/off switch for outbound notifications.
///
/// Shared between the command layer (writer) and the watch loop (reader).
/// Polling keeps running while the gate is closed; only delivery stops.
#[derive(Debug, Clone)]
pub struct WatchGate {
    open: Arc<AtomicBool>,
}

impl WatchGate {
    pub fn new(open: bool) -> Self {
        Self {
            open: Arc::new(AtomicBool::new(open)),
        }
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Default for WatchGate {
    fn default() -> Self {
        Self::new(true)
    }
}
