pub mod detector;
pub mod fetcher;
pub mod gate;
pub mod scheduler;

pub use detector::{Decision, evaluate};
pub use fetcher::{BuildStatus, FetchResult, StatusFetcher};
pub use gate::WatchGate;
pub use scheduler::{TickReport, Watcher, spawn_watcher};
