use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options for [`crate::stream::open_live`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveOptions {
    /// Tee every chunk into this directory as a replayable capture.
    pub record_dir: Option<PathBuf>,
    /// Bulk IN read timeout. A timed-out read is a heartbeat, not an error.
    pub read_timeout_ms: u64,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            record_dir: None,
            read_timeout_ms: 1000,
        }
    }
}

/// Options for [`crate::stream::open_offline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineOptions {
    /// 0 or 1 replays the capture once, N > 1 replays it N times, negative
    /// repeats forever.
    pub repeat: i32,
}

impl Default for OfflineOptions {
    fn default() -> Self {
        Self { repeat: 0 }
    }
}
