use std::path::PathBuf;

/// Fatal stream errors surfaced to the caller.
///
/// Per-chunk decode problems (bad VoSPI header, duplicate row, truncated
/// JPEG, malformed telemetry JSON, RLE run-sum mismatch) are *not* errors:
/// the assembler discards the offending partial artifact, bumps a counter in
/// [`crate::types::PipelineStats`] and keeps going, so one mangled transfer
/// never costs more than its own artifact.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// No device with the expected VID/PID is attached (or it refused open).
    #[error("FLIR One Pro not found (vid={vid:04x} pid={pid:04x})")]
    DeviceNotFound { vid: u16, pid: u16 },

    /// The device is present but refused bring-up.
    #[error("handshake step `{step}` failed after {attempts} attempt(s): {source}")]
    Handshake {
        step: &'static str,
        attempts: u32,
        #[source]
        source: rusb::Error,
    },

    /// Bulk read failed with a non-timeout error, or the device disappeared.
    #[error("usb transport error: {0}")]
    Transport(#[from] rusb::Error),

    /// The capture directory could not be read.
    #[error("capture replay failed: {0}")]
    Replay(#[source] std::io::Error),

    /// A capture file is not a valid hex-encoded chunk.
    #[error("capture file {path:?} is malformed: {reason}")]
    ReplayFormat { path: PathBuf, reason: String },

    /// Write-through recording failed. The partial file has been removed.
    #[error("recording chunk to {path:?} failed: {source}")]
    Recording {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
