//! Userspace streaming driver core for the FLIR One Pro, a dual-sensor
//! USB thermal camera (vendor `0x09CB`, product `0x1996`).
//!
//! The driver turns an opaque sequence of 32 KiB USB bulk transfers into a
//! temporally ordered stream of [`CompositeFrame`]s, each aggregating
//! whichever of (14-bit thermal raster, visible JPEG, telemetry record, MSX
//! edge mask) arrived between two frame-boundary sync slices.
//!
//! ```no_run
//! use flir_one_driver::{open_live, LiveOptions};
//!
//! # fn main() -> Result<(), flir_one_driver::StreamError> {
//! let mut stream = open_live(LiveOptions::default())?;
//! while let Some(frame) = stream.next_frame()? {
//!     if let Some(thermal) = &frame.thermal {
//!         println!("frame {}: hottest count {}", frame.idx,
//!             thermal.samples().iter().max().unwrap());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Captured streams replay through [`open_offline`] and compare
//! byte-identically with the live run they were recorded from.

pub mod classify;
pub mod config;
pub mod decode;
pub mod error;
pub mod handshake;
pub mod logging;
pub mod pipeline;
pub mod source;
pub mod stream;
pub mod types;

pub use classify::{ClassifyContext, SliceClass};
pub use config::{LiveOptions, OfflineOptions};
pub use error::StreamError;
pub use logging::init_logging;
pub use source::ChunkSource;
pub use stream::{open_live, open_offline, Stream};
pub use types::{
    BgrRaster, Chunk, CompositeFrame, EdgeMask, FfcState, PipelineStats, ShutterState, Telemetry,
    ThermalRaster, VisibleImage,
};
