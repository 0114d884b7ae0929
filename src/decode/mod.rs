//! Per-class decoders: VoSPI thermal reassembly, JPEG fragment assembly,
//! telemetry JSON and the MSX edge-mask RLE.

pub mod edge;
pub mod telemetry;
pub mod thermal;
pub mod visible;
