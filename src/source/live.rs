use std::time::Duration;

use bytes::Bytes;
use rusb::{Context, DeviceHandle, UsbContext};
use tracing::{debug, info, warn};

use super::ChunkSource;
use crate::error::StreamError;
use crate::handshake;
use crate::types::{Chunk, CHUNK_LEN};

/// FLIR Systems.
pub const VENDOR_ID: u16 = 0x09CB;
/// FLIR One Pro.
pub const PRODUCT_ID: u16 = 0x1996;

const STREAM_INTERFACE: u8 = 0;
/// Bulk IN endpoint carrying the composite stream.
const STREAM_ENDPOINT: u8 = 0x85;

/// Live USB backend: owns the device handle exclusively for the stream's
/// lifetime and issues 32 KiB bulk IN reads. A read timeout yields a
/// zero-length heartbeat chunk; any other transport error is fatal.
pub struct LiveSource {
    _ctx: Context,
    handle: DeviceHandle<Context>,
    timeout: Duration,
    buf: Vec<u8>,
    seq: u64,
    claimed: bool,
}

impl LiveSource {
    /// Open the camera, claim the streaming interface and run the bring-up
    /// handshake. On success the next bulk read delivers stream data.
    pub fn open(timeout: Duration) -> Result<Self, StreamError> {
        let ctx = Context::new()?;
        let handle = open_device(&ctx)?;

        if handle.kernel_driver_active(STREAM_INTERFACE).unwrap_or(false) {
            debug!("📷 detaching kernel driver from interface {}", STREAM_INTERFACE);
            handle.detach_kernel_driver(STREAM_INTERFACE)?;
        }
        handle.claim_interface(STREAM_INTERFACE)?;

        let mut source = Self {
            _ctx: ctx,
            handle,
            timeout,
            buf: vec![0u8; CHUNK_LEN],
            seq: 0,
            claimed: true,
        };
        if let Err(e) = handshake::bring_up(&source.handle) {
            source.close();
            return Err(e);
        }
        info!("📷 FLIR One Pro open, streaming on endpoint {:#04x}", STREAM_ENDPOINT);
        Ok(source)
    }
}

fn open_device(ctx: &Context) -> Result<DeviceHandle<Context>, StreamError> {
    for device in ctx.devices()?.iter() {
        let desc = device.device_descriptor()?;
        if desc.vendor_id() == VENDOR_ID && desc.product_id() == PRODUCT_ID {
            return Ok(device.open()?);
        }
    }
    Err(StreamError::DeviceNotFound {
        vid: VENDOR_ID,
        pid: PRODUCT_ID,
    })
}

impl ChunkSource for LiveSource {
    fn next_chunk(&mut self) -> Result<Option<Chunk>, StreamError> {
        let data = match self.handle.read_bulk(STREAM_ENDPOINT, &mut self.buf, self.timeout) {
            Ok(n) => Bytes::copy_from_slice(&self.buf[..n]),
            // A timeout is a valid heartbeat: the classifier tags the empty
            // chunk Unknown and the assembler ignores it.
            Err(rusb::Error::Timeout) => Bytes::new(),
            Err(e) => {
                warn!("📷 bulk read failed at seq {}: {}", self.seq, e);
                return Err(StreamError::Transport(e));
            }
        };
        let chunk = Chunk::new(self.seq, data);
        self.seq += 1;
        Ok(Some(chunk))
    }

    fn position(&self) -> u64 {
        self.seq
    }

    fn close(&mut self) {
        if self.claimed {
            if let Err(e) = self.handle.release_interface(STREAM_INTERFACE) {
                warn!("📷 could not release interface {}: {}", STREAM_INTERFACE, e);
            }
            self.claimed = false;
        }
    }
}

impl Drop for LiveSource {
    fn drop(&mut self) {
        self.close();
    }
}
