//! Device bring-up: the fixed sequence of vendor control transfers and bulk
//! writes that moves the camera from enumeration to streaming state. The
//! bytes are a reproduction of what the vendor's host stack sends on the
//! wire; the sequence is not tunable.

use std::time::Duration;

use rusb::{request_type, Direction, DeviceHandle, Recipient, RequestType, UsbContext};
use tracing::{debug, warn};

use crate::error::StreamError;

const STEP_TIMEOUT: Duration = Duration::from_millis(500);
/// The device may NAK or short-reply a step while it spins up internal
/// services; each step gets this many attempts before the open fails.
const MAX_ATTEMPTS: u32 = 3;

/// Bulk endpoint the camera accepts configuration writes on.
const CONFIG_ENDPOINT: u8 = 0x02;
/// Vendor request toggling the device's internal interfaces.
const REQ_INTERFACE_TOGGLE: u8 = 0x0B;

enum Step {
    ControlOut {
        name: &'static str,
        request: u8,
        value: u16,
        index: u16,
        data: &'static [u8],
    },
    BulkOut {
        name: &'static str,
        endpoint: u8,
        data: &'static [u8],
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match *self {
            Step::ControlOut { name, .. } | Step::BulkOut { name, .. } => name,
        }
    }
}

/// Captured bring-up sequence: quiesce both device services, restart the
/// file-IO service, push the stream configuration, then start the frame
/// service. After the last step the streaming endpoint produces bulk data.
const BRING_UP: &[Step] = &[
    Step::ControlOut {
        name: "stop frame service",
        request: REQ_INTERFACE_TOGGLE,
        value: 0,
        index: 2,
        data: &[],
    },
    Step::ControlOut {
        name: "stop file-io service",
        request: REQ_INTERFACE_TOGGLE,
        value: 0,
        index: 1,
        data: &[],
    },
    Step::ControlOut {
        name: "start file-io service",
        request: REQ_INTERFACE_TOGGLE,
        value: 1,
        index: 1,
        data: &[],
    },
    Step::BulkOut {
        name: "push stream configuration",
        endpoint: CONFIG_ENDPOINT,
        data: br#"{"type":"setStreamFormat","data":{"thermal":true,"visible":true,"telemetry":true,"edgeMask":true}}"#,
    },
    Step::ControlOut {
        name: "start frame service",
        request: REQ_INTERFACE_TOGGLE,
        value: 1,
        index: 2,
        data: &[],
    },
];

/// Run the full bring-up sequence. Synchronous and idempotent per open;
/// failure at any step aborts stream construction.
pub fn bring_up<T: UsbContext>(handle: &DeviceHandle<T>) -> Result<(), StreamError> {
    for step in BRING_UP {
        run_step(handle, step)?;
    }
    debug!("🤝 handshake complete, device is streaming");
    Ok(())
}

fn run_step<T: UsbContext>(handle: &DeviceHandle<T>, step: &Step) -> Result<(), StreamError> {
    let mut last = rusb::Error::Other;
    for attempt in 1..=MAX_ATTEMPTS {
        match execute(handle, step) {
            Ok(()) => {
                debug!("🤝 handshake step `{}` ok (attempt {})", step.name(), attempt);
                return Ok(());
            }
            // NAK shows up as a pipe stall, a slow service as a timeout or
            // short reply; all three are retryable.
            Err(e @ (rusb::Error::Pipe | rusb::Error::Timeout | rusb::Error::Interrupted)) => {
                warn!(
                    "🤝 handshake step `{}` attempt {}/{} failed: {}",
                    step.name(),
                    attempt,
                    MAX_ATTEMPTS,
                    e
                );
                last = e;
            }
            Err(source) => {
                return Err(StreamError::Handshake {
                    step: step.name(),
                    attempts: attempt,
                    source,
                })
            }
        }
    }
    Err(StreamError::Handshake {
        step: step.name(),
        attempts: MAX_ATTEMPTS,
        source: last,
    })
}

fn execute<T: UsbContext>(handle: &DeviceHandle<T>, step: &Step) -> Result<(), rusb::Error> {
    match *step {
        Step::ControlOut {
            request,
            value,
            index,
            data,
            ..
        } => {
            let rt = request_type(Direction::Out, RequestType::Vendor, Recipient::Interface);
            let written = handle.write_control(rt, request, value, index, data, STEP_TIMEOUT)?;
            if written < data.len() {
                return Err(rusb::Error::Interrupted);
            }
            Ok(())
        }
        Step::BulkOut { endpoint, data, .. } => {
            let written = handle.write_bulk(endpoint, data, STEP_TIMEOUT)?;
            if written < data.len() {
                return Err(rusb::Error::Interrupted);
            }
            Ok(())
        }
    }
}
