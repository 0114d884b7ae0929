use serde::Deserialize;
use crate::types::{FfcState, ShutterState, Telemetry};

/// On-wire telemetry object. Unknown keys are ignored; all known keys are
/// optional.
#[derive(Debug, Default, Deserialize)]
struct RawTelemetry {
    #[serde(default)]
    batt_v: Option<f64>,
    #[serde(default)]
    batt_pct: Option<f64>,
    #[serde(default, rename = "shutter_tempK")]
    shutter_temp_k: Option<f64>,
    #[serde(default, rename = "aux_tempK")]
    aux_temp_k: Option<f64>,
    #[serde(default)]
    shutter: Option<String>,
    #[serde(default)]
    ffc: Option<String>,
}

/// Parse one telemetry chunk. Trailing bytes after the JSON object (the
/// device pads transfers) are ignored. A parse failure is a desync for this
/// chunk only.
pub fn parse(payload: &[u8]) -> Result<Telemetry, serde_json::Error> {
    let mut stream = serde_json::Deserializer::from_slice(payload).into_iter::<RawTelemetry>();
    let raw = match stream.next() {
        Some(result) => result?,
        None => RawTelemetry::default(),
    };

    Ok(Telemetry {
        battery_volts: raw.batt_v.filter(|v| v.is_finite()),
        battery_percent: raw
            .batt_pct
            .filter(|p| p.is_finite() && (0.0..=100.0).contains(p)),
        shutter_temp_k: raw.shutter_temp_k.filter(|t| t.is_finite()),
        aux_temp_k: raw.aux_temp_k.filter(|t| t.is_finite()),
        shutter: raw.shutter.map(|s| match s.as_str() {
            "open" => ShutterState::Open,
            "closed" => ShutterState::Closed,
            _ => ShutterState::Unknown,
        }),
        ffc: raw.ffc.map(|s| match s.as_str() {
            "idle" => FfcState::Idle,
            "running" => FfcState::Running,
            "complete" => FfcState::Complete,
            _ => FfcState::Unknown,
        }),
    })
}
