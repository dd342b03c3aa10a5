//! Handoff between the sampling task and the uplink task
//!
//! The sampler overwrites a single slot with the newest frame; the uplink task
//! copies it out on every transmit cycle. Both sides go through a
//! critical-section mutex so a reader never sees a half-written frame.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, warn};
use thiserror_no_std::Error;

use crate::sensors::{Sensor, SensorError};
use crate::telemetry::{Measurement, TelemetryError, TelemetryFrame};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleError {
    #[error("Sensor error: {0}")]
    Sensor(SensorError),
    #[error("Telemetry error: {0}")]
    Telemetry(TelemetryError),
}

impl From<SensorError> for SampleError {
    fn from(value: SensorError) -> Self {
        Self::Sensor(value)
    }
}

impl From<TelemetryError> for SampleError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

/// A published frame and its position in the sample sequence (from 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub sequence: u32,
    pub measurement: Measurement,
    pub frame: TelemetryFrame,
}

/// The shared message buffer.
pub struct LatestFrame {
    slot: Mutex<CriticalSectionRawMutex, Cell<Option<Sample>>>,
}

impl Default for LatestFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestFrame {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
        }
    }

    /// Replace the slot with a new frame and return its sequence number.
    pub fn publish(&self, measurement: Measurement, frame: TelemetryFrame) -> u32 {
        self.slot.lock(|slot| {
            let sequence = slot.get().map_or(0, |s| s.sequence).wrapping_add(1);
            slot.set(Some(Sample {
                sequence,
                measurement,
                frame,
            }));
            sequence
        })
    }

    /// Copy of the newest sample, if any was published yet.
    pub fn latest(&self) -> Option<Sample> {
        self.slot.lock(Cell::get)
    }

    /// Number of samples published so far.
    pub fn published(&self) -> u32 {
        self.latest().map_or(0, |s| s.sequence)
    }
}

/// Read `sensor` once, render the frame and publish it to `latest`.
///
/// On failure the previous frame stays in place.
pub async fn sample_once<S>(sensor: &mut S, latest: &LatestFrame) -> Result<Sample, SampleError>
where
    S: Sensor<Readings = Measurement>,
{
    let measurement = sensor.read().await?;
    let frame = TelemetryFrame::encode(&measurement).inspect_err(|e| {
        warn!("Dropping sample: {}", e);
    })?;

    let sequence = latest.publish(measurement, frame);
    debug!("Published sample #{}: {}", sequence, frame.as_text());

    Ok(Sample {
        sequence,
        measurement,
        frame,
    })
}
