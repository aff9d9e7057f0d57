// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common camera types and the device trait abstraction.
//!
//! This module provides the sample types produced by a stereo/inertial camera
//! and the [`CameraDevice`] trait that abstracts the vendor SDK behind the
//! four calls the acquisition loop actually issues: open, grab, retrieve,
//! close.  Implementations wrap a real SDK or generate synthetic data (see
//! [`crate::sim`]); the node logic above this trait is identical either way.

use crate::config::DriverConfig;
use edgefirst_schemas::builtin_interfaces::Time;
use nalgebra::{UnitQuaternion, Vector3};
use std::fmt;
use std::time::Duration;

/// 6-DoF pose estimate in the device's odometry frame.
#[derive(Clone, Copy, Debug)]
pub struct PoseSample {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    /// Row-major 6x6 covariance (x, y, z, roll, pitch, yaw).
    pub covariance: [f64; 36],
}

impl PoseSample {
    /// Identity pose with zero covariance.
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            covariance: [0.0; 36],
        }
    }
}

/// Body-frame velocity estimate paired with a pose sample.
#[derive(Clone, Copy, Debug)]
pub struct TwistSample {
    /// Linear velocity in m/s, sensor body frame.
    pub linear: Vector3<f64>,
    /// Angular velocity in rad/s, sensor body frame.
    pub angular: Vector3<f64>,
    /// Row-major 6x6 covariance.
    pub covariance: [f64; 36],
}

impl TwistSample {
    /// Zero twist with zero covariance.
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
            covariance: [0.0; 36],
        }
    }
}

/// One inertial measurement from the onboard IMU.
///
/// Angular velocity is in rad/s; implementations converting from SDKs that
/// report deg/s must normalize before constructing this type.
#[derive(Clone, Copy, Debug)]
pub struct ImuSample {
    pub orientation: UnitQuaternion<f64>,
    pub orientation_covariance: [f64; 9],
    pub angular_velocity: Vector3<f64>,
    pub angular_velocity_covariance: [f64; 9],
    pub linear_acceleration: Vector3<f64>,
    pub linear_acceleration_covariance: [f64; 9],
}

impl ImuSample {
    /// Zeroed measurement.
    pub fn zero() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            orientation_covariance: [0.0; 9],
            angular_velocity: Vector3::zeros(),
            angular_velocity_covariance: [0.0; 9],
            linear_acceleration: Vector3::zeros(),
            linear_acceleration_covariance: [0.0; 9],
        }
    }
}

/// A rectified BGRA8 frame (left, right, or depth view).
#[derive(Clone, Debug, Default)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    /// Row-major BGRA8 pixel data, 4 bytes per pixel.
    pub data: Vec<u8>,
}

impl ImageFrame {
    /// Create a zeroed frame of the given dimensions.
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width * height * 4) as usize],
        }
    }

    /// Row stride in bytes.
    #[inline]
    pub fn step(&self) -> u32 {
        self.width * 4
    }
}

/// Point cloud output structure in SoA layout.
///
/// Coordinates are in the left camera frame; `rgba` carries the packed color
/// of each point reinterpreted as an f32, as the depth engine returns it.
#[derive(Clone, Debug, Default)]
pub struct CloudPoints {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub rgba: Vec<f32>,
}

impl CloudPoints {
    /// Create an empty cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            rgba: Vec::with_capacity(capacity),
        }
    }

    /// Append one point.
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32, rgba: f32) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
        self.rgba.push(rgba);
    }

    /// Get the current number of points.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Positional tracking state reported alongside a pose sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackingState {
    /// Tracking nominal.
    #[default]
    Ok,
    /// Positional tracking disabled or not yet initialized.
    Off,
    /// Frame rate too low for reliable tracking.
    FpsTooLow,
    /// Track lost, relocalizing.
    Searching,
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrackingState::Ok => write!(f, "ok"),
            TrackingState::Off => write!(f, "off"),
            TrackingState::FpsTooLow => write!(f, "fps too low"),
            TrackingState::Searching => write!(f, "searching"),
        }
    }
}

/// Complete sample from one grab cycle.
///
/// Constructed once per acquisition iteration, consumed by one composition
/// call, then dropped; samples are never retained across iterations.
#[derive(Clone, Debug)]
pub struct CameraSample {
    /// Device timestamp in nanoseconds, shared by every field.
    pub timestamp: u64,
    pub pose: PoseSample,
    pub twist: TwistSample,
    pub imu: ImuSample,
    pub tracking: TrackingState,
    pub left: ImageFrame,
    pub right: ImageFrame,
    pub depth: ImageFrame,
    pub cloud: CloudPoints,
}

/// Common error type for driver operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, file operations)
    Io(std::io::Error),
    /// Configuration rejected at validation time
    Config(String),
    /// Single failed frame grab (transient)
    Grab(String),
    /// Failed retrieval of a sample component (transient)
    Retrieve(String),
    /// Consecutive-grab-failure threshold exceeded
    Disconnected(u32),
    /// Message encoding error
    Encode(String),
    /// Session or publisher error from the transport layer
    Session(String),
    /// Operation rejected in the current lifecycle state
    Busy(&'static str),
    /// System time error
    SystemTime(std::time::SystemTimeError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::Grab(msg) => write!(f, "grab failed: {}", msg),
            Error::Retrieve(msg) => write!(f, "retrieve failed: {}", msg),
            Error::Disconnected(n) => {
                write!(f, "camera disconnected after {} consecutive grab failures", n)
            }
            Error::Encode(msg) => write!(f, "encode error: {}", msg),
            Error::Session(msg) => write!(f, "session error: {}", msg),
            Error::Busy(msg) => write!(f, "operation rejected: {}", msg),
            Error::SystemTime(err) => write!(f, "system time error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(err: std::time::SystemTimeError) -> Self {
        Error::SystemTime(err)
    }
}

/// Trait for stereo camera device implementations.
///
/// Mirrors the call shape of the vendor SDK: a device is opened with a
/// validated configuration, grabbed once per frame period with a bounded
/// timeout, and drained with a single retrieve per successful grab.  All
/// calls are synchronous; the acquisition loop owns the device exclusively
/// between open and close.
pub trait CameraDevice: Send {
    /// Open the device.  On failure the device must be left closed.
    fn open(&mut self, config: &DriverConfig) -> Result<(), Error>;

    /// Block until the next frame is ready, at most `timeout`.
    ///
    /// # Returns
    /// - `Ok(())` when a new frame is available for [`Self::retrieve`]
    /// - `Err(Error::Grab)` on a transient failure; the iteration is skipped
    fn grab(&mut self, timeout: Duration) -> Result<(), Error>;

    /// Retrieve the sample for the last successful grab.
    fn retrieve(&mut self) -> Result<CameraSample, Error>;

    /// Close the device.  Idempotent.
    fn close(&mut self);
}

/// Get current timestamp in nanoseconds.
///
/// On Linux, uses `CLOCK_MONOTONIC_RAW` for best accuracy.
/// On other platforms, falls back to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<u64, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(tp.tv_sec as u64 * 1_000_000_000 + tp.tv_nsec as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<u64, Error> {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH)?;
    Ok(duration.as_nanos() as u64)
}

/// Split a nanosecond timestamp into a ROS `Time`.
pub fn time_from_nanos(nanos: u64) -> Time {
    Time {
        sec: (nanos / 1_000_000_000) as i32,
        nanosec: (nanos % 1_000_000_000) as u32,
    }
}
