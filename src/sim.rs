// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Synthetic camera backend for hardware-free operation.
//!
//! [`SimCamera`] implements [`CameraDevice`] with a deterministic scene: the
//! camera orbits a 2 m circle at constant rate with a tangent heading, so
//! pose, twist, and IMU samples stay mutually consistent, and the depth
//! engine output is a flat wall of points 2 m ahead.  Frames are produced at
//! the configured rate with drift-free pacing.
//!
//! This backend fills the role the packet replay sources fill for the LiDAR
//! publishers: everything above the device trait can run, be demonstrated,
//! and be profiled without hardware attached.

use crate::camera::{
    timestamp, CameraDevice, CameraSample, CloudPoints, Error, ImageFrame, ImuSample, PoseSample,
    TrackingState, TwistSample,
};
use crate::config::DriverConfig;
use nalgebra::{UnitQuaternion, Vector3};
use std::thread;
use std::time::{Duration, Instant};

/// Orbit radius in metres.
const RADIUS: f64 = 2.0;
/// Orbit rate in rad/s.
const ANGULAR_RATE: f64 = 0.25;
/// Camera height above the odom origin in metres.
const HEIGHT: f64 = 1.0;
/// Distance of the synthetic wall from the camera in metres.
const WALL_DISTANCE: f32 = 2.0;
/// Gravity reported by the synthetic accelerometer.
const GRAVITY: f64 = 9.81;

/// Deterministic synthetic stereo camera.
pub struct SimCamera {
    open: bool,
    grabbed: bool,
    period: Duration,
    next_frame: Instant,
    t0: u64,
    seq: u64,
    width: u32,
    height: u32,
}

impl SimCamera {
    pub fn new() -> Self {
        Self {
            open: false,
            grabbed: false,
            period: Duration::from_millis(66),
            next_frame: Instant::now(),
            t0: 0,
            seq: 0,
            width: 0,
            height: 0,
        }
    }

    fn frame(&self, shade: u8) -> ImageFrame {
        let mut frame = ImageFrame::black(self.width, self.height);
        for row in 0..self.height {
            for col in 0..self.width {
                let idx = ((row * self.width + col) * 4) as usize;
                frame.data[idx] = (col * 255 / self.width.max(1)) as u8;
                frame.data[idx + 1] = (row * 255 / self.height.max(1)) as u8;
                frame.data[idx + 2] = shade;
                frame.data[idx + 3] = 255;
            }
        }
        frame
    }

    fn wall_cloud(&self) -> CloudPoints {
        let (cols, rows) = (16usize, 12usize);
        let mut cloud = CloudPoints::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let y = (col as f32 / (cols - 1) as f32) * 2.0 - 1.0;
                let z = (row as f32 / (rows - 1) as f32) * 1.5 - 0.75;
                let rgba = f32::from_bits(u32::from_ne_bytes([
                    (col * 16) as u8,
                    (row * 20) as u8,
                    0x80,
                    0xff,
                ]));
                cloud.push(WALL_DISTANCE, y, z, rgba);
            }
        }
        cloud
    }
}

impl Default for SimCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for SimCamera {
    fn open(&mut self, config: &DriverConfig) -> Result<(), Error> {
        let (width, height) = config.resolution.dimensions();
        // Quarter-scale frames keep the synthetic stream lightweight while
        // preserving the configured aspect ratio.
        self.width = width / 4;
        self.height = height / 4;
        self.period = config.frame_period();
        self.next_frame = Instant::now();
        self.t0 = timestamp()?;
        self.seq = 0;
        self.grabbed = false;
        self.open = true;
        Ok(())
    }

    fn grab(&mut self, timeout: Duration) -> Result<(), Error> {
        if !self.open {
            return Err(Error::Grab("camera not open".to_string()));
        }

        let wait = self.next_frame.saturating_duration_since(Instant::now());
        if wait > timeout {
            thread::sleep(timeout);
            return Err(Error::Grab("frame not ready".to_string()));
        }
        thread::sleep(wait);
        self.next_frame += self.period;
        self.seq += 1;
        self.grabbed = true;
        Ok(())
    }

    fn retrieve(&mut self) -> Result<CameraSample, Error> {
        if !self.open || !self.grabbed {
            return Err(Error::Retrieve("no frame grabbed".to_string()));
        }
        self.grabbed = false;

        let now = timestamp()?;
        let t = (now - self.t0) as f64 / 1e9;
        let theta = ANGULAR_RATE * t;

        // Tangent heading: body x forward along the orbit, body y toward the
        // center, so the centripetal acceleration appears on +y.
        let position = Vector3::new(RADIUS * theta.cos(), RADIUS * theta.sin(), HEIGHT);
        let orientation = UnitQuaternion::from_axis_angle(
            &Vector3::z_axis(),
            theta + std::f64::consts::FRAC_PI_2,
        );

        let mut covariance = [0.0; 36];
        for i in 0..6 {
            covariance[i * 6 + i] = 1e-4;
        }

        let mut pose = PoseSample::identity();
        pose.position = position;
        pose.orientation = orientation;
        pose.covariance = covariance;

        let mut twist = TwistSample::zero();
        twist.linear = Vector3::new(RADIUS * ANGULAR_RATE, 0.0, 0.0);
        twist.angular = Vector3::new(0.0, 0.0, ANGULAR_RATE);
        twist.covariance = covariance;

        let mut imu = ImuSample::zero();
        imu.orientation = orientation;
        imu.angular_velocity = twist.angular;
        imu.linear_acceleration =
            Vector3::new(0.0, RADIUS * ANGULAR_RATE * ANGULAR_RATE, GRAVITY);

        let shade = (self.seq % 256) as u8;

        Ok(CameraSample {
            timestamp: now,
            pose,
            twist,
            imu,
            tracking: TrackingState::Ok,
            left: self.frame(shade),
            right: self.frame(shade.wrapping_add(128)),
            depth: self.frame(0x40),
            cloud: self.wall_cloud(),
        })
    }

    fn close(&mut self) {
        self.open = false;
        self.grabbed = false;
    }
}
