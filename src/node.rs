// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Node lifecycle and the two long-lived worker threads.
//!
//! [`StereoNode`] owns the enable/disable state machine.  Enabling opens the
//! device and starts two named threads: the camera sampling loop and the
//! transform listener loop.  Disabling clears both flags and joins both
//! threads; every blocking wait inside the loops is bounded (one frame
//! period for the grab, one poll interval plus three lookup timeouts for the
//! listener), so disable returns in bounded time from any reachable state.
//!
//! The device handle lives in a take/put-back slot: the camera thread takes
//! exclusive ownership for the duration of one enable cycle and returns the
//! closed handle on exit, whether it exits through disable or through the
//! consecutive-grab-failure fault path.  No iteration can touch the device
//! after disable returns.

use crate::camera::{timestamp, CameraDevice, Error, TrackingState};
use crate::compose::{compose, ComposeContext};
use crate::config::DriverConfig;
use crate::publish::OutputSink;
use crate::transform::{refresh_once, FrameNames, TransformCache, TransformLookup};
use crate::cloud::RoiBox;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

type DeviceSlot = Arc<Mutex<Option<Box<dyn CameraDevice>>>>;

/// Externally observable lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeStatus {
    /// Camera acquisition loop active.
    pub enabled: bool,
    /// Transform listener loop active.
    pub tf_listening: bool,
    /// The acquisition loop hit the consecutive-grab-failure threshold and
    /// forced itself off.  Cleared by the next successful enable.
    pub fault: bool,
}

/// Stereo camera node: device lifecycle, acquisition, and transform
/// listening.
pub struct StereoNode {
    config: DriverConfig,
    device: DeviceSlot,
    lookup: Arc<dyn TransformLookup>,
    sink: Arc<dyn OutputSink>,
    cache: Arc<TransformCache>,
    running: Arc<AtomicBool>,
    tf_listening: Arc<AtomicBool>,
    fault: Arc<AtomicBool>,
    camera_thread: Option<JoinHandle<()>>,
    tf_thread: Option<JoinHandle<()>>,
}

impl StereoNode {
    /// Create a disabled node.  The configuration is validated here; the
    /// device is not opened until the first enable.
    pub fn new(
        config: DriverConfig,
        device: Box<dyn CameraDevice>,
        lookup: Arc<dyn TransformLookup>,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            device: Arc::new(Mutex::new(Some(device))),
            lookup,
            sink,
            cache: Arc::new(TransformCache::new()),
            running: Arc::new(AtomicBool::new(false)),
            tf_listening: Arc::new(AtomicBool::new(false)),
            fault: Arc::new(AtomicBool::new(false)),
            camera_thread: None,
            tf_thread: None,
        })
    }

    /// The single enable/disable control operation.  Idempotent in both
    /// directions: enabling an enabled node and disabling a disabled node
    /// are successful no-ops.
    pub fn set_enabled(&mut self, enable: bool) -> Result<(), Error> {
        if enable {
            self.enable()
        } else {
            self.disable()
        }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            enabled: self.running.load(Ordering::Acquire),
            tf_listening: self.tf_listening.load(Ordering::Acquire),
            fault: self.fault.load(Ordering::Acquire),
        }
    }

    /// Replace the configuration of a disabled node.
    ///
    /// Rejected while enabled and on validation failure; in both cases the
    /// active configuration is left untouched.
    pub fn reconfigure(&mut self, config: DriverConfig) -> Result<(), Error> {
        if self.running.load(Ordering::Acquire) {
            return Err(Error::Busy("disable the node before reconfiguring"));
        }
        config.validate()?;
        self.config = config;
        Ok(())
    }

    fn enable(&mut self) -> Result<(), Error> {
        if self.running.load(Ordering::Acquire) {
            return Ok(());
        }

        // A faulted acquisition thread has already exited; reap its handle
        // before starting over.
        if let Some(handle) = self.camera_thread.take() {
            if handle.join().is_err() {
                error!("camera thread panicked");
            }
        }
        self.fault.store(false, Ordering::Release);

        let mut slot = self.device.lock();
        let mut device = slot
            .take()
            .ok_or(Error::Busy("device handle not returned yet"))?;
        if let Err(e) = device.open(&self.config) {
            *slot = Some(device);
            return Err(e);
        }
        drop(slot);

        let ctx = ComposeContext {
            frames: FrameNames::new(&self.config.link_namespace),
            roi_box: RoiBox::new(self.config.roi_box),
        };

        self.running.store(true, Ordering::Release);
        let camera_thread = thread::Builder::new()
            .name("camera".to_string())
            .spawn({
                let slot = Arc::clone(&self.device);
                let cache = Arc::clone(&self.cache);
                let sink = Arc::clone(&self.sink);
                let running = Arc::clone(&self.running);
                let fault = Arc::clone(&self.fault);
                let config = self.config.clone();
                move || acquisition_loop(device, slot, config, ctx, cache, sink, running, fault)
            })
            .expect("failed to spawn camera thread");
        self.camera_thread = Some(camera_thread);

        if self
            .tf_listening
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let tf_thread = thread::Builder::new()
                .name("tf_listener".to_string())
                .spawn({
                    let lookup = Arc::clone(&self.lookup);
                    let cache = Arc::clone(&self.cache);
                    let listening = Arc::clone(&self.tf_listening);
                    let frames = FrameNames::new(&self.config.link_namespace);
                    let poll_interval = self.config.tf_poll_interval;
                    let lookup_timeout = self.config.tf_lookup_timeout;
                    move || {
                        tf_refresh_loop(lookup, frames, cache, listening, poll_interval, lookup_timeout)
                    }
                })
                .expect("failed to spawn tf thread");
            self.tf_thread = Some(tf_thread);
        }

        info!("node enabled");
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Error> {
        self.running.store(false, Ordering::Release);
        self.tf_listening.store(false, Ordering::Release);

        if let Some(handle) = self.camera_thread.take() {
            if handle.join().is_err() {
                error!("camera thread panicked");
            }
        }
        if let Some(handle) = self.tf_thread.take() {
            if handle.join().is_err() {
                error!("tf thread panicked");
            }
        }

        info!("node disabled");
        Ok(())
    }
}

impl Drop for StereoNode {
    fn drop(&mut self) {
        let _ = self.disable();
    }
}

/// Camera sampling loop: one grab / snapshot / compose / publish cycle per
/// frame, with the consecutive-failure escalation policy.
#[allow(clippy::too_many_arguments)]
fn acquisition_loop(
    mut device: Box<dyn CameraDevice>,
    slot: DeviceSlot,
    config: DriverConfig,
    ctx: ComposeContext,
    cache: Arc<TransformCache>,
    sink: Arc<dyn OutputSink>,
    running: Arc<AtomicBool>,
    fault: Arc<AtomicBool>,
) {
    info!("camera sampling thread started");
    let period = config.frame_period();
    let mut failures: u32 = 0;

    while running.load(Ordering::Acquire) {
        if let Err(e) = device.grab(period) {
            failures += 1;
            warn!(
                "failed to grab frame ({}/{}): {}",
                failures, config.grab_failure_limit, e
            );
            if failures >= config.grab_failure_limit {
                error!("{}", Error::Disconnected(failures));
                running.store(false, Ordering::Release);
                fault.store(true, Ordering::Release);
                break;
            }
            continue;
        }
        failures = 0;

        let sample = match device.retrieve() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("failed to retrieve sample: {}", e);
                continue;
            }
        };

        if config.verbose && sample.tracking != TrackingState::Ok {
            warn!("positional tracking degraded: {}", sample.tracking);
        }

        let snapshot = cache.snapshot();
        let outputs = compose(&sample, &snapshot, &ctx);
        sink.publish(&outputs);
    }

    device.close();
    *slot.lock() = Some(device);
    info!("camera sampling thread stopped");
}

/// Transform listener loop: refresh the three cached relationships, then
/// sleep one poll interval.
fn tf_refresh_loop(
    lookup: Arc<dyn TransformLookup>,
    frames: FrameNames,
    cache: Arc<TransformCache>,
    listening: Arc<AtomicBool>,
    poll_interval: Duration,
    lookup_timeout: Duration,
) {
    info!("transform listener thread started");

    while listening.load(Ordering::Acquire) {
        let now = timestamp().unwrap_or(0);
        refresh_once(lookup.as_ref(), &frames, &cache, lookup_timeout, now);
        thread::sleep(poll_interval);
    }

    info!("transform listener thread stopped");
}
