// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Transform cache, refresh cycle, and the transform-tree lookup boundary.
//!
//! The node depends on three coordinate relationships maintained outside the
//! process: `odom -> camera_odom`, `base_link -> camera_link`, and
//! `map -> camera_odom`.  A dedicated thread refreshes them through a
//! [`TransformLookup`] implementation while the acquisition loop reads an
//! atomically copied [`TransformSnapshot`] once per frame.  Each relationship
//! degrades independently: a failed lookup keeps the previous value, and a
//! slot that has never resolved stays invalid so derived outputs depending on
//! it are withheld rather than published with garbage.
//!
//! Staleness is acceptable by design; tearing is not.  The cache mutex is
//! held only for the copy or the single-slot replace, never across a lookup.

use edgefirst_schemas::geometry_msgs::{Quaternion, Transform, Vector3};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// One cached coordinate relationship.
///
/// `valid` is false until the first successful lookup; `stamp` is the
/// monotonic time of the last refresh that produced `transform`.
#[derive(Clone, Copy, Debug)]
pub struct StampedTransform {
    pub transform: Isometry3<f64>,
    pub stamp: u64,
    pub valid: bool,
}

impl StampedTransform {
    /// A transform that has never been resolved.
    pub fn unresolved() -> Self {
        Self {
            transform: Isometry3::identity(),
            stamp: 0,
            valid: false,
        }
    }

    /// A freshly resolved transform.
    pub fn resolved(transform: Isometry3<f64>, stamp: u64) -> Self {
        Self {
            transform,
            stamp,
            valid: true,
        }
    }
}

impl Default for StampedTransform {
    fn default() -> Self {
        Self::unresolved()
    }
}

/// Internally consistent copy of the three cached relationships.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransformSnapshot {
    pub odom_to_camera_odom: StampedTransform,
    pub base_link_to_camera: StampedTransform,
    pub map_to_camera_odom: StampedTransform,
}

/// Shared transform cache.
///
/// Written by the refresh thread, read by the acquisition thread.  Readers
/// get a copy under the lock so a snapshot always reflects a state the
/// writer fully committed; writers replace one slot per lock acquisition.
#[derive(Default)]
pub struct TransformCache {
    inner: Mutex<TransformSnapshot>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically copy the current state.
    pub fn snapshot(&self) -> TransformSnapshot {
        *self.inner.lock()
    }

    /// Mutate the cached state under the lock.
    ///
    /// The closure must not block; it runs inside the copy/replace critical
    /// section shared with every reader.
    pub fn update<F: FnOnce(&mut TransformSnapshot)>(&self, f: F) {
        f(&mut self.inner.lock());
    }
}

/// Failure modes of a transform lookup.
#[derive(Debug)]
pub enum LookupError {
    /// The relationship did not resolve within the bounded timeout.
    Timeout,
    /// The service rejected the query (unknown frame, extrapolation, ...).
    Unavailable(String),
}

impl std::error::Error for LookupError {}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LookupError::Timeout => write!(f, "lookup timed out"),
            LookupError::Unavailable(msg) => write!(f, "transform unavailable: {}", msg),
        }
    }
}

/// Trait for transform-tree service implementations.
///
/// `lookup` resolves the rigid transform taking coordinates in `source` to
/// coordinates in `target`, waiting at most `timeout`.  Implementations must
/// never block past the timeout; the refresh loop's shutdown bound depends
/// on it.
pub trait TransformLookup: Send + Sync {
    fn lookup(
        &self,
        target: &str,
        source: &str,
        timeout: Duration,
    ) -> Result<Isometry3<f64>, LookupError>;
}

/// Frame names for one camera instance, namespace-qualified except for the
/// global map frame.
#[derive(Clone, Debug)]
pub struct FrameNames {
    pub map: String,
    pub odom: String,
    pub camera_odom: String,
    pub base_link: String,
    pub camera_link: String,
    pub camera_left: String,
    pub camera_right: String,
    pub camera_imu: String,
}

impl FrameNames {
    pub fn new(link_namespace: &str) -> Self {
        Self {
            map: "map".to_string(),
            odom: format!("{}odom", link_namespace),
            camera_odom: format!("{}camera_odom", link_namespace),
            base_link: format!("{}base_link", link_namespace),
            camera_link: format!("{}camera_link", link_namespace),
            camera_left: format!("{}camera_link/left", link_namespace),
            camera_right: format!("{}camera_link/right", link_namespace),
            camera_imu: format!("{}camera_imu", link_namespace),
        }
    }
}

/// Run one refresh cycle: query each of the three relationships and replace
/// exactly the slots that resolved.
///
/// A timeout keeps the previous slot silently; any other failure keeps it
/// too but is logged.  The cache lock is taken once per successful lookup,
/// never across the lookup itself.
pub fn refresh_once(
    lookup: &dyn TransformLookup,
    frames: &FrameNames,
    cache: &TransformCache,
    timeout: Duration,
    now: u64,
) {
    match lookup.lookup(&frames.odom, &frames.camera_odom, timeout) {
        Ok(t) => cache.update(|s| s.odom_to_camera_odom = StampedTransform::resolved(t, now)),
        Err(LookupError::Timeout) => {}
        Err(e) => debug!(
            "transform lookup {} -> {}: {}",
            frames.odom, frames.camera_odom, e
        ),
    }

    match lookup.lookup(&frames.base_link, &frames.camera_link, timeout) {
        Ok(t) => cache.update(|s| s.base_link_to_camera = StampedTransform::resolved(t, now)),
        Err(LookupError::Timeout) => {}
        Err(e) => debug!(
            "transform lookup {} -> {}: {}",
            frames.base_link, frames.camera_link, e
        ),
    }

    match lookup.lookup(&frames.map, &frames.camera_odom, timeout) {
        Ok(t) => cache.update(|s| s.map_to_camera_odom = StampedTransform::resolved(t, now)),
        Err(LookupError::Timeout) => {}
        Err(e) => debug!(
            "transform lookup {} -> {}: {}",
            frames.map, frames.camera_odom, e
        ),
    }
}

/// Convert a wire transform into an isometry.
pub fn transform_to_isometry(t: &Transform) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(t.translation.x, t.translation.y, t.translation.z),
        UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
            t.rotation.w,
            t.rotation.x,
            t.rotation.y,
            t.rotation.z,
        )),
    )
}

/// Convert an isometry into a wire transform.
pub fn isometry_to_transform(iso: &Isometry3<f64>) -> Transform {
    Transform {
        translation: Vector3 {
            x: iso.translation.x,
            y: iso.translation.y,
            z: iso.translation.z,
        },
        rotation: Quaternion {
            x: iso.rotation.i,
            y: iso.rotation.j,
            z: iso.rotation.k,
            w: iso.rotation.w,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3 as NVector3;
    use std::sync::Arc;
    use std::thread;

    fn stamped(x: f64, stamp: u64) -> StampedTransform {
        StampedTransform::resolved(
            Isometry3::translation(x, 0.0, 0.0),
            stamp,
        )
    }

    #[test]
    fn test_snapshot_starts_unresolved() {
        let cache = TransformCache::new();
        let snap = cache.snapshot();
        assert!(!snap.odom_to_camera_odom.valid);
        assert!(!snap.base_link_to_camera.valid);
        assert!(!snap.map_to_camera_odom.valid);
    }

    #[test]
    fn test_single_slot_replace_leaves_others() {
        let cache = TransformCache::new();
        cache.update(|s| s.map_to_camera_odom = stamped(1.0, 42));

        let snap = cache.snapshot();
        assert!(snap.map_to_camera_odom.valid);
        assert_eq!(snap.map_to_camera_odom.stamp, 42);
        assert!(!snap.odom_to_camera_odom.valid);
        assert!(!snap.base_link_to_camera.valid);
    }

    /// Concurrent writers replace the whole tuple; every reader snapshot must
    /// equal one fully committed tuple (same stamp in all three slots), never
    /// a mix of two writes.
    #[test]
    fn test_snapshots_are_never_torn() {
        let cache = Arc::new(TransformCache::new());

        // Seed with write #0 so readers never see the unresolved state.
        cache.update(|s| {
            *s = TransformSnapshot {
                odom_to_camera_odom: stamped(0.0, 0),
                base_link_to_camera: stamped(0.0, 0),
                map_to_camera_odom: stamped(0.0, 0),
            }
        });

        let writer = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 1..=1000u64 {
                    cache.update(|s| {
                        *s = TransformSnapshot {
                            odom_to_camera_odom: stamped(i as f64, i),
                            base_link_to_camera: stamped(i as f64 * 2.0, i),
                            map_to_camera_odom: stamped(i as f64 * 3.0, i),
                        }
                    });
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let snap = cache.snapshot();
                        let i = snap.odom_to_camera_odom.stamp;
                        assert_eq!(snap.base_link_to_camera.stamp, i);
                        assert_eq!(snap.map_to_camera_odom.stamp, i);
                        assert_eq!(snap.odom_to_camera_odom.transform.translation.x, i as f64);
                        assert_eq!(
                            snap.base_link_to_camera.transform.translation.x,
                            i as f64 * 2.0
                        );
                        assert_eq!(
                            snap.map_to_camera_odom.transform.translation.x,
                            i as f64 * 3.0
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    struct FixedLookup {
        offset: f64,
        fail_map: bool,
    }

    impl TransformLookup for FixedLookup {
        fn lookup(
            &self,
            target: &str,
            _source: &str,
            _timeout: Duration,
        ) -> Result<Isometry3<f64>, LookupError> {
            if self.fail_map && target == "map" {
                return Err(LookupError::Timeout);
            }
            Ok(Isometry3::translation(self.offset, 0.0, 0.0))
        }
    }

    #[test]
    fn test_refresh_replaces_resolved_slots_only() {
        let cache = TransformCache::new();
        let frames = FrameNames::new("");
        let lookup = FixedLookup {
            offset: 5.0,
            fail_map: true,
        };

        refresh_once(&lookup, &frames, &cache, Duration::from_millis(10), 7);

        let snap = cache.snapshot();
        assert!(snap.odom_to_camera_odom.valid);
        assert!(snap.base_link_to_camera.valid);
        assert_eq!(snap.odom_to_camera_odom.stamp, 7);
        assert!(!snap.map_to_camera_odom.valid);
    }

    #[test]
    fn test_refresh_failure_keeps_previous_value() {
        let cache = TransformCache::new();
        let frames = FrameNames::new("");

        let good = FixedLookup {
            offset: 5.0,
            fail_map: false,
        };
        refresh_once(&good, &frames, &cache, Duration::from_millis(10), 1);
        assert!(cache.snapshot().map_to_camera_odom.valid);

        let bad = FixedLookup {
            offset: 9.0,
            fail_map: true,
        };
        refresh_once(&bad, &frames, &cache, Duration::from_millis(10), 2);

        let snap = cache.snapshot();
        // map kept the last resolved value and stamp
        assert!(snap.map_to_camera_odom.valid);
        assert_eq!(snap.map_to_camera_odom.stamp, 1);
        assert_eq!(snap.map_to_camera_odom.transform.translation.x, 5.0);
        // the others moved on
        assert_eq!(snap.odom_to_camera_odom.stamp, 2);
        assert_eq!(snap.odom_to_camera_odom.transform.translation.x, 9.0);
    }

    #[test]
    fn test_frame_names_namespacing() {
        let frames = FrameNames::new("drone_1/");
        assert_eq!(frames.map, "map");
        assert_eq!(frames.odom, "drone_1/odom");
        assert_eq!(frames.camera_odom, "drone_1/camera_odom");
        assert_eq!(frames.camera_left, "drone_1/camera_link/left");
    }

    #[test]
    fn test_transform_isometry_round_trip() {
        let iso = Isometry3::from_parts(
            Translation3::new(1.0, -2.0, 3.0),
            UnitQuaternion::from_axis_angle(&NVector3::z_axis(), 0.5),
        );
        let msg = isometry_to_transform(&iso);
        let back = transform_to_isometry(&msg);

        assert!((iso.translation.vector - back.translation.vector).norm() < 1e-12);
        assert!(iso.rotation.angle_to(&back.rotation) < 1e-12);
    }
}
