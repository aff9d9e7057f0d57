// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Point cloud formatting and region-of-interest culling.
//!
//! The depth engine hands the node a finished XYZ+RGBA cloud in the left
//! camera frame; this module packs it into the 16-byte-stride binary layout
//! of a ROS PointCloud2 message and extracts the subset falling inside the
//! configured ROI box.
//!
//! # Format
//!
//! ```text
//! ┌───────┬───────┬───────┬──────────┐
//! │ x:f32 │ y:f32 │ z:f32 │ rgba:f32 │
//! │ 4B    │ 4B    │ 4B    │ 4B       │
//! └───────┴───────┴───────┴──────────┘
//! ```

use crate::camera::CloudPoints;
use edgefirst_schemas::{
    builtin_interfaces::Time,
    sensor_msgs::{PointCloud2, PointField},
    std_msgs::Header,
};
use itertools::izip;

/// Point field data types for PointCloud2 messages.
///
/// These values correspond to the ROS sensor_msgs/PointField datatype field.
/// All variants are defined for completeness, even if not all are currently
/// used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
pub enum PointFieldType {
    INT8 = 1,
    UINT8 = 2,
    INT16 = 3,
    UINT16 = 4,
    INT32 = 5,
    UINT32 = 6,
    FLOAT32 = 7,
    FLOAT64 = 8,
}

/// Bytes per point in the packed layout.
pub const POINT_STEP: u32 = 16;

/// Build the XYZ + RGBA point fields (16-byte stride).
pub fn xyz_rgba_fields() -> Vec<PointField> {
    vec![
        PointField {
            name: String::from("x"),
            offset: 0,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
        PointField {
            name: String::from("y"),
            offset: 4,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
        PointField {
            name: String::from("z"),
            offset: 8,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
        PointField {
            name: String::from("rgba"),
            offset: 12,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
    ]
}

/// Pack an SoA cloud into the 16-byte interleaved layout.
pub fn format_points_xyzrgba(points: &CloudPoints) -> Vec<u8> {
    let mut data = Vec::with_capacity(points.len() * POINT_STEP as usize);
    for (x, y, z, rgba) in izip!(&points.x, &points.y, &points.z, &points.rgba) {
        data.extend_from_slice(&x.to_ne_bytes());
        data.extend_from_slice(&y.to_ne_bytes());
        data.extend_from_slice(&z.to_ne_bytes());
        data.extend_from_slice(&rgba.to_ne_bytes());
    }
    data
}

/// Axis-aligned ROI box anchored at the sensor.
///
/// The box extends forward from the optical center: a point is inside when
/// `0 < x < size[0]`, `|y| < size[1] / 2`, and `|z| < size[2] / 2`, all in
/// the camera frame.
#[derive(Clone, Copy, Debug)]
pub struct RoiBox {
    pub size: [f64; 3],
}

impl RoiBox {
    pub fn new(size: [f64; 3]) -> Self {
        Self { size }
    }

    /// Check whether a camera-frame point falls inside the box.
    #[inline]
    pub fn contains(&self, x: f32, y: f32, z: f32) -> bool {
        let (x, y, z) = (x as f64, y as f64, z as f64);
        x > 0.0
            && x < self.size[0]
            && y.abs() < self.size[1] / 2.0
            && z.abs() < self.size[2] / 2.0
    }
}

/// Extract the subset of a cloud inside the ROI box.
///
/// Points with a non-finite coordinate are dropped from the result, as they
/// are holes the depth engine could not resolve.
pub fn cull_roi(points: &CloudPoints, roi: &RoiBox) -> CloudPoints {
    let mut culled = CloudPoints::default();
    for (&x, &y, &z, &rgba) in izip!(&points.x, &points.y, &points.z, &points.rgba) {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            continue;
        }
        if roi.contains(x, y, z) {
            culled.push(x, y, z, rgba);
        }
    }
    culled
}

/// Build a PointCloud2 message from an SoA cloud.
pub fn cloud_to_msg(points: &CloudPoints, stamp: Time, frame_id: String) -> PointCloud2 {
    let n_points = points.len();
    PointCloud2 {
        header: Header { stamp, frame_id },
        height: 1,
        width: n_points as u32,
        fields: xyz_rgba_fields(),
        is_bigendian: false,
        point_step: POINT_STEP,
        row_step: POINT_STEP * n_points as u32,
        data: format_points_xyzrgba(points),
        is_dense: true,
    }
}
