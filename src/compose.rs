// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pure composition of one camera sample with one transform snapshot.
//!
//! [`compose`] is the only place output messages are derived.  It performs no
//! I/O and takes no locks: the acquisition loop hands it an owned sample and
//! an already-copied snapshot, and every message in the resulting
//! [`Outputs`] carries the same timestamp, so downstream consumers can
//! correlate any two messages from one invocation by stamp alone.
//!
//! Frame conventions, fixed here and verified by the tests below:
//!
//! ```text
//! T_odom_base = T_odom_camodom * T_camodom_cam * inverse(T_base_cam)
//! T_map_cam   = T_map_camodom  * T_camodom_cam
//! ```
//!
//! where `T_camodom_cam` is the device pose sample.  Base-frame twist is the
//! body-frame twist rotated by `inverse(R_base_cam)`; the angular lever-arm
//! term is omitted, matching the upstream rig where the offset is millimetric.
//!
//! Derived outputs are withheld, not zeroed, when a transform slot they
//! depend on is invalid: base odometry needs `odom -> camera_odom` and
//! `base_link -> camera_link`, map odometry needs `map -> camera_odom`, and
//! the sensor-native outputs need nothing.

use crate::camera::{time_from_nanos, CameraSample, ImageFrame, ImuSample, PoseSample};
use crate::cloud::{self, RoiBox};
use crate::transform::{FrameNames, TransformSnapshot};
use edgefirst_schemas::{
    builtin_interfaces::Time,
    geometry_msgs::{Point, Pose, PoseWithCovariance, Quaternion, Twist, TwistWithCovariance, Vector3},
    nav_msgs::Odometry,
    sensor_msgs::{Image, Imu, PointCloud2},
    std_msgs::Header,
};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};

/// Immutable context shared by every composition call of one enable cycle.
#[derive(Clone, Debug)]
pub struct ComposeContext {
    pub frames: FrameNames,
    pub roi_box: RoiBox,
}

/// The full output set for one sample.
///
/// `base_link_odom` and `map_odom` are `None` when the transforms they
/// depend on have not resolved; everything else is always present.
pub struct Outputs {
    pub camera_odom: Odometry,
    pub base_link_odom: Option<Odometry>,
    pub map_odom: Option<Odometry>,
    pub imu: Imu,
    pub left: Image,
    pub right: Image,
    pub depth: Image,
    pub cloud: PointCloud2,
    pub roi_cloud: PointCloud2,
}

/// Derive the full output set from one sample and one snapshot.
pub fn compose(sample: &CameraSample, tfs: &TransformSnapshot, ctx: &ComposeContext) -> Outputs {
    let stamp = time_from_nanos(sample.timestamp);
    let t_camodom_cam = pose_isometry(&sample.pose);

    // Sensor-native odometry: the device pose verbatim.
    let camera_odom = odometry(
        header(stamp.clone(), &ctx.frames.camera_odom),
        ctx.frames.camera_link.clone(),
        &t_camodom_cam,
        sample.pose.covariance,
        &sample.twist.linear,
        &sample.twist.angular,
        sample.twist.covariance,
    );

    // Pose of base_link in the vehicle odom frame.
    let base_link_odom = if tfs.odom_to_camera_odom.valid && tfs.base_link_to_camera.valid {
        let t_odom_base = tfs.odom_to_camera_odom.transform
            * t_camodom_cam
            * tfs.base_link_to_camera.transform.inverse();
        let r_cam_base = tfs.base_link_to_camera.transform.rotation.inverse();
        Some(odometry(
            header(stamp.clone(), &ctx.frames.odom),
            ctx.frames.base_link.clone(),
            &t_odom_base,
            sample.pose.covariance,
            &(r_cam_base * sample.twist.linear),
            &(r_cam_base * sample.twist.angular),
            sample.twist.covariance,
        ))
    } else {
        None
    };

    // Map-relative camera pose.
    let map_odom = if tfs.map_to_camera_odom.valid {
        let t_map_cam = tfs.map_to_camera_odom.transform * t_camodom_cam;
        Some(odometry(
            header(stamp.clone(), &ctx.frames.map),
            ctx.frames.camera_link.clone(),
            &t_map_cam,
            sample.pose.covariance,
            &sample.twist.linear,
            &sample.twist.angular,
            sample.twist.covariance,
        ))
    } else {
        None
    };

    let roi_points = cloud::cull_roi(&sample.cloud, &ctx.roi_box);

    Outputs {
        camera_odom,
        base_link_odom,
        map_odom,
        imu: imu_to_msg(&sample.imu, stamp.clone(), &ctx.frames.camera_imu),
        left: image_to_msg(&sample.left, stamp.clone(), &ctx.frames.camera_left),
        right: image_to_msg(&sample.right, stamp.clone(), &ctx.frames.camera_right),
        depth: image_to_msg(&sample.depth, stamp.clone(), &ctx.frames.camera_left),
        cloud: cloud::cloud_to_msg(&sample.cloud, stamp.clone(), ctx.frames.camera_left.clone()),
        roi_cloud: cloud::cloud_to_msg(&roi_points, stamp, ctx.frames.camera_left.clone()),
    }
}

/// Isometry of a pose sample.
fn pose_isometry(pose: &PoseSample) -> Isometry3<f64> {
    Isometry3::from_parts(Translation3::from(pose.position), pose.orientation)
}

fn header(stamp: Time, frame_id: &str) -> Header {
    Header {
        stamp,
        frame_id: frame_id.to_string(),
    }
}

fn vector_msg(v: &nalgebra::Vector3<f64>) -> Vector3 {
    Vector3 {
        x: v.x,
        y: v.y,
        z: v.z,
    }
}

fn quaternion_msg(q: &UnitQuaternion<f64>) -> Quaternion {
    Quaternion {
        x: q.i,
        y: q.j,
        z: q.k,
        w: q.w,
    }
}

fn odometry(
    header: Header,
    child_frame_id: String,
    iso: &Isometry3<f64>,
    pose_covariance: [f64; 36],
    linear: &nalgebra::Vector3<f64>,
    angular: &nalgebra::Vector3<f64>,
    twist_covariance: [f64; 36],
) -> Odometry {
    Odometry {
        header,
        child_frame_id,
        pose: PoseWithCovariance {
            pose: Pose {
                position: Point {
                    x: iso.translation.x,
                    y: iso.translation.y,
                    z: iso.translation.z,
                },
                orientation: quaternion_msg(&iso.rotation),
            },
            covariance: pose_covariance,
        },
        twist: TwistWithCovariance {
            twist: Twist {
                linear: vector_msg(linear),
                angular: vector_msg(angular),
            },
            covariance: twist_covariance,
        },
    }
}

fn imu_to_msg(imu: &ImuSample, stamp: Time, frame_id: &str) -> Imu {
    Imu {
        header: header(stamp, frame_id),
        orientation: quaternion_msg(&imu.orientation),
        orientation_covariance: imu.orientation_covariance,
        angular_velocity: vector_msg(&imu.angular_velocity),
        angular_velocity_covariance: imu.angular_velocity_covariance,
        linear_acceleration: vector_msg(&imu.linear_acceleration),
        linear_acceleration_covariance: imu.linear_acceleration_covariance,
    }
}

fn image_to_msg(frame: &ImageFrame, stamp: Time, frame_id: &str) -> Image {
    Image {
        header: header(stamp, frame_id),
        height: frame.height,
        width: frame.width,
        encoding: String::from("bgra8"),
        is_bigendian: 0,
        step: frame.step(),
        data: frame.data.clone(),
    }
}
