// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Output sinks for composed messages.
//!
//! The acquisition loop hands every [`Outputs`] set to an [`OutputSink`];
//! the production implementation serializes each message to CDR and puts it
//! on its zenoh topic with the matching ROS 2 schema tag.  Publishing is
//! fire-and-forget: transport errors are logged and never propagate into
//! the acquisition loop.

use crate::camera::Error;
use crate::compose::Outputs;
use edgefirst_schemas::serde_cdr;
use serde::Serialize;
use tracing::error;
use zenoh::bytes::{Encoding, ZBytes};
use zenoh::pubsub::Publisher;
use zenoh::qos::{CongestionControl, Priority};
use zenoh::{Session, Wait};

/// Sink for one composition's worth of output messages.
pub trait OutputSink: Send + Sync {
    fn publish(&self, outputs: &Outputs);
}

/// Zenoh publishers for every output topic.
pub struct ZenohSink {
    camera_odom: Publisher<'static>,
    base_link_odom: Publisher<'static>,
    map_odom: Publisher<'static>,
    imu: Publisher<'static>,
    left: Publisher<'static>,
    right: Publisher<'static>,
    depth: Publisher<'static>,
    points: Publisher<'static>,
    points_roi: Publisher<'static>,
}

impl ZenohSink {
    /// Declare all publishers under the given base topic.
    pub fn declare(session: &Session, base_topic: &str) -> Result<Self, Error> {
        let declare = |suffix: &str, priority: Priority| -> Result<Publisher<'static>, Error> {
            session
                .declare_publisher(format!("{}/{}", base_topic, suffix))
                .priority(priority)
                .congestion_control(CongestionControl::Drop)
                .wait()
                .map_err(|e| Error::Session(format!("declare {}/{}: {}", base_topic, suffix, e)))
        };

        Ok(Self {
            camera_odom: declare("camera_odom", Priority::DataHigh)?,
            base_link_odom: declare("base_link_odom", Priority::DataHigh)?,
            map_odom: declare("map_odom", Priority::DataHigh)?,
            imu: declare("imu", Priority::DataHigh)?,
            left: declare("left/image_rect", Priority::Data)?,
            right: declare("right/image_rect", Priority::Data)?,
            depth: declare("depth", Priority::Data)?,
            points: declare("points", Priority::Data)?,
            points_roi: declare("points/roi", Priority::Data)?,
        })
    }

    fn put<T: Serialize>(publisher: &Publisher<'static>, msg: &T, schema: &str) {
        let payload = match serde_cdr::serialize(msg) {
            Ok(payload) => payload,
            Err(e) => {
                error!("could not encode {}: {:?}", schema, e);
                return;
            }
        };

        let encoding = Encoding::APPLICATION_CDR.with_schema(schema);
        if let Err(e) = publisher.put(ZBytes::from(payload)).encoding(encoding).wait() {
            error!("{} message error: {:?}", publisher.key_expr(), e);
        }
    }
}

impl OutputSink for ZenohSink {
    fn publish(&self, outputs: &Outputs) {
        Self::put(&self.camera_odom, &outputs.camera_odom, "nav_msgs/msg/Odometry");
        if let Some(msg) = &outputs.base_link_odom {
            Self::put(&self.base_link_odom, msg, "nav_msgs/msg/Odometry");
        }
        if let Some(msg) = &outputs.map_odom {
            Self::put(&self.map_odom, msg, "nav_msgs/msg/Odometry");
        }
        Self::put(&self.imu, &outputs.imu, "sensor_msgs/msg/Imu");
        Self::put(&self.left, &outputs.left, "sensor_msgs/msg/Image");
        Self::put(&self.right, &outputs.right, "sensor_msgs/msg/Image");
        Self::put(&self.depth, &outputs.depth, "sensor_msgs/msg/Image");
        Self::put(&self.points, &outputs.cloud, "sensor_msgs/msg/PointCloud2");
        Self::put(&self.points_roi, &outputs.roi_cloud, "sensor_msgs/msg/PointCloud2");
    }
}
