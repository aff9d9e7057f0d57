// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Zenoh transform-tree client.
//!
//! [`TfListener`] subscribes to `rt/tf` and `rt/tf_static`, keeps the most
//! recent transform per (parent, child) edge, and answers the three fixed
//! lookups the node issues.  Only direct edges are resolved (in either
//! direction, inverting when needed): the relationships this node consumes
//! are published as single edges by the surrounding system, and full tree
//! chaining belongs to the transform service, not here.
//!
//! Wire format is a bare `geometry_msgs/msg/TransformStamped` in CDR per
//! topic sample, the same encoding this crate's publishers use.

use crate::camera::Error;
use crate::transform::{transform_to_isometry, LookupError, TransformLookup};
use edgefirst_schemas::{geometry_msgs::TransformStamped, serde_cdr};
use nalgebra::Isometry3;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use zenoh::pubsub::Subscriber;
use zenoh::sample::Sample;
use zenoh::{Session, Wait};

/// How often a pending lookup re-checks the edge store.
const LOOKUP_POLL: Duration = Duration::from_millis(5);

type EdgeMap = HashMap<(String, String), Isometry3<f64>>;

/// Transform-tree listener backed by zenoh subscribers.
pub struct TfListener {
    edges: Arc<Mutex<EdgeMap>>,
    _tf: Subscriber<()>,
    _tf_static: Subscriber<()>,
}

impl TfListener {
    /// Subscribe to the transform topics on the given session.
    pub fn new(session: &Session) -> Result<Self, Error> {
        let edges = Arc::new(Mutex::new(EdgeMap::new()));

        let subscribe = |topic: &str| -> Result<Subscriber<()>, Error> {
            let store = Arc::clone(&edges);
            session
                .declare_subscriber(topic.to_string())
                .callback(move |sample| ingest(&store, &sample))
                .wait()
                .map_err(|e| Error::Session(format!("subscribe {}: {}", topic, e)))
        };

        let tf = subscribe("rt/tf")?;
        let tf_static = subscribe("rt/tf_static")?;

        Ok(Self {
            edges,
            _tf: tf,
            _tf_static: tf_static,
        })
    }
}

/// Decode one transform sample into the edge store.
fn ingest(edges: &Mutex<EdgeMap>, sample: &Sample) {
    let payload = sample.payload().to_bytes();
    match serde_cdr::deserialize::<TransformStamped>(&payload) {
        Ok(msg) => {
            let iso = transform_to_isometry(&msg.transform);
            edges
                .lock()
                .insert((msg.header.frame_id, msg.child_frame_id), iso);
        }
        Err(e) => debug!("undecodable transform sample: {:?}", e),
    }
}

/// Resolve a direct edge (either direction) from the store, waiting up to
/// `timeout` for it to appear.
fn lookup_edge(
    edges: &Mutex<EdgeMap>,
    target: &str,
    source: &str,
    timeout: Duration,
) -> Result<Isometry3<f64>, LookupError> {
    if target == source {
        return Ok(Isometry3::identity());
    }

    let forward = (target.to_string(), source.to_string());
    let reverse = (source.to_string(), target.to_string());
    let deadline = Instant::now() + timeout;

    loop {
        {
            let edges = edges.lock();
            if let Some(iso) = edges.get(&forward) {
                return Ok(*iso);
            }
            if let Some(iso) = edges.get(&reverse) {
                return Ok(iso.inverse());
            }
        }
        if Instant::now() >= deadline {
            return Err(LookupError::Timeout);
        }
        std::thread::sleep(LOOKUP_POLL);
    }
}

impl TransformLookup for TfListener {
    fn lookup(
        &self,
        target: &str,
        source: &str,
        timeout: Duration,
    ) -> Result<Isometry3<f64>, LookupError> {
        lookup_edge(&self.edges, target, source, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_edge(parent: &str, child: &str, x: f64) -> Arc<Mutex<EdgeMap>> {
        let edges = Arc::new(Mutex::new(EdgeMap::new()));
        edges.lock().insert(
            (parent.to_string(), child.to_string()),
            Isometry3::translation(x, 0.0, 0.0),
        );
        edges
    }

    #[test]
    fn test_direct_edge_lookup() {
        let edges = store_with_edge("odom", "camera_odom", 3.0);
        let iso = lookup_edge(&edges, "odom", "camera_odom", Duration::from_millis(10)).unwrap();
        assert_eq!(iso.translation.x, 3.0);
    }

    #[test]
    fn test_reverse_edge_is_inverted() {
        let edges = store_with_edge("camera_odom", "odom", 3.0);
        let iso = lookup_edge(&edges, "odom", "camera_odom", Duration::from_millis(10)).unwrap();
        assert_eq!(iso.translation.x, -3.0);
    }

    #[test]
    fn test_identity_lookup() {
        let edges = store_with_edge("odom", "camera_odom", 3.0);
        let iso = lookup_edge(&edges, "map", "map", Duration::from_millis(10)).unwrap();
        assert_eq!(iso.translation.x, 0.0);
    }

    #[test]
    fn test_missing_edge_times_out() {
        let edges = store_with_edge("odom", "camera_odom", 3.0);
        let start = Instant::now();
        let result = lookup_edge(&edges, "map", "camera_odom", Duration::from_millis(20));
        assert!(matches!(result, Err(LookupError::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_late_edge_resolves_within_timeout() {
        let edges = store_with_edge("odom", "camera_odom", 3.0);

        let writer = {
            let edges = Arc::clone(&edges);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                edges.lock().insert(
                    ("map".to_string(), "camera_odom".to_string()),
                    Isometry3::translation(7.0, 0.0, 0.0),
                );
            })
        };

        let iso = lookup_edge(&edges, "map", "camera_odom", Duration::from_millis(500)).unwrap();
        assert_eq!(iso.translation.x, 7.0);
        writer.join().unwrap();
    }
}
