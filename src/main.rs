// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_stereopub::{
    args::Args,
    camera::{CameraDevice, Error},
    node::StereoNode,
    publish::ZenohSink,
    sim::SimCamera,
    tf::TfListener,
};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::sleep,
    time::Duration,
};
use tracing::{error, info};
use zenoh::Wait;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.rust_log)
        .init();

    let config = args.driver_config()?;

    let device: Box<dyn CameraDevice> = match args.target.as_str() {
        "sim" => Box::new(SimCamera::new()),
        other => {
            return Err(Error::Config(format!("unknown camera target: {}", other)).into());
        }
    };

    let session = zenoh::open(zenoh::Config::from(args.clone()))
        .wait()
        .map_err(|e| Error::Session(e.to_string()))?;
    info!("opened zenoh session");

    let lookup = Arc::new(TfListener::new(&session)?);
    let sink = Arc::new(ZenohSink::declare(&session, &args.camera_topic)?);

    let mut node = StereoNode::new(config, device, lookup, sink)?;
    node.set_enabled(true)?;
    info!("stereopub running on {}", args.camera_topic);

    let term = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&term))?;
    flag::register(SIGTERM, Arc::clone(&term))?;

    while !term.load(Ordering::Relaxed) {
        if node.status().fault {
            error!("camera fault detected, shutting down");
            break;
        }
        sleep(Duration::from_millis(100));
    }

    node.set_enabled(false)?;
    Ok(())
}
