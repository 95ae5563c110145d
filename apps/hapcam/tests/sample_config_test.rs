// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::expect_used)]

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use std::path::PathBuf;

#[test]
fn samples_hapcam_toml_parses_and_validates() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let repo_root = manifest_dir
        .parent()
        .and_then(|parent| parent.parent())
        .expect("hapcam-server should live under workspace_root/apps/hapcam");
    let sample_path = repo_root.join("samples/hapcam.toml");

    let figment = Figment::new().merge(Serialized::defaults(hapcam_server::Config::default()));
    let config: hapcam_server::Config = match figment.merge(Toml::file(&sample_path)).extract() {
        Ok(cfg) => cfg,
        Err(e) => panic!("samples/hapcam.toml should parse as hapcam_server::Config: {e}"),
    };

    assert!(config.validate().is_ok());
    assert_eq!(config.transcoder.program, "ffmpeg");
    assert_eq!(config.shutdown.restart_exit_code, 75);
    assert_eq!(config.bridges.len(), 1);
    assert_eq!(config.bridges[0].name, "Front Yard");

    let cameras: Vec<_> = config.cameras().collect();
    assert_eq!(cameras.len(), 2);

    let door = cameras[0];
    assert_eq!(door.name(), "Front Door");
    assert!(door.force_tcp);
    assert!(door.support_audio);
    assert_eq!(door.linked_doorbell, Some(1001));
    assert_eq!(door.stream_count, 3);
    assert_eq!(
        door.snapshot.as_ref().map(|s| s.url_for_width(640)),
        Some("http://nvr.local:81/image/front_door?w=640".to_string())
    );

    let driveway = cameras[1];
    assert!(driveway.is_passthrough());
    assert_eq!(driveway.stream_count, 1);
    assert_eq!(driveway.extra_args.len(), 4);
    assert!(!driveway.support_audio);
}
