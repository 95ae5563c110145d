// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Transcoder argument vector assembly.
//!
//! The transcoder is driven purely by its command line: one input (the camera's
//! stream source) and one SRTP output per negotiated leg. Everything here is a
//! pure function of the camera configuration and the negotiated parameters.

use hapcam_core::{AudioLeg, CameraRuntimeConfig, SrtpLeg, StreamConfig, VideoProfile};

/// SRTP crypto suite HomeKit controllers accept.
pub const SRTP_SUITE: &str = "AES_CM_128_HMAC_SHA1_80";

pub const VIDEO_PAYLOAD_TYPE: u8 = 99;
pub const AUDIO_PAYLOAD_TYPE: u8 = 110;

/// `-bufsize` for the video leg, in kbit.
pub const fn video_bufsize(max_bitrate: u32) -> u32 {
    max_bitrate.saturating_mul(8)
}

/// `-bufsize` for the audio leg, in kbit.
pub const fn audio_bufsize(max_bitrate: u32) -> u32 {
    max_bitrate.saturating_mul(4)
}

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| (*s).to_string()));
}

fn srtp_output(args: &mut Vec<String>, leg: &SrtpLeg, payload_type: u8, address: &str, packet_size: u32) {
    args.push("-payload_type".to_string());
    args.push(payload_type.to_string());
    args.push("-ssrc".to_string());
    args.push(leg.ssrc.to_string());
    push_all(args, &["-f", "rtp", "-srtp_out_suite", SRTP_SUITE, "-srtp_out_params"]);
    args.push(leg.srtp_key.clone());
    args.push(format!(
        "srtp://{address}:{port}?rtcpport={port}&localrtcpport={port}&pkt_size={packet_size}",
        port = leg.port
    ));
}

/// Input side: per-camera extra flags, then the stream source.
pub fn input_args(camera: &CameraRuntimeConfig, hide_banner: bool) -> Vec<String> {
    let mut args = camera.extra_args.clone();
    if hide_banner {
        push_all(&mut args, &["-hide_banner", "-nostats"]);
    }
    if camera.force_tcp {
        push_all(&mut args, &["-rtsp_transport", "tcp"]);
    }
    args.push("-i".to_string());
    args.push(camera.stream_source.clone());
    args
}

/// Video output leg.
///
/// The profile is taken from the controller's profile id and left out entirely
/// when the camera passes its video through without re-encoding.
pub fn video_args(
    camera: &CameraRuntimeConfig,
    video_profile_id: u8,
    leg: &SrtpLeg,
    address: &str,
) -> Vec<String> {
    let mut args = Vec::with_capacity(48);
    push_all(&mut args, &["-map", &camera.video_map, "-an", "-sn", "-dn"]);
    push_all(&mut args, &["-c:v", &camera.video_codec]);

    if !camera.is_passthrough() {
        if let Some(profile) = VideoProfile::from_id(video_profile_id) {
            push_all(&mut args, &["-profile:v", profile.as_str()]);
        }
        push_all(
            &mut args,
            &[
                "-preset",
                "ultrafast",
                "-tune",
                "zerolatency",
                "-pix_fmt",
                "yuv420p",
                "-color_range",
                "mpeg",
                "-bf",
                "0",
            ],
        );
    }

    args.push("-r".to_string());
    args.push(camera.max_fps.to_string());
    let bitrate = format!("{}k", leg.max_bitrate);
    push_all(&mut args, &["-b:v", &bitrate]);
    args.push("-bufsize".to_string());
    args.push(format!("{}k", video_bufsize(leg.max_bitrate)));
    push_all(&mut args, &["-maxrate", &bitrate]);

    srtp_output(&mut args, leg, VIDEO_PAYLOAD_TYPE, address, camera.video_packet_size);
    args
}

/// Audio output leg (mono).
pub fn audio_args(camera: &CameraRuntimeConfig, leg: &AudioLeg, address: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(40);
    push_all(&mut args, &["-map", &camera.audio_map, "-vn", "-sn", "-dn"]);
    push_all(&mut args, &["-c:a", &camera.audio_codec]);

    if camera.audio_codec == "libopus" {
        push_all(&mut args, &["-application", "lowdelay"]);
    } else if camera.audio_codec.contains("aac") {
        push_all(&mut args, &["-profile:a", "aac_eld", "-flags", "+global_header"]);
    }

    push_all(&mut args, &["-ac", "1"]);
    args.push("-ar".to_string());
    args.push(format!("{}k", leg.sample_rate));
    args.push("-b:a".to_string());
    args.push(format!("{}k", leg.srtp.max_bitrate));
    args.push("-bufsize".to_string());
    args.push(format!("{}k", audio_bufsize(leg.srtp.max_bitrate)));

    srtp_output(&mut args, &leg.srtp, AUDIO_PAYLOAD_TYPE, address, camera.audio_packet_size);
    args
}

/// Full argument vector (without the program name) for one stream session.
///
/// The audio leg is added only when the camera supports audio and the controller
/// negotiated one. SRTP packets go to the controller's address, or to the
/// camera's configured `stream_address` if the controller supplied none.
pub fn build_transcoder_args(
    camera: &CameraRuntimeConfig,
    stream: &StreamConfig,
    hide_banner: bool,
) -> Vec<String> {
    let address = if stream.address.is_empty() {
        camera.stream_address.as_deref().unwrap_or_default()
    } else {
        stream.address.as_str()
    };

    let mut args = input_args(camera, hide_banner);
    args.extend(video_args(camera, stream.video_profile_id, &stream.video, address));

    if camera.support_audio {
        if let Some(audio) = &stream.audio {
            args.extend(audio_args(camera, audio, address));
        }
    }
    args
}
