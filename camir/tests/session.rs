//! End-to-end sessions against scripted links.

#![cfg(all(feature = "pelco", feature = "flir"))]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use camir::flir::{ThermalCamera, FAST_BAUD_RATE};
use camir::pelco::{MountController, PelcoFrame};
use camir::transport::mock::MockLink;
use camir::transport::SerialLink;
use camir::Error;

/// Minimal A40 stand-in: answers `ls -l` from a fixed file table and
/// serves `getfblock` from the matching image.
fn fake_camera(files: Vec<(&'static str, Vec<u8>)>) -> MockLink {
    MockLink::with_responder(move |written| {
        let line = String::from_utf8_lossy(written).trim().to_string();

        if line == "ls -l" {
            return files
                .iter()
                .map(|(name, data)| {
                    format!("-rw-r--r-- 1 {:>6} 17-06-01 12:34:56 {}\r\n", data.len(), name)
                })
                .collect::<String>()
                .into_bytes();
        }

        if let Some(args) = line.strip_prefix("getfblock ") {
            let fields: Vec<&str> = args.split_whitespace().collect();
            let path = fields[0].trim_matches('"');
            let offset: usize = fields[1].parse().unwrap();
            let len: usize = fields[2].parse().unwrap();
            let (_, data) = files
                .iter()
                .find(|(name, _)| path.ends_with(name))
                .unwrap();

            let mut response = format!("{line}\r\n").into_bytes();
            response.extend_from_slice(&[0x00, 0x10, 0x20]);
            response.extend_from_slice(&data[offset..offset + len]);
            response.extend_from_slice(b"\r\n\\>");
            return response;
        }

        format!("{line}\r\n\\>").into_bytes()
    })
}

#[test]
fn thermal_session_retrieves_image() {
    let jpeg: Vec<u8> = (0..3000u32).map(|i| (i % 256) as u8).collect();
    let link = fake_camera(vec![("IR_0001.jpg", vec![1, 2, 3]), ("IR_0002.jpg", jpeg.clone())]);

    let mut camera = ThermalCamera::open(link)
        .unwrap()
        .with_settle_delay(Duration::ZERO)
        .with_block_delay(Duration::ZERO);
    assert_eq!(camera.link().baud_rate(), FAST_BAUD_RATE);

    camera.zoom(2.0).unwrap();
    camera.set_range(20.0, 30.0).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copy.jpg");
    let written = camera.get_image("IR_0002.jpg", &path).unwrap();

    assert_eq!(written, 3000);
    assert_eq!(std::fs::read(&path).unwrap(), jpeg);

    let link = camera.into_link();
    assert!(!link.is_open());
    assert_eq!(link.open_count(), link.close_count());

    let blocks: Vec<String> = link
        .written_lines()
        .into_iter()
        .filter(|l| l.contains("getfblock"))
        .collect();
    assert_eq!(blocks.len(), 3);
    assert!(blocks[2].contains("\" 2048 952 "));
}

#[test]
fn thermal_session_reports_missing_image() {
    let link = fake_camera(vec![("IR_0001.jpg", vec![0; 10])]);
    let mut camera = ThermalCamera::new(link).with_block_delay(Duration::ZERO);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.jpg");
    let result = camera.get_image("IR_0042.jpg", &path);

    assert!(matches!(result, Err(Error::SizeNotFound(ref n)) if n == "IR_0042.jpg"));
    assert!(!path.exists());
}

#[test]
fn mount_session_sequence() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let link = MockLink::with_responder(move |written| {
        sink.lock().unwrap().push(written.to_vec());
        Vec::new()
    });

    let mut mount = MountController::new(link, 3);
    mount.left().unwrap();
    mount.stop().unwrap();
    mount.set_preset(4).unwrap();
    mount.go_to_preset(4).unwrap();

    let frames = log.lock().unwrap().clone();
    assert_eq!(frames.len(), 4);
    assert!(frames.iter().all(|f| f.len() == 7 && f[0] == 0xFF));
    assert_eq!(frames[0][1], 3);
    assert_eq!(frames[1], PelcoFrame::STOP.as_bytes().to_vec());

    let link = mount.into_link();
    assert_eq!(link.open_count(), 4);
    assert!(!link.is_open());
}
