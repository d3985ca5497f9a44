//! Integration tests for the acquisition lifecycle
//!
//! These tests drive a real worker thread through a mock device link:
//! - Start/stop/clear transitions
//! - Line handling while running and after stop
//! - Fault containment inside the acquisition tick

mod common;

use common::builders::PatientMetadataBuilder;
use common::mock_helpers::{fast_config, MockRig};
use common::{test_timeout, wait_until};
use std::thread;
use std::time::Duration;
use uroflow_rs::error::{ExportError, SessionError};
use uroflow_rs::{SessionStatus, UroflowError};

#[test]
fn test_two_lines_are_captured_in_order() {
    let rig = MockRig::spawn(fast_config());
    rig.operator.start().unwrap();

    rig.device.push_line("10.0,5.0");
    thread::sleep(Duration::from_millis(100));
    rig.device.push_line("20.0,15.0");
    assert!(wait_until(test_timeout(), || rig.sample_count() == 2));

    let snapshot = rig
        .operator
        .export(PatientMetadataBuilder::new("P-A").build())
        .unwrap();
    assert_eq!(snapshot.volume_series(), vec![5.0, 15.0]);
    let times = snapshot.times();
    assert!(times[0] < times[1], "elapsed time must increase: {:?}", times);
    assert_eq!(rig.device.written(), vec![b'A']);

    rig.shutdown();
}

#[test]
fn test_lines_after_stop_are_ignored() {
    let rig = MockRig::spawn(fast_config());
    rig.operator.start().unwrap();
    rig.device.push_line("10.0,5.0");
    assert!(wait_until(test_timeout(), || rig.sample_count() == 1));

    rig.operator.stop().unwrap();
    assert_eq!(rig.operator.status().unwrap().status, SessionStatus::Stopped);

    rig.device.push_line("20.0,15.0");
    rig.device.push_line("30.0,25.0");
    thread::sleep(Duration::from_millis(50));
    assert_eq!(rig.sample_count(), 1);

    rig.shutdown();
}

#[test]
fn test_start_with_closed_link_is_refused() {
    let rig = MockRig::spawn_closed(fast_config());

    let err = rig.operator.start().unwrap_err();
    assert!(matches!(
        err,
        UroflowError::Session(SessionError::LinkUnavailable)
    ));
    assert_eq!(rig.operator.status().unwrap().status, SessionStatus::Idle);
    assert!(rig.device.written().is_empty());

    rig.shutdown();
}

#[test]
fn test_malformed_line_does_not_stop_the_loop() {
    let rig = MockRig::spawn(fast_config());
    rig.operator.start().unwrap();

    rig.device.push_line("abc");
    thread::sleep(Duration::from_millis(30));
    assert_eq!(rig.sample_count(), 0);

    rig.device.push_line("1.0,2.0");
    assert!(wait_until(test_timeout(), || rig.sample_count() == 1));

    let report = rig.operator.status().unwrap();
    assert_eq!(report.stats.lines_skipped, 1);
    assert_eq!(report.stats.tick_panics, 0);
    assert_eq!(report.status, SessionStatus::Running);

    rig.shutdown();
}

#[test]
fn test_panicking_link_is_contained() {
    let rig = MockRig::spawn(fast_config());
    rig.operator.start().unwrap();

    rig.device.panic_next_poll();
    assert!(wait_until(test_timeout(), || {
        rig.operator.status().unwrap().stats.tick_panics == 1
    }));

    rig.device.push_line("4.0,8.0");
    assert!(wait_until(test_timeout(), || rig.sample_count() == 1));

    rig.shutdown();
}

#[test]
fn test_restart_resets_buffer() {
    let rig = MockRig::spawn(fast_config());
    rig.operator.start().unwrap();
    rig.device.push_line("1.0,1.0");
    rig.device.push_line("2.0,2.0");
    assert!(wait_until(test_timeout(), || rig.sample_count() == 2));

    rig.operator.start().unwrap();
    let report = rig.operator.status().unwrap();
    assert_eq!(report.status, SessionStatus::Running);
    assert_eq!(report.sample_count, 0);
    assert_eq!(report.display.flow_rate, 0.0);
    assert_eq!(rig.device.written(), vec![b'A', b'A']);

    rig.shutdown();
}

#[test]
fn test_clear_keeps_running_and_is_idempotent() {
    let rig = MockRig::spawn(fast_config());
    rig.operator.start().unwrap();
    rig.device.push_line("1.0,1.0");
    assert!(wait_until(test_timeout(), || rig.sample_count() == 1));

    rig.operator.clear().unwrap();
    rig.operator.clear().unwrap();
    let report = rig.operator.status().unwrap();
    assert_eq!(report.status, SessionStatus::Running);
    assert_eq!(report.sample_count, 0);

    rig.device.push_line("2.0,2.0");
    assert!(wait_until(test_timeout(), || rig.sample_count() == 1));

    rig.operator.stop().unwrap();
    rig.operator.clear().unwrap();
    assert_eq!(rig.operator.status().unwrap().status, SessionStatus::Idle);

    rig.shutdown();
}

#[test]
fn test_export_of_empty_session_is_refused() {
    let rig = MockRig::spawn(fast_config());
    let err = rig
        .operator
        .export(PatientMetadataBuilder::new("P-E").build())
        .unwrap_err();
    assert!(matches!(
        err,
        UroflowError::Export(ExportError::EmptySession)
    ));
    rig.shutdown();
}

#[test]
fn test_samples_are_published() {
    let rig = MockRig::spawn(fast_config());
    rig.operator.start().unwrap();
    rig.device.push_line("12.50,48.30");
    assert!(wait_until(test_timeout(), || rig.sample_count() == 1));

    let samples = rig.accepted_samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].flow_rate, 12.5);
    assert_eq!(samples[0].volume, 48.3);

    rig.shutdown();
}

#[test]
fn test_reconnect_after_unplug() {
    let rig = MockRig::spawn(fast_config());
    rig.operator.start().unwrap();

    rig.device.unplug();
    assert!(wait_until(test_timeout(), || {
        rig.operator.status().unwrap().connection == uroflow_rs::types::ConnectionStatus::Disconnected
    }));

    rig.operator.reconnect().unwrap();
    let report = rig.operator.status().unwrap();
    assert_eq!(report.connection, uroflow_rs::types::ConnectionStatus::Connected);
    assert_eq!(report.status, SessionStatus::Stopped);

    rig.operator.start().unwrap();
    rig.device.push_line("3.0,3.0");
    assert!(wait_until(test_timeout(), || rig.sample_count() == 1));

    rig.shutdown();
}

#[test]
fn test_shutdown_closes_link() {
    let rig = MockRig::spawn(fast_config());
    let device = rig.device.clone();
    assert!(device.is_open());
    rig.shutdown();
    assert!(!device.is_open());
}
