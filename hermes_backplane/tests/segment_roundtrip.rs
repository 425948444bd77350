//! Segment build/attach round-trip and access-contract tests.
//!
//! These exercise real POSIX shm objects under `/dev/shm`, so every test
//! uses a unique name and destroys its segment before returning.

use std::sync::atomic::{AtomicU32, Ordering};

use hermes_backplane::{Backplane, BackplaneError};
use hermes_common::signal::{SignalDescriptor, SignalFlags, SignalType};

// ─── Helpers ────────────────────────────────────────────────────────

/// Unique segment name per test for isolation.
fn test_name(suffix: &str) -> String {
    static CTR: AtomicU32 = AtomicU32::new(0);
    let id = CTR.fetch_add(1, Ordering::Relaxed);
    format!("/hermes_test_{}_{id}_{suffix}", std::process::id())
}

/// Three f64 slots across two modules: `a.x`, `a.y`, `b.z`.
fn three_signals() -> Vec<SignalDescriptor> {
    vec![
        SignalDescriptor::new("a", "x", SignalType::F64, SignalFlags::PUBLISHED),
        SignalDescriptor::new("a", "y", SignalType::F64, SignalFlags::WRITABLE),
        SignalDescriptor::new(
            "b",
            "z",
            SignalType::F64,
            SignalFlags::WRITABLE | SignalFlags::PUBLISHED,
        ),
    ]
}

// ─── Build / Attach Round-Trip ──────────────────────────────────────

#[test]
fn build_dump_reattach_yields_identical_tuples() {
    let name = test_name("roundtrip");
    let mut creator = Backplane::create(&name, &three_signals()).unwrap();

    // Slots in declaration order at consecutive 8-byte offsets.
    let dump = creator.dump();
    assert_eq!(dump.len(), 3);
    assert_eq!(dump[0].name, "a.x");
    assert_eq!(dump[1].name, "a.y");
    assert_eq!(dump[2].name, "b.z");
    assert_eq!(dump[0].offset, 0);
    assert_eq!(dump[1].offset, 8);
    assert_eq!(dump[2].offset, 16);

    // An attacher re-derives the exact same directory.
    let attached = Backplane::attach(&name).unwrap();
    assert_eq!(attached.dump(), dump);
    assert_eq!(attached.signal_count(), 3);
    assert_eq!(attached.layout(), creator.layout());

    drop(attached);
    creator.destroy();
}

#[test]
fn duplicate_create_fails_with_already_exists() {
    let name = test_name("dup");
    let mut first = Backplane::create(&name, &three_signals()).unwrap();
    let second = Backplane::create(&name, &three_signals());
    assert!(matches!(second, Err(BackplaneError::AlreadyExists { .. })));
    first.destroy();
}

#[test]
fn attach_missing_segment_fails() {
    let result = Backplane::attach("/hermes_test_no_such_segment");
    assert!(matches!(result, Err(BackplaneError::NotFound { .. })));
}

#[test]
fn attach_rejects_wrong_magic() {
    // A bare zero-filled file is not a backplane segment.
    let name = test_name("magic");
    let path = format!("/dev/shm/{}", name.trim_start_matches('/'));
    std::fs::write(&path, [0u8; 128]).unwrap();

    let result = Backplane::attach(&name);
    assert!(matches!(result, Err(BackplaneError::WrongMagic { .. })));

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn attach_rejects_wrong_version() {
    let name = test_name("version");
    let mut creator = Backplane::create(&name, &three_signals()).unwrap();

    // Corrupt the version field (header offset 4) through the backing file.
    let path = format!("/dev/shm/{}", name.trim_start_matches('/'));
    {
        use std::io::{Seek, SeekFrom, Write};
        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(4)).unwrap();
        file.write_all(&99u32.to_le_bytes()).unwrap();
    }

    let result = Backplane::attach(&name);
    match result {
        Err(BackplaneError::WrongVersion { found, .. }) => assert_eq!(found, 99),
        other => panic!("expected WrongVersion, got {other:?}"),
    }

    creator.destroy();
}

// ─── Access Contract ────────────────────────────────────────────────

#[test]
fn values_cross_attachments() {
    let name = test_name("values");
    let mut creator = Backplane::create(&name, &three_signals()).unwrap();
    let attached = Backplane::attach(&name).unwrap();

    // Initial values are zero.
    assert_eq!(attached.get_signal("a.x").unwrap(), 0.0);

    creator.set_signal("a.x", 42.5).unwrap();
    assert_eq!(attached.get_signal("a.x").unwrap(), 42.5);

    attached.set_signal("b.z", -7.25).unwrap();
    assert_eq!(creator.get_signal("b.z").unwrap(), -7.25);

    drop(attached);
    creator.destroy();
}

#[test]
fn unknown_signal_is_an_error_with_no_state_change() {
    let name = test_name("unknown");
    let mut creator = Backplane::create(&name, &three_signals()).unwrap();

    creator.set_signal("a.x", 1.0).unwrap();
    assert!(matches!(
        creator.set_signal("a.ghost", 9.0),
        Err(BackplaneError::UnknownSignal { .. })
    ));
    assert!(matches!(
        creator.get_signal("a.ghost"),
        Err(BackplaneError::UnknownSignal { .. })
    ));
    // Existing slots are untouched.
    assert_eq!(creator.get_signal("a.x").unwrap(), 1.0);

    creator.destroy();
}

#[test]
fn typed_slots_widen_to_f64() {
    let name = test_name("typed");
    let descriptors = vec![
        SignalDescriptor::new("m", "f", SignalType::F32, SignalFlags::empty()),
        SignalDescriptor::new("m", "i", SignalType::I32, SignalFlags::empty()),
        SignalDescriptor::new("m", "b", SignalType::Bool, SignalFlags::empty()),
    ];
    let mut creator = Backplane::create(&name, &descriptors).unwrap();

    creator.set_signal("m.f", 1.5).unwrap();
    creator.set_signal("m.i", -3.9).unwrap();
    creator.set_signal("m.b", 2.0).unwrap();

    let attached = Backplane::attach(&name).unwrap();
    assert_eq!(attached.get_signal("m.f").unwrap(), 1.5);
    assert_eq!(attached.get_signal("m.i").unwrap(), -3.0); // truncated toward zero
    assert_eq!(attached.get_signal("m.b").unwrap(), 1.0); // normalized

    drop(attached);
    creator.destroy();
}

#[test]
fn repeated_reads_between_frames_are_stable() {
    let name = test_name("stable");
    let mut creator = Backplane::create(&name, &three_signals()).unwrap();
    creator.set_signal("a.y", 3.25).unwrap();

    // No writer activity between these observations: they must agree.
    let first = creator.get_signal("a.y").unwrap();
    let second = creator.get_signal("a.y").unwrap();
    assert_eq!(first, second);

    creator.destroy();
}

#[test]
fn read_only_attachment_rejects_writes() {
    let name = test_name("ro");
    let mut creator = Backplane::create(&name, &three_signals()).unwrap();
    creator.set_signal("a.x", 5.0).unwrap();

    let reader = Backplane::attach_read_only(&name).unwrap();
    assert_eq!(reader.get_signal("a.x").unwrap(), 5.0);
    assert!(matches!(
        reader.set_signal("a.x", 6.0),
        Err(BackplaneError::ReadOnly { .. })
    ));
    assert!(matches!(
        reader.set_clock(1, 1),
        Err(BackplaneError::ReadOnly { .. })
    ));

    drop(reader);
    creator.destroy();
}

// ─── Clock ──────────────────────────────────────────────────────────

#[test]
fn clock_fields_cross_attachments() {
    let name = test_name("clock");
    let mut creator = Backplane::create(&name, &three_signals()).unwrap();
    let attached = Backplane::attach(&name).unwrap();

    assert_eq!(attached.frame(), 0);
    assert_eq!(attached.time_ns(), 0);

    creator.set_clock(10, 100_000_000).unwrap();
    assert_eq!(attached.frame(), 10);
    assert_eq!(attached.time_ns(), 100_000_000);

    creator.set_frame(11).unwrap();
    creator.set_time_ns(110_000_000).unwrap();
    assert_eq!(attached.frame(), 11);
    assert_eq!(attached.time_ns(), 110_000_000);

    drop(attached);
    creator.destroy();
}

// ─── Destruction ────────────────────────────────────────────────────

#[test]
fn destroy_is_idempotent_and_removes_the_name() {
    let name = test_name("destroy");
    let mut creator = Backplane::create(&name, &three_signals()).unwrap();

    creator.destroy();
    creator.destroy(); // Second call is a no-op, not an error.

    // The name is gone even while our mapping is still open.
    assert!(matches!(
        Backplane::attach(&name),
        Err(BackplaneError::NotFound { .. })
    ));
}

#[test]
fn owner_drop_unlinks_as_backstop() {
    let name = test_name("drop");
    {
        let _creator = Backplane::create(&name, &three_signals()).unwrap();
        // Dropped without an explicit destroy().
    }
    assert!(matches!(
        Backplane::attach(&name),
        Err(BackplaneError::NotFound { .. })
    ));
}

#[test]
fn attacher_drop_never_unlinks() {
    let name = test_name("noleak");
    let mut creator = Backplane::create(&name, &three_signals()).unwrap();
    {
        let _attached = Backplane::attach(&name).unwrap();
    }
    // Attacher dropped; the segment must still be reachable.
    let again = Backplane::attach(&name).unwrap();
    drop(again);
    creator.destroy();
}
