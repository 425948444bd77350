//! End-to-end simulation tests driving real module processes.
//!
//! Each test builds a configuration pointing at this crate's
//! `mock_module` binary, materializes the backplane and barrier through
//! the process manager, and drives frames through the scheduler.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use hermes_backplane::{Backplane, BackplaneError, FrameBarrier};
use hermes_common::config::HermesConfig;
use hermes_core::{CoreError, FrameHook, ProcessManager, Scheduler};

// ─── Helpers ────────────────────────────────────────────────────────

fn mock_module_path() -> &'static str {
    env!("CARGO_BIN_EXE_mock_module")
}

/// Unique IPC names per test for isolation.
fn unique_names(suffix: &str) -> (String, String) {
    static CTR: AtomicU32 = AtomicU32::new(0);
    let id = CTR.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    (
        format!("/hermes_test_e2e_{pid}_{id}_{suffix}"),
        format!("/hermes_test_e2e_{pid}_{id}_{suffix}_barrier"),
    )
}

/// Parse a config whose `{exe}` placeholder expands to the mock module.
fn parse_config(template: &str) -> HermesConfig {
    let yaml = template.replace("{exe}", mock_module_path());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim.yaml");
    std::fs::write(&path, yaml).unwrap();
    HermesConfig::load(&path).unwrap()
}

fn build(template: &str, suffix: &str) -> (Scheduler, String, String) {
    let config = parse_config(template);
    let (seg, bar) = unique_names(suffix);
    let pm = ProcessManager::with_names(&config, &seg, &bar).unwrap();
    let scheduler = Scheduler::new(pm, &config.execution);
    (scheduler, seg, bar)
}

// ─── S2: One-Module Step Loop ───────────────────────────────────────

const COUNTER: &str = r#"
modules:
  m:
    type: process
    executable: "{exe}"
    signals:
      - name: v
        writable: true
execution:
  mode: afap
  rate_hz: 100
"#;

#[test]
fn counter_module_tracks_frames() {
    let (mut scheduler, seg, _bar) = build(COUNTER, "counter");
    scheduler.manager_mut().spawn_all().unwrap();
    scheduler.stage().unwrap();

    scheduler.step(10).unwrap();

    let backplane = scheduler.manager().backplane();
    assert_eq!(backplane.frame(), 10);
    assert_eq!(backplane.time_ns(), 100_000_000);
    assert_eq!(backplane.get_signal("m.v").unwrap(), 10.0);

    scheduler.manager_mut().terminate_all();
    // Clean shutdown leaves no kernel objects behind.
    assert!(matches!(
        Backplane::attach(&seg),
        Err(BackplaneError::NotFound { .. })
    ));
}

#[test]
fn header_clock_is_exact_at_every_frame() {
    let (mut scheduler, _seg, _bar) = build(COUNTER, "clock");
    scheduler.manager_mut().spawn_all().unwrap();
    scheduler.stage().unwrap();

    let dt = scheduler.dt_ns();
    for expected_frame in 1..=25u64 {
        scheduler.step(1).unwrap();
        let backplane = scheduler.manager().backplane();
        assert_eq!(backplane.frame(), expected_frame);
        assert_eq!(backplane.time_ns(), expected_frame * dt);
    }

    scheduler.manager_mut().terminate_all();
}

// ─── S3: Wire Routing ───────────────────────────────────────────────

const WIRED: &str = r#"
modules:
  in:
    type: process
    executable: "{exe}"
    signals:
      - name: u
        writable: true
  phys:
    type: process
    executable: "{exe}"
    signals:
      - name: x
        writable: true
      - name: y
execution:
  mode: afap
  rate_hz: 100
wiring:
  - src: in.u
    dst: phys.x
    gain: 2.0
    offset: 10.0
"#;

#[test]
fn wire_routes_driver_input_to_consumer_within_one_frame() {
    let (mut scheduler, _seg, _bar) = build(WIRED, "wired");
    scheduler.manager_mut().spawn_all().unwrap();
    scheduler.stage().unwrap();

    // Test driver injects the source value between frames.
    scheduler
        .manager()
        .backplane()
        .set_signal("in.u", 5.0)
        .unwrap();

    scheduler.step(1).unwrap();

    let backplane = scheduler.manager().backplane();
    assert_eq!(backplane.get_signal("phys.x").unwrap(), 20.0);
    assert_eq!(backplane.get_signal("phys.y").unwrap(), 20.0);

    scheduler.manager_mut().terminate_all();
}

// ─── Reset ──────────────────────────────────────────────────────────

#[test]
fn reset_restores_zero_clock_and_staged_values() {
    let (mut scheduler, _seg, _bar) = build(COUNTER, "reset");
    scheduler.manager_mut().spawn_all().unwrap();
    scheduler.stage().unwrap();

    scheduler.step(7).unwrap();
    assert_eq!(scheduler.manager().backplane().get_signal("m.v").unwrap(), 7.0);

    scheduler.reset().unwrap();
    let backplane = scheduler.manager().backplane();
    assert_eq!(backplane.frame(), 0);
    assert_eq!(backplane.time_ns(), 0);
    assert_eq!(backplane.get_signal("m.v").unwrap(), 0.0);

    // The simulation can run again after a reset.
    scheduler.step(3).unwrap();
    assert_eq!(scheduler.manager().backplane().frame(), 3);

    scheduler.manager_mut().terminate_all();
}

// ─── S4: Barrier Timeout ────────────────────────────────────────────

const SLEEPY: &str = r#"
modules:
  sleepy:
    type: process
    executable: "{exe}"
    signals:
      - name: nap_ms
        writable: true
      - name: v
        writable: true
execution:
  mode: afap
  rate_hz: 100
"#;

#[test]
fn hung_module_reports_barrier_timeout_and_cleans_up() {
    let (mut scheduler, seg, bar) = build(SLEEPY, "sleepy");
    scheduler.manager_mut().set_wait_timeout(Duration::from_millis(300));
    scheduler.manager_mut().spawn_all().unwrap();
    scheduler.stage().unwrap();

    // Make every subsequent step sleep far past the wait bound.
    scheduler
        .manager()
        .backplane()
        .set_signal("sleepy.nap_ms", 60_000.0)
        .unwrap();

    let err = scheduler.step(1).unwrap_err();
    match err {
        CoreError::BarrierTimeout { module, phase } => {
            assert_eq!(module.as_deref(), Some("sleepy"));
            assert_eq!(phase.to_string(), "done");
        }
        other => panic!("expected BarrierTimeout, got {other:?}"),
    }

    scheduler.manager_mut().terminate_all();
    assert!(matches!(
        Backplane::attach(&seg),
        Err(BackplaneError::NotFound { .. })
    ));
    assert!(matches!(
        FrameBarrier::attach(&bar),
        Err(BackplaneError::NotFound { .. })
    ));
}

// ─── S6: Crash Resilience ───────────────────────────────────────────

const VICTIM: &str = r#"
modules:
  victim:
    type: process
    executable: "{exe}"
    signals:
      - name: v
        writable: true
execution:
  mode: afap
  rate_hz: 100
"#;

#[test]
fn killed_module_is_reported_as_crashed() {
    let (mut scheduler, seg, _bar) = build(VICTIM, "victim");
    scheduler.manager_mut().set_wait_timeout(Duration::from_millis(500));
    scheduler.manager_mut().spawn_all().unwrap();
    scheduler.stage().unwrap();
    scheduler.step(2).unwrap();

    // Kill the module between frames.
    let pid = scheduler.manager().module_pid("victim").unwrap();
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    )
    .unwrap();
    // Give the kernel a moment to reap-signal the child.
    std::thread::sleep(Duration::from_millis(50));

    let err = scheduler.step(1).unwrap_err();
    match err {
        CoreError::ModuleCrashed {
            name,
            pid: dead_pid,
            status,
        } => {
            assert_eq!(name, "victim");
            assert_eq!(dead_pid, pid);
            assert_eq!(status, "signal 9");
        }
        other => panic!("expected ModuleCrashed, got {other:?}"),
    }

    scheduler.manager_mut().terminate_all();
    assert!(matches!(
        Backplane::attach(&seg),
        Err(BackplaneError::NotFound { .. })
    ));
}

// ─── S5: Realtime Pacing & Run Loop ─────────────────────────────────

const REALTIME: &str = r#"
modules:
  m:
    type: process
    executable: "{exe}"
    signals:
      - name: v
        writable: true
execution:
  mode: realtime
  rate_hz: 100
  end_time: 1.0
"#;

struct CountingHook {
    frames: u64,
    last_time_ns: u64,
}

impl FrameHook for CountingHook {
    fn on_frame(&mut self, _frame: u64, time_ns: u64) {
        self.frames += 1;
        self.last_time_ns = time_ns;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn realtime_run_paces_to_wall_clock() {
    let (mut scheduler, _seg, _bar) = build(REALTIME, "realtime");
    scheduler.manager_mut().spawn_all().unwrap();
    scheduler.stage().unwrap();

    let mut hook = CountingHook {
        frames: 0,
        last_time_ns: 0,
    };
    let wall_start = Instant::now();
    scheduler.run(Some(&mut hook)).await.unwrap();
    let elapsed = wall_start.elapsed();

    // 100 frames at 100 Hz: one wall second, best effort.
    assert_eq!(scheduler.time_ns(), 1_000_000_000);
    assert_eq!(hook.frames, scheduler.frame());
    assert!(
        elapsed >= Duration::from_millis(950) && elapsed <= Duration::from_millis(1600),
        "elapsed {elapsed:?}"
    );

    scheduler.manager_mut().terminate_all();
}

const FREE_RUNNING: &str = r#"
modules:
  m:
    type: process
    executable: "{exe}"
    signals:
      - name: v
        writable: true
execution:
  mode: afap
  rate_hz: 1000
"#;

#[tokio::test(flavor = "multi_thread")]
async fn stop_halts_before_the_next_frame() {
    let (mut scheduler, _seg, _bar) = build(FREE_RUNNING, "stop");
    scheduler.manager_mut().spawn_all().unwrap();
    scheduler.stage().unwrap();

    let handle = scheduler.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.stop();
    });

    let mut hook = CountingHook {
        frames: 0,
        last_time_ns: 0,
    };
    scheduler.run(Some(&mut hook)).await.unwrap();

    // Frames advanced, the hook saw exactly the frames that ran, and
    // the clock stayed multiplicative.
    assert!(scheduler.frame() > 0);
    assert_eq!(hook.frames, scheduler.frame());
    assert_eq!(hook.last_time_ns, scheduler.frame() * scheduler.dt_ns());
    assert_eq!(
        scheduler.manager().backplane().get_signal("m.v").unwrap(),
        scheduler.frame() as f64
    );

    scheduler.manager_mut().terminate_all();
}

#[tokio::test(flavor = "multi_thread")]
async fn pause_suspends_frames_until_resume() {
    let (mut scheduler, _seg, _bar) = build(FREE_RUNNING, "pause");
    scheduler.manager_mut().spawn_all().unwrap();
    scheduler.stage().unwrap();

    let handle = scheduler.handle();
    let watcher = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.pause();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let frozen = handle.is_paused();
        handle.resume();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
        frozen
    });

    scheduler.run(None).await.unwrap();
    assert!(watcher.await.unwrap());
    assert!(scheduler.frame() > 0);

    scheduler.manager_mut().terminate_all();
}
