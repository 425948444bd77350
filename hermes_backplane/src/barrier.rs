//! Frame barrier: the per-frame rendezvous between coordinator and modules.
//!
//! Two named counting semaphores share a base name: `<base>_step` and
//! `<base>_done`. Each frame the coordinator posts `step` once per
//! participant, every module wakes, executes its step, and posts `done`;
//! the coordinator then collects `done` once per participant. At any
//! quiescent point both semaphores sit at zero.
//!
//! The semaphore release/acquire pair is the only cross-process
//! synchronization the backplane relies on: the coordinator's header
//! writes before `signal_step` happen-before every module's reads after
//! `wait_step`, and symmetrically for `signal_done` / `wait_all_done`.
//!
//! `nix` has no wrapper for POSIX named semaphores, so this drops to
//! `libc` directly (`sem_open` / `sem_post` / `sem_timedwait` /
//! `sem_close` / `sem_unlink`).

use std::ffi::CString;
use std::time::Duration;

use nix::errno::Errno;
use tracing::{debug, warn};

use crate::error::{BackplaneError, BackplaneResult};
use crate::segment::normalize_name;

/// Which semaphore a wait was blocked on, for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierPhase {
    /// The module-side `wait_step`.
    Step,
    /// The coordinator-side `wait_all_done`.
    Done,
}

impl std::fmt::Display for BarrierPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step => f.write_str("step"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// A created or attached frame barrier.
///
/// The coordinator creates the barrier (and later unlinks it); modules
/// attach. Only the coordinator side uses `signal_step` and the `done`
/// collection calls; only modules use `wait_step` and `signal_done`.
pub struct FrameBarrier {
    base: String,
    step_name: CString,
    done_name: CString,
    step: *mut libc::sem_t,
    done: *mut libc::sem_t,
    /// Participant count. Zero on attached (module-side) handles, where
    /// it is never consulted.
    count: u32,
    owner: bool,
    closed: bool,
    unlinked: bool,
}

// SAFETY: sem_t handles from sem_open are process-wide; POSIX permits
// concurrent sem_post/sem_wait on the same handle from multiple threads.
unsafe impl Send for FrameBarrier {}
unsafe impl Sync for FrameBarrier {}

impl FrameBarrier {
    /// Create both semaphores with initial value 0.
    ///
    /// # Errors
    /// [`BackplaneError::AlreadyExists`] if either name is already
    /// present in the kernel; [`BackplaneError::Os`] otherwise.
    pub fn create(base: &str, count: u32) -> BackplaneResult<Self> {
        let base = normalize_name(base);
        let (step_name, done_name) = sem_names(&base)?;

        let step = sem_open_create(&step_name)?;
        let done = match sem_open_create(&done_name) {
            Ok(sem) => sem,
            Err(e) => {
                // Roll back the first semaphore; half a barrier must not leak.
                unsafe {
                    libc::sem_close(step);
                    libc::sem_unlink(step_name.as_ptr());
                }
                return Err(e);
            }
        };

        debug!(barrier = %base, count, "frame barrier created");
        Ok(Self {
            base,
            step_name,
            done_name,
            step,
            done,
            count,
            owner: true,
            closed: false,
            unlinked: false,
        })
    }

    /// Attach to an existing barrier (module side).
    pub fn attach(base: &str) -> BackplaneResult<Self> {
        let base = normalize_name(base);
        let (step_name, done_name) = sem_names(&base)?;

        let step = sem_open_existing(&step_name)?;
        let done = match sem_open_existing(&done_name) {
            Ok(sem) => sem,
            Err(e) => {
                unsafe { libc::sem_close(step) };
                return Err(e);
            }
        };

        Ok(Self {
            base,
            step_name,
            done_name,
            step,
            done,
            count: 0,
            owner: false,
            closed: false,
            unlinked: false,
        })
    }

    /// Barrier base name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Participant count (creator side).
    pub fn count(&self) -> u32 {
        self.count
    }

    // ─── Coordinator Side ───────────────────────────────────────────

    /// Release `step` once per participant so every module can proceed.
    pub fn signal_step(&self) -> BackplaneResult<()> {
        for _ in 0..self.count {
            self.post(self.step)?;
        }
        Ok(())
    }

    /// Collect one `done` post, with an optional timeout.
    ///
    /// Returns `Ok(true)` on release, `Ok(false)` on timeout - never a
    /// silent miss. A zero timeout polls without blocking.
    pub fn wait_done(&self, timeout: Option<Duration>) -> BackplaneResult<bool> {
        self.timed_wait(self.done, timeout)
    }

    /// Collect `done` once per participant.
    ///
    /// Returns `Ok(false)` as soon as any single collection times out.
    pub fn wait_all_done(&self, timeout: Option<Duration>) -> BackplaneResult<bool> {
        for _ in 0..self.count {
            if !self.wait_done(timeout)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ─── Module Side ────────────────────────────────────────────────

    /// Block until the coordinator releases a step, with an optional
    /// timeout. Returns `Ok(true)` on release, `Ok(false)` on timeout.
    /// A zero timeout returns immediately with any pending release.
    pub fn wait_step(&self, timeout: Option<Duration>) -> BackplaneResult<bool> {
        self.timed_wait(self.step, timeout)
    }

    /// Signal that this module's step is complete.
    pub fn signal_done(&self) -> BackplaneResult<()> {
        self.post(self.done)
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Close the semaphore handles without destroying the names.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        unsafe {
            libc::sem_close(self.step);
            libc::sem_close(self.done);
        }
        self.closed = true;
    }

    /// Close and, on the creator side, unlink both names. Idempotent;
    /// attached handles never unlink.
    pub fn destroy(&mut self) {
        self.close();
        if !self.owner || self.unlinked {
            return;
        }
        for name in [&self.step_name, &self.done_name] {
            let rc = unsafe { libc::sem_unlink(name.as_ptr()) };
            if rc != 0 {
                let errno = Errno::last();
                if errno != Errno::ENOENT {
                    warn!(barrier = %self.base, error = %errno, "sem_unlink failed");
                }
            }
        }
        self.unlinked = true;
    }

    // ─── Semaphore Primitives ───────────────────────────────────────

    fn post(&self, sem: *mut libc::sem_t) -> BackplaneResult<()> {
        let rc = unsafe { libc::sem_post(sem) };
        if rc != 0 {
            return Err(BackplaneError::Os {
                name: self.base.clone(),
                source: Errno::last(),
            });
        }
        Ok(())
    }

    fn timed_wait(&self, sem: *mut libc::sem_t, timeout: Option<Duration>) -> BackplaneResult<bool> {
        match timeout {
            None => loop {
                let rc = unsafe { libc::sem_wait(sem) };
                if rc == 0 {
                    return Ok(true);
                }
                match Errno::last() {
                    Errno::EINTR => continue,
                    errno => {
                        return Err(BackplaneError::Os {
                            name: self.base.clone(),
                            source: errno,
                        })
                    }
                }
            },
            Some(d) if d.is_zero() => {
                let rc = unsafe { libc::sem_trywait(sem) };
                if rc == 0 {
                    return Ok(true);
                }
                match Errno::last() {
                    Errno::EAGAIN => Ok(false),
                    errno => Err(BackplaneError::Os {
                        name: self.base.clone(),
                        source: errno,
                    }),
                }
            }
            Some(d) => {
                let deadline = absolute_deadline(d)?;
                loop {
                    let rc = unsafe { libc::sem_timedwait(sem, &deadline) };
                    if rc == 0 {
                        return Ok(true);
                    }
                    match Errno::last() {
                        Errno::EINTR => continue,
                        Errno::ETIMEDOUT => return Ok(false),
                        errno => {
                            return Err(BackplaneError::Os {
                                name: self.base.clone(),
                                source: errno,
                            })
                        }
                    }
                }
            }
        }
    }
}

impl Drop for FrameBarrier {
    fn drop(&mut self) {
        // Creator backstop: the names must not outlive the coordinator.
        if self.owner {
            self.destroy();
        } else {
            self.close();
        }
    }
}

impl std::fmt::Debug for FrameBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBarrier")
            .field("base", &self.base)
            .field("count", &self.count)
            .field("owner", &self.owner)
            .finish()
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Derive the two semaphore names from a base name.
fn sem_names(base: &str) -> BackplaneResult<(CString, CString)> {
    let step = CString::new(format!("{base}_step"));
    let done = CString::new(format!("{base}_done"));
    match (step, done) {
        (Ok(s), Ok(d)) => Ok((s, d)),
        _ => Err(BackplaneError::Os {
            name: base.to_string(),
            source: Errno::EINVAL,
        }),
    }
}

fn sem_open_create(name: &CString) -> BackplaneResult<*mut libc::sem_t> {
    // Initial value 0: nothing is released until the coordinator posts.
    let sem = unsafe {
        libc::sem_open(
            name.as_ptr(),
            libc::O_CREAT | libc::O_EXCL,
            0o600 as libc::mode_t,
            0u32,
        )
    };
    if sem == libc::SEM_FAILED {
        let errno = Errno::last();
        let display = name.to_string_lossy().into_owned();
        return Err(if errno == Errno::EEXIST {
            BackplaneError::AlreadyExists { name: display }
        } else {
            BackplaneError::Os {
                name: display,
                source: errno,
            }
        });
    }
    Ok(sem)
}

fn sem_open_existing(name: &CString) -> BackplaneResult<*mut libc::sem_t> {
    let sem = unsafe { libc::sem_open(name.as_ptr(), 0) };
    if sem == libc::SEM_FAILED {
        let errno = Errno::last();
        let display = name.to_string_lossy().into_owned();
        return Err(if errno == Errno::ENOENT {
            BackplaneError::NotFound { name: display }
        } else {
            BackplaneError::Os {
                name: display,
                source: errno,
            }
        });
    }
    Ok(sem)
}

/// Convert a relative timeout into an absolute CLOCK_REALTIME deadline
/// for `sem_timedwait`.
fn absolute_deadline(timeout: Duration) -> BackplaneResult<libc::timespec> {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) };
    if rc != 0 {
        return Err(BackplaneError::Os {
            name: "clock_gettime".to_string(),
            source: Errno::last(),
        });
    }
    let mut sec = now.tv_sec + timeout.as_secs() as libc::time_t;
    let mut nsec = now.tv_nsec + timeout.subsec_nanos() as libc::c_long;
    if nsec >= 1_000_000_000 {
        sec += 1;
        nsec -= 1_000_000_000;
    }
    Ok(libc::timespec {
        tv_sec: sec,
        tv_nsec: nsec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Unique barrier base per test for isolation.
    fn test_base(suffix: &str) -> String {
        static CTR: AtomicU32 = AtomicU32::new(0);
        let id = CTR.fetch_add(1, Ordering::Relaxed);
        format!("/hermes_test_{}_{id}_{suffix}", std::process::id())
    }

    #[test]
    fn create_then_attach() {
        let base = test_base("attach");
        let mut coordinator = FrameBarrier::create(&base, 2).unwrap();
        let mut module = FrameBarrier::attach(&base).unwrap();
        assert_eq!(coordinator.count(), 2);
        module.close();
        coordinator.destroy();
    }

    #[test]
    fn duplicate_create_fails() {
        let base = test_base("dup");
        let mut first = FrameBarrier::create(&base, 1).unwrap();
        let second = FrameBarrier::create(&base, 1);
        assert!(matches!(second, Err(BackplaneError::AlreadyExists { .. })));
        first.destroy();
    }

    #[test]
    fn attach_missing_fails() {
        let result = FrameBarrier::attach("/hermes_test_no_such_barrier");
        assert!(matches!(result, Err(BackplaneError::NotFound { .. })));
    }

    #[test]
    fn step_release_and_done_collection() {
        let base = test_base("cycle");
        let mut coordinator = FrameBarrier::create(&base, 3).unwrap();
        let module = FrameBarrier::attach(&base).unwrap();

        coordinator.signal_step().unwrap();
        // Three releases pending; a participant can take each one.
        for _ in 0..3 {
            assert!(module.wait_step(Some(Duration::ZERO)).unwrap());
        }
        // Quiescent again: nothing left.
        assert!(!module.wait_step(Some(Duration::ZERO)).unwrap());

        for _ in 0..3 {
            module.signal_done().unwrap();
        }
        assert!(coordinator
            .wait_all_done(Some(Duration::from_millis(100)))
            .unwrap());
        // Quiescent: done drained to zero.
        assert!(!coordinator.wait_done(Some(Duration::ZERO)).unwrap());

        drop(module);
        coordinator.destroy();
    }

    #[test]
    fn zero_timeout_returns_pending_release_immediately() {
        let base = test_base("zero");
        let mut barrier = FrameBarrier::create(&base, 1).unwrap();
        assert!(!barrier.wait_step(Some(Duration::ZERO)).unwrap());
        barrier.signal_step().unwrap();
        assert!(barrier.wait_step(Some(Duration::ZERO)).unwrap());
        barrier.destroy();
    }

    #[test]
    fn wait_times_out_without_release() {
        let base = test_base("timeout");
        let mut barrier = FrameBarrier::create(&base, 1).unwrap();
        let released = barrier.wait_done(Some(Duration::from_millis(50))).unwrap();
        assert!(!released);
        barrier.destroy();
    }

    #[test]
    fn destroy_is_idempotent() {
        let base = test_base("destroy");
        let mut barrier = FrameBarrier::create(&base, 1).unwrap();
        barrier.destroy();
        barrier.destroy(); // Second call is a no-op.
        // Names are gone.
        assert!(matches!(
            FrameBarrier::attach(&base),
            Err(BackplaneError::NotFound { .. })
        ));
    }

    #[test]
    fn cross_thread_rendezvous() {
        let base = test_base("thread");
        let coordinator = FrameBarrier::create(&base, 1).unwrap();
        let worker_base = base.clone();

        let worker = std::thread::spawn(move || {
            let module = FrameBarrier::attach(&worker_base).unwrap();
            for _ in 0..10 {
                assert!(module.wait_step(Some(Duration::from_secs(2))).unwrap());
                module.signal_done().unwrap();
            }
        });

        let mut coordinator = coordinator;
        for _ in 0..10 {
            coordinator.signal_step().unwrap();
            assert!(coordinator
                .wait_all_done(Some(Duration::from_secs(2)))
                .unwrap());
        }
        worker.join().unwrap();
        coordinator.destroy();
    }
}
