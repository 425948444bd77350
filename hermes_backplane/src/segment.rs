//! Backplane segment: creation, attachment, and signal access.
//!
//! One named POSIX shared memory object carries every signal value plus
//! the simulation clock. The coordinator creates it before any module
//! spawn and unlinks it at teardown; modules, the router, and telemetry
//! readers attach to it.
//!
//! ## Type policy
//!
//! Every slot occupies one 8-byte, 8-aligned cell. The value is stored
//! in the slot's declared representation (little-endian in the cell's
//! low bytes, high bytes zero). The public surface exposes only `f64`
//! accessors: reads widen the declared representation to `f64`, writes
//! narrow from `f64` (truncating toward zero for integer types, nonzero
//! to 1 for bool). Slot-index accessors are the advanced API for hot
//! loops such as the wire router.

use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, OwnedFd};
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};

use nix::fcntl::OFlag;
use nix::sys::mman::{self, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd;
use tracing::{debug, warn};

use hermes_common::consts::{BACKPLANE_MAGIC, BACKPLANE_VERSION, DIRECTORY_ENTRY_SIZE, HEADER_SIZE};
use hermes_common::signal::{SignalDescriptor, SignalFlags, SignalType};

use crate::error::{BackplaneError, BackplaneResult};
use crate::layout::{
    build_directory, BackplaneHeader, DirectoryEntry, SegmentLayout, FRAME_OFFSET, TIME_NS_OFFSET,
};

// ─── Cell Codec ─────────────────────────────────────────────────────

/// Widen a raw 8-byte cell to `f64` per the declared type.
#[inline]
pub(crate) fn decode_cell(raw: u64, data_type: SignalType) -> f64 {
    match data_type {
        SignalType::F64 => f64::from_bits(raw),
        SignalType::F32 => f32::from_bits(raw as u32) as f64,
        SignalType::I64 => raw as i64 as f64,
        SignalType::I32 => raw as u32 as i32 as f64,
        SignalType::Bool => {
            if raw & 0xFF != 0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Narrow an `f64` into a raw 8-byte cell per the declared type.
#[inline]
pub(crate) fn encode_cell(value: f64, data_type: SignalType) -> u64 {
    match data_type {
        SignalType::F64 => value.to_bits(),
        SignalType::F32 => (value as f32).to_bits() as u64,
        SignalType::I64 => value as i64 as u64,
        SignalType::I32 => value as i32 as u32 as u64,
        SignalType::Bool => u64::from(value != 0.0),
    }
}

// ─── Slot Metadata ──────────────────────────────────────────────────

/// Per-slot metadata cached at create/attach time.
#[derive(Debug, Clone)]
struct SlotInfo {
    name: String,
    data_type: SignalType,
    flags: SignalFlags,
    /// Absolute byte offset of the cell within the mapping.
    offset: usize,
}

/// One row of a directory dump, as printed by `list-signals` and
/// compared in round-trip tests. `offset` is relative to the value
/// region start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDump {
    /// Qualified signal name.
    pub name: String,
    /// Declared data type.
    pub data_type: SignalType,
    /// Property flags.
    pub flags: SignalFlags,
    /// Slot index.
    pub slot: usize,
    /// Byte offset within the value region.
    pub offset: usize,
}

// ─── Backplane ──────────────────────────────────────────────────────

/// A mapped backplane segment.
///
/// Created by the coordinator (`create`) or attached by any other
/// participant (`attach` / `attach_read_only`). The creator owns the
/// kernel name and is the only party allowed to unlink it; attachers
/// merely unmap on drop.
pub struct Backplane {
    /// Kernel object name (with leading `/`).
    name: String,
    /// Memory-mapped segment.
    map_ptr: NonNull<libc::c_void>,
    /// Total mapped size.
    map_len: usize,
    /// Whether this handle created (and therefore owns) the name.
    owner: bool,
    /// Whether the name has already been unlinked.
    unlinked: bool,
    /// Whether the mapping is read-only.
    read_only: bool,
    /// Computed region offsets.
    layout: SegmentLayout,
    /// Slot metadata in directory order.
    slots: Vec<SlotInfo>,
    /// Qualified name to slot index.
    by_name: HashMap<String, usize>,
    /// Keeps the shm fd open for the lifetime of the mapping.
    _fd: OwnedFd,
}

// SAFETY: all mutation of the mapping goes through volatile 8-byte
// naturally-aligned loads and stores on a MAP_SHARED region that other
// processes already access concurrently. Cross-process ordering is
// provided by the frame barrier; in-process sharing adds nothing the
// segment does not already tolerate.
unsafe impl Send for Backplane {}
unsafe impl Sync for Backplane {}

impl Backplane {
    /// Create and initialize a new segment.
    ///
    /// Writes the header, directory, string table, and zeroed values
    /// before returning; modules are spawned only afterwards, so every
    /// attacher observes a fully initialized segment.
    ///
    /// # Errors
    /// - [`BackplaneError::AlreadyExists`] if the name is already present
    ///   in the kernel (a previous run did not unlink cleanly).
    /// - [`BackplaneError::DuplicateSignal`] on duplicate qualified names.
    /// - [`BackplaneError::Os`] for system-level failures.
    pub fn create(name: &str, descriptors: &[SignalDescriptor]) -> BackplaneResult<Self> {
        let name = normalize_name(name);
        let layout = SegmentLayout::compute(descriptors);

        let fd = mman::shm_open(
            name.as_str(),
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(|e| {
            if e == nix::errno::Errno::EEXIST {
                BackplaneError::AlreadyExists { name: name.clone() }
            } else {
                BackplaneError::Os {
                    name: name.clone(),
                    source: e,
                }
            }
        })?;

        unistd::ftruncate(&fd, layout.total_size as libc::off_t).map_err(|e| {
            let _ = mman::shm_unlink(name.as_str());
            BackplaneError::Os {
                name: name.clone(),
                source: e,
            }
        })?;

        let map_ptr = unsafe {
            mman::mmap(
                None,
                non_zero(layout.total_size),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &fd,
                0,
            )
            .map_err(|e| {
                let _ = mman::shm_unlink(name.as_str());
                BackplaneError::Os {
                    name: name.clone(),
                    source: e,
                }
            })?
        };

        // Build the full initialization image locally, then copy once.
        let mut image = vec![0u8; layout.total_size];
        let header = BackplaneHeader::new(descriptors.len() as u32);
        // SAFETY: BackplaneHeader is repr(C), 64 bytes, plain data.
        let header_bytes: &[u8] = unsafe {
            core::slice::from_raw_parts(&header as *const BackplaneHeader as *const u8, HEADER_SIZE)
        };
        image[..HEADER_SIZE].copy_from_slice(header_bytes);

        let (entries, string_table) = build_directory(descriptors);
        for (i, entry) in entries.iter().enumerate() {
            let off = layout.directory_offset + i * DIRECTORY_ENTRY_SIZE;
            // SAFETY: DirectoryEntry is repr(C), 12 bytes, plain data.
            let entry_bytes: &[u8] = unsafe {
                core::slice::from_raw_parts(
                    entry as *const DirectoryEntry as *const u8,
                    DIRECTORY_ENTRY_SIZE,
                )
            };
            image[off..off + DIRECTORY_ENTRY_SIZE].copy_from_slice(entry_bytes);
        }
        image[layout.string_table_offset..layout.string_table_offset + string_table.len()]
            .copy_from_slice(&string_table);
        // Value region stays zero.

        // SAFETY: image.len() == layout.total_size == mapped length.
        unsafe {
            core::ptr::copy_nonoverlapping(
                image.as_ptr(),
                map_ptr.as_ptr() as *mut u8,
                layout.total_size,
            );
        }
        fence(Ordering::Release);

        let mut by_name = HashMap::with_capacity(descriptors.len());
        let mut slots = Vec::with_capacity(descriptors.len());
        for (slot, desc) in descriptors.iter().enumerate() {
            if by_name.insert(desc.name.clone(), slot).is_some() {
                // Unmap and unlink before reporting; the name must not leak.
                let _ = unsafe { mman::munmap(map_ptr, layout.total_size) };
                let _ = mman::shm_unlink(name.as_str());
                return Err(BackplaneError::DuplicateSignal {
                    name: desc.name.clone(),
                });
            }
            slots.push(SlotInfo {
                name: desc.name.clone(),
                data_type: desc.data_type,
                flags: desc.flags,
                offset: layout.slot_offset(slot),
            });
        }

        debug!(
            segment = %name,
            signals = descriptors.len(),
            bytes = layout.total_size,
            "backplane created"
        );

        Ok(Self {
            name,
            map_ptr,
            map_len: layout.total_size,
            owner: true,
            unlinked: false,
            read_only: false,
            layout,
            slots,
            by_name,
            _fd: fd,
        })
    }

    /// Attach read/write to an existing segment.
    ///
    /// Validates magic and version, then rebuilds the local name-to-slot
    /// table from the directory. Never writes to the header or directory.
    pub fn attach(name: &str) -> BackplaneResult<Self> {
        Self::attach_with(name, false)
    }

    /// Attach read-only (telemetry readers, `list-signals`).
    ///
    /// Write accessors on a read-only handle fail with
    /// [`BackplaneError::ReadOnly`].
    pub fn attach_read_only(name: &str) -> BackplaneResult<Self> {
        Self::attach_with(name, true)
    }

    fn attach_with(name: &str, read_only: bool) -> BackplaneResult<Self> {
        let name = normalize_name(name);

        let oflag = if read_only {
            OFlag::O_RDONLY
        } else {
            OFlag::O_RDWR
        };
        let fd = mman::shm_open(name.as_str(), oflag, Mode::empty()).map_err(|e| {
            if e == nix::errno::Errno::ENOENT {
                BackplaneError::NotFound { name: name.clone() }
            } else {
                BackplaneError::Os {
                    name: name.clone(),
                    source: e,
                }
            }
        })?;

        let stat = nix::sys::stat::fstat(fd.as_raw_fd()).map_err(|e| BackplaneError::Os {
            name: name.clone(),
            source: e,
        })?;
        let file_size = stat.st_size as usize;
        if file_size < HEADER_SIZE {
            return Err(BackplaneError::Truncated {
                name,
                expected: HEADER_SIZE,
                actual: file_size,
            });
        }

        let prot = if read_only {
            ProtFlags::PROT_READ
        } else {
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE
        };
        let map_ptr = unsafe {
            mman::mmap(None, non_zero(file_size), prot, MapFlags::MAP_SHARED, &fd, 0).map_err(
                |e| BackplaneError::Os {
                    name: name.clone(),
                    source: e,
                },
            )?
        };

        fence(Ordering::Acquire);
        let base = map_ptr.as_ptr() as *const u8;

        // SAFETY: file_size >= HEADER_SIZE; header fields are plain data.
        let (magic, version, signal_count) = unsafe {
            (
                core::ptr::read_unaligned(base as *const u32),
                core::ptr::read_unaligned(base.add(4) as *const u32),
                core::ptr::read_unaligned(base.add(24) as *const u32) as usize,
            )
        };
        if magic != BACKPLANE_MAGIC {
            let _ = unsafe { mman::munmap(map_ptr, file_size) };
            return Err(BackplaneError::WrongMagic {
                name,
                expected: BACKPLANE_MAGIC,
                found: magic,
            });
        }
        if version != BACKPLANE_VERSION {
            let _ = unsafe { mman::munmap(map_ptr, file_size) };
            return Err(BackplaneError::WrongVersion {
                name,
                expected: BACKPLANE_VERSION,
                found: version,
            });
        }

        let parsed = parse_directory(base, file_size, signal_count, &name);
        let (layout, slots, by_name) = match parsed {
            Ok(parts) => parts,
            Err(e) => {
                let _ = unsafe { mman::munmap(map_ptr, file_size) };
                return Err(e);
            }
        };

        debug!(segment = %name, signals = signal_count, read_only, "backplane attached");

        Ok(Self {
            name,
            map_ptr,
            map_len: file_size,
            owner: false,
            unlinked: false,
            read_only,
            layout,
            slots,
            by_name,
            _fd: fd,
        })
    }

    // ─── Signal Access ──────────────────────────────────────────────

    /// Slot index of a qualified name.
    pub fn slot_index(&self, name: &str) -> BackplaneResult<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| BackplaneError::UnknownSignal {
                name: name.to_string(),
            })
    }

    /// Read a signal value by qualified name, widened to `f64`.
    pub fn get_signal(&self, name: &str) -> BackplaneResult<f64> {
        let slot = self.slot_index(name)?;
        Ok(self.get_slot_value(slot))
    }

    /// Write a signal value by qualified name, narrowed from `f64`.
    ///
    /// Flag policy (WRITABLE) is enforced by the layers that compile
    /// access paths - wire validation and the scripting boundary - not
    /// here: a module writes its own output signals through this call.
    pub fn set_signal(&self, name: &str, value: f64) -> BackplaneResult<()> {
        let slot = self.slot_index(name)?;
        self.set_slot_value(slot, value)
    }

    /// Read a slot by index. Advanced API for hot loops; the index must
    /// come from [`Backplane::slot_index`] on this segment.
    #[inline]
    pub fn get_slot_value(&self, slot: usize) -> f64 {
        let info = &self.slots[slot];
        // SAFETY: slot offsets are within the mapping and 8-aligned.
        let raw = unsafe { self.load_u64(info.offset) };
        decode_cell(raw, info.data_type)
    }

    /// Write a slot by index. Advanced API for hot loops.
    #[inline]
    pub fn set_slot_value(&self, slot: usize, value: f64) -> BackplaneResult<()> {
        if self.read_only {
            return Err(BackplaneError::ReadOnly {
                name: self.name.clone(),
            });
        }
        let info = &self.slots[slot];
        // SAFETY: slot offsets are within the mapping and 8-aligned;
        // the mapping is writable (checked above).
        unsafe { self.store_u64(info.offset, encode_cell(value, info.data_type)) };
        Ok(())
    }

    // ─── Clock Access ───────────────────────────────────────────────

    /// Current frame counter from the header.
    #[inline]
    pub fn frame(&self) -> u64 {
        // SAFETY: FRAME_OFFSET is within the header, 8-aligned.
        unsafe { self.load_u64(FRAME_OFFSET) }
    }

    /// Current simulation time in nanoseconds from the header.
    #[inline]
    pub fn time_ns(&self) -> u64 {
        // SAFETY: TIME_NS_OFFSET is within the header, 8-aligned.
        unsafe { self.load_u64(TIME_NS_OFFSET) }
    }

    /// Set the frame counter. Coordinator only.
    pub fn set_frame(&self, frame: u64) -> BackplaneResult<()> {
        self.store_header_u64(FRAME_OFFSET, frame)
    }

    /// Set the simulation time. Coordinator only.
    pub fn set_time_ns(&self, time_ns: u64) -> BackplaneResult<()> {
        self.store_header_u64(TIME_NS_OFFSET, time_ns)
    }

    /// Write both clock fields, with a release fence so the subsequent
    /// barrier release publishes them to every module.
    pub fn set_clock(&self, frame: u64, time_ns: u64) -> BackplaneResult<()> {
        self.store_header_u64(FRAME_OFFSET, frame)?;
        self.store_header_u64(TIME_NS_OFFSET, time_ns)?;
        fence(Ordering::Release);
        Ok(())
    }

    fn store_header_u64(&self, offset: usize, value: u64) -> BackplaneResult<()> {
        if self.read_only {
            return Err(BackplaneError::ReadOnly {
                name: self.name.clone(),
            });
        }
        // SAFETY: header field offsets are within the mapping, 8-aligned.
        unsafe { self.store_u64(offset, value) };
        Ok(())
    }

    // ─── Introspection ──────────────────────────────────────────────

    /// Kernel object name (with leading `/`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of signal slots.
    pub fn signal_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether this handle created the segment.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Computed region layout.
    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    /// Qualified signal names in slot order.
    pub fn signal_names(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.name.clone()).collect()
    }

    /// Dump the directory as `(name, type, flags, slot, offset)` rows,
    /// offsets relative to the value region.
    pub fn dump(&self) -> Vec<SlotDump> {
        self.slots
            .iter()
            .enumerate()
            .map(|(slot, info)| SlotDump {
                name: info.name.clone(),
                data_type: info.data_type,
                flags: info.flags,
                slot,
                offset: info.offset - self.layout.value_region_offset,
            })
            .collect()
    }

    // ─── Destruction ────────────────────────────────────────────────

    /// Unlink the kernel object so it is reclaimed once the last
    /// attachment closes. Idempotent: a second call is a no-op. On
    /// non-owning handles this does nothing - modules only detach.
    pub fn destroy(&mut self) {
        if !self.owner || self.unlinked {
            return;
        }
        match mman::shm_unlink(self.name.as_str()) {
            Ok(()) | Err(nix::errno::Errno::ENOENT) => {}
            Err(e) => {
                // The kernel reclaims the memory regardless once all
                // mappings close; a failed unlink only leaves a name.
                warn!(segment = %self.name, error = %e, "shm_unlink failed");
            }
        }
        self.unlinked = true;
    }

    // ─── Raw Access ─────────────────────────────────────────────────

    /// # Safety
    /// `offset` must be within the mapping and 8-aligned.
    #[inline]
    unsafe fn load_u64(&self, offset: usize) -> u64 {
        core::ptr::read_volatile((self.map_ptr.as_ptr() as *const u8).add(offset) as *const u64)
    }

    /// # Safety
    /// `offset` must be within the mapping and 8-aligned, and the
    /// mapping must be writable.
    #[inline]
    unsafe fn store_u64(&self, offset: usize, value: u64) {
        core::ptr::write_volatile((self.map_ptr.as_ptr() as *mut u8).add(offset) as *mut u64, value)
    }
}

impl Drop for Backplane {
    fn drop(&mut self) {
        // Owner backstop: the name must not outlive the coordinator even
        // on abnormal exit paths that skip the explicit destroy().
        self.destroy();
        // SAFETY: map_ptr/map_len come from a successful mmap.
        unsafe {
            let _ = mman::munmap(self.map_ptr, self.map_len);
        }
    }
}

impl std::fmt::Debug for Backplane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backplane")
            .field("name", &self.name)
            .field("signals", &self.slots.len())
            .field("owner", &self.owner)
            .field("read_only", &self.read_only)
            .field("bytes", &self.map_len)
            .finish()
    }
}

// ─── Attach-Side Directory Parsing ──────────────────────────────────

type ParsedDirectory = (SegmentLayout, Vec<SlotInfo>, HashMap<String, usize>);

/// Rebuild slot metadata from a mapped segment's directory and string
/// table. The attacher re-derives the same layout the creator computed.
fn parse_directory(
    base: *const u8,
    file_size: usize,
    signal_count: usize,
    name: &str,
) -> BackplaneResult<ParsedDirectory> {
    let directory_end = HEADER_SIZE + signal_count * DIRECTORY_ENTRY_SIZE;
    if file_size < directory_end {
        return Err(BackplaneError::Truncated {
            name: name.to_string(),
            expected: directory_end,
            actual: file_size,
        });
    }

    let mut entries = Vec::with_capacity(signal_count);
    for i in 0..signal_count {
        let off = HEADER_SIZE + i * DIRECTORY_ENTRY_SIZE;
        // SAFETY: off + 12 <= directory_end <= file_size.
        let entry = unsafe { core::ptr::read_unaligned(base.add(off) as *const DirectoryEntry) };
        entries.push(entry);
    }

    // Measure the string table: names are packed densely after the
    // directory, so its length is the furthest NUL end.
    let string_table_start = directory_end;
    let mut names = Vec::with_capacity(signal_count);
    let mut max_end = 0usize;
    for entry in &entries {
        let start = string_table_start + entry.name_offset as usize;
        if start >= file_size {
            return Err(BackplaneError::CorruptDirectory {
                name: name.to_string(),
                detail: format!("name offset {} beyond segment", entry.name_offset),
            });
        }
        // SAFETY: start < file_size; the scan below stays within bounds.
        let mut end = start;
        loop {
            if end >= file_size {
                return Err(BackplaneError::CorruptDirectory {
                    name: name.to_string(),
                    detail: "unterminated signal name".to_string(),
                });
            }
            if unsafe { *base.add(end) } == 0 {
                break;
            }
            end += 1;
        }
        // SAFETY: [start, end) is within the mapping.
        let bytes = unsafe { core::slice::from_raw_parts(base.add(start), end - start) };
        let signal_name = std::str::from_utf8(bytes)
            .map_err(|_| BackplaneError::CorruptDirectory {
                name: name.to_string(),
                detail: "signal name is not UTF-8".to_string(),
            })?
            .to_string();
        names.push(signal_name);
        max_end = max_end.max(end + 1 - string_table_start);
    }

    let layout = SegmentLayout::from_parts(signal_count, max_end);
    if file_size < layout.total_size {
        return Err(BackplaneError::Truncated {
            name: name.to_string(),
            expected: layout.total_size,
            actual: file_size,
        });
    }

    let mut slots = Vec::with_capacity(signal_count);
    let mut by_name = HashMap::with_capacity(signal_count);
    for (slot, (entry, signal_name)) in entries.iter().zip(names).enumerate() {
        let data_type = SignalType::from_u8(entry.data_type).ok_or_else(|| {
            BackplaneError::CorruptDirectory {
                name: name.to_string(),
                detail: format!("invalid data type byte {}", entry.data_type),
            }
        })?;
        by_name.insert(signal_name.clone(), slot);
        slots.push(SlotInfo {
            name: signal_name,
            data_type,
            flags: SignalFlags::from_bits_truncate(entry.flags),
            offset: layout.value_region_offset + entry.data_offset as usize,
        });
    }

    Ok((layout, slots, by_name))
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Ensure a kernel object name carries the leading slash POSIX requires.
pub(crate) fn normalize_name(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

fn non_zero(size: usize) -> std::num::NonZeroUsize {
    // Segment sizes always include the 64-byte header.
    std::num::NonZeroUsize::new(size.max(1)).unwrap_or(std::num::NonZeroUsize::MIN)
}

/// Remove stale Hermes kernel objects left by a crashed coordinator.
///
/// Scans `/dev/shm` for segment files and semaphore files matching the
/// Hermes prefix and removes them. Only safe to call at startup, before
/// this run's own objects exist. Returns the removed file names.
pub fn sweep_stale_objects() -> Vec<String> {
    let mut removed = Vec::new();
    let Ok(entries) = std::fs::read_dir("/dev/shm") else {
        return removed;
    };
    for entry in entries.flatten() {
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        // Segments appear as "hermes_*", semaphores as "sem.hermes_*".
        let stale = file_name.starts_with("hermes_") || file_name.starts_with("sem.hermes_");
        if stale && std::fs::remove_file(entry.path()).is_ok() {
            warn!(object = %file_name, "removed stale IPC object");
            removed.push(file_name);
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_codec_f64_is_exact() {
        for v in [0.0, -1.5, 1e300, f64::MIN_POSITIVE] {
            assert_eq!(decode_cell(encode_cell(v, SignalType::F64), SignalType::F64), v);
        }
    }

    #[test]
    fn cell_codec_integers_truncate_toward_zero() {
        assert_eq!(decode_cell(encode_cell(3.9, SignalType::I64), SignalType::I64), 3.0);
        assert_eq!(decode_cell(encode_cell(-3.9, SignalType::I64), SignalType::I64), -3.0);
        assert_eq!(decode_cell(encode_cell(-7.2, SignalType::I32), SignalType::I32), -7.0);
    }

    #[test]
    fn cell_codec_bool_normalizes() {
        assert_eq!(decode_cell(encode_cell(2.5, SignalType::Bool), SignalType::Bool), 1.0);
        assert_eq!(decode_cell(encode_cell(0.0, SignalType::Bool), SignalType::Bool), 0.0);
        assert_eq!(decode_cell(encode_cell(-1.0, SignalType::Bool), SignalType::Bool), 1.0);
    }

    #[test]
    fn cell_codec_f32_roundtrips_through_f64() {
        let raw = encode_cell(1.25, SignalType::F32);
        assert_eq!(decode_cell(raw, SignalType::F32), 1.25);
        // High bytes stay zero.
        assert_eq!(raw >> 32, 0);
    }

    #[test]
    fn normalize_name_prepends_slash() {
        assert_eq!(normalize_name("hermes_x"), "/hermes_x");
        assert_eq!(normalize_name("/hermes_x"), "/hermes_x");
    }
}
