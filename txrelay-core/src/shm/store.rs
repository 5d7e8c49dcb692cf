// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Append-only record store in shared memory.
//!
//! Layout of the region:
//!
//! ```text
//! +--------------+---------------------------->      <-------------------+
//! | StoreHeader  | frame 0 | frame 1 | ...   free   ... | off 1 | off 0 |
//! +--------------+---------------------------->      <-------------------+
//! 0              64                                          region end
//! ```
//!
//! Frames (`[len u32][crc32 u32][payload, padded to 8]`) grow upward from
//! the header; a table of u64 frame offsets grows downward from the end of
//! the region so entries stay randomly addressable.
//!
//! Writers serialize through a CAS lock word in the header. A writer fills
//! in the frame and its offset slot, then publishes `used` and finally
//! `count` with release ordering. Readers load `count` with acquire
//! ordering, so any index below the observed count refers to a frame whose
//! bytes are fully visible.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::StoreError;
use crate::shm::SharedMemoryRegion;

/// "TXRELAY1" as a little-endian u64.
const STORE_MAGIC: u64 = u64::from_le_bytes(*b"TXRELAY1");

/// Layout version written by the creator.
const STORE_VERSION: u64 = 1;

/// Header size in bytes.
const HEADER_SIZE: usize = 64;

/// Frame header size in bytes (length + checksum).
const FRAME_HEADER_SIZE: usize = 8;

/// Alignment for frames (8 bytes).
const FRAME_ALIGNMENT: usize = 8;

/// Size of one offset table slot.
const SLOT_SIZE: usize = 8;

/// Maximum payload size (16 MB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// How long an opener waits for the creator to finish initializing.
const READY_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a writer waits for the lock before giving up.
const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Store header at the start of the region.
#[repr(C)]
struct StoreHeader {
    /// Written last by the creator; zero until the header is usable.
    magic: AtomicU64,
    version: AtomicU64,
    /// Total region size in bytes.
    capacity: AtomicU64,
    /// Number of published entries.
    count: AtomicU64,
    /// Bytes of frame data after the header.
    used: AtomicU64,
    /// PID of the writer holding the lock, 0 when free.
    writer: AtomicU64,
    _reserved: [u64; 2],
}

const _: () = assert!(std::mem::size_of::<StoreHeader>() == HEADER_SIZE);

/// Entry header for each frame.
#[repr(C)]
#[derive(Clone, Copy)]
struct FrameHeader {
    /// Length of the payload in bytes.
    length: u32,
    /// CRC32 checksum of the payload.
    checksum: u32,
}

/// Point-in-time occupancy of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub entries: usize,
    pub used_bytes: usize,
    pub free_bytes: usize,
    pub capacity: usize,
}

/// Shared, append-only sequence of encoded records.
pub struct RecordStore {
    region: SharedMemoryRegion,
}

/// Releases the writer lock on drop.
struct WriterGuard<'a> {
    header: &'a StoreHeader,
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        self.header.writer.store(0, Ordering::Release);
    }
}

impl RecordStore {
    /// Producer side: create the store if absent, otherwise attach to it.
    pub fn open_or_create(name: &str, capacity_bytes: usize) -> Result<Self, StoreError> {
        let (region, created) = SharedMemoryRegion::open_or_create(name, capacity_bytes)?;
        let store = Self { region };

        if created {
            store.initialize();
            tracing::info!(name = %name, capacity = capacity_bytes, "Created record store");
        } else {
            store.wait_ready()?;
            tracing::info!(name = %name, entries = store.len(), "Attached to existing record store");
        }

        Ok(store)
    }

    /// Consumer side: attach to a store created by a producer.
    ///
    /// Fails with `NotFound` or `NotReady` when the producer has not set the
    /// store up yet; both are retryable.
    pub fn open_existing(name: &str) -> Result<Self, StoreError> {
        let region = SharedMemoryRegion::open(name)?;
        let store = Self { region };
        store.check_header()?;
        tracing::debug!(name = %name, entries = store.len(), "Opened record store");
        Ok(store)
    }

    fn header(&self) -> &StoreHeader {
        // SAFETY: the region is page aligned and at least MIN_SIZE bytes,
        // so it always holds a full header.
        unsafe { &*(self.region.as_ptr() as *const StoreHeader) }
    }

    fn initialize(&self) {
        let header = self.header();
        header.version.store(STORE_VERSION, Ordering::Relaxed);
        header
            .capacity
            .store(self.region.size() as u64, Ordering::Relaxed);
        header.count.store(0, Ordering::Relaxed);
        header.used.store(0, Ordering::Relaxed);
        header.writer.store(0, Ordering::Relaxed);
        header.magic.store(STORE_MAGIC, Ordering::Release);
    }

    fn wait_ready(&self) -> Result<(), StoreError> {
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            match self.check_header() {
                Err(StoreError::NotReady { .. }) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                result => return result,
            }
        }
    }

    fn check_header(&self) -> Result<(), StoreError> {
        let header = self.header();
        let name = self.region.name();

        match header.magic.load(Ordering::Acquire) {
            0 => {
                return Err(StoreError::NotReady {
                    name: name.to_string(),
                })
            }
            STORE_MAGIC => {}
            other => {
                return Err(StoreError::IncompatibleLayout {
                    name: name.to_string(),
                    reason: format!("unexpected magic {:#018x}", other),
                })
            }
        }

        let version = header.version.load(Ordering::Relaxed);
        if version != STORE_VERSION {
            return Err(StoreError::IncompatibleLayout {
                name: name.to_string(),
                reason: format!("version {} (expected {})", version, STORE_VERSION),
            });
        }

        let capacity = header.capacity.load(Ordering::Relaxed) as usize;
        if capacity != self.region.size() {
            return Err(StoreError::IncompatibleLayout {
                name: name.to_string(),
                reason: format!(
                    "header capacity {} does not match region size {}",
                    capacity,
                    self.region.size()
                ),
            });
        }

        Ok(())
    }

    /// Name of the underlying shared memory object.
    pub fn name(&self) -> &str {
        self.region.name()
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        self.header().count.load(Ordering::Acquire) as usize
    }

    /// Check if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupancy snapshot.
    pub fn stats(&self) -> StoreStats {
        let entries = self.len();
        let used_bytes = self.header().used.load(Ordering::Acquire) as usize;
        let capacity = self.region.size();
        let occupied = HEADER_SIZE + used_bytes + entries * SLOT_SIZE;
        StoreStats {
            entries,
            used_bytes,
            free_bytes: capacity.saturating_sub(occupied),
            capacity,
        }
    }

    fn lock(&self) -> Result<WriterGuard<'_>, StoreError> {
        let header = self.header();
        let me = std::process::id() as u64;
        let deadline = Instant::now() + LOCK_TIMEOUT;
        let mut spins = 0u32;

        loop {
            match header
                .writer
                .compare_exchange(0, me, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return Ok(WriterGuard { header }),
                Err(holder) => {
                    if holder != me && !process_alive(holder) {
                        // Writer died mid-append; nothing it wrote was published.
                        if header
                            .writer
                            .compare_exchange(holder, me, Ordering::Acquire, Ordering::Relaxed)
                            .is_ok()
                        {
                            tracing::warn!(
                                name = %self.region.name(),
                                stale_pid = holder,
                                "Recovered writer lock from dead process"
                            );
                            return Ok(WriterGuard { header });
                        }
                        continue;
                    }

                    if Instant::now() >= deadline {
                        return Err(StoreError::LockTimeout {
                            name: self.region.name().to_string(),
                            holder,
                        });
                    }

                    spins += 1;
                    if spins < 64 {
                        std::hint::spin_loop();
                    } else {
                        std::thread::yield_now();
                    }
                }
            }
        }
    }

    /// Append one encoded record. Returns its index.
    ///
    /// The entry becomes visible to readers only once it is complete.
    pub fn append(&self, payload: &[u8]) -> Result<usize, StoreError> {
        if payload.is_empty() {
            return Err(StoreError::EmptyPayload);
        }
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(StoreError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let _guard = self.lock()?;
        let header = self.header();

        let count = header.count.load(Ordering::Acquire) as usize;
        let used = header.used.load(Ordering::Acquire) as usize;
        let capacity = self.region.size();

        let frame_size = align_up(FRAME_HEADER_SIZE + payload.len(), FRAME_ALIGNMENT);
        let frame_start = HEADER_SIZE + used;
        let table_start = capacity.saturating_sub((count + 1) * SLOT_SIZE);

        if frame_start + frame_size > table_start {
            return Err(StoreError::StoreFull {
                size: payload.len(),
                free: table_start.saturating_sub(frame_start),
            });
        }

        let frame_header = FrameHeader {
            length: payload.len() as u32,
            checksum: crc32fast::hash(payload),
        };

        // SAFETY: frame and slot ranges were checked against the region
        // bounds above, and the writer lock keeps other writers out of the
        // unpublished area. Readers never look past the published count.
        unsafe {
            let base = self.region.as_ptr();
            std::ptr::write_unaligned(base.add(frame_start) as *mut FrameHeader, frame_header);
            std::ptr::copy_nonoverlapping(
                payload.as_ptr(),
                base.add(frame_start + FRAME_HEADER_SIZE),
                payload.len(),
            );
            std::ptr::write_unaligned(base.add(table_start) as *mut u64, frame_start as u64);
        }

        header
            .used
            .store((used + frame_size) as u64, Ordering::Release);
        header.count.store((count + 1) as u64, Ordering::Release);

        Ok(count)
    }

    /// Copy out the payload at `index`, verifying its frame checksum.
    pub fn get(&self, index: usize) -> Result<Vec<u8>, StoreError> {
        let header = self.header();
        let len = header.count.load(Ordering::Acquire) as usize;
        if index >= len {
            return Err(StoreError::IndexOutOfBounds { index, len });
        }

        let capacity = self.region.size();
        let data_end = HEADER_SIZE + header.used.load(Ordering::Acquire) as usize;
        let slot = capacity - (index + 1) * SLOT_SIZE;
        let base = self.region.as_ptr();

        // SAFETY: slot lies inside the region since index < count and the
        // table never overlaps published frames.
        let offset = unsafe { std::ptr::read_unaligned(base.add(slot) as *const u64) } as usize;

        if offset < HEADER_SIZE || offset + FRAME_HEADER_SIZE > data_end {
            return Err(StoreError::CorruptFrame {
                index,
                reason: format!("offset {} outside frame area", offset),
            });
        }

        // SAFETY: the frame header range was validated just above
        let frame_header =
            unsafe { std::ptr::read_unaligned(base.add(offset) as *const FrameHeader) };
        let length = frame_header.length as usize;

        if offset + FRAME_HEADER_SIZE + length > data_end {
            return Err(StoreError::CorruptFrame {
                index,
                reason: format!("length {} runs past the frame area", length),
            });
        }

        let mut payload = vec![0u8; length];
        // SAFETY: payload range was validated against the published frame area
        unsafe {
            std::ptr::copy_nonoverlapping(
                base.add(offset + FRAME_HEADER_SIZE),
                payload.as_mut_ptr(),
                length,
            );
        }

        let actual = crc32fast::hash(&payload);
        if actual != frame_header.checksum {
            return Err(StoreError::FrameChecksumMismatch {
                index,
                expected: frame_header.checksum,
                actual,
            });
        }

        Ok(payload)
    }

    #[cfg(test)]
    fn frame_size_for(payload_len: usize) -> usize {
        align_up(FRAME_HEADER_SIZE + payload_len, FRAME_ALIGNMENT)
    }
}

/// Align value up to the given alignment.
const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

fn process_alive(pid: u64) -> bool {
    // SAFETY: signal 0 performs only the existence and permission check
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}
