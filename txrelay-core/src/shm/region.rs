// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedMemoryRegion - POSIX shared memory wrapper.
//!
//! Provides safe abstraction over shm_open and mmap. The region outlives
//! the process that created it: nothing is unlinked on drop, because the
//! producer typically exits before the consumer has read everything.
//! Removal is explicit through [`SharedMemoryRegion::unlink`].

use std::ffi::CString;
use std::ptr::NonNull;

use crate::error::StoreError;
use crate::types::{MAX_STORE_CAPACITY, MIN_STORE_CAPACITY};

/// Represents a mapped shared memory region.
///
/// This struct owns the mapping and the descriptor and releases both on
/// drop. The memory can be shared between processes using the same name.
pub struct SharedMemoryRegion {
    /// Name of the shared memory object (without the leading slash).
    name: String,
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// Size of the mapped region in bytes.
    size: usize,
    /// File descriptor for the shared memory object.
    fd: i32,
}

// SAFETY: SharedMemoryRegion owns its mapping; it can move between threads.
unsafe impl Send for SharedMemoryRegion {}

// SAFETY: All shared access goes through the RecordStore, which coordinates
// readers and writers with atomics in the region header.
unsafe impl Sync for SharedMemoryRegion {}

fn shm_path(name: &str) -> Result<CString, StoreError> {
    if name.is_empty() {
        return Err(StoreError::CreateFailed {
            name: name.to_string(),
            reason: "Name cannot be empty".to_string(),
        });
    }

    CString::new(format!("/{}", name)).map_err(|e| StoreError::CreateFailed {
        name: name.to_string(),
        reason: format!("Invalid name: {}", e),
    })
}

impl SharedMemoryRegion {
    /// Minimum size for a shared memory region.
    pub const MIN_SIZE: usize = MIN_STORE_CAPACITY;

    /// Maximum size for a shared memory region (1 GB).
    pub const MAX_SIZE: usize = MAX_STORE_CAPACITY;

    /// Create a new shared memory region. Fails if the name is taken.
    ///
    /// # Errors
    /// Returns StoreError if the size is out of bounds or creation or
    /// mapping fails.
    pub fn create(name: &str, size: usize) -> Result<Self, StoreError> {
        if size < Self::MIN_SIZE {
            return Err(StoreError::CreateFailed {
                name: name.to_string(),
                reason: format!("Size {} is below minimum {}", size, Self::MIN_SIZE),
            });
        }
        if size > Self::MAX_SIZE {
            return Err(StoreError::CreateFailed {
                name: name.to_string(),
                reason: format!("Size {} exceeds maximum {}", size, Self::MAX_SIZE),
            });
        }

        let c_name = shm_path(name)?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };

        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::EEXIST) {
                return Err(StoreError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            return Err(StoreError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        // ftruncate on a fresh shm object zero-fills it.
        // SAFETY: fd is a valid file descriptor
        let result = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
            return Err(StoreError::CreateFailed {
                name: name.to_string(),
                reason: format!("ftruncate failed: {}", errno),
            });
        }

        let ptr = match Self::map(fd, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { libc::close(fd) };
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                return Err(e);
            }
        };

        tracing::debug!(name = %name, size = size, "Created shared memory region");

        Ok(Self {
            name: name.to_string(),
            ptr,
            size,
            fd,
        })
    }

    /// Open an existing shared memory region, mapping its full current size.
    ///
    /// Returns `StoreError::NotFound` if no region with this name exists.
    pub fn open(name: &str) -> Result<Self, StoreError> {
        let c_name = shm_path(name)?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };

        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Err(StoreError::NotFound {
                    name: name.to_string(),
                });
            }
            return Err(StoreError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        // SAFETY: a zeroed stat is a valid out-parameter for fstat
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        // SAFETY: fd is valid, stat points to writable memory
        if unsafe { libc::fstat(fd, &mut stat) } < 0 {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(StoreError::MapFailed {
                reason: format!("fstat failed: {}", errno),
            });
        }

        let size = stat.st_size as usize;
        if size < Self::MIN_SIZE {
            // Creator has not sized the object yet.
            unsafe { libc::close(fd) };
            return Err(StoreError::NotReady {
                name: name.to_string(),
            });
        }

        let ptr = match Self::map(fd, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { libc::close(fd) };
                return Err(e);
            }
        };

        tracing::debug!(name = %name, size = size, "Opened shared memory region");

        Ok(Self {
            name: name.to_string(),
            ptr,
            size,
            fd,
        })
    }

    /// Create the region, or open it if another process already did.
    ///
    /// The boolean is true when this call created the region.
    pub fn open_or_create(name: &str, size: usize) -> Result<(Self, bool), StoreError> {
        match Self::create(name, size) {
            Ok(region) => Ok((region, true)),
            Err(StoreError::AlreadyExists { .. }) => {
                let region = Self::open(name)?;
                if region.size() != size {
                    tracing::warn!(
                        name = %name,
                        requested = size,
                        actual = region.size(),
                        "Existing shared memory region has a different size"
                    );
                }
                Ok((region, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the named region. Existing mappings stay valid until dropped.
    ///
    /// Returns false if there was nothing to remove.
    pub fn unlink(name: &str) -> Result<bool, StoreError> {
        let c_name = shm_path(name)?;

        // SAFETY: c_name is a valid CString
        if unsafe { libc::shm_unlink(c_name.as_ptr()) } < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Ok(false);
            }
            return Err(StoreError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_unlink failed: {}", errno),
            });
        }

        tracing::debug!(name = %name, "Unlinked shared memory region");
        Ok(true)
    }

    fn map(fd: i32, size: usize) -> Result<NonNull<u8>, StoreError> {
        // SAFETY: fd is valid, size matches the object size, offset 0 is valid
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(StoreError::MapFailed {
                reason: format!("mmap failed: {}", std::io::Error::last_os_error()),
            });
        }

        NonNull::new(ptr as *mut u8).ok_or_else(|| StoreError::MapFailed {
            reason: "mmap returned null".to_string(),
        })
    }

    /// Get the name of this shared memory region.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the size of this shared memory region.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get a raw pointer to the shared memory.
    ///
    /// Callers must coordinate access through the store header.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        // SAFETY: ptr and size were set during creation
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared memory"
            );
        }

        // SAFETY: fd was opened during creation
        unsafe { libc::close(self.fd) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("txrelay-region-{}-{}", tag, std::process::id())
    }

    #[test]
    fn test_shm_size_validation() {
        assert!(SharedMemoryRegion::create("txrelay-test-small", 100).is_err());
        assert!(SharedMemoryRegion::create(
            "txrelay-test-large",
            SharedMemoryRegion::MAX_SIZE + 1
        )
        .is_err());
    }

    #[test]
    fn test_shm_empty_name() {
        assert!(SharedMemoryRegion::create("", 4096).is_err());
        assert!(SharedMemoryRegion::open("").is_err());
    }

    #[test]
    fn test_open_missing_region() {
        let name = unique_name("missing");
        assert!(matches!(
            SharedMemoryRegion::open(&name),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_create_then_open_shares_memory() {
        let name = unique_name("share");
        let created = SharedMemoryRegion::create(&name, 8192).unwrap();
        // SAFETY: offset 100 is inside the 8192-byte mapping
        unsafe { *created.as_ptr().add(100) = 0xAB };

        let opened = SharedMemoryRegion::open(&name).unwrap();
        assert_eq!(opened.size(), 8192);
        // SAFETY: same offset in the second mapping of the same object
        assert_eq!(unsafe { *opened.as_ptr().add(100) }, 0xAB);

        assert!(SharedMemoryRegion::unlink(&name).unwrap());
        assert!(!SharedMemoryRegion::unlink(&name).unwrap());
    }

    #[test]
    fn test_open_or_create_reports_creator() {
        let name = unique_name("ooc");
        let (_first, created) = SharedMemoryRegion::open_or_create(&name, 4096).unwrap();
        assert!(created);
        let (second, created) = SharedMemoryRegion::open_or_create(&name, 8192).unwrap();
        assert!(!created);
        assert_eq!(second.size(), 4096);
        SharedMemoryRegion::unlink(&name).unwrap();
    }
}
