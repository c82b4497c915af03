//! Read-only view of one named shared-memory segment

use crate::shm::MappedRegion;
use crate::{Result, TelemetryError};
use std::ptr::NonNull;
use tracing::{debug, trace};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_BASIC_INFORMATION, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile,
    OpenFileMappingW, UnmapViewOfFile, VirtualQuery,
};
use windows::core::PCWSTR;

/// Mapped view of a segment such as `Local\acpmf_physics`.
///
/// The view and mapping handle are released on drop.
pub struct Segment {
    name: String,
    mapping: HANDLE,
    base: NonNull<u8>,
    len: usize,
}

impl Segment {
    /// Open and map `name` read-only.
    ///
    /// Fails with [`TelemetryError::WindowsApi`] when the segment does not
    /// exist (the simulation is not running) and with
    /// [`TelemetryError::Memory`] when the view is smaller than `min_len`.
    pub fn open(name: &str, min_len: usize) -> Result<Self> {
        trace!(name, "Opening shared memory segment");

        let mapping = unsafe {
            let wide_name = wide_string(name);
            OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR::from_raw(wide_name.as_ptr()))
                .map_err(|e| TelemetryError::windows_api_error("OpenFileMappingW", e))?
        };

        let base = unsafe {
            let ptr = MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, 0);
            match NonNull::new(ptr.Value as *mut u8) {
                Some(base) => base,
                None => {
                    let win_err = windows::core::Error::from_thread();
                    let _ = CloseHandle(mapping);
                    return Err(TelemetryError::windows_api_error("MapViewOfFile", win_err));
                }
            }
        };

        let len = unsafe {
            let mut info = MEMORY_BASIC_INFORMATION::default();
            let written = VirtualQuery(
                Some(base.as_ptr() as *const _),
                &mut info,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            );
            if written == 0 { 0 } else { info.RegionSize }
        };

        // Constructed before the size check so Drop releases the view on error.
        let segment = Self { name: name.to_string(), mapping, base, len };

        if segment.len < min_len {
            return Err(TelemetryError::memory_access_error(segment.len));
        }

        debug!(name, len = segment.len, "Mapped shared memory segment");
        Ok(segment)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MappedRegion for Segment {
    fn len(&self) -> usize {
        self.len
    }

    fn packet_id(&self) -> i32 {
        // Views are page aligned, so the leading i32 is aligned.
        unsafe { std::ptr::read_volatile(self.base.as_ptr() as *const i32) }
    }

    fn copy_into(&self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.len);
        unsafe { std::ptr::copy_nonoverlapping(self.base.as_ptr(), buf.as_mut_ptr(), n) };
        n
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        unsafe {
            let addr = MEMORY_MAPPED_VIEW_ADDRESS { Value: self.base.as_ptr() as *mut _ };
            let _ = UnmapViewOfFile(addr);
            let _ = CloseHandle(self.mapping);
        }
        trace!(name = %self.name, "Unmapped shared memory segment");
    }
}

// SAFETY: The segment only holds a mapping handle and a read-only view pointer,
// both valid from any thread until drop.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

/// Convert string to null-terminated wide string for Windows APIs
fn wide_string(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

#[cfg(all(test, windows))]
mod tests {
    use super::*;
    use crate::shm::PHYSICS_LEN;

    #[test]
    fn missing_segment_is_an_error() {
        let result = Segment::open("Local\\trailbreak_no_such_segment", PHYSICS_LEN);
        assert!(matches!(result, Err(TelemetryError::WindowsApi { .. })));
    }

    #[test]
    fn wide_names_are_nul_terminated() {
        let wide = wide_string("Local\\acpmf_static");
        assert_eq!(wide.last(), Some(&0));
        assert_eq!(wide.len(), "Local\\acpmf_static".len() + 1);
    }

    #[test]
    #[ignore = "assetto_corsa_required"]
    fn maps_live_physics_page() {
        let segment = Segment::open("Local\\acpmf_physics", PHYSICS_LEN).unwrap();
        assert!(segment.len() >= PHYSICS_LEN);
        let mut buf = vec![0u8; PHYSICS_LEN];
        assert_eq!(segment.copy_into(&mut buf), PHYSICS_LEN);
    }
}
