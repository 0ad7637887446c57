//! Small Win32 helpers shared by the internals: path resolution and
//! file-identity queries.

use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::io;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::AsRawHandle;
use std::path::Path;
use std::ptr;

use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::Storage::FileSystem::{
    GetFileInformationByHandle, GetFullPathNameW, BY_HANDLE_FILE_INFORMATION,
    FILE_FLAG_BACKUP_SEMANTICS,
};

/// Resolves `path` to an absolute UTF-16 string via `GetFullPathNameW`,
/// without the terminating NUL.
///
/// The low-level reparse APIs reject forward slashes and relative segments,
/// so paths headed their way go through this first. The path does not need
/// to exist.
pub fn get_full_path(path: &Path) -> io::Result<Vec<u16>> {
    let wide = to_utf16(path.as_os_str());
    // Large enough for nearly every path; the loop handles the rest. A
    // too-small buffer makes the call return the required size (including
    // the NUL) instead of the written length.
    let mut buf = vec![0u16; 512];
    loop {
        let len = unsafe {
            GetFullPathNameW(
                wide.as_ptr(),
                buf.len() as u32,
                buf.as_mut_ptr(),
                ptr::null_mut(),
            )
        } as usize;
        if len == 0 {
            return Err(io::Error::last_os_error());
        }
        if len < buf.len() {
            buf.truncate(len);
            return Ok(buf);
        }
        buf.resize(len, 0);
    }
}

/// NUL-terminated UTF-16 for handing to Win32.
pub fn to_utf16(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// Returns the (volume serial, file index) pair identifying the filesystem
/// record behind `path`, following links. The Windows analogue of
/// device+inode.
pub fn file_ids(path: &Path) -> io::Result<(u32, u64)> {
    // Zero access rights: enough to read attributes, and it avoids sharing
    // conflicts. BACKUP_SEMANTICS is required to open directories at all.
    let file = OpenOptions::new()
        .access_mode(0)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)?;
    let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { mem::zeroed() };
    if unsafe { GetFileInformationByHandle(file.as_raw_handle() as HANDLE, &mut info) } == 0 {
        return Err(io::Error::last_os_error());
    }
    let index = (u64::from(info.nFileIndexHigh) << 32) | u64::from(info.nFileIndexLow);
    Ok((info.dwVolumeSerialNumber, index))
}
