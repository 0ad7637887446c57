//! Raw mount-point reparse operations over `DeviceIoControl`.
//!
//! Everything in here maps one Win32 call to one function and reports plain
//! `io::Error`s; the retry, cleanup, and leniency policies live a level up
//! in `internals`.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::mem;
use std::os::windows::ffi::OsStringExt;
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::AsRawHandle;
use std::path::{Path, PathBuf};
use std::ptr;
use std::slice;

use windows_sys::Win32::Foundation::{GENERIC_READ, GENERIC_WRITE, HANDLE};
use windows_sys::Win32::Storage::FileSystem::{
    FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_OPEN_REPARSE_POINT, FILE_SHARE_DELETE, FILE_SHARE_READ,
    FILE_SHARE_WRITE, MAXIMUM_REPARSE_DATA_BUFFER_SIZE,
};
use windows_sys::Win32::System::Ioctl::{
    FSCTL_DELETE_REPARSE_POINT, FSCTL_GET_REPARSE_POINT, FSCTL_SET_REPARSE_POINT,
};
use windows_sys::Win32::System::SystemServices::IO_REPARSE_TAG_MOUNT_POINT;
use windows_sys::Win32::System::IO::DeviceIoControl;

use super::helpers;
use super::types::{
    AlignedReparseBuf, ReparseDataBuffer, ReparseGuidDataBuffer,
    MOUNT_POINT_REPARSE_BUFFER_HEADER_SIZE, REPARSE_DATA_BUFFER_HEADER_SIZE,
    REPARSE_GUID_DATA_BUFFER_HEADER_SIZE,
};

/// Tells NTFS the path is to be taken verbatim, with no further name
/// resolution in the virtual filesystem: `\??\`.
const NON_INTERPRETED_PATH_PREFIX: [u16; 4] = [b'\\' as u16, b'?' as u16, b'?' as u16, b'\\' as u16];

const WCHAR_SIZE: u16 = mem::size_of::<u16>() as u16;
const UNICODE_NULL_SIZE: u16 = WCHAR_SIZE;

/// Writes mount-point reparse data pointing at `target` onto a fresh
/// directory created at `link`.
///
/// The substitute name gets the `\??\` prefix the kernel resolves through;
/// the print name is the plain absolute target, which is what [`read`]
/// reports back.
pub fn set(target: &Path, link: &Path) -> io::Result<()> {
    const MAX_AVAILABLE_PATH_BUFFER: u16 = MAXIMUM_REPARSE_DATA_BUFFER_SIZE as u16
        - REPARSE_DATA_BUFFER_HEADER_SIZE
        - MOUNT_POINT_REPARSE_BUFFER_HEADER_SIZE
        - 2 * UNICODE_NULL_SIZE;

    // The ioctl layer is picky about paths: no forward slashes, no
    // relative segments. Resolve through the OS first.
    let print_name = helpers::get_full_path(target)?;
    let substitute_name: Vec<u16> = NON_INTERPRETED_PATH_PREFIX
        .iter()
        .chain(print_name.iter())
        .copied()
        .collect();

    // Sized in usize first so an oversized path cannot wrap the u16 math.
    let substitute_len = substitute_name.len() * usize::from(WCHAR_SIZE);
    let print_len = print_name.len() * usize::from(WCHAR_SIZE);
    if substitute_len + print_len > usize::from(MAX_AVAILABLE_PATH_BUFFER) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "`target` path does not fit in a reparse data buffer",
        ));
    }
    let substitute_len = substitute_len as u16;
    let print_len = print_len as u16;

    fs::create_dir(link)?;
    let handle = open_reparse_point(link, true)?;

    let mut buf = AlignedReparseBuf::zeroed();
    let rdb = buf.as_mut_ptr();
    let in_buffer_size: u16;
    unsafe {
        let rdb = &mut *rdb;
        rdb.reparse_tag = IO_REPARSE_TAG_MOUNT_POINT;
        rdb.reserved = 0;
        rdb.reparse_data_length = MOUNT_POINT_REPARSE_BUFFER_HEADER_SIZE
            + substitute_len
            + UNICODE_NULL_SIZE
            + print_len
            + UNICODE_NULL_SIZE;
        in_buffer_size = REPARSE_DATA_BUFFER_HEADER_SIZE + rdb.reparse_data_length;

        let rb = &mut rdb.reparse_buffer;
        rb.substitute_name_offset = 0;
        rb.substitute_name_length = substitute_len;
        rb.print_name_offset = substitute_len + UNICODE_NULL_SIZE;
        rb.print_name_length = print_len;

        // In-bounds per the MAX_AVAILABLE_PATH_BUFFER check above. The
        // terminating NULs are already there from the zeroed buffer.
        let path_buffer = rb.path_buffer.as_mut_ptr();
        ptr::copy_nonoverlapping(substitute_name.as_ptr(), path_buffer, substitute_name.len());
        ptr::copy_nonoverlapping(
            print_name.as_ptr(),
            path_buffer.add(substitute_name.len() + 1),
            print_name.len(),
        );
    }

    set_reparse_point(handle.as_raw_handle() as HANDLE, rdb, u32::from(in_buffer_size))
}

/// Reads the reparse data at `link`. `Ok(None)` means the path carries a
/// reparse tag other than a mount point; paths with no reparse data at all
/// error with `ERROR_NOT_A_REPARSE_POINT`.
pub fn read(link: &Path) -> io::Result<Option<PathBuf>> {
    let handle = open_reparse_point(link, false)?;
    let mut buf = AlignedReparseBuf::zeroed();
    get_reparse_point(handle.as_raw_handle() as HANDLE, buf.as_mut_ptr())?;

    let rdb = unsafe { &*buf.as_ptr() };
    if rdb.reparse_tag != IO_REPARSE_TAG_MOUNT_POINT {
        return Ok(None);
    }
    let name_at = |offset: u16, len: u16| unsafe {
        let start = rdb
            .reparse_buffer
            .path_buffer
            .as_ptr()
            .add((offset / WCHAR_SIZE) as usize);
        slice::from_raw_parts(start, (len / WCHAR_SIZE) as usize)
    };

    let print_name = name_at(
        rdb.reparse_buffer.print_name_offset,
        rdb.reparse_buffer.print_name_length,
    );
    if !print_name.is_empty() {
        return Ok(Some(PathBuf::from(OsString::from_wide(print_name))));
    }
    // Junctions made by other tools may omit the print name; fall back to
    // the substitute name, minus the kernel-space prefix.
    let mut substitute_name = name_at(
        rdb.reparse_buffer.substitute_name_offset,
        rdb.reparse_buffer.substitute_name_length,
    );
    if substitute_name.starts_with(&NON_INTERPRETED_PATH_PREFIX) {
        substitute_name = &substitute_name[NON_INTERPRETED_PATH_PREFIX.len()..];
    }
    Ok(Some(PathBuf::from(OsString::from_wide(substitute_name))))
}

/// Strips the reparse data from `link`, leaving a plain (usually empty)
/// directory entry behind.
pub fn delete(link: &Path) -> io::Result<()> {
    let handle = open_reparse_point(link, true)?;
    delete_reparse_point(handle.as_raw_handle() as HANDLE)
}

/// Opens the reparse point itself, not whatever it points at.
fn open_reparse_point(link: &Path, rdwr: bool) -> io::Result<File> {
    let access = if rdwr {
        GENERIC_READ | GENERIC_WRITE
    } else {
        GENERIC_READ
    };
    OpenOptions::new()
        .access_mode(access)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE)
        .custom_flags(FILE_FLAG_OPEN_REPARSE_POINT | FILE_FLAG_BACKUP_SEMANTICS)
        .open(link)
}

fn get_reparse_point(handle: HANDLE, rdb: *mut ReparseDataBuffer) -> io::Result<()> {
    let mut bytes_returned: u32 = 0;
    if unsafe {
        DeviceIoControl(
            handle,
            FSCTL_GET_REPARSE_POINT,
            ptr::null(),
            0,
            rdb.cast(),
            MAXIMUM_REPARSE_DATA_BUFFER_SIZE,
            &mut bytes_returned,
            ptr::null_mut(),
        )
    } == 0
    {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn set_reparse_point(handle: HANDLE, rdb: *mut ReparseDataBuffer, len: u32) -> io::Result<()> {
    let mut bytes_returned: u32 = 0;
    if unsafe {
        DeviceIoControl(
            handle,
            FSCTL_SET_REPARSE_POINT,
            rdb.cast(),
            len,
            ptr::null_mut(),
            0,
            &mut bytes_returned,
            ptr::null_mut(),
        )
    } == 0
    {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn delete_reparse_point(handle: HANDLE) -> io::Result<()> {
    let mut rgdb: ReparseGuidDataBuffer = unsafe { mem::zeroed() };
    rgdb.reparse_tag = IO_REPARSE_TAG_MOUNT_POINT;
    let mut bytes_returned: u32 = 0;

    if unsafe {
        DeviceIoControl(
            handle,
            FSCTL_DELETE_REPARSE_POINT,
            (&mut rgdb as *mut ReparseGuidDataBuffer).cast(),
            u32::from(REPARSE_GUID_DATA_BUFFER_HEADER_SIZE),
            ptr::null_mut(),
            0,
            &mut bytes_returned,
            ptr::null_mut(),
        )
    } == 0
    {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
