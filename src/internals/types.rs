//! Layouts for the reparse-point ioctl payloads.
//!
//! References:
//! * <https://learn.microsoft.com/en-us/windows-hardware/drivers/ddi/ntifs/ns-ntifs-_reparse_data_buffer>
//! * <https://learn.microsoft.com/en-us/windows/win32/api/winnt/ns-winnt-reparse_guid_data_buffer>

use std::mem::{align_of, size_of};
use std::os::raw::{c_ulong, c_ushort};

use windows_sys::core::GUID;
use windows_sys::Win32::Storage::FileSystem::MAXIMUM_REPARSE_DATA_BUFFER_SIZE;

/// Bytes before `reparse_buffer` in [`ReparseDataBuffer`].
pub const REPARSE_DATA_BUFFER_HEADER_SIZE: u16 = 8;
/// Bytes before `generic_buffer` in [`ReparseGuidDataBuffer`].
pub const REPARSE_GUID_DATA_BUFFER_HEADER_SIZE: u16 = 24;
/// Bytes before `path_buffer` in [`MountPointReparseBuffer`].
pub const MOUNT_POINT_REPARSE_BUFFER_HEADER_SIZE: u16 = 8;

// The structs end in variable-length arrays, so the header sizes above are
// spelled out as constants and checked against the field sizes here.
const _: () = {
    assert!(
        size_of::<c_ulong>() + 2 * size_of::<c_ushort>()
            == REPARSE_DATA_BUFFER_HEADER_SIZE as usize
    );
    assert!(4 * size_of::<c_ushort>() == MOUNT_POINT_REPARSE_BUFFER_HEADER_SIZE as usize);
    assert!(
        size_of::<c_ulong>() + 2 * size_of::<c_ushort>() + size_of::<GUID>()
            == REPARSE_GUID_DATA_BUFFER_HEADER_SIZE as usize
    );
};

/// Payload of `FSCTL_GET_REPARSE_POINT` / `FSCTL_SET_REPARSE_POINT` for a
/// mount point (junction).
#[repr(C)]
pub struct ReparseDataBuffer {
    /// Must be `IO_REPARSE_TAG_MOUNT_POINT` for the buffers handled here.
    pub reparse_tag: c_ulong,
    /// Size, in bytes, of the data after `reserved`.
    pub reparse_data_length: c_ushort,
    pub reserved: c_ushort,
    pub reparse_buffer: MountPointReparseBuffer,
}

#[repr(C)]
pub struct MountPointReparseBuffer {
    /// Offset, in bytes, of the substitute name inside `path_buffer`.
    pub substitute_name_offset: c_ushort,
    /// Length, in bytes, of the substitute name, excluding its terminating
    /// `UNICODE_NULL`.
    pub substitute_name_length: c_ushort,
    /// Offset, in bytes, of the print name inside `path_buffer`.
    pub print_name_offset: c_ushort,
    /// Length, in bytes, of the print name, excluding its terminating
    /// `UNICODE_NULL`.
    pub print_name_length: c_ushort,
    /// Both NUL-terminated names, in either order, located via the
    /// offset/length fields above.
    pub path_buffer: [c_ushort; 1],
}

/// Header passed to `FSCTL_DELETE_REPARSE_POINT`. Only the tag matters for
/// Microsoft tags; the GUID stays zeroed.
#[repr(C)]
pub struct ReparseGuidDataBuffer {
    pub reparse_tag: c_ulong,
    pub reparse_data_length: c_ushort,
    pub reserved: c_ushort,
    pub reparse_guid: GUID,
    pub generic_buffer: [u8; 1],
}

const BUFFER_SIZE: usize = MAXIMUM_REPARSE_DATA_BUFFER_SIZE as usize;

/// Byte storage for a maximum-sized reparse data buffer, carrying the
/// alignment the [`ReparseDataBuffer`] view requires.
#[repr(align(4))]
pub struct AlignedReparseBuf {
    bytes: [u8; BUFFER_SIZE],
}

const _: () = {
    assert!(align_of::<AlignedReparseBuf>() % align_of::<ReparseDataBuffer>() == 0);
};

impl AlignedReparseBuf {
    // Boxed: the maximum buffer is 16 KiB, too big to shuffle around on the
    // stack.
    pub fn zeroed() -> Box<Self> {
        Box::new(Self {
            bytes: [0u8; BUFFER_SIZE],
        })
    }

    pub fn as_ptr(&self) -> *const ReparseDataBuffer {
        self.bytes.as_ptr().cast()
    }

    pub fn as_mut_ptr(&mut self) -> *mut ReparseDataBuffer {
        self.bytes.as_mut_ptr().cast()
    }
}
