use super::c::*;
use super::cast::BytesAsReparseDataBuffer;

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::windows::ffi::OsStringExt;
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::AsRawHandle;
use std::path::{Path, PathBuf};
use std::ptr;

#[cfg(feature = "unstable_admin")]
use scopeguard::ScopeGuard;

pub const SHARE_ALL: u32 = FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE;

/// Opens the entry itself, not what it points to. Directories are opened too.
///
/// `FILE_READ_ATTRIBUTES` is enough to query metadata and reparse data, and
/// is granted on entries whose contents the caller may not read.
pub fn open_reparse_point(reparse_point: &Path, access: u32, share: u32) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.access_mode(access)
        .share_mode(share)
        .custom_flags(FILE_FLAG_OPEN_REPARSE_POINT | FILE_FLAG_BACKUP_SEMANTICS);
    match opts.open(reparse_point) {
        #[cfg(feature = "unstable_admin")]
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            // Obtain privilege in case we don't have it yet
            let write = access & GENERIC_WRITE != 0;
            if let Err(privilege_error) = set_privilege(write) {
                log::debug!("cannot enable backup/restore privilege: {privilege_error}");
                return Err(e);
            }
            log::debug!("retrying {} with backup/restore privilege", reparse_point.display());
            opts.open(reparse_point)
        }
        other => other,
    }
}

#[cfg(feature = "unstable_admin")]
fn set_privilege(write: bool) -> io::Result<()> {
    use std::mem;

    const TOKEN_PRIVILEGES_SIZE: u32 = mem::size_of::<TOKEN_PRIVILEGES>() as _;
    unsafe {
        let mut handle = 0 as HANDLE;
        if OpenProcessToken(GetCurrentProcess(), TOKEN_ADJUST_PRIVILEGES, &mut handle) == 0 {
            return Err(io::Error::last_os_error());
        }
        let handle = scopeguard::guard(handle, |h| {
            CloseHandle(h);
        });
        let mut tp: TOKEN_PRIVILEGES = mem::zeroed();
        let name = if write { SE_RESTORE_NAME } else { SE_BACKUP_NAME };
        if LookupPrivilegeValueW(ptr::null(), name, &mut tp.Privileges[0].Luid) == 0 {
            return Err(io::Error::last_os_error());
        }
        tp.PrivilegeCount = 1;
        tp.Privileges[0].Attributes = SE_PRIVILEGE_ENABLED;
        if AdjustTokenPrivileges(
            *handle,
            0,
            &tp,
            TOKEN_PRIVILEGES_SIZE,
            ptr::null_mut(),
            ptr::null_mut(),
        ) == 0
        {
            return Err(io::Error::last_os_error());
        }
        if GetLastError() == ERROR_NOT_ALL_ASSIGNED {
            return Err(io::Error::from_raw_os_error(ERROR_NOT_ALL_ASSIGNED as i32));
        }

        let handle = ScopeGuard::into_inner(handle);
        if CloseHandle(handle) == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

/// Fills `data` with the reparse data of the entry behind `handle` and
/// returns the number of bytes written.
pub fn get_reparse_data_point(handle: &File, data: &mut BytesAsReparseDataBuffer) -> io::Result<usize> {
    // Call DeviceIoControl to get the reparse point data
    let mut bytes_returned: u32 = 0;
    if unsafe {
        DeviceIoControl(
            handle.as_raw_handle() as HANDLE,
            FSCTL_GET_REPARSE_POINT,
            ptr::null(),
            0,
            data.as_mut_ptr() as _,
            MAXIMUM_REPARSE_DATA_BUFFER_SIZE,
            &mut bytes_returned,
            ptr::null_mut(),
        )
    } == 0
    {
        return Err(io::Error::last_os_error());
    }
    Ok(bytes_returned as usize)
}

pub fn set_reparse_point(handle: &File, data: &mut BytesAsReparseDataBuffer, len: u32) -> io::Result<()> {
    let mut bytes_returned: u32 = 0;
    if unsafe {
        DeviceIoControl(
            handle.as_raw_handle() as HANDLE,
            FSCTL_SET_REPARSE_POINT,
            data.as_mut_ptr() as _,
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

pub fn file_attributes(path: &[u16]) -> io::Result<u32> {
    let path = to_wide_nul(path);
    let attrs = unsafe { GetFileAttributesW(path.as_ptr()) };
    if attrs == INVALID_FILE_ATTRIBUTES {
        Err(io::Error::last_os_error())
    } else {
        Ok(attrs)
    }
}

pub fn set_file_attributes(path: &[u16], attrs: u32) -> io::Result<()> {
    let path = to_wide_nul(path);
    if unsafe { SetFileAttributesW(path.as_ptr(), attrs) } == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// `DeleteFileW`. Fails with access denied on directories, links to them and
/// read-only files.
pub fn delete_file(path: &[u16]) -> io::Result<()> {
    let path = to_wide_nul(path);
    if unsafe { DeleteFileW(path.as_ptr()) } == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// `RemoveDirectoryW`. Removes an empty directory, or a junction or directory
/// symlink without touching its target.
pub fn remove_directory(path: &[u16]) -> io::Result<()> {
    let path = to_wide_nul(path);
    if unsafe { RemoveDirectoryW(path.as_ptr()) } == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Expands 8dot3 segments of an existing path. The prefix of `path`, if any,
/// is kept.
pub fn get_long_path(path: &[u16]) -> io::Result<Vec<u16>> {
    let path = to_wide_nul(path);
    fill_utf16_buf(
        |buf, sz| unsafe { GetLongPathNameW(path.as_ptr(), buf, sz) },
        <[u16]>::to_vec,
    )
}

// Many Windows APIs follow a pattern of where we hand a buffer and then they
// will report back to us how large the buffer should be or how many bytes
// currently reside in the buffer. This function is an abstraction over these
// functions by making them easier to call.
//
// The first callback, `f1`, is yielded a (pointer, len) pair which can be
// passed to a syscall. The `ptr` is valid for `len` items (u16 in this case).
// The closure is expected to return what the syscall returns which will be
// interpreted by this function to determine if the syscall needs to be invoked
// again (with more buffer space).
//
// Once the syscall has completed (errors bail out early) the second closure is
// yielded the data which has been read from the syscall. The return value
// from this closure is then the return value of the function.
//
// Ref: <rust-lang/rust/src/libstd/sys/windows/mod.rs#L106>.
fn fill_utf16_buf<F1, F2, T>(mut f1: F1, f2: F2) -> io::Result<T>
where
    F1: FnMut(*mut u16, u32) -> u32,
    F2: FnOnce(&[u16]) -> T,
{
    // Start off with a stack buf but then spill over to the heap if we end up
    // needing more space.
    let mut stack_buf = [0u16; 512];
    let mut heap_buf: Vec<u16> = Vec::new();
    let mut n = stack_buf.len();
    loop {
        let buf = if n <= stack_buf.len() {
            &mut stack_buf[..]
        } else {
            heap_buf.resize(n, 0);
            &mut heap_buf[..]
        };

        unsafe { SetLastError(0) };
        let k = f1(buf.as_mut_ptr(), n as u32) as usize;
        if k == 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { GetLastError() } == ERROR_INSUFFICIENT_BUFFER {
            n = n.saturating_mul(2).min(u32::MAX as usize);
        } else if k >= n {
            // Too small: `k` is the required size, terminating NUL included.
            n = k.max(n + 1);
        } else {
            return Ok(f2(&buf[..k]));
        }
    }
}

pub fn to_wide_nul(s: &[u16]) -> Vec<u16> {
    s.iter().copied().chain(std::iter::once(0)).collect()
}

pub fn to_path(s: &[u16]) -> PathBuf {
    PathBuf::from(OsString::from_wide(s))
}

pub fn raw_error_is(e: &io::Error, codes: &[u32]) -> bool {
    e.raw_os_error().map_or(false, |raw| codes.contains(&(raw as u32)))
}

/// The entry, or one of its parent directories, is missing.
pub fn is_not_found(e: &io::Error) -> bool {
    raw_error_is(e, &[ERROR_FILE_NOT_FOUND, ERROR_PATH_NOT_FOUND])
}

/// Denied by an ACL, or the entry is held open without the needed sharing.
pub fn is_access_denied(e: &io::Error) -> bool {
    raw_error_is(e, &[ERROR_ACCESS_DENIED, ERROR_SHARING_VIOLATION])
}
