mod c;
mod cast;
mod helpers;

use self::c::*;
use self::cast::BytesAsReparseDataBuffer;
use self::helpers::{is_access_denied, is_not_found, raw_error_is, to_path, SHARE_ALL};

use crate::error::{
    CreateJunctionError, DeletePathError, ExpandShortNamesError, IsSymlinkOrJunctionError, ReadLinkError,
};
use crate::kind::{LinkKind, LinkType};
use crate::path;

use scopeguard::ScopeGuard;
use std::fs::{self, File};
use std::io;
use std::os::windows::fs::MetadataExt;
use std::path::Path;

const WCHAR_SIZE: u16 = std::mem::size_of::<u16>() as _;
const UNICODE_NULL_SIZE: u16 = WCHAR_SIZE;
const NT_PREFIX_LEN: usize = path::NT_PREFIX.len();
const MOUNT_POINT_PATH_BUFFER_START: usize =
    (REPARSE_DATA_BUFFER_HEADER_SIZE + MOUNT_POINT_REPARSE_BUFFER_HEADER_SIZE) as usize;
const SYMLINK_PATH_BUFFER_START: usize =
    (REPARSE_DATA_BUFFER_HEADER_SIZE + SYMBOLIC_LINK_REPARSE_BUFFER_HEADER_SIZE) as usize;

/// Longest junction target, in UTF-16 units.
///
/// The reparse buffer holds `\??\` + target + NUL as substitute name and
/// target + NUL as print name behind the two headers.
pub const MAX_JUNCTION_TARGET_LEN: usize = ((MAXIMUM_REPARSE_DATA_BUFFER_SIZE as usize
    - MOUNT_POINT_PATH_BUFFER_START)
    / WCHAR_SIZE as usize
    - NT_PREFIX_LEN
    - 2)
    / 2;

/// Reparse data of an entry, as far as this crate cares.
enum Reparse {
    MountPoint { substitute: Vec<u16> },
    Symlink { substitute: Vec<u16> },
    Other { tag: u32 },
}

impl Reparse {
    fn tag(&self) -> u32 {
        match self {
            Reparse::MountPoint { .. } => IO_REPARSE_TAG_MOUNT_POINT,
            Reparse::Symlink { .. } => IO_REPARSE_TAG_SYMLINK,
            Reparse::Other { tag } => *tag,
        }
    }
}

fn read_reparse(handle: &File) -> io::Result<Reparse> {
    let mut data = BytesAsReparseDataBuffer::new();
    let len = helpers::get_reparse_data_point(handle, &mut data)?;
    let bytes = &data.as_bytes()[..len];
    match data.as_reparse_data().ReparseTag {
        IO_REPARSE_TAG_MOUNT_POINT => {
            let rb = &data.as_reparse_data().ReparseBuffer;
            let substitute = name_at(
                bytes,
                MOUNT_POINT_PATH_BUFFER_START,
                rb.SubstituteNameOffset,
                rb.SubstituteNameLength,
            )?;
            Ok(Reparse::MountPoint { substitute })
        }
        IO_REPARSE_TAG_SYMLINK => {
            let rb = &data.as_symlink_data().ReparseBuffer;
            let substitute =
                name_at(bytes, SYMLINK_PATH_BUFFER_START, rb.SubstituteNameOffset, rb.SubstituteNameLength)?;
            // Relative targets are kept as stored.
            if rb.Flags & SYMLINK_FLAG_RELATIVE != 0 {
                log::trace!("relative symlink target {}", to_path(&substitute).display());
            }
            Ok(Reparse::Symlink { substitute })
        }
        tag => Ok(Reparse::Other { tag }),
    }
}

// `offset` and `len` are in bytes, relative to the start of the path buffer.
fn name_at(bytes: &[u8], path_buffer_start: usize, offset: u16, len: u16) -> io::Result<Vec<u16>> {
    let start = path_buffer_start + usize::from(offset);
    let end = start + usize::from(len);
    match bytes.get(start..end) {
        Some(name) if name.len() % 2 == 0 => Ok(name
            .chunks_exact(2)
            .map(|unit| u16::from_ne_bytes([unit[0], unit[1]]))
            .collect()),
        _ => Err(io::Error::new(io::ErrorKind::InvalidData, "malformed reparse data")),
    }
}

/// Writes mount point reparse data for `target` into `data` and returns the
/// number of bytes to hand to `FSCTL_SET_REPARSE_POINT`.
///
/// `target` must not be longer than [`MAX_JUNCTION_TARGET_LEN`].
fn fill_mount_point(data: &mut BytesAsReparseDataBuffer, target: &[u16]) -> u32 {
    // "\??\" + target, len without `UNICODE_NULL` at the end
    let substitute_len = (NT_PREFIX_LEN + target.len()) as u16 * WCHAR_SIZE;
    let print_len = target.len() as u16 * WCHAR_SIZE;
    let reparse_data_len = MOUNT_POINT_REPARSE_BUFFER_HEADER_SIZE
        + substitute_len
        + UNICODE_NULL_SIZE
        + print_len
        + UNICODE_NULL_SIZE;
    unsafe {
        let rdb = &mut *data.as_mut_ptr();
        // Set the type of reparse point we are creating
        rdb.ReparseTag = IO_REPARSE_TAG_MOUNT_POINT;
        rdb.ReparseDataLength = reparse_data_len;
        rdb.Reserved = 0;

        // The junction's target
        rdb.ReparseBuffer.SubstituteNameOffset = 0;
        rdb.ReparseBuffer.SubstituteNameLength = substitute_len;

        // What `dir` and Explorer display
        rdb.ReparseBuffer.PrintNameOffset = substitute_len + UNICODE_NULL_SIZE;
        rdb.ReparseBuffer.PrintNameLength = print_len;
    }

    let nul = std::iter::once(&0u16);
    let units = path::NT_PREFIX.iter().chain(target).chain(nul.clone()).chain(target).chain(nul);
    let path_buffer = &mut data.as_bytes_mut()[MOUNT_POINT_PATH_BUFFER_START..];
    for (dst, unit) in path_buffer.chunks_exact_mut(2).zip(units) {
        dst.copy_from_slice(&unit.to_ne_bytes());
    }

    u32::from(REPARSE_DATA_BUFFER_HEADER_SIZE + reparse_data_len)
}

/// Link operations need a real absolute path, not the null device.
fn is_link_path(path: &[u16]) -> bool {
    path::is_absolute_normalized(path) && !path::is_dev_null(path)
}

fn not_normalized(path: &[u16]) -> String {
    format!("expected an absolute, normalized Windows path: {}", to_path(path).display())
}

fn message(call: &str, path: &[u16], e: &io::Error) -> String {
    format!("{call}({}): {e}", to_path(path).display())
}

fn plain_kind(attrs: u32) -> LinkKind {
    if attrs & FILE_ATTRIBUTE_DIRECTORY != 0 {
        LinkKind::Directory
    } else {
        LinkKind::File
    }
}

pub fn classify(path: &[u16]) -> Result<LinkKind, IsSymlinkOrJunctionError> {
    use IsSymlinkOrJunctionError::*;

    if !is_link_path(path) {
        return Err(Other(not_normalized(path)));
    }
    log::trace!("classify {}", to_path(path).display());
    let prefixed = path::add_prefix_maybe(path);
    let attrs = match helpers::file_attributes(&prefixed) {
        Ok(attrs) => attrs,
        Err(e) if is_not_found(&e) => return Err(DoesNotExist),
        Err(e) => return Err(Other(message("GetFileAttributesW", path, &e))),
    };
    if attrs & FILE_ATTRIBUTE_REPARSE_POINT == 0 {
        return Ok(plain_kind(attrs));
    }

    let handle = match helpers::open_reparse_point(&to_path(&prefixed), FILE_READ_ATTRIBUTES, SHARE_ALL) {
        Ok(handle) => handle,
        // Deleted after the attribute probe.
        Err(e) if is_not_found(&e) => return Err(DoesNotExist),
        Err(e) => return Err(Other(message("CreateFileW", path, &e))),
    };
    // Attributes again, from the handle, in case the entry was replaced.
    let attrs = handle
        .metadata()
        .map_err(|e| Other(message("GetFileInformationByHandle", path, &e)))?
        .file_attributes();
    if attrs & FILE_ATTRIBUTE_REPARSE_POINT == 0 {
        return Ok(plain_kind(attrs));
    }
    let is_dir = attrs & FILE_ATTRIBUTE_DIRECTORY != 0;
    match read_reparse(&handle) {
        Ok(Reparse::MountPoint { .. }) if is_dir => Ok(LinkKind::ManagedLink(LinkType::Junction)),
        Ok(Reparse::Symlink { .. }) if is_dir => Ok(LinkKind::ManagedLink(LinkType::DirectorySymlink)),
        Ok(reparse) => Ok(LinkKind::OtherReparsePoint { tag: reparse.tag() }),
        Err(e) => Err(Other(message("DeviceIoControl", path, &e))),
    }
}

pub fn read_target(path: &[u16]) -> Result<Vec<u16>, ReadLinkError> {
    use ReadLinkError::*;

    if !is_link_path(path) {
        return Err(Other(not_normalized(path)));
    }
    log::trace!("read target of {}", to_path(path).display());
    let prefixed = path::add_prefix_maybe(path);
    let handle = helpers::open_reparse_point(&to_path(&prefixed), FILE_READ_ATTRIBUTES, SHARE_ALL)
        .map_err(|e| {
            if is_access_denied(&e) {
                AccessDenied
            } else if is_not_found(&e) {
                DoesNotExist
            } else {
                Other(message("CreateFileW", path, &e))
            }
        })?;
    let substitute = match read_reparse(&handle) {
        Ok(Reparse::MountPoint { substitute }) | Ok(Reparse::Symlink { substitute }) => substitute,
        Ok(Reparse::Other { tag }) => {
            log::trace!("{} has reparse tag {tag:#x}", to_path(path).display());
            return Err(UnknownLinkType);
        }
        Err(e) if raw_error_is(&e, &[ERROR_NOT_A_REPARSE_POINT]) => return Err(NotALink),
        Err(e) => return Err(Other(message("DeviceIoControl", path, &e))),
    };

    Ok(path::target_for_link(path, &substitute))
}

/// What the entry at a junction's name holds, when that is not a conflict.
enum Existing {
    SameJunction,
    Directory,
}

pub fn create_junction(name: &[u16], target: &[u16]) -> Result<(), CreateJunctionError> {
    use CreateJunctionError::*;

    if !is_link_path(name) {
        return Err(Other(not_normalized(name)));
    }
    if !is_link_path(target) {
        return Err(Other(not_normalized(target)));
    }
    let target = junction_target(target);
    // Check if `target` may lead to a buffer overflow.
    if target.len() > MAX_JUNCTION_TARGET_LEN {
        return Err(TargetNameTooLong);
    }
    let prefixed = path::add_prefix_maybe(name);
    let name_path = to_path(&prefixed);
    log::trace!("create junction {} -> {}", to_path(name).display(), to_path(&target).display());

    // Junctions are directories, so start with one.
    let created = match fs::create_dir(&name_path) {
        Ok(()) => true,
        Err(e) if raw_error_is(&e, &[ERROR_ALREADY_EXISTS]) => false,
        Err(e) if is_access_denied(&e) => return Err(AccessDenied),
        Err(e) => return Err(Other(message("CreateDirectoryW", name, &e))),
    };

    // Inspect and write through one handle nobody else can open meanwhile.
    let handle = match helpers::open_reparse_point(&name_path, GENERIC_WRITE | FILE_READ_ATTRIBUTES, 0) {
        Ok(handle) => handle,
        Err(e) if is_access_denied(&e) && !created => {
            return inspect_read_only(name, &name_path, &target);
        }
        Err(e) => {
            if created {
                let _ = fs::remove_dir(&name_path);
            }
            return Err(creation_error("CreateFileW", name, &e));
        }
    };
    match inspect_existing(name, &handle, &target)? {
        Existing::SameJunction => {
            log::debug!("{} already points to {}", to_path(name).display(), to_path(&target).display());
            Ok(())
        }
        Existing::Directory => {
            if !created {
                log::debug!("converting directory {} into a junction", to_path(name).display());
            }
            write_junction(name, &name_path, handle, &target, created)
        }
    }
}

/// Strips the prefix and a trailing backslash, and expands short names where
/// possible. A target that does not exist yet cannot be expanded and is used
/// as given.
fn junction_target(target: &[u16]) -> Vec<u16> {
    let target = path::remove_prefix_maybe(path::trim_trailing_separator(target));
    expand_short_names(target).unwrap_or_else(|e| {
        log::debug!("using junction target as given: {e}");
        target.to_vec()
    })
}

fn creation_error(call: &str, name: &[u16], e: &io::Error) -> CreateJunctionError {
    if is_access_denied(e) {
        CreateJunctionError::AccessDenied
    } else if is_not_found(e) {
        CreateJunctionError::Disappeared
    } else {
        CreateJunctionError::Other(message(call, name, e))
    }
}

fn inspect_existing(name: &[u16], handle: &File, target: &[u16]) -> Result<Existing, CreateJunctionError> {
    use CreateJunctionError::*;

    let attrs = handle
        .metadata()
        .map_err(|e| creation_error("GetFileInformationByHandle", name, &e))?
        .file_attributes();
    if attrs & FILE_ATTRIBUTE_DIRECTORY == 0 {
        return Err(AlreadyExistsButNotJunction);
    }
    if attrs & FILE_ATTRIBUTE_REPARSE_POINT == 0 {
        return Ok(Existing::Directory);
    }
    match read_reparse(handle) {
        Ok(Reparse::MountPoint { substitute }) => {
            if path::same_path(path::from_nt_path(&substitute), target) {
                Ok(Existing::SameJunction)
            } else {
                Err(AlreadyExistsWithDifferentTarget)
            }
        }
        Ok(_) => Err(AlreadyExistsButNotJunction),
        Err(e) => Err(creation_error("DeviceIoControl", name, &e)),
    }
}

/// The entry cannot be opened for writing. Still tell a conflict or an
/// existing junction apart from a plain permission failure.
fn inspect_read_only(name: &[u16], name_path: &Path, target: &[u16]) -> Result<(), CreateJunctionError> {
    let handle = helpers::open_reparse_point(name_path, FILE_READ_ATTRIBUTES, SHARE_ALL)
        .map_err(|e| creation_error("CreateFileW", name, &e))?;
    match inspect_existing(name, &handle, target)? {
        Existing::SameJunction => Ok(()),
        Existing::Directory => Err(CreateJunctionError::AccessDenied),
    }
}

fn write_junction(
    name: &[u16],
    name_path: &Path,
    handle: File,
    target: &[u16],
    created: bool,
) -> Result<(), CreateJunctionError> {
    // Leave nothing behind if this call made the directory and then failed.
    let handle = scopeguard::guard(handle, |handle| {
        drop(handle);
        if created {
            let _ = fs::remove_dir(name_path);
        }
    });

    let mut data = BytesAsReparseDataBuffer::new();
    let len = fill_mount_point(&mut data, target);
    helpers::set_reparse_point(&handle, &mut data, len).map_err(|e| {
        // Only empty directories become junctions.
        if raw_error_is(&e, &[ERROR_DIR_NOT_EMPTY]) {
            CreateJunctionError::AlreadyExistsButNotJunction
        } else {
            creation_error("DeviceIoControl", name, &e)
        }
    })?;
    drop(ScopeGuard::into_inner(handle));
    Ok(())
}

pub fn delete_path(path: &[u16]) -> Result<(), DeletePathError> {
    use DeletePathError::*;

    if !is_link_path(path) {
        return Err(Other(not_normalized(path)));
    }
    log::trace!("delete {}", to_path(path).display());
    let prefixed = path::add_prefix_maybe(path);
    let err = match helpers::delete_file(&prefixed) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    if raw_error_is(&err, &[ERROR_SHARING_VIOLATION]) {
        // In use by some process.
        return Err(AccessDenied);
    }
    if is_not_found(&err) {
        return Err(DoesNotExist);
    }
    if !raw_error_is(&err, &[ERROR_ACCESS_DENIED]) {
        return Err(Other(message("DeleteFileW", path, &err)));
    }

    // Access denied: a directory, a link to one, a read-only file or a
    // pending delete.
    let attrs = match helpers::file_attributes(&prefixed) {
        Ok(attrs) => attrs,
        Err(e) if is_not_found(&e) => return Err(DoesNotExist),
        Err(e) if is_access_denied(&e) => return Err(AccessDenied),
        Err(e) => return Err(Other(message("GetFileAttributesW", path, &e))),
    };

    if attrs & FILE_ATTRIBUTE_DIRECTORY != 0 {
        // For junctions and directory symlinks this removes the link only.
        return helpers::remove_directory(&prefixed).map_err(|e| {
            if raw_error_is(&e, &[ERROR_DIR_NOT_EMPTY]) {
                DirectoryNotEmpty
            } else {
                removal_error("RemoveDirectoryW", path, &e)
            }
        });
    }
    if attrs & FILE_ATTRIBUTE_READONLY == 0 {
        // A writable file that cannot be deleted is pending deletion.
        return Err(AccessDenied);
    }

    log::debug!("clearing read-only attribute of {}", to_path(path).display());
    helpers::set_file_attributes(&prefixed, attrs & !FILE_ATTRIBUTE_READONLY)
        .map_err(|e| removal_error("SetFileAttributesW", path, &e))?;
    helpers::delete_file(&prefixed).map_err(|e| removal_error("DeleteFileW", path, &e))
}

fn removal_error(call: &str, path: &[u16], e: &io::Error) -> DeletePathError {
    if is_not_found(e) {
        DeletePathError::DoesNotExist
    } else if is_access_denied(e) {
        DeletePathError::AccessDenied
    } else {
        DeletePathError::Other(message(call, path, e))
    }
}

pub fn expand_short_names(path: &[u16]) -> Result<Vec<u16>, ExpandShortNamesError> {
    if !path::is_absolute_normalized(path) {
        return Err(ExpandShortNamesError::NotNormalized(to_path(path)));
    }
    if path::is_dev_null(path) || !path::may_contain_short_names(path) {
        return Ok(path.to_vec());
    }
    log::trace!("expand short names in {}", to_path(path).display());
    let bare = path::remove_prefix_maybe(path);
    let long = helpers::get_long_path(&path::add_prefix_maybe(bare))
        .map_err(|source| ExpandShortNamesError::Unresolved { path: to_path(path), source })?;
    // Keep whatever prefix the input had, and only that.
    Ok([path::prefix_of(path), path::remove_prefix_maybe(&long)].concat())
}
