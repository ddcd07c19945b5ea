//! Directory links on Windows, emulated with NTFS junctions.
//!
//! True directory symbolic links usually need a privilege a build tool cannot
//! count on. Junctions do not, so this crate creates junctions wherever a
//! POSIX tool would create a directory symlink, and reads, inspects and
//! deletes junctions and directory symlinks alike.
//!
//! Every operation re-observes the filesystem; nothing is cached between
//! calls. Mutating calls racing on the same path are not serialized here and
//! may report transient outcomes such as
//! [`CreateJunctionError::Disappeared`]; callers needing more must serialize
//! per path themselves.
//!
//! Each operation reports failures through its own closed error enum, which
//! maps onto the stable numeric codes in [`codes`] for callers on the other
//! side of an FFI boundary.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use dirlink::{create_junction, delete_path, is_symlink_or_junction, read_target};
//!
//! create_junction(r"C:\out\bin", r"C:\execroot\bin")?;
//! assert!(is_symlink_or_junction(r"C:\out\bin")?);
//! assert_eq!(read_target(r"C:\out\bin")?.to_str(), Some(r"C:\execroot\bin"));
//! delete_path(r"C:\out\bin")?;
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
#![deny(rust_2018_idioms)]

#[macro_use]
mod utf16;

pub mod codes;
mod error;
mod kind;
pub mod path;

#[cfg(windows)]
mod internals;

#[cfg(all(test, windows))]
mod tests;

pub use crate::codes::{
    CreateJunctionResult, DeletePathResult, IsSymlinkOrJunctionResult, ReadSymlinkOrJunctionResult,
};
pub use crate::error::{
    CreateJunctionError, DeletePathError, ExpandShortNamesError, IsSymlinkOrJunctionError, ReadLinkError,
};
#[cfg(windows)]
pub use crate::internals::MAX_JUNCTION_TARGET_LEN;
pub use crate::kind::{LinkKind, LinkType};

#[cfg(windows)]
use std::path::{Path, PathBuf};

/// Creates a junction at `name` pointing to `target`, or confirms one is
/// already there.
///
/// Both paths must be absolute and normalized (see
/// [`path::is_absolute_normalized`]); a `\\?\` prefix is optional even past
/// `MAX_PATH`. The target does not need to exist. Short names in an existing
/// target are expanded, and a trailing backslash dropped, before it is stored.
///
/// Succeeds when `name` did not exist, when it was an empty directory (which
/// is turned into the junction), and when it already is a junction to the
/// same target, compared case-insensitively. The existing entry is inspected
/// and converted through one handle that nobody else can open meanwhile, so a
/// concurrent change surfaces as a conflict. Existing content is never
/// removed or overwritten: anything else at `name` is reported as
/// [`CreateJunctionError::AlreadyExistsWithDifferentTarget`] or
/// [`CreateJunctionError::AlreadyExistsButNotJunction`].
///
/// N.B. Only works on NTFS.
///
/// # Example
///
/// ```rust
/// use std::fs;
/// # use dirlink::create_junction;
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let tmpdir = tempfile::tempdir()?;
///     let root = fs::canonicalize(tmpdir.path())?;
///     let target = root.join("target");
///     let junction = root.join("junction");
///     # fs::create_dir_all(&target)?;
///     create_junction(&junction, &target)?;
///     // Again, same target: nothing to do.
///     create_junction(&junction, &target)?;
///     Ok(())
/// }
/// ```
#[cfg(windows)]
pub fn create_junction<P, Q>(name: P, target: Q) -> Result<(), CreateJunctionError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    fn inner(name: &Path, target: &Path) -> Result<(), CreateJunctionError> {
        internals::create_junction(&to_wide(name), &to_wide(target))
    }
    inner(name.as_ref(), target.as_ref())
}

/// Gets the target of the junction or symbolic link at `path`.
///
/// A drive-absolute target carries the same prefix as `path`, or none.
/// Volume mount targets have no drive-letter form and always come back as
/// `\\?\Volume{...}\`. Relative symlink targets are returned as stored.
///
/// # Example
///
/// ```rust
/// # use dirlink::read_target;
/// fn main() -> Result<(), dirlink::ReadLinkError> {
///     assert_eq!(read_target(r"C:\Users\Default User")?.to_str(), Some(r"C:\Users\Default"));
///     Ok(())
/// }
/// ```
#[cfg(windows)]
pub fn read_target<P: AsRef<Path>>(path: P) -> Result<PathBuf, ReadLinkError> {
    fn inner(path: &Path) -> Result<PathBuf, ReadLinkError> {
        internals::read_target(&to_wide(path)).map(|target| to_path_buf(&target))
    }
    inner(path.as_ref())
}

/// Deletes the file, junction, directory symlink or empty directory at `path`.
///
/// A link is removed without touching what it points to. Non-empty
/// directories are left alone and reported as
/// [`DeletePathError::DirectoryNotEmpty`]. Read-only files are made writable
/// and deleted. A missing `path` is [`DeletePathError::DoesNotExist`], so
/// callers decide whether "already gone" is fine.
///
/// # Example
///
/// ```rust
/// use std::fs;
/// # use dirlink::{create_junction, delete_path};
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let tmpdir = tempfile::tempdir()?;
///     let root = fs::canonicalize(tmpdir.path())?;
///     let target = root.join("target");
///     let junction = root.join("junction");
///     # fs::create_dir_all(&target)?;
///     create_junction(&junction, &target)?;
///     delete_path(&junction)?;
///     assert!(target.exists());
///     Ok(())
/// }
/// ```
#[cfg(windows)]
pub fn delete_path<P: AsRef<Path>>(path: P) -> Result<(), DeletePathError> {
    fn inner(path: &Path) -> Result<(), DeletePathError> {
        internals::delete_path(&to_wide(path))
    }
    inner(path.as_ref())
}

/// Classifies the entry at `path` without following it.
///
/// An entry deleted while it is being looked at is reported as
/// [`IsSymlinkOrJunctionError::DoesNotExist`], the same as one that was never
/// there.
#[cfg(windows)]
pub fn classify<P: AsRef<Path>>(path: P) -> Result<LinkKind, IsSymlinkOrJunctionError> {
    fn inner(path: &Path) -> Result<LinkKind, IsSymlinkOrJunctionError> {
        internals::classify(&to_wide(path))
    }
    inner(path.as_ref())
}

/// Determines whether `path` is a junction or a directory symlink.
///
/// Other reparse points, such as file symlinks, are not.
///
/// # Example
///
/// ```rust
/// # use dirlink::is_symlink_or_junction;
/// fn main() -> Result<(), dirlink::IsSymlinkOrJunctionError> {
///     assert!(is_symlink_or_junction(r"C:\Users\Default User")?);
///     Ok(())
/// }
/// ```
#[cfg(windows)]
pub fn is_symlink_or_junction<P: AsRef<Path>>(path: P) -> Result<bool, IsSymlinkOrJunctionError> {
    classify(path).map(|kind| kind.is_managed_link())
}

/// Replaces 8dot3 short names in `path` with their long forms.
///
/// The result has a prefix iff `path` has one. Every segment up to the last
/// short name must exist; a path without any `~` is returned as is.
#[cfg(windows)]
pub fn expand_short_names<P: AsRef<Path>>(path: P) -> Result<PathBuf, ExpandShortNamesError> {
    fn inner(path: &Path) -> Result<PathBuf, ExpandShortNamesError> {
        internals::expand_short_names(&to_wide(path)).map(|long| to_path_buf(&long))
    }
    inner(path.as_ref())
}

#[cfg(windows)]
fn to_wide(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().collect()
}

#[cfg(windows)]
fn to_path_buf(wide: &[u16]) -> PathBuf {
    use std::{ffi::OsString, os::windows::ffi::OsStringExt};
    PathBuf::from(OsString::from_wide(wide))
}
