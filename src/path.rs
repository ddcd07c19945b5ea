//! String-level transforms on Windows paths.
//!
//! Everything here works on UTF-16 code units and never touches the
//! filesystem, so it behaves the same on every host. Paths handed to the OS
//! operations of this crate are expected to satisfy [`is_absolute_normalized`].

use std::borrow::Cow;

/// Long-path prefix understood by the Win32 file APIs.
pub const LONG_PATH_PREFIX: [u16; 4] = utf16s!(br"\\?\");
/// Win32 device namespace prefix.
pub const DEVICE_PREFIX: [u16; 4] = utf16s!(br"\\.\");
/// This prefix indicates to NTFS that the path is to be treated as a non-interpreted
/// path in the virtual file system. Junction substitute names carry it.
pub const NT_PREFIX: [u16; 4] = utf16s!(br"\??\");

const PREFIX_LEN: usize = 4;
const DEV_NULL: [u16; 3] = utf16s!(b"NUL");
const BACKSLASH: u16 = b'\\' as u16;
const SLASH: u16 = b'/' as u16;
const COLON: u16 = b':' as u16;
const DOT: u16 = b'.' as u16;
const TILDE: u16 = b'~' as u16;

/// Returns true iff `path` starts with `\\?\`, `\\.\` or `\??\`.
pub fn has_prefix(path: &[u16]) -> bool {
    path.len() >= PREFIX_LEN
        && (path.starts_with(&LONG_PATH_PREFIX)
            || path.starts_with(&DEVICE_PREFIX)
            || path.starts_with(&NT_PREFIX))
}

/// Returns true iff `path` is exactly the null device name, in any letter case.
///
/// `nul`, `Nul` and `NUL` match; `NULL` or `NUL\x` do not.
pub fn is_dev_null(path: &[u16]) -> bool {
    path.len() == DEV_NULL.len() && eq_ignore_ascii_case(path, &DEV_NULL)
}

/// Prepends `\\?\` unless `path` is empty, is the null device or already
/// carries one of the recognized prefixes.
pub fn add_prefix_maybe(path: &[u16]) -> Cow<'_, [u16]> {
    if path.is_empty() || is_dev_null(path) || has_prefix(path) {
        Cow::Borrowed(path)
    } else {
        let mut prefixed = Vec::with_capacity(PREFIX_LEN + path.len());
        prefixed.extend_from_slice(&LONG_PATH_PREFIX);
        prefixed.extend_from_slice(path);
        Cow::Owned(prefixed)
    }
}

/// Strips a recognized prefix, if any.
pub fn remove_prefix_maybe(path: &[u16]) -> &[u16] {
    if has_prefix(path) {
        &path[PREFIX_LEN..]
    } else {
        path
    }
}

/// The recognized prefix `path` starts with, or an empty slice.
pub fn prefix_of(path: &[u16]) -> &[u16] {
    &path[..path.len() - remove_prefix_maybe(path).len()]
}

/// Drops the one trailing backslash [`is_absolute_normalized`] tolerates.
/// Drive roots such as `C:\` keep theirs.
pub fn trim_trailing_separator(path: &[u16]) -> &[u16] {
    let bare = remove_prefix_maybe(path);
    match path.strip_suffix(&[BACKSLASH]) {
        Some(trimmed) if bare.len() > 3 => trimmed,
        _ => path,
    }
}

/// Returns true iff `path` is an absolute Windows path in normal form.
///
/// Accepted: an optional recognized prefix followed by `X:\` and zero or more
/// backslash separated segments, none of them empty, `.` or `..`. A single
/// trailing backslash is tolerated. The null device is accepted as well, as
/// callers use it as a redirection target.
pub fn is_absolute_normalized(path: &[u16]) -> bool {
    if path.is_empty() {
        return false;
    }
    if is_dev_null(path) {
        return true;
    }
    if path.contains(&SLASH) {
        return false;
    }
    let path = remove_prefix_maybe(path);
    if !has_drive_root(path) {
        return false;
    }
    let rest = &path[3..];
    let rest = rest.strip_suffix(&[BACKSLASH]).unwrap_or(rest);
    if rest.is_empty() {
        return path.len() == 3;
    }
    rest.split(|&c| c == BACKSLASH)
        .all(|segment| !segment.is_empty() && segment != [DOT] && segment != [DOT, DOT])
}

/// Returns true if some segment of `path` may be an 8dot3 alias.
///
/// Short names are generated with a `~N` tail, so a path without `~` has
/// nothing to expand.
pub fn may_contain_short_names(path: &[u16]) -> bool {
    path.contains(&TILDE)
}

/// Turns a reparse point substitute name into a Win32 path.
///
/// `\??\C:\foo` becomes `C:\foo`. NT paths that do not name a drive, such as
/// `\??\Volume{...}\`, and relative symlink targets are returned as stored.
pub fn from_nt_path(substitute: &[u16]) -> &[u16] {
    match substitute.strip_prefix(&NT_PREFIX) {
        Some(rest) if has_drive_root(rest) => rest,
        _ => substitute,
    }
}

/// Renders a reparse point substitute name as the target of a link that was
/// looked up through `link`.
///
/// A drive-absolute target takes over the prefix of `link`, if any. A volume
/// target such as `\??\Volume{...}\` has no drive-letter form and always
/// comes back as `\\?\Volume{...}\`. Relative targets are returned as stored.
pub fn target_for_link(link: &[u16], substitute: &[u16]) -> Vec<u16> {
    let target = from_nt_path(substitute);
    if let Some(volume) = target.strip_prefix(&NT_PREFIX) {
        [&LONG_PATH_PREFIX[..], volume].concat()
    } else if is_absolute_normalized(target) {
        [prefix_of(link), target].concat()
    } else {
        target.to_vec()
    }
}

/// Compares two paths the way NTFS resolves them by default: ignoring
/// prefixes, letter case and a trailing backslash.
pub fn same_path(a: &[u16], b: &[u16]) -> bool {
    let a = remove_prefix_maybe(trim_trailing_separator(a));
    let b = remove_prefix_maybe(trim_trailing_separator(b));
    let mut a = char::decode_utf16(a.iter().copied()).flat_map(fold_case);
    let mut b = char::decode_utf16(b.iter().copied()).flat_map(fold_case);
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (x, y) if x == y => continue,
            _ => return false,
        }
    }
}

fn fold_case(c: Result<char, std::char::DecodeUtf16Error>) -> FoldCase {
    match c {
        Ok(c) => FoldCase::Char(c.to_lowercase()),
        Err(e) => FoldCase::Unpaired(Some(e.unpaired_surrogate())),
    }
}

// Unpaired surrogates only compare equal to themselves.
enum FoldCase {
    Char(std::char::ToLowercase),
    Unpaired(Option<u16>),
}

impl Iterator for FoldCase {
    type Item = Result<char, u16>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            FoldCase::Char(lower) => lower.next().map(Ok),
            FoldCase::Unpaired(unit) => unit.take().map(Err),
        }
    }
}

fn has_drive_root(path: &[u16]) -> bool {
    matches!(path, [drive, COLON, BACKSLASH, ..] if is_ascii_alpha(*drive))
}

fn is_ascii_alpha(c: u16) -> bool {
    u8::try_from(c).map_or(false, |c| c.is_ascii_alphabetic())
}

fn eq_ignore_ascii_case(a: &[u16], b: &[u16]) -> bool {
    let lower = |c: u16| u8::try_from(c).map_or(c, |c| u16::from(c.to_ascii_lowercase()));
    a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| lower(x) == lower(y))
}
