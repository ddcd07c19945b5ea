//! Error types for the link operations.
//!
//! Each operation has its own closed error enum whose variants map one to one
//! onto the non-success codes in [`crate::codes`]. Only `Other` carries a
//! message, and that message is for humans: match on the variant.

use std::io;
use std::path::PathBuf;

use crate::codes::{
    CreateJunctionResult, DeletePathResult, IsSymlinkOrJunctionResult, ReadSymlinkOrJunctionResult,
};

/// Error returned by `classify` and `is_symlink_or_junction`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IsSymlinkOrJunctionError {
    #[error("path does not exist")]
    DoesNotExist,
    #[error("{0}")]
    Other(String),
}

impl IsSymlinkOrJunctionError {
    pub fn code(&self) -> IsSymlinkOrJunctionResult {
        match self {
            Self::DoesNotExist => IsSymlinkOrJunctionResult::DoesNotExist,
            Self::Other(_) => IsSymlinkOrJunctionResult::Error,
        }
    }
}

/// Error returned by `create_junction`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreateJunctionError {
    #[error("junction target is too long")]
    TargetNameTooLong,
    #[error("a junction with a different target already exists")]
    AlreadyExistsWithDifferentTarget,
    #[error("path already exists and is not a junction")]
    AlreadyExistsButNotJunction,
    #[error("access is denied")]
    AccessDenied,
    #[error("path disappeared while the junction was being created")]
    Disappeared,
    #[error("{0}")]
    Other(String),
}

impl CreateJunctionError {
    pub fn code(&self) -> CreateJunctionResult {
        match self {
            Self::TargetNameTooLong => CreateJunctionResult::TargetNameTooLong,
            Self::AlreadyExistsWithDifferentTarget => {
                CreateJunctionResult::AlreadyExistsWithDifferentTarget
            }
            Self::AlreadyExistsButNotJunction => CreateJunctionResult::AlreadyExistsButNotJunction,
            Self::AccessDenied => CreateJunctionResult::AccessDenied,
            Self::Disappeared => CreateJunctionResult::Disappeared,
            Self::Other(_) => CreateJunctionResult::Error,
        }
    }

    /// Whether calling again with the same arguments may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Disappeared)
    }
}

/// Error returned by `read_target`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadLinkError {
    #[error("access is denied")]
    AccessDenied,
    #[error("path does not exist")]
    DoesNotExist,
    #[error("path is not a link")]
    NotALink,
    #[error("path is a reparse point of an unsupported kind")]
    UnknownLinkType,
    #[error("{0}")]
    Other(String),
}

impl ReadLinkError {
    pub fn code(&self) -> ReadSymlinkOrJunctionResult {
        match self {
            Self::AccessDenied => ReadSymlinkOrJunctionResult::AccessDenied,
            Self::DoesNotExist => ReadSymlinkOrJunctionResult::DoesNotExist,
            Self::NotALink => ReadSymlinkOrJunctionResult::NotALink,
            Self::UnknownLinkType => ReadSymlinkOrJunctionResult::UnknownLinkType,
            Self::Other(_) => ReadSymlinkOrJunctionResult::Error,
        }
    }
}

/// Error returned by `delete_path`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeletePathError {
    #[error("path does not exist")]
    DoesNotExist,
    #[error("directory is not empty")]
    DirectoryNotEmpty,
    /// Also returned while another process holds the entry open or the entry
    /// is pending deletion.
    #[error("access is denied")]
    AccessDenied,
    #[error("{0}")]
    Other(String),
}

impl DeletePathError {
    pub fn code(&self) -> DeletePathResult {
        match self {
            Self::DoesNotExist => DeletePathResult::DoesNotExist,
            Self::DirectoryNotEmpty => DeletePathResult::DirectoryNotEmpty,
            Self::AccessDenied => DeletePathResult::AccessDenied,
            Self::Other(_) => DeletePathResult::Error,
        }
    }

    /// Whether calling again later may succeed.
    ///
    /// Access denials can come from a handle another process still holds or
    /// from a pending delete, both of which resolve on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AccessDenied)
    }
}

/// Error returned by `expand_short_names`.
#[derive(Debug, thiserror::Error)]
pub enum ExpandShortNamesError {
    #[error("expected an absolute, normalized Windows path: {}", .0.display())]
    NotNormalized(PathBuf),
    #[error("GetLongPathNameW({}): {source}", .path.display())]
    Unresolved {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
