/// The kind of link a managed link is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    /// An NTFS mount point reparse point. The only kind this crate creates.
    Junction,
    /// A symbolic link reparse point on a directory.
    DirectorySymlink,
}

/// What an existing filesystem entry is, observed without following links.
///
/// Absence is not a kind: operations report it through their
/// `DoesNotExist` error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// A regular file, without reparse data.
    File,
    /// A directory, without reparse data.
    Directory,
    /// A junction or a directory symlink.
    ManagedLink(LinkType),
    /// Reparse data this crate does not manage: file symlinks, cloud files,
    /// deduplicated files and the like. `tag` is the raw reparse tag.
    OtherReparsePoint { tag: u32 },
}

impl LinkKind {
    pub fn is_managed_link(&self) -> bool {
        matches!(self, LinkKind::ManagedLink(_))
    }
}
