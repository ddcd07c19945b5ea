//! Numeric result codes shared with callers on the other side of an FFI
//! boundary.
//!
//! The values are part of the contract and must never be renumbered. All
//! four enums are declared through the `result_codes!` macro below, which is the one
//! place the numbers live; [`schema`] lists them so counterpart definitions
//! can be generated from this crate instead of kept in sync by hand.

use crate::error::{CreateJunctionError, DeletePathError, IsSymlinkOrJunctionError, ReadLinkError};

macro_rules! result_codes {
    ($(
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+
        }
    )+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            #[repr(i32)]
            pub enum $name {
                $($(#[$vmeta])* $variant = $value,)+
            }

            impl $name {
                /// Every code, in declaration order.
                pub const ALL: &'static [$name] = &[$($name::$variant,)+];

                pub const fn code(self) -> i32 {
                    self as i32
                }

                pub const fn name(self) -> &'static str {
                    match self {
                        $($name::$variant => stringify!($variant),)+
                    }
                }

                pub const fn from_code(code: i32) -> Option<Self> {
                    match code {
                        $($value => Some($name::$variant),)+
                        _ => None,
                    }
                }
            }

            impl From<$name> for i32 {
                fn from(code: $name) -> i32 {
                    code.code()
                }
            }

            impl TryFrom<i32> for $name {
                type Error = i32;

                fn try_from(code: i32) -> Result<Self, i32> {
                    Self::from_code(code).ok_or(code)
                }
            }
        )+

        /// Yields `(enum, variant, value)` for every code of every enum.
        pub fn schema() -> impl Iterator<Item = (&'static str, &'static str, i32)> {
            std::iter::empty()
                $(.chain($name::ALL.iter().map(|c| (stringify!($name), c.name(), c.code()))))+
        }
    };
}

result_codes! {
    /// Outcome of `is_symlink_or_junction`.
    pub enum IsSymlinkOrJunctionResult {
        Success = 0,
        Error = 1,
        DoesNotExist = 2,
    }

    /// Outcome of `delete_path`.
    pub enum DeletePathResult {
        Success = 0,
        Error = 1,
        DoesNotExist = 2,
        DirectoryNotEmpty = 3,
        AccessDenied = 4,
    }

    /// Outcome of `create_junction`.
    pub enum CreateJunctionResult {
        Success = 0,
        Error = 1,
        TargetNameTooLong = 2,
        AlreadyExistsWithDifferentTarget = 3,
        AlreadyExistsButNotJunction = 4,
        AccessDenied = 5,
        Disappeared = 6,
    }

    /// Outcome of `read_target`.
    pub enum ReadSymlinkOrJunctionResult {
        Success = 0,
        Error = 1,
        AccessDenied = 2,
        DoesNotExist = 3,
        NotALink = 4,
        UnknownLinkType = 5,
    }
}

impl IsSymlinkOrJunctionResult {
    pub fn of<T>(result: &Result<T, IsSymlinkOrJunctionError>) -> Self {
        result.as_ref().map_or_else(IsSymlinkOrJunctionError::code, |_| Self::Success)
    }
}

impl DeletePathResult {
    pub fn of<T>(result: &Result<T, DeletePathError>) -> Self {
        result.as_ref().map_or_else(DeletePathError::code, |_| Self::Success)
    }
}

impl CreateJunctionResult {
    pub fn of<T>(result: &Result<T, CreateJunctionError>) -> Self {
        result.as_ref().map_or_else(CreateJunctionError::code, |_| Self::Success)
    }
}

impl ReadSymlinkOrJunctionResult {
    pub fn of<T>(result: &Result<T, ReadLinkError>) -> Self {
        result.as_ref().map_or_else(ReadLinkError::code, |_| Self::Success)
    }
}
