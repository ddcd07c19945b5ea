use std::alloc::{alloc_zeroed, handle_alloc_error, Layout};
use std::mem::align_of;

use super::c::{REPARSE_DATA_BUFFER, MAXIMUM_REPARSE_DATA_BUFFER_SIZE, SYMLINK_REPARSE_DATA_BUFFER};

#[repr(C, align(4))]
struct Raw([u8; MAXIMUM_REPARSE_DATA_BUFFER_SIZE as usize]);

/// A heap buffer large enough for any reparse point, aligned for the
/// reparse data structs it is reinterpreted as.
pub struct BytesAsReparseDataBuffer {
    value: Box<Raw>,
}

const _: () = {
    let a = align_of::<Raw>();
    assert!(a % align_of::<REPARSE_DATA_BUFFER>() == 0);
    assert!(a % align_of::<SYMLINK_REPARSE_DATA_BUFFER>() == 0);
};

impl BytesAsReparseDataBuffer {
    pub fn new() -> Self {
        const LAYOUT: Layout = Layout::new::<Raw>();
        // Zeroed so that every byte handed out is initialized, whatever the
        // kernel wrote.
        let boxed = unsafe {
            let ptr = alloc_zeroed(LAYOUT).cast::<Raw>();
            if ptr.is_null() {
                handle_alloc_error(LAYOUT);
            }
            Box::from_raw(ptr)
        };
        Self { value: boxed }
    }

    pub fn as_mut_ptr(&mut self) -> *mut REPARSE_DATA_BUFFER {
        self.value.0.as_mut_ptr().cast::<REPARSE_DATA_BUFFER>()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.value.0[..]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.value.0[..]
    }

    pub fn as_reparse_data(&self) -> &REPARSE_DATA_BUFFER {
        unsafe { &*self.value.0.as_ptr().cast::<REPARSE_DATA_BUFFER>() }
    }

    /// Views the buffer through the symlink flavour of the reparse data union.
    /// Only meaningful when the tag is `IO_REPARSE_TAG_SYMLINK`.
    pub fn as_symlink_data(&self) -> &SYMLINK_REPARSE_DATA_BUFFER {
        unsafe { &*self.value.0.as_ptr().cast::<SYMLINK_REPARSE_DATA_BUFFER>() }
    }
}
