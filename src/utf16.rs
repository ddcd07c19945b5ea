/// Converts an ASCII byte string into a fixed-size UTF-16 array at compile time.
///
/// Used for the path prefixes and device names the normalizer matches against,
/// so comparisons happen on code units without re-encoding at runtime.
macro_rules! utf16s {
    ($src:expr) => {{
        const SRC: &[u8] = $src;
        const N: usize = SRC.len();
        let mut i = 0;
        let mut dst = [0u16; N];
        while i < N {
            assert!(SRC[i].is_ascii());
            dst[i] = SRC[i] as u16;
            i += 1;
        }
        dst
    }};
}
