/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// Round `value` up to the next multiple of 4.
#[inline]
pub const fn align4(value: usize) -> usize {
    align_up(value, 4)
}
