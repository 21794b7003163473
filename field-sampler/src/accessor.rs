use core::marker::PhantomData;

use num::traits::AsPrimitive;

/// Strategy that performs the actual load of one sample from a voxel buffer.
///
/// The sampler only computes linear indices; how the element at that index
/// is read (plain pointer load, texture cache, on-the-fly conversion) is up
/// to the accessor. Closures `FnMut(usize, *const V) -> S` are accessors too.
pub trait Accessor<V, S> {
    /// Loads the sample at `index`.
    ///
    /// # Safety
    ///
    /// `index` must address an element of the allocation behind `data`, and
    /// that allocation must be readable from the executing context.
    unsafe fn fetch(&mut self, index: usize, data: *const V) -> S;
}

impl<V, S, F> Accessor<V, S> for F
where
    F: FnMut(usize, *const V) -> S,
{
    #[inline]
    unsafe fn fetch(&mut self, index: usize, data: *const V) -> S {
        self(index, data)
    }
}

/// Reads the stored value as is.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectAccessor;

impl<V: Copy> Accessor<V, V> for DirectAccessor {
    #[inline]
    unsafe fn fetch(&mut self, index: usize, data: *const V) -> V {
        data.add(index).read()
    }
}

/// Reads the stored value and converts it with an `as` cast, e.g. to widen
/// `u8` voxels into `f32` samples.
#[derive(Debug)]
pub struct ConvertingAccessor<S> {
    _sample: PhantomData<fn() -> S>,
}

impl<S> ConvertingAccessor<S> {
    pub const fn new() -> Self {
        Self {
            _sample: PhantomData,
        }
    }
}

impl<S> Default for ConvertingAccessor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for ConvertingAccessor<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for ConvertingAccessor<S> {}

impl<V, S> Accessor<V, S> for ConvertingAccessor<S>
where
    V: AsPrimitive<S>,
    S: Copy + 'static,
{
    #[inline]
    unsafe fn fetch(&mut self, index: usize, data: *const V) -> S {
        data.add(index).read().as_()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_reads_element() {
        let data = [1.5f32, 2.5, 3.5];
        let mut ac = DirectAccessor;
        let value: f32 = unsafe { ac.fetch(2, data.as_ptr()) };
        assert_eq!(value, 3.5);
    }

    #[test]
    fn converting_widens_bytes() {
        let data = [0u8, 17, 255];
        let mut ac = ConvertingAccessor::<f32>::new();
        let value = unsafe { Accessor::<u8, f32>::fetch(&mut ac, 2, data.as_ptr()) };
        assert_eq!(value, 255.0);
    }

    #[test]
    fn converting_f32_to_f64_is_exact() {
        let data = [0.1f32];
        let mut ac = ConvertingAccessor::<f64>::new();
        let value = unsafe { Accessor::<f32, f64>::fetch(&mut ac, 0, data.as_ptr()) };
        assert_eq!(value, f64::from(0.1f32));
    }

    #[test]
    fn closures_are_accessors() {
        let data = [10i32, 20, 30];
        let mut calls = 0;
        let mut ac = |index: usize, ptr: *const i32| {
            calls += 1;
            unsafe { ptr.add(index).read() * 2 }
        };
        let value: i32 = unsafe { ac.fetch(1, data.as_ptr()) };
        assert_eq!(value, 40);
        assert_eq!(calls, 1);
    }
}
