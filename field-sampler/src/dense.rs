use core::marker::PhantomData;
use core::mem::size_of;

use crate::accessor::Accessor;
use crate::geometry::{FieldGeometry, GeometryError};

/// Discrete sampling from a dense voxel grid.
///
/// The sampler borrows a buffer of `V` laid out over the full resolution of
/// its [`FieldGeometry`] and hands linear indices to an [`Accessor`] that
/// produces samples of type `S`. It never owns, allocates or frees the
/// buffer; on the device the pointer is a plain device address that stays
/// valid for as long as the host keeps the allocation alive.
///
/// Coordinates passed to [`index`](Self::index) and
/// [`value_at_voxel`](Self::value_at_voxel) must lie inside the data window.
/// This is checked with `debug_assert!` only; out-of-window coordinates in a
/// release build read arbitrary memory.
pub struct DenseFieldSampler<'a, V, S> {
    geometry: FieldGeometry,
    data: *const V,
    _marker: PhantomData<(&'a [V], fn() -> S)>,
}

impl<'a, V, S> DenseFieldSampler<'a, V, S> {
    /// Wraps a host buffer. `data` must hold exactly
    /// [`FieldGeometry::element_count`] elements.
    pub fn new(geometry: FieldGeometry, data: &'a [V]) -> Result<Self, GeometryError> {
        geometry.byte_size::<V>()?;
        if data.len() != geometry.element_count() {
            return Err(GeometryError::BufferLength {
                expected: geometry.element_count(),
                actual: data.len(),
            });
        }
        Ok(Self {
            geometry,
            data: data.as_ptr(),
            _marker: PhantomData,
        })
    }

    /// Wraps a raw buffer address, typically device memory.
    ///
    /// # Safety
    ///
    /// `data` must point to `geometry.element_count()` contiguous elements of
    /// `V` (so `geometry.byte_size::<V>()` is `Ok`) that stay allocated and
    /// unmodified for `'a` in every context the sampler is read from.
    #[inline]
    pub const unsafe fn from_raw_parts(geometry: FieldGeometry, data: *const V) -> Self {
        Self {
            geometry,
            data,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn geometry(&self) -> &FieldGeometry {
        &self.geometry
    }

    /// 3d to 1d index mapping.
    #[inline]
    pub fn index(&self, i: i32, j: i32, k: i32) -> usize {
        let window = self.geometry.data_window();
        debug_assert!(i >= window.min.x && i <= window.max.x, "i = {i} outside {window}");
        debug_assert!(j >= window.min.y && j <= window.max.y, "j = {j} outside {window}");
        debug_assert!(k >= window.min.z && k <= window.max.z, "k = {k} outside {window}");

        let (i, j, k) = self.geometry.window_offset(i, j, k);
        k.wrapping_mul(self.geometry.slab_stride())
            .wrapping_add(j.wrapping_mul(self.geometry.row_stride()))
            .wrapping_add(i)
    }

    /// Voxels in the data window.
    #[inline]
    pub fn allocated_voxel_count(&self) -> usize {
        self.geometry.data_window_voxel_count()
    }

    /// Sample at a linear index.
    ///
    /// # Safety
    ///
    /// `index` must be the result of [`index`](Self::index) for an in-window
    /// coordinate, and the buffer must be readable by `accessor` in the
    /// executing context.
    #[inline]
    pub unsafe fn value_at<A>(&self, accessor: &mut A, index: usize) -> S
    where
        A: Accessor<V, S>,
    {
        accessor.fetch(index, self.data)
    }

    /// Sample at a voxel coordinate.
    ///
    /// # Safety
    ///
    /// `(i, j, k)` must lie inside the data window, and the buffer must be
    /// readable by `accessor` in the executing context.
    #[inline]
    pub unsafe fn value_at_voxel<A>(&self, accessor: &mut A, i: i32, j: i32, k: i32) -> S
    where
        A: Accessor<V, S>,
    {
        self.value_at(accessor, self.index(i, j, k))
    }

    /// Buffer address, exposed for texture binding.
    #[inline]
    pub fn data_ptr(&self) -> *const V {
        self.data
    }

    /// Size in bytes of the full allocation, exposed for texture binding.
    /// Independent of the data window.
    ///
    /// Saturates at `usize::MAX` for a geometry whose
    /// [`byte_size`](FieldGeometry::byte_size) is out of range, which no
    /// buffer satisfying the constructors' contracts has.
    #[inline]
    pub fn mem_size_bytes(&self) -> usize {
        self.geometry.element_count().saturating_mul(size_of::<V>())
    }
}

impl<V, S> Clone for DenseFieldSampler<'_, V, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V, S> Copy for DenseFieldSampler<'_, V, S> {}

impl<V, S> core::fmt::Debug for DenseFieldSampler<'_, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DenseFieldSampler")
            .field("geometry", &self.geometry)
            .field("data", &self.data)
            .finish()
    }
}

// SAFETY: the sampler is a read-only view of `[V]`, same as `&[V]`.
unsafe impl<V: Sync, S> Send for DenseFieldSampler<'_, V, S> {}
unsafe impl<V: Sync, S> Sync for DenseFieldSampler<'_, V, S> {}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;
    use crate::accessor::{ConvertingAccessor, DirectAccessor};
    use crate::geometry::{Box3i, Vec3i};

    fn geometry(resolution: Vec3i, min: Vec3i, max: Vec3i) -> FieldGeometry {
        FieldGeometry::new(resolution, Box3i::new(min, max)).unwrap()
    }

    fn ramp(count: usize) -> Vec<f32> {
        (0..count).map(|n| n as f32).collect()
    }

    fn voxels(geometry: &FieldGeometry) -> impl Iterator<Item = (i32, i32, i32)> + '_ {
        (0..geometry.data_window_voxel_count()).map(|n| geometry.window_voxel(n))
    }

    #[test]
    fn cropped_window_scenario() {
        let geometry = geometry(Vec3i::splat(4), Vec3i::splat(1), Vec3i::splat(2));
        let data = ramp(geometry.element_count());
        let sampler = DenseFieldSampler::<f32, f32>::new(geometry, &data).unwrap();

        assert_eq!(geometry.row_stride(), 4);
        assert_eq!(geometry.slab_stride(), 16);
        assert_eq!(sampler.index(1, 1, 1), 0);
        assert_eq!(sampler.index(2, 2, 2), 21);
        assert_eq!(sampler.allocated_voxel_count(), 8);
        assert_eq!(sampler.mem_size_bytes(), 256);
    }

    #[test]
    fn rejects_buffer_of_window_size() {
        let geometry = geometry(Vec3i::splat(4), Vec3i::splat(1), Vec3i::splat(2));
        let data = ramp(geometry.data_window_voxel_count());
        let err = DenseFieldSampler::<f32, f32>::new(geometry, &data).unwrap_err();
        assert_eq!(
            err,
            GeometryError::BufferLength {
                expected: 64,
                actual: 8
            }
        );
    }

    #[test]
    fn indices_are_distinct_and_in_allocation() {
        let geometry = geometry(Vec3i::new(7, 5, 6), Vec3i::new(-2, 3, 0), Vec3i::new(3, 6, 4));
        let data = ramp(geometry.element_count());
        let sampler = DenseFieldSampler::<f32, f32>::new(geometry, &data).unwrap();

        let mut seen = HashSet::new();
        for (i, j, k) in voxels(&geometry) {
            let index = sampler.index(i, j, k);
            assert!(index < geometry.element_count());
            assert!(seen.insert(index), "duplicate index {index} at ({i}, {j}, {k})");
        }
        assert_eq!(seen.len(), sampler.allocated_voxel_count());
    }

    #[test]
    fn full_window_indices_are_dense() {
        let geometry = FieldGeometry::from_resolution(Vec3i::new(3, 4, 5)).unwrap();
        let data = ramp(geometry.element_count());
        let sampler = DenseFieldSampler::<f32, f32>::new(geometry, &data).unwrap();

        let indices: Vec<usize> = voxels(&geometry)
            .map(|(i, j, k)| sampler.index(i, j, k))
            .collect();
        assert_eq!(indices, (0..sampler.allocated_voxel_count()).collect::<Vec<_>>());
    }

    #[test]
    fn mem_size_ignores_window() {
        let cropped = geometry(Vec3i::new(8, 4, 2), Vec3i::splat(0), Vec3i::new(1, 1, 0));
        let data = [0u16; 64];
        let sampler = DenseFieldSampler::<u16, f32>::new(cropped, &data).unwrap();
        assert_eq!(sampler.mem_size_bytes(), 8 * 4 * 2 * 2);
        assert_eq!(sampler.allocated_voxel_count(), 4);
    }

    #[test]
    fn fetch_delegates_to_accessor() {
        let geometry = geometry(Vec3i::new(5, 4, 3), Vec3i::new(1, 0, 1), Vec3i::new(3, 2, 2));
        let data = ramp(geometry.element_count());
        let sampler = DenseFieldSampler::<f32, f32>::new(geometry, &data).unwrap();
        let mut plus_one = |index: usize, ptr: *const f32| unsafe { *ptr.add(index) + 1.0 };

        for (i, j, k) in voxels(&geometry) {
            let value = unsafe { sampler.value_at_voxel(&mut plus_one, i, j, k) };
            assert_eq!(value, data[sampler.index(i, j, k)] + 1.0);
        }
    }

    #[test]
    fn sample_type_may_differ_from_value_type() {
        let geometry = FieldGeometry::from_resolution(Vec3i::new(4, 2, 2)).unwrap();
        let data: Vec<u8> = (0..16).map(|n| n * 10).collect();
        let sampler = DenseFieldSampler::<u8, f64>::new(geometry, &data).unwrap();
        let mut ac = ConvertingAccessor::new();
        assert_eq!(unsafe { sampler.value_at_voxel(&mut ac, 3, 1, 1) }, 150.0);
    }

    #[test]
    fn linear_and_voxel_fetch_agree() {
        let geometry = geometry(Vec3i::splat(3), Vec3i::splat(1), Vec3i::splat(2));
        let data = ramp(geometry.element_count());
        let sampler = DenseFieldSampler::<f32, f32>::new(geometry, &data).unwrap();
        let mut ac = DirectAccessor;
        let index = sampler.index(2, 1, 2);
        assert_eq!(index, 1 + 0 + 9);
        unsafe {
            assert_eq!(sampler.value_at(&mut ac, index), 10.0);
            assert_eq!(sampler.value_at_voxel(&mut ac, 2, 1, 2), 10.0);
        }
    }

    #[test]
    fn from_raw_parts_exposes_pointer() {
        let geometry = FieldGeometry::from_resolution(Vec3i::splat(2)).unwrap();
        let data = [0f32; 8];
        let sampler =
            unsafe { DenseFieldSampler::<f32, f32>::from_raw_parts(geometry, data.as_ptr()) };
        assert_eq!(sampler.data_ptr(), data.as_ptr());
        assert_eq!(sampler.mem_size_bytes(), 32);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn mem_size_does_not_overflow() {
        let resolution = Vec3i::new(1 << 30, 1 << 30, 2);
        let geometry = FieldGeometry::from_resolution(resolution).unwrap();
        let sampler =
            unsafe { DenseFieldSampler::<f64, f64>::from_raw_parts(geometry, core::ptr::null()) };
        assert_eq!(sampler.mem_size_bytes(), usize::MAX);
        assert_eq!(
            DenseFieldSampler::<f64, f64>::new(geometry, &[]).unwrap_err(),
            GeometryError::TooLarge { resolution }
        );
    }

    #[cfg(debug_assertions)]
    fn index_in_cropped_window(i: i32, j: i32, k: i32) -> usize {
        let geometry = geometry(Vec3i::splat(4), Vec3i::splat(1), Vec3i::splat(2));
        let data = ramp(geometry.element_count());
        let sampler = DenseFieldSampler::<f32, f32>::new(geometry, &data).unwrap();
        sampler.index(i, j, k)
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "i = 0 outside")]
    fn i_below_window_asserts_in_debug() {
        index_in_cropped_window(0, 1, 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "i = 3 outside")]
    fn i_above_window_asserts_in_debug() {
        index_in_cropped_window(3, 2, 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "j = 0 outside")]
    fn j_below_window_asserts_in_debug() {
        index_in_cropped_window(1, 0, 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "j = 3 outside")]
    fn j_above_window_asserts_in_debug() {
        index_in_cropped_window(2, 3, 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "k = 0 outside")]
    fn k_below_window_asserts_in_debug() {
        index_in_cropped_window(1, 1, 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "k = 3 outside")]
    fn k_above_window_asserts_in_debug() {
        index_in_cropped_window(2, 2, 3);
    }

    #[test]
    fn sampler_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DenseFieldSampler<'static, f32, f64>>();
    }

    fn window_strategy() -> impl Strategy<Value = (Vec3i, Vec3i, Vec3i)> {
        (1..8i32, 1..8i32, 1..8i32).prop_flat_map(|(rx, ry, rz)| {
            (
                Just(Vec3i::new(rx, ry, rz)),
                (1..=rx, 1..=ry, 1..=rz),
                (-16..16i32, -16..16i32, -16..16i32),
            )
                .prop_map(|(resolution, (ex, ey, ez), (mx, my, mz))| {
                    let min = Vec3i::new(mx, my, mz);
                    let max = Vec3i::new(mx + ex - 1, my + ey - 1, mz + ez - 1);
                    (resolution, min, max)
                })
        })
    }

    proptest! {
        #[test]
        fn row_major_steps((resolution, min, max) in window_strategy()) {
            let geometry = geometry(resolution, min, max);
            let sampler = unsafe {
                DenseFieldSampler::<f32, f32>::from_raw_parts(geometry, core::ptr::null())
            };
            for (i, j, k) in voxels(&geometry) {
                let here = sampler.index(i, j, k);
                if i < max.x {
                    prop_assert_eq!(sampler.index(i + 1, j, k) - here, 1);
                }
                if j < max.y {
                    prop_assert_eq!(sampler.index(i, j + 1, k) - here, geometry.row_stride());
                }
                if k < max.z {
                    prop_assert_eq!(sampler.index(i, j, k + 1) - here, geometry.slab_stride());
                }
            }
        }

        #[test]
        fn translation_keeps_index(
            (resolution, min, max) in window_strategy(),
            (dx, dy, dz) in (-32..32i32, -32..32i32, -32..32i32),
            n in any::<prop::sample::Index>(),
        ) {
            let base = geometry(resolution, min, max);
            let shift = |v: Vec3i| Vec3i::new(v.x + dx, v.y + dy, v.z + dz);
            let shifted = geometry(resolution, shift(min), shift(max));
            let a = unsafe {
                DenseFieldSampler::<f32, f32>::from_raw_parts(base, core::ptr::null())
            };
            let b = unsafe {
                DenseFieldSampler::<f32, f32>::from_raw_parts(shifted, core::ptr::null())
            };

            let (i, j, k) = base.window_voxel(n.index(base.data_window_voxel_count()));
            prop_assert_eq!(a.index(i, j, k), b.index(i + dx, j + dy, k + dz));
        }

        #[test]
        fn voxel_count_is_window_product((resolution, min, max) in window_strategy()) {
            let geometry = geometry(resolution, min, max);
            let data = vec![0u8; geometry.element_count()];
            let sampler = DenseFieldSampler::<u8, u8>::new(geometry, &data).unwrap();
            let expected = (max.x - min.x + 1) * (max.y - min.y + 1) * (max.z - min.z + 1);
            prop_assert_eq!(sampler.allocated_voxel_count(), expected as usize);
            prop_assert_eq!(
                sampler.mem_size_bytes(),
                (resolution.x * resolution.y * resolution.z) as usize
            );
        }
    }
}
