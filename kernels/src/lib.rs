#![feature(abi_ptx, stdarch_nvptx)]
#![feature(asm_experimental_arch)]
#![no_std]

use field_sampler::{
    Accessor, Box3i, ConvertingAccessor, DenseFieldSampler, DirectAccessor, FieldGeometry, Vec3i,
};
use tex_object::*;
use util::*;

mod intrinsics;
mod tex_object;
mod util;

// Every kernel receives the geometry as nine scalars: the resolution followed
// by the inclusive data window min and max. Output buffers hold one element
// per data window voxel, in row-major window order.

#[inline]
#[allow(clippy::too_many_arguments)]
fn geometry(
    res_x: i32,
    res_y: i32,
    res_z: i32,
    min_x: i32,
    min_y: i32,
    min_z: i32,
    max_x: i32,
    max_y: i32,
    max_z: i32,
) -> Option<FieldGeometry> {
    FieldGeometry::new(
        Vec3i::new(res_x, res_y, res_z),
        Box3i::new(Vec3i::new(min_x, min_y, min_z), Vec3i::new(max_x, max_y, max_z)),
    )
    .ok()
}

/// Grid-stride loop over the data window, one sample per voxel.
#[inline]
unsafe fn sample_window<V, S, A>(
    sampler: &DenseFieldSampler<'_, V, S>,
    accessor: &mut A,
    out: *mut S,
) where
    A: Accessor<V, S>,
{
    let n = sampler.allocated_voxel_count();
    let step = grid_thread_count();
    let mut id = global_thread_id();
    while id < n {
        let (i, j, k) = sampler.geometry().window_voxel(id);
        out.add(id).write(sampler.value_at_voxel(accessor, i, j, k));
        id = id.wrapping_add(step);
    }
}

/// Writes the linear index of every data window voxel into `out`.
#[no_mangle]
pub unsafe extern "ptx-kernel" fn dense_index(
    out: *mut u64,
    res_x: i32,
    res_y: i32,
    res_z: i32,
    min_x: i32,
    min_y: i32,
    min_z: i32,
    max_x: i32,
    max_y: i32,
    max_z: i32,
) {
    let Some(geometry) = geometry(
        res_x, res_y, res_z, min_x, min_y, min_z, max_x, max_y, max_z,
    ) else {
        return;
    };
    let sampler = DenseFieldSampler::<u8, u8>::from_raw_parts(geometry, core::ptr::null());
    let n = sampler.allocated_voxel_count();
    let step = grid_thread_count();
    let mut id = global_thread_id();
    while id < n {
        let (i, j, k) = geometry.window_voxel(id);
        out.add(id).write(sampler.index(i, j, k) as u64);
        id = id.wrapping_add(step);
    }
}

/// Samples `phi` with plain pointer loads.
#[no_mangle]
pub unsafe extern "ptx-kernel" fn dense_sample_f32(
    phi: *const f32,
    out: *mut f32,
    res_x: i32,
    res_y: i32,
    res_z: i32,
    min_x: i32,
    min_y: i32,
    min_z: i32,
    max_x: i32,
    max_y: i32,
    max_z: i32,
) {
    let Some(geometry) = geometry(
        res_x, res_y, res_z, min_x, min_y, min_z, max_x, max_y, max_z,
    ) else {
        return;
    };
    let sampler = DenseFieldSampler::<f32, f32>::from_raw_parts(geometry, phi);
    sample_window(&sampler, &mut DirectAccessor, out);
}

/// Samples `phi` through the texture object `tex` bound to the same memory.
#[no_mangle]
pub unsafe extern "ptx-kernel" fn dense_sample_tex_f32(
    phi: *const f32,
    tex: TexObject,
    out: *mut f32,
    res_x: i32,
    res_y: i32,
    res_z: i32,
    min_x: i32,
    min_y: i32,
    min_z: i32,
    max_x: i32,
    max_y: i32,
    max_z: i32,
) {
    let Some(geometry) = geometry(
        res_x, res_y, res_z, min_x, min_y, min_z, max_x, max_y, max_z,
    ) else {
        return;
    };
    let sampler = DenseFieldSampler::<f32, f32>::from_raw_parts(geometry, phi);
    sample_window(&sampler, &mut TexFetchAccessor::new(tex), out);
}

/// Samples `u8` voxels and widens them to `f32`.
#[no_mangle]
pub unsafe extern "ptx-kernel" fn dense_sample_u8_f32(
    phi: *const u8,
    out: *mut f32,
    res_x: i32,
    res_y: i32,
    res_z: i32,
    min_x: i32,
    min_y: i32,
    min_z: i32,
    max_x: i32,
    max_y: i32,
    max_z: i32,
) {
    let Some(geometry) = geometry(
        res_x, res_y, res_z, min_x, min_y, min_z, max_x, max_y, max_z,
    ) else {
        return;
    };
    let sampler = DenseFieldSampler::<u8, f32>::from_raw_parts(geometry, phi);
    sample_window(&sampler, &mut ConvertingAccessor::new(), out);
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
