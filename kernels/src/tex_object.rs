use field_sampler::Accessor;

use crate::intrinsics::_tex_1d_fetch_f32;

/// Handle of a CUDA texture object, as created on the host.
pub type TexObject = u64;

/// Fetches `f32` voxels through a 1D linear texture bound to the sampler's
/// buffer. The buffer pointer handed to [`Accessor::fetch`] is ignored, the
/// texture already refers to the same memory.
///
/// `tex.1d` takes an `i32` texel coordinate, so only buffers of at most
/// `i32::MAX` elements can be fetched this way; the host refuses to bind
/// larger ones.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TexFetchAccessor {
    inner: TexObject,
}

impl TexFetchAccessor {
    pub fn new(inner: TexObject) -> Self {
        Self { inner }
    }
}

impl Accessor<f32, f32> for TexFetchAccessor {
    #[inline]
    unsafe fn fetch(&mut self, index: usize, _data: *const f32) -> f32 {
        debug_assert!(index <= i32::MAX as usize);
        _tex_1d_fetch_f32(self.inner, index as i32)
    }
}
