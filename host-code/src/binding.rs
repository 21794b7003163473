use cudarc::driver::{
    result::texture::{create_object, destroy_object},
    sys::*,
};
use field_sampler::DenseFieldSampler;

use crate::error::{Error, Result};

/// Texel coordinates of `tex.1d` fetches are `i32`.
pub const MAX_TEXELS: usize = i32::MAX as usize;

/// Voxel types that can back a linear texture.
pub trait TexelFormat {
    const FORMAT: CUarray_format_enum;
    const CHANNELS: u32 = 1;
}

impl TexelFormat for f32 {
    const FORMAT: CUarray_format_enum = CUarray_format_enum::CU_AD_FORMAT_FLOAT;
}

impl TexelFormat for u8 {
    const FORMAT: CUarray_format_enum = CUarray_format_enum::CU_AD_FORMAT_UNSIGNED_INT8;
}

impl TexelFormat for u16 {
    const FORMAT: CUarray_format_enum = CUarray_format_enum::CU_AD_FORMAT_UNSIGNED_INT16;
}

impl TexelFormat for u32 {
    const FORMAT: CUarray_format_enum = CUarray_format_enum::CU_AD_FORMAT_UNSIGNED_INT32;
}

impl TexelFormat for i32 {
    const FORMAT: CUarray_format_enum = CUarray_format_enum::CU_AD_FORMAT_SIGNED_INT32;
}

/// Resource descriptor for `size_in_bytes` of linear device memory at `dev_ptr`.
pub fn linear_resource_desc(
    dev_ptr: CUdeviceptr,
    format: CUarray_format_enum,
    num_channels: u32,
    size_in_bytes: usize,
) -> CUDA_RESOURCE_DESC {
    CUDA_RESOURCE_DESC {
        resType: CUresourcetype::CU_RESOURCE_TYPE_LINEAR,
        res: CUDA_RESOURCE_DESC_st__bindgen_ty_1 {
            linear: CUDA_RESOURCE_DESC_st__bindgen_ty_1__bindgen_ty_3 {
                devPtr: dev_ptr,
                format,
                numChannels: num_channels,
                sizeInBytes: size_in_bytes,
            },
        },
        flags: 0,
    }
}

/// Point-sampled, clamped, unnormalized texture description.
pub fn point_texture_desc() -> CUDA_TEXTURE_DESC {
    CUDA_TEXTURE_DESC {
        addressMode: [
            CUaddress_mode_enum::CU_TR_ADDRESS_MODE_CLAMP,
            CUaddress_mode_enum::CU_TR_ADDRESS_MODE_CLAMP,
            CUaddress_mode_enum::CU_TR_ADDRESS_MODE_CLAMP,
        ],
        filterMode: CUfilter_mode_enum::CU_TR_FILTER_MODE_POINT,
        flags: 0,
        maxAnisotropy: 0,
        mipmapFilterMode: CUfilter_mode_enum::CU_TR_FILTER_MODE_POINT,
        mipmapLevelBias: 0f32,
        minMipmapLevelClamp: 0f32,
        maxMipmapLevelClamp: 0f32,
        borderColor: [0f32, 0f32, 0f32, 0f32],
        reserved: [0; 12],
    }
}

/// A texture object registered over a sampler's buffer, destroyed on drop.
///
/// The binding covers the full allocation reported by
/// [`DenseFieldSampler::mem_size_bytes`], so texture fetches use the same
/// linear indices as pointer reads.
#[derive(Debug)]
pub struct TextureBinding {
    object: CUtexObject,
}

impl TextureBinding {
    /// Binds the memory behind `sampler`, which must wrap a device address
    /// (see [`DeviceVolume::sampler`](crate::DeviceVolume::sampler)).
    ///
    /// Fails with [`Error::TextureTooLarge`] when the allocation holds more
    /// than [`MAX_TEXELS`] elements.
    pub fn bind<V: TexelFormat, S>(sampler: &DenseFieldSampler<'_, V, S>) -> Result<Self> {
        let texels = sampler.geometry().element_count();
        if texels > MAX_TEXELS {
            return Err(Error::TextureTooLarge {
                texels,
                max: MAX_TEXELS,
            });
        }
        let resource_desc = linear_resource_desc(
            sampler.data_ptr() as CUdeviceptr,
            V::FORMAT,
            V::CHANNELS,
            sampler.mem_size_bytes(),
        );
        let texture_desc = point_texture_desc();
        let object = unsafe { create_object(&resource_desc, &texture_desc, std::ptr::null())? };
        log::debug!(
            "bound texture object {object:#x} over {} bytes",
            sampler.mem_size_bytes()
        );
        Ok(Self { object })
    }

    pub fn object(&self) -> CUtexObject {
        self.object
    }
}

impl Drop for TextureBinding {
    fn drop(&mut self) {
        if let Err(err) = unsafe { destroy_object(self.object) } {
            log::warn!("failed to destroy texture object {:#x}: {err}", self.object);
        }
    }
}
