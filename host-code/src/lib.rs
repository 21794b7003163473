//! Host side of the dense field sampler: building voxel volumes, moving them
//! to the device, binding them as textures and launching the sampler
//! kernels, plus a rayon reference path to check device results against.

pub mod binding;
pub mod error;
pub mod launch;
pub mod reference;
pub mod volume;

pub use binding::{TexelFormat, TextureBinding};
pub use error::{Error, Result};
pub use launch::{SamplerKernels, Timed};
pub use volume::{DenseVolume, DeviceVolume};
