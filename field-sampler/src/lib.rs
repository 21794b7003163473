//! Index mapping and value fetch for dense voxel grids resident in
//! accelerator memory.
//!
//! The crate is `no_std` and allocation-free so the same sampler code runs
//! on the host and inside `nvptx64` kernels.
#![cfg_attr(not(test), no_std)]

pub mod accessor;
pub mod dense;
pub mod geometry;

pub use accessor::{Accessor, ConvertingAccessor, DirectAccessor};
pub use dense::DenseFieldSampler;
pub use geometry::{Box3i, FieldGeometry, GeometryError, Vec3i};
