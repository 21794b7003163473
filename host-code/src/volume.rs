use std::sync::Arc;

use cudarc::driver::{CudaSlice, CudaStream, DevicePtr, DeviceRepr};
use field_sampler::{DenseFieldSampler, FieldGeometry, GeometryError};
use rayon::prelude::*;

use crate::error::Result;

/// Host-owned dense voxel buffer covering the full resolution of its
/// geometry.
#[derive(Clone, Debug)]
pub struct DenseVolume<V> {
    geometry: FieldGeometry,
    data: Vec<V>,
}

impl<V> DenseVolume<V> {
    pub fn new(geometry: FieldGeometry, data: Vec<V>) -> Result<Self> {
        if data.len() != geometry.element_count() {
            return Err(GeometryError::BufferLength {
                expected: geometry.element_count(),
                actual: data.len(),
            }
            .into());
        }
        Ok(Self { geometry, data })
    }

    /// Fills the allocation in parallel. `f` receives voxel coordinates; the
    /// allocation starts at the data window minimum, so every in-window
    /// voxel is visited with its own coordinate.
    pub fn from_fn<F>(geometry: FieldGeometry, f: F) -> Self
    where
        F: Fn(i32, i32, i32) -> V + Sync,
        V: Send,
    {
        let resolution = geometry.resolution();
        let origin = geometry.data_window().min;
        let (nx, ny) = (resolution.x as usize, resolution.y as usize);
        let data = (0..geometry.element_count())
            .into_par_iter()
            .map(|e| {
                f(
                    origin.x + (e % nx) as i32,
                    origin.y + ((e / nx) % ny) as i32,
                    origin.z + (e / (nx * ny)) as i32,
                )
            })
            .collect();
        Self { geometry, data }
    }

    pub fn geometry(&self) -> &FieldGeometry {
        &self.geometry
    }

    pub fn as_slice(&self) -> &[V] {
        &self.data
    }

    pub fn sampler<S>(&self) -> DenseFieldSampler<'_, V, S> {
        // SAFETY: the buffer length was checked against the geometry when the
        // volume was built and the borrow keeps it alive.
        unsafe { DenseFieldSampler::from_raw_parts(self.geometry, self.data.as_ptr()) }
    }

    /// Copies the buffer into device memory on `stream`.
    pub fn upload(&self, stream: &Arc<CudaStream>) -> Result<DeviceVolume<V>>
    where
        V: DeviceRepr,
    {
        let data = stream.memcpy_stod(self.data.as_slice())?;
        log::debug!(
            "uploaded {} voxels ({} bytes)",
            self.data.len(),
            self.data.len() * std::mem::size_of::<V>()
        );
        Ok(DeviceVolume {
            geometry: self.geometry,
            data,
        })
    }
}

/// Dense voxel buffer resident in device memory.
pub struct DeviceVolume<V> {
    geometry: FieldGeometry,
    data: CudaSlice<V>,
}

impl<V> DeviceVolume<V> {
    pub fn geometry(&self) -> &FieldGeometry {
        &self.geometry
    }

    pub fn slice(&self) -> &CudaSlice<V> {
        &self.data
    }

    /// Sampler over the device allocation. Its pointer is a device address:
    /// only hand it to kernels or binding routines, never read through it on
    /// the host.
    pub fn sampler<S>(&self, stream: &CudaStream) -> DenseFieldSampler<'_, V, S> {
        let (ptr, _sync) = self.data.device_ptr(stream);
        // SAFETY: the slice was allocated with `element_count` elements and
        // outlives the returned sampler.
        unsafe { DenseFieldSampler::from_raw_parts(self.geometry, ptr as *const V) }
    }
}
