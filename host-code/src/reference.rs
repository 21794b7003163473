use field_sampler::Accessor;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::volume::DenseVolume;

/// Samples every data window voxel of `volume` on the rayon pool, in the same
/// row-major window order the device kernels write their output in.
///
/// Each worker gets its own accessor from `make_accessor`.
pub fn sample_window<V, S, A, F>(volume: &DenseVolume<V>, make_accessor: F) -> Vec<S>
where
    V: Sync,
    S: Send,
    A: Accessor<V, S>,
    F: Fn() -> A + Sync + Send,
{
    let sampler = volume.sampler::<S>();
    let geometry = *volume.geometry();
    (0..sampler.allocated_voxel_count())
        .into_par_iter()
        .map_init(make_accessor, |accessor, n| {
            let (i, j, k) = geometry.window_voxel(n);
            // SAFETY: `window_voxel` only yields in-window coordinates and the
            // sampler wraps a host buffer.
            unsafe { sampler.value_at_voxel(accessor, i, j, k) }
        })
        .collect()
}

/// Linear index of every data window voxel, in window order.
pub fn index_window<V: Sync>(volume: &DenseVolume<V>) -> Vec<u64> {
    let sampler = volume.sampler::<V>();
    let geometry = *volume.geometry();
    (0..sampler.allocated_voxel_count())
        .into_par_iter()
        .map(|n| {
            let (i, j, k) = geometry.window_voxel(n);
            sampler.index(i, j, k) as u64
        })
        .collect()
}

/// Fails with [`Error::Mismatch`] unless `device` and `host` are identical.
pub fn check_matches<T>(kernel: &'static str, device: &[T], host: &[T]) -> Result<()>
where
    T: PartialEq + Sync,
{
    let differing = device
        .par_iter()
        .zip(host.par_iter())
        .filter(|(d, h)| d != h)
        .count();
    let count = differing + device.len().abs_diff(host.len());
    if count > 0 {
        return Err(Error::Mismatch { kernel, count });
    }
    Ok(())
}
