use core::arch::nvptx::*;

/// Id of the calling thread in a 1D grid.
#[inline]
pub fn global_thread_id() -> usize {
    unsafe {
        _block_dim_x()
            .wrapping_mul(_block_idx_x())
            .wrapping_add(_thread_idx_x()) as usize
    }
}

/// Number of threads in a 1D grid, the step of a grid-stride loop.
#[inline]
pub fn grid_thread_count() -> usize {
    unsafe { _block_dim_x().wrapping_mul(_grid_dim_x()) as usize }
}
