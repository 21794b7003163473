use core::fmt;

use thiserror::Error;

/// Integer voxel coordinate or per-axis extent.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vec3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3i {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: i32) -> Self {
        Self { x: v, y: v, z: v }
    }
}

impl fmt::Display for Vec3i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Axis-aligned integer box, `min` and `max` both inclusive.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Box3i {
    pub min: Vec3i,
    pub max: Vec3i,
}

impl Box3i {
    pub const fn new(min: Vec3i, max: Vec3i) -> Self {
        Self { min, max }
    }

    /// Number of voxels along each axis.
    ///
    /// # Panics
    ///
    /// Overflows (and panics in debug builds) when an axis spans more than
    /// `i32::MAX` voxels, e.g. `min = i32::MIN, max = i32::MAX`. Windows of a
    /// validated [`FieldGeometry`] never do. Only meaningful for `min <= max`.
    pub const fn size(&self) -> Vec3i {
        Vec3i {
            x: self.max.x - self.min.x + 1,
            y: self.max.y - self.min.y + 1,
            z: self.max.z - self.min.z + 1,
        }
    }

    #[inline]
    pub const fn contains(&self, i: i32, j: i32, k: i32) -> bool {
        i >= self.min.x
            && i <= self.max.x
            && j >= self.min.y
            && j <= self.max.y
            && k >= self.min.z
            && k <= self.max.z
    }
}

impl fmt::Display for Box3i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.min, self.max)
    }
}

/// Reasons a geometry or a buffer handed to a sampler is rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("resolution must be positive on every axis, got {0}")]
    NonPositiveResolution(Vec3i),

    #[error("data window {0} has min greater than max")]
    InvertedWindow(Box3i),

    #[error("data window {window} does not fit into resolution {resolution}")]
    WindowExceedsResolution { window: Box3i, resolution: Vec3i },

    #[error("buffer holds {actual} elements, geometry requires {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("resolution {resolution} exceeds the addressable allocation size")]
    TooLarge { resolution: Vec3i },
}

// Allocations are limited to isize::MAX bytes, as for Layout.
const MAX_ALLOCATION: usize = isize::MAX as usize;

/// Voxel layout of a dense grid: the full allocated resolution plus the
/// active data window that may be sampled.
///
/// Linear offsets are row-major (x fastest) with strides taken from the full
/// resolution, measured from `data_window.min`. A valid geometry has a
/// positive resolution, `min <= max` on every axis and a window no larger
/// than the resolution, so every in-window offset is below
/// [`element_count`](Self::element_count).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldGeometry {
    resolution: Vec3i,
    data_window: Box3i,
    row_stride: usize,
    slab_stride: usize,
    element_count: usize,
}

impl FieldGeometry {
    pub fn new(resolution: Vec3i, data_window: Box3i) -> Result<Self, GeometryError> {
        if resolution.x <= 0 || resolution.y <= 0 || resolution.z <= 0 {
            return Err(GeometryError::NonPositiveResolution(resolution));
        }
        let Box3i { min, max } = data_window;
        if min.x > max.x || min.y > max.y || min.z > max.z {
            return Err(GeometryError::InvertedWindow(data_window));
        }
        // i64 so that extreme windows cannot overflow before the comparison
        let extent = |lo: i32, hi: i32| i64::from(hi) - i64::from(lo) + 1;
        if extent(min.x, max.x) > i64::from(resolution.x)
            || extent(min.y, max.y) > i64::from(resolution.y)
            || extent(min.z, max.z) > i64::from(resolution.z)
        {
            return Err(GeometryError::WindowExceedsResolution {
                window: data_window,
                resolution,
            });
        }

        let too_large = GeometryError::TooLarge { resolution };
        let row_stride = resolution.x as usize;
        let slab_stride = row_stride
            .checked_mul(resolution.y as usize)
            .ok_or(too_large)?;
        let element_count = slab_stride
            .checked_mul(resolution.z as usize)
            .filter(|&count| count <= MAX_ALLOCATION)
            .ok_or(too_large)?;
        Ok(Self {
            resolution,
            data_window,
            row_stride,
            slab_stride,
            element_count,
        })
    }

    /// Geometry whose data window covers the whole allocation, starting at
    /// the origin.
    pub fn from_resolution(resolution: Vec3i) -> Result<Self, GeometryError> {
        let max = Vec3i::new(
            resolution.x.wrapping_sub(1),
            resolution.y.wrapping_sub(1),
            resolution.z.wrapping_sub(1),
        );
        Self::new(resolution, Box3i::new(Vec3i::splat(0), max))
    }

    pub fn resolution(&self) -> Vec3i {
        self.resolution
    }

    pub fn data_window(&self) -> Box3i {
        self.data_window
    }

    /// Offset increment for a unit step in y.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Offset increment for a unit step in z.
    #[inline]
    pub fn slab_stride(&self) -> usize {
        self.slab_stride
    }

    /// Voxels in the full allocated resolution.
    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Bytes needed to hold the full resolution as `V` elements.
    pub fn byte_size<V>(&self) -> Result<usize, GeometryError> {
        self.element_count
            .checked_mul(core::mem::size_of::<V>())
            .filter(|&bytes| bytes <= MAX_ALLOCATION)
            .ok_or(GeometryError::TooLarge {
                resolution: self.resolution,
            })
    }

    /// Voxels in the active data window.
    #[inline]
    pub fn data_window_voxel_count(&self) -> usize {
        let size = self.data_window.size();
        size.x as usize * size.y as usize * size.z as usize
    }

    #[inline]
    pub fn contains(&self, i: i32, j: i32, k: i32) -> bool {
        self.data_window.contains(i, j, k)
    }

    /// Translates an in-window coordinate into window-local coordinates.
    #[inline]
    pub fn window_offset(&self, i: i32, j: i32, k: i32) -> (usize, usize, usize) {
        let min = self.data_window.min;
        (
            i.wrapping_sub(min.x) as usize,
            j.wrapping_sub(min.y) as usize,
            k.wrapping_sub(min.z) as usize,
        )
    }

    /// The `n`-th voxel of the data window in row-major order, i.e. the
    /// order of a nested `k`, `j`, `i` loop over the window.
    ///
    /// `n` must be below [`data_window_voxel_count`](Self::data_window_voxel_count).
    #[inline]
    pub fn window_voxel(&self, n: usize) -> (i32, i32, i32) {
        debug_assert!(n < self.data_window_voxel_count());
        let size = self.data_window.size();
        let (nx, ny) = (size.x as usize, size.y as usize);
        let min = self.data_window.min;
        (
            min.x + (n % nx) as i32,
            min.y + ((n / nx) % ny) as i32,
            min.z + (n / (nx * ny)) as i32,
        )
    }
}
