use cudarc::driver::DriverError;
use field_sampler::GeometryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("CUDA driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("invalid field geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("{texels} texels exceed the {max} a 1D texture fetch can address")]
    TextureTooLarge { texels: usize, max: usize },

    /// Device output disagrees with the host reference.
    #[error("{kernel}: {count} samples differ from the host reference")]
    Mismatch { kernel: &'static str, count: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
