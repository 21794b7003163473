use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use cudarc::{driver::CudaContext, nvrtc::Ptx};
use field_sampler::{
    Box3i, ConvertingAccessor, DirectAccessor, FieldGeometry, GeometryError, Vec3i,
};
use field_sampler_host::{reference, DenseVolume, Result, SamplerKernels, TextureBinding};
use rand::{distributions::Standard, prelude::*};
use std::io::{self, Write};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Samples a dense voxel grid on the GPU with the dense field sampler and
/// different accessors (developed with Rust using the nvptx64-nvidia-cuda target)
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Allocated resolution of the grid
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], default_values_t = [64, 64, 64])]
    resolution: Vec<i32>,
    /// Inclusive minimum of the data window (defaults to the whole resolution)
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true, requires("window_max"))]
    window_min: Option<Vec<i32>>,
    /// Inclusive maximum of the data window (defaults to the whole resolution)
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true, requires("window_min"))]
    window_max: Option<Vec<i32>>,
    /// Accessor the voxels are read with
    #[arg(long, value_enum, default_value_t = AccessorKind::All)]
    accessor: AccessorKind,
    /// Benchmark runs for a repititions number of times per accessor
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    reps: u32,
    /// Check the device indices and samples against the ones calculated on the host
    #[arg(long, default_value_t = false)]
    check: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, EnumIter)]
enum AccessorKind {
    /// Plain pointer loads of f32 voxels
    Direct,
    /// Loads of f32 voxels through a linear texture object
    Texture,
    /// u8 voxels widened to f32
    Promoted,
    /// Direct + texture + promoted
    All,
}

impl AccessorKind {
    fn kernel_name(self) -> &'static str {
        match self {
            AccessorKind::Direct => "dense_sample_f32",
            AccessorKind::Texture => "dense_sample_tex_f32",
            AccessorKind::Promoted => "dense_sample_u8_f32",
            AccessorKind::All => unreachable!(),
        }
    }
}

fn vec3(values: &[i32]) -> Vec3i {
    Vec3i::new(values[0], values[1], values[2])
}

fn geometry(cli: &Cli) -> std::result::Result<FieldGeometry, GeometryError> {
    let resolution = vec3(&cli.resolution);
    match (&cli.window_min, &cli.window_max) {
        (Some(min), Some(max)) => {
            FieldGeometry::new(resolution, Box3i::new(vec3(min), vec3(max)))
        }
        _ => FieldGeometry::from_resolution(resolution),
    }
}

fn run(cli: &Cli, geometry: FieldGeometry) -> Result<()> {
    // Create the context and load the kernel file
    let ctx = CudaContext::new(0)?;
    let kernels = SamplerKernels::load(
        &ctx,
        Ptx::from_src(include_str!(
            "../../kernels/target/nvptx64-nvidia-cuda/release/kernels.ptx"
        )),
    )?;
    let stream = kernels.stream();

    log::info!(
        "sampling data window {} of resolution {}",
        geometry.data_window(),
        geometry.resolution()
    );
    // Populate the host volumes: random f32 voxels and a u8 coordinate pattern
    let values: Vec<f32> = rand::thread_rng()
        .sample_iter(Standard)
        .take(geometry.element_count())
        .collect();
    let host_f32 = DenseVolume::new(geometry, values)?;
    let host_u8 = DenseVolume::from_fn(geometry, |i, j, k| (i ^ j ^ k) as u8);
    let device_f32 = host_f32.upload(stream)?;
    let device_u8 = host_u8.upload(stream)?;

    if cli.check {
        let indices = kernels.indices(&geometry)?;
        reference::check_matches(
            "dense_index",
            &indices.output,
            &reference::index_window(&host_f32),
        )?;
        log::info!("device indices match the host");
    }

    let kinds: Vec<AccessorKind> = if cli.accessor == AccessorKind::All {
        AccessorKind::iter()
            .filter(|&kind| kind != AccessorKind::All)
            .collect()
    } else {
        vec![cli.accessor]
    };

    // We lock the stdout only one time to improve performance
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "kernel;iteration;res-x;res-y;res-z;voxels;kernel-duration")?;
    let resolution = geometry.resolution();
    for kind in kinds {
        let texture = if kind == AccessorKind::Texture {
            Some(TextureBinding::bind(&device_f32.sampler::<f32>(stream))?)
        } else {
            None
        };
        // If we need to check the result, sample on the host
        let expected = if cli.check {
            Some(match kind {
                AccessorKind::Direct | AccessorKind::Texture => {
                    reference::sample_window(&host_f32, || DirectAccessor)
                }
                AccessorKind::Promoted => {
                    reference::sample_window(&host_u8, ConvertingAccessor::<f32>::new)
                }
                AccessorKind::All => unreachable!(),
            })
        } else {
            None
        };
        for iteration in 0..cli.reps {
            let timed = match (kind, &texture) {
                (AccessorKind::Direct, _) => kernels.sample_direct(&device_f32)?,
                (AccessorKind::Texture, Some(texture)) => {
                    kernels.sample_texture(&device_f32, texture)?
                }
                (AccessorKind::Promoted, _) => kernels.sample_promoted(&device_u8)?,
                _ => unreachable!(),
            };
            writeln!(
                stdout,
                "{};{iteration};{};{};{};{};{}",
                kind.kernel_name(),
                resolution.x,
                resolution.y,
                resolution.z,
                geometry.data_window_voxel_count(),
                timed.kernel_ms
            )?;
            if let Some(expected) = &expected {
                reference::check_matches(kind.kernel_name(), &timed.output, expected)?;
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    // Parse the given command line arguments and validate them
    let cli = Cli::parse();
    let geometry = match geometry(&cli) {
        Ok(geometry) => geometry,
        Err(err) => Cli::command()
            .error(ErrorKind::ArgumentConflict, err)
            .exit(),
    };

    if let Err(e) = run(&cli, geometry) {
        log::error!("{e}");
        std::process::exit(-1);
    }
}
