use std::sync::Arc;

use cudarc::{
    driver::{
        sys::CUevent_flags, CudaContext, CudaFunction, CudaStream, LaunchArgs, LaunchConfig,
        PushKernelArg,
    },
    nvrtc::Ptx,
};
use field_sampler::FieldGeometry;

use crate::binding::TextureBinding;
use crate::error::Result;
use crate::volume::DeviceVolume;

/// Upper bound on launched threads; the kernels stride over larger windows.
const MAX_THREADS: usize = 1 << 22;

/// Kernel output together with the kernel duration measured by CUDA events.
#[derive(Clone, Debug)]
pub struct Timed<T> {
    pub output: T,
    pub kernel_ms: f32,
}

/// The sampler kernels of one loaded PTX module, launched on the context's
/// default stream.
pub struct SamplerKernels {
    stream: Arc<CudaStream>,
    index: CudaFunction,
    sample_f32: CudaFunction,
    sample_tex_f32: CudaFunction,
    sample_u8_f32: CudaFunction,
}

impl SamplerKernels {
    pub fn load(ctx: &Arc<CudaContext>, ptx: Ptx) -> Result<Self> {
        let module = ctx.load_module(ptx)?;
        Ok(Self {
            stream: ctx.default_stream(),
            index: module.load_function("dense_index")?,
            sample_f32: module.load_function("dense_sample_f32")?,
            sample_tex_f32: module.load_function("dense_sample_tex_f32")?,
            sample_u8_f32: module.load_function("dense_sample_u8_f32")?,
        })
    }

    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    /// Linear index of every data window voxel, computed on the device.
    pub fn indices(&self, geometry: &FieldGeometry) -> Result<Timed<Vec<u64>>> {
        let n = geometry.data_window_voxel_count();
        let mut out = self.stream.alloc_zeros::<u64>(n)?;
        let args = geometry_args(geometry);
        let kernel_ms = self.timed(|| {
            let mut builder = self.stream.launch_builder(&self.index);
            builder.arg(&mut out);
            push_geometry(&mut builder, &args);
            unsafe { builder.launch(launch_config(n)) }?;
            Ok(())
        })?;
        Ok(Timed {
            output: self.stream.memcpy_dtov(&out)?,
            kernel_ms,
        })
    }

    /// Samples the data window with plain pointer loads.
    pub fn sample_direct(&self, volume: &DeviceVolume<f32>) -> Result<Timed<Vec<f32>>> {
        let n = volume.geometry().data_window_voxel_count();
        let mut out = self.stream.alloc_zeros::<f32>(n)?;
        let args = geometry_args(volume.geometry());
        let kernel_ms = self.timed(|| {
            let mut builder = self.stream.launch_builder(&self.sample_f32);
            builder.arg(volume.slice()).arg(&mut out);
            push_geometry(&mut builder, &args);
            unsafe { builder.launch(launch_config(n)) }?;
            Ok(())
        })?;
        Ok(Timed {
            output: self.stream.memcpy_dtov(&out)?,
            kernel_ms,
        })
    }

    /// Samples the data window through `texture`, which must be bound to
    /// `volume`.
    pub fn sample_texture(
        &self,
        volume: &DeviceVolume<f32>,
        texture: &TextureBinding,
    ) -> Result<Timed<Vec<f32>>> {
        let n = volume.geometry().data_window_voxel_count();
        let mut out = self.stream.alloc_zeros::<f32>(n)?;
        let args = geometry_args(volume.geometry());
        let tex = texture.object();
        let kernel_ms = self.timed(|| {
            let mut builder = self.stream.launch_builder(&self.sample_tex_f32);
            builder.arg(volume.slice()).arg(&tex).arg(&mut out);
            push_geometry(&mut builder, &args);
            unsafe { builder.launch(launch_config(n)) }?;
            Ok(())
        })?;
        Ok(Timed {
            output: self.stream.memcpy_dtov(&out)?,
            kernel_ms,
        })
    }

    /// Samples `u8` voxels widened to `f32`.
    pub fn sample_promoted(&self, volume: &DeviceVolume<u8>) -> Result<Timed<Vec<f32>>> {
        let n = volume.geometry().data_window_voxel_count();
        let mut out = self.stream.alloc_zeros::<f32>(n)?;
        let args = geometry_args(volume.geometry());
        let kernel_ms = self.timed(|| {
            let mut builder = self.stream.launch_builder(&self.sample_u8_f32);
            builder.arg(volume.slice()).arg(&mut out);
            push_geometry(&mut builder, &args);
            unsafe { builder.launch(launch_config(n)) }?;
            Ok(())
        })?;
        Ok(Timed {
            output: self.stream.memcpy_dtov(&out)?,
            kernel_ms,
        })
    }

    // Records events around `launch` and waits for the second one.
    fn timed<F>(&self, launch: F) -> Result<f32>
    where
        F: FnOnce() -> Result<()>,
    {
        let start = self
            .stream
            .record_event(Some(CUevent_flags::CU_EVENT_DEFAULT))?;
        launch()?;
        let end = self
            .stream
            .record_event(Some(CUevent_flags::CU_EVENT_DEFAULT))?;
        end.synchronize()?;
        Ok(start.elapsed_ms(&end)?)
    }
}

/// Resolution, window min and window max, in kernel parameter order.
pub fn geometry_args(geometry: &FieldGeometry) -> [i32; 9] {
    let resolution = geometry.resolution();
    let window = geometry.data_window();
    [
        resolution.x,
        resolution.y,
        resolution.z,
        window.min.x,
        window.min.y,
        window.min.z,
        window.max.x,
        window.max.y,
        window.max.z,
    ]
}

fn push_geometry<'a>(builder: &mut LaunchArgs<'a>, args: &'a [i32; 9]) {
    for arg in args {
        builder.arg(arg);
    }
}

fn launch_config(n: usize) -> LaunchConfig {
    let cfg = LaunchConfig::for_num_elems(n.clamp(1, MAX_THREADS) as u32);
    log::debug!(
        "launching {:?} blocks of {:?} threads for {n} voxels",
        cfg.grid_dim,
        cfg.block_dim
    );
    cfg
}
