//! The compute context: from backend enumeration to a built program.
//!
//! Setup is a chain of types, each produced only by a successful previous step:
//!
//! ```text
//! ComputeSetup --enumerate--> Platforms<Adapter> --select--> Adapter
//!     --SelectedDevice::open--> SelectedDevice --build_program--> ComputeContext
//! ```
//!
//! Every driver call that can fail is wrapped in [`checked`], which turns a
//! captured validation or out-of-memory error into a [`DeviceError`].

use std::collections::HashMap;
use std::sync::Arc;

use swe_core::{FieldInfo, GridShape};
use tracing::{debug, error, info, warn};
use wgpu::util::DeviceExt;

use crate::adapter::{DeviceHandle, DeviceInfo, Platforms};
use crate::error::{DeviceError, Result};
use crate::memory::{FieldBuffer, GridParams};
use crate::shader::{BuildOptions, KernelSource};

/// Run `f` inside device error scopes and report what the driver captured.
pub fn checked<T, F>(device: &wgpu::Device, call: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let value = f();

    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());

    match validation.or(out_of_memory) {
        None => Ok(value),
        Some(err) => {
            let err = DeviceError::from_wgpu(call, err);
            error!("{}: {}", err.diagnostic(), err);
            Err(err)
        }
    }
}

/// Entry point of the setup chain.
pub struct ComputeSetup {
    options: BuildOptions,
}

impl ComputeSetup {
    /// Create a setup with the given build options.
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Build options in use.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Enumerate adapters on the configured backends, grouped into platforms.
    pub fn enumerate(&self) -> Result<Platforms<wgpu::Adapter>> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: self.options.backends,
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(self.options.backends);
        debug!(
            "Enumerated {} adapter(s) on {:?}",
            adapters.len(),
            self.options.backends
        );

        let platforms =
            Platforms::from_devices(adapters, &format!("{:?}", self.options.backends));
        if let Err(e) = &platforms {
            error!("{}: {}", e.diagnostic(), e);
        }
        platforms
    }
}

/// An opened device, ready to build a program.
pub struct SelectedDevice {
    info: DeviceInfo,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    options: BuildOptions,
}

impl SelectedDevice {
    /// Check the capability floor of `adapter` and open it.
    pub fn open(adapter: wgpu::Adapter, options: &BuildOptions) -> Result<Self> {
        let info = adapter.device_info();
        let caps = adapter.get_downlevel_capabilities();
        let limits = adapter.limits();

        let unsupported = |reason: String| {
            let err = DeviceError::Unsupported {
                device: info.name.clone(),
                reason,
            };
            error!("{}: {}", err.diagnostic(), err);
            err
        };

        if !caps.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return Err(unsupported("compute shaders are not available".to_string()));
        }
        options
            .check_shader_model(caps.shader_model)
            .map_err(&unsupported)?;
        options.check_limits(&limits).map_err(&unsupported)?;

        if !caps.is_webgpu_compliant() {
            warn!("{} is not fully WebGPU compliant: {:?}", info.name, caps.flags);
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("SWE Device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
            },
            None,
        ))
        .map_err(|e| {
            let err = DeviceError::RequestDevice {
                device: info.name.clone(),
                reason: e.to_string(),
            };
            error!("{}: {}", err.diagnostic(), err);
            err
        })?;

        device.on_uncaptured_error(Box::new(|e| {
            error!("Uncaptured device error: {}", e);
        }));

        info!(
            "Selected device: {} ({:?}, {:?})",
            info.name, info.backend, info.device_type
        );

        Ok(Self {
            info,
            device: Arc::new(device),
            queue: Arc::new(queue),
            options: options.clone(),
        })
    }

    /// Information about the opened device.
    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Compile `source` and create a pipeline for each entry point.
    pub fn build_program(self, source: &KernelSource, entry_points: &[&str]) -> Result<ComputeContext> {
        let wgsl = source.with_prelude(&self.options);

        let module = checked(&self.device, "create_shader_module", || {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.name()),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            })
        })?;

        let mut pipelines = HashMap::with_capacity(entry_points.len());
        for &entry in entry_points {
            let pipeline = checked(&self.device, "create_compute_pipeline", || {
                self.device
                    .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                        label: Some(entry),
                        layout: None,
                        module: &module,
                        entry_point: entry,
                    })
            })?;
            pipelines.insert(entry.to_string(), pipeline);
        }

        info!(
            "Built program {} with {} kernel(s), tile {}x{}",
            source.name(),
            pipelines.len(),
            self.options.workgroup_width,
            self.options.workgroup_height
        );

        Ok(ComputeContext {
            info: self.info,
            device: self.device,
            queue: self.queue,
            module,
            pipelines,
            options: self.options,
        })
    }
}

/// A device with a built program.
#[derive(Debug)]
pub struct ComputeContext {
    info: DeviceInfo,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    module: wgpu::ShaderModule,
    pipelines: HashMap<String, wgpu::ComputePipeline>,
    options: BuildOptions,
}

impl ComputeContext {
    /// Information about the device.
    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// Get the command queue.
    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// The compiled shader module.
    pub fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    /// Build options the program was compiled with.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Pipeline of a built entry point.
    pub fn pipeline(&self, entry: &str) -> Result<&wgpu::ComputePipeline> {
        self.pipelines
            .get(entry)
            .ok_or_else(|| DeviceError::MissingKernel(entry.to_string()))
    }

    /// Names of the built entry points, sorted.
    pub fn entry_points(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pipelines.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Work-group tile `(WGNX, WGNY)`.
    pub fn workgroup_size(&self) -> (u32, u32) {
        (self.options.workgroup_width, self.options.workgroup_height)
    }

    /// Work-group counts covering the padded grid of `shape`.
    pub fn dispatch_size(&self, shape: &GridShape) -> Result<(u32, u32, u32)> {
        dispatch_size(shape, self.workgroup_size())
    }

    /// Copy a host field into a new device buffer.
    pub fn upload_field(&self, field: &FieldInfo, label: &str) -> Result<FieldBuffer> {
        let buffer = checked(&self.device, "create_buffer", || {
            FieldBuffer::upload(&self.device, field, label)
        })?;
        debug!("Uploaded {} ({} bytes)", label, buffer.size());
        Ok(buffer)
    }

    /// Allocate a zero-filled device field.
    pub fn create_field(&self, shape: &GridShape, label: &str) -> Result<FieldBuffer> {
        checked(&self.device, "create_buffer", || {
            FieldBuffer::zeroed(&self.device, shape, label)
        })
    }

    /// Read a device field back to the host.
    pub fn download_field(&self, buffer: &FieldBuffer) -> Result<FieldInfo> {
        buffer.download(&self.device, &self.queue)
    }

    /// Uniform buffer with the parameters of `shape`.
    pub fn grid_params(&self, shape: &GridShape) -> Result<wgpu::Buffer> {
        let params = GridParams::from_shape(shape)?;
        checked(&self.device, "create_buffer", || {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Grid Params"),
                    contents: bytemuck::bytes_of(&params),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                })
        })
    }

    /// Bind `params` at binding 0 and `fields` at bindings 1.. for `entry`.
    pub fn bind_fields(
        &self,
        entry: &str,
        params: &wgpu::Buffer,
        fields: &[&FieldBuffer],
    ) -> Result<wgpu::BindGroup> {
        let pipeline = self.pipeline(entry)?;
        let layout = pipeline.get_bind_group_layout(0);

        let mut entries = Vec::with_capacity(fields.len() + 1);
        entries.push(wgpu::BindGroupEntry {
            binding: 0,
            resource: params.as_entire_binding(),
        });
        for (i, field) in fields.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: i as u32 + 1,
                resource: field.as_entire_binding(),
            });
        }

        checked(&self.device, "create_bind_group", || {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(entry),
                layout: &layout,
                entries: &entries,
            })
        })
    }

    /// Run `entry` once over the padded grid of `shape` and wait for it.
    pub fn dispatch(
        &self,
        entry: &str,
        bind_group: &wgpu::BindGroup,
        shape: &GridShape,
    ) -> Result<()> {
        let pipeline = self.pipeline(entry)?;
        let (x, y, z) = self.dispatch_size(shape)?;

        checked(&self.device, "dispatch_workgroups", || {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(entry) });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(entry),
                    timestamp_writes: None,
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.dispatch_workgroups(x, y, z);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        })?;

        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }
}

/// Work-group counts covering the padded grid of `shape` with `tile`.
pub fn dispatch_size(shape: &GridShape, tile: (u32, u32)) -> Result<(u32, u32, u32)> {
    let params = GridParams::from_shape(shape)?;
    let (wx, wy) = (tile.0.max(1), tile.1.max(1));
    Ok((
        params.padded_nx.div_ceil(wx),
        params.padded_ny.div_ceil(wy),
        1,
    ))
}
