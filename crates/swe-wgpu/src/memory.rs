//! Device buffers holding grid fields.

use std::sync::Arc;

use swe_core::{FieldInfo, GridShape};
use wgpu::util::DeviceExt;

use crate::error::{DeviceError, Result};

/// Grid parameters uniform (must match `GridParams` in the WGSL kernels).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridParams {
    /// Interior cells in x.
    pub nx: u32,
    /// Interior cells in y.
    pub ny: u32,
    /// Ghost margin.
    pub ghost: u32,
    /// Row stride of the padded buffer.
    pub padded_nx: u32,
    /// Padded rows.
    pub padded_ny: u32,
    /// Cell width.
    pub dx: f32,
    /// Cell height.
    pub dy: f32,
    _pad: u32,
}

impl GridParams {
    /// Parameters describing `shape`.
    ///
    /// Fails with [`DeviceError::BufferSize`] if the padded grid cannot be
    /// indexed with `u32`.
    pub fn from_shape(shape: &GridShape) -> Result<Self> {
        if !shape.is_addressable() {
            return Err(DeviceError::BufferSize {
                shape: shape.to_string(),
            });
        }
        let dim = |v: usize| {
            u32::try_from(v).map_err(|_| DeviceError::BufferSize {
                shape: shape.to_string(),
            })
        };

        Ok(Self {
            nx: dim(shape.nx())?,
            ny: dim(shape.ny())?,
            ghost: dim(shape.ghost())?,
            padded_nx: dim(shape.padded_nx())?,
            padded_ny: dim(shape.padded_ny())?,
            dx: shape.dx(),
            dy: shape.dy(),
            _pad: 0,
        })
    }
}

/// A grid field resident on the device.
pub struct FieldBuffer {
    buffer: wgpu::Buffer,
    shape: GridShape,
    size: u64,
}

impl FieldBuffer {
    /// Create a storage buffer initialised with the padded contents of `field`.
    pub(crate) fn upload(device: &wgpu::Device, field: &FieldInfo, label: &str) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: field.as_bytes(),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });

        Self {
            buffer,
            shape: field.shape(),
            size: field.as_bytes().len() as u64,
        }
    }

    /// Create a zero-filled storage buffer for `shape`.
    pub(crate) fn zeroed(device: &wgpu::Device, shape: &GridShape, label: &str) -> Self {
        let size = (shape.len() * std::mem::size_of::<f32>()) as u64;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            shape: *shape,
            size,
        }
    }

    /// Read the buffer back into a new host field of the same shape.
    pub(crate) fn download(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<FieldInfo> {
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Field Staging"),
            size: self.size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Field Readback"),
        });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, self.size);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| DeviceError::Transfer(format!("Channel error: {}", e)))?
            .map_err(|e| DeviceError::Transfer(format!("Map error: {}", e)))?;

        let mapped = slice.get_mapped_range();
        let values: Vec<f32> = bytemuck::cast_slice(&mapped).to_vec();
        drop(mapped);
        staging.unmap();

        FieldInfo::wrap(self.shape, Arc::new(values))
            .map_err(|e| DeviceError::Transfer(e.to_string()))
    }

    /// Shape of the stored field.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the underlying wgpu buffer.
    pub fn inner(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Create a binding for this buffer.
    pub fn as_entire_binding(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_layout() {
        // Uniform buffers need a size that is a multiple of 16 bytes.
        assert_eq!(std::mem::size_of::<GridParams>(), 32);
    }

    #[test]
    fn test_params_from_shape() {
        let shape = GridShape::new(100, 50, 10.0, 20.0);
        let params = GridParams::from_shape(&shape).unwrap();
        assert_eq!(params.nx, 100);
        assert_eq!(params.ny, 50);
        assert_eq!(params.ghost, swe_core::GHOST_CELLS as u32);
        assert_eq!(params.padded_nx, 104);
        assert_eq!(params.padded_ny, 54);
        assert_eq!(params.dx, 10.0);
    }

    #[test]
    fn test_params_reject_unaddressable_grid() {
        let shape = GridShape::new(70_000, 70_000, 1.0, 1.0);
        let err = GridParams::from_shape(&shape).unwrap_err();
        assert!(matches!(err, DeviceError::BufferSize { .. }));
        assert_eq!(err.diagnostic(), "'create_buffer' returned -61");
    }
}
