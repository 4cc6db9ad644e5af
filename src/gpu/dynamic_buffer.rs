//! Growable GPU buffer backing a vertex-buffer mirror.
//!
//! Allocations can be resized on the CPU side, so the GPU copy grows on
//! demand with a 2x strategy instead of being recreated for every upload.

/// A GPU buffer that can grow dynamically.
///
/// Never shrinks (GPU buffers cannot be resized in place).
pub struct DynamicBuffer {
    buffer: wgpu::Buffer,
    capacity: usize, // Capacity in bytes
    usage: wgpu::BufferUsages,
    label: String,
}

impl DynamicBuffer {
    /// Buffer with the given initial byte capacity.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        initial_capacity: usize,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let capacity = aligned_capacity(initial_capacity.max(64));
        let buffer = create(device, label, capacity, usage);
        Self {
            buffer,
            capacity,
            usage,
            label: label.to_owned(),
        }
    }

    /// Replace the contents with `data`, growing if necessary.
    ///
    /// Returns `true` if the buffer was reallocated (bind groups need
    /// recreation).
    pub fn write_bytes(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[u8],
    ) -> bool {
        let needed = data.len();

        let reallocated = if needed > self.capacity {
            let new_capacity =
                aligned_capacity((needed * 2).max(self.capacity + 1024));
            self.buffer = create(device, &self.label, new_capacity, self.usage);
            self.capacity = new_capacity;
            log::debug!("{}: grew to {new_capacity} bytes", self.label);
            true
        } else {
            false
        };

        // write_buffer requires a multiple of COPY_BUFFER_ALIGNMENT
        let aligned = needed - needed % wgpu::COPY_BUFFER_ALIGNMENT as usize;
        if aligned > 0 {
            queue.write_buffer(&self.buffer, 0, &data[..aligned]);
        }
        if aligned < needed {
            let mut tail = [0u8; wgpu::COPY_BUFFER_ALIGNMENT as usize];
            tail[..needed - aligned].copy_from_slice(&data[aligned..]);
            queue.write_buffer(&self.buffer, aligned as u64, &tail);
        }
        reallocated
    }

    /// The underlying GPU buffer.
    #[must_use]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

fn aligned_capacity(bytes: usize) -> usize {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    bytes.div_ceil(align) * align
}

fn create(
    device: &wgpu::Device,
    label: &str,
    capacity: usize,
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: capacity as u64,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_to_copy_alignment() {
        assert_eq!(aligned_capacity(64), 64);
        assert_eq!(aligned_capacity(65), 68);
        assert_eq!(aligned_capacity(1), 4);
    }
}
