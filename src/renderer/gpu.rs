//! wgpu upload backend.
//!
//! Each vertex buffer slot and each index buffer owns one `wgpu::Buffer`,
//! (re)allocated on upload when the incoming data does not fit. Writes go
//! through `Queue::write_buffer`; the descriptor (and with it the completion
//! ticket) is held until the queue reports the submission finished.

use parking_lot::RwLock;
use slotmap::SlotMap;

use super::upload::{BufferDescriptor, BufferUploader, IndexBufferHandle, VertexBufferHandle};

struct GpuSlot {
    buffer: wgpu::Buffer,
    size: u64,
}

struct GpuVertexBuffer {
    label: String,
    slots: Vec<Option<GpuSlot>>,
}

struct GpuIndexBuffer {
    label: String,
    slot: Option<GpuSlot>,
}

/// [`BufferUploader`] backed by a `wgpu` device and queue.
///
/// Vertex buffers are created with a fixed number of attribute slots, and each
/// slot gets its own `wgpu::Buffer` on first upload. Call [`Self::poll`] (or
/// poll the device elsewhere) so completion callbacks run and the resource
/// cache can be released.
pub struct WgpuUploader {
    device: wgpu::Device,
    queue: wgpu::Queue,
    vertex_buffers: RwLock<SlotMap<VertexBufferHandle, GpuVertexBuffer>>,
    index_buffers: RwLock<SlotMap<IndexBufferHandle, GpuIndexBuffer>>,
}

impl WgpuUploader {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            vertex_buffers: RwLock::default(),
            index_buffers: RwLock::default(),
        }
    }

    pub fn create_vertex_buffer(&self, label: &str, slot_count: usize) -> VertexBufferHandle {
        let mut slots = Vec::with_capacity(slot_count);
        slots.resize_with(slot_count, || None);
        self.vertex_buffers.write().insert(GpuVertexBuffer {
            label: label.to_string(),
            slots,
        })
    }

    pub fn create_index_buffer(&self, label: &str) -> IndexBufferHandle {
        self.index_buffers.write().insert(GpuIndexBuffer {
            label: label.to_string(),
            slot: None,
        })
    }

    #[must_use]
    pub fn vertex_buffer(&self, buffer: VertexBufferHandle, slot: usize) -> Option<wgpu::Buffer> {
        let buffers = self.vertex_buffers.read();
        let gpu_slot = buffers.get(buffer)?.slots.get(slot)?.as_ref()?;
        Some(gpu_slot.buffer.clone())
    }

    #[must_use]
    pub fn index_buffer(&self, buffer: IndexBufferHandle) -> Option<wgpu::Buffer> {
        let buffers = self.index_buffers.read();
        Some(buffers.get(buffer)?.slot.as_ref()?.buffer.clone())
    }

    /// Drives completion callbacks without blocking.
    pub fn poll(&self) {
        if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("Device poll failed: {err}");
        }
    }

    fn write_slot(
        &self,
        slot: &mut Option<GpuSlot>,
        label: &str,
        usage: wgpu::BufferUsages,
        data: &[u8],
    ) {
        let padded_len = padded_len(data.len());
        if padded_len == 0 {
            return;
        }

        let needs_alloc = slot.as_ref().is_none_or(|s| s.size < padded_len);
        if needs_alloc {
            if let Some(old) = slot.take() {
                old.buffer.destroy();
            }
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: padded_len,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            *slot = Some(GpuSlot {
                buffer,
                size: padded_len,
            });
        }

        if let Some(gpu_slot) = slot.as_ref() {
            if padded_len == data.len() as u64 {
                self.queue.write_buffer(&gpu_slot.buffer, 0, data);
            } else {
                let mut padded = data.to_vec();
                padded.resize(padded_len as usize, 0);
                self.queue.write_buffer(&gpu_slot.buffer, 0, &padded);
            }
        }
    }

    /// Flushes staged writes and completes `descriptor` once the GPU is done with them.
    fn finish(&self, descriptor: BufferDescriptor) {
        self.queue.submit(std::iter::empty::<wgpu::CommandBuffer>());
        self.queue.on_submitted_work_done(move || descriptor.complete());
    }
}

impl BufferUploader for WgpuUploader {
    fn set_vertex_buffer_at(&self, buffer: VertexBufferHandle, slot: usize, descriptor: BufferDescriptor) {
        {
            let mut buffers = self.vertex_buffers.write();
            let Some(vb) = buffers.get_mut(buffer) else {
                log::error!("Vertex upload to unknown buffer {buffer:?}");
                return;
            };
            let label = format!("{}[{slot}]", vb.label);
            let Some(gpu_slot) = vb.slots.get_mut(slot) else {
                log::error!("Vertex upload to slot {slot} of {}, which has {} slots", vb.label, vb.slots.len());
                return;
            };
            self.write_slot(gpu_slot, &label, wgpu::BufferUsages::VERTEX, descriptor.as_bytes());
        }
        self.finish(descriptor);
    }

    fn set_index_buffer(&self, buffer: IndexBufferHandle, descriptor: BufferDescriptor) {
        {
            let mut buffers = self.index_buffers.write();
            let Some(ib) = buffers.get_mut(buffer) else {
                log::error!("Index upload to unknown buffer {buffer:?}");
                return;
            };
            let label = ib.label.clone();
            self.write_slot(&mut ib.slot, &label, wgpu::BufferUsages::INDEX, descriptor.as_bytes());
        }
        self.finish(descriptor);
    }
}

/// Rounds a write up to `COPY_BUFFER_ALIGNMENT`, as `Queue::write_buffer` requires.
fn padded_len(len: usize) -> u64 {
    (len as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
}
