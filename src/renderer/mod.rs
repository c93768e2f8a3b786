//! GPU upload backends.
//!
//! - [`BufferUploader`]: the asynchronous vertex/index upload entry points
//! - [`StagingUploader`]: worker-thread backend keeping uploads in host memory
//! - [`WgpuUploader`]: backend writing into `wgpu::Buffer`s

pub mod gpu;
pub mod staging;
pub mod upload;

pub use gpu::WgpuUploader;
pub use staging::StagingUploader;
pub use upload::{BufferDescriptor, BufferUploader, IndexBufferHandle, VertexBufferHandle};
