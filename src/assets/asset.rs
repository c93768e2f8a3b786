//! Parsed asset description consumed by the binder.
//!
//! These types mirror what a glTF parser hands over after creating the GPU
//! buffer objects: an ordered list of buffer bindings plus the node/mesh graph
//! needed to derive tangent frames. The binder only reads them.

use std::sync::Arc;

use parking_lot::RwLock;
use wgpu::VertexFormat;

use crate::renderer::{IndexBufferHandle, VertexBufferHandle};

/// Caller-owned host memory that receives a synchronous copy.
pub type HostBuffer = Arc<RwLock<Vec<u8>>>;

/// Where the bytes of a [`BufferBinding`] go.
#[derive(Debug, Clone)]
pub enum BindingDestination {
    /// Asynchronous upload into one slot of a vertex buffer.
    Vertex {
        buffer: VertexBufferHandle,
        slot: usize,
    },
    /// Asynchronous upload into an index buffer.
    Index(IndexBufferHandle),
    /// Synchronous copy of animation keyframe data.
    Animation(HostBuffer),
    /// Synchronous copy of normal/tangent data, followed by the tangent pass.
    Orientation(HostBuffer),
}

/// Associates a byte range of a buffer URI with a destination.
#[derive(Debug, Clone)]
pub struct BufferBinding {
    pub uri: String,
    /// Byte offset into the loaded blob.
    pub offset: usize,
    /// Number of bytes to bind.
    pub size: usize,
    /// Declared size of the whole buffer, passed to the decoder. Zero means unknown.
    pub total_size: usize,
    /// `None` is a malformed binding.
    pub destination: Option<BindingDestination>,
}

impl BufferBinding {
    pub fn new(uri: impl Into<String>, offset: usize, size: usize) -> Self {
        Self {
            uri: uri.into(),
            offset,
            size,
            total_size: 0,
            destination: None,
        }
    }

    #[must_use]
    pub fn with_total_size(mut self, total_size: usize) -> Self {
        self.total_size = total_size;
        self
    }

    #[must_use]
    pub fn bind_vertex(mut self, buffer: VertexBufferHandle, slot: usize) -> Self {
        self.destination = Some(BindingDestination::Vertex { buffer, slot });
        self
    }

    #[must_use]
    pub fn bind_index(mut self, buffer: IndexBufferHandle) -> Self {
        self.destination = Some(BindingDestination::Index(buffer));
        self
    }

    #[must_use]
    pub fn bind_animation(mut self, target: HostBuffer) -> Self {
        self.destination = Some(BindingDestination::Animation(target));
        self
    }

    #[must_use]
    pub fn bind_orientation(mut self, target: HostBuffer) -> Self {
        self.destination = Some(BindingDestination::Orientation(target));
        self
    }

    #[inline]
    #[must_use]
    pub fn is_orientation(&self) -> bool {
        matches!(self.destination, Some(BindingDestination::Orientation(_)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    Position,
    Normal,
    Tangent,
    TexCoord(u32),
    Color(u32),
    Joints(u32),
    Weights(u32),
}

/// A byte window into a buffer.
#[derive(Debug, Clone)]
pub struct BufferView {
    /// URI of the buffer this view slices.
    pub uri: String,
    pub offset: usize,
    /// Byte stride between elements; `None` means tightly packed.
    pub stride: Option<usize>,
}

/// Typed access to the elements of a buffer view.
#[derive(Debug, Clone)]
pub struct Accessor {
    pub view: BufferView,
    /// Byte offset relative to the view.
    pub offset: usize,
    pub count: usize,
    pub format: VertexFormat,
}

impl Accessor {
    /// Byte offset of the first element from the start of the buffer.
    ///
    /// `None` if the view and accessor offsets overflow.
    #[inline]
    #[must_use]
    pub fn buffer_offset(&self) -> Option<usize> {
        self.view.offset.checked_add(self.offset)
    }

    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.view
            .stride
            .unwrap_or_else(|| self.format.size() as usize)
    }
}

#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub semantic: AttributeSemantic,
    pub accessor: Accessor,
}

#[derive(Debug, Clone, Default)]
pub struct Primitive {
    /// Attribute order defines the vertex buffer slot of each attribute.
    pub attributes: Vec<VertexAttribute>,
    pub vertex_buffer: Option<VertexBufferHandle>,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: Option<String>,
    /// Index into [`Asset::meshes`].
    pub mesh: Option<usize>,
}

/// A parsed asset ready for resource binding.
#[derive(Debug, Clone, Default)]
pub struct Asset {
    /// Processed in declaration order.
    pub bindings: Vec<BufferBinding>,
    /// Node map; its order is the traversal order of the tangent pass.
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
}

impl Asset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_orientation_bindings(&self) -> bool {
        self.bindings.iter().any(BufferBinding::is_orientation)
    }

    /// Meshes referenced by nodes, in node order.
    pub fn node_meshes(&self) -> impl Iterator<Item = &Mesh> {
        self.nodes
            .iter()
            .filter_map(|node| node.mesh.and_then(|index| self.meshes.get(index)))
    }
}
