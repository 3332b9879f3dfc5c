use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::renderer::contexts::device_ctx::DeviceContext;
use crate::renderer::resources::object::GeometryObject;
use crate::renderer::resources::vertex::Vertex;
use crate::renderer::vk::buffer::AllocatedBuffer;

/// Room for 2048 vertices
pub const ARENA_CAPACITY: u64 = 2048 * Vertex::STRIDE as u64;

/// Where a registered object's vertices live inside the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaSlot {
    pub byte_offset: u64,
    pub byte_size: u64,
    pub first_vertex: u32,
}

/// Bump-allocation bookkeeping for the arena, tracked in bytes.
///
/// The free offset only ever grows, and always stays a multiple of the vertex stride so
/// `first_vertex` is exact.
#[derive(Debug, Clone)]
pub struct ArenaLayout {
    capacity: u64,
    stride: u64,
    free_offset: u64,
}

impl ArenaLayout {
    pub fn new(capacity: u64, stride: u32) -> Self {
        Self {
            capacity,
            stride: stride as u64,
            free_offset: 0,
        }
    }

    /// Computes the slot for `vertex_count` more vertices without claiming it
    pub fn next_slot(&self, vertex_count: u32) -> Result<ArenaSlot> {
        let byte_size = vertex_count as u64 * self.stride;
        let end = self.free_offset + byte_size;
        if end > self.capacity {
            return Err(eyre!(
                "Vertex arena overflow: {} bytes requested at offset {}, capacity {}",
                byte_size,
                self.free_offset,
                self.capacity,
            ));
        }

        Ok(ArenaSlot {
            byte_offset: self.free_offset,
            byte_size,
            first_vertex: (self.free_offset / self.stride) as u32,
        })
    }

    pub fn commit(&mut self, slot: ArenaSlot) {
        debug_assert_eq!(slot.byte_offset, self.free_offset);
        self.free_offset = slot.byte_offset + slot.byte_size;
    }

    #[cfg(test)]
    pub fn reserve(&mut self, vertex_count: u32) -> Result<ArenaSlot> {
        let slot = self.next_slot(vertex_count)?;
        self.commit(slot);
        Ok(slot)
    }

    pub fn used_bytes(&self) -> u64 {
        self.free_offset
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.capacity - self.free_offset
    }
}

/// Backing memory the arena copies vertex bytes into
pub trait ArenaStorage {
    fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;
    fn handle(&self) -> vk::Buffer;
}

impl ArenaStorage for AllocatedBuffer {
    fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.write(offset, bytes)
    }

    fn handle(&self) -> vk::Buffer {
        self.buffer
    }
}

pub struct DrawEntry {
    pub object: GeometryObject,
    pub first_vertex: u32,
}

impl DrawEntry {
    pub fn vertex_count(&self) -> u32 {
        self.object.vertex_count()
    }
}

/// One vertex buffer shared by every registered object, drawn in registration order
pub struct VertexArena<S: ArenaStorage = AllocatedBuffer> {
    storage: S,
    layout: ArenaLayout,
    entries: Vec<DrawEntry>,
}

impl VertexArena<AllocatedBuffer> {
    pub fn new(ctx: &DeviceContext) -> Result<Self> {
        let buffer = AllocatedBuffer::new(
            ARENA_CAPACITY,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            "vertex arena",
            &ctx.device.memory_properties,
            ctx.device.logical.clone(),
        )?;

        Ok(Self::with_storage(buffer, ARENA_CAPACITY))
    }
}

impl<S: ArenaStorage> VertexArena<S> {
    pub fn with_storage(storage: S, capacity: u64) -> Self {
        Self {
            storage,
            layout: ArenaLayout::new(capacity, Vertex::STRIDE),
            entries: Vec::new(),
        }
    }

    /// Copies the object's vertices to the next free range and queues it for drawing.
    ///
    /// On failure nothing is recorded and earlier entries are untouched.
    pub fn register(&mut self, object: GeometryObject) -> Result<&DrawEntry> {
        let slot = self.layout.next_slot(object.vertex_count())?;
        let bytes = object.as_bytes();
        debug_assert_eq!(bytes.len() as u64, slot.byte_size);

        self.storage.write_bytes(slot.byte_offset, bytes)?;
        self.layout.commit(slot);

        log::debug!(
            "Registered object with {} vertices at byte offset {} (first vertex {}); {} bytes used, {} left",
            object.vertex_count(),
            slot.byte_offset,
            slot.first_vertex,
            self.layout.used_bytes(),
            self.layout.remaining_bytes(),
        );

        self.entries.push(DrawEntry {
            object,
            first_vertex: slot.first_vertex,
        });
        self.entries.last().ok_or_else(|| eyre!("Draw list is empty after registration"))
    }

    pub fn entries(&self) -> &[DrawEntry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn layout(&self) -> &ArenaLayout {
        &self.layout
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.storage.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    /// Host-side stand-in for the mapped vertex buffer
    struct HostStorage {
        bytes: Vec<u8>,
        writes: Vec<(u64, usize)>,
    }

    impl HostStorage {
        fn new(capacity: u64) -> Self {
            Self {
                bytes: vec![0; capacity as usize],
                writes: Vec::new(),
            }
        }
    }

    impl ArenaStorage for HostStorage {
        fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
            let start = offset as usize;
            let end = start + bytes.len();
            if end > self.bytes.len() {
                return Err(eyre!("write out of range"));
            }
            self.bytes[start..end].copy_from_slice(bytes);
            self.writes.push((offset, bytes.len()));
            Ok(())
        }

        fn handle(&self) -> vk::Buffer {
            vk::Buffer::null()
        }
    }

    fn object_with(count: usize) -> GeometryObject {
        let points: Vec<Vec3> = (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        GeometryObject::curve(&points, Vec4::ONE)
    }

    fn host_arena() -> VertexArena<HostStorage> {
        VertexArena::with_storage(HostStorage::new(ARENA_CAPACITY), ARENA_CAPACITY)
    }

    #[test]
    fn capacity_is_64_kib() {
        assert_eq!(ARENA_CAPACITY, 64 * 1024);
        assert_eq!(ARENA_CAPACITY / Vertex::STRIDE as u64, 2048);
    }

    #[test]
    fn first_vertices_follow_registration_order() {
        let mut arena = host_arena();
        let firsts: Vec<u32> = [3, 4, 5]
            .into_iter()
            .map(|n| arena.register(object_with(n)).unwrap().first_vertex)
            .collect();

        assert_eq!(firsts, vec![0, 3, 7]);
        assert_eq!(arena.layout().used_bytes(), 12 * 32);
        assert_eq!(arena.storage.writes, vec![(0, 96), (96, 128), (224, 160)]);
    }

    #[test]
    fn copied_bytes_match_offset_advance() {
        let mut arena = host_arena();
        for n in [1, 2, 7, 16, 0, 5] {
            let before = arena.layout().used_bytes();
            arena.register(object_with(n)).unwrap();
            let advance = arena.layout().used_bytes() - before;
            assert_eq!(advance, n as u64 * Vertex::STRIDE as u64);
            assert_eq!(advance % Vertex::STRIDE as u64, 0);
        }
        let copied: usize = arena.storage.writes.iter().map(|(_, len)| len).sum();
        assert_eq!(copied as u64, arena.layout().used_bytes());
    }

    #[test]
    fn registered_bytes_land_at_their_offset() {
        let mut arena = host_arena();
        arena.register(object_with(2)).unwrap();
        let second = object_with(3);
        let expected = second.as_bytes().to_vec();
        let first_vertex = arena.register(second).unwrap().first_vertex;

        let start = first_vertex as usize * Vertex::STRIDE as usize;
        assert_eq!(&arena.storage.bytes[start..start + expected.len()], expected.as_slice());
    }

    #[test]
    fn exactly_full_arena_is_accepted() {
        let mut arena = host_arena();
        arena.register(object_with(2047)).unwrap();
        arena.register(object_with(1)).unwrap();
        assert_eq!(arena.layout().remaining_bytes(), 0);
    }

    #[test]
    fn overflow_leaves_earlier_entries_intact() {
        let mut arena = host_arena();
        arena.register(object_with(2000)).unwrap();
        let snapshot = arena.storage.bytes.clone();

        assert!(arena.register(object_with(100)).is_err());

        assert_eq!(arena.entries().len(), 1);
        assert_eq!(arena.entries()[0].first_vertex, 0);
        assert_eq!(arena.entries()[0].vertex_count(), 2000);
        assert_eq!(arena.layout().used_bytes(), 2000 * 32);
        assert_eq!(arena.storage.bytes, snapshot);

        // Space that still fits is still usable
        assert_eq!(arena.register(object_with(48)).unwrap().first_vertex, 2000);
    }

    #[test]
    fn layout_reserve_rejects_without_advancing() {
        let mut layout = ArenaLayout::new(256, 32);
        assert_eq!(layout.reserve(3).unwrap().byte_offset, 0);
        assert!(layout.reserve(6).is_err());
        assert_eq!(layout.used_bytes(), 96);
        let slot = layout.reserve(5).unwrap();
        assert_eq!(slot, ArenaSlot { byte_offset: 96, byte_size: 160, first_vertex: 3 });
    }
}
