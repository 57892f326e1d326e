use std::sync::Arc;

use zsd_ctypes::view::share;
use zsd_ctypes::{MemoryInstance, StructLayout, ViewError};
use zsd_module::{Address, ForeignModule, NULL};

use crate::error::DecompressError;

/// A struct allocated on the foreign heap.
///
/// The handle carries the layout it was sized for, so a view over it
/// can be materialized at any time with [`Session::instance`].
#[derive(Clone, Debug)]
pub struct Allocation {
    address: Address,
    layout: Arc<StructLayout>,
}

impl Allocation {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn layout(&self) -> &Arc<StructLayout> {
        &self.layout
    }
}

/// A raw byte region on the foreign heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub address: Address,
    pub len: u32,
}

impl Region {
    /// The first `len` bytes of this region.
    #[must_use]
    pub fn prefix(self, len: u32) -> Self {
        Self {
            address: self.address,
            len: len.min(self.len),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Owned {
    Block(Address),
    Context(Address),
}

/// Scoped ownership of foreign resources.
///
/// Everything a session allocates (heap blocks and codec contexts) is
/// released exactly once: by [`release_all`](Self::release_all), or by
/// `Drop` if the session goes away first. Release runs in reverse
/// allocation order.
///
/// ```text
///   Session::new ──► allocate / allocate_bytes / create_context ──► ...
///        │                                                          │
///        └──────────── release_all() or drop ◄──────────────────────┘
///                      (free in reverse order, once)
/// ```
pub struct Session<'m, M: ForeignModule> {
    module: &'m mut M,
    owned: Vec<Owned>,
}

impl<'m, M: ForeignModule> Session<'m, M> {
    pub fn new(module: &'m mut M) -> Self {
        Self {
            module,
            owned: Vec::new(),
        }
    }

    /// Allocate a zeroed instance of `layout` on the foreign heap.
    ///
    /// # Errors
    ///
    /// - [`DecompressError::OutOfMemory`] if the foreign allocator fails.
    /// - [`DecompressError::InputTooLarge`] if the layout does not fit a
    ///   32-bit size.
    pub fn allocate(&mut self, layout: &Arc<StructLayout>) -> Result<Allocation, DecompressError> {
        let len = u32::try_from(layout.size())
            .map_err(|_| DecompressError::InputTooLarge { len: layout.size() })?;
        let region = self.allocate_bytes(len)?;
        self.bytes_mut(region)?.fill(0);
        Ok(Allocation {
            address: region.address,
            layout: Arc::clone(layout),
        })
    }

    /// Allocate `len` uninitialized bytes on the foreign heap.
    ///
    /// # Errors
    ///
    /// [`DecompressError::OutOfMemory`] if the foreign allocator fails.
    pub fn allocate_bytes(&mut self, len: u32) -> Result<Region, DecompressError> {
        let address = self.module.malloc(len);
        if address == NULL {
            tracing::debug!(len, "foreign malloc failed");
            return Err(DecompressError::OutOfMemory { requested: len });
        }
        self.owned.push(Owned::Block(address));
        tracing::debug!(address, len, "session allocated");
        Ok(Region { address, len })
    }

    /// Create a streaming context owned by this session.
    ///
    /// # Errors
    ///
    /// [`DecompressError::Stream`] if the codec cannot create one.
    pub fn create_context(&mut self) -> Result<Address, DecompressError> {
        let context = self.module.create_dctx();
        if context == NULL {
            return Err(DecompressError::Stream("cannot create a decompression context"));
        }
        self.owned.push(Owned::Context(context));
        tracing::debug!(context, "session created codec context");
        Ok(context)
    }

    /// Materialize a view over an allocation, backed by foreign memory.
    ///
    /// The view borrows the session, so it cannot outlive a codec call:
    /// re-materialize after every call to observe what the codec wrote.
    ///
    /// # Errors
    ///
    /// [`ViewError::OutOfBounds`] if the allocation is not mapped.
    pub fn instance<'s>(
        &'s mut self,
        allocation: &'s Allocation,
    ) -> Result<MemoryInstance<'s>, ViewError> {
        let cells = share(self.module.memory_mut());
        MemoryInstance::new(&allocation.layout, cells, allocation.address as usize)
    }

    /// # Errors
    ///
    /// [`DecompressError::RegionUnmapped`] if the region is outside memory.
    pub fn bytes(&self, region: Region) -> Result<&[u8], DecompressError> {
        let start = region.address as usize;
        self.module
            .memory()
            .get(start..start + region.len as usize)
            .ok_or(DecompressError::RegionUnmapped {
                address: region.address,
                len: region.len,
            })
    }

    /// # Errors
    ///
    /// [`DecompressError::RegionUnmapped`] if the region is outside memory.
    pub fn bytes_mut(&mut self, region: Region) -> Result<&mut [u8], DecompressError> {
        let start = region.address as usize;
        self.module
            .memory_mut()
            .get_mut(start..start + region.len as usize)
            .ok_or(DecompressError::RegionUnmapped {
                address: region.address,
                len: region.len,
            })
    }

    /// Copy as much of `data` as fits into `region`, returning the count.
    ///
    /// # Errors
    ///
    /// [`DecompressError::RegionUnmapped`] if the region is outside memory.
    pub fn write(&mut self, region: Region, data: &[u8]) -> Result<u32, DecompressError> {
        let target = self.bytes_mut(region)?;
        let n = target.len().min(data.len());
        target[..n].copy_from_slice(&data[..n]);
        // n <= region.len, which is a u32.
        #[allow(clippy::cast_possible_truncation)]
        let written = n as u32;
        Ok(written)
    }

    pub fn module(&self) -> &M {
        &*self.module
    }

    pub fn module_mut(&mut self) -> &mut M {
        &mut *self.module
    }

    /// Resources still held.
    pub fn outstanding(&self) -> usize {
        self.owned.len()
    }

    /// Release every resource, newest first. Calling it again is a no-op.
    pub fn release_all(&mut self) {
        if self.owned.is_empty() {
            return;
        }
        let (mut blocks, mut contexts) = (0usize, 0usize);
        while let Some(owned) = self.owned.pop() {
            match owned {
                Owned::Block(address) => {
                    self.module.free(address);
                    blocks += 1;
                }
                Owned::Context(context) => {
                    let status = self.module.free_dctx(context);
                    if self.module.is_error(status) {
                        tracing::warn!(
                            context,
                            error = self.module.error_name(status),
                            "codec context release failed"
                        );
                    }
                    contexts += 1;
                }
            }
        }
        tracing::debug!(blocks, contexts, "session released");
    }
}

impl<M: ForeignModule> Drop for Session<'_, M> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<M: ForeignModule> std::fmt::Debug for Session<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("owned", &self.owned)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use zsd_ctypes::PrimitiveKind;
    use zsd_module::{ForeignHeap, ModuleConfig, NativeModule};

    fn module() -> NativeModule {
        NativeModule::instantiate(&ModuleConfig::default()).unwrap()
    }

    fn header() -> Arc<StructLayout> {
        StructLayout::builder("header")
            .field("tag", PrimitiveKind::U8)
            .array("samples", PrimitiveKind::F32, 4)
            .build_shared()
            .unwrap()
    }

    #[test]
    fn views_write_through_to_foreign_memory() {
        let mut module = module();
        let layout = header();
        let mut session = Session::new(&mut module);
        let allocation = session.allocate(&layout).unwrap();
        {
            let instance = session.instance(&allocation).unwrap();
            instance.scalar::<u8>("tag").unwrap().set(0xAA);
            instance.array::<f32>("samples").unwrap().set(2, 1.5).unwrap();
        }

        let base = allocation.address() as usize;
        let memory = session.module().memory();
        assert_eq!(memory[base], 0xAA);
        assert_eq!(&memory[base + 12..base + 16], &1.5f32.to_le_bytes());
    }

    #[test]
    fn allocations_start_zeroed() {
        let mut module = module();
        let layout = header();
        let address = {
            let mut session = Session::new(&mut module);
            let allocation = session.allocate(&layout).unwrap();
            session.instance(&allocation).unwrap().scalar::<u8>("tag").unwrap().set(9);
            allocation.address()
        };

        let mut session = Session::new(&mut module);
        let allocation = session.allocate(&layout).unwrap();
        assert_eq!(allocation.address(), address);
        assert!(session.instance(&allocation).unwrap().to_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn drop_releases_everything() {
        let mut module = module();
        let baseline = module.stats();
        {
            let mut session = Session::new(&mut module);
            session.allocate_bytes(1000).unwrap();
            session.create_context().unwrap();
            session.allocate(&header()).unwrap();
            assert_eq!(session.outstanding(), 3);
        }
        assert_eq!(module.stats(), baseline);
        assert_eq!(module.live_contexts(), 0);
    }

    #[traced_test]
    #[test]
    fn release_all_runs_once() {
        let mut module = module();
        let mut session = Session::new(&mut module);
        session.allocate_bytes(64).unwrap();
        session.create_context().unwrap();
        session.release_all();
        session.release_all();
        assert_eq!(session.outstanding(), 0);
        drop(session);

        assert!(logs_contain("blocks=1 contexts=1"));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("session released")).count() {
                1 => Ok(()),
                n => Err(format!("expected one release, saw {n}")),
            }
        });
        assert!(!logs_contain("release failed"));
    }

    #[test]
    fn failed_allocation_is_reported() {
        let config = ModuleConfig {
            initial_pages: 1,
            maximum_pages: 1,
        };
        let mut module = NativeModule::instantiate(&config).unwrap();
        let mut session = Session::new(&mut module);
        assert!(matches!(
            session.allocate_bytes(1 << 20),
            Err(DecompressError::OutOfMemory { requested: 1_048_576 })
        ));
        assert_eq!(session.outstanding(), 0);
    }

    #[test]
    fn write_truncates_to_region() {
        let mut module = module();
        let mut session = Session::new(&mut module);
        let region = session.allocate_bytes(4).unwrap();
        assert_eq!(session.write(region, b"abcdef").unwrap(), 4);
        assert_eq!(session.bytes(region).unwrap(), b"abcd");
        assert_eq!(session.bytes(region.prefix(2)).unwrap(), b"ab");
    }
}
