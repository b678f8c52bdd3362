//! The disk-cache collaborator (SPEC_FULL.md §10.5): a hook the storage &
//! eviction component calls before it drops an image's decoded bytes, so a
//! host terminal can spill evicted images to disk instead of losing them
//! outright. The original has no such hook — eviction there just frees the
//! image — so a no-op default keeps that behavior available.

/// A read-only summary of the image being evicted, handed to
/// [`DiskCache::on_evict`] before the image itself is dropped.
#[derive(Clone, Copy, Debug)]
pub struct EvictedImage {
    pub internal_id: u64,
    pub client_id: u32,
    pub width: u32,
    pub height: u32,
    pub used_storage: usize,
}

/// Called by the storage component as it reclaims quota. Implementations
/// must not panic: this runs inside the eviction loop, ahead of freeing the
/// image's GPU texture and load buffer.
pub trait DiskCache {
    fn on_evict(&mut self, _image: &EvictedImage) {}
}

/// The default collaborator: evicted images are simply dropped, matching
/// the original's behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDiskCache;

impl DiskCache for NoopDiskCache {}
