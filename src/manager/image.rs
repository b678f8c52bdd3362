//! The `Image` and placement (`ImageRef`) data model (spec §3 DATA MODEL).
//!
//! The original keeps a `void *load_data` that is, depending on a separate
//! `is_4byte_aligned`/mmap bookkeeping pair, either a `malloc`'d buffer or an
//! `mmap`'d region — invariant 5 ("never both") is enforced by convention
//! only. Here it's enforced by construction: [`LoadBytes`] is a closed enum,
//! so an `Image` simply cannot hold both at once.

use std::rc::Rc;
use std::cell::RefCell;
use std::thread::panicking;
use std::time::Instant;

use crate::gpu::{GpuUploader, TextureId};
use crate::math::EdgeRect;

/// Identifies an `Image` for the lifetime of the `GraphicsManager` that
/// created it, stable across `Vec` reshuffles caused by eviction/removal
/// (spec §9 redesign note: never index by raw pointer or array slot).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct InternalId(pub(crate) u64);

/// Decoded (or still-assembling) pixel bytes, owned exactly one of two ways.
pub(crate) enum LoadBytes {
    /// No bytes held right now — either nothing has arrived yet, or the
    /// bitmap was handed off to the GPU and dropped.
    Empty,
    /// Accumulated from one or more direct-transmission chunks, or a fully
    /// decoded bitmap kept resident because GPU uploads are disabled.
    Owned(Vec<u8>),
    /// Backed by a file mapping (`t=f`/`t=t`); unmapped automatically when
    /// this variant is dropped.
    Mapped(memmap2::Mmap),
    /// Backed by a POSIX shared-memory segment (`t=s`); unlinked
    /// automatically when this variant is dropped (its `set_owner(true)`
    /// is set at open time so the OS resource is released with it, matching
    /// the original's immediate `shm_unlink` after mapping).
    Shm(shared_memory::Shmem),
}

impl LoadBytes {
    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            Self::Empty => &[],
            Self::Owned(buf) => buf,
            Self::Mapped(mmap) => mmap,
            Self::Shm(shmem) => unsafe { std::slice::from_raw_parts(shmem.as_ptr(), shmem.len()) },
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.as_slice().len()
    }
}

/// Staging/decoded state for one image's payload (invariant 5: a buffer and
/// a mapping never coexist).
pub(crate) struct LoadData {
    pub(crate) bytes: LoadBytes,
    pub(crate) expected_size: usize,
    pub(crate) is_opaque: bool,
    pub(crate) is_4byte_aligned: bool,
}

impl Default for LoadData {
    fn default() -> Self {
        Self {
            bytes: LoadBytes::Empty,
            expected_size: 0,
            is_opaque: true,
            is_4byte_aligned: true,
        }
    }
}

/// A GPU texture handle, released automatically via `free_texture` when
/// dropped — the same "ownership releases the resource" idiom the original
/// approximates manually with `free_image`, generalized to a real `Drop`.
pub(crate) struct GpuTexture {
    gpu: Rc<RefCell<dyn GpuUploader>>,
    id: TextureId,
}

impl GpuTexture {
    pub(crate) fn new(gpu: Rc<RefCell<dyn GpuUploader>>, id: TextureId) -> Self {
        Self { gpu, id }
    }

    pub(crate) fn id(&self) -> TextureId {
        self.id
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        if panicking() {
            return;
        }
        self.gpu.borrow_mut().free_texture(self.id);
    }
}

/// One placement: a reference from a region of an image onto the terminal's
/// cell grid (spec §3, `ImageRef`).
#[derive(Clone, Debug, Default)]
pub struct ImageRef {
    /// 0 means "anonymous" (not independently addressable by id).
    pub placement_id: u32,
    pub src_x: u32,
    pub src_y: u32,
    pub src_width: u32,
    pub src_height: u32,
    pub z_index: i32,
    pub start_row: i32,
    pub start_column: i32,
    /// Requested span in cells; 0 means "derive from the crop rect".
    pub num_cols: u32,
    pub num_rows: u32,
    pub cell_x_offset: u32,
    pub cell_y_offset: u32,
    /// The span actually used for layout and for cursor advancement
    /// (invariant 8: `effective_num_rows >= 1`).
    pub effective_num_cols: u32,
    pub effective_num_rows: u32,
    /// The crop rectangle normalized into `[0, 1]` texture space, recomputed
    /// whenever the image's pixel size or the crop rectangle changes.
    pub src_rect: EdgeRect,
}

impl ImageRef {
    /// `true` once this placement has been positioned at least once and is
    /// eligible to be rendered/scrolled (mirrors the original's check for a
    /// nonzero `effective_num_rows`).
    pub fn is_positioned(&self) -> bool {
        self.effective_num_rows > 0
    }
}

/// One transmitted image: its pixels (or in-progress assembly state), its
/// client-facing identity, and every placement referencing it.
pub struct Image {
    pub(crate) internal_id: InternalId,
    /// 0 means "never assigned" (query-only transmissions stay at 0).
    pub(crate) client_id: u32,
    /// 0 means "not given"; multiple images may legally share one number,
    /// only the newest is addressable by it (spec §4.2).
    pub(crate) client_number: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) texture: Option<GpuTexture>,
    pub(crate) atime: Instant,
    pub(crate) used_storage: usize,
    pub(crate) data_loaded: bool,
    pub(crate) load: LoadData,
    pub(crate) refs: Vec<ImageRef>,
}

impl Image {
    pub(crate) fn new(internal_id: InternalId) -> Self {
        Self {
            internal_id,
            client_id: 0,
            client_number: 0,
            width: 0,
            height: 0,
            texture: None,
            atime: Instant::now(),
            used_storage: 0,
            data_loaded: false,
            load: LoadData::default(),
            refs: Vec::new(),
        }
    }

    pub fn internal_id(&self) -> InternalId {
        self.internal_id
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn client_number(&self) -> u32 {
        self.client_number
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data_loaded(&self) -> bool {
        self.data_loaded
    }

    pub fn texture_id(&self) -> TextureId {
        self.texture.as_ref().map_or(TextureId::NONE, GpuTexture::id)
    }

    pub fn used_storage(&self) -> usize {
        self.used_storage
    }

    pub(crate) fn atime(&self) -> Instant {
        self.atime
    }

    /// The decoded bitmap, if still resident (either GPU uploads are
    /// disabled, or this is still mid-assembly).
    pub fn data(&self) -> &[u8] {
        self.load.bytes.as_slice()
    }

    pub fn placement_count(&self) -> usize {
        self.refs.len()
    }

    pub(crate) fn touch(&mut self) {
        self.atime = Instant::now();
    }
}

/// A read-only view returned by `image_by_client_id`/`image_by_client_number`
/// (spec §6, mirroring the original's `image_as_dict`).
pub struct ImageView<'a> {
    image: &'a Image,
}

impl<'a> ImageView<'a> {
    pub(crate) fn new(image: &'a Image) -> Self {
        Self { image }
    }

    pub fn internal_id(&self) -> InternalId {
        self.image.internal_id
    }

    pub fn client_id(&self) -> u32 {
        self.image.client_id
    }

    pub fn client_number(&self) -> u32 {
        self.image.client_number
    }

    pub fn width(&self) -> u32 {
        self.image.width
    }

    pub fn height(&self) -> u32 {
        self.image.height
    }

    pub fn data_loaded(&self) -> bool {
        self.image.data_loaded
    }

    pub fn texture_id(&self) -> TextureId {
        self.image.texture_id()
    }

    pub fn placement_count(&self) -> usize {
        self.image.refs.len()
    }

    pub fn data(&self) -> &[u8] {
        self.image.data()
    }
}
