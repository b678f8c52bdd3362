//! The GPU upload collaborator (spec §1: out of scope; specified only by the
//! interface the storage component calls into). A host terminal owns the
//! real renderer; this crate only ever sees it through [`GpuUploader`].

use crate::error::Error;

/// An opaque handle returned by [`GpuUploader::upload_texture`]. `NONE`
/// mirrors the original's convention of `0` meaning "not on the GPU".
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TextureId(pub u32);

impl TextureId {
    pub const NONE: Self = Self(0);

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl Default for TextureId {
    fn default() -> Self {
        Self::NONE
    }
}

/// Uploads decoded bitmaps to the GPU and frees them again. Implemented by
/// the host terminal's renderer; [`Config::gpu_uploads_enabled`](crate::config::Config::gpu_uploads_enabled)
/// lets a caller skip this entirely and keep decoded bitmaps resident in
/// memory instead, which is how this crate's own tests run.
pub trait GpuUploader {
    /// Uploads a fully decoded, row-major bitmap. `is_opaque` lets the
    /// uploader pick an opaque texture format; `is_4byte_aligned` reports
    /// whether each row starts on a 4-byte boundary (true for RGBA, and for
    /// RGB rows whose width happens to be a multiple of 4).
    fn upload_texture(
        &mut self,
        bitmap: &[u8],
        width: u32,
        height: u32,
        is_opaque: bool,
        is_4byte_aligned: bool,
    ) -> Result<TextureId, Error>;

    /// Releases a texture previously returned by `upload_texture`. Called
    /// from `Image`'s `Drop` impl, so it must not panic.
    fn free_texture(&mut self, id: TextureId);
}
