//! The parsed graphics-protocol command record (spec §6 EXTERNAL
//! INTERFACES). Parsing the wire's key=value,base64 escape sequence into
//! this struct is out of scope (spec §1 non-goal); a host terminal builds
//! one of these per command and hands it to
//! [`GraphicsManager::handle_command`](crate::manager::GraphicsManager::handle_command)
//! along with the raw (already base64-decoded) payload bytes.

use crate::math::Extent;

/// The `a` key: what the command asks the manager to do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// `a=t`, or `a` omitted entirely — transmit image data.
    Transmit,
    /// `a=T` — transmit, then immediately create a placement.
    TransmitAndDisplay,
    /// `a=q` — transmit, validate, but never retain the result.
    Query,
    /// `a=p` — create a placement for an already-transmitted image.
    Put,
    /// `a=d` — delete placements and/or images.
    Delete,
}

impl Default for Action {
    fn default() -> Self {
        Self::Transmit
    }
}

/// The `t` key: where the payload bytes are coming from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransmissionType {
    /// `t=d`, or `t` omitted — payload arrives inline, base64-encoded,
    /// across one or more chunks.
    Direct,
    /// `t=f` — payload is read from a file path given as the payload.
    File,
    /// `t=t` — like `t=f`, but the file is unlinked after reading.
    TempFile,
    /// `t=s` — payload is read from a POSIX shared-memory segment named by
    /// the payload.
    SharedMemory,
}

impl Default for TransmissionType {
    fn default() -> Self {
        Self::Direct
    }
}

/// The `f` key: the pixel format of the (post-decompression) payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageFormat {
    /// `f=24` — 3 bytes per pixel, no alpha.
    Rgb,
    /// `f=32`, or `f` omitted — 4 bytes per pixel, alpha included.
    Rgba,
    /// `f=100` — PNG-encoded; decoded to RGB or RGBA internally.
    Png,
}

impl Default for ImageFormat {
    fn default() -> Self {
        Self::Rgba
    }
}

impl ImageFormat {
    /// Bytes per pixel for the two raw formats. PNG has no fixed value —
    /// the decoder learns it from the decoded image instead.
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            Self::Rgb => Some(3),
            Self::Rgba => Some(4),
            Self::Png => None,
        }
    }
}

/// The `o` key: compression applied to the payload before transmission.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    None,
    /// `o=z` — zlib-wrapped deflate.
    Zlib,
}

impl Default for Compression {
    fn default() -> Self {
        Self::None
    }
}

/// The `q` key: how much the client wants to hear back.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Quiet {
    /// `q=0`, or omitted — always respond.
    Verbose,
    /// `q=1` — suppress success responses, keep error responses.
    ErrorsOnly,
    /// `q=2` — suppress every response.
    Silent,
}

impl Default for Quiet {
    fn default() -> Self {
        Self::Verbose
    }
}

/// Parameters for a scroll event (spec §4.4 Scroll). Built by the host from
/// its own viewport/margin state, not carried on [`GraphicsCommand`] since
/// scrolling isn't driven by a protocol command at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScrollData {
    /// Rows to scroll by, added directly to every placement's `start_row`.
    pub amt: i32,
    /// Total screen height in rows, used to drop placements scrolled
    /// entirely off both ends.
    pub limit: i32,
    pub margin_top: u32,
    pub margin_bottom: u32,
    pub has_margins: bool,
}

/// One parsed graphics-protocol command, corresponding to a single APC
/// escape sequence's key=value pairs.
#[derive(Clone, Debug, Default)]
pub struct GraphicsCommand {
    pub action: Action,
    /// `i`: client-chosen image id, or 0 for "none given".
    pub id: u32,
    /// `I`: client-chosen image number, or 0 for "none given".
    pub image_number: u32,
    /// `p`: placement id, or 0 for "none given" (auto-assign).
    pub placement_id: u32,
    /// `d`: the delete-action character, unparsed (see
    /// `manager::placement` for the closed filter set it maps to).
    pub delete_action: Option<char>,
    pub transmission_type: TransmissionType,
    pub format: ImageFormat,
    pub compressed: Compression,
    /// `s`/`v`: the payload's pre-compression pixel dimensions.
    pub data_width: u32,
    pub data_height: u32,
    /// `S`: the total declared size of a shared-memory/file payload.
    pub data_sz: usize,
    /// `O`: byte offset into a file/shared-memory payload.
    pub data_offset: u64,
    /// Length of this chunk's payload, pre-recorded so continuation logic
    /// doesn't need to inspect `payload` (which may be empty for file-backed
    /// transmissions carrying only a path).
    pub payload_sz: usize,
    /// `m`: whether more chunks follow.
    pub more: bool,
    pub quiet: Quiet,
    /// `x`/`y`: top-left of the crop rectangle within the source image.
    pub x_offset: u32,
    pub y_offset: u32,
    /// `w`/`h`: size of the crop rectangle (0 means "to the image edge").
    pub width: u32,
    pub height: u32,
    /// `c`/`r`: explicit placement span in cells (0 means "derive from the
    /// crop rectangle and cell size").
    pub num_cells: u32,
    pub num_lines: u32,
    /// `X`/`Y`: sub-cell pixel offset of the crop rectangle's origin.
    pub cell_x_offset: u32,
    pub cell_y_offset: u32,
    /// `z`: stacking order relative to text (negative draws below text).
    pub z_index: i32,
}

impl GraphicsCommand {
    /// The crop rectangle's requested size as an [`Extent`], `0` meaning
    /// unspecified in each axis.
    pub fn requested_size(&self) -> Extent {
        Extent::new(self.width, self.height)
    }
}
