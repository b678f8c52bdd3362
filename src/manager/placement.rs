//! The Placement Manager (spec §4.4; the original's `handle_put_command`,
//! `handle_delete_command`, `grman_scroll_images`, `grman_rescale_images` and
//! `grman_clear`).
//!
//! Deleting, scrolling and clearing all boil down to the same shape: walk
//! every placement of every image, decide whether it survives, and drop the
//! image too once its last placement is gone. The original does this with a
//! function-pointer callback per delete action; [`PlacementFilter`] replaces
//! that with a closed enum so every case is checked at compile time (spec §9
//! redesign note).

use crate::command::{GraphicsCommand, ScrollData};
use crate::cursor::Cursor;
use crate::error::Error;
use crate::math::EdgeRect;

use super::image::ImageRef;
use super::{CellSize, GraphicsManager, InternalId};

/// The closed set of placement-matching predicates a delete/clear command
/// can select (spec §4.4's `d` action characters).
#[derive(Clone, Copy, Debug)]
enum PlacementFilter {
    /// `a`/`A`, and `grman_clear(all = true)`: every placement.
    All,
    /// `0`, and `grman_clear(all = false)`: placements whose row span still
    /// overlaps the screen.
    Visible,
    /// `i`/`I`: by client id, optionally narrowed to one placement id.
    ClientId { id: u32, placement_id: u32 },
    /// `n`/`N`: by client number; only the newest matching image is touched.
    ClientNumber { number: u32, placement_id: u32 },
    /// `p`/`P`, `c`/`C`: the placement covering one cell.
    Point { x: i32, y: i32 },
    /// `q`/`Q`: a point filter additionally constrained to one z-index.
    PointAndZIndex { x: i32, y: i32, z_index: i32 },
    /// `x`/`X`: every placement covering one column.
    Column(i32),
    /// `y`/`Y`: every placement covering one row.
    Row(i32),
    /// `z`/`Z`: every placement at one z-index.
    ZIndex(i32),
}

impl PlacementFilter {
    fn matches(&self, r: &ImageRef, client_id: u32, client_number: u32) -> bool {
        match *self {
            Self::All => true,
            Self::Visible => r.start_row + r.effective_num_rows as i32 > 0,
            Self::ClientId { id, placement_id } => {
                id != 0 && client_id == id && (placement_id == 0 || r.placement_id == placement_id)
            }
            Self::ClientNumber { number, placement_id } => {
                number != 0 && client_number == number && (placement_id == 0 || r.placement_id == placement_id)
            }
            Self::Point { x, y } => column_contains(r, x) && row_contains(r, y),
            Self::PointAndZIndex { x, y, z_index } => {
                r.z_index == z_index && column_contains(r, x) && row_contains(r, y)
            }
            Self::Column(x) => column_contains(r, x),
            Self::Row(y) => row_contains(r, y),
            Self::ZIndex(z_index) => r.z_index == z_index,
        }
    }
}

fn column_contains(r: &ImageRef, x: i32) -> bool {
    r.start_column <= x && x < r.start_column + r.effective_num_cols as i32
}

/// Spec §9 redesign note: a query row is inside a placement's span when it
/// falls anywhere within `[start_row, start_row + effective_num_rows)`, not
/// just on the first row (the original's `y_filter_func` only ever compares
/// against `start_row`, missing every row below the first in a multi-row
/// placement).
fn row_contains(r: &ImageRef, y: i32) -> bool {
    r.start_row <= y && y < r.start_row + r.effective_num_rows as i32
}

impl GraphicsManager {
    /// Creates or updates one placement (spec §4.4 Put). `image_internal_id`
    /// is `Some` only when called right after a successful `T` (transmit and
    /// display) add; otherwise the image is resolved from `cmd.id`/
    /// `cmd.image_number` the same way an explicit `a=p` command would.
    /// Returns the resolved image's `client_id`, which the caller quotes in
    /// its response regardless of whether the put itself succeeded.
    pub(crate) fn put(
        &mut self,
        cmd: &GraphicsCommand,
        cursor: &mut Cursor,
        cell: CellSize,
        image_internal_id: Option<InternalId>,
    ) -> Result<u32, Error> {
        let idx = if let Some(internal_id) = image_internal_id {
            self.images.iter().position(|img| img.internal_id() == internal_id)
        } else if cmd.id != 0 {
            self.images.iter().position(|img| img.client_id() == cmd.id)
        } else if cmd.image_number != 0 {
            self.images.iter().rposition(|img| img.client_number() == cmd.image_number)
        } else {
            None
        };

        let idx = idx.ok_or_else(|| {
            Error::not_found(format!(
                "Put command refers to non-existent image with id: {} and number: {}",
                cmd.id, cmd.image_number
            ))
        })?;

        if !self.images[idx].data_loaded() {
            let client_id = self.images[idx].client_id();
            return Err(Error::not_found(format!(
                "Put command refers to image with id: {} that could not load its data",
                client_id
            )));
        }

        self.put_at(idx, cmd, cursor, cell);
        Ok(self.images[idx].client_id())
    }

    fn put_at(&mut self, idx: usize, cmd: &GraphicsCommand, cursor: &mut Cursor, cell: CellSize) {
        self.layers_dirty = true;

        let img = &mut self.images[idx];
        img.touch();
        let (width, height, client_id) = (img.width, img.height, img.client_id);

        let ref_idx = if cmd.placement_id != 0 && client_id != 0 {
            img.refs.iter().position(|r| r.placement_id == cmd.placement_id)
        } else {
            None
        };
        let ref_idx = ref_idx.unwrap_or_else(|| {
            img.refs.push(ImageRef::default());
            img.refs.len() - 1
        });

        let r = &mut img.refs[ref_idx];
        r.src_x = cmd.x_offset;
        r.src_y = cmd.y_offset;
        r.src_width = if cmd.width != 0 { cmd.width } else { width.saturating_sub(cmd.x_offset) };
        r.src_height = if cmd.height != 0 { cmd.height } else { height.saturating_sub(cmd.y_offset) };
        // Spec §9 redesign note: a crop origin at or beyond the image's edge
        // yields a zero-size (not negative/wrapped) crop, rather than the
        // original's unsigned-subtraction underflow.
        r.src_width = r.src_width.min(width.saturating_sub(r.src_x.min(width)));
        r.src_height = r.src_height.min(height.saturating_sub(r.src_y.min(height)));

        r.z_index = cmd.z_index;
        r.start_row = cursor.y;
        r.start_column = cursor.x;
        r.cell_x_offset = cmd.cell_x_offset.min(cell.x.saturating_sub(1));
        r.cell_y_offset = cmd.cell_y_offset.min(cell.y.saturating_sub(1));
        r.num_cols = cmd.num_cells;
        r.num_rows = cmd.num_lines;
        if client_id != 0 {
            r.placement_id = cmd.placement_id;
        }

        update_src_rect(r, width, height);
        update_effective_span(r, cell);

        cursor.x += r.effective_num_cols as i32;
        cursor.y += r.effective_num_rows as i32 - 1;
    }

    /// Deletes placements (and any image left with none) matching the
    /// command's `d` action character (spec §4.4 Delete).
    pub(crate) fn delete(&mut self, cmd: &GraphicsCommand, cursor: &Cursor, _cell: CellSize) {
        let action = cmd.delete_action.unwrap_or('0');
        let free_images = action.is_ascii_uppercase();

        let (filter, stop_after_first_match) = match action.to_ascii_lowercase() {
            '0' => (PlacementFilter::Visible, false),
            'a' => (PlacementFilter::All, false),
            'i' => (PlacementFilter::ClientId { id: cmd.id, placement_id: cmd.placement_id }, false),
            'n' => (
                PlacementFilter::ClientNumber { number: cmd.image_number, placement_id: cmd.placement_id },
                true,
            ),
            'p' => (
                PlacementFilter::Point { x: cmd.x_offset as i32 - 1, y: cmd.y_offset as i32 - 1 },
                false,
            ),
            'q' => (
                PlacementFilter::PointAndZIndex {
                    x: cmd.x_offset as i32 - 1,
                    y: cmd.y_offset as i32 - 1,
                    z_index: cmd.z_index,
                },
                false,
            ),
            'x' => (PlacementFilter::Column(cmd.x_offset as i32 - 1), false),
            'y' => (PlacementFilter::Row(cmd.y_offset as i32 - 1), false),
            'z' => (PlacementFilter::ZIndex(cmd.z_index), false),
            'c' => (PlacementFilter::Point { x: cursor.x, y: cursor.y }, false),
            other => {
                warn!("Unknown graphics command delete action: {other:?}");
                return;
            }
        };

        self.filter_refs(filter, free_images, stop_after_first_match);
    }

    /// The public "clear images" entry point (spec §4.4, the original's
    /// `grman_clear`) — not reachable through a graphics command's `d`
    /// action, but exposed for a host that wants to clear on e.g. a
    /// terminal-wide reset. Always frees emptied images.
    pub fn clear(&mut self, all: bool) {
        let filter = if all { PlacementFilter::All } else { PlacementFilter::Visible };
        self.filter_refs(filter, true, false);
    }

    /// Removes every placement `filter` matches, scanning newest image
    /// first so `stop_after_first_match` (the `n`/`N` "newest only" rule)
    /// can break as soon as any image in this scan yields a match. An image
    /// left with no placements is dropped too, unless it's still addressable
    /// by a client id and `free_images` is false.
    fn filter_refs(&mut self, filter: PlacementFilter, free_images: bool, stop_after_first_match: bool) {
        for idx in (0..self.images.len()).rev() {
            let mut matched_here = false;
            {
                let img = &mut self.images[idx];
                let (client_id, client_number) = (img.client_id, img.client_number);
                img.refs.retain(|r| {
                    let remove = filter.matches(r, client_id, client_number);
                    matched_here |= remove;
                    !remove
                });
            }

            if matched_here {
                self.layers_dirty = true;
            }

            let empty = self.images[idx].refs.is_empty();
            if empty && (free_images || self.images[idx].client_id == 0) {
                self.remove_image_at_no_cache(idx);
            }

            if stop_after_first_match && matched_here {
                break;
            }
        }
    }

    /// Applies a scroll event to every placement (spec §4.4 Scroll; the
    /// original's `scroll_filter_func`/`scroll_filter_margins_func`).
    /// Placements scrolled entirely off both ends of the scroll region are
    /// dropped; placements clipped by a margin boundary have their crop
    /// rect shrunk to match.
    pub fn scroll_images(&mut self, data: &ScrollData, cell: CellSize) {
        if self.images.is_empty() {
            return;
        }
        self.layers_dirty = true;

        for idx in (0..self.images.len()).rev() {
            let (width, height) = (self.images[idx].width, self.images[idx].height);
            self.images[idx].refs.retain_mut(|r| {
                let remove = if data.has_margins {
                    scroll_with_margins(r, data, cell, width, height)
                } else {
                    r.start_row += data.amt;
                    r.start_row + r.effective_num_rows as i32 <= data.limit
                };
                !remove
            });

            let empty = self.images[idx].refs.is_empty();
            if empty && self.images[idx].client_id == 0 {
                self.remove_image_at_no_cache(idx);
            }
        }
    }

    /// Re-clamps every placement's sub-cell offset and re-derives its
    /// effective span for a new cell size (spec §4.4 Rescale; the original's
    /// `grman_rescale_images`, run after a font size change).
    pub fn rescale(&mut self, cell: CellSize) {
        self.layers_dirty = true;
        for img in &mut self.images {
            for r in &mut img.refs {
                r.cell_x_offset = r.cell_x_offset.min(cell.x.saturating_sub(1));
                r.cell_y_offset = r.cell_y_offset.min(cell.y.saturating_sub(1));
                update_effective_span(r, cell);
            }
        }
    }
}

fn update_src_rect(r: &mut ImageRef, width: u32, height: u32) {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    r.src_rect = EdgeRect {
        left: r.src_x as f32 / w,
        right: (r.src_x + r.src_width) as f32 / w,
        top: r.src_y as f32 / h,
        bottom: (r.src_y + r.src_height) as f32 / h,
    };
}

/// Derives `effective_num_cols`/`effective_num_rows` from an explicit span
/// (`c`/`r`) or, when unset, by dividing the crop rect's pixel size
/// (inflated by the sub-cell offset) by the cell size, rounding up.
/// Invariant 8: `effective_num_rows` is never less than 1.
fn update_effective_span(r: &mut ImageRef, cell: CellSize) {
    r.effective_num_cols = if r.num_cols != 0 {
        r.num_cols
    } else {
        ceil_div(r.src_width + r.cell_x_offset, cell.x.max(1))
    };
    r.effective_num_rows = if r.num_rows != 0 {
        r.num_rows
    } else {
        ceil_div(r.src_height + r.cell_y_offset, cell.y.max(1))
    }
    .max(1);
}

fn ceil_div(n: u32, d: u32) -> u32 {
    let q = n / d;
    if n > q * d {
        q + 1
    } else {
        q
    }
}

/// `scroll_filter_margins_func`: placements entirely outside
/// `[margin_top, margin_bottom)` are left untouched; ones inside are shifted
/// by `data.amt` and either dropped (if the shift carries them fully outside
/// the region) or clipped at whichever margin boundary they now cross.
/// Returns `true` if the placement should be removed.
fn scroll_with_margins(r: &mut ImageRef, data: &ScrollData, cell: CellSize, width: u32, height: u32) -> bool {
    let margin_top = data.margin_top as i32;
    let margin_bottom = data.margin_bottom as i32;

    if !within_region(r, margin_top, margin_bottom) {
        return false;
    }

    r.start_row += data.amt;
    if outside_region(r, margin_top, margin_bottom) {
        return true;
    }

    if r.start_row < margin_top {
        let clipped_rows = (margin_top - r.start_row) as u32;
        let clip_px = cell.y.saturating_mul(clipped_rows);
        if r.src_height <= clip_px {
            return true;
        }
        r.src_y += clip_px;
        r.src_height -= clip_px;
        r.effective_num_rows -= clipped_rows;
        r.start_row += clipped_rows as i32;
        update_src_rect(r, width, height);
    } else if r.start_row + r.effective_num_rows as i32 > margin_bottom {
        let clipped_rows = (r.start_row + r.effective_num_rows as i32 - margin_bottom) as u32;
        let clip_px = cell.y.saturating_mul(clipped_rows);
        if r.src_height <= clip_px {
            return true;
        }
        r.src_height -= clip_px;
        r.effective_num_rows -= clipped_rows;
        update_src_rect(r, width, height);
    }

    false
}

fn within_region(r: &ImageRef, margin_top: i32, margin_bottom: i32) -> bool {
    r.start_row >= margin_top && r.start_row + r.effective_num_rows as i32 <= margin_bottom
}

fn outside_region(r: &ImageRef, margin_top: i32, margin_bottom: i32) -> bool {
    r.start_row + r.effective_num_rows as i32 <= margin_top || r.start_row > margin_bottom
}
