//! The Layer Compositor (spec §4.5; the original's `grman_update_layers`,
//! `set_vertex_data` and `gpu_data_for_centered_image`).
//!
//! Builds one [`ImageRenderData`] record per live, positioned placement,
//! culls anything that's scrolled entirely off-screen, and groups the
//! result by `(z_index, image_id)` so a renderer can batch consecutive
//! records sharing one texture into a single draw call.

use crate::gpu::TextureId;
use crate::math::EdgeRect;

use super::image::{Image, ImageRef, InternalId};
use super::{CellSize, GraphicsManager};

/// One placement's worth of render state (spec §6 "Render data (output)":
/// `{src_rect, dest_rect, group_count, z_index, image_id}` plus a GPU-side
/// vertex array).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImageRenderData {
    /// The crop rect in normalized `[0, 1]` texture space.
    pub src_rect: EdgeRect,
    /// The placement's on-screen quad, in the caller's screen-space units.
    pub dest_rect: EdgeRect,
    /// Four `(src_u, src_v, dst_x, dst_y)` vertices flattened to 16 floats,
    /// in right-top/right-bottom/left-bottom/left-top order — the exact
    /// layout a GPU vertex buffer wants, redundant with `src_rect`/
    /// `dest_rect` but saved so a renderer doesn't have to re-derive it.
    pub vertices: [f32; 16],
    pub z_index: i32,
    pub image_id: InternalId,
    pub texture_id: TextureId,
    /// How many of the following records (inclusive of this one) share this
    /// record's `image_id` and can be drawn as one batch. Only meaningful on
    /// the first record of each run; `0` elsewhere.
    pub group_count: u32,
}

impl GraphicsManager {
    /// Rebuilds [`render_data`](Self::render_data) for the current frame if
    /// anything changed since the last call, returning whether it did (spec
    /// §4.5; the original's `grman_update_layers`). `screen_left`/
    /// `screen_top` are the screen-space origin of cell `(0, 0)`; `dx`/`dy`
    /// are one cell's screen-space size; `scrolled_by` tracks whether the
    /// caller's own scroll position moved since the last call.
    #[allow(clippy::too_many_arguments)]
    pub fn update_layers(
        &mut self,
        scrolled_by: u32,
        screen_left: f32,
        screen_top: f32,
        dx: f32,
        dy: f32,
        num_cols: u32,
        num_rows: u32,
        cell: CellSize,
    ) -> bool {
        if scrolled_by != self.last_scrolled_by {
            self.layers_dirty = true;
        }
        self.last_scrolled_by = scrolled_by;

        if !self.layers_dirty {
            return false;
        }
        self.layers_dirty = false;

        self.num_below_refs = 0;
        self.num_negative_refs = 0;
        self.num_positive_refs = 0;
        self.render_data.clear();

        let screen_bottom = screen_top - dy * num_rows as f32;
        let screen_width_px = (cell.x * num_cols) as f32;
        let screen_height_px = (cell.y * num_rows) as f32;

        for img in &self.images {
            for r in &img.refs {
                if !r.is_positioned() {
                    continue;
                }

                let dest = match dest_rect(
                    r,
                    screen_left,
                    screen_top,
                    dx,
                    dy,
                    scrolled_by,
                    cell,
                    dx * num_cols as f32,
                    dy * num_rows as f32,
                    screen_width_px,
                    screen_height_px,
                ) {
                    Some(dest) => dest,
                    None => continue,
                };
                if !dest.vertically_overlaps(screen_bottom, screen_top) {
                    continue;
                }

                count_z_band(r.z_index, &mut self.num_below_refs, &mut self.num_negative_refs, &mut self.num_positive_refs);

                self.render_data.push(build_render_data(img, r, &dest));
            }
        }

        group_by_image(&mut self.render_data);

        true
    }
}

fn count_z_band(z_index: i32, below: &mut usize, negative: &mut usize, positive: &mut usize) {
    // The original reserves the bottom half of the `i32` range as "draw
    // beneath cells that have no background color set" (below text); the
    // rest splits at zero the ordinary way (spec §4.5, §6).
    if z_index < i32::MIN / 2 {
        *below += 1;
    } else if z_index < 0 {
        *negative += 1;
    } else {
        *positive += 1;
    }
}

/// Screen-space destination rectangle for one placement, or `None` if its
/// crop rect has degenerated to zero pixels in either axis (spec §9
/// redesign note: cull rather than emit a zero-area quad).
///
/// `screen_width`/`screen_height` are the whole grid's screen-space extent
/// (`dx·num_cols`/`dy·num_rows`), not the placement's own span — spec §4.5's
/// `bottom = top − screen_height·src_height/screen_height_px` scales a
/// placement's crop by the *grid's* pixel-to-screen-space ratio, the same
/// ratio for every placement regardless of how many cells it spans.
#[allow(clippy::too_many_arguments)]
fn dest_rect(
    r: &ImageRef,
    screen_left: f32,
    screen_top: f32,
    dx: f32,
    dy: f32,
    scrolled_by: u32,
    cell: CellSize,
    screen_width: f32,
    screen_height: f32,
    screen_width_px: f32,
    screen_height_px: f32,
) -> Option<EdgeRect> {
    if r.src_width == 0 || r.src_height == 0 {
        return None;
    }

    let y0 = screen_top - dy * scrolled_by as f32;
    let top = y0 - r.start_row as f32 * dy - dy * r.cell_y_offset as f32 / cell.y.max(1) as f32;
    let bottom = if r.num_rows != 0 {
        y0 - (r.start_row + r.num_rows as i32) as f32 * dy
    } else {
        top - screen_height * r.src_height as f32 / screen_height_px.max(1.0)
    };

    let left = screen_left + r.start_column as f32 * dx + dx * r.cell_x_offset as f32 / cell.x.max(1) as f32;
    let right = if r.num_cols != 0 {
        screen_left + (r.start_column + r.num_cols as i32) as f32 * dx
    } else {
        left + screen_width * r.src_width as f32 / screen_width_px.max(1.0)
    };

    Some(EdgeRect { left, right, top, bottom })
}

fn build_render_data(img: &Image, r: &ImageRef, dest: &EdgeRect) -> ImageRenderData {
    let mut rd = ImageRenderData {
        z_index: r.z_index,
        image_id: img.internal_id(),
        texture_id: img.texture_id(),
        ..Default::default()
    };
    set_vertex_data(&mut rd, &r.src_rect, dest);
    rd
}

/// Fills `src_rect`/`dest_rect` and the flattened 16-float vertex array for
/// one quad, in right-top/right-bottom/left-bottom/left-top order (spec
/// §6).
fn set_vertex_data(rd: &mut ImageRenderData, src: &EdgeRect, dest: &EdgeRect) {
    rd.src_rect = *src;
    rd.dest_rect = *dest;
    rd.vertices = [
        src.right, src.top, dest.right, dest.top,
        src.right, src.bottom, dest.right, dest.bottom,
        src.left, src.bottom, dest.left, dest.bottom,
        src.left, src.top, dest.left, dest.top,
    ];
}

/// Sorts by `(z_index, image_id)` and stamps `group_count` on the first
/// record of each run sharing an `image_id`, so a renderer can batch
/// consecutive records into one draw call per texture (spec §4.5).
fn group_by_image(render_data: &mut Vec<ImageRenderData>) {
    render_data.sort_by(|a, b| a.z_index.cmp(&b.z_index).then(a.image_id.cmp(&b.image_id)));

    let mut i = 0;
    while i < render_data.len() {
        let image_id = render_data[i].image_id;
        let start = i;
        i += 1;
        while i < render_data.len() && render_data[i].image_id == image_id {
            i += 1;
        }
        render_data[start].group_count = (i - start) as u32;
    }
}

/// Render data for one image centered and letterboxed within a
/// `screen_width_px` by `screen_height_px` viewport (SPEC_FULL.md §10.5; the
/// original's `gpu_data_for_centered_image`, used by a host to show e.g. a
/// full-screen image viewer outside the normal cell-grid placement model).
pub fn centered_render_data(screen_width_px: u32, screen_height_px: u32, width: u32, height: u32, texture_id: TextureId) -> ImageRenderData {
    let width_frac = 2.0 * (width as f32 / screen_width_px.max(1) as f32).min(1.0);
    let height_frac = 2.0 * (height as f32 / screen_height_px.max(1) as f32).min(1.0);
    let hmargin = (2.0 - width_frac) / 2.0;
    let vmargin = (2.0 - height_frac) / 2.0;

    let dest = EdgeRect {
        left: -1.0 + hmargin,
        right: -1.0 + hmargin + width_frac,
        top: 1.0 - vmargin,
        bottom: 1.0 - vmargin - height_frac,
    };
    let src = EdgeRect { left: 0.0, right: 1.0, top: 0.0, bottom: 1.0 };

    let mut rd = ImageRenderData { texture_id, group_count: 1, ..Default::default() };
    set_vertex_data(&mut rd, &src, &dest);
    rd
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn z_band_counts_split_at_below_text_and_zero() {
        let (mut below, mut negative, mut positive) = (0, 0, 0);

        count_z_band(i32::MIN, &mut below, &mut negative, &mut positive);
        count_z_band(-1, &mut below, &mut negative, &mut positive);
        count_z_band(0, &mut below, &mut negative, &mut positive);
        count_z_band(5, &mut below, &mut negative, &mut positive);

        assert_eq!(below, 1);
        assert_eq!(negative, 1);
        assert_eq!(positive, 2);
    }

    #[test]
    fn grouping_stamps_run_lengths_on_the_first_record_only() {
        let mut data = vec![
            ImageRenderData { z_index: 0, image_id: InternalId(1), ..Default::default() },
            ImageRenderData { z_index: 0, image_id: InternalId(1), ..Default::default() },
            ImageRenderData { z_index: 0, image_id: InternalId(2), ..Default::default() },
        ];

        group_by_image(&mut data);

        assert_eq!(data[0].group_count, 2);
        assert_eq!(data[1].group_count, 0);
        assert_eq!(data[2].group_count, 1);
    }

    #[test]
    fn degenerate_crop_rect_is_culled() {
        let r = ImageRef { src_width: 0, src_height: 10, effective_num_rows: 1, ..Default::default() };

        let dest = dest_rect(&r, 0.0, 1.0, 0.1, 0.1, 0, CellSize::new(8, 16), 8.0, 6.0, 800.0, 600.0);

        assert!(dest.is_none());
    }
}
