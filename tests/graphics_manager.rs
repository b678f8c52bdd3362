//! End-to-end scenarios from spec §8 "TESTABLE PROPERTIES", driven entirely
//! through `GraphicsManager::handle_command` the way a host terminal would.
//! GPU uploads are disabled throughout (`gpu_uploads_enabled = false`), so
//! every image stays resident in memory and scenarios can assert on raw
//! bytes without a real renderer.

use std::cell::RefCell;
use std::rc::Rc;

use term_graphics_manager::command::{Action, Compression, GraphicsCommand, ImageFormat, TransmissionType};
use term_graphics_manager::config::Config;
use term_graphics_manager::cursor::Cursor;
use term_graphics_manager::error::Error;
use term_graphics_manager::manager::{CellSize, GraphicsManager};
use term_graphics_manager::prelude::*;

struct FakeGpu {
    next_id: u32,
}

impl GpuUploader for FakeGpu {
    fn upload_texture(
        &mut self,
        _bitmap: &[u8],
        _width: u32,
        _height: u32,
        _is_opaque: bool,
        _is_4byte_aligned: bool,
    ) -> Result<term_graphics_manager::gpu::TextureId, Error> {
        self.next_id += 1;
        Ok(term_graphics_manager::gpu::TextureId(self.next_id))
    }

    fn free_texture(&mut self, _id: term_graphics_manager::gpu::TextureId) {}
}

fn manager_with_limit(storage_limit_bytes: usize) -> GraphicsManager {
    let config = Config::from_toml_str("")
        .with_gpu_uploads_enabled(false)
        .with_storage_limit_bytes(storage_limit_bytes);
    GraphicsManager::new(config, Rc::new(RefCell::new(FakeGpu { next_id: 0 })))
}

fn manager() -> GraphicsManager {
    manager_with_limit(320 * 1024 * 1024)
}

fn cell() -> CellSize {
    CellSize::new(8, 16)
}

fn rgba(width: u32, height: u32, fill: u8) -> Vec<u8> {
    vec![fill; (width * height * 4) as usize]
}

fn rgb(width: u32, height: u32, fill: u8) -> Vec<u8> {
    vec![fill; (width * height * 3) as usize]
}

/// Scenario 1: a two-chunk direct RGB transmission assembles into one image
/// and only the final chunk produces a response.
#[test]
fn chunked_direct_rgb_assembles_across_two_commands() {
    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 0);
    let full = rgb(2, 2, 0x42); // 12 bytes total

    let first = GraphicsCommand {
        action: Action::Transmit,
        id: 17,
        data_width: 2,
        data_height: 2,
        format: ImageFormat::Rgb,
        more: true,
        ..Default::default()
    };
    let resp = mgr.handle_command(&first, &full[..6], &mut cursor, cell());
    assert_eq!(resp, None, "a partial chunk produces no response");

    let second = GraphicsCommand {
        action: Action::Transmit,
        data_width: 2,
        data_height: 2,
        format: ImageFormat::Rgb,
        more: false,
        ..Default::default()
    };
    let resp = mgr.handle_command(&second, &full[6..], &mut cursor, cell());

    assert_eq!(resp.as_deref(), Some("Gi=17;OK"));
    let img = mgr.image_by_client_id(17).expect("image should be loaded");
    assert!(img.data_loaded());
    assert_eq!(img.data(), full.as_slice());
}

/// Scenario 2: a PNG add whose declared size exceeds the direct-transmission
/// cap is rejected before any buffer is allocated.
#[test]
fn oversized_png_declaration_is_rejected() {
    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 0);

    let cmd = GraphicsCommand {
        action: Action::Transmit,
        id: 5,
        format: ImageFormat::Png,
        data_sz: 500_000_000,
        more: false,
        ..Default::default()
    };
    let resp = mgr.handle_command(&cmd, &[], &mut cursor, cell());

    assert_eq!(resp.as_deref(), Some("Gi=5;EINVAL:PNG data size too large"));
    assert_eq!(mgr.image_count(), 0);
}

/// Scenario 3 (scaled down for test speed: the eviction *shape* from spec §8
/// is identical at any byte count). Four unplaced images pushed past a small
/// quota: the just-added image always survives, and storage never exceeds
/// the configured limit once the dust settles.
#[test]
fn eviction_keeps_used_storage_under_the_configured_quota() {
    let mut mgr = manager_with_limit(1_000_000);
    let mut cursor = Cursor::new(0, 0);

    for (i, id) in (1..=4u32).enumerate() {
        let cmd = GraphicsCommand {
            action: Action::Transmit,
            id,
            data_width: 200,
            data_height: 500,
            format: ImageFormat::Rgba,
            more: false,
            ..Default::default()
        };
        let payload = rgba(200, 500, i as u8); // 400,000 bytes each
        let resp = mgr.handle_command(&cmd, &payload, &mut cursor, cell());
        assert!(resp.as_deref().unwrap().ends_with(";OK"), "add {id} should succeed");
    }

    assert!(mgr.used_storage() <= 1_000_000);
    // None of the four images were ever placed, so the first eviction pass
    // (spec §4.6 step 1: drop every unplaced image except the one just
    // added) reclaims all of them but the last.
    assert!(mgr.image_by_client_id(1).is_none());
    assert!(mgr.image_by_client_id(4).is_some());
}

/// Eviction never drops a placed image purely for being old; only the
/// unreferenced ones are fair game, and the atime-LRU sweep only engages
/// once the unreferenced pass alone isn't enough.
#[test]
fn eviction_preserves_placed_images_ahead_of_unplaced_ones() {
    let mut mgr = manager_with_limit(900_000);
    let mut cursor = Cursor::new(0, 0);

    let placed = GraphicsCommand {
        action: Action::TransmitAndDisplay,
        id: 1,
        data_width: 200,
        data_height: 500,
        format: ImageFormat::Rgba,
        more: false,
        ..Default::default()
    };
    mgr.handle_command(&placed, &rgba(200, 500, 1), &mut cursor, cell());

    for id in 2..=3u32 {
        let cmd = GraphicsCommand {
            action: Action::Transmit,
            id,
            data_width: 200,
            data_height: 500,
            format: ImageFormat::Rgba,
            more: false,
            ..Default::default()
        };
        mgr.handle_command(&cmd, &rgba(200, 500, id as u8), &mut cursor, cell());
    }

    assert!(mgr.used_storage() <= 900_000);
    assert!(mgr.image_by_client_id(1).is_some(), "the placed image must survive eviction");
}

/// Scenario 5: `id=0, image_number=N` on an image with no existing `id`
/// allocates the smallest unused client id, and the response quotes it.
#[test]
fn free_client_id_allocation_quotes_the_assigned_id() {
    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 0);

    for id in 1..=2u32 {
        let cmd = GraphicsCommand {
            action: Action::Transmit,
            id,
            data_width: 1,
            data_height: 1,
            format: ImageFormat::Rgba,
            more: false,
            ..Default::default()
        };
        mgr.handle_command(&cmd, &rgba(1, 1, id as u8), &mut cursor, cell());
    }

    let cmd = GraphicsCommand {
        action: Action::Transmit,
        id: 0,
        image_number: 7,
        data_width: 1,
        data_height: 1,
        format: ImageFormat::Rgba,
        more: false,
        ..Default::default()
    };
    let resp = mgr.handle_command(&cmd, &rgba(1, 1, 0xFF), &mut cursor, cell());

    assert_eq!(resp.as_deref(), Some("Gi=3,I=7;OK"));
    assert!(mgr.image_by_client_id(3).is_some());
}

/// Scenario 6: placements at four z-indices land in the three z-bands the
/// compositor reports to the renderer.
#[test]
fn z_band_counts_match_placement_distribution() {
    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 0);

    let add = GraphicsCommand {
        action: Action::Transmit,
        id: 1,
        data_width: 2,
        data_height: 2,
        format: ImageFormat::Rgba,
        more: false,
        ..Default::default()
    };
    mgr.handle_command(&add, &rgba(2, 2, 0), &mut cursor, cell());

    for (placement_id, z) in [(1, i32::MIN / 2 - 1), (2, -5), (3, 0), (4, 3)] {
        let put = GraphicsCommand {
            action: Action::Put,
            id: 1,
            placement_id,
            z_index: z,
            ..Default::default()
        };
        let resp = mgr.handle_command(&put, &[], &mut cursor, cell());
        assert!(resp.as_deref().unwrap().ends_with(";OK"));
    }

    let changed = mgr.update_layers(1, -1.0, 1.0, 0.2, 0.2, 10, 10, cell());
    assert!(changed);

    assert_eq!(mgr.below_text_count(), 1);
    assert_eq!(mgr.negative_z_count(), 1);
    assert_eq!(mgr.positive_z_count(), 2);
    assert_eq!(mgr.render_data().len(), 4);
}

/// Invariant 7 (spec §8): repeated "delete all" leaves the manager with no
/// images.
#[test]
fn delete_all_is_idempotent() {
    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 0);

    let add = GraphicsCommand {
        action: Action::TransmitAndDisplay,
        id: 1,
        data_width: 2,
        data_height: 2,
        format: ImageFormat::Rgba,
        more: false,
        ..Default::default()
    };
    mgr.handle_command(&add, &rgba(2, 2, 0), &mut cursor, cell());
    assert_eq!(mgr.image_count(), 1);

    let delete_all = GraphicsCommand {
        action: Action::Delete,
        delete_action: Some('A'),
        ..Default::default()
    };
    mgr.handle_command(&delete_all, &[], &mut cursor, cell());
    assert_eq!(mgr.image_count(), 0);

    // Deleting again with nothing left is a no-op, not an error.
    mgr.handle_command(&delete_all, &[], &mut cursor, cell());
    assert_eq!(mgr.image_count(), 0);
}

/// Invariant 5 / spec §4.3: a successful `q` query never leaves a persistent
/// image behind, even though the response quotes the original client id.
#[test]
fn query_after_add_reports_ok_without_retaining_the_image() {
    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 0);

    let query = GraphicsCommand {
        action: Action::Query,
        id: 99,
        data_width: 1,
        data_height: 1,
        format: ImageFormat::Rgba,
        more: false,
        ..Default::default()
    };
    let resp = mgr.handle_command(&query, &rgba(1, 1, 1), &mut cursor, cell());

    assert_eq!(resp.as_deref(), Some("Gi=99;OK"));
    assert_eq!(mgr.image_count(), 0, "an unreferenced query result is trimmed immediately");
}

/// Scroll with margins clips (rather than deletes) a placement that
/// partially crosses a margin boundary (spec §4.4 Scroll).
#[test]
fn scroll_with_margins_clips_rather_than_removes_partial_overlap() {
    use term_graphics_manager::command::ScrollData;

    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 5);

    // 3 cell-rows tall at a 16px cell height, landing at rows [5, 8) — wholly
    // inside the [3, 10) margin region before any scroll.
    let add = GraphicsCommand {
        action: Action::Transmit,
        id: 1,
        data_width: 8,
        data_height: 48,
        format: ImageFormat::Rgba,
        more: false,
        ..Default::default()
    };
    mgr.handle_command(&add, &rgba(8, 48, 0), &mut cursor, cell());

    let put = GraphicsCommand {
        action: Action::Put,
        id: 1,
        ..Default::default()
    };
    mgr.handle_command(&put, &[], &mut cursor, cell());
    assert_eq!(mgr.image_count(), 1, "the placement should have landed");

    let scroll = ScrollData {
        amt: -3,
        limit: 100,
        margin_top: 3,
        margin_bottom: 10,
        has_margins: true,
    };
    mgr.scroll_images(&scroll, cell());

    // Shifting by -3 carries the placement's top row (5 -> 2) one row above
    // the top margin; rather than being dropped it should be clipped at the
    // margin boundary, losing its top cell-row's worth of source pixels.
    assert_eq!(mgr.image_count(), 1);

    mgr.update_layers(0, -1.0, 1.0, 0.2, 0.2, 10, 10, cell());
    let data = mgr.render_data();
    assert_eq!(data.len(), 1, "the clipped placement is still rendered");
    assert!(
        (data[0].src_rect.top - 1.0 / 3.0).abs() < 1e-4,
        "top of the crop rect should move down by the clipped row: {:?}",
        data[0].src_rect
    );
    assert!((data[0].src_rect.bottom - 1.0).abs() < 1e-4);
}

/// Invariant 1 (spec §8): two images never share a nonzero client id; a
/// second add with an id already in use updates that same image in place
/// rather than creating a duplicate.
#[test]
fn reusing_a_client_id_replaces_the_existing_image() {
    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 0);

    let first = GraphicsCommand {
        action: Action::Transmit,
        id: 4,
        data_width: 1,
        data_height: 1,
        format: ImageFormat::Rgba,
        more: false,
        ..Default::default()
    };
    mgr.handle_command(&first, &rgba(1, 1, 0), &mut cursor, cell());

    let second = GraphicsCommand {
        action: Action::Transmit,
        id: 4,
        data_width: 2,
        data_height: 2,
        format: ImageFormat::Rgba,
        more: false,
        ..Default::default()
    };
    mgr.handle_command(&second, &rgba(2, 2, 1), &mut cursor, cell());

    assert_eq!(mgr.image_count(), 1);
    let img = mgr.image_by_client_id(4).unwrap();
    assert_eq!(img.width(), 2);
    assert_eq!(img.height(), 2);
}

/// A garbage zlib stream is reported as `EINVAL` rather than panicking or
/// silently truncating (spec §4.3, §7). The failed transmission is torn
/// down in place (`data_loaded` cleared); the orphaned anonymous image
/// itself is swept on the *next* add's trim pass (spec §4.6), not this one.
#[test]
fn invalid_zlib_stream_is_reported_as_invalid() {
    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 0);

    let cmd = GraphicsCommand {
        action: Action::Transmit,
        id: 6,
        data_width: 2,
        data_height: 2,
        format: ImageFormat::Rgba,
        compressed: Compression::Zlib,
        more: false,
        ..Default::default()
    };
    let resp = mgr.handle_command(&cmd, b"not a zlib stream", &mut cursor, cell());

    let resp = resp.expect("an identity-bearing failed add still responds");
    assert!(resp.starts_with("Gi=6;EINVAL:"), "unexpected response: {resp}");

    let next = GraphicsCommand {
        action: Action::Transmit,
        id: 7,
        data_width: 1,
        data_height: 1,
        format: ImageFormat::Rgba,
        more: false,
        ..Default::default()
    };
    mgr.handle_command(&next, &rgba(1, 1, 0), &mut cursor, cell());

    assert_eq!(mgr.image_count(), 1, "the failed transmission is trimmed by the next add");
    assert!(mgr.image_by_client_id(6).is_none());
}

/// A put referencing a nonexistent image reports `ENOENT` (spec §4.4, §7).
#[test]
fn put_on_unknown_image_is_not_found() {
    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 0);

    let put = GraphicsCommand {
        action: Action::Put,
        id: 123,
        ..Default::default()
    };
    let resp = mgr.handle_command(&put, &[], &mut cursor, cell());

    assert_eq!(
        resp.as_deref(),
        Some("Gi=123;ENOENT:Put command refers to non-existent image with id: 123 and number: 0")
    );
}

/// `T` (transmit and display) both loads and places the image in one
/// command, advancing the cursor the way a plain `p` would.
#[test]
fn transmit_and_display_places_immediately() {
    let mut mgr = manager();
    let mut cursor = Cursor::new(0, 0);

    let cmd = GraphicsCommand {
        action: Action::TransmitAndDisplay,
        id: 2,
        data_width: 16,
        data_height: 32,
        format: ImageFormat::Rgba,
        more: false,
        ..Default::default()
    };
    let resp = mgr.handle_command(&cmd, &rgba(16, 32, 9), &mut cursor, cell());

    assert_eq!(resp.as_deref(), Some("Gi=2;OK"));
    let img = mgr.image_by_client_id(2).unwrap();
    assert_eq!(img.placement_count(), 1);
    // 16px wide / 8px cells = 2 cols; cursor lands one past the placement.
    assert_eq!(cursor.x, 2);
}
