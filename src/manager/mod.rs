//! The [`GraphicsManager`]: the single stateful object this crate exists to
//! provide (spec §3 DATA MODEL, §5 CONCURRENCY & RESOURCE MODEL).
//!
//! Split across files the way the teacher splits its own `driver` module by
//! concern rather than by data type: [`image`] is the data model, [`decode`]
//! and [`assembler`] together implement the Transmission Assembler and
//! Decoder components, [`placement`] is the Placement Manager, [`compositor`]
//! is the Layer Compositor, and [`storage`] is Storage & Eviction. All five
//! are `impl GraphicsManager` blocks in their own file rather than separate
//! types, since the spec treats them as responsibilities of one object, not
//! as independently instantiable collaborators.

mod assembler;
mod compositor;
mod decode;
mod image;
mod placement;
#[cfg(all(test, unix))]
mod shm;
mod storage;

use std::cell::RefCell;
use std::rc::Rc;

use crate::command::{Action, GraphicsCommand};
use crate::config::Config;
use crate::disk_cache::{DiskCache, EvictedImage, NoopDiskCache};
use crate::error::Error;
use crate::gpu::GpuUploader;
use crate::host::{DirectUnlink, TempFileCleanup};
use crate::math::Extent;

pub use self::compositor::ImageRenderData;
pub use self::image::{ImageRef, ImageView, InternalId};

/// Cell (character cell) pixel size, expressed with the same `Extent` type
/// used for image pixel dimensions: `x` is cell width, `y` is cell height.
pub type CellSize = Extent;

/// One transmitted image plus every placement that currently references it.
/// [`ImageView`] is the read-only projection callers outside this crate see.
pub(crate) use self::image::Image;

/// The graphics manager core: accepts parsed [`GraphicsCommand`]s, owns every
/// decoded [`Image`](image::Image) and its placements, and produces
/// per-frame render data. See the crate root for the overall responsibility
/// split.
pub struct GraphicsManager {
    config: Config,
    gpu: Rc<RefCell<dyn GpuUploader>>,
    disk_cache: Box<dyn DiskCache>,
    temp_file_cleanup: Box<dyn TempFileCleanup>,

    images: Vec<Image>,
    render_data: Vec<ImageRenderData>,

    internal_id_counter: u64,
    used_storage: usize,

    num_below_refs: usize,
    num_negative_refs: usize,
    num_positive_refs: usize,

    /// Mirrors the original's `loading_image` (`0` = none): the
    /// [`InternalId`] of the image mid multi-chunk direct transmission.
    loading_image: Option<InternalId>,
    /// A snapshot of the command that started the in-progress transmission,
    /// so continuation chunks (which only carry `more`/payload) inherit the
    /// original format/transmission parameters (spec §4.2).
    last_init_command: Option<GraphicsCommand>,

    last_scrolled_by: u32,
    layers_dirty: bool,
}

impl GraphicsManager {
    /// Builds a manager with the default (no-op) disk cache collaborator.
    pub fn new(config: Config, gpu: Rc<RefCell<dyn GpuUploader>>) -> Self {
        Self::with_disk_cache(config, gpu, Box::new(NoopDiskCache))
    }

    pub fn with_disk_cache(
        config: Config,
        gpu: Rc<RefCell<dyn GpuUploader>>,
        disk_cache: Box<dyn DiskCache>,
    ) -> Self {
        Self {
            config,
            gpu,
            disk_cache,
            temp_file_cleanup: Box::new(DirectUnlink),
            images: Vec::new(),
            render_data: Vec::new(),
            internal_id_counter: 1,
            used_storage: 0,
            num_below_refs: 0,
            num_negative_refs: 0,
            num_positive_refs: 0,
            loading_image: None,
            last_init_command: None,
            last_scrolled_by: 0,
            layers_dirty: false,
        }
    }

    /// Registers the host collaborator responsible for unlinking `t=t`
    /// temporary files (spec §1, §4.2). Defaults to unlinking directly on
    /// the calling thread when never set.
    pub fn with_temp_file_cleanup(mut self, cleanup: Box<dyn TempFileCleanup>) -> Self {
        self.temp_file_cleanup = cleanup;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn used_storage(&self) -> usize {
        self.used_storage
    }

    /// The current rendered frame's vertex/placement data, rebuilt the last
    /// time [`update_layers`](Self::update_layers) returned `true`.
    pub fn render_data(&self) -> &[ImageRenderData] {
        &self.render_data
    }

    pub fn below_text_count(&self) -> usize {
        self.num_below_refs
    }

    pub fn negative_z_count(&self) -> usize {
        self.num_negative_refs
    }

    pub fn positive_z_count(&self) -> usize {
        self.num_positive_refs
    }

    pub fn image_by_client_id(&self, id: u32) -> Option<ImageView<'_>> {
        self.img_by_client_id(id).map(ImageView::new)
    }

    pub fn image_by_client_number(&self, number: u32) -> Option<ImageView<'_>> {
        self.img_by_client_number(number).map(ImageView::new)
    }

    /// Called when the terminal's overall grid dimensions change. The
    /// original (`grman_resize`) does nothing but invalidate the compositor
    /// cache; placements are re-laid-out lazily on the next
    /// [`update_layers`](Self::update_layers) call.
    pub fn resize(&mut self) {
        self.layers_dirty = true;
    }

    fn next_internal_id(&mut self) -> InternalId {
        let id = InternalId(self.internal_id_counter);
        self.internal_id_counter += 1;
        id
    }

    fn img_by_internal_id(&self, id: InternalId) -> Option<&Image> {
        self.images.iter().find(|img| img.internal_id() == id)
    }

    fn img_by_internal_id_mut(&mut self, id: InternalId) -> Option<&mut Image> {
        self.images.iter_mut().find(|img| img.internal_id() == id)
    }

    fn img_by_client_id(&self, id: u32) -> Option<&Image> {
        if id == 0 {
            return None;
        }
        self.images.iter().find(|img| img.client_id() == id)
    }

    fn img_by_client_id_mut(&mut self, id: u32) -> Option<&mut Image> {
        if id == 0 {
            return None;
        }
        self.images.iter_mut().find(|img| img.client_id() == id)
    }

    /// The newest image with the given `client_number` (spec §4.4, glossary
    /// "newest-wins on lookup").
    fn img_by_client_number(&self, number: u32) -> Option<&Image> {
        if number == 0 {
            return None;
        }
        self.images.iter().rev().find(|img| img.client_number() == number)
    }

    fn img_by_client_number_mut(&mut self, number: u32) -> Option<&mut Image> {
        if number == 0 {
            return None;
        }
        self.images.iter_mut().rev().find(|img| img.client_number() == number)
    }

    /// Smallest positive integer not already used as a `client_id`
    /// (spec §4.4, the original's `get_free_client_id`).
    fn free_client_id(&self) -> u32 {
        let mut used: Vec<u32> = self
            .images
            .iter()
            .map(Image::client_id)
            .filter(|&id| id != 0)
            .collect();
        if used.is_empty() {
            return 1;
        }
        used.sort_unstable();
        used.dedup();
        let mut candidate = 1u32;
        for id in used {
            if id != candidate {
                break;
            }
            candidate = id + 1;
        }
        candidate
    }

    /// Finds the image with `client_id == id`, or creates a fresh anonymous
    /// one and appends it (the original's `find_or_create_image`).
    fn find_or_create_image(&mut self, id: u32) -> (usize, bool) {
        if id != 0 {
            if let Some(idx) = self.images.iter().position(|img| img.client_id() == id) {
                return (idx, true);
            }
        }
        let internal_id = self.next_internal_id();
        self.images.push(Image::new(internal_id));
        (self.images.len() - 1, false)
    }

    /// Removes the image at `idx`, notifying the disk-cache collaborator
    /// first — used for storage-driven eviction (spec §4.6).
    fn remove_image_at(&mut self, idx: usize) {
        self.remove_image_at_impl(idx, true);
    }

    /// Like [`remove_image_at`](Self::remove_image_at), but skips the
    /// disk-cache notification — used when a placement-manager action
    /// (explicit delete, or a placement scrolled entirely off-screen) drops
    /// an image, which isn't eviction in the storage-quota sense.
    fn remove_image_at_no_cache(&mut self, idx: usize) {
        self.remove_image_at_impl(idx, false);
    }

    fn remove_image_at_impl(&mut self, idx: usize, notify_disk_cache: bool) {
        let img = self.images.remove(idx);
        if notify_disk_cache {
            self.disk_cache.on_evict(&EvictedImage {
                internal_id: img.internal_id().0,
                client_id: img.client_id(),
                width: img.width(),
                height: img.height(),
                used_storage: img.used_storage(),
            });
        }
        self.used_storage = self.used_storage.saturating_sub(img.used_storage());
        self.layers_dirty = true;
        debug!(
            "removed image internal_id={:?} client_id={} freed={} bytes",
            img.internal_id(),
            img.client_id(),
            img.used_storage()
        );
    }

    /// Removes every image matching `predicate`, except `skip`, scanning
    /// back-to-front so removal doesn't disturb indices still to be visited
    /// (mirrors the original's `remove_images`).
    fn remove_images_where(&mut self, skip: Option<InternalId>, predicate: impl Fn(&Image) -> bool) {
        for idx in (0..self.images.len()).rev() {
            let img = &self.images[idx];
            if Some(img.internal_id()) != skip && predicate(img) {
                self.remove_image_at(idx);
            }
        }
    }

    /// Folds a [`Result`] into a protocol response string per §4.1 and the
    /// original's `finish_command_response`: identity-bearing commands
    /// always get a response unless quieted; a successful partial-chunk add
    /// (`data_loaded == false`) gets none.
    fn finish_response(
        quiet: crate::command::Quiet,
        data_loaded: bool,
        result: &Result<(), Error>,
        iid: u32,
        image_number: u32,
        placement_id: u32,
    ) -> Option<String> {
        use crate::command::Quiet;

        let is_ok = result.is_ok();
        if let Quiet::Silent = quiet {
            return None;
        }
        if is_ok {
            if let Quiet::ErrorsOnly = quiet {
                return None;
            }
        }
        if iid == 0 && image_number == 0 {
            return None;
        }
        if is_ok && !data_loaded {
            return None;
        }

        let mut out = String::from("G");
        if iid != 0 {
            out.push_str(&format!("i={iid}"));
        }
        if image_number != 0 {
            out.push_str(&format!(",I={image_number}"));
        }
        if placement_id != 0 {
            out.push_str(&format!(",p={placement_id}"));
        }
        out.push(';');
        match result {
            Ok(()) => out.push_str("OK"),
            Err(err) => out.push_str(&err.to_string()),
        }
        Some(out)
    }

    /// Routes one parsed command to its handler and builds the response
    /// string, per spec §4.1 (mirrors `grman_handle_command`).
    pub fn handle_command(
        &mut self,
        cmd: &GraphicsCommand,
        payload: &[u8],
        cursor: &mut crate::cursor::Cursor,
        cell: CellSize,
    ) -> Option<String> {
        if cmd.id != 0 && cmd.image_number != 0 {
            let err = Error::invalid("Must not specify both image id and image number");
            return Self::finish_response(cmd.quiet, false, &Err(err), cmd.id, cmd.image_number, cmd.placement_id);
        }

        match cmd.action {
            Action::Transmit | Action::TransmitAndDisplay | Action::Query => {
                self.dispatch_add(cmd, payload, cursor, cell)
            }
            Action::Put => {
                if cmd.id == 0 && cmd.image_number == 0 {
                    warn!("Put graphics command without image id or number");
                    return None;
                }
                let result = self.put(cmd, cursor, cell, None);
                let iid = result.as_ref().map(|id| *id).unwrap_or(cmd.id);
                let result_unit = result.map(|_| ());
                Self::finish_response(cmd.quiet, true, &result_unit, iid, cmd.image_number, cmd.placement_id)
            }
            Action::Delete => {
                self.delete(cmd, cursor, cell);
                None
            }
        }
    }

    fn dispatch_add(
        &mut self,
        cmd: &GraphicsCommand,
        payload: &[u8],
        cursor: &mut crate::cursor::Cursor,
        cell: CellSize,
    ) -> Option<String> {
        let is_query = matches!(cmd.action, Action::Query);
        let requested_iid = cmd.id;
        let iid_for_add = if is_query { 0 } else { cmd.id };
        if is_query && requested_iid == 0 {
            warn!("Query graphics command without image id");
            return None;
        }

        let outcome = self.add(cmd, payload, iid_for_add);

        let (response, added_internal_id, data_loaded, init_action) = match outcome {
            Ok(AddOutcome::Partial) => {
                return None;
            }
            Ok(AddOutcome::Complete { internal_id, init_id, init_number, init_placement, action }) => {
                let resp = if is_query {
                    Self::finish_response(cmd.quiet, true, &Ok(()), requested_iid, 0, 0)
                } else {
                    Self::finish_response(cmd.quiet, true, &Ok(()), init_id, init_number, init_placement)
                };
                (resp, Some(internal_id), true, action)
            }
            Err(err) => {
                let resp = if is_query {
                    Self::finish_response(cmd.quiet, false, &Err(err), requested_iid, 0, 0)
                } else {
                    Self::finish_response(cmd.quiet, false, &Err(err), cmd.id, cmd.image_number, cmd.placement_id)
                };
                (resp, None, false, cmd.action)
            }
        };

        if let (Action::TransmitAndDisplay, Some(internal_id)) = (init_action, added_internal_id) {
            if data_loaded {
                if let Some(init_cmd) = self.last_init_command.clone() {
                    let _ = self.put(&init_cmd, cursor, cell, Some(internal_id));
                }
            }
        }

        if is_query {
            self.trim_unreferenced_unnamed();
        }

        if self.used_storage > self.config.storage_limit_bytes() {
            self.apply_storage_quota(added_internal_id);
        }

        response
    }
}

/// What a single [`GraphicsManager::add`] call produced, used internally to
/// decide whether a `T` action should immediately put, and which identity
/// the response should quote.
enum AddOutcome {
    /// A chunk landed but the image isn't fully assembled/decoded yet; no
    /// response is produced for this (spec §4.1).
    Partial,
    Complete {
        internal_id: InternalId,
        init_id: u32,
        init_number: u32,
        init_placement: u32,
        action: Action,
    },
}
