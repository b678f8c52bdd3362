//! Storage & Eviction (spec §4.6; the original's `remove_images` trim passes
//! plus `apply_storage_quota`/`get_storage_limit`).
//!
//! Two trim predicates are at work here, both of which only ever discard
//! images nobody can reach anymore — never a live, referenced image:
//!
//! - the *add* predicate (`trim_before_add`): an image isn't loaded yet, or
//!   is both anonymous and placement-less. Run unconditionally before every
//!   add, and again after a `q` (query) action finishes, since a query never
//!   leaves behind anything worth keeping.
//! - the *quota* predicate (`apply_storage_quota`'s first pass): loaded or
//!   not, an image with no placements left is dead weight. Run only when
//!   `used_storage` has crept over the configured limit, followed by an
//!   oldest-`atime`-first sweep if that alone wasn't enough.

use super::{GraphicsManager, InternalId};

impl GraphicsManager {
    /// Drops images that are still mid-transmission or were never given an
    /// identity and never placed (spec §4.6 "add trim predicate").
    pub(crate) fn trim_before_add(&mut self) {
        self.remove_images_where(None, |img| {
            !img.data_loaded() || (img.client_id() == 0 && img.placement_count() == 0)
        });
    }

    /// Same predicate, run once after a query (`a=q`) finishes — a query
    /// never creates a placement, so anything it left anonymous is garbage
    /// immediately (spec §4.1, §4.6).
    pub(crate) fn trim_unreferenced_unnamed(&mut self) {
        self.trim_before_add();
    }

    /// Enforces `storage_limit_bytes` after a successful add (spec §4.6).
    /// First drops every unloaded-or-unplaced image except `skip` (the image
    /// that was just added, which may itself still be placement-less on a
    /// `T` add that hasn't landed its placement yet); if that alone isn't
    /// enough, evicts images oldest-`atime`-first until back under budget.
    pub(crate) fn apply_storage_quota(&mut self, skip: Option<InternalId>) {
        self.remove_images_where(skip, |img| !img.data_loaded() || img.placement_count() == 0);

        let limit = self.config.storage_limit_bytes();
        while self.used_storage > limit && !self.images.is_empty() {
            let oldest = self
                .images
                .iter()
                .enumerate()
                .min_by_key(|(_, img)| img.atime())
                .map(|(idx, _)| idx)
                .expect("images is non-empty");
            self.remove_image_at(oldest);
        }

        if self.images.is_empty() {
            // Defends against drift from `used_storage` bookkeeping elsewhere;
            // with no images left there's nothing left to account for.
            self.used_storage = 0;
        }
    }
}
