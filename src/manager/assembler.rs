//! The Transmission Assembler and the `add` handler that drives it
//! end-to-end into a decoded, possibly GPU-uploaded bitmap (spec §4.2,
//! §4.3; the original's `handle_add_command`).

use std::fs::File;
use std::rc::Rc;

use crate::command::{Action, Compression, GraphicsCommand, ImageFormat, TransmissionType};
use crate::error::Error;

use super::decode::{self, DecodedBitmap};
use super::image::{GpuTexture, Image, LoadBytes, LoadData};
use super::{AddOutcome, GraphicsManager, InternalId};

impl GraphicsManager {
    /// Assembles (and, once fully assembled, decodes and uploads) one
    /// chunk of an `add`/`query`/`T` command. `iid` is `0` for a query
    /// (which never names a persistent image) or the raw `cmd.id`
    /// otherwise.
    pub(crate) fn add(
        &mut self,
        cmd: &GraphicsCommand,
        payload: &[u8],
        iid: u32,
    ) -> Result<AddOutcome, Error> {
        let is_direct = matches!(cmd.transmission_type, TransmissionType::Direct);
        let init_img = !(is_direct && self.loading_image.is_some());

        let image_idx = if init_img {
            self.begin_transmission(cmd, iid)?
        } else {
            self.continue_transmission(cmd)?
        };

        let working_cmd = self
            .last_init_command
            .clone()
            .expect("begin/continue_transmission always populate last_init_command");

        if let Err(err) = self.assemble_chunk(&working_cmd, payload, image_idx) {
            self.teardown_loading(image_idx);
            return Err(err);
        }

        if !self.images[image_idx].data_loaded {
            return Ok(AddOutcome::Partial);
        }
        self.loading_image = None;

        if let Err(err) = self.finish_decode(&working_cmd, image_idx) {
            self.teardown_loading(image_idx);
            return Err(err);
        }

        let img = &self.images[image_idx];
        Ok(AddOutcome::Complete {
            internal_id: img.internal_id(),
            init_id: working_cmd.id,
            init_number: working_cmd.image_number,
            init_placement: working_cmd.placement_id,
            action: working_cmd.action,
        })
    }

    /// First chunk of a new (or newly-restarted) transmission: resolves or
    /// creates the target image, resets its staging state, and sizes its
    /// load buffer.
    fn begin_transmission(&mut self, cmd: &GraphicsCommand, iid: u32) -> Result<usize, Error> {
        self.loading_image = None;

        let max_dim = self.config.max_image_dimension();
        if cmd.data_width > max_dim || cmd.data_height > max_dim {
            return Err(Error::invalid("Image too large"));
        }

        // Every format-specific precondition is checked before any image is
        // resolved/created: a rejected add must not leave an orphaned
        // anonymous image behind for a later trim pass to clean up.
        let (expected_size, is_opaque, is_4byte_aligned) = match cmd.format {
            ImageFormat::Png => {
                if cmd.data_sz > self.config.max_direct_transmission_bytes() {
                    return Err(Error::invalid("PNG data size too large"));
                }
                let expected = if cmd.data_sz != 0 { cmd.data_sz } else { 1024 * 100 };
                (expected, false, true)
            }
            ImageFormat::Rgb | ImageFormat::Rgba => {
                let bpp = cmd.format.bytes_per_pixel().expect("raw formats have a fixed pixel size") as usize;
                let expected = cmd.data_width as usize * cmd.data_height as usize * bpp;
                if expected == 0 {
                    return Err(Error::invalid("Zero width/height not allowed"));
                }
                let is_4byte_aligned = matches!(cmd.format, ImageFormat::Rgba) || cmd.data_width % 4 == 0;
                (expected, matches!(cmd.format, ImageFormat::Rgb), is_4byte_aligned)
            }
        };

        self.trim_before_add();

        let (idx, existing) = self.find_or_create_image(iid);
        let mut init_cmd = cmd.clone();
        init_cmd.id = iid;

        if existing {
            let img = &mut self.images[idx];
            img.load = LoadData::default();
            img.data_loaded = false;
            img.refs.clear();
            self.layers_dirty = true;
        } else {
            let img = &mut self.images[idx];
            img.client_id = iid;
            img.client_number = cmd.image_number;
            if img.client_id == 0 && img.client_number != 0 {
                img.client_id = self.free_client_id();
                init_cmd.id = img.client_id;
            }
        }

        {
            let img = &mut self.images[idx];
            img.touch();
            img.used_storage = 0;
            img.width = cmd.data_width;
            img.height = cmd.data_height;
            img.load.expected_size = expected_size;
            img.load.is_opaque = is_opaque;
            img.load.is_4byte_aligned = is_4byte_aligned;
        }

        if is_direct(cmd) {
            if cmd.more {
                self.loading_image = Some(self.images[idx].internal_id());
            }
            let slack = if matches!(cmd.compressed, Compression::Zlib) { 1024 } else { 10 };
            let capacity = self.images[idx].load.expected_size + slack;
            self.images[idx].load.bytes = LoadBytes::Owned(Vec::with_capacity(capacity));
        }

        self.last_init_command = Some(init_cmd);
        Ok(idx)
    }

    /// A continuation chunk: locates the image `loading_image` names and
    /// folds this chunk's `more`/`payload_sz` into the saved init command.
    fn continue_transmission(&mut self, cmd: &GraphicsCommand) -> Result<usize, Error> {
        let mut init_cmd = self.last_init_command.clone().ok_or_else(|| {
            self.loading_image = None;
            Error::illegal_sequence("More payload loading refers to non-existent image")
        })?;
        init_cmd.more = cmd.more;
        init_cmd.payload_sz = cmd.payload_sz;

        let loading_id = match self.loading_image {
            Some(id) => id,
            None => return Err(Error::illegal_sequence("More payload loading refers to non-existent image")),
        };
        let idx = match self.images.iter().position(|img| img.internal_id() == loading_id) {
            Some(idx) => idx,
            None => {
                self.loading_image = None;
                return Err(Error::illegal_sequence("More payload loading refers to non-existent image"));
            }
        };

        self.last_init_command = Some(init_cmd);
        Ok(idx)
    }

    fn teardown_loading(&mut self, idx: usize) {
        self.loading_image = None;
        if let Some(img) = self.images.get_mut(idx) {
            img.data_loaded = false;
            img.load = LoadData::default();
        }
    }

    fn assemble_chunk(&mut self, cmd: &GraphicsCommand, payload: &[u8], idx: usize) -> Result<(), Error> {
        match cmd.transmission_type {
            TransmissionType::Direct => self.assemble_direct(cmd, payload, idx),
            TransmissionType::File | TransmissionType::TempFile | TransmissionType::SharedMemory => {
                self.assemble_mapped(cmd, payload, idx)
            }
        }
    }

    /// Appends `payload` to the direct transmission buffer, growing it
    /// geometrically (capped at `max_direct_transmission_bytes`) only for
    /// PNG payloads, whose declared size is a guess — a raw RGB/RGBA
    /// payload's size is known exactly up front, so any overflow there is a
    /// protocol violation rather than something to grow past (spec §4.2,
    /// §9 "growth clamp" note).
    fn assemble_direct(&mut self, cmd: &GraphicsCommand, payload: &[u8], idx: usize) -> Result<(), Error> {
        let max = self.config.max_direct_transmission_bytes();
        let is_png = matches!(cmd.format, ImageFormat::Png);

        let img = &mut self.images[idx];
        let buf = match &mut img.load.bytes {
            LoadBytes::Owned(buf) => buf,
            _ => return Err(Error::invalid("Direct transmission requires an owned buffer")),
        };

        let needed = buf.len() + payload.len();
        if needed > buf.capacity() {
            if needed > max || !is_png {
                return Err(Error::too_big("Too much data"));
            }
            let new_capacity = buf.capacity().saturating_mul(2).min(max);
            if new_capacity < needed {
                return Err(Error::too_big("Too much data"));
            }
            buf.reserve(new_capacity - buf.len());
            trace!("direct transmission buffer grown to {new_capacity} bytes");
        }

        buf.extend_from_slice(payload);
        if !cmd.more {
            img.data_loaded = true;
        }
        Ok(())
    }

    /// Maps a file (`t=f`/`t=t`) or shared-memory segment (`t=s`) named by
    /// `payload` into the image's load buffer (spec §4.2).
    fn assemble_mapped(&mut self, cmd: &GraphicsCommand, payload: &[u8], idx: usize) -> Result<(), Error> {
        if payload.len() > 2048 {
            return Err(Error::invalid("Filename too long"));
        }
        let name = std::str::from_utf8(payload)
            .map_err(|_| Error::invalid("Filename is not valid UTF-8"))?;

        match cmd.transmission_type {
            TransmissionType::File | TransmissionType::TempFile => {
                let file = File::open(name).map_err(|e| {
                    Error::bad_file(format!(
                        "Failed to open file for graphics transmission with error: {e}"
                    ))
                })?;
                let size = if cmd.data_sz != 0 {
                    cmd.data_sz as u64
                } else {
                    file.metadata()
                        .map_err(|e| Error::bad_file(format!("Failed to fstat() the file with error: {e}")))?
                        .len()
                };
                let mmap = unsafe {
                    memmap2::MmapOptions::new()
                        .offset(cmd.data_offset)
                        .len(size as usize)
                        .map(&file)
                }
                .map_err(|e| {
                    Error::bad_file(format!(
                        "Failed to map image file at offset: {} with size: {size} with error: {e}",
                        cmd.data_offset
                    ))
                })?;
                self.images[idx].load.bytes = LoadBytes::Mapped(mmap);
                self.images[idx].data_loaded = true;

                if matches!(cmd.transmission_type, TransmissionType::TempFile) {
                    self.temp_file_cleanup.delete_temp_file(name);
                }
            }
            TransmissionType::SharedMemory => {
                let mut shmem = shared_memory::ShmemConf::new()
                    .os_id(name)
                    .open()
                    .map_err(|e| {
                        Error::bad_file(format!(
                            "Failed to open shared memory segment {name} with error: {e}"
                        ))
                    })?;
                shmem.set_owner(true);
                self.images[idx].load.bytes = LoadBytes::Shm(shmem);
                self.images[idx].data_loaded = true;
            }
            TransmissionType::Direct => unreachable!("handled by assemble_direct"),
        }
        Ok(())
    }

    /// Decompresses/decodes the fully-assembled payload and either uploads
    /// it to the GPU collaborator or retains it in memory, per
    /// `gpu_uploads_enabled` (spec §4.3).
    fn finish_decode(&mut self, cmd: &GraphicsCommand, idx: usize) -> Result<(), Error> {
        let needs_processing = matches!(cmd.compressed, Compression::Zlib) || matches!(cmd.format, ImageFormat::Png);

        if !needs_processing {
            let img = &self.images[idx];
            let actual = img.load.bytes.len();
            if actual < img.load.expected_size {
                return Err(Error::no_data(format!(
                    "Insufficient image data: {actual} < {}",
                    img.load.expected_size
                )));
            }
        }

        let decoded = {
            let img = &self.images[idx];
            decode::decode(cmd.format, cmd.compressed, cmd.data_width, cmd.data_height, img.load.bytes.as_slice())?
        };

        self.finish_upload(idx, decoded)
    }

    fn finish_upload(&mut self, idx: usize, decoded: DecodedBitmap) -> Result<(), Error> {
        let bytes_per_pixel = if decoded.is_opaque { 3 } else { 4 };
        let is_4byte_aligned = decoded.is_4byte_aligned(bytes_per_pixel);
        let gpu_enabled = self.config.gpu_uploads_enabled();
        let size = decoded.bytes.len();

        {
            let img = &mut self.images[idx];
            img.width = decoded.width;
            img.height = decoded.height;
            img.load.is_opaque = decoded.is_opaque;
            img.load.is_4byte_aligned = is_4byte_aligned;
            img.data_loaded = true;
        }

        if gpu_enabled {
            let texture_id = self.gpu.borrow_mut().upload_texture(
                &decoded.bytes,
                decoded.width,
                decoded.height,
                decoded.is_opaque,
                is_4byte_aligned,
            )?;
            let img = &mut self.images[idx];
            img.texture = Some(GpuTexture::new(Rc::clone(&self.gpu), texture_id));
            img.load.bytes = LoadBytes::Empty;
        } else {
            let img = &mut self.images[idx];
            img.load.bytes = LoadBytes::Owned(decoded.bytes);
        }

        let img = &mut self.images[idx];
        img.used_storage = size;
        self.used_storage += size;
        Ok(())
    }
}

fn is_direct(cmd: &GraphicsCommand) -> bool {
    matches!(cmd.transmission_type, TransmissionType::Direct)
}
