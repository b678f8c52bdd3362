//! Graphics manager core for a terminal emulator's inline image protocol.
//!
//! This crate owns the bookkeeping a terminal needs to support inline images:
//! reassembling chunked/mmap'd/shared-memory transmissions, decoding raw or
//! PNG pixel data, tracking every on-screen placement of a decoded image,
//! keeping those placements consistent as the cell grid scrolls or resizes,
//! enforcing a storage quota through eviction, and handing a renderer
//! per-frame vertex data. The wire-format parser, the GPU renderer, the
//! cursor object, and host-side file/shm cleanup are all collaborators this
//! crate only ever sees through a narrow interface — see [`gpu`],
//! [`cursor`], and [`disk_cache`].
//!
//! [`manager::GraphicsManager`] is the single stateful entry point; every
//! other module in this crate exists to support it.

#![deny(warnings)]
#![allow(dead_code)]

#[macro_use]
extern crate log;

pub mod command;
pub mod config;
pub mod cursor;
pub mod disk_cache;
pub mod error;
pub mod gpu;
pub mod host;
pub mod manager;
pub mod math;

/// Things used by almost every caller of this crate.
pub mod prelude {
    pub use crate::{
        command::{Action, Compression, GraphicsCommand, ImageFormat, Quiet, ScrollData, TransmissionType},
        config::Config,
        cursor::Cursor,
        error::{Error, ErrorKind},
        manager::GraphicsManager,
    };
}

pub use self::{config::Config, error::Error, manager::GraphicsManager};
