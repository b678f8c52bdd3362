//! The host-thread temp-file-cleanup collaborator (spec §1: "Temp-file/
//! shared-memory unlinking executed on the host thread" is out of scope —
//! specified only by the interface the assembler calls).
//!
//! A `t=t` (temporary file) transmission is supposed to have its backing
//! file removed once read. The original defers this to the boss/host thread
//! when one is running (`call_boss(safe_delete_temp_file, ...)`), and falls
//! back to a direct `unlink` otherwise. [`TempFileCleanup`] models that same
//! choice; shared-memory segments don't need this collaborator since their
//! unlink always happens immediately (spec §4.2).

/// Deletes a temporary file after its contents have been mapped and read.
/// Implementations must not panic — this runs inline in the assembler's
/// otherwise-infallible cleanup path.
pub trait TempFileCleanup {
    fn delete_temp_file(&mut self, path: &str);
}

/// The fallback used when no host collaborator is registered: unlink the
/// file directly on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectUnlink;

impl TempFileCleanup for DirectUnlink {
    fn delete_temp_file(&mut self, path: &str) {
        if let Err(err) = std::fs::remove_file(path) {
            warn!("failed to remove temp file {path}: {err}");
        }
    }
}
