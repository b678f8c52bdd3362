//! Shared-memory write/unlink test helpers (SPEC_FULL.md §10.5; the
//! original's `shm_write`/`shm_unlink` module functions, used by its own
//! Python test harness to stage a segment before asking the core to map it
//! back). The core's mainline path only ever reads an already-open `t=s`
//! segment (see [`super::assembler`]); writing one is only ever done by a
//! test standing in for the client side of the protocol.

use shared_memory::ShmemConf;

/// Creates (or opens) a named shared-memory segment and writes `data` into
/// it, returning once the write is complete. Panics on failure — this only
/// ever runs inside a test's setup, where a failure should abort the test
/// immediately rather than be handled.
pub(crate) fn write_test_segment(name: &str, data: &[u8]) {
    let mut shmem = ShmemConf::new()
        .os_id(name)
        .size(data.len().max(1))
        .create()
        .expect("failed to create shared memory segment for test");
    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), shmem.as_ptr(), data.len());
    }
    shmem.set_owner(false);
}

/// Removes a segment created by [`write_test_segment`], for tests that
/// don't rely on the manager's own `set_owner(true)` unlink-on-drop to
/// clean up (e.g. a test that never actually transmits the segment).
pub(crate) fn unlink_segment(name: &str) {
    if let Ok(mut shmem) = ShmemConf::new().os_id(name).open() {
        shmem.set_owner(true);
    }
}
