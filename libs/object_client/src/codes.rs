//! Wire-contract result codes.
//!
//! The object store reports submission outcomes as a single `i32`: `0` for
//! success, a negated POSIX-style code for failure. The constants here are
//! part of the wire contract between store and control plane, not host
//! errnos, so they are spelled out rather than pulled from libc.

pub const EIO: i32 = 5;
pub const ENOENT: i32 = 2;
pub const EBUSY: i32 = 16;
pub const EINVAL: i32 = 22;
pub const ENOSYS: i32 = 38;
pub const ECANCELED: i32 = 125;
