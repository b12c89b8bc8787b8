pub mod canonical;
pub mod command;
pub mod identity;
pub mod wire;

pub use command::{Command, SignedCommand};
pub use identity::{Identity, IdentityStore, MemoryIdentityStore};
pub use wire::{Response, Status};

use commonware_utils::union;

/// Namespace under which all command signatures are produced.
pub const NAMESPACE: &[u8] = b"_SIGNPOST";
pub const COMMAND_SUFFIX: &[u8] = b"_CMD";

#[inline]
pub fn command_namespace(namespace: &[u8]) -> Vec<u8> {
    union(namespace, COMMAND_SUFFIX)
}
