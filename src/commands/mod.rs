/// The typed command surface (§6), written once per operation and blanket-
/// implemented over anything that can `Dispatcher::dispatch` a command —
/// `DirectClient`, `ClusterRouter`, and `ReplicationRouter` alike.
///
/// Grounded on the blanket-trait-over-a-single-client pattern in
/// `other_examples/.../dahomey-technologies-rustis__src-clients-multiplexed_client.rs`
/// (`impl<T> StringCommands for T where T: ClientTrait {}`), adapted so the
/// "client trait" here is our own `Dispatcher` seam instead of rustis's.
pub mod geo;
pub mod hashes;
pub mod keys;
pub mod lists;
pub mod objects;
pub mod sets;
pub mod sorted_sets;
pub mod strings;

pub use geo::GeoCommands;
pub use hashes::HashCommands;
pub use keys::KeyCommands;
pub use lists::ListCommands;
pub use objects::ObjectCommands;
pub use sets::SetCommands;
pub use sorted_sets::SortedSetCommands;
pub use strings::{CounterCommands, StringCommands};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::resp::RespEncoder;

pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_argument("key must not be empty"));
    }
    Ok(())
}

/// Build a command's wire bytes from byte-like parts, the first of which is
/// the command name.
pub(crate) fn encode<I, A>(parts: I) -> Bytes
where
    I: IntoIterator<Item = A>,
    A: AsRef<[u8]>,
{
    RespEncoder::encode_command(parts)
}
