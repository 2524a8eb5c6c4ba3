pub mod redirect;
pub mod router;
pub mod slots;

pub use router::ClusterRouter;
pub use slots::{slot_for_key, SlotMap};
