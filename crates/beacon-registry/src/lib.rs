//! Partitioned service registry.
//!
//! Services are grouped into categories (peer types). Each category owns a
//! consistent hash ring ([`beacon_ring::HashRing`]) of the addresses
//! serving it, while a shared index maps every address to the named
//! entries registered there.
//!
//! - [`Registry`]: the ring set plus index, with `add`, `remove`, `update`
//!   and the [`Info`] snapshot.
//! - [`EventAdapter`]: maps membership events onto registry calls.
//! - [`listener::start`]: background task pumping an
//!   [`beacon_types::EventBus`] subscription into an [`EventHandler`].
//!
//! Removing a key evicts its whole address from the category ring, so
//! other names registered at the same address disappear from that
//! category's view as well. Their index entries stay until they are
//! removed individually.

mod adapter;
mod key;
pub mod listener;
mod registry;

pub use adapter::{EventAdapter, EventHandler};
pub use key::{Entry, Key, MemberKey};
pub use listener::ListenerHandle;
pub use registry::{Info, Registry, VirtualNode};
