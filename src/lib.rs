//! An async RESP client library for single-node, replicated, and clustered
//! Redis deployments.
//!
//! The crate is organized around one seam, [`dispatch::Dispatcher`]: each of
//! [`direct_client::DirectClient`], [`cluster::ClusterRouter`], and
//! [`replication::ReplicationRouter`] implements it, and every typed command
//! trait under [`commands`] is written once as a blanket implementation over
//! that trait. [`subscriber::Subscriber`] and [`lock::DistributedLock`] sit
//! outside the request/reply seam: pub/sub pushes frames with no
//! corresponding request, so it runs its own connection and read loop.

pub mod channel;
pub mod client_pool;
pub mod cluster;
pub mod command;
pub mod command_meta;
pub mod commands;
pub mod config;
pub mod consistent_hash;
pub mod direct_client;
pub mod dispatch;
pub mod error;
pub mod lock;
pub mod observer;
pub mod replication;
pub mod reply;
pub mod resp;
pub mod subscriber;
pub mod value_codec;

pub use channel::{Channel, ChannelConfig, ChannelState};
pub use cluster::ClusterRouter;
pub use commands::{
    CounterCommands, GeoCommands, HashCommands, KeyCommands, ListCommands, ObjectCommands,
    SetCommands, SortedSetCommands, StringCommands,
};
pub use config::Config;
pub use consistent_hash::ConsistentHashLocator;
pub use direct_client::DirectClient;
pub use dispatch::{DispatchContext, Dispatcher};
pub use error::{Error, Result};
pub use lock::{DistributedLock, LockInfo};
pub use observer::{CountingObserver, NoopObserver, Observer};
pub use replication::ReplicationRouter;
pub use resp::{RespEncoder, RespParser, RespValue};
pub use subscriber::{DispatchMode, Subscriber};
pub use value_codec::{CompressingCodec, RawCodec, ValueCodec};
