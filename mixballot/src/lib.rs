#[macro_use]
extern crate serde;

mod crypto;
mod error;
mod hybrid;
mod mix;
mod onion;
mod serde_hex;
mod shard;
mod transport;

pub use crypto::*;
pub use error::*;
pub use hybrid::*;
pub use mix::*;
pub use onion::*;
pub use serde_hex::*;
pub use shard::*;
pub use transport::*;

#[cfg(test)]
mod tests;
