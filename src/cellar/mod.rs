//! Wine cellar demo resource.
//!
//! `sommelier` holds the business logic; `server` is the HTTP marshalling
//! layer mounting it on a [`Service`](crate::http::Service).

pub mod server;
pub mod sommelier;

pub use server::mount;
pub use sommelier::{Criteria, PickError, Sommelier, StoredBottle};
