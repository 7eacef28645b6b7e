//! ## Async WebDAV handler over filesystem mountpoints
//!
//! [Webdav] (RFC4918) is HTTP (GET/HEAD/PUT/DELETE) plus a set of
//! extension methods (PROPFIND, PROPPATCH, MKCOL, COPY, MOVE, LOCK,
//! UNLOCK) to manage collections, query and edit resource properties,
//! and take advisory locks.
//!
//! This library is a `handler`: it takes an `http::Request`, maps it
//! onto one of a set of configured *mountpoints* (URL prefixes bound to
//! filesystem directories), performs the WebDAV method against the
//! filesystem, and produces an `http::Response`. The HTTP transport is
//! up to the caller; anything that speaks the `http` and `http_body`
//! types can drive it.
//!
//! Levels 1 and 2 of RFC4918 are covered:
//!
//! - request URIs are translated into filesystem paths strictly inside
//!   the mounted docroot (symlink and dot-dot escapes are refused),
//! - PROPFIND/PROPPATCH with dead properties persisted as extended
//!   attributes on the resources themselves,
//! - MKCOL/COPY/MOVE/DELETE with RFC status-code semantics,
//! - LOCK/UNLOCK backed by a shared key/value cache, so several workers
//!   serve one consistent lock view. An in-process cache is built in;
//!   distributed deployments implement the [`DavCache`] trait.
//!
//! ## Example.
//!
//! ```no_run
//! use davmount::DavHandler;
//!
//! # async fn example(req: http::Request<davmount::Body>) {
//! let handler = DavHandler::builder()
//!     .mount("/dav", "/srv/dav")
//!     .css("/static/listing.css")
//!     .build()
//!     .unwrap();
//!
//! let response = handler.handle(req).await;
//! # let _ = response;
//! # }
//! ```
//!
//! [Webdav]: https://tools.ietf.org/html/rfc4918

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

mod davhandler;
mod davheaders;
mod errors;
mod fs;
mod multistatus;
mod util;
mod xmltree_ext;

pub mod body;
pub mod cache;
pub mod davpath;
pub mod locks;
pub mod mount;
pub mod props;

pub use crate::body::Body;
pub use crate::cache::{DavCache, MemCache};
pub use crate::davhandler::{DavBuilder, DavHandler};
pub use crate::errors::{DavError, DavResult};
pub use crate::locks::{DavLock, LockManager};
pub use crate::mount::Mountpoint;
pub use crate::props::DavProp;
pub use crate::util::{DavMethod, DavMethodSet};
