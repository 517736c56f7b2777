//! Index capability interface and the exact reference index.
//!
//! - [`SearchIndex`]: what the orchestrator needs from any index under test.
//! - [`SharedIndex`]: the same surface for concurrent insert + search.
//! - [`IndexBuilder`]: deferred, named construction used by configurations.
//! - [`FlatIndex`]: exhaustive search, the ground-truth oracle's backend.
//!
//! ```rust,ignore
//! use anneval::ann::{builder_fn, SearchIndex};
//!
//! let ivf = builder_fn("IVF100,nprobe=8", |d, metric| {
//!     Ok(Box::new(MyIvf::new(d, metric, 100, 8)) as Box<dyn SearchIndex>)
//! });
//! ```

pub mod flat;
pub mod traits;

pub use flat::{FlatBuilder, FlatIndex};
pub use traits::{builder_fn, row_count, FnBuilder, IndexBuilder, SearchIndex, SharedIndex};
