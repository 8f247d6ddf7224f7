//! URL handling for search candidates
//!
//! Search results frequently list the same site more than once (with and
//! without `www.`, with tracking parameters, with a trailing slash). This
//! module reduces a URL to a key so each page is analyzed at most once per run.

mod normalize;

pub use normalize::{dedupe_key, site_domain};
