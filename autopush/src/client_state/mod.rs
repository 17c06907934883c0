//! Probabilistic client-side cache state.
//!
//! A [`ClientCacheChecker`] answers "might this client already have path X?"
//! with no false negatives and a bounded false-positive rate. It round-trips
//! through an opaque token that the caller hands to the client (typically in
//! a cookie) and receives back on the next request.
//!
//! # Example
//!
//! ```
//! use autopush::client_state::ClientCacheChecker;
//!
//! let mut checker = ClientCacheChecker::new();
//! checker.add_path("/app.js");
//!
//! let token = checker.serialize();
//! let restored = ClientCacheChecker::deserialize(&token);
//! assert!(restored.may_have_path("/app.js"));
//!
//! // Garbage never raises; it just starts over.
//! let fresh = ClientCacheChecker::deserialize("not a token");
//! assert!(!fresh.may_have_path("/app.js"));
//! ```

mod bloom;
mod checker;
mod token;

pub use checker::{
    bits_for_capacity, max_capacity, ClientCacheChecker, DEFAULT_MAX_PATHS, FALSE_POSITIVE_RATE,
    HASH_COUNT,
};
pub use token::{TokenError, MAX_FILTER_BITS, MAX_TOKEN_BYTES, TOKEN_VERSION};
