//! # storefront-runtime
//!
//! Runtime backends for the storefront.
//!
//! ## Backends
//!
//! - **Supabase** (default): PostgREST tables plus GoTrue auth
//! - **Memory**: `storefront_core::MemoryStore` and `MemoryAuthProvider`,
//!   used when Supabase is not configured
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_runtime::supabase::{GoTrueAuth, PostgrestStore, SupabaseConfig};
//!
//! let config = SupabaseConfig::from_env()?;
//! let store = Arc::new(PostgrestStore::new(config.clone()));
//! let auth = Arc::new(GoTrueAuth::new(config));
//! ```

#[cfg(feature = "supabase")]
pub mod supabase;

#[cfg(feature = "supabase")]
pub use supabase::{GoTrueAuth, PostgrestStore, SupabaseConfig};

// Re-export core types for convenience
pub use storefront_core::{AuthProvider, Result, ShopError, Store};
