//! SQLite-backed product catalog for Shelfscout.
//!
//! This crate holds the relational collaborator the chat runtime consults for
//! authoritative product data. The catalog is deliberately small: products are
//! keyed by id, carry a few typed columns (name, price, category), and stash
//! everything else in a free-form JSON `attributes` column so upstream CRUD
//! surfaces can evolve without schema migrations here.
//!
//! # Example
//!
//! ```no_run
//! use storage::{Product, ProductStore};
//!
//! let store = ProductStore::open("catalog.db")?;
//! store.upsert(&Product::new("sku-1042", "Wireless Headphones"))?;
//!
//! if let Some(product) = store.get("sku-1042")? {
//!     println!("{}: {} {}", product.id, product.price, product.currency);
//! }
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod product;
mod store;

pub use error::{Error, Result};
pub use product::Product;
pub use store::ProductStore;
