//! SQLite product store implementation.

use crate::{Product, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

/// SQLite-backed product catalog.
pub struct ProductStore {
    conn: Connection,
}

impl ProductStore {
    /// Open or create a catalog at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory catalog (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                price REAL NOT NULL,
                currency TEXT NOT NULL,
                category TEXT NOT NULL,
                attributes TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_products_category
                ON products(category);
            "#,
        )?;
        Ok(())
    }

    /// Insert or replace a product.
    pub fn upsert(&self, product: &Product) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO products
                (id, name, description, price, currency, category, attributes, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                product.id,
                product.name,
                product.description,
                product.price,
                product.currency,
                product.category,
                serde_json::to_string(&product.attributes)?,
                product.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up a product by id.
    pub fn get(&self, id: &str) -> Result<Option<Product>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, description, price, currency, category, attributes, updated_at
                 FROM products WHERE id = ?1",
                [id],
                |row| {
                    let attributes: String = row.get(6)?;
                    let updated_at: String = row.get(7)?;
                    Ok((
                        Product {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            price: row.get(3)?,
                            currency: row.get(4)?,
                            category: row.get(5)?,
                            attributes: serde_json::Value::Null,
                            updated_at: chrono::Utc::now(),
                        },
                        attributes,
                        updated_at,
                    ))
                },
            )
            .optional()?;

        let Some((mut product, attributes, updated_at)) = row else {
            return Ok(None);
        };

        product.attributes = serde_json::from_str(&attributes)?;
        if let Ok(ts) = updated_at.parse() {
            product.updated_at = ts;
        }
        Ok(Some(product))
    }

    /// List all product ids, ordered for deterministic output.
    pub fn list_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM products ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upsert_and_get_round_trip() {
        let store = ProductStore::in_memory().unwrap();
        let product = Product::new("sku-1", "Wireless Headphones")
            .with_price(129.99, "USD")
            .with_category("audio")
            .with_attributes(json!({"color": "black", "battery_hours": 30}));
        store.upsert(&product).unwrap();

        let loaded = store.get("sku-1").unwrap().expect("product present");
        assert_eq!(loaded.name, "Wireless Headphones");
        assert_eq!(loaded.price, 129.99);
        assert_eq!(loaded.attributes["color"], "black");
    }

    #[test]
    fn get_missing_returns_none() {
        let store = ProductStore::in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_existing() {
        let store = ProductStore::in_memory().unwrap();
        store.upsert(&Product::new("sku-1", "Old Name")).unwrap();
        store
            .upsert(&Product::new("sku-1", "New Name").with_price(10.0, "EUR"))
            .unwrap();

        let loaded = store.get("sku-1").unwrap().unwrap();
        assert_eq!(loaded.name, "New Name");
        assert_eq!(loaded.currency, "EUR");
    }

    #[test]
    fn list_ids_is_ordered() {
        let store = ProductStore::in_memory().unwrap();
        store.upsert(&Product::new("b", "B")).unwrap();
        store.upsert(&Product::new("a", "A")).unwrap();
        assert_eq!(store.list_ids().unwrap(), vec!["a", "b"]);
    }
}
