// Catalog store on SQLite

use std::path::Path;

use rusqlite::{params, Connection, Transaction};
use tracing::debug;

use inventa_core::{PersistedId, PersistedProduct, ProductRecord};
use inventa_recon::{CatalogGateway, CatalogTransaction, GatewayError};

/// Catalog table. Identity is not unique in the schema; the engine treats
/// repeated `(laboratory, name, presentation)` rows as one key.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inventory (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    laboratory TEXT NOT NULL,
    name TEXT NOT NULL,
    presentation TEXT NOT NULL,
    price REAL NOT NULL DEFAULT 0,
    stock INTEGER NOT NULL DEFAULT 0
);
"#;

fn store_err(e: rusqlite::Error) -> GatewayError {
    GatewayError::new(e.to_string())
}

/// [`CatalogGateway`] over one SQLite database file. Only the `inventory`
/// table is ever read or written; other tables in the same file are left
/// alone.
pub struct SqliteGateway {
    conn: Connection,
}

impl SqliteGateway {
    pub fn open(path: &Path) -> Result<Self, GatewayError> {
        let conn = Connection::open(path).map_err(store_err)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, GatewayError> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Ok(Self { conn })
    }

    /// Create the catalog table if it does not exist.
    pub fn init_schema(&self) -> Result<(), GatewayError> {
        self.conn.execute_batch(SCHEMA).map_err(store_err)
    }

    pub fn count(&self) -> Result<usize, GatewayError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM inventory", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(store_err)
    }

    /// Laboratories by product count, largest first.
    pub fn laboratory_counts(&self, limit: usize) -> Result<Vec<(String, usize)>, GatewayError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT laboratory, COUNT(*) AS n FROM inventory \
                 GROUP BY laboratory ORDER BY n DESC, laboratory ASC LIMIT ?1",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }
}

impl CatalogGateway for SqliteGateway {
    type Tx<'a> = SqliteTransaction<'a>;

    fn load_all(&self) -> Result<Vec<PersistedProduct>, GatewayError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, laboratory, name, presentation, price, stock FROM inventory ORDER BY id")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PersistedProduct {
                    id: row.get(0)?,
                    laboratory: row.get(1)?,
                    name: row.get(2)?,
                    presentation: row.get(3)?,
                    price: row.get(4)?,
                    stock: row.get(5)?,
                })
            })
            .map_err(store_err)?;
        let products = rows.collect::<Result<Vec<_>, _>>().map_err(store_err)?;
        debug!(rows = products.len(), "loaded inventory");
        Ok(products)
    }

    fn begin(&mut self) -> Result<SqliteTransaction<'_>, GatewayError> {
        let tx = self.conn.transaction().map_err(store_err)?;
        Ok(SqliteTransaction { tx })
    }
}

/// Open write transaction. Rolls back on drop unless committed.
pub struct SqliteTransaction<'a> {
    tx: Transaction<'a>,
}

impl CatalogTransaction for SqliteTransaction<'_> {
    fn insert_many(&mut self, records: &[ProductRecord]) -> Result<usize, GatewayError> {
        let mut stmt = self
            .tx
            .prepare_cached(
                "INSERT INTO inventory (laboratory, name, presentation, price, stock) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(store_err)?;
        for r in records {
            stmt.execute(params![r.laboratory, r.name, r.presentation, r.price, r.stock])
                .map_err(store_err)?;
        }
        Ok(records.len())
    }

    fn delete_by_persisted_id(&mut self, ids: &[PersistedId]) -> Result<usize, GatewayError> {
        let mut stmt = self
            .tx
            .prepare_cached("DELETE FROM inventory WHERE id = ?1")
            .map_err(store_err)?;
        let mut deleted = 0;
        for id in ids {
            deleted += stmt.execute(params![id]).map_err(store_err)?;
        }
        Ok(deleted)
    }

    fn delete_out_of_stock(&mut self, ids: &[PersistedId]) -> Result<Vec<PersistedId>, GatewayError> {
        let mut stmt = self
            .tx
            .prepare_cached("DELETE FROM inventory WHERE id = ?1 AND stock = 0")
            .map_err(store_err)?;
        let mut deleted = Vec::new();
        for &id in ids {
            if stmt.execute(params![id]).map_err(store_err)? > 0 {
                deleted.push(id);
            }
        }
        Ok(deleted)
    }

    fn delete_all(&mut self) -> Result<usize, GatewayError> {
        self.tx.execute("DELETE FROM inventory", []).map_err(store_err)
    }

    fn commit(self) -> Result<(), GatewayError> {
        self.tx.commit().map_err(store_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lab: &str, name: &str) -> ProductRecord {
        ProductRecord {
            code: "123456789".into(),
            name: name.into(),
            presentation: "Caja x10".into(),
            laboratory: lab.into(),
            category: None,
            price: 0.0,
            stock: 100,
        }
    }

    fn store() -> SqliteGateway {
        let gw = SqliteGateway::open_in_memory().unwrap();
        gw.init_schema().unwrap();
        gw
    }

    #[test]
    fn insert_load_delete() {
        let mut gw = store();
        let mut tx = gw.begin().unwrap();
        tx.insert_many(&[record("ACME", "Paracetamol 500mg"), record("GENFAR", "Ibuprofeno 400mg")])
            .unwrap();
        tx.commit().unwrap();

        let rows = gw.load_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].laboratory, "ACME");
        assert_eq!(rows[0].stock, 100);

        let mut tx = gw.begin().unwrap();
        assert_eq!(tx.delete_by_persisted_id(&[rows[0].id, 9999]).unwrap(), 1);
        tx.commit().unwrap();
        assert_eq!(gw.count().unwrap(), 1);
    }

    #[test]
    fn out_of_stock_delete_rechecks_stock() {
        let mut gw = store();
        let mut empty = record("ACME", "Paracetamol 500mg");
        empty.stock = 0;
        let mut other = record("GENFAR", "Ibuprofeno 400mg");
        other.stock = 0;
        let mut tx = gw.begin().unwrap();
        tx.insert_many(&[empty, other]).unwrap();
        tx.commit().unwrap();
        let rows = gw.load_all().unwrap();

        // Restocked after the rows were read.
        gw.conn
            .execute("UPDATE inventory SET stock = 12 WHERE id = ?1", params![rows[1].id])
            .unwrap();

        let mut tx = gw.begin().unwrap();
        let deleted = tx.delete_out_of_stock(&[rows[0].id, rows[1].id]).unwrap();
        tx.commit().unwrap();
        assert_eq!(deleted, vec![rows[0].id]);
        let left = gw.load_all().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].stock, 12);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let mut gw = store();
        {
            let mut tx = gw.begin().unwrap();
            tx.insert_many(&[record("ACME", "Paracetamol 500mg")]).unwrap();
        }
        assert_eq!(gw.count().unwrap(), 0);
    }

    #[test]
    fn laboratory_counts_sorted() {
        let mut gw = store();
        let mut tx = gw.begin().unwrap();
        tx.insert_many(&[
            record("GENFAR", "Producto uno"),
            record("ACME", "Producto dos"),
            record("GENFAR", "Producto tres"),
        ])
        .unwrap();
        tx.commit().unwrap();

        let counts = gw.laboratory_counts(10).unwrap();
        assert_eq!(counts, vec![("GENFAR".to_string(), 2), ("ACME".to_string(), 1)]);
        assert_eq!(gw.laboratory_counts(1).unwrap().len(), 1);
    }

    #[test]
    fn missing_table_is_gateway_error() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        let err = gw.load_all().unwrap_err();
        assert!(err.to_string().contains("no such table"));
    }
}
