//! Bin catalog: book quantities per (bin, warehouse).

use anyhow::Result;

use super::{BinImport, BinRecord, Database};

impl Database {
    /// All bins of a warehouse, ordered by bin number.
    pub async fn get_bins(&self, warehouse_name: &str) -> Result<Vec<BinRecord>> {
        let rows = sqlx::query_as::<_, BinRecord>(
            "SELECT id, bin_no, warehouse_name, book_quantity, updated_at
             FROM bin_master WHERE warehouse_name = $1 ORDER BY bin_no",
        )
        .bind(warehouse_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_bin(&self, warehouse_name: &str, bin_no: &str) -> Result<Option<BinRecord>> {
        let row = sqlx::query_as::<_, BinRecord>(
            "SELECT id, bin_no, warehouse_name, book_quantity, updated_at
             FROM bin_master WHERE warehouse_name = $1 AND bin_no = $2",
        )
        .bind(warehouse_name)
        .bind(bin_no)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Upsert a batch of bins in one transaction. Returns the number written.
    pub async fn import_bins(&self, bins: &[BinImport]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for bin in bins {
            let result = sqlx::query(
                "INSERT INTO bin_master (bin_no, warehouse_name, book_quantity)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (bin_no, warehouse_name) DO UPDATE SET
                   book_quantity = EXCLUDED.book_quantity,
                   updated_at = NOW()",
            )
            .bind(bin.bin_no.trim())
            .bind(bin.warehouse_name.trim())
            .bind(bin.book_quantity)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }
        tx.commit().await?;
        Ok(written)
    }

    /// Change the book quantity of one bin. Returns `None` if the bin is unknown.
    pub async fn set_book_quantity(
        &self,
        warehouse_name: &str,
        bin_no: &str,
        book_quantity: i32,
    ) -> Result<Option<BinRecord>> {
        let row = sqlx::query_as::<_, BinRecord>(
            "UPDATE bin_master SET book_quantity = $3, updated_at = NOW()
             WHERE warehouse_name = $1 AND bin_no = $2
             RETURNING id, bin_no, warehouse_name, book_quantity, updated_at",
        )
        .bind(warehouse_name)
        .bind(bin_no)
        .bind(book_quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
