//! # Recorder: Count Submission Rules
//!
//! Checks a count before it is stored and decides which book quantity the
//! record snapshots.
//!
//! With `trust_client_book_quantity = false` the catalog value always wins;
//! a differing client value is reported back so the caller can log it, and a
//! bin missing from the catalog is refused. With `true` the client value is
//! stored as sent and must be present.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountRejection {
    #[error("binNo is required")]
    MissingBin,
    #[error("qtyCountedWorker must be a non-negative integer")]
    NegativeQuantity,
    #[error("quantity {0} is out of range")]
    OutOfRange(i64),
    #[error("qtyAsPerBooks is required")]
    MissingBookQuantity,
    #[error("Bin {bin_no} not found in warehouse {warehouse}")]
    UncataloguedBin { bin_no: String, warehouse: String },
}

impl CountRejection {
    /// Whether the rejection is a missing resource rather than bad input.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CountRejection::UncataloguedBin { .. })
    }
}

/// Book quantity chosen for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookQuantity {
    pub value: i32,
    /// Client value that disagreed with the catalog and was dropped.
    pub ignored_client: Option<i64>,
}

fn to_quantity(value: i64) -> Result<i32, CountRejection> {
    if value < 0 {
        return Err(CountRejection::NegativeQuantity);
    }
    i32::try_from(value).map_err(|_| CountRejection::OutOfRange(value))
}

/// Trimmed bin number and counted quantity, or why they are unusable.
pub fn validate_count(bin_no: &str, counted: i64) -> Result<(String, i32), CountRejection> {
    let bin_no = bin_no.trim();
    if bin_no.is_empty() {
        return Err(CountRejection::MissingBin);
    }
    Ok((bin_no.to_string(), to_quantity(counted)?))
}

/// Pick the book quantity per the trust policy.
///
/// `catalog` is the bin's catalog quantity in the session's warehouse, if
/// catalogued.
pub fn resolve_book_quantity(
    trust_client: bool,
    client: Option<i64>,
    catalog: Option<i32>,
    bin_no: &str,
    warehouse: &str,
) -> Result<BookQuantity, CountRejection> {
    if trust_client {
        let value = client.ok_or(CountRejection::MissingBookQuantity)?;
        return Ok(BookQuantity {
            value: to_quantity(value)?,
            ignored_client: None,
        });
    }
    let value = catalog.ok_or_else(|| CountRejection::UncataloguedBin {
        bin_no: bin_no.to_string(),
        warehouse: warehouse.to_string(),
    })?;
    let ignored_client = client.filter(|c| *c != i64::from(value));
    Ok(BookQuantity {
        value,
        ignored_client,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_trims_bin_and_rejects_empty() {
        assert_eq!(validate_count("  BIN001 ", 90), Ok(("BIN001".to_string(), 90)));
        assert_eq!(validate_count("   ", 1), Err(CountRejection::MissingBin));
    }

    #[test]
    fn validate_rejects_negative_and_huge() {
        assert_eq!(validate_count("B", -1), Err(CountRejection::NegativeQuantity));
        assert_eq!(
            validate_count("B", i64::from(i32::MAX) + 1),
            Err(CountRejection::OutOfRange(i64::from(i32::MAX) + 1))
        );
        assert_eq!(validate_count("B", 0), Ok(("B".to_string(), 0)));
    }

    #[test]
    fn catalog_wins_when_client_untrusted() {
        let book = resolve_book_quantity(false, Some(50), Some(100), "B", "A").unwrap();
        assert_eq!(book.value, 100);
        assert_eq!(book.ignored_client, Some(50));

        let agree = resolve_book_quantity(false, Some(100), Some(100), "B", "A").unwrap();
        assert_eq!(agree.ignored_client, None);

        let absent = resolve_book_quantity(false, None, Some(7), "B", "A").unwrap();
        assert_eq!(absent.value, 7);
    }

    #[test]
    fn uncatalogued_bin_is_not_found() {
        let err = resolve_book_quantity(false, Some(5), None, "B9", "A").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Bin B9 not found in warehouse A");
    }

    #[test]
    fn trusted_client_value_is_required() {
        assert_eq!(
            resolve_book_quantity(true, None, Some(100), "B", "A"),
            Err(CountRejection::MissingBookQuantity)
        );
        let book = resolve_book_quantity(true, Some(40), Some(100), "B", "A").unwrap();
        assert_eq!(book.value, 40);
        assert_eq!(book.ignored_client, None);
        assert!(!CountRejection::MissingBookQuantity.is_not_found());
    }
}
