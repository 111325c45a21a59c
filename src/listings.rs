//! Listings
//!
//! Input boundary: a shopping list naming the components to buy, and one CSV listing table per
//! component with the offers scraped for it. Tables live in a data directory and are named
//! after the normalised component name (`Power Supply` → `Power_Supply.csv`).

use std::{
    fs,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, Trim};
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    catalog::{Catalog, CatalogBuilder, CatalogError, OfferRow},
    pricing::{PricingError, parse_amount},
};

/// Columns every listing table needs, with the alternative header accepted for each.
const COLUMNS: [(&str, &str); 5] = [
    ("name", "nome_prodotto"),
    ("price", "prezzo"),
    ("shipping", "spedizione"),
    ("vendor", "venditore"),
    ("url", "link_venditore"),
];

/// Errors raised while reading shopping lists and listing tables.
#[derive(Debug, Error)]
pub enum ListingError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,

        /// Underlying IO error
        source: std::io::Error,
    },

    /// The shopping list has a quantity that is not a positive integer.
    #[error("line {line} of the shopping list has an invalid quantity: {value}")]
    InvalidQuantity {
        /// 1-based line number
        line: usize,

        /// Offending text
        value: String,
    },

    /// The shopping list names no components.
    #[error("the shopping list is empty")]
    EmptyList,

    /// No listing table exists for a component.
    #[error("no listing table for {component}, expected {path}")]
    MissingTable {
        /// Component name
        component: String,

        /// Expected table path
        path: PathBuf,
    },

    /// A listing table lacks a required column.
    #[error("{path} is missing the {column} column")]
    MissingColumn {
        /// Table path
        path: PathBuf,

        /// Missing column name
        column: &'static str,
    },

    /// A price or shipping cell could not be parsed.
    #[error("{path} row {row}: {source}")]
    InvalidPrice {
        /// Table path
        path: PathBuf,

        /// 1-based data row number
        row: usize,

        /// Underlying parsing error
        source: PricingError,
    },

    /// Malformed CSV
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Wrapped catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One shopping list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    /// Normalised component name, also the listing table stem
    pub component: String,

    /// Units needed
    pub quantity: u32,
}

/// Components to buy, in list order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShoppingList {
    items: Vec<ShoppingItem>,
}

impl ShoppingList {
    /// Parse a shopping list: one `name` or `name, quantity` per line.
    ///
    /// Blank lines and lines starting with `#` are skipped. A repeated component keeps its
    /// first position and takes the last quantity given.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError::InvalidQuantity`] for a quantity that is not a positive integer
    /// and [`ListingError::EmptyList`] if no component is named.
    pub fn parse(contents: &str) -> Result<Self, ListingError> {
        let mut items: Vec<ShoppingItem> = Vec::new();

        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, quantity) = match line.split_once(',') {
                Some((name, quantity)) => {
                    let quantity = quantity
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|quantity| *quantity > 0)
                        .ok_or_else(|| ListingError::InvalidQuantity {
                            line: idx + 1,
                            value: quantity.trim().to_string(),
                        })?;

                    (name, quantity)
                }
                None => (line, 1),
            };

            let component = normalize_product_name(name);

            if component.is_empty() {
                continue;
            }

            match items.iter_mut().find(|item| item.component == component) {
                Some(existing) => existing.quantity = quantity,
                None => items.push(ShoppingItem {
                    component,
                    quantity,
                }),
            }
        }

        if items.is_empty() {
            return Err(ListingError::EmptyList);
        }

        Ok(Self { items })
    }

    /// Read and parse a shopping list file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ListingError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|source| ListingError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents)
    }

    /// Entries in list order.
    pub fn items(&self) -> &[ShoppingItem] {
        &self.items
    }
}

/// Turn a product name into a table file stem: keep the part before the first comma, trim it
/// and replace spaces with underscores.
pub fn normalize_product_name(name: &str) -> String {
    name.split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .replace(' ', "_")
}

#[derive(Debug, Deserialize)]
struct ListingRow {
    #[serde(alias = "nome_prodotto")]
    name: String,

    #[serde(alias = "prezzo")]
    price: String,

    #[serde(alias = "spedizione")]
    shipping: String,

    #[serde(alias = "venditore")]
    vendor: String,

    #[serde(alias = "link_venditore")]
    url: String,
}

/// Read one listing table into offer rows for `component`.
///
/// # Errors
///
/// Returns an error if the file is missing, lacks a column, or has an unparsable price.
pub fn read_table(
    path: &Path,
    component: &str,
    currency: &'static Currency,
) -> Result<Vec<OfferRow<'static>>, ListingError> {
    let contents = fs::read_to_string(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ListingError::MissingTable {
            component: component.to_string(),
            path: path.to_path_buf(),
        },
        _ => ListingError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(contents.as_bytes());

    let headers = reader.headers()?.clone();

    for (column, alias) in COLUMNS {
        if !headers.iter().any(|header| header == column || header == alias) {
            return Err(ListingError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let mut rows = Vec::new();

    for (idx, record) in reader.deserialize::<ListingRow>().enumerate() {
        let record = record?;
        let row = idx + 1;

        let amount = |value: &str| {
            parse_amount(value).map_err(|source| ListingError::InvalidPrice {
                path: path.to_path_buf(),
                row,
                source,
            })
        };

        rows.push(OfferRow {
            component: component.to_string(),
            product: record.name,
            unit_price: Money::from_minor(amount(&record.price)?, currency),
            shipping: Money::from_minor(amount(&record.shipping)?, currency),
            vendor: record.vendor,
            url: record.url,
        });
    }

    if rows.is_empty() {
        warn!(path = %path.display(), "listing table has no offers");
    }

    debug!(path = %path.display(), offers = rows.len(), "listing table read");

    Ok(rows)
}

/// Build a catalog from a shopping list and the listing tables in `data_dir`.
///
/// # Errors
///
/// Returns a [`ListingError`] if a table is missing or malformed, or an offer is rejected by
/// the catalog.
pub fn load_catalog(
    list: &ShoppingList,
    data_dir: &Path,
    currency: &'static Currency,
) -> Result<Catalog<'static>, ListingError> {
    let mut builder = CatalogBuilder::new(currency);

    for item in list.items() {
        builder.component(item.component.clone(), item.quantity)?;
    }

    for item in list.items() {
        let path = data_dir.join(format!("{}.csv", item.component));

        for row in read_table(&path, &item.component, currency)? {
            builder.offer(row)?;
        }
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::EUR;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn normalises_names_to_file_stems() {
        assert_eq!(normalize_product_name(" Power Supply , 2"), "Power_Supply");
        assert_eq!(normalize_product_name("RAM"), "RAM");
    }

    #[test]
    fn parses_names_and_quantities() -> TestResult {
        let list = ShoppingList::parse("# build\nCPU\n\nRAM, 2\nCase Fan,3\n")?;

        assert_eq!(
            list.items(),
            &[
                ShoppingItem {
                    component: "CPU".to_string(),
                    quantity: 1
                },
                ShoppingItem {
                    component: "RAM".to_string(),
                    quantity: 2
                },
                ShoppingItem {
                    component: "Case_Fan".to_string(),
                    quantity: 3
                },
            ]
        );

        Ok(())
    }

    #[test]
    fn repeated_components_take_the_last_quantity() -> TestResult {
        let list = ShoppingList::parse("RAM, 2\nCPU\nRAM, 4\n")?;

        assert_eq!(list.items().len(), 2);
        assert_eq!(list.items().first().map(|item| item.quantity), Some(4));

        Ok(())
    }

    #[test]
    fn rejects_invalid_quantities() {
        assert!(matches!(
            ShoppingList::parse("CPU\nRAM, two\n"),
            Err(ListingError::InvalidQuantity { line: 2, value }) if value == "two"
        ));
        assert!(matches!(
            ShoppingList::parse("RAM, 0\n"),
            Err(ListingError::InvalidQuantity { line: 1, .. })
        ));
    }

    #[test]
    fn rejects_empty_lists() {
        assert!(matches!(
            ShoppingList::parse("# nothing\n\n"),
            Err(ListingError::EmptyList)
        ));
    }

    #[test]
    fn reads_tables_with_either_header_set() -> TestResult {
        let dir = tempfile::tempdir()?;

        let english = dir.path().join("CPU.csv");
        fs::write(
            &english,
            "name,price,shipping,vendor,url\nRyzen 5,149.90,4.99,Shop A,https://a.test/r5\n",
        )?;

        let italian = dir.path().join("RAM.csv");
        fs::write(
            &italian,
            "nome_prodotto,prezzo,spedizione,venditore,link_venditore\n\"DDR5 32GB\",\"89,90\",0,Shop B,https://b.test/ram\n",
        )?;

        let cpu = read_table(&english, "CPU", EUR)?;
        let ram = read_table(&italian, "RAM", EUR)?;

        let cpu_row = cpu.first().ok_or("no CPU row")?;
        let ram_row = ram.first().ok_or("no RAM row")?;

        assert_eq!(cpu_row.unit_price, Money::from_minor(14_990, EUR));
        assert_eq!(cpu_row.shipping, Money::from_minor(499, EUR));
        assert_eq!(cpu_row.vendor, "Shop A");
        assert_eq!(ram_row.unit_price, Money::from_minor(8_990, EUR));
        assert_eq!(ram_row.product, "DDR5 32GB");

        Ok(())
    }

    #[test]
    fn missing_columns_are_reported() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("CPU.csv");

        fs::write(&path, "name,price,vendor,url\nRyzen,100,Shop,\n")?;

        assert!(matches!(
            read_table(&path, "CPU", EUR),
            Err(ListingError::MissingColumn {
                column: "shipping",
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn missing_tables_are_reported() -> TestResult {
        let dir = tempfile::tempdir()?;
        let list = ShoppingList::parse("GPU\n")?;

        assert!(matches!(
            load_catalog(&list, dir.path(), EUR),
            Err(ListingError::MissingTable { component, .. }) if component == "GPU"
        ));

        Ok(())
    }
}
