use std::convert::TryFrom;
use std::io;

use anyhow::Result;
use rust_decimal::prelude::*;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Coffee types in the order their series are drawn.
pub const COFFEE_TYPES: [&str; 4] = ["Arabica", "Robusta", "Liberica", "Excelsa"];

/// Largest sales amount a single record may carry. Keeps every total the
/// aggregators compute well inside `Decimal`'s range.
pub const MAX_SALES_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("sales amount must not be negative, got {0}")]
    NegativeAmount(Decimal),
    #[error("sales amount {0} is larger than {}", MAX_SALES_AMOUNT)]
    AmountTooLarge(Decimal),
    #[error("order {order} refers to unknown customer {customer:?}")]
    UnknownCustomer { order: String, customer: String },
    #[error("order {order} refers to unknown product {product:?}")]
    UnknownProduct { order: String, product: String },
    #[error("order date {0:?} does not start with a year")]
    InvalidDate(String),
}

/// RecordRow is a single row as it appears in the source CSV
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct RecordRow {
    pub order_date: String,
    pub customer_name: String,
    pub country: String,
    pub loyalty_card: String,
    pub coffee_type: String,
    pub roast_type: String,
    pub size: String,
    pub sales_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub order_date: String,
    pub customer_name: String,
    pub country: String,
    pub loyalty_card: String,
    pub coffee_type: String,
    pub roast_type: String,
    pub size: String,
    pub sales_amount: Decimal,
}

impl Record {
    /// year is the 4 character prefix of the order date.
    ///
    /// Dates are expected in ISO form (`2021-09` or `2021-09-05`); anything
    /// shorter has no year and never passes a year filter.
    pub fn year(&self) -> Option<&str> {
        self.order_date.get(..4)
    }
}

fn expand_coffee_type(code: String) -> String {
    match code.as_str() {
        "Ara" => "Arabica".to_string(),
        "Rob" => "Robusta".to_string(),
        "Lib" => "Liberica".to_string(),
        "Exc" => "Excelsa".to_string(),
        _ => code,
    }
}

fn expand_roast_type(code: String) -> String {
    match code.as_str() {
        "L" => "Light".to_string(),
        "M" => "Medium".to_string(),
        "D" => "Dark".to_string(),
        _ => code,
    }
}

impl TryFrom<RecordRow> for Record {
    type Error = RecordError;
    fn try_from(
        RecordRow {
            order_date,
            customer_name,
            country,
            loyalty_card,
            coffee_type,
            roast_type,
            size,
            sales_amount,
        }: RecordRow,
    ) -> Result<Record, RecordError> {
        let has_year = order_date
            .get(..4)
            .map_or(false, |year| year.bytes().all(|b| b.is_ascii_digit()));
        if !has_year {
            return Err(RecordError::InvalidDate(order_date));
        }
        if sales_amount < Decimal::from(0) {
            return Err(RecordError::NegativeAmount(sales_amount));
        }
        if sales_amount > MAX_SALES_AMOUNT {
            return Err(RecordError::AmountTooLarge(sales_amount));
        }
        Ok(Record {
            order_date,
            customer_name,
            country,
            loyalty_card,
            coffee_type: expand_coffee_type(coffee_type),
            roast_type: expand_roast_type(roast_type),
            size,
            sales_amount: sales_amount.round_dp(2),
        })
    }
}

pub fn csv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

pub trait RecordStore {
    fn all(&self) -> &[Record];
}

pub struct MemoryStore {
    data: Vec<Record>,
}

impl MemoryStore {
    pub fn new(data: Vec<Record>) -> MemoryStore {
        MemoryStore { data }
    }

    /// from_reader loads every valid row of a CSV source, skipping rows
    /// that fail to parse or validate.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<MemoryStore> {
        let mut reader = csv_reader(reader);
        let mut data = Vec::new();
        let mut skipped = 0;
        for (line, result) in reader.deserialize::<RecordRow>().enumerate() {
            let record = match result {
                Ok(row) => Record::try_from(row).map_err(anyhow::Error::from),
                Err(e) => Err(e.into()),
            };
            match record {
                Ok(record) => data.push(record),
                Err(e) => {
                    skipped += 1;
                    debug!(error = e.to_string(), row = line + 1, "Skipping record");
                }
            }
        }
        info!(loaded = data.len(), skipped, "Loaded records");
        Ok(MemoryStore::new(data))
    }
}

impl RecordStore for MemoryStore {
    fn all(&self) -> &[Record] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(order_date: &str, coffee_type: &str, roast_type: &str, amount: Decimal) -> RecordRow {
        RecordRow {
            order_date: order_date.to_string(),
            customer_name: "Aloisia Allner".to_string(),
            country: "United States".to_string(),
            loyalty_card: "Yes".to_string(),
            coffee_type: coffee_type.to_string(),
            roast_type: roast_type.to_string(),
            size: "0.5".to_string(),
            sales_amount: amount,
        }
    }

    #[test]
    fn test_record_from_row_expands_codes() -> Result<()> {
        let record = Record::try_from(row("2021-09", "Ara", "M", Decimal::new(1295, 2)))?;
        assert_eq!(record.coffee_type, "Arabica");
        assert_eq!(record.roast_type, "Medium");
        assert_eq!(record.sales_amount, Decimal::new(1295, 2));

        let record = Record::try_from(row("2021-09", "Excelsa", "Dark", Decimal::from(3)))?;
        assert_eq!(record.coffee_type, "Excelsa");
        assert_eq!(record.roast_type, "Dark");
        Ok(())
    }

    #[test]
    fn test_record_from_row_rounds_amount() -> Result<()> {
        let record = Record::try_from(row("2020-01-04", "Rob", "L", Decimal::new(2985001, 5)))?;
        assert_eq!(record.sales_amount, Decimal::new(2985, 2));
        Ok(())
    }

    #[test]
    fn test_record_from_row_rounds_midpoint_to_even() -> Result<()> {
        let record = Record::try_from(row("2020-01", "Rob", "L", Decimal::new(2665, 3)))?;
        assert_eq!(record.sales_amount, Decimal::new(266, 2));
        let record = Record::try_from(row("2020-01", "Rob", "L", Decimal::new(2675, 3)))?;
        assert_eq!(record.sales_amount, Decimal::new(268, 2));
        Ok(())
    }

    #[test]
    fn test_record_from_row_amount_too_large() -> Result<()> {
        let record = Record::try_from(row("2020-01", "Lib", "D", MAX_SALES_AMOUNT))?;
        assert_eq!(record.sales_amount, MAX_SALES_AMOUNT);
        let too_large = MAX_SALES_AMOUNT + Decimal::new(1, 2);
        let res = Record::try_from(row("2020-01", "Lib", "D", too_large));
        assert_eq!(res.unwrap_err(), RecordError::AmountTooLarge(too_large));
        Ok(())
    }

    #[test]
    fn test_record_from_row_negative_amount() {
        let res = Record::try_from(row("2020-01", "Lib", "D", Decimal::from(-1)));
        assert_eq!(res.unwrap_err(), RecordError::NegativeAmount(Decimal::from(-1)));
    }

    #[test]
    fn test_record_from_row_invalid_date() {
        let res = Record::try_from(row("Jan 2020", "Lib", "D", Decimal::from(1)));
        assert_eq!(
            res.unwrap_err(),
            RecordError::InvalidDate("Jan 2020".to_string())
        );
        let res = Record::try_from(row("20", "Lib", "D", Decimal::from(1)));
        assert!(res.is_err());
    }

    #[test]
    fn test_record_year() -> Result<()> {
        let record = Record::try_from(row("2022-03-17", "Ara", "L", Decimal::from(1)))?;
        assert_eq!(record.year(), Some("2022"));
        Ok(())
    }

    #[test]
    fn test_memory_store_from_reader() -> Result<()> {
        let data = "\
order_date,customer_name,country,loyalty_card,coffee_type,roast_type,size,sales_amount
2019-09,Aloisia Allner,United States,Yes,Rob,M,1.0,9.95
2019-09,Piotr Bote,Ireland,No,Exc,D,0.5,-4.00
2019-10,Jami Redholes,United Kingdom,No,Lib,L,2.5,not-a-number
2019-10, Christoph Frediani ,Ireland,No,Ara,L,0.2,3.89
";
        let store = MemoryStore::from_reader(data.as_bytes())?;
        let records = store.all();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].coffee_type, "Robusta");
        assert_eq!(records[0].sales_amount, Decimal::new(995, 2));
        assert_eq!(records[1].customer_name, "Christoph Frediani");
        assert_eq!(records[1].roast_type, "Light");
        Ok(())
    }
}
