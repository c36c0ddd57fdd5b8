use std::collections::HashMap;
use std::convert::TryFrom;
use std::io;

use anyhow::Result;
use rust_decimal::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::records::{csv_reader, Record, RecordError, RecordRow};

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OrderRow {
    #[serde(rename = "Order ID")]
    pub order_id: String,
    #[serde(rename = "Order Date")]
    pub order_date: String,
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    #[serde(rename = "Product ID")]
    pub product_id: String,
    /// an empty quantity counts as zero
    #[serde(rename = "Quantity")]
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CustomerRow {
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    #[serde(rename = "Customer Name")]
    pub customer_name: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Loyalty Card")]
    pub loyalty_card: String,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ProductRow {
    #[serde(rename = "Product ID")]
    pub product_id: String,
    #[serde(rename = "Coffee Type")]
    pub coffee_type: String,
    #[serde(rename = "Roast Type")]
    pub roast_type: String,
    #[serde(rename = "Size")]
    pub size: String,
    #[serde(rename = "Unit Price")]
    pub unit_price: Decimal,
}

/// order_month cuts an order date such as `2019-09-05` or
/// `2019-09-05 00:00:00` down to its `YYYY-MM` month.
fn order_month(date: &str) -> Result<String, RecordError> {
    let month = date
        .get(..7)
        .filter(|m| {
            m.bytes()
                .enumerate()
                .all(|(i, b)| if i == 4 { b == b'-' } else { b.is_ascii_digit() })
        })
        .ok_or_else(|| RecordError::InvalidDate(date.to_string()))?;
    Ok(month.to_string())
}

fn join_order(
    order: OrderRow,
    customers: &HashMap<String, CustomerRow>,
    products: &HashMap<String, ProductRow>,
) -> Result<Record, RecordError> {
    let customer = customers
        .get(&order.customer_id)
        .ok_or_else(|| RecordError::UnknownCustomer {
            order: order.order_id.clone(),
            customer: order.customer_id.clone(),
        })?;
    let product = products
        .get(&order.product_id)
        .ok_or_else(|| RecordError::UnknownProduct {
            order: order.order_id.clone(),
            product: order.product_id.clone(),
        })?;
    let quantity = Decimal::from(order.quantity.unwrap_or(0));
    let sales_amount = quantity
        .checked_mul(product.unit_price)
        .ok_or(RecordError::AmountTooLarge(product.unit_price))?;
    Record::try_from(RecordRow {
        order_date: order_month(&order.order_date)?,
        customer_name: customer.customer_name.clone(),
        country: customer.country.clone(),
        loyalty_card: customer.loyalty_card.clone(),
        coffee_type: product.coffee_type.clone(),
        roast_type: product.roast_type.clone(),
        size: product.size.clone(),
        sales_amount,
    })
}

/// read_table loads a CSV table keyed by `key`, skipping rows that fail to parse
fn read_table<R, T, F>(reader: R, table: &str, key: F) -> HashMap<String, T>
where
    R: io::Read,
    T: DeserializeOwned,
    F: Fn(&T) -> String,
{
    let mut rows = HashMap::new();
    for (line, result) in csv_reader(reader).deserialize::<T>().enumerate() {
        match result {
            Ok(row) => {
                rows.insert(key(&row), row);
            }
            Err(e) => debug!(error = e.to_string(), table, row = line + 1, "Skipping row"),
        }
    }
    rows
}

/// join builds records from separate orders, customers and products tables,
/// pricing each order at quantity times unit price and bucketing it by month.
/// Orders that cannot be joined or validated are skipped.
pub fn join<O, C, P>(orders: O, customers: C, products: P) -> Result<Vec<Record>>
where
    O: io::Read,
    C: io::Read,
    P: io::Read,
{
    let customers = read_table(customers, "customers", |c: &CustomerRow| {
        c.customer_id.clone()
    });
    let products = read_table(products, "products", |p: &ProductRow| p.product_id.clone());

    let mut records = Vec::new();
    let mut skipped = 0;
    for (line, result) in csv_reader(orders).deserialize::<OrderRow>().enumerate() {
        let record = match result {
            Ok(order) => join_order(order, &customers, &products).map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        match record {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                debug!(error = e.to_string(), row = line + 1, "Skipping order");
            }
        }
    }
    info!(
        loaded = records.len(),
        skipped,
        customers = customers.len(),
        products = products.len(),
        "Joined orders"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOMERS: &str = "\
Customer ID,Customer Name,Email,Phone Number,Address Line 1,City,Country,Postcode,Loyalty Card
17670-51384-MA,Aloisia Allner,aallner0@lulu.com,+1 (305) 912-0090,7 Tennyson Trail,Miami,United States,33147,Yes
73342-18763-UW,Piotr Bote,,+353 (913) 339-6347,11 Lindbergh Park,Caherconlish,Ireland,,No
";

    const PRODUCTS: &str = "\
Product ID,Coffee Type,Roast Type,Size,Unit Price,Price per 100g,Profit
R-M-1,Rob,M,1.0,9.95,0.995,0.5970
E-M-0.5,Exc,M,0.5,8.25,1.65,0.9075
A-L-0.2,Ara,L,0.2,4.1225,2.06,0.3
";

    fn orders(rows: &str) -> String {
        format!(
            "Order ID,Order Date,Customer ID,Product ID,Quantity,Customer Name,Email\n{}",
            rows
        )
    }

    fn load(rows: &str) -> Result<Vec<Record>> {
        join(
            orders(rows).as_bytes(),
            CUSTOMERS.as_bytes(),
            PRODUCTS.as_bytes(),
        )
    }

    #[test]
    fn test_order_month() -> Result<()> {
        assert_eq!(order_month("2019-09-05")?, "2019-09");
        assert_eq!(order_month("2019-09-05 00:00:00")?, "2019-09");
        assert_eq!(order_month("2019-09")?, "2019-09");
        assert_eq!(
            order_month("05/09/2019").unwrap_err(),
            RecordError::InvalidDate("05/09/2019".to_string())
        );
        assert!(order_month("2019").is_err());
        Ok(())
    }

    #[test]
    fn test_join() -> Result<()> {
        let records = load(
            "QEV-37451-860,2019-09-05,17670-51384-MA,R-M-1,2,,\n\
             QEV-37451-861,2020-01-04 00:00:00,73342-18763-UW,E-M-0.5,5,,\n",
        )?;
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            Record {
                order_date: "2019-09".to_string(),
                customer_name: "Aloisia Allner".to_string(),
                country: "United States".to_string(),
                loyalty_card: "Yes".to_string(),
                coffee_type: "Robusta".to_string(),
                roast_type: "Medium".to_string(),
                size: "1.0".to_string(),
                sales_amount: Decimal::new(1990, 2),
            }
        );
        assert_eq!(records[1].order_date, "2020-01");
        assert_eq!(records[1].coffee_type, "Excelsa");
        assert_eq!(records[1].loyalty_card, "No");
        assert_eq!(records[1].sales_amount, Decimal::new(4125, 2));
        Ok(())
    }

    #[test]
    fn test_join_rounds_amount() -> Result<()> {
        let records = load("QEV-1,2021-03-02,17670-51384-MA,A-L-0.2,3,,\n")?;
        assert_eq!(records[0].sales_amount, Decimal::new(1237, 2));
        Ok(())
    }

    #[test]
    fn test_join_empty_quantity_is_zero() -> Result<()> {
        let records = load("QEV-1,2021-03-02,17670-51384-MA,A-L-0.2,,,\n")?;
        assert_eq!(records[0].sales_amount, Decimal::from(0));
        Ok(())
    }

    #[test]
    fn test_join_skips_unknown_references() -> Result<()> {
        let records = load(
            "QEV-1,2021-03-02,00000-00000-XX,A-L-0.2,1,,\n\
             QEV-2,2021-03-02,17670-51384-MA,L-D-2.5,1,,\n\
             QEV-3,March 2021,17670-51384-MA,A-L-0.2,1,,\n\
             QEV-4,2021-03-02,73342-18763-UW,A-L-0.2,1,,\n",
        )?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].customer_name, "Piotr Bote");
        Ok(())
    }

    #[test]
    fn test_join_order_errors() {
        let customers = read_table(CUSTOMERS.as_bytes(), "customers", |c: &CustomerRow| {
            c.customer_id.clone()
        });
        let products = read_table(PRODUCTS.as_bytes(), "products", |p: &ProductRow| {
            p.product_id.clone()
        });
        let order = OrderRow {
            order_id: "QEV-9".to_string(),
            order_date: "2021-03-02".to_string(),
            customer_id: "nobody".to_string(),
            product_id: "R-M-1".to_string(),
            quantity: Some(1),
        };
        assert_eq!(
            join_order(order.clone(), &customers, &products).unwrap_err(),
            RecordError::UnknownCustomer {
                order: "QEV-9".to_string(),
                customer: "nobody".to_string(),
            }
        );
        let order = OrderRow {
            customer_id: "17670-51384-MA".to_string(),
            product_id: "nothing".to_string(),
            ..order
        };
        assert_eq!(
            join_order(order, &customers, &products).unwrap_err(),
            RecordError::UnknownProduct {
                order: "QEV-9".to_string(),
                product: "nothing".to_string(),
            }
        );
    }
}
