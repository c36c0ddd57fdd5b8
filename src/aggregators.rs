use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use rust_decimal::prelude::*;
use serde::{Serialize, Serializer};

use crate::records::Record;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    /// one line per category over a shared x axis
    Line,
    /// bars drawn top to bottom, so the last label is the top bar
    HorizontalBar,
}

/// ChartSeries is a labelled sequence of amounts ready to be plotted.
///
/// `labels` and `values` always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    #[serde(serialize_with = "serialize_amounts")]
    pub values: Vec<Decimal>,
}

fn serialize_amounts<S>(values: &[Decimal], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(values.iter().map(|v| v.to_f64().unwrap_or_default()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupBy {
    Country,
    Customer,
}

impl GroupBy {
    fn key<'r>(&self, record: &'r Record) -> &'r str {
        match self {
            GroupBy::Country => &record.country,
            GroupBy::Customer => &record.customer_name,
        }
    }
}

/// totals sums sales per group, keeping groups in the order first seen.
///
/// The loader caps every amount at `MAX_SALES_AMOUNT`, which keeps these sums
/// far inside `Decimal`'s range.
fn totals<'r>(records: &[&'r Record], group_by: GroupBy) -> Vec<(&'r str, Decimal)> {
    let mut totals: IndexMap<&str, Decimal> = IndexMap::new();
    for record in records.iter().copied() {
        *totals
            .entry(group_by.key(record))
            .or_insert_with(Decimal::zero) += record.sales_amount;
    }
    totals.into_iter().collect()
}

fn bar_series(name: &str, totals: Vec<(&str, Decimal)>) -> ChartSeries {
    let (labels, values) = totals
        .into_iter()
        .map(|(label, total)| (label.to_string(), total))
        .unzip();
    ChartSeries {
        name: name.to_string(),
        kind: ChartKind::HorizontalBar,
        labels,
        values,
    }
}

/// time_series builds one line per known category over the sorted order
/// dates of `records`. Dates a category has no sales on are filled with zero.
pub fn time_series(records: &[&Record], categories: &[&str]) -> IndexMap<String, ChartSeries> {
    let dates: Vec<&str> = records
        .iter()
        .map(|record| record.order_date.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let labels: Vec<String> = dates.iter().map(|date| date.to_string()).collect();

    categories
        .iter()
        .map(|category| {
            let mut by_date: HashMap<&str, Decimal> = HashMap::new();
            for record in records.iter().filter(|r| r.coffee_type == *category) {
                *by_date
                    .entry(record.order_date.as_str())
                    .or_insert_with(Decimal::zero) += record.sales_amount;
            }
            let values = dates
                .iter()
                .map(|date| by_date.get(date).copied().unwrap_or_else(Decimal::zero))
                .collect();
            let series = ChartSeries {
                name: category.to_string(),
                kind: ChartKind::Line,
                labels: labels.clone(),
                values,
            };
            (category.to_string(), series)
        })
        .collect()
}

/// ranked_totals sums sales per group and orders the groups by ascending
/// total. Equal totals keep the order their groups were first seen in.
pub fn ranked_totals(records: &[&Record], group_by: GroupBy, name: &str) -> ChartSeries {
    let mut totals = totals(records, group_by);
    totals.sort_by(|a, b| a.1.cmp(&b.1));
    bar_series(name, totals)
}

/// top_n picks the `n` customers with the highest totals and emits them
/// smallest first. Among equal totals the customer seen first ranks higher.
pub fn top_n(records: &[&Record], n: usize, name: &str) -> ChartSeries {
    let mut totals = totals(records, GroupBy::Customer);
    totals.sort_by(|a, b| b.1.cmp(&a.1));
    totals.truncate(n);
    totals.reverse();
    bar_series(name, totals)
}
