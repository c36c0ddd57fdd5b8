use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::aggregators::{ranked_totals, time_series, top_n, ChartSeries, GroupBy};
use crate::filters::{Dimension, FilterState};
use crate::records::{Record, RecordStore, COFFEE_TYPES};

/// apply keeps the records that pass every restricted dimension of `filters`
pub fn apply<'r>(records: &'r [Record], filters: &FilterState) -> Vec<&'r Record> {
    records.iter().filter(|r| filters.matches(r)).collect()
}

/// Dashboard is the full set of charts derived from one filter selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total_sales: IndexMap<String, ChartSeries>,
    pub sales_by_country: ChartSeries,
    pub top_customers: ChartSeries,
}

pub trait ChartAdapter {
    /// render draws the dashboard. Rendering the same dashboard twice must
    /// leave the output unchanged.
    fn render(&mut self, dashboard: &Dashboard) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub categories: Vec<String>,
    pub top_customers: usize,
}

impl Default for DashboardConfig {
    fn default() -> DashboardConfig {
        DashboardConfig {
            categories: COFFEE_TYPES.iter().map(|c| c.to_string()).collect(),
            top_customers: 5,
        }
    }
}

pub struct DashboardEngine<'a> {
    records: &'a dyn RecordStore,
    adapter: &'a mut dyn ChartAdapter,
    config: DashboardConfig,
    filters: FilterState,
}

impl<'a> DashboardEngine<'a> {
    pub fn new(
        records: &'a dyn RecordStore,
        adapter: &'a mut dyn ChartAdapter,
        config: DashboardConfig,
    ) -> DashboardEngine<'a> {
        DashboardEngine {
            records,
            adapter,
            config,
            filters: FilterState::new(),
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// toggle flips a filter value without redrawing
    pub fn toggle(&mut self, dimension: Dimension, value: &str) -> bool {
        let active = self.filters.toggle(dimension, value);
        debug!(
            dimension = dimension.to_string(),
            value, active, "Toggled filter"
        );
        active
    }

    pub fn clear(&mut self) -> Result<()> {
        self.filters.clear();
        self.refresh()
    }

    /// set_filter toggles a filter value and redraws every chart.
    /// Returns whether the value is active afterwards.
    pub fn set_filter(&mut self, dimension: Dimension, value: &str) -> Result<bool> {
        let active = self.toggle(dimension, value);
        self.refresh()?;
        Ok(active)
    }

    /// dashboard recomputes the charts for the current filters
    pub fn dashboard(&self) -> Dashboard {
        let selected = apply(self.records.all(), &self.filters);
        let categories: Vec<&str> = self.config.categories.iter().map(String::as_str).collect();
        let n = self.config.top_customers;
        Dashboard {
            total_sales: time_series(&selected, &categories),
            sales_by_country: ranked_totals(&selected, GroupBy::Country, "Sales by Country"),
            top_customers: top_n(&selected, n, &format!("Top {} Customers", n)),
        }
    }

    pub fn refresh(&mut self) -> Result<()> {
        let dashboard = self.dashboard();
        debug!(
            countries = dashboard.sales_by_country.labels.len(),
            customers = dashboard.top_customers.labels.len(),
            "Recomputed dashboard"
        );
        self.adapter.render(&dashboard)
    }
}
