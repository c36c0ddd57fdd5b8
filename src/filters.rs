use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::records::Record;

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("unknown filter dimension {0:?}, expected one of year, roast, size, loyalty")]
    UnknownDimension(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Year,
    Roast,
    Size,
    Loyalty,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Year,
        Dimension::Roast,
        Dimension::Size,
        Dimension::Loyalty,
    ];

    /// field is the value of this dimension on a record
    pub fn field<'r>(&self, record: &'r Record) -> Option<&'r str> {
        match self {
            Dimension::Year => record.year(),
            Dimension::Roast => Some(record.roast_type.as_str()),
            Dimension::Size => Some(record.size.as_str()),
            Dimension::Loyalty => Some(record.loyalty_card.as_str()),
        }
    }
}

impl FromStr for Dimension {
    type Err = FilterError;
    fn from_str(s: &str) -> Result<Dimension, FilterError> {
        match s.to_ascii_lowercase().as_str() {
            "year" => Ok(Dimension::Year),
            "roast" => Ok(Dimension::Roast),
            "size" => Ok(Dimension::Size),
            "loyalty" => Ok(Dimension::Loyalty),
            _ => Err(FilterError::UnknownDimension(s.to_string())),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dimension::Year => "year",
            Dimension::Roast => "roast",
            Dimension::Size => "size",
            Dimension::Loyalty => "loyalty",
        })
    }
}

/// FilterState holds the active values of every dimension.
///
/// An empty set leaves its dimension unrestricted.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FilterState {
    years: BTreeSet<String>,
    roasts: BTreeSet<String>,
    sizes: BTreeSet<String>,
    loyalties: BTreeSet<String>,
}

impl FilterState {
    pub fn new() -> FilterState {
        FilterState::default()
    }

    pub fn values(&self, dimension: Dimension) -> &BTreeSet<String> {
        match dimension {
            Dimension::Year => &self.years,
            Dimension::Roast => &self.roasts,
            Dimension::Size => &self.sizes,
            Dimension::Loyalty => &self.loyalties,
        }
    }

    fn values_mut(&mut self, dimension: Dimension) -> &mut BTreeSet<String> {
        match dimension {
            Dimension::Year => &mut self.years,
            Dimension::Roast => &mut self.roasts,
            Dimension::Size => &mut self.sizes,
            Dimension::Loyalty => &mut self.loyalties,
        }
    }

    /// toggle removes `value` from the dimension if present, otherwise
    /// inserts it. Returns whether the value is active afterwards.
    pub fn toggle(&mut self, dimension: Dimension, value: &str) -> bool {
        let values = self.values_mut(dimension);
        if values.remove(value) {
            false
        } else {
            values.insert(value.to_string())
        }
    }

    pub fn is_active(&self, dimension: Dimension, value: &str) -> bool {
        self.values(dimension).contains(value)
    }

    pub fn is_empty(&self) -> bool {
        Dimension::ALL
            .iter()
            .all(|dimension| self.values(*dimension).is_empty())
    }

    pub fn clear(&mut self) {
        *self = FilterState::default();
    }

    /// matches is true when the record passes every restricted dimension
    pub fn matches(&self, record: &Record) -> bool {
        Dimension::ALL.iter().all(|dimension| {
            let values = self.values(*dimension);
            values.is_empty()
                || dimension
                    .field(record)
                    .map_or(false, |field| values.contains(field))
        })
    }
}
