//! Available volume per blood type

use crate::types::BloodType;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::ops::Index;

/// Available millilitres for each of the eight blood types.
///
/// Every type is always present; types with no stock report `0`.
/// Serializes as a JSON object keyed by label in [`BloodType::ALL`] order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryTotals {
    quantities: [i64; 8],
}

impl InventoryTotals {
    /// All-zero totals
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(blood_type, quantity_ml)` pairs, summing duplicates
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (BloodType, i64)>,
    {
        let mut totals = Self::new();
        for (blood_type, quantity_ml) in pairs {
            totals.add(blood_type, quantity_ml);
        }
        totals
    }

    /// Add volume for one type
    pub fn add(&mut self, blood_type: BloodType, quantity_ml: i64) {
        self.quantities[blood_type.index()] += quantity_ml;
    }

    /// Volume for one type
    pub fn get(&self, blood_type: BloodType) -> i64 {
        self.quantities[blood_type.index()]
    }

    /// Volume across all types
    pub fn total(&self) -> i64 {
        self.quantities.iter().sum()
    }

    /// `(type, volume)` pairs in reporting order
    pub fn iter(&self) -> impl Iterator<Item = (BloodType, i64)> + '_ {
        BloodType::ALL.iter().map(move |bt| (*bt, self.get(*bt)))
    }
}

impl Index<BloodType> for InventoryTotals {
    type Output = i64;

    fn index(&self, blood_type: BloodType) -> &i64 {
        &self.quantities[blood_type.index()]
    }
}

impl Serialize for InventoryTotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(BloodType::ALL.len()))?;
        for (blood_type, quantity_ml) in self.iter() {
            map.serialize_entry(blood_type.as_str(), &quantity_ml)?;
        }
        map.end()
    }
}
