
use std::fmt;

use serde::{Deserialize, Serialize};

/// One recorded meal, as handed over by the persistence layer.
/// `date` is the raw stored token; it is normalized when the record
/// enters a bucketed view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealRecord {
    pub id: String,
    pub date: String,
    pub name: String,
    pub calories: Quantity,
    pub protein: Quantity,
}

/// A non-negative integral nutrient amount. Deserializes from numbers
/// and from numeric text, since forms deliver either; everything else
/// (negative, fractional, non-numeric) is rejected before it can reach
/// a sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().parse() {
            Ok(v) => Some(Self(v)),
            Err(_) => {
                tracing::warn!("could not parse quantity: '{s}'");
                None
            }
        }
    }
}

impl From<u32> for Quantity {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: serde::Serializer
    {
        serializer.serialize_u32(self.0)
    }
}

struct QuantityVisitor;
impl<'de> serde::de::Visitor<'de> for QuantityVisitor {
    type Value = Quantity;

    fn expecting(
        &self, formatter: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        write!(formatter, "a non-negative whole number or numeric string")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where E: serde::de::Error
    {
        u32::try_from(v).map(Quantity).map_err(|_| {
            serde::de::Error::invalid_value(
                serde::de::Unexpected::Unsigned(v),
                &self,
            )
        })
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where E: serde::de::Error
    {
        u32::try_from(v).map(Quantity).map_err(|_| {
            serde::de::Error::invalid_value(
                serde::de::Unexpected::Signed(v),
                &self,
            )
        })
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where E: serde::de::Error
    {
        if v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) {
            Ok(Quantity(v as u32))
        } else {
            Err(serde::de::Error::invalid_value(
                serde::de::Unexpected::Float(v),
                &self,
            ))
        }
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where E: serde::de::Error
    {
        Quantity::parse(v).ok_or_else(|| {
            serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(v),
                &self,
            )
        })
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: serde::Deserializer<'de>
    { deserializer.deserialize_any(QuantityVisitor) }
}

/// Summed nutrients over a set of meals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub calories: u64,
    pub protein: u64,
}

impl Totals {
    pub fn of<'a>(meals: impl IntoIterator<Item = &'a MealRecord>) -> Self {
        meals.into_iter().fold(Self::default(), |acc, meal| Self {
            calories: acc.calories + u64::from(meal.calories.get()),
            protein: acc.protein + u64::from(meal.protein.get()),
        })
    }
}
