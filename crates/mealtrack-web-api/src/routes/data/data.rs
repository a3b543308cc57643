
use mealtrack_log::{DayParseError, MealRecord, Quantity};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum MealLogError {
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Date(#[from] DayParseError),
    #[error("meal name must not be empty")]
    EmptyName,
    #[error("no meal with id {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMeal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub date: String,
    pub name: String,
    pub calories: Quantity,
    pub protein: Quantity,
}

impl StoredMeal {
    pub fn into_record(self) -> MealRecord {
        MealRecord {
            id: self._id.map(|v| v.to_hex()).unwrap_or_default(),
            date: self.date,
            name: self.name,
            calories: self.calories,
            protein: self.protein,
        }
    }
}
