
mod day;
mod log;
mod meal;

pub use day::{DayKey, DayParseError};
pub use log::{DailyLog, DayGroup, SkippedMeal};
pub use meal::{MealRecord, Quantity, Totals};
