
use std::{borrow::Cow, future::Future};

use serde::{Deserialize, Serialize};

use crate::day::{DayKey, DayParseError};
use crate::meal::{MealRecord, Totals};

/// The meals of one calendar day, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayGroup {
    pub date: DayKey,
    pub meals: Vec<MealRecord>,
}

impl DayGroup {
    /// A day with no meals: a valid state, not a failure.
    pub fn empty(date: DayKey) -> Self {
        Self { date, meals: Vec::new() }
    }

    /// Totals are always recomputed from the records; they are never kept
    /// alongside them.
    pub fn totals(&self) -> Totals {
        Totals::of(&self.meals)
    }
}

/// A record excluded from every bucket because its date did not parse.
#[derive(Debug, Clone)]
pub struct SkippedMeal {
    pub meal: MealRecord,
    pub error: DayParseError,
}

/// A flat meal collection bucketed per calendar day.
#[derive(Debug, Default, Clone)]
pub struct DailyLog {
    /// is always sorted ascending by date
    days: Vec<DayGroup>,
}

impl DailyLog {
    #[inline]
    fn assert_sorted(&self) {
        debug_assert!(self.days
            .windows(2)
            .all(|v| v[0].date < v[1].date)
        );
    }

    /// Buckets a snapshot of records per day. Records whose date fails to
    /// normalize are excluded from every bucket, warned once each, and
    /// handed back as diagnostics.
    pub fn from_records(
        records: impl IntoIterator<Item = MealRecord>,
    ) -> (Self, Vec<SkippedMeal>) {
        let mut log = Self::default();
        let mut skipped = Vec::new();

        for record in records {
            if let Err(skip) = log.insert(record) {
                tracing::warn!(
                    "skipping meal {}: unparseable date {:?} ({})",
                    skip.meal.id, skip.meal.date, skip.error,
                );
                skipped.push(skip);
            }
        }

        (log, skipped)
    }

    /// Arrival order within a day is kept.
    pub fn insert(&mut self, meal: MealRecord) -> Result<DayKey, SkippedMeal> {
        let date = match DayKey::parse(&meal.date) {
            Ok(v) => v,
            Err(error) => return Err(SkippedMeal { meal, error }),
        };

        self.assert_sorted();
        match self.days.binary_search_by_key(&date, |v| v.date) {
            Ok(i) => self.days[i].meals.push(meal),
            Err(i) => self.days.insert(i, DayGroup { date, meals: vec![meal] }),
        }

        Ok(date)
    }

    /// Removes the record with that id, dropping its day bucket if it
    /// empties; unknown ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<MealRecord> {
        self.assert_sorted();
        for (i, day) in self.days.iter_mut().enumerate() {
            if let Some(j) = day.meals.iter().position(|m| m.id == id) {
                let meal = day.meals.remove(j);
                if day.meals.is_empty() {
                    self.days.remove(i);
                }
                return Some(meal);
            }
        }

        tracing::warn!("tried to remove nonexistent meal: {id}");
        None
    }

    pub fn find(&self, id: &str) -> Option<&MealRecord> {
        self.days.iter().flat_map(|v| &v.meals).find(|m| m.id == id)
    }

    pub fn day(&self, date: &DayKey) -> Option<&DayGroup> {
        match self.days.binary_search_by_key(date, |v| v.date) {
            Ok(i) => self.days.get(i),
            Err(_) => None,
        }
    }

    /// The view of one day, from the held collection or, when the day is
    /// not held, from a fetch capability scoped to exactly that day. A day
    /// absent from both is an empty group, not an error.
    pub async fn day_or_fetch<E, F>(
        &self, date: DayKey,
        fetch: impl FnOnce(DayKey) -> F,
    ) -> Result<Cow<'_, DayGroup>, E>
    where F: Future<Output = Result<Option<DayGroup>, E>>
    {
        if let Some(v) = self.day(&date) {
            Ok(Cow::Borrowed(v))
        } else {
            Ok(fetch(date).await?
                .map(Cow::Owned)
                .unwrap_or_else(|| Cow::Owned(DayGroup::empty(date))))
        }
    }

    pub fn days(&self) -> std::slice::Iter<'_, DayGroup> {
        self.days.iter()
    }

    /// Day buckets with the most recent calendar day first. Runs on the
    /// keys' intrinsic order; no date is re-parsed on the way out.
    pub fn days_newest_first(&self) -> impl Iterator<Item = &DayGroup> {
        self.days.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meal(id: &str, date: &str, name: &str, calories: u32, protein: u32) -> MealRecord {
        MealRecord {
            id: id.into(),
            date: date.into(),
            name: name.into(),
            calories: calories.into(),
            protein: protein.into(),
        }
    }

    fn key(token: &str) -> DayKey {
        DayKey::parse(token).expect("valid date token")
    }

    fn sample() -> Vec<MealRecord> {
        vec![
            meal("a", "2024-01-05", "breakfast", 500, 30),
            meal("b", "2024-01-05", "lunch", 300, 10),
            meal("c", "2024-01-06", "snack", 200, 5),
        ]
    }

    #[test]
    fn buckets_group_and_order_newest_first() {
        let (log, skipped) = DailyLog::from_records(sample());
        assert!(skipped.is_empty());

        let dates: Vec<String> = log.days_newest_first().map(|d| d.date.to_string()).collect();
        assert_eq!(dates, ["2024-01-06", "2024-01-05"]);

        let jan5 = log.day(&key("2024-01-05")).expect("bucket exists");
        assert_eq!(jan5.totals(), Totals { calories: 800, protein: 40 });
    }

    #[test]
    fn every_parseable_record_lands_in_exactly_one_bucket() {
        let records = sample();
        let (log, skipped) = DailyLog::from_records(records.clone());

        let bucketed: usize = log.days().map(|d| d.meals.len()).sum();
        assert_eq!(bucketed + skipped.len(), records.len());
        for record in &records {
            let holders = log.days().filter(|d| d.meals.iter().any(|m| m.id == record.id)).count();
            assert_eq!(holders, 1, "record {} held {holders} times", record.id);
        }
    }

    #[test]
    fn arrival_order_is_kept_within_a_day() {
        let (log, _) = DailyLog::from_records(sample());
        let ids: Vec<&str> = log.day(&key("2024-01-05")).unwrap()
            .meals.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn malformed_dates_are_skipped_without_touching_valid_totals() {
        let mut records = sample();
        records.push(meal("x", "2024-13-40", "bogus", 9999, 999));

        let (log, skipped) = DailyLog::from_records(records);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].meal.id, "x");

        assert_eq!(log.len(), 2);
        let calories: u64 = log.days().map(|d| d.totals().calories).sum();
        assert_eq!(calories, 1000);
    }

    #[test]
    fn removing_twice_leaves_the_log_unchanged() {
        let (mut log, _) = DailyLog::from_records(sample());

        assert!(log.remove("c").is_some());
        let after_first: Vec<String> = log.days().map(|d| d.date.to_string()).collect();

        assert!(log.remove("c").is_none());
        let after_second: Vec<String> = log.days().map(|d| d.date.to_string()).collect();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn insert_then_remove_restores_the_day_exactly() {
        let (mut log, _) = DailyLog::from_records(sample());
        let before = log.day(&key("2024-01-05")).unwrap().totals();

        log.insert(meal("d", "2024-01-05", "dessert", 450, 8)).unwrap();
        assert_ne!(log.day(&key("2024-01-05")).unwrap().totals(), before);

        log.remove("d");
        assert_eq!(log.day(&key("2024-01-05")).unwrap().totals(), before);
    }

    #[test]
    fn removing_the_last_meal_drops_the_day() {
        let (mut log, _) = DailyLog::from_records(sample());
        log.remove("c");
        assert!(log.day(&key("2024-01-06")).is_none());
    }

    #[test]
    fn find_locates_records_across_days() {
        let (log, _) = DailyLog::from_records(sample());
        assert_eq!(log.find("c").map(|m| m.name.as_str()), Some("snack"));
        assert!(log.find("nope").is_none());
    }

    #[tokio::test]
    async fn held_days_are_served_without_the_fetch_capability() {
        let (log, _) = DailyLog::from_records(sample());
        let fetched = std::cell::Cell::new(false);
        let group = log.day_or_fetch(key("2024-01-05"), |_| {
            fetched.set(true);
            async { Ok::<_, std::convert::Infallible>(None) }
        }).await.unwrap();

        assert!(!fetched.get(), "fetch must not run for a held day");
        assert!(matches!(group, Cow::Borrowed(_)));
        assert_eq!(group.meals.len(), 2);
    }

    #[tokio::test]
    async fn missing_days_come_from_the_fetch_capability() {
        let (log, _) = DailyLog::from_records(sample());
        let group = log.day_or_fetch(key("2024-01-07"), |date| async move {
            Ok::<_, std::convert::Infallible>(Some(DayGroup {
                date,
                meals: vec![meal("z", "2024-01-07", "dinner", 650, 42)],
            }))
        }).await.unwrap();

        assert_eq!(group.date, key("2024-01-07"));
        assert_eq!(group.totals(), Totals { calories: 650, protein: 42 });
    }

    #[tokio::test]
    async fn a_day_absent_everywhere_is_a_valid_empty_group() {
        let (log, _) = DailyLog::from_records(sample());
        let group = log.day_or_fetch(key("2024-01-08"), |_| async {
            Ok::<_, std::convert::Infallible>(None)
        }).await.unwrap();

        assert!(group.meals.is_empty());
        assert_eq!(group.totals(), Totals::default());
    }
}
