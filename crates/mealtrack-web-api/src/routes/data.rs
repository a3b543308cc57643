use std::sync::Arc;

use mongodb::{
    bson::{doc, oid::ObjectId},
    options::{
        FindOneAndUpdateOptions,
        FindOptions, ReturnDocument,
    },
    Collection,
};
use tokio::sync::RwLock;
use mealtrack_log::{DailyLog, DayGroup, DayKey, MealRecord, Quantity};

mod data;
use data::*;

pub use data::MealLogError;

#[derive(Debug, serde::Deserialize)]
pub struct NewMeal {
    pub name: String,
    pub calories: Quantity,
    pub protein: Quantity,
    pub date: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct UpdateMeal {
    pub name: Option<String>,
    pub calories: Option<Quantity>,
    pub protein: Option<Quantity>,
    pub date: Option<String>,
}

/// Owns the authoritative in-memory snapshot of the meal log. Mutations
/// persist first, then reconcile into the snapshot under the write lock.
#[derive(Clone)]
pub struct MealLogManager {
    collections: Option<MealCollections>,
    data: Arc<RwLock<Option<DailyLog>>>,
}

impl MealLogManager {
    pub fn new(collections: Option<MealCollections>) -> Self {
        Self {
            collections,
            data: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn grouped(&self) -> Result<DailyLog, MealLogError> {
        let data = self.data.read().await;

        if let Some(log) = data.as_ref() {
            Ok(log.clone())
        } else {
            drop(data);
            self.reload().await
        }
    }

    /// Rebuilds the snapshot from the store; on failure the held snapshot
    /// stays as it was.
    pub async fn reload(&self) -> Result<DailyLog, MealLogError> {
        let Some(collections) = &self.collections else {
            // no backing store: the held log is the whole truth
            let mut data = self.data.write().await;
            return Ok(data.get_or_insert_with(DailyLog::default).clone());
        };

        let records = collections.list_all().await?;
        let (log, skipped) = DailyLog::from_records(records);
        if !skipped.is_empty() {
            tracing::warn!("excluded {} meals with unparseable dates", skipped.len());
        }

        *self.data.write().await = Some(log.clone());
        Ok(log)
    }

    pub async fn day_view(&self, day: DayKey) -> Result<DayGroup, MealLogError> {
        let log = self.grouped().await?;

        Ok(match &self.collections {
            Some(collections) => log.day_or_fetch(day, |date| async move {
                let meals = collections.list_for_day(date).await?;
                Ok::<_, MealLogError>(if meals.is_empty() {
                    None
                } else {
                    Some(DayGroup { date, meals })
                })
            }).await?.into_owned(),
            None => log.day(&day).cloned().unwrap_or_else(|| DayGroup::empty(day)),
        })
    }

    pub async fn meal(&self, id: &str) -> Result<MealRecord, MealLogError> {
        if let Some(collections) = &self.collections {
            return collections.find(id).await;
        }

        self.data.read().await
            .as_ref()
            .and_then(|log| log.find(id).cloned())
            .ok_or_else(|| MealLogError::NotFound(id.to_string()))
    }

    pub async fn create(&self, req: NewMeal) -> Result<MealRecord, MealLogError> {
        if req.name.trim().is_empty() {
            return Err(MealLogError::EmptyName);
        }

        // the date defaults to today when the form omits it
        let date = match &req.date {
            Some(token) => DayKey::parse(token)?,
            None => DayKey::today(),
        };

        let record = match &self.collections {
            Some(collections) =>
                collections.insert(&req.name, date, req.calories, req.protein).await?,
            None => MealRecord {
                id: ObjectId::new().to_hex(),
                date: date.to_string(),
                name: req.name,
                calories: req.calories,
                protein: req.protein,
            },
        };

        let mut data = self.data.write().await;
        if self.collections.is_none() && data.is_none() {
            *data = Some(DailyLog::default());
        }
        if let Some(log) = data.as_mut() {
            if let Err(skip) = log.insert(record.clone()) {
                tracing::error!("could not reconcile created meal: {}", skip.error);
            }
        }

        tracing::info!("created meal {}", record.id);
        Ok(record)
    }

    pub async fn update(&self, id: &str, req: UpdateMeal) -> Result<MealRecord, MealLogError> {
        if req.name.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(MealLogError::EmptyName);
        }
        let date = req.date.as_deref().map(DayKey::parse).transpose()?;

        let Some(collections) = &self.collections else {
            let mut data = self.data.write().await;
            let log = data.as_mut()
                .ok_or_else(|| MealLogError::NotFound(id.to_string()))?;
            let mut meal = log.remove(id)
                .ok_or_else(|| MealLogError::NotFound(id.to_string()))?;

            if let Some(name) = req.name { meal.name = name; }
            if let Some(calories) = req.calories { meal.calories = calories; }
            if let Some(protein) = req.protein { meal.protein = protein; }
            if let Some(date) = date { meal.date = date.to_string(); }

            if let Err(skip) = log.insert(meal.clone()) {
                tracing::error!("could not reconcile updated meal: {}", skip.error);
            }
            return Ok(meal);
        };

        let updated = collections.update(id, &req, date).await?;

        // remove + insert, so a changed date lands in its new bucket
        let mut data = self.data.write().await;
        if let Some(log) = data.as_mut() {
            log.remove(id);
            if let Err(skip) = log.insert(updated.clone()) {
                tracing::error!("could not reconcile updated meal: {}", skip.error);
            }
        }

        Ok(updated)
    }

    // deleting a meal that is already gone is a no-op
    pub async fn delete(&self, id: &str) -> Result<(), MealLogError> {
        if let Some(collections) = &self.collections {
            collections.delete(id).await?;
        }

        let mut data = self.data.write().await;
        if let Some(log) = data.as_mut() {
            log.remove(id);
        }

        tracing::info!("deleted meal {id}");
        Ok(())
    }
}

#[derive(Clone)]
pub struct MealCollections {
    meals: Collection<StoredMeal>,
}

impl MealCollections {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            meals: db.collection("meals"),
        }
    }

    async fn list_all(&self) -> Result<Vec<MealRecord>, MealLogError> {
        let options = FindOptions::builder()
            .sort(doc! { "date": -1 })
        .build();

        let mut cursor = self.meals.find(doc! {}, options).await?;
        let mut records = Vec::new();
        while cursor.advance().await? {
            records.push(cursor.deserialize_current()?.into_record());
        }
        Ok(records)
    }

    async fn list_for_day(&self, day: DayKey) -> Result<Vec<MealRecord>, MealLogError> {
        let mut cursor = self.meals.find(doc! { "date": day.to_string() }, None).await?;
        let mut records = Vec::new();
        while cursor.advance().await? {
            records.push(cursor.deserialize_current()?.into_record());
        }
        Ok(records)
    }

    async fn find(&self, id: &str) -> Result<MealRecord, MealLogError> {
        let oid = ObjectId::parse_str(id)
            .map_err(|_| MealLogError::NotFound(id.to_string()))?;

        self.meals.find_one(doc! { "_id": oid }, None).await?
            .map(StoredMeal::into_record)
            .ok_or_else(|| MealLogError::NotFound(id.to_string()))
    }

    async fn insert(
        &self, name: &str, date: DayKey,
        calories: Quantity, protein: Quantity,
    ) -> Result<MealRecord, MealLogError> {
        let meal = StoredMeal {
            _id: None,
            date: date.to_string(),
            name: name.into(),
            calories, protein,
        };

        let res = self.meals.insert_one(&meal, None).await?;
        let _id = res.inserted_id.as_object_id()
            .expect("insert_one reports the generated _id");

        Ok(StoredMeal { _id: Some(_id), ..meal }.into_record())
    }

    async fn update(
        &self, id: &str, req: &UpdateMeal,
        date: Option<DayKey>,
    ) -> Result<MealRecord, MealLogError> {
        let oid = ObjectId::parse_str(id)
            .map_err(|_| MealLogError::NotFound(id.to_string()))?;

        let mut set = doc! {};
        if let Some(name) = &req.name {
            set.insert("name", name);
        }
        if let Some(calories) = req.calories {
            set.insert("calories", calories.get() as i64);
        }
        if let Some(protein) = req.protein {
            set.insert("protein", protein.get() as i64);
        }
        if let Some(date) = date {
            set.insert("date", date.to_string());
        }

        let found = if set.is_empty() {
            self.meals.find_one(doc! { "_id": oid }, None).await?
        } else {
            self.meals.find_one_and_update(
                doc! { "_id": oid },
                doc! { "$set": set },
                Some(FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                .build()),
            ).await?
        };

        found.map(StoredMeal::into_record)
            .ok_or_else(|| MealLogError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), MealLogError> {
        // an id that cannot exist is already gone
        let Ok(oid) = ObjectId::parse_str(id) else { return Ok(()) };

        self.meals.delete_one(doc! { "_id": oid }, None).await?;
        Ok(())
    }
}
