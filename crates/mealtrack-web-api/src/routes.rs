
use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json,
    Router,
};

use chrono::NaiveDate;
use mealtrack_log::{DayGroup, DayKey, MealRecord, Totals};
use tokio_cron_scheduler::Job;

use crate::config::Config;

use self::data::{MealCollections, MealLogError, MealLogManager, NewMeal, UpdateMeal};
use std::time::Instant;

mod data;
mod helpers;
use helpers::*;

#[derive(Clone, FromRef)]
struct AppState {
    meals: MealLogManager,
}

impl AppState {
    async fn new(config: &Config) -> Self {
        let db = if let Some(db) = &config.db {
            tracing::info!("connecting to db");
            let v = connect_db(db).await;
            tracing::info!("connected to db");
            v
        } else {
            tracing::info!("no db specified, keeping the log in memory");
            None
        };

        let meals = MealLogManager::new(db.as_ref().map(MealCollections::new));

        if let Err(err) = meals.reload().await {
            tracing::error!("could not load the meal log: {err}");
        }

        let m = meals.clone();
        register_jobs(|shed| async move {
            // resync every night at 00:01
            shed.add(Job::new_async("0 1 0 1/1 * ? *", move |uuid, _| {
                let m = m.clone();
                async move {
                    tracing::info!("resyncing meal log (job: {uuid:?})");
                    let start = Instant::now();
                    match m.reload().await {
                        Ok(log) => {
                            let took = start.elapsed();
                            tracing::info!("resynced {} days (took {took:?})", log.len());
                        },
                        Err(err) =>
                            tracing::error!("could not resync meal log: {err}"),
                    }
                }.pin()
            })?).await?;

            Ok(shed)
        }).await;

        Self { meals }
    }
}

pub async fn make_router(config: &Config) -> Router {
    Router::new()
        .route("/api/meals", get(meals).post(create_meal))
        .route("/api/meals/daily", get(daily))
        .route("/api/meals/:id", get(meal).put(update_meal).delete(delete_meal))
        .with_state(AppState::new(config).await)
}


#[derive(Default, Debug, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
enum RelativeDay {
    #[default] Today, Yesterday, Tomorrow,
}


#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum LogDay {
    Relative(RelativeDay),
    Date(NaiveDate),
}

impl LogDay {
    fn as_key(self) -> Option<DayKey> {
        let today = DayKey::today();
        Some(match self {
            LogDay::Relative(RelativeDay::Today) => today,
            LogDay::Relative(RelativeDay::Yesterday) => today.prev()?,
            LogDay::Relative(RelativeDay::Tomorrow) => today.next()?,
            LogDay::Date(d) => DayKey::from(d),
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct DailyQuery {
    day: Option<LogDay>,
}

#[derive(Debug, serde::Serialize)]
struct DayGroupView {
    date: DayKey,
    meals: Vec<MealRecord>,
    totals: Totals,
}

impl From<&DayGroup> for DayGroupView {
    fn from(group: &DayGroup) -> Self {
        Self {
            date: group.date,
            totals: group.totals(),
            meals: group.meals.clone(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct DailyView {
    date: DayKey,
    meals: Vec<MealRecord>,
    totals: Totals,
    prev: Option<DayKey>,
    next: Option<DayKey>,
}

impl DailyView {
    fn new(group: DayGroup) -> Self {
        Self {
            date: group.date,
            totals: group.totals(),
            prev: group.date.prev(),
            next: group.date.next(),
            meals: group.meals,
        }
    }
}

type Failure = (StatusCode, Json<String>);

fn fail(err: MealLogError) -> Failure {
    let status = match &err {
        MealLogError::Db(_) => StatusCode::BAD_GATEWAY,
        MealLogError::Date(_) | MealLogError::EmptyName => StatusCode::BAD_REQUEST,
        MealLogError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    (status, Json(err.to_string()))
}

async fn meals(
    State(state): State<MealLogManager>,
) -> Result<Json<Vec<DayGroupView>>, Failure> {
    let log = state.grouped().await.map_err(fail)?;
    Ok(Json(log.days_newest_first().map(DayGroupView::from).collect()))
}

async fn daily(
    Query(q): Query<DailyQuery>,
    State(state): State<MealLogManager>,
) -> Result<Json<DailyView>, Failure> {
    let day = q.day.unwrap_or(LogDay::Relative(RelativeDay::Today))
        .as_key().ok_or_else(|| {
            (StatusCode::BAD_REQUEST, Json(format!("invalid_date")))
        })?;
    Ok(Json(DailyView::new(state.day_view(day).await.map_err(fail)?)))
}

async fn meal(
    Path(id): Path<String>,
    State(state): State<MealLogManager>,
) -> Result<Json<MealRecord>, Failure> {
    Ok(Json(state.meal(&id).await.map_err(fail)?))
}

async fn create_meal(
    State(state): State<MealLogManager>,
    Json(req): Json<NewMeal>,
) -> Result<(StatusCode, Json<MealRecord>), Failure> {
    let record = state.create(req).await.map_err(fail)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_meal(
    Path(id): Path<String>,
    State(state): State<MealLogManager>,
    Json(req): Json<UpdateMeal>,
) -> Result<Json<MealRecord>, Failure> {
    Ok(Json(state.update(&id, req).await.map_err(fail)?))
}

async fn delete_meal(
    Path(id): Path<String>,
    State(state): State<MealLogManager>,
) -> Result<StatusCode, Failure> {
    state.delete(&id).await.map_err(fail)?;
    Ok(StatusCode::NO_CONTENT)
}
