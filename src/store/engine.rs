//! Repsync Store
//!
//! In-memory relational state behind the API:
//! - Users with their settings and measurement history
//! - The workout tree, one table per level, linked by parent ids
//!
//! Ids come from per-table sequences starting at 1. Tables are `BTreeMap`s
//! keyed by id. Every parent row keeps the ids of its children in insertion
//! order, which is their display order, so assembling a tree touches only
//! the rows it returns. Thread-safe via Tokio's async RwLock.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use uuid::Uuid;

use crate::models::user::{MAX_BIO_LEN, MAX_NAME_LEN, MAX_PROFILE_IMAGE_BYTES};
use crate::models::{
    exercise_name, Exercise, ExerciseCreate, ExerciseData, MeasurementEntry, MeasurementKind,
    Measurements, ProfileImage, Set, SetCreate, SetData, SettingsUpdate, Subset, SubsetData,
    User, UserCreate, UserFull, UserSettings, Workout, WorkoutCreate,
};
use crate::store::error::{StoreError, StoreResult};
use crate::websocket::resource;

/// Ancestry of a mutated entity, leaf to root
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lineage {
    pub user_id: i64,
    pub workout_id: Option<i64>,
    pub exercise_id: Option<i64>,
    pub set_id: Option<i64>,
    pub subset_id: Option<i64>,
}

impl Lineage {
    /// Resource ids to notify, from the most specific entity up to the user
    pub fn resources(&self) -> Vec<String> {
        let mut resources = Vec::with_capacity(5);
        if let Some(id) = self.subset_id {
            resources.push(resource::subset(id));
        }
        if let Some(id) = self.set_id {
            resources.push(resource::set(id));
        }
        if let Some(id) = self.exercise_id {
            resources.push(resource::exercise(id));
        }
        if let Some(id) = self.workout_id {
            resources.push(resource::workout(id));
        }
        resources.push(resource::user(self.user_id));
        resources
    }
}

/// Counts of stored rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub users: usize,
    pub workouts: usize,
    pub exercises: usize,
    pub sets: usize,
    pub subsets: usize,
    pub measurements: usize,
}

#[derive(Debug, Clone)]
struct UserRow {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
    bio: Option<String>,
    settings: UserSettings,
    profile_image: Option<StoredImage>,
    workout_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
struct StoredImage {
    metadata: ProfileImage,
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct WorkoutRow {
    id: i64,
    user_id: i64,
    workout_type: Option<String>,
    notes: Option<String>,
    completed: bool,
    created_at: DateTime<Utc>,
    exercise_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
struct ExerciseRow {
    id: i64,
    workout_id: i64,
    exercise_number: i32,
    created_at: DateTime<Utc>,
    set_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
struct SetRow {
    id: i64,
    exercise_id: i64,
    exercise_name: String,
    set_number: i32,
    created_at: DateTime<Utc>,
    subset_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
struct MeasurementRow {
    user_id: i64,
    entry: MeasurementEntry,
}

/// Per-table id sequences
#[derive(Debug, Default)]
struct Sequences {
    user: i64,
    workout: i64,
    exercise: i64,
    set: i64,
    subset: i64,
    measurement: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, UserRow>,
    workouts: BTreeMap<i64, WorkoutRow>,
    exercises: BTreeMap<i64, ExerciseRow>,
    sets: BTreeMap<i64, SetRow>,
    subsets: BTreeMap<i64, Subset>,
    measurements: Vec<MeasurementRow>,
    seq: Sequences,
}

impl Tables {
    fn require_user(&self, id: i64) -> StoreResult<&UserRow> {
        self.users.get(&id).ok_or(StoreError::not_found("User", id))
    }

    fn require_user_mut(&mut self, id: i64) -> StoreResult<&mut UserRow> {
        self.users
            .get_mut(&id)
            .ok_or(StoreError::not_found("User", id))
    }

    fn require_workout(&self, id: i64) -> StoreResult<&WorkoutRow> {
        self.workouts
            .get(&id)
            .ok_or(StoreError::not_found("Workout", id))
    }

    fn require_exercise(&self, id: i64) -> StoreResult<&ExerciseRow> {
        self.exercises
            .get(&id)
            .ok_or(StoreError::not_found("Exercise", id))
    }

    fn require_set(&self, id: i64) -> StoreResult<&SetRow> {
        self.sets.get(&id).ok_or(StoreError::not_found("Set", id))
    }

    // ----- assembly -----

    fn assemble_user(&self, row: &UserRow) -> UserFull {
        UserFull {
            id: row.id,
            name: row.name.clone(),
            created_at: row.created_at,
            bio: row.bio.clone(),
            settings: row.settings.clone(),
            measurements: self.measurements_of(row.id).latest(),
            has_profile_image: row.profile_image.is_some(),
            profile_image: row.profile_image.as_ref().map(|i| i.metadata.clone()),
        }
    }

    fn assemble_set(&self, row: &SetRow) -> Set {
        Set {
            id: row.id,
            exercise_id: row.exercise_id,
            set_number: row.set_number,
            exercise_name: row.exercise_name.clone(),
            created_at: row.created_at,
            subsets: row
                .subset_ids
                .iter()
                .filter_map(|id| self.subsets.get(id))
                .cloned()
                .collect(),
        }
    }

    fn assemble_exercise(&self, row: &ExerciseRow) -> Exercise {
        let sets: Vec<Set> = row
            .set_ids
            .iter()
            .filter_map(|id| self.sets.get(id))
            .map(|s| self.assemble_set(s))
            .collect();

        Exercise {
            id: row.id,
            workout_id: row.workout_id,
            name: exercise_name(sets.iter().map(|s| s.exercise_name.as_str())),
            exercise_number: row.exercise_number,
            created_at: row.created_at,
            sets,
        }
    }

    fn assemble_workout(&self, row: &WorkoutRow) -> Workout {
        Workout {
            id: row.id,
            user_id: row.user_id,
            workout_type: row.workout_type.clone(),
            notes: row.notes.clone(),
            completed: row.completed,
            created_at: row.created_at,
            exercises: row
                .exercise_ids
                .iter()
                .filter_map(|id| self.exercises.get(id))
                .map(|e| self.assemble_exercise(e))
                .collect(),
        }
    }

    fn measurements_of(&self, user_id: i64) -> Measurements {
        let mut all = Measurements::default();
        for row in self.measurements.iter().filter(|m| m.user_id == user_id) {
            let bucket = match row.entry.kind {
                MeasurementKind::Weight => &mut all.weight,
                MeasurementKind::Height => &mut all.height,
                MeasurementKind::BodyFat => &mut all.body_fat,
            };
            bucket.push(row.entry.clone());
        }
        for bucket in [&mut all.weight, &mut all.height, &mut all.body_fat] {
            // Newest first; later insertions win ties
            bucket.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        }
        all
    }

    // ----- inserts -----

    fn insert_subset(&mut self, set_id: i64, data: &SubsetData, now: DateTime<Utc>) -> Subset {
        let subset = Subset {
            id: next(&mut self.seq.subset),
            set_id,
            subset_number: data.subset_number,
            reps: data.reps,
            weight: data.weight,
            created_at: now,
        };
        if let Some(set) = self.sets.get_mut(&set_id) {
            set.subset_ids.push(subset.id);
        }
        self.subsets.insert(subset.id, subset.clone());
        subset
    }

    fn insert_set(&mut self, exercise_id: i64, data: &SetData, now: DateTime<Utc>) -> i64 {
        let id = next(&mut self.seq.set);
        self.sets.insert(
            id,
            SetRow {
                id,
                exercise_id,
                exercise_name: data.exercise_name.trim().to_string(),
                set_number: data.set_number,
                created_at: now,
                subset_ids: Vec::with_capacity(data.subsets.len()),
            },
        );
        if let Some(exercise) = self.exercises.get_mut(&exercise_id) {
            exercise.set_ids.push(id);
        }
        for subset in &data.subsets {
            self.insert_subset(id, subset, now);
        }
        id
    }

    fn insert_exercise(&mut self, workout_id: i64, data: &ExerciseData, now: DateTime<Utc>) -> i64 {
        let id = next(&mut self.seq.exercise);
        self.exercises.insert(
            id,
            ExerciseRow {
                id,
                workout_id,
                exercise_number: data.exercise_number,
                created_at: now,
                set_ids: Vec::with_capacity(data.sets.len()),
            },
        );
        if let Some(workout) = self.workouts.get_mut(&workout_id) {
            workout.exercise_ids.push(id);
        }
        for set in &data.sets {
            self.insert_set(id, set, now);
        }
        id
    }
}

// ============================================
// Validation
// ============================================

fn validate_name(name: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::invalid("name", "must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(StoreError::invalid(
            "name",
            format!("exceeds maximum length of {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(name.to_string())
}

fn validate_bio(bio: &str) -> StoreResult<Option<String>> {
    let bio = bio.trim();
    if bio.chars().count() > MAX_BIO_LEN {
        return Err(StoreError::invalid(
            "bio",
            format!("exceeds maximum length of {} characters", MAX_BIO_LEN),
        ));
    }
    Ok((!bio.is_empty()).then(|| bio.to_string()))
}

fn validate_image(mime_type: &str, data: &[u8]) -> StoreResult<()> {
    if !mime_type.starts_with("image/") {
        return Err(StoreError::invalid("image", "only images are allowed"));
    }
    if data.is_empty() {
        return Err(StoreError::invalid("image", "file is empty"));
    }
    if data.len() > MAX_PROFILE_IMAGE_BYTES {
        return Err(StoreError::invalid(
            "image",
            format!("exceeds maximum size of {} bytes", MAX_PROFILE_IMAGE_BYTES),
        ));
    }
    Ok(())
}

fn validate_subset(data: &SubsetData) -> StoreResult<()> {
    if data.reps < 0 {
        return Err(StoreError::invalid("reps", "must not be negative"));
    }
    if !data.weight.is_finite() || data.weight < 0.0 {
        return Err(StoreError::invalid(
            "weight",
            "must be a finite, non-negative number",
        ));
    }
    Ok(())
}

fn validate_set(data: &SetData) -> StoreResult<()> {
    if data.exercise_name.trim().is_empty() {
        return Err(StoreError::invalid("exercise_name", "must not be empty"));
    }
    data.subsets.iter().try_for_each(validate_subset)
}

fn validate_exercise(data: &ExerciseData) -> StoreResult<()> {
    data.sets.iter().try_for_each(validate_set)
}

// ============================================
// Store
// ============================================

/// Shared in-memory store
#[derive(Debug, Default)]
pub struct Store {
    tables: RwLock<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stats(&self) -> StoreStats {
        let t = self.tables.read().await;
        StoreStats {
            users: t.users.len(),
            workouts: t.workouts.len(),
            exercises: t.exercises.len(),
            sets: t.sets.len(),
            subsets: t.subsets.len(),
            measurements: t.measurements.len(),
        }
    }

    // ----- users -----

    pub async fn create_user(&self, create: &UserCreate) -> StoreResult<User> {
        let name = validate_name(&create.name)?;
        let mut t = self.tables.write().await;

        let row = UserRow {
            id: next(&mut t.seq.user),
            name,
            created_at: Utc::now(),
            bio: None,
            settings: UserSettings::default(),
            profile_image: None,
            workout_ids: Vec::new(),
        };
        let user = User {
            id: row.id,
            name: row.name.clone(),
            created_at: row.created_at,
        };
        t.users.insert(row.id, row);

        tracing::info!(user_id = user.id, "Created user");
        Ok(user)
    }

    pub async fn list_users(&self) -> Vec<User> {
        let t = self.tables.read().await;
        t.users
            .values()
            .map(|u| User {
                id: u.id,
                name: u.name.clone(),
                created_at: u.created_at,
            })
            .collect()
    }

    pub async fn get_user(&self, id: i64) -> StoreResult<UserFull> {
        let t = self.tables.read().await;
        let row = t.require_user(id)?;
        Ok(t.assemble_user(row))
    }

    pub async fn update_name(&self, user_id: i64, name: &str) -> StoreResult<UserFull> {
        let name = validate_name(name)?;
        let mut t = self.tables.write().await;
        t.require_user_mut(user_id)?.name = name;

        tracing::info!(user_id, "Renamed user");
        Ok(t.assemble_user(&t.users[&user_id]))
    }

    pub async fn update_bio(&self, user_id: i64, bio: &str) -> StoreResult<UserFull> {
        let bio = validate_bio(bio)?;
        let mut t = self.tables.write().await;
        t.require_user_mut(user_id)?.bio = bio;
        Ok(t.assemble_user(&t.users[&user_id]))
    }

    // ----- profile image -----

    /// Store or replace the profile image; a replacement keeps the image id
    pub async fn set_profile_image(
        &self,
        user_id: i64,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> StoreResult<ProfileImage> {
        validate_image(mime_type, &data)?;

        let mut t = self.tables.write().await;
        let row = t.require_user_mut(user_id)?;
        let id = row
            .profile_image
            .as_ref()
            .map(|i| i.metadata.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let metadata = ProfileImage {
            id,
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            size: data.len() as u64,
        };
        row.profile_image = Some(StoredImage {
            metadata: metadata.clone(),
            data,
        });

        tracing::info!(user_id, size = metadata.size, "Stored profile image");
        Ok(metadata)
    }

    /// Metadata and bytes of the profile image
    pub async fn profile_image(&self, user_id: i64) -> StoreResult<(ProfileImage, Vec<u8>)> {
        let t = self.tables.read().await;
        let image = t
            .require_user(user_id)?
            .profile_image
            .as_ref()
            .ok_or(StoreError::not_found("Profile image", user_id))?;
        Ok((image.metadata.clone(), image.data.clone()))
    }

    pub async fn profile_image_metadata(&self, user_id: i64) -> StoreResult<ProfileImage> {
        let t = self.tables.read().await;
        t.require_user(user_id)?
            .profile_image
            .as_ref()
            .map(|i| i.metadata.clone())
            .ok_or(StoreError::not_found("Profile image", user_id))
    }

    /// Remove the profile image; `false` when there was none
    pub async fn delete_profile_image(&self, user_id: i64) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let removed = t.require_user_mut(user_id)?.profile_image.take().is_some();
        if removed {
            tracing::info!(user_id, "Deleted profile image");
        }
        Ok(removed)
    }

    pub async fn update_settings(
        &self,
        user_id: i64,
        update: &SettingsUpdate,
    ) -> StoreResult<UserSettings> {
        if let Some(language) = &update.language {
            if language.trim().is_empty() {
                return Err(StoreError::invalid("language", "must not be empty"));
            }
        }
        if let Some(unit) = &update.default_measurement_unit {
            if unit.trim().is_empty() {
                return Err(StoreError::invalid(
                    "defaultMeasurementUnit",
                    "must not be empty",
                ));
            }
        }

        let mut t = self.tables.write().await;
        let row = t.require_user_mut(user_id)?;
        row.settings.apply(update);
        Ok(row.settings.clone())
    }

    // ----- measurements -----

    pub async fn add_measurement(
        &self,
        user_id: i64,
        kind: MeasurementKind,
        value: f64,
        date: Option<DateTime<Utc>>,
    ) -> StoreResult<MeasurementEntry> {
        kind.validate(value)
            .map_err(|reason| StoreError::invalid("value", reason))?;

        let mut t = self.tables.write().await;
        t.require_user(user_id)?;

        let entry = MeasurementEntry {
            id: next(&mut t.seq.measurement),
            kind,
            value,
            date: date.unwrap_or_else(Utc::now),
        };
        t.measurements.push(MeasurementRow {
            user_id,
            entry: entry.clone(),
        });
        Ok(entry)
    }

    pub async fn measurements(&self, user_id: i64) -> StoreResult<Measurements> {
        let t = self.tables.read().await;
        t.require_user(user_id)?;
        Ok(t.measurements_of(user_id))
    }

    pub async fn measurement_history(
        &self,
        user_id: i64,
        kind: MeasurementKind,
        limit: usize,
    ) -> StoreResult<Vec<MeasurementEntry>> {
        let all = self.measurements(user_id).await?;
        Ok(all.of_kind(kind).iter().take(limit).cloned().collect())
    }

    // ----- workouts -----

    pub async fn create_workout(&self, create: &WorkoutCreate) -> StoreResult<(Workout, Lineage)> {
        create.exercises.iter().try_for_each(validate_exercise)?;

        let mut t = self.tables.write().await;
        t.require_user(create.user_id)?;

        let now = Utc::now();
        let id = next(&mut t.seq.workout);
        t.workouts.insert(
            id,
            WorkoutRow {
                id,
                user_id: create.user_id,
                workout_type: create.workout_type.clone(),
                notes: create.notes.clone(),
                completed: create.completed,
                created_at: now,
                exercise_ids: Vec::with_capacity(create.exercises.len()),
            },
        );
        if let Some(user) = t.users.get_mut(&create.user_id) {
            user.workout_ids.push(id);
        }
        for exercise in &create.exercises {
            t.insert_exercise(id, exercise, now);
        }

        let workout = t.assemble_workout(&t.workouts[&id]);
        let lineage = Lineage {
            user_id: create.user_id,
            workout_id: Some(id),
            ..Default::default()
        };
        tracing::info!(workout_id = id, user_id = create.user_id, "Created workout");
        Ok((workout, lineage))
    }

    /// All workouts, optionally only those of one user
    pub async fn list_workouts(&self, user_id: Option<i64>) -> Vec<Workout> {
        let t = self.tables.read().await;
        match user_id {
            Some(uid) => t
                .users
                .get(&uid)
                .map(|u| {
                    u.workout_ids
                        .iter()
                        .filter_map(|id| t.workouts.get(id))
                        .map(|w| t.assemble_workout(w))
                        .collect()
                })
                .unwrap_or_default(),
            None => t.workouts.values().map(|w| t.assemble_workout(w)).collect(),
        }
    }

    pub async fn get_workout(&self, id: i64) -> StoreResult<Workout> {
        let t = self.tables.read().await;
        let row = t.require_workout(id)?;
        Ok(t.assemble_workout(row))
    }

    pub async fn create_exercise(
        &self,
        create: &ExerciseCreate,
    ) -> StoreResult<(Exercise, Lineage)> {
        validate_exercise(&create.exercise)?;

        let mut t = self.tables.write().await;
        let user_id = t.require_workout(create.workout_id)?.user_id;

        let id = t.insert_exercise(create.workout_id, &create.exercise, Utc::now());
        let exercise = t.assemble_exercise(&t.exercises[&id]);
        let lineage = Lineage {
            user_id,
            workout_id: Some(create.workout_id),
            exercise_id: Some(id),
            ..Default::default()
        };
        Ok((exercise, lineage))
    }

    pub async fn get_exercise(&self, id: i64) -> StoreResult<Exercise> {
        let t = self.tables.read().await;
        let row = t.require_exercise(id)?;
        Ok(t.assemble_exercise(row))
    }

    pub async fn create_set(&self, create: &SetCreate) -> StoreResult<(Set, Lineage)> {
        validate_set(&create.set)?;

        let mut t = self.tables.write().await;
        let workout_id = t.require_exercise(create.exercise_id)?.workout_id;
        let user_id = t.require_workout(workout_id)?.user_id;

        let id = t.insert_set(create.exercise_id, &create.set, Utc::now());
        let set = t.assemble_set(&t.sets[&id]);
        let lineage = Lineage {
            user_id,
            workout_id: Some(workout_id),
            exercise_id: Some(create.exercise_id),
            set_id: Some(id),
            ..Default::default()
        };
        Ok((set, lineage))
    }

    pub async fn get_set(&self, id: i64) -> StoreResult<Set> {
        let t = self.tables.read().await;
        let row = t.require_set(id)?;
        Ok(t.assemble_set(row))
    }

    pub async fn create_subset(
        &self,
        set_id: i64,
        data: &SubsetData,
    ) -> StoreResult<(Subset, Lineage)> {
        validate_subset(data)?;

        let mut t = self.tables.write().await;
        let exercise_id = t.require_set(set_id)?.exercise_id;
        let workout_id = t.require_exercise(exercise_id)?.workout_id;
        let user_id = t.require_workout(workout_id)?.user_id;

        let subset = t.insert_subset(set_id, data, Utc::now());
        let lineage = Lineage {
            user_id,
            workout_id: Some(workout_id),
            exercise_id: Some(exercise_id),
            set_id: Some(set_id),
            subset_id: Some(subset.id),
        };
        Ok((subset, lineage))
    }

    pub async fn get_subset(&self, id: i64) -> StoreResult<Subset> {
        let t = self.tables.read().await;
        t.subsets
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found("Subset", id))
    }
}
