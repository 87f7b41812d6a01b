//! Workout tree types
//!
//! A workout nests exercises, an exercise nests sets, and a set nests subsets
//! (the individual reps/weight records). Read models carry server-assigned
//! ids and timestamps; the `*Data` types are the id-less shapes used when
//! creating a subtree, and the `*Create` types add the parent id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Exercise name reported when an exercise has no sets yet
pub const EMPTY_EXERCISE_NAME: &str = "Empty Exercise";

/// A single reps/weight record inside a set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subset {
    pub id: i64,
    pub set_id: i64,
    pub subset_number: i32,
    pub reps: i32,
    /// Weight in kilograms
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
    pub id: i64,
    pub exercise_id: i64,
    pub set_number: i32,
    pub exercise_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub subsets: Vec<Subset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    pub workout_id: i64,
    /// Derived from the names of the contained sets, see [`exercise_name`]
    pub name: String,
    pub exercise_number: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sets: Vec<Set>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub workout_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Workout {
    /// Total number of sets across all exercises
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }
}

/// Name shown for an exercise given the names of its sets.
///
/// One distinct name is used as-is; several distinct names make a superset,
/// listed in sorted order.
pub fn exercise_name<'a>(set_names: impl IntoIterator<Item = &'a str>) -> String {
    let unique: BTreeSet<&str> = set_names.into_iter().collect();
    match unique.len() {
        0 => EMPTY_EXERCISE_NAME.to_string(),
        1 => unique.into_iter().next().unwrap_or_default().to_string(),
        _ => format!(
            "Superset - {}",
            unique.into_iter().collect::<Vec<_>>().join(", ")
        ),
    }
}

// ============================================
// Creation payloads
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsetData {
    pub subset_number: i32,
    pub reps: i32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetData {
    pub exercise_name: String,
    pub set_number: i32,
    #[serde(default)]
    pub subsets: Vec<SubsetData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseData {
    pub exercise_number: i32,
    #[serde(default)]
    pub sets: Vec<SetData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutCreate {
    pub user_id: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub workout_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub exercises: Vec<ExerciseData>,
}

impl WorkoutCreate {
    /// An empty workout for a user
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            workout_type: None,
            notes: None,
            completed: false,
            exercises: Vec::new(),
        }
    }

    /// Builder method: set the workout type label
    pub fn workout_type(mut self, workout_type: impl Into<String>) -> Self {
        self.workout_type = Some(workout_type.into());
        self
    }

    /// Builder method: set notes
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Builder method: append an exercise
    pub fn exercise(mut self, exercise: ExerciseData) -> Self {
        self.exercises.push(exercise);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseCreate {
    pub workout_id: i64,
    #[serde(flatten)]
    pub exercise: ExerciseData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetCreate {
    pub exercise_id: i64,
    #[serde(flatten)]
    pub set: SetData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsetCreate {
    pub set_id: i64,
    #[serde(flatten)]
    pub subset: SubsetData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exercise_name_empty() {
        assert_eq!(exercise_name(Vec::<&str>::new()), "Empty Exercise");
    }

    #[test]
    fn test_exercise_name_single() {
        assert_eq!(exercise_name(["Squat", "Squat"]), "Squat");
    }

    #[test]
    fn test_exercise_name_superset_sorted() {
        assert_eq!(
            exercise_name(["Row", "Bench Press", "Row"]),
            "Superset - Bench Press, Row"
        );
    }

    #[test]
    fn test_workout_create_deserialize_minimal() {
        let json = r#"{"user_id": 3, "exercises": []}"#;
        let create: WorkoutCreate = serde_json::from_str(json).unwrap();
        assert_eq!(create.user_id, 3);
        assert!(!create.completed);
        assert!(create.workout_type.is_none());
    }

    #[test]
    fn test_subset_create_flattens() {
        let create = SubsetCreate {
            set_id: 9,
            subset: SubsetData {
                subset_number: 1,
                reps: 8,
                weight: 60.0,
            },
        };
        let json = serde_json::to_value(&create).unwrap();
        assert_eq!(json["set_id"], 9);
        assert_eq!(json["reps"], 8);
        assert_eq!(json["subset_number"], 1);
    }

    #[test]
    fn test_workout_type_renamed() {
        let create = WorkoutCreate::new(1).workout_type("Legs");
        let json = serde_json::to_string(&create).unwrap();
        assert!(json.contains("\"type\":\"Legs\""));
    }
}
