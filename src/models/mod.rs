//! Data Transfer Objects
//!
//! Plain data shared by the server, the sync client and the WebSocket
//! protocol:
//!
//! - **user**: `User`, `UserFull`, `UserSettings`, `ProfileImage`
//! - **workout**: the `Workout` → `Exercise` → `Set` → `Subset` tree and the
//!   payloads that create it
//! - **measurement**: weight, height and body fat values

pub mod measurement;
pub mod user;
pub mod workout;

pub use measurement::{
    MeasurementEntry, MeasurementKind, MeasurementValue, Measurements, NewMeasurement,
    SimpleMeasurements,
};
pub use user::{
    ProfileImage, SettingsUpdate, UpdateBioRequest, UpdateNameRequest, UpdateSettingsRequest,
    User, UserCreate, UserFull, UserSettings, MAX_PROFILE_IMAGE_BYTES,
};
pub use workout::{
    exercise_name, Exercise, ExerciseCreate, ExerciseData, Set, SetCreate, SetData, Subset,
    SubsetCreate, SubsetData, Workout, WorkoutCreate,
};
