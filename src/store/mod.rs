//! Repsync Store
//!
//! - **engine**: the in-memory tables and their operations
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use repsync::models::{UserCreate, WorkoutCreate};
//! use repsync::store::Store;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::new();
//!     let user = store.create_user(&UserCreate::new("Test User")).await?;
//!     let (workout, lineage) = store.create_workout(&WorkoutCreate::new(user.id)).await?;
//!
//!     println!("workout {} notifies {:?}", workout.id, lineage.resources());
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;

pub use engine::{Lineage, Store, StoreStats};
pub use error::{StoreError, StoreResult};
