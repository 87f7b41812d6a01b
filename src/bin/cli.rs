//! Repsync CLI
//!
//! Command-line interface over the sync client:
//! - List and create users and workouts
//! - Log subsets, settings and measurements
//! - Edit the profile name, bio and image
//! - Watch live updates for a user

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};

use repsync::client::{ApiClient, WsClient};
use repsync::config::{generate_default_config, Config};
use repsync::models::{
    ExerciseData, MeasurementEntry, MeasurementKind, SetData, SettingsUpdate, SubsetCreate,
    SubsetData, User, UserCreate, UserFull, Workout, WorkoutCreate,
};
use repsync::websocket::{resource, Event, PushMessage};

#[derive(Parser)]
#[command(name = "repsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Workout tracking with live sync")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server URL (default: from config or REPSYNC_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print client logs
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List users
    Users,

    /// Show a user with settings and latest measurements
    User { id: i64 },

    /// Create a user
    CreateUser { name: String },

    /// List workouts
    Workouts {
        /// Only workouts of this user
        #[arg(short, long)]
        user: Option<i64>,
    },

    /// Show a workout with its exercises, sets and subsets
    Workout { id: i64 },

    /// Create a workout
    CreateWorkout {
        user_id: i64,
        /// Workout type label (e.g. "Push", "Legs")
        #[arg(short = 't', long = "type")]
        workout_type: Option<String>,
        #[arg(short, long)]
        notes: Option<String>,
        /// Exercise name; repeat for several exercises
        #[arg(short, long = "exercise")]
        exercises: Vec<String>,
    },

    /// Log a subset (reps x weight) under a set
    AddSubset {
        set_id: i64,
        reps: i32,
        /// Weight in kg
        weight: f64,
        /// Subset number within the set
        #[arg(short, long, default_value = "1")]
        number: i32,
    },

    /// Rename a user
    Rename {
        #[arg(short, long)]
        user: i64,
        name: String,
    },

    /// Set a user's bio; an empty string clears it
    Bio {
        #[arg(short, long)]
        user: i64,
        bio: String,
    },

    /// Upload, download or delete a profile image; shows metadata by default
    ProfileImage {
        #[arg(short, long)]
        user: i64,
        /// Image file to upload
        #[arg(long, conflicts_with_all = ["download", "delete"])]
        upload: Option<PathBuf>,
        /// Write the current image to this path
        #[arg(long, conflicts_with = "delete")]
        download: Option<PathBuf>,
        #[arg(long)]
        delete: bool,
    },

    /// Update settings of a user
    Settings {
        #[arg(short, long)]
        user: i64,
        #[arg(long)]
        dark_mode: Option<bool>,
        #[arg(long)]
        language: Option<String>,
        /// Default measurement unit (metric, imperial)
        #[arg(long)]
        unit: Option<String>,
    },

    /// Record a measurement, or show its history when no value is given
    Measure {
        #[arg(short, long)]
        user: i64,
        /// weight, height or bodyFat
        kind: MeasurementKind,
        value: Option<f64>,
        /// History length
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Stream live updates for a user until Ctrl+C
    Watch {
        user_id: i64,
        /// Watch a raw resource id instead (e.g. "workouts:3", "users")
        #[arg(short, long)]
        resource: Option<String>,
    },

    /// Show server status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_config(output.as_ref());
    }

    let config = Config::load_or_default(cli.config.as_deref())?;
    if cli.verbose {
        repsync::logging::init(&config.logging);
    }

    let api_url = cli
        .api_url
        .clone()
        .unwrap_or_else(|| config.client.api_url.clone());
    let api = ApiClient::with_timeout(&api_url, config.client.request_timeout())
        .with_context(|| format!("Invalid server URL: {}", api_url))?;
    let format = cli.format;

    match cli.command {
        Commands::Users => {
            let users = api.users().get_users().await?;
            output(format, &users, print_users)?;
        }

        Commands::User { id } => {
            let user = api.users().get_user(id).await?;
            output(format, &user, print_user)?;
        }

        Commands::CreateUser { name } => {
            let user = api.users().create_user(&UserCreate::new(name)).await?;
            output(format, &user, |u| println!("Created user {} ({})", u.id, u.name))?;
        }

        Commands::Workouts { user } => {
            let workouts = match user {
                Some(user_id) => api.workouts().get_workouts_for_user(user_id).await?,
                None => api.workouts().get_workouts().await?,
            };
            output(format, &workouts, print_workouts)?;
        }

        Commands::Workout { id } => {
            let workout = api.workouts().get_workout(id).await?;
            output(format, &workout, print_workout)?;
        }

        Commands::CreateWorkout {
            user_id,
            workout_type,
            notes,
            exercises,
        } => {
            let mut create = WorkoutCreate::new(user_id);
            create.workout_type = workout_type;
            create.notes = notes;
            for (i, name) in exercises.into_iter().enumerate() {
                create = create.exercise(ExerciseData {
                    exercise_number: i as i32 + 1,
                    sets: vec![SetData {
                        exercise_name: name,
                        set_number: 1,
                        subsets: Vec::new(),
                    }],
                });
            }

            let workout = api.workouts().create_workout(&create).await?;
            output(format, &workout, print_workout)?;
        }

        Commands::AddSubset {
            set_id,
            reps,
            weight,
            number,
        } => {
            let subset = api
                .workouts()
                .create_subset(&SubsetCreate {
                    set_id,
                    subset: SubsetData {
                        subset_number: number,
                        reps,
                        weight,
                    },
                })
                .await?;
            output(format, &subset, |s| {
                println!("Logged {} x {:.1} kg (subset {})", s.reps, s.weight, s.id)
            })?;
        }

        Commands::Rename { user, name } => {
            let updated = api.profile(user).update_name(&name).await?;
            output(format, &updated, |u| println!("Renamed user {} to {}", u.id, u.name))?;
        }

        Commands::Bio { user, bio } => {
            let updated = api.profile(user).update_bio(&bio).await?;
            output(format, &updated, |u| match &u.bio {
                Some(bio) => println!("Bio: {}", bio),
                None => println!("Bio cleared"),
            })?;
        }

        Commands::ProfileImage {
            user,
            upload,
            download,
            delete,
        } => {
            let profile = api.profile(user);
            if let Some(path) = upload {
                let data = std::fs::read(&path)
                    .with_context(|| format!("Cannot read {}", path.display()))?;
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("profile-image");
                let image = profile
                    .upload_profile_image(filename, image_mime_type(&path), data)
                    .await?;
                output(format, &image, |i| {
                    println!("Uploaded {} ({}, {} bytes)", i.filename, i.mime_type, i.size)
                })?;
            } else if let Some(path) = download {
                let image = profile.get_profile_image().await?;
                std::fs::write(&path, &image.data)
                    .with_context(|| format!("Cannot write {}", path.display()))?;
                println!("Saved {} bytes ({}) to {}", image.data.len(), image.mime_type, path.display());
            } else if delete {
                profile.delete_profile_image().await?;
                println!("Profile image deleted");
            } else {
                let image = profile.get_profile_image_metadata().await?;
                output(format, &image, |i| {
                    println!("File: {}", i.filename);
                    println!("Type: {}", i.mime_type);
                    println!("Size: {} bytes", i.size);
                })?;
            }
        }

        Commands::Settings {
            user,
            dark_mode,
            language,
            unit,
        } => {
            let update = SettingsUpdate {
                dark_mode,
                language,
                default_measurement_unit: unit,
            };
            if update.is_empty() {
                bail!("Nothing to update: pass --dark-mode, --language or --unit");
            }
            let settings = api.profile(user).update_settings(&update).await?;
            output(format, &settings, |s| {
                println!("Dark mode: {}", s.dark_mode);
                println!("Language:  {}", s.language);
                println!("Units:     {}", s.default_measurement_unit);
            })?;
        }

        Commands::Measure {
            user,
            kind,
            value,
            limit,
        } => {
            let profile = api.profile(user);
            match value {
                Some(value) => {
                    let entry = profile.add_measurement(kind, value, None).await?;
                    output(format, &entry, |e| {
                        println!("Recorded {} = {} on {}", e.kind, e.value, e.date.format("%Y-%m-%d"))
                    })?;
                }
                None => {
                    let history = profile.get_measurement_history(kind, limit).await?;
                    output(format, &history, print_history)?;
                }
            }
        }

        Commands::Watch { user_id, resource } => {
            watch(&api_url, user_id, resource, format).await?;
        }

        Commands::Status => {
            let url = repsync::client::http::join_url(&api_url, "health");
            let health: serde_json::Value = reqwest::get(&url)
                .await
                .with_context(|| format!("Cannot connect to repsync server at {}", api_url))?
                .json()
                .await?;
            output(format, &health, |h| {
                println!("Repsync v{}", h["version"].as_str().unwrap_or("unknown"));
                println!("Status:      {}", h["status"].as_str().unwrap_or("unknown"));
                println!("Users:       {}", h["users"].as_u64().unwrap_or(0));
                println!("Workouts:    {}", h["workouts"].as_u64().unwrap_or(0));
                println!("Connections: {}", h["connections"].as_u64().unwrap_or(0));
                if let Some(uptime) = h["uptime_seconds"].as_u64() {
                    println!("Uptime:      {}", format_duration(uptime));
                }
            })?;
        }

        // Written before the config is loaded
        Commands::Config { .. } => {}
    }

    Ok(())
}

async fn watch(
    api_url: &str,
    user_id: i64,
    raw_resource: Option<String>,
    format: Format,
) -> anyhow::Result<()> {
    let ws = WsClient::from_base_url(api_url)?;
    ws.connect().await?;

    let print = move |push: &PushMessage| match format {
        Format::Json => match push.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode push: {}", e),
        },
        Format::Table => println!("{}", describe(push)),
    };

    let subscription = match raw_resource {
        Some(resource) => ws.subscribe(resource, print),
        None => ws.subscribe_to_user(user_id, print).await?,
    };
    let watched = subscription.resource().to_string();
    eprintln!("Watching {} (Ctrl+C to stop)", watched);

    let mut states = ws.state_changes();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = states.wait_for(|s| *s == repsync::ConnectionState::Disconnected) => {
            eprintln!("Connection closed by server");
        }
    }

    subscription.unsubscribe();
    ws.disconnect().await;
    Ok(())
}

fn describe(push: &PushMessage) -> String {
    let detail = match &push.event {
        Event::UserCreated(u) => format!("user {} \"{}\"", u.id, u.name),
        Event::WorkoutCreated(w) => format!(
            "workout {} ({}, {} exercises)",
            w.id,
            w.workout_type.as_deref().unwrap_or("untyped"),
            w.exercises.len()
        ),
        Event::ExerciseCreated(e) => format!("exercise {} \"{}\"", e.id, e.name),
        Event::SetCreated(s) => format!("set {} of {}", s.id, s.exercise_name),
        Event::SubsetCreated(s) => {
            format!("subset {} in set {}: {} x {:.1} kg", s.id, s.set_id, s.reps, s.weight)
        }
        Event::SettingsUpdated(s) => format!(
            "settings dark_mode={} language={} unit={}",
            s.dark_mode, s.language, s.default_measurement_unit
        ),
        Event::MeasurementAdded(m) => format!("{} = {}", m.kind, m.value),
        Event::UserUpdated(u) => format!(
            "user {} \"{}\"{}",
            u.id,
            u.name,
            if u.has_profile_image { " with image" } else { "" }
        ),
    };
    let scope = if push.resource == resource::USERS {
        "all users".to_string()
    } else {
        push.resource.clone()
    };
    format!("[{}] {}: {}", scope, push.event.kind(), detail)
}

fn image_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn write_config(path: Option<&PathBuf>) -> anyhow::Result<()> {
    let config = generate_default_config();

    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &config)?;
            println!("Config written to {:?}", path);
        }
        None => print!("{}", config),
    }
    Ok(())
}

fn output<T: Serialize>(format: Format, value: &T, table: impl FnOnce(&T)) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Table => table(value),
    }
    Ok(())
}

fn print_users(users: &Vec<User>) {
    if users.is_empty() {
        println!("No users yet.");
        println!();
        println!("Create one with:");
        println!("  repsync create-user \"Your Name\"");
        return;
    }

    println!("{:<6} {:<30} {}", "ID", "Name", "Created");
    println!("{}", "-".repeat(60));
    for user in users {
        println!(
            "{:<6} {:<30} {}",
            user.id,
            user.name,
            user.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_user(user: &UserFull) {
    println!("{} (id {})", user.name, user.id);
    if let Some(bio) = &user.bio {
        println!("{}", bio);
    }
    println!("Joined:    {}", user.created_at.format("%Y-%m-%d"));
    println!("Dark mode: {}", user.settings.dark_mode);
    println!("Language:  {}", user.settings.language);
    println!("Units:     {}", user.settings.default_measurement_unit);

    let m = &user.measurements;
    let show = |v: &Option<repsync::models::MeasurementValue>| {
        v.as_ref()
            .map(|v| format!("{} ({})", v.value, v.date.format("%Y-%m-%d")))
            .unwrap_or_else(|| "-".to_string())
    };
    println!();
    println!("Weight:    {}", show(&m.weight));
    println!("Height:    {}", show(&m.height));
    println!("Body fat:  {}", show(&m.body_fat));
}

fn print_workouts(workouts: &Vec<Workout>) {
    if workouts.is_empty() {
        println!("No workouts found.");
        return;
    }

    println!(
        "{:<6} {:<6} {:<12} {:<10} {:<6} {}",
        "ID", "User", "Type", "Exercises", "Sets", "Created"
    );
    println!("{}", "-".repeat(64));
    for w in workouts {
        println!(
            "{:<6} {:<6} {:<12} {:<10} {:<6} {}",
            w.id,
            w.user_id,
            w.workout_type.as_deref().unwrap_or("-"),
            w.exercises.len(),
            w.total_sets(),
            w.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_workout(workout: &Workout) {
    println!(
        "Workout {} for user {}{}",
        workout.id,
        workout.user_id,
        workout
            .workout_type
            .as_deref()
            .map(|t| format!(" ({})", t))
            .unwrap_or_default()
    );
    if let Some(notes) = &workout.notes {
        println!("Notes: {}", notes);
    }

    for exercise in &workout.exercises {
        println!();
        println!("  {}. {} [exercise {}]", exercise.exercise_number, exercise.name, exercise.id);
        for set in &exercise.sets {
            println!("     Set {} - {} [set {}]", set.set_number, set.exercise_name, set.id);
            for subset in &set.subsets {
                println!(
                    "       {}. {} x {:.1} kg",
                    subset.subset_number, subset.reps, subset.weight
                );
            }
        }
    }
}

fn print_history(history: &Vec<MeasurementEntry>) {
    if history.is_empty() {
        println!("No measurements recorded.");
        return;
    }
    println!("{:<12} {}", "Date", "Value");
    println!("{}", "-".repeat(24));
    for entry in history {
        println!("{:<12} {}", entry.date.format("%Y-%m-%d"), entry.value);
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
