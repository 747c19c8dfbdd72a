//! batcast CLI
//!
//! Next-season batting forecasts from a conditional diffusion model.

use clap::{Parser, Subcommand};

use batcast::{Config, Result};

#[derive(Parser)]
#[command(name = "batcast")]
#[command(about = "Next-season batting forecasts from a diffusion model", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest raw batting and people CSV files
    Ingest {
        /// Batting CSV path (one row per player-stint)
        batting: String,
        /// People CSV path (names and birth years)
        people: String,
    },
    /// Train the diffusion model and fit the scalers
    Train {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// Forecast next-season OBP/SLG/OPS for a player
    Predict {
        /// Player full name
        name: String,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Search players by name substring
    Players {
        /// Substring to match
        query: String,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show serving-model information
    Info,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table or json.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Ingest { batting, people } => commands::ingest(&config, &batting, &people),
        Commands::Train { epochs } => commands::train(&config, epochs),
        Commands::Predict { name, format } => commands::predict(&config, &name, format),
        Commands::Players { query } => commands::players(&config, &query),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
        Commands::Data { action } => match action {
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        if e.is_not_found() {
            eprintln!("Not found: {}", e);
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use batcast::data::dataset::{
        build_training_pairs, cond_matrix, split_by_year, target_matrix, DiffusionDataset,
    };
    use batcast::data::ingest::ingest_files;
    use batcast::data::Database;
    use batcast::features::scaler::{Scaler, COND_SCALER_FILE, TARGET_SCALER_FILE};
    use batcast::model::{Denoiser, DenoiserConfig, NoiseSchedule};
    use batcast::predict::inference::format_forecast;
    use batcast::predict::Predictor;
    use batcast::training::checkpoint::best_stem;
    use batcast::training::{CheckpointMeta, DiffusionTrainer};
    use batcast::BatcastError;
    use burn::backend::{Autodiff, NdArray};
    use std::path::Path;

    type InferenceBackend = NdArray<f32>;
    type TrainingBackend = Autodiff<NdArray<f32>>;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'batcast ingest <batting.csv> <people.csv>' to load data");
        println!("  3. Run 'batcast train' to fit the model");
        println!("  4. Run 'batcast predict \"Player Name\"' for a forecast");

        Ok(())
    }

    pub fn ingest(config: &Config, batting: &str, people: &str) -> Result<()> {
        let mut db = Database::open(&config.data.database_path)?;
        let summary = ingest_files(&mut db, batting, people)?;
        println!(
            "Ingested {} players and {} season lines",
            summary.players, summary.seasons
        );
        Ok(())
    }

    pub fn train(config: &Config, epochs: Option<usize>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let seasons = db.load_all_seasons()?;
        if seasons.is_empty() {
            return Err(BatcastError::Config(
                "No season data - run `batcast ingest` first".to_string(),
            ));
        }

        let pairs = build_training_pairs(&seasons, config.data.min_pa_train);
        println!("Total conditional rows: {}", pairs.len());

        let split = split_by_year(
            pairs,
            config.data.train_end_year,
            config.data.val_year,
            &config.data.exclude_years,
        );
        println!("Train rows: {}, Val rows: {}", split.train.len(), split.val.len());

        if split.train.is_empty() {
            return Err(BatcastError::Config(
                "No training pairs after the year split".to_string(),
            ));
        }

        // Fit scalers on the training years only and persist them
        let cond_scaler = Scaler::fit(&cond_matrix(&split.train))?;
        let target_scaler = Scaler::fit(&target_matrix(&split.train))?;

        let model_dir = Path::new(&config.data.model_dir);
        std::fs::create_dir_all(model_dir)?;
        cond_scaler.save(model_dir.join(COND_SCALER_FILE))?;
        target_scaler.save(model_dir.join(TARGET_SCALER_FILE))?;
        println!("Saved scalers to {}", model_dir.display());

        let train_dataset =
            DiffusionDataset::from_pairs(&split.train, &cond_scaler, &target_scaler)?;
        let val_dataset = if split.val.is_empty() {
            println!("No {} data yet - training without validation", config.data.val_year);
            None
        } else {
            Some(DiffusionDataset::from_pairs(
                &split.val,
                &cond_scaler,
                &target_scaler,
            )?)
        };

        let mut training_config = config.training.clone();
        if let Some(epochs) = epochs {
            training_config.epochs = epochs;
        }

        let device = Default::default();
        let model = Denoiser::<TrainingBackend>::new(
            &device,
            DenoiserConfig::from_model_config(&config.model),
        );
        let schedule = NoiseSchedule::from_config(&config.diffusion);

        let trainer = DiffusionTrainer::new(model, schedule, training_config, device);
        let (_model, history) = trainer.train(train_dataset, val_dataset, &config.data.model_dir)?;

        if history.val_losses.is_empty() {
            println!("Training complete ({} epochs)", history.train_losses.len());
        } else {
            println!(
                "Training complete: best val loss {:.4} at epoch {}",
                history.best_val_loss,
                history.best_epoch + 1
            );
        }
        println!("Serving model saved to {}", best_stem(&config.data.model_dir).display());

        Ok(())
    }

    pub fn predict(config: &Config, name: &str, format: OutputFormat) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let predictor = Predictor::<InferenceBackend>::load(db, config, Default::default())?;

        let forecast = predictor.predict(name)?;
        match format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&forecast)
                    .map_err(|e| BatcastError::Parse(e.to_string()))?;
                println!("{}", json);
            }
            OutputFormat::Table => println!("{}", format_forecast(&forecast)),
        }
        Ok(())
    }

    pub fn players(config: &Config, query: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let matches = db.search_players(query, config.data.min_pa_search)?;

        if matches.is_empty() {
            println!("No players matching '{}'", query);
            return Ok(());
        }
        for p in matches {
            println!("{:<12} {}", p.id, p.name);
        }
        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let model_dir = Path::new(&config.data.model_dir);
        let meta_path = best_stem(&config.data.model_dir).with_extension("json");
        if !meta_path.exists() {
            return Err(BatcastError::NoModel);
        }

        let meta = CheckpointMeta::load(&meta_path)?;
        println!("Serving model: {}", best_stem(&config.data.model_dir).display());
        println!("  epoch:      {}", meta.epoch);
        println!("  train loss: {:.4}", meta.train_loss);
        match meta.val_loss {
            Some(v) => println!("  val loss:   {:.4}", v),
            None => println!("  val loss:   (trained without validation)"),
        }

        let cond_scaler = Scaler::load(model_dir.join(COND_SCALER_FILE))?;
        let target_scaler = Scaler::load(model_dir.join(TARGET_SCALER_FILE))?;
        println!(
            "  scalers:    {} condition features, {} target features",
            cond_scaler.dim(),
            target_scaler.dim()
        );

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        println!("Database: {}", config.data.database_path);
        println!("  players: {}", db.player_count()?);
        println!("  seasons: {}", db.season_count()?);
        Ok(())
    }
}
