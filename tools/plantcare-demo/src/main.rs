use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use owo_colors::OwoColorize;
use plantcare::auth::{MemoryAuthProvider, SessionContext};
use plantcare::camera::sys::simulated::{SimulatedCamera, SimulatedSurface, leaf_frame};
use plantcare::camera::{DeviceFault, FrameCapturer};
use plantcare::capture::{CaptureSession, SessionEvent, Severity};
use plantcare::garden::{MemoryPlantStore, PlantAssistant, PlantChat, PlantRecord, Role, Shelf};
use plantcare::identify::{IdentifyError, MockIdentifier};
use plantcare::storage::{MemoryStore, StoreError};
use plantcare::{KitConfig, UserGarden, draft_from_capture};

const DEMO_EMAIL: &str = "gardener@example.com";
const DEMO_PASSWORD: &str = "monstera";
const IDENTIFY_ATTEMPTS: usize = 3;

#[derive(Parser)]
#[command(name = "plantcare-demo")]
#[command(about = "Walk through the PlantCare add-a-plant flow on simulated devices", long_about = None)]
struct Cli {
    /// JSON config file overriding the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Photograph a plant, identify it and save it to the garden
    Flow {
        /// Deny camera access and fall back to file selection
        #[arg(long)]
        deny_camera: bool,
        /// Make the image upload fail
        #[arg(long)]
        fail_upload: bool,
        /// Seed for the mock identifier and the plant assistant
        #[arg(long)]
        seed: Option<u64>,
        /// Ask the plant assistant a question about the new plant (repeatable)
        #[arg(long = "ask", value_name = "QUESTION")]
        questions: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KitConfig::from_path(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => KitConfig::default(),
    };
    debug!("effective config: {config:?}");

    match cli.command {
        Commands::Flow {
            deny_camera,
            fail_upload,
            seed,
            questions,
        } => run_flow(&config, deny_camera, fail_upload, seed, &questions).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_flow(
    config: &KitConfig,
    deny_camera: bool,
    fail_upload: bool,
    seed: Option<u64>,
    questions: &[String],
) -> Result<()> {
    println!("{}", "🌱 Signing in...".green().bold());
    let auth = SessionContext::new(MemoryAuthProvider::new());
    auth.init().await?;
    auth.sign_up(DEMO_EMAIL, DEMO_PASSWORD).await?;
    let session = auth.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await?;
    println!("Signed in as {}", session.user.email);

    let camera = SimulatedCamera::new();
    if deny_camera {
        camera.fail_next(DeviceFault::new("NotAllowedError", "Permission denied"));
    }
    let store = MemoryStore::default();
    if fail_upload {
        store.fail_next(StoreError::Network("connection reset".into()));
    }
    let capture = CaptureSession::new(
        camera,
        SimulatedSurface::new(),
        store,
        config.session(),
    );
    let events = capture.subscribe();

    println!("{}", "📷 Starting camera...".yellow().bold());
    let upload = match capture.start().await {
        Ok(outcome) => {
            println!("Camera {outcome:?}");
            capture.capture().await?
        }
        Err(err) => {
            let snapshot = capture.snapshot();
            let message = snapshot.error_message().unwrap_or_else(|| err.to_string());
            println!("{}", message.red());
            if !snapshot.offers_file_selection() {
                anyhow::bail!("camera unavailable: {err}");
            }
            println!("{}", "📁 Choosing a photo instead...".yellow().bold());
            let photo = FrameCapturer::new(config.capture).encode(&leaf_frame(64, 48))?;
            capture.upload_file(photo.bytes().to_vec())?
        }
    };

    let status = upload.await;
    println!("Upload settled: {status:?}");
    let accepted = capture.accept()?;

    for event in std::iter::from_fn(|| events.try_recv().ok()) {
        print_event(&event);
    }

    println!("{}", "🔍 Identifying...".yellow().bold());
    let identifier = match seed {
        Some(seed) => MockIdentifier::with_seed(config.identify, seed),
        None => MockIdentifier::new(config.identify),
    };
    let mut attempt = 0;
    let (identification, draft) = loop {
        attempt += 1;
        match draft_from_capture(&identifier, &accepted).await {
            Ok(found) => break found,
            Err(IdentifyError::NeedsClearerImage) if attempt < IDENTIFY_ATTEMPTS => {
                println!("{}", IdentifyError::NeedsClearerImage.to_string().yellow());
            }
            Err(err) => return Err(err.into()),
        }
    };
    println!(
        "Identified {} ({}) with {:.0}% confidence",
        identification.name.bold(),
        identification.species.italic(),
        identification.confidence * 100.0
    );

    let plants = MemoryPlantStore::new();
    let garden = UserGarden::new(&plants, &auth);
    let record = garden.add(draft).await?;
    garden.water(record.id).await?;
    println!(
        "{}",
        format!("✅ {} added to your garden.", record.name).green().bold()
    );
    for plant in garden.plants(Shelf::Active).await? {
        println!(
            "  {} · water {} · light {} · {}",
            plant.name, plant.watering, plant.sunlight, plant.location
        );
        for tip in &plant.tips {
            println!("    - {tip}");
        }
    }

    if !questions.is_empty() {
        chat(config, seed, record, questions).await;
    }

    Ok(())
}

async fn chat(
    config: &KitConfig,
    seed: Option<u64>,
    plant: PlantRecord,
    questions: &[String],
) {
    let assistant = match seed {
        Some(seed) => PlantAssistant::with_seed(config.assistant, seed),
        None => PlantAssistant::new(config.assistant),
    };
    let mut chat = PlantChat::new(plant);
    for question in questions {
        assistant.ask(&mut chat, question).await;
    }
    println!("{}", "💬 Plant assistant".green().bold());
    for message in chat.messages() {
        match message.role {
            Role::Assistant => println!("  {} {}", "assistant:".cyan(), message.content),
            Role::User => println!("  {} {}", "you:".bold(), message.content),
        }
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::PhaseChanged(phase) => println!("  → {phase}"),
        SessionEvent::UploadFinished(status) => println!("  ⇡ {status:?}"),
        SessionEvent::Notice(notice) => match notice.severity {
            Severity::Info => println!("  {}: {}", notice.title.bold(), notice.description),
            Severity::Destructive => println!(
                "  {}: {}",
                notice.title.red().bold(),
                notice.description
            ),
        },
    }
}
