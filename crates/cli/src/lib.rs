use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use takeoff_core::{
    export_measurements_csv, summarize, Calibration, CalibrationStore, Condition, ConditionTotal,
    Container, ContainerSize, CsvExportConfig, DevicePoint, EngineConfig, FixedPageRenderer,
    InMemoryStore, InputEvent, Key, KnownDistance, Measurement, MeasurementStore, PageGeometry,
    SheetKey, TakeoffView, ViewEffect, ViewError,
};
use takeoff_storage::FileStore;

#[derive(Debug, Parser)]
#[command(name = "takeoff")]
#[command(about = "Takeoff measurement CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a scripted input session and print what it produced.
    Replay {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
        /// Persist results to this store directory (default: in memory only)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Engine configuration as JSON (default: TAKEOFF_* environment)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the stored measurements and totals of a sheet as JSON.
    List {
        #[arg(long)]
        project: String,
        #[arg(long)]
        sheet: String,
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Export a sheet's measurements as CSV.
    Export {
        #[arg(long)]
        project: String,
        #[arg(long)]
        sheet: String,
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

/// A scripted session: one sheet, known page sizes, and a list of steps.
#[derive(Debug, Deserialize)]
struct Script {
    project: String,
    sheet: String,
    #[serde(default)]
    container: ScriptContainer,
    pages: Vec<PageGeometry>,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct ScriptContainer {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Default for ScriptContainer {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, width: 1000.0, height: 800.0 }
    }
}

/// Coordinates are device pixels.
#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum Step {
    OpenPage { page: u32 },
    SelectCondition { condition: Condition },
    Calibrate { distance: Option<f64>, unit: Option<String> },
    SubmitDistance { distance: f64, unit: String },
    Click { x: f64, y: f64 },
    DoubleClick { x: f64, y: f64 },
    Finish,
    Cancel,
    Undo,
    Zoom { x: f64, y: f64, delta: f64 },
    Pan { dx: f64, dy: f64 },
    Rotate { quarter_turns: i32 },
    Fit,
    Input { event: InputEvent },
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    sheet: String,
    calibration: Option<Calibration>,
    measurements: Vec<Measurement>,
    totals: Vec<ConditionTotal>,
    errors: Vec<StepError>,
}

/// A step the engine rejected; replay continues with the next one.
#[derive(Debug, Serialize)]
struct StepError {
    step: usize,
    message: String,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    sheet: String,
    calibration: Option<Calibration>,
    measurements: Vec<Measurement>,
    totals: Vec<ConditionTotal>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Replay { script, store, config } => {
            run_replay(&script, store.as_deref(), config.as_deref())
        }
        Commands::List { project, sheet, store } => {
            run_list(&SheetKey::new(project.as_str(), sheet.as_str()), store)
        }
        Commands::Export { project, sheet, store, output } => {
            run_export(&SheetKey::new(project.as_str(), sheet.as_str()), store, output.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_replay(script_path: &Path, store: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;

    let bytes = fs::read(script_path)
        .with_context(|| format!("failed to read script {}", script_path.display()))?;
    let script: Script = serde_json::from_slice(&bytes).context("failed to parse script")?;

    let output = match store {
        Some(root) => replay(&script, &config, FileStore::with_root(root))?,
        None => replay(&script, &config, InMemoryStore::new())?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let bytes = fs::read(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_slice::<EngineConfig>(&bytes).context("failed to parse config")?
        }
        None => EngineConfig::from_env().context("invalid TAKEOFF_* environment")?,
    };
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

fn replay<S>(script: &Script, config: &EngineConfig, store: S) -> Result<ReplayOutput>
where
    S: MeasurementStore + CalibrationStore,
{
    let container = Container::new(
        DevicePoint::new(script.container.x, script.container.y),
        ContainerSize::new(script.container.width, script.container.height),
    );
    let sheet = SheetKey::new(script.project.as_str(), script.sheet.as_str());
    let mut renderer = FixedPageRenderer::new(script.pages.clone());
    let mut view = TakeoffView::new(config, container, store);
    let mut measurements = Vec::new();
    let mut errors = Vec::new();

    for (index, step) in script.steps.iter().enumerate() {
        let result = match step {
            Step::OpenPage { page } => view
                .open_page_with(&mut renderer, sheet.clone(), *page)
                .map(|_| ViewEffect::Ignored),
            Step::SelectCondition { condition } => {
                view.select_condition(condition.clone());
                Ok(ViewEffect::Ignored)
            }
            Step::Calibrate { distance, unit } => {
                let preset = distance.zip(unit.clone()).map(|(d, u)| KnownDistance::new(d, u));
                view.begin_calibration(preset);
                Ok(ViewEffect::Ignored)
            }
            Step::SubmitDistance { distance, unit } => view
                .submit_calibration_distance(&KnownDistance::new(*distance, unit.as_str()))
                .map(ViewEffect::Calibrated),
            Step::Click { x, y } => {
                let position = DevicePoint::new(*x, *y);
                let effect = view.handle_event(InputEvent::PointerDown { position });
                view.handle_event(InputEvent::PointerUp { position }).and(effect)
            }
            Step::DoubleClick { x, y } => {
                view.handle_event(InputEvent::DoubleClick { position: DevicePoint::new(*x, *y) })
            }
            Step::Finish => view.handle_event(InputEvent::Key { key: Key::Enter, shift: false }),
            Step::Cancel => view.handle_event(InputEvent::Key { key: Key::Escape, shift: false }),
            Step::Undo => view.handle_event(InputEvent::Key { key: Key::Backspace, shift: false }),
            Step::Zoom { x, y, delta } => view.handle_event(InputEvent::Wheel {
                position: DevicePoint::new(*x, *y),
                delta_y: *delta,
            }),
            Step::Pan { dx, dy } => {
                view.viewport_mut().pan_by(*dx, *dy);
                Ok(ViewEffect::ViewportChanged)
            }
            Step::Rotate { quarter_turns } => {
                view.viewport_mut().rotate(*quarter_turns);
                Ok(ViewEffect::ViewportChanged)
            }
            Step::Fit => {
                view.viewport_mut().fit();
                Ok(ViewEffect::ViewportChanged)
            }
            Step::Input { event } => view.handle_event(*event),
        };

        match result {
            Ok(ViewEffect::MeasurementAdded(measurement)) => measurements.push(measurement),
            Ok(_) => {}
            Err(error @ (ViewError::Store(_) | ViewError::Render(_))) => {
                return Err(error).with_context(|| format!("step {index} failed"));
            }
            Err(error) => {
                log::warn!("step {index} rejected: {error}");
                errors.push(StepError { step: index, message: error.to_string() });
            }
        }
    }

    Ok(ReplayOutput {
        sheet: sheet.to_string(),
        calibration: view.calibration().cloned(),
        totals: summarize(&measurements),
        measurements,
        errors,
    })
}

fn open_store(root: Option<PathBuf>) -> Result<FileStore> {
    match root {
        Some(root) => Ok(FileStore::with_root(root)),
        None => FileStore::from_default_project().context("failed to locate the default store"),
    }
}

fn run_list(sheet: &SheetKey, store: Option<PathBuf>) -> Result<()> {
    let store = open_store(store)?;
    let measurements = store
        .list_measurements(&sheet.project_id, &sheet.sheet_id)
        .with_context(|| format!("failed to load measurements for {sheet}"))?;
    let calibration = store
        .get_calibration(&sheet.project_id, &sheet.sheet_id)
        .with_context(|| format!("failed to load calibration for {sheet}"))?;

    let payload = ListOutput {
        sheet: sheet.to_string(),
        calibration,
        totals: summarize(&measurements),
        measurements,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_export(sheet: &SheetKey, store: Option<PathBuf>, output: Option<&Path>) -> Result<()> {
    let store = open_store(store)?;
    let measurements = store
        .list_measurements(&sheet.project_id, &sheet.sheet_id)
        .with_context(|| format!("failed to load measurements for {sheet}"))?;
    let config = CsvExportConfig::default();

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            export_measurements_csv(file, &measurements, &config).context("failed to write CSV")?;
            println!("{}", path.display());
        }
        None => {
            export_measurements_csv(std::io::stdout().lock(), &measurements, &config)
                .context("failed to write CSV")?;
        }
    }

    Ok(())
}
