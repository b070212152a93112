use crate::infra::build_engine;
use clap::Args;
use loan_engine::config::AppConfig;
use loan_engine::decision::{EnsembleVerdict, ModelDescription, ModelRegistry, PredictRequest};
use loan_engine::error::AppError;
use loan_engine::telemetry;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct PredictArgs {
    /// Application JSON file, or `-` to read from stdin
    #[arg(long, default_value = "-")]
    pub(crate) input: PathBuf,
    /// Override the request's service type (`loan` or `classification`)
    #[arg(long)]
    pub(crate) service_type: Option<String>,
    /// Model to invoke; repeat to select several. Overrides `selectedModels`.
    #[arg(long = "model")]
    pub(crate) models: Vec<String>,
    /// Print compact JSON instead of pretty-printed output
    #[arg(long)]
    pub(crate) compact: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ModelsArgs {
    /// Emit the listing as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_predict(args: PredictArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init_with_writer(&config.telemetry, io::stderr)?;
    let request = if args.input.as_os_str() == "-" {
        read_request(io::stdin().lock(), &args)?
    } else {
        read_request(BufReader::new(File::open(&args.input)?), &args)?
    };

    let engine = build_engine(&config.engine);
    let verdict = engine.evaluate(&request).await?;

    println!("{}", render(&verdict, args.compact)?);
    Ok(())
}

pub(crate) fn render(verdict: &EnsembleVerdict, compact: bool) -> Result<String, AppError> {
    let rendered = if compact {
        serde_json::to_string(verdict)
    } else {
        serde_json::to_string_pretty(verdict)
    };
    rendered.map_err(AppError::Output)
}

pub(crate) fn run_models(args: ModelsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init_with_writer(&config.telemetry, io::stderr)?;
    let registry = match &config.engine.models_dir {
        Some(dir) => ModelRegistry::from_dir(dir)?,
        None => ModelRegistry::builtin(),
    };
    let models: Vec<ModelDescription> = registry.handles().map(|handle| handle.describe()).collect();

    if args.json {
        let rendered = serde_json::to_string_pretty(&models).map_err(AppError::Output)?;
        println!("{rendered}");
        return Ok(());
    }

    println!("{:<15} {:<15} {:>9}  features", "model", "service", "accuracy");
    for model in &models {
        let features: Vec<String> = model
            .required_features
            .iter()
            .map(ToString::to_string)
            .collect();
        println!(
            "{:<15} {:<15} {:>8.1}%  {}",
            model.id.to_string(),
            model.service_type.to_string(),
            model.accuracy,
            features.join(", ")
        );
    }
    Ok(())
}

/// Parse a request body and apply the command-line overrides.
pub(crate) fn read_request(reader: impl Read, args: &PredictArgs) -> Result<PredictRequest, AppError> {
    let mut request: PredictRequest = serde_json::from_reader(reader)?;
    if let Some(service_type) = &args.service_type {
        request.service_type = Some(service_type.clone());
    }
    if !args.models.is_empty() {
        request.selected_models = Some(args.models.clone());
    }
    Ok(request)
}
