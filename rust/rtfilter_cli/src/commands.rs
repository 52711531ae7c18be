use indicatif::{
    ProgressIterator,
    ProgressStyle,
};
use rtfilter::classifier::ClassifierMethod;
use rtfilter::io::{
    expand_path,
    read_delimited,
    write_outputs,
};
use rtfilter::{
    ExclusionPolicy,
    RawTable,
    RtFilterConfig,
    Strictness,
    process,
};
use std::path::Path;
use tracing::info;

use crate::cli::{
    PolicyArg,
    RunArgs,
    WriteTemplateArgs,
};
use crate::error::CliError;

const TEMPLATE_NAME: &str = "rtfilter_config_template.json";

pub fn load_config(path: &Path) -> Result<RtFilterConfig, CliError> {
    let file = std::fs::File::open(path).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(path.display().to_string()),
    })?;
    let config: RtFilterConfig =
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| CliError::ParseError {
            msg: format!("{} ({})", e, path.display()),
        })?;
    Ok(config)
}

/// Values given on the command line take precedence over the config file.
pub fn apply_overrides(config: &mut RtFilterConfig, args: &RunArgs) {
    if !args.input.is_empty() {
        config.input = args.input.clone();
    }
    if let Some(dir) = args.output_dir.as_ref() {
        config.output.directory = Some(dir.clone());
    }
    if let Some(policy) = args.policy {
        config.policy = match policy {
            PolicyArg::Exclude => ExclusionPolicy::Exclude,
            PolicyArg::Remove => ExclusionPolicy::Remove,
        };
    }
    if args.lenient {
        config.strictness = Strictness::Lenient;
    }
}

fn read_all(config: &RtFilterConfig) -> Result<Vec<RawTable>, CliError> {
    if config.input.is_empty() {
        return Err(CliError::Config {
            source: "No input files provided, use --input or the `input` config key".to_string(),
        });
    }
    let delimiter = config.delimiter()?;
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let mut tables = Vec::with_capacity(config.input.len());
    for (i, path) in config.input.iter().enumerate().progress_with_style(style) {
        let path = expand_path(path)?;
        tables.push(read_delimited(&path, i, delimiter, config.low_memory)?);
    }
    Ok(tables)
}

pub fn main_run(args: RunArgs) -> Result<(), CliError> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args);
    config.validate()?;
    info!("Using configuration: {:#?}", config);

    let raw_tables = read_all(&config)?;
    let output = process(&raw_tables, &config)?;

    let report = &output.classifier;
    match report.method {
        ClassifierMethod::Svm => info!(
            "Decoy classifier: AUC {:.3}, {} of {} peptides flagged",
            report.auc.unwrap_or(f64::NAN),
            report.flagged_peptides.len(),
            report.num_qualifying
        ),
        ClassifierMethod::Heuristic => info!(
            "Decoy heuristic: {} of {} peptides flagged",
            report.flagged_peptides.len(),
            report.num_qualifying
        ),
        ClassifierMethod::Skipped => info!("Decoy classification skipped"),
    }

    let written = write_outputs(&raw_tables, &output, &config)?;
    println!("Wrote {} files:", written.len());
    for path in written.iter() {
        println!("- {}", path.display());
    }
    Ok(())
}

pub fn main_write_template(args: WriteTemplateArgs) -> Result<(), CliError> {
    let target_dir = args.output_path;
    std::fs::create_dir_all(&target_dir)?;

    let path = target_dir.join(TEMPLATE_NAME);
    let template = serde_json::to_string_pretty(&RtFilterConfig::template())?;
    std::fs::write(&path, template)?;
    println!("Wrote config template to: {}", path.display());
    Ok(())
}
