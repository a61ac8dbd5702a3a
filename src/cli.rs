use crate::bridge::{Command, CommandBridge, Notification};
use crate::config::load_config;
use crate::identity::IdentityStrategy;
use crate::ir::ChartVariant;
use crate::layout_dump::{write_json, write_layout_dump};
use crate::render::{render_svg, write_output_png, write_output_svg};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use serde_json::Value;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "orgc", version, about = "Org chart layout with incremental disclosure")]
pub struct Args {
    /// Input data file (.json / .json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for text formats.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Chart variant; defaults to the configured one
    #[arg(short = 't', long = "chartType", value_enum)]
    pub chart_type: Option<ChartArg>,

    /// How item identities are derived
    #[arg(long = "strategy", value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Disclose every item
    #[arg(long = "expand-all")]
    pub expand_all: bool,

    /// Expand one item by identity or code (repeatable)
    #[arg(short = 'x', long = "expand")]
    pub expand: Vec<String>,

    /// Reveal the path down to one item
    #[arg(long = "focus")]
    pub focus: Option<String>,

    /// Host messages to replay, one JSON object per line
    #[arg(short = 's', long = "script")]
    pub script: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Layout dump
    Json,
    /// Node and edge records for a JS graph library
    Drawing,
    Stats,
    Svg,
    Png,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ChartArg {
    Org,
    Company,
}

impl From<ChartArg> for ChartVariant {
    fn from(arg: ChartArg) -> Self {
        match arg {
            ChartArg::Org => ChartVariant::OrgChart,
            ChartArg::Company => ChartVariant::CompanyChart,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum StrategyArg {
    Path,
    Semantic,
}

impl From<StrategyArg> for IdentityStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Path => IdentityStrategy::Path,
            StrategyArg::Semantic => IdentityStrategy::Semantic,
        }
    }
}

pub fn run() -> Result<()> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .try_init();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    config.render.width = args.width;
    config.render.height = args.height;
    if let Some(strategy) = args.strategy {
        config.bridge.identity_strategy = strategy.into();
    }

    let data = parse_data(&read_input(args.input.as_deref())?)?;
    let mut bridge = CommandBridge::new(config);
    bridge.dispatch(Command::SetData {
        data,
        variant: args.chart_type.map(Into::into),
    })?;

    if args.expand_all {
        bridge.dispatch(Command::ExpandAll)?;
    }
    for id in &args.expand {
        bridge.dispatch(Command::Expand(id.clone()))?;
    }
    if let Some(target) = &args.focus {
        for notification in bridge.dispatch(Command::Focus(target.clone()))? {
            if matches!(notification, Notification::Focused { found: false, .. }) {
                warn!("focus target `{target}` not found");
            }
        }
    }
    if let Some(script) = &args.script {
        let contents = std::fs::read_to_string(script)
            .with_context(|| format!("reading script {}", script.display()))?;
        replay_script(&mut bridge, &contents, &script.display().to_string())?;
    }

    let chart = bridge.chart();
    let output = args.output.as_deref();
    match args.output_format {
        OutputFormat::Json => write_layout_dump(output, &chart.layout(), chart.expansion())?,
        OutputFormat::Drawing => write_json(&chart.drawing(), output)?,
        OutputFormat::Stats => write_json(&chart.stats(), output)?,
        OutputFormat::Svg => {
            let svg = render_svg(&chart.layout(), &chart.config().theme, &chart.config().render);
            write_output_svg(&svg, output)?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&chart.layout(), &chart.config().theme, &chart.config().render);
            write_output_png(&svg, &output, &chart.config().render)?;
        }
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading input {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

/// Strict JSON first; hand-edited data files often carry comments or
/// trailing commas, so JSON5 is accepted as well.
fn parse_data(input: &str) -> Result<Value> {
    match serde_json::from_str(input) {
        Ok(value) => Ok(value),
        Err(strict) => json5::from_str::<Value>(input)
            .map_err(|_| anyhow::Error::new(strict).context("input is neither JSON nor JSON5")),
    }
}

/// Dispatches one host message per non-blank line; `#` starts a comment
/// line.
fn replay_script(bridge: &mut CommandBridge, contents: &str, label: &str) -> Result<usize> {
    let mut dispatched = 0;
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let at = || format!("{label}:{}", idx + 1);
        let message = parse_data(line).with_context(at)?;
        let Some(command) = Command::from_message(&message).with_context(at)? else {
            warn!("{}: ignoring unknown action", at());
            continue;
        };
        for notification in bridge.dispatch(command).with_context(at)? {
            info!("{}: {}", at(), serde_json::to_string(&notification)?);
        }
        dispatched += 1;
    }
    Ok(dispatched)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
