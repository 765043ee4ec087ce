//! audio-bridge: CLI tool for inspecting the audio node bridge
//!
//! - `describe`: Show the introspection metadata applied to host-visible types
//! - `schemas`: Dump the per-node construction schemas as JSON
//! - `construct`: Dry-run a node construction against the reference engine
//! - `render`: Render quanta from an `array-source` worklet node
//! - `config-schema`: Print the JSON schema of the configuration file

use anyhow::{Context as _, Result, anyhow, bail};
use audio_bridge_core::config::CONFIG_ENV_VAR;
use audio_bridge_core::schema::{NodeSchemaSummary, node_schemas};
use audio_bridge_core::{
    AudioContext, BridgeConfig, BridgeError, HostValue, MemberKind, NativeEngine, NodeKind,
    ProcessorRegistry, ReferenceEngine, TypeDescriptor, TypedArray, registry,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// CLI tool for inspecting the audio node bridge
#[derive(Parser)]
#[command(name = "audio-bridge")]
#[command(about = "Inspect node metadata and dry-run constructions against the reference engine")]
#[command(version)]
struct Cli {
    /// Path to a JSON configuration file (default: auto-detect)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show type metadata (all types when no name is given)
    Describe {
        /// Type name, e.g. "BiquadFilterNode"
        name: Option<String>,
    },

    /// Dump node construction schemas as JSON
    Schemas,

    /// Construct a node from JSON arguments and print its native state
    Construct {
        /// Node type, e.g. "GainNode"
        kind: String,

        /// Arguments after the context, each a JSON value
        args: Vec<String>,

        /// Construct against an OfflineAudioContext
        #[arg(long)]
        offline: bool,
    },

    /// Render quanta of the array-source processor
    Render {
        /// Comma-separated samples written to the shared array
        #[arg(short, long, default_value = "")]
        samples: String,

        /// Output channel count
        #[arg(long, default_value = "2")]
        channels: u32,

        /// Number of quanta to render
        #[arg(short = 'n', long, default_value = "1")]
        quanta: usize,

        /// Samples shown per channel
        #[arg(long, default_value = "8")]
        show: usize,
    },

    /// Print the JSON schema of the configuration file
    ConfigSchema,
}

fn default_config_path() -> PathBuf {
    let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config_dir.join("audio-bridge").join("config.json")
}

fn load_config(explicit: Option<PathBuf>) -> Result<BridgeConfig> {
    if let Some(path) = explicit {
        return BridgeConfig::load(&path)
            .with_context(|| format!("loading {}", path.display()));
    }
    if std::env::var_os(CONFIG_ENV_VAR).is_some() {
        return BridgeConfig::from_env().with_context(|| format!("loading ${}", CONFIG_ENV_VAR));
    }

    let path = default_config_path();
    if path.exists() {
        tracing::debug!(path = %path.display(), "using default config file");
        return BridgeConfig::load(&path)
            .with_context(|| format!("loading {}", path.display()));
    }
    Ok(BridgeConfig::default())
}

fn host_error(err: BridgeError) -> anyhow::Error {
    anyhow!("{}: {}", err.host_error_name(), err)
}

fn print_descriptor(descriptor: &TypeDescriptor) {
    let parent = descriptor
        .parent
        .map(|p| format!(" extends {}", p))
        .unwrap_or_default();
    println!(
        "{}{} length={}",
        descriptor.name.cyan().bold(),
        parent.dimmed(),
        descriptor.length
    );
    for member in &descriptor.members {
        let kind = match member.kind {
            MemberKind::Method => "method".yellow(),
            MemberKind::Attribute => "attribute".green(),
        };
        let enumerable = if member.enumerable {
            "enumerable".normal()
        } else {
            "hidden".dimmed()
        };
        println!(
            "  {:<32} {:>10} arity={} {}",
            member.name, kind, member.arity, enumerable
        );
    }
}

fn cmd_describe(name: Option<String>, format: OutputFormat) -> Result<()> {
    let descriptors: Vec<&TypeDescriptor> = match name {
        Some(name) => vec![
            registry()
                .get(&name)
                .ok_or_else(|| anyhow!("unknown type '{}'", name))?,
        ],
        None => registry().descriptors(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&descriptors)?),
        OutputFormat::Table => {
            for descriptor in descriptors {
                print_descriptor(descriptor);
                let chain = registry().ancestry(descriptor.name);
                if chain.len() > 1 {
                    println!("  {} {}", "chain:".dimmed(), chain.join(" -> "));
                }
            }
        }
    }
    Ok(())
}

fn cmd_schemas() -> Result<()> {
    let summaries: Vec<NodeSchemaSummary> = node_schemas()
        .into_iter()
        .map(NodeSchemaSummary::from)
        .collect();
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

fn parse_args(raw: &[String]) -> Result<Vec<HostValue>> {
    raw.iter()
        .enumerate()
        .map(|(i, text)| {
            let value: serde_json::Value = serde_json::from_str(text)
                .with_context(|| format!("argument {} is not valid JSON", i + 2))?;
            Ok(HostValue::from(value))
        })
        .collect()
}

fn cmd_construct(
    config: BridgeConfig,
    kind: &str,
    raw_args: &[String],
    offline: bool,
    format: OutputFormat,
) -> Result<()> {
    let kind = NodeKind::from_name(kind).ok_or_else(|| {
        let known: Vec<_> = NodeKind::ALL.iter().map(|k| k.name()).collect();
        anyhow!("unknown node type '{}' (known: {})", kind, known.join(", "))
    })?;
    let args = parse_args(raw_args)?;

    let reference = Arc::new(ReferenceEngine::new(
        config,
        ProcessorRegistry::with_builtin(),
    ));
    let engine: Arc<dyn NativeEngine> = reference.clone();
    let context = if offline {
        let sample_rate = reference.config().default_sample_rate;
        AudioContext::new_offline(
            engine,
            &[HostValue::from(1u32), HostValue::from(128u32), HostValue::from(sample_rate)],
        )
    } else {
        AudioContext::new(engine, &[])
    }
    .map_err(host_error)?;

    let node = context.create_node(kind, &args).map_err(host_error)?;
    let state = reference
        .describe_node(node.handle())
        .ok_or_else(|| anyhow!("reference engine lost node {:?}", node.handle()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Table => {
            println!(
                "{} on {} (inputs={}, outputs={})",
                node.to_string_tag().cyan().bold(),
                context.display_name(),
                node.number_of_inputs(),
                node.number_of_outputs()
            );
            println!(
                "  channelCount={} channelCountMode={} channelInterpretation={}",
                node.channel_count(),
                node.channel_count_mode(),
                node.channel_interpretation()
            );
            for param in node.params() {
                println!(
                    "  {:<12} value={:<10} default={:<10} range=[{}, {}] {}",
                    param.name().green(),
                    param.value().map_err(host_error)?,
                    param.default_value(),
                    param.min_value(),
                    param.max_value(),
                    param.automation_rate().dimmed()
                );
            }
            println!("  {} {}", "native:".dimmed(), state);
        }
    }
    Ok(())
}

fn parse_samples(text: &str) -> Result<Vec<f32>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .with_context(|| format!("'{}' is not a sample value", s))
        })
        .collect()
}

fn cmd_render(
    config: BridgeConfig,
    samples: &str,
    channels: u32,
    quanta: usize,
    show: usize,
    format: OutputFormat,
) -> Result<()> {
    if quanta == 0 {
        bail!("--quanta must be at least 1");
    }
    let shared = TypedArray::new(parse_samples(samples)?);

    let engine: Arc<dyn NativeEngine> = Arc::new(ReferenceEngine::new(
        config,
        ProcessorRegistry::with_builtin(),
    ));
    let context = AudioContext::new(engine, &[]).map_err(host_error)?;
    let options = HostValue::object([
        ("channelCount", HostValue::from(channels)),
        ("channelCountMode", HostValue::from("explicit")),
        (
            "processorOptions",
            HostValue::object([("sharedFloats", HostValue::Float32Array(shared))]),
        ),
    ]);
    let node = context
        .create_node(
            NodeKind::AudioWorklet,
            &[HostValue::from("array-source"), options],
        )
        .map_err(host_error)?;

    for index in 0..quanta {
        let quantum = node.render_quantum().map_err(host_error)?;
        match format {
            OutputFormat::Json => {
                let obj = serde_json::json!({
                    "quantum": index,
                    "keepAlive": quantum.keep_alive,
                    "outputs": quantum.outputs,
                });
                println!("{}", obj);
            }
            OutputFormat::Table => {
                println!(
                    "{} {} keepAlive={}",
                    "quantum".dimmed(),
                    index.to_string().cyan(),
                    quantum.keep_alive
                );
                for (output, port) in quantum.outputs.iter().enumerate() {
                    for (channel, data) in port.iter().enumerate() {
                        let head: Vec<String> = data
                            .iter()
                            .take(show)
                            .map(|s| format!("{:>8.4}", s))
                            .collect();
                        println!("  out{} ch{} {}", output, channel, head.join(" ").yellow());
                    }
                }
            }
        }
    }
    Ok(())
}

fn cmd_config_schema() -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&BridgeConfig::json_schema())?
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Describe { name } => cmd_describe(name, cli.format),
        Commands::Schemas => cmd_schemas(),
        Commands::ConfigSchema => cmd_config_schema(),
        Commands::Construct {
            kind,
            args,
            offline,
        } => cmd_construct(load_config(cli.config)?, &kind, &args, offline, cli.format),
        Commands::Render {
            samples,
            channels,
            quanta,
            show,
        } => cmd_render(
            load_config(cli.config)?,
            &samples,
            channels,
            quanta,
            show,
            cli.format,
        ),
    }
}
