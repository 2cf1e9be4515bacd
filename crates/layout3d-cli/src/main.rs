use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use layout3d_algo::brep::{ExternalStepTool, NativeStepWriter};
use layout3d_algo::merge::{BooleanOp, ExternalMergeKernel};
use layout3d_algo::{ConversionOptions, Converter, ExtrusionPolicy};
use layout3d_core::layers::LayerStackConfig;
use layout3d_core::model::Library;
use layout3d_core::report::OutputFormat;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "layout3d")]
#[command(about = "Convert hierarchical mask layouts into layered 3D solids.")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Stl,
    StlAscii,
    Step,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Stl => OutputFormat::StlBinary,
            Format::StlAscii => OutputFormat::StlAscii,
            Format::Step => OutputFormat::Step,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MergeOp {
    Union,
    Intersection,
    Difference,
}

impl From<MergeOp> for BooleanOp {
    fn from(op: MergeOp) -> Self {
        match op {
            MergeOp::Union => BooleanOp::Union,
            MergeOp::Intersection => BooleanOp::Intersection,
            MergeOp::Difference => BooleanOp::Difference,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extrude a layout into STL or STEP.
    Convert {
        /// Layout library as JSON.
        library: PathBuf,
        /// Layer stack as JSON.
        #[arg(long)]
        layers: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Stl)]
        format: Format,
        /// Structure to flatten; defaults to every top structure.
        #[arg(long)]
        top: Option<String>,
        #[arg(long)]
        max_depth: Option<usize>,
        /// xmin,ymin,xmax,ymax
        #[arg(long, value_delimiter = ',', num_args = 4, allow_hyphen_values = true)]
        window: Option<Vec<f64>>,
        /// Cut straddling polygons at the window edge.
        #[arg(long, requires = "window")]
        clip: bool,
        #[arg(long = "layer", value_delimiter = ',')]
        layer_filter: Vec<u16>,
        #[arg(long = "datatype", value_delimiter = ',')]
        datatype_filter: Vec<u16>,
        /// Include layers marked disabled in the stack.
        #[arg(long)]
        all_layers: bool,
        #[arg(long)]
        merge: bool,
        #[arg(long, value_enum, default_value_t = MergeOp::Union)]
        merge_op: MergeOp,
        /// External merge program, called as `<tool> <in.json> <out.json> <op>`.
        #[arg(long, requires = "merge")]
        merge_tool: Option<PathBuf>,
        /// External STEP program, called as `<tool> <in.json> <out.step>`.
        #[arg(long)]
        step_tool: Option<PathBuf>,
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        /// Length unit written to STEP; defaults to the layer stack's units.
        #[arg(long)]
        units: Option<String>,
        /// Skip polygons that cannot be extruded instead of aborting.
        #[arg(long)]
        skip_bad_polygons: bool,
        #[arg(long)]
        no_orientation_check: bool,
        /// Keep layout XY in database units instead of user units.
        #[arg(long)]
        db_units: bool,
        /// Keep intermediate files passed to external tools.
        #[arg(long)]
        keep_temp: bool,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Summarize a layout library.
    Info { library: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Convert {
            library,
            layers,
            output,
            format,
            top,
            max_depth,
            window,
            clip,
            layer_filter,
            datatype_filter,
            all_layers,
            merge,
            merge_op,
            merge_tool,
            step_tool,
            scale,
            units,
            skip_bad_polygons,
            no_orientation_check,
            db_units,
            keep_temp,
            report,
        } => {
            let window = match window.as_deref() {
                None => None,
                Some(&[x0, y0, x1, y1]) => Some([x0, y0, x1, y1]),
                Some(other) => bail!("--window needs 4 values, got {}", other.len()),
            };
            let options = ConversionOptions {
                start: top,
                max_depth,
                window,
                clip,
                layer_filter: to_filter(layer_filter),
                datatype_filter: to_filter(datatype_filter),
                enabled_only: !all_layers,
                merge,
                merge_op: merge_op.into(),
                format: format.into(),
                output_scale: scale,
                units: String::new(),
                extrusion_policy: if skip_bad_polygons {
                    ExtrusionPolicy::SkipAndWarn
                } else {
                    ExtrusionPolicy::Abort
                },
                check_orientation: !no_orientation_check,
                user_units: !db_units,
            };
            let tools = Tools {
                merge_tool,
                step_tool,
                keep_temp,
            };
            convert(&library, &layers, &output, options, units, tools, report.as_deref())
        }
        Command::Info { library } => info_cmd(&library),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn to_filter(values: Vec<u16>) -> Option<BTreeSet<u16>> {
    if values.is_empty() {
        None
    } else {
        Some(values.into_iter().collect())
    }
}

struct Tools {
    merge_tool: Option<PathBuf>,
    step_tool: Option<PathBuf>,
    keep_temp: bool,
}

fn convert(
    library_path: &Path,
    layers_path: &Path,
    output: &Path,
    mut options: ConversionOptions,
    units: Option<String>,
    tools: Tools,
    report: Option<&Path>,
) -> Result<()> {
    let library = load_library(library_path)?;

    ensure_input_file(layers_path)?;
    let text = std::fs::read_to_string(layers_path)
        .with_context(|| format!("read layer stack: {layers_path:?}"))?;
    let config: LayerStackConfig = serde_json::from_str(&text)
        .with_context(|| format!("parse layer stack: {layers_path:?}"))?;
    options.units = units
        .or_else(|| config.units.clone())
        .unwrap_or_else(|| "um".to_string());
    if let Some(project) = &config.project {
        info!(%project, layers = config.layers.len(), "loaded layer stack");
    }
    let table = config.into_table().context("invalid layer stack")?;

    let units = options.units.clone();
    let mut converter = Converter::new(options);
    converter = match tools.step_tool {
        Some(program) => converter.with_brep_backend(ExternalStepTool {
            program,
            args: Vec::new(),
            keep_temp: tools.keep_temp,
        }),
        None => converter.with_brep_backend(NativeStepWriter {
            name: library.name.clone(),
        }),
    };
    if let Some(program) = tools.merge_tool {
        converter = converter.with_merge_kernel(ExternalMergeKernel {
            program,
            args: Vec::new(),
            units,
            keep_temp: tools.keep_temp,
        });
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let report_data = converter
        .convert(&library, &table, output)
        .with_context(|| format!("convert {library_path:?}"))?;

    write_json(&report_data, report)
}

#[derive(Debug, Serialize)]
struct LibraryInfo {
    name: String,
    user_units_per_db_unit: f64,
    structures: usize,
    top_structures: Vec<String>,
    elements: BTreeMap<&'static str, usize>,
    layers: Vec<(u16, u16)>,
}

fn info_cmd(path: &Path) -> Result<()> {
    let library = load_library(path)?;

    let mut elements = BTreeMap::new();
    let mut layers = BTreeSet::new();
    for structure in &library.structures {
        for element in &structure.elements {
            *elements.entry(element.kind_name()).or_insert(0) += 1;
            if let Some(key) = element.layer_key() {
                layers.insert((key.layer, key.datatype));
            }
        }
    }

    let summary = LibraryInfo {
        name: library.name.clone(),
        user_units_per_db_unit: library.user_units_per_db_unit,
        structures: library.structures.len(),
        top_structures: library
            .top_structures()
            .iter()
            .map(|s| s.name.clone())
            .collect(),
        elements,
        layers: layers.into_iter().collect(),
    };
    write_json(&summary, None)
}

fn load_library(path: &Path) -> Result<Library> {
    ensure_input_file(path)?;
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read library: {path:?}"))?;
    serde_json::from_str(&text).with_context(|| format!("parse library: {path:?}"))
}

fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize report")?;
    if let Some(path) = path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::write(path, &json).with_context(|| format!("write report: {path:?}"))?;
    } else {
        println!("{json}");
    }
    Ok(())
}

fn ensure_input_file(input: &Path) -> Result<()> {
    match std::fs::metadata(input) {
        Ok(meta) => {
            if meta.is_file() {
                Ok(())
            } else {
                bail!("input is not a file: {input:?}");
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            bail!("input not found: {input:?} (cwd: {cwd:?}).");
        }
        Err(err) => Err(err).with_context(|| format!("stat input: {input:?}")),
    }
}
