use layout3d_core::geom::BBox2;
use layout3d_core::layers::LayerStackTable;
use layout3d_core::model::Library;
use layout3d_core::report::{codes, ConversionReport, OutputFormat, Warning};
use layout3d_core::solid::Solid3D;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

pub mod brep;
pub mod description;
pub mod error;
pub mod extract;
pub mod extrude;
pub mod flatten;
pub mod merge;
pub mod step_writer;
pub mod stl;
pub mod structs;
pub mod tool;
pub mod window;

use brep::{BrepBackend, NativeStepWriter};
use error::ConvertError;
use extract::ExtractOptions;
use merge::{BooleanOp, MergeKernel, PrismStackKernel};
use structs::LayerExtractionResult;

/// What to do when one polygon cannot be extruded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrusionPolicy {
    #[default]
    Abort,
    SkipAndWarn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    /// Structure to flatten; all top structures when `None`.
    pub start: Option<String>,
    pub max_depth: Option<usize>,
    /// `[xmin, ymin, xmax, ymax]` in library units.
    pub window: Option<[f64; 4]>,
    pub clip: bool,
    pub layer_filter: Option<BTreeSet<u16>>,
    pub datatype_filter: Option<BTreeSet<u16>>,
    pub enabled_only: bool,
    pub merge: bool,
    pub merge_op: BooleanOp,
    pub format: OutputFormat,
    pub output_scale: f64,
    /// Length unit recorded in STEP output and solid descriptions.
    pub units: String,
    pub extrusion_policy: ExtrusionPolicy,
    pub check_orientation: bool,
    /// Convert layout XY from database units to user units before extrusion, so
    /// footprints share the layer stack's z unit.
    pub user_units: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            start: None,
            max_depth: None,
            window: None,
            clip: false,
            layer_filter: None,
            datatype_filter: None,
            enabled_only: true,
            merge: false,
            merge_op: BooleanOp::Union,
            format: OutputFormat::StlBinary,
            output_scale: 1.0,
            units: "um".to_string(),
            extrusion_policy: ExtrusionPolicy::Abort,
            check_orientation: true,
            user_units: true,
        }
    }
}

/// Solids ready for output plus the report accumulated so far.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub solids: Vec<Solid3D>,
    pub report: ConversionReport,
}

/// Runs the layout-to-solid pipeline: flatten, extract, window, extrude, merge, write.
pub struct Converter {
    options: ConversionOptions,
    brep: Box<dyn BrepBackend>,
    merge_kernel: Option<Box<dyn MergeKernel>>,
}

impl Converter {
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            options,
            brep: Box::new(NativeStepWriter::default()),
            merge_kernel: Some(Box::new(PrismStackKernel::default())),
        }
    }

    pub fn with_brep_backend(mut self, backend: impl BrepBackend + 'static) -> Self {
        self.brep = Box::new(backend);
        self
    }

    pub fn with_merge_kernel(mut self, kernel: impl MergeKernel + 'static) -> Self {
        self.merge_kernel = Some(Box::new(kernel));
        self
    }

    pub fn without_merge_kernel(mut self) -> Self {
        self.merge_kernel = None;
        self
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Produces the solids for `library` without writing anything.
    pub fn build(
        &self,
        library: &Library,
        table: &LayerStackTable,
    ) -> Result<BuildOutput, ConvertError> {
        let opts = &self.options;
        let mut warnings: Vec<Warning> = Vec::new();

        let flat = flatten::flatten(library, opts.start.as_deref(), opts.max_depth)?;

        let extracted = extract::extract(
            &flat.shapes,
            table,
            &ExtractOptions {
                layer_filter: opts.layer_filter.clone(),
                datatype_filter: opts.datatype_filter.clone(),
                enabled_only: opts.enabled_only,
            },
        );
        warnings.extend(extracted.warnings);
        let mut layers = extracted.layers;

        let mut window_stats = None;
        if let Some(extents) = opts.window {
            let windowed = window::filter_by_window(layers, &BBox2::from_extents(extents), opts.clip);
            warnings.extend(windowed.warnings);
            window_stats = Some(windowed.stats);
            layers = windowed.layers;
        }

        let ratio = library.user_units_per_db_unit;
        if opts.user_units && ratio != 1.0 {
            layers = layers
                .into_iter()
                .map(|l| {
                    let polygons = l.polygons.iter().map(|p| p.scaled(ratio)).collect();
                    LayerExtractionResult::from_polygons(l.rule, polygons)
                })
                .collect();
        }

        let mut solids = Vec::new();
        let mut extrusions_skipped = 0;
        for layer in &layers {
            let rule = &layer.rule;
            for polygon in &layer.polygons {
                match extrude::extrude(polygon, rule.z_bottom, rule.z_top, opts.check_orientation) {
                    Ok(solid) => solids.push(solid.with_rule(rule)),
                    Err(err) if opts.extrusion_policy == ExtrusionPolicy::SkipAndWarn => {
                        warn!(layer = %rule.name, "skipping polygon: {err}");
                        extrusions_skipped += 1;
                        warnings.push(Warning::new(
                            codes::EXTRUSION_SKIPPED,
                            format!("layer '{}': {err}", rule.name),
                        ));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
        let solids_built = solids.len();

        let mut merge_stats = None;
        if opts.merge {
            let merged = merge::merge(solids, opts.merge_op, self.merge_kernel.as_deref());
            warnings.extend(merged.warnings);
            merge_stats = Some(merged.stats);
            solids = merged.solids;
        }

        if opts.output_scale != 1.0 {
            solids = solids
                .into_iter()
                .map(|s| s.scaled(opts.output_scale))
                .collect();
        }

        info!(
            library = %library.name,
            layers = layers.len(),
            solids = solids.len(),
            "built solids"
        );

        Ok(BuildOutput {
            report: ConversionReport {
                library: library.name.clone(),
                flatten: flat.stats,
                extract: extracted.stats,
                window: window_stats,
                layers: layers.iter().map(|l| l.summary()).collect(),
                solids_built,
                extrusions_skipped,
                merge: merge_stats,
                requested_format: opts.format,
                written_format: opts.format,
                output: String::new(),
                triangles_written: 0,
                warnings,
            },
            solids,
        })
    }

    /// Builds the solids and writes them to `output` in the configured format.
    ///
    /// A failing B-rep backend degrades to an STL file next to `output`; the report
    /// records the path and format actually written.
    pub fn convert(
        &self,
        library: &Library,
        table: &LayerStackTable,
        output: &Path,
    ) -> Result<ConversionReport, ConvertError> {
        let BuildOutput {
            solids,
            mut report,
        } = self.build(library, table)?;
        let name = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| library.name.clone());

        match self.options.format {
            OutputFormat::StlBinary | OutputFormat::StlAscii => {
                let ascii = self.options.format == OutputFormat::StlAscii;
                let mesh = stl::write_stl(output, &solids, ascii, &name)?;
                report.output = output.display().to_string();
                report.triangles_written = mesh.triangles;
                report.warnings.extend(mesh.warnings);
            }
            OutputFormat::Step => {
                let outcome = brep::write_brep_with_fallback(
                    self.brep.as_ref(),
                    &solids,
                    &self.options.units,
                    output,
                )?;
                report.output = outcome.path.display().to_string();
                report.written_format = outcome.format;
                report.triangles_written = outcome.triangles;
                report.warnings.extend(outcome.warnings);
            }
        }

        info!(
            output = %report.output,
            format = ?report.written_format,
            warnings = report.warnings.len(),
            "conversion finished"
        );
        Ok(report)
    }
}

/// Converts with the default backends.
pub fn convert(
    library: &Library,
    table: &LayerStackTable,
    options: ConversionOptions,
    output: &Path,
) -> Result<ConversionReport, ConvertError> {
    Converter::new(options).convert(library, table, output)
}
