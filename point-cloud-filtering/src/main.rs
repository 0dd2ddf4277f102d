/// Point cloud filtering command line entry point
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use point_cloud_filtering::paths::check_overwrite;
use point_cloud_filtering::{
    DataSet, FileDataSet, InMemoryDataSet, PdalCli, PipelineEngine, Segmentation, SelectionMap,
    Settings, load_filter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filter, crop and inspect Lidar point clouds with PDAL.
#[derive(Parser, Debug)]
#[command(name = "point-cloud-filtering", version, about)]
struct Args {
    /// Settings file (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Replace existing output files
    #[arg(long, global = true)]
    overwrite: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print point count, extent, classes and provenance as JSON
    Info { input: PathBuf },

    /// Write the dataset boundary and map view as GeoJSON
    Boundary {
        input: PathBuf,
        /// Output file; printed to stdout when omitted
        output: Option<PathBuf>,
    },

    /// Keep only points inside the polygons of a segmentation
    Crop {
        input: PathBuf,
        segmentation: PathBuf,
        output: PathBuf,
        /// Write LAZ compressed output
        #[arg(long)]
        compress: bool,
    },

    /// Apply a saved filter or filter pipeline
    Filter {
        input: PathBuf,
        filter: PathBuf,
        output: PathBuf,
        #[arg(long)]
        compress: bool,
    },

    /// Write a GeoTIFF with all raster statistics
    Raster {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        resolution: Option<f64>,
    },

    /// Write the elevation surface as a Wavefront OBJ mesh
    Mesh {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        resolution: Option<f64>,
    },

    /// Render a hillshade PNG
    Hillshade {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        resolution: Option<f64>,
    },

    /// Write the points as an ASCII PLY file
    Points {
        input: PathBuf,
        output: PathBuf,
        /// Largest point count accepted
        #[arg(long)]
        threshold: Option<usize>,
    },

    /// Combine segmentations drawn over a dataset, dropping duplicate polygons
    Merge {
        input: PathBuf,
        output: PathBuf,
        #[arg(required = true)]
        segmentations: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    let engine = PdalCli::from_settings(&settings);
    log::debug!("Using PDAL at {}", engine.executable().display());

    run(args.command, args.overwrite, &settings, &engine)
}

fn run(
    command: Command,
    overwrite: bool,
    settings: &Settings,
    engine: &dyn PipelineEngine,
) -> Result<()> {
    match command {
        Command::Info { input } => {
            let dataset = load(engine, &input, settings)?;
            println!("{}", serde_json::to_string_pretty(&dataset.summary())?);
        }

        Command::Boundary { input, output } => {
            let dataset = open(&input, settings)?;
            let map = SelectionMap::new(engine, &dataset)
                .with_context(|| format!("Failed to compute boundary of {}", input.display()))?;
            let layers = serde_json::to_string_pretty(&map.to_geojson())?;
            match output {
                Some(output) => {
                    check_overwrite(&output, overwrite)?;
                    std::fs::write(&output, layers)
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                }
                None => println!("{layers}"),
            }
        }

        Command::Crop {
            input,
            segmentation,
            output,
            compress,
        } => {
            let dataset = load(engine, &input, settings)?;
            let segmentation = Segmentation::load(&segmentation).with_context(|| {
                format!("Failed to load segmentation {}", segmentation.display())
            })?;
            let cropped = dataset.restrict(engine, segmentation)?;
            cropped.save(engine, &output, compress, overwrite)?;
        }

        Command::Filter {
            input,
            filter,
            output,
            compress,
        } => {
            let filter = load_filter(&filter)
                .with_context(|| format!("Failed to load filter {}", filter.display()))?;
            let dataset = open(&input, settings)?;
            let filtered = filter.execute(engine, &dataset)?;
            filtered.save(engine, &output, compress, overwrite)?;
        }

        Command::Raster {
            input,
            output,
            resolution,
        } => {
            let dataset = load(engine, &input, settings)?;
            let written = dataset.save_mesh(
                engine,
                &output,
                resolution.unwrap_or(settings.mesh_resolution),
                overwrite,
            )?;
            println!("{}", written.display());
        }

        Command::Mesh {
            input,
            output,
            resolution,
        } => {
            check_overwrite(&output, overwrite)?;
            let dataset = load(engine, &input, settings)?;
            let mesh = dataset.show_mesh(engine, resolution.unwrap_or(settings.mesh_resolution))?;
            mesh.write_obj(&output)?;
        }

        Command::Hillshade {
            input,
            output,
            resolution,
        } => {
            check_overwrite(&output, overwrite)?;
            let dataset = load(engine, &input, settings)?;
            let image = dataset.show_hillshade(
                engine,
                resolution.unwrap_or(settings.mesh_resolution),
                &settings.hillshade,
            )?;
            image
                .save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            log::info!("Saved hillshade to {}", output.display());
        }

        Command::Points {
            input,
            output,
            threshold,
        } => {
            check_overwrite(&output, overwrite)?;
            let dataset = load(engine, &input, settings)?;
            let view = dataset.show_points(threshold.unwrap_or(settings.point_threshold))?;
            view.write_ply(&output)?;
        }

        Command::Merge {
            input,
            output,
            segmentations,
        } => {
            check_overwrite(&output, overwrite)?;
            let dataset = open(&input, settings)?;
            let mut map = SelectionMap::new(engine, &dataset)?;
            for path in &segmentations {
                let segmentation = Segmentation::load(path)
                    .with_context(|| format!("Failed to load segmentation {}", path.display()))?;
                map.load_polygon(&segmentation);
            }
            let merged = map.return_polygon();
            merged.save(&output)?;
            println!("{} polygons", merged.len());
        }
    }
    Ok(())
}

fn open(input: &Path, settings: &Settings) -> Result<DataSet> {
    let dataset = FileDataSet::open(input, settings)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    Ok(dataset.into())
}

fn load(
    engine: &dyn PipelineEngine,
    input: &Path,
    settings: &Settings,
) -> Result<Arc<InMemoryDataSet>> {
    let dataset = open(input, settings)?;
    InMemoryDataSet::convert(engine, &dataset)
        .with_context(|| format!("Failed to load points from {}", input.display()))
}
