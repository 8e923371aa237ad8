use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use image::ImageFormat;
use log::{error, info, warn};
use serde::Serialize;

use genesis::geometry::Heading;
use genesis::paint::FsRasterStore;
use genesis::seeds::WorldSeeds;
use genesis::store::JsonStore;
use genesis::subdivision::DelaunayVoronoi;
use genesis::world::layers;
use genesis::{Editor, Result, Settings, World};

#[derive(Parser, Debug)]
#[command(name = "genesis")]
#[command(about = "Generate worlds from a weighted planar graph: mountains, rivers, seas and rain")]
struct Args {
    /// Directory holding world records and raster layers
    #[arg(short, long, default_value = "genesis-data")]
    root: PathBuf,

    /// TOML settings file (defaults for every key left out)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// World name; an existing world of this name is reset
    #[arg(short, long, default_value = "world")]
    name: String,

    /// Width of the world in pixels
    #[arg(short = 'W', long, default_value = "1000")]
    width: u32,

    /// Height of the world in pixels
    #[arg(short = 'H', long, default_value = "1000")]
    height: u32,

    /// Master seed (random if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Target number of graph sites
    #[arg(long, default_value = "800")]
    points: usize,

    /// Scale of the smooth noise layer
    #[arg(long, default_value = "1.0")]
    noise_scale: f64,

    /// Number of mountain ranges
    #[arg(long, default_value = "6")]
    mountains: usize,

    /// Number of volcano chains
    #[arg(long, default_value = "2")]
    volcano_chains: usize,

    /// Volcanoes per chain at most
    #[arg(long, default_value = "5")]
    volcanoes: usize,

    /// Number of ravines
    #[arg(long, default_value = "4")]
    ravines: usize,

    /// Number of rivers
    #[arg(long, default_value = "4")]
    rivers: usize,

    /// Heights at or below this value that reach the border are sea
    #[arg(long, default_value = "100")]
    sea_level: u8,

    #[arg(long, default_value = "100")]
    equator_width: i32,

    #[arg(long, default_value = "60")]
    arctic_width: i32,

    /// Ocean currents to paint
    #[arg(long, default_value = "8")]
    currents: usize,

    /// Storm intensity; 0 leaves the rain layer as it is
    #[arg(long, default_value = "1.0")]
    storm: f64,

    /// Prevailing winds from north to south, e.g. "e,w,ne,sw,w,e"
    #[arg(long, value_delimiter = ',')]
    winds: Vec<Heading>,

    /// Move the world to its next epoch once generated
    #[arg(long)]
    next_epoch: bool,

    /// Directory for exported PNG layers
    #[arg(short, long, default_value = "out")]
    out: PathBuf,
}

/// Written next to the exported layers.
#[derive(Serialize)]
struct RunSummary<'a> {
    world: &'a World,
    generated_at: String,
    landmasses: usize,
    largest_landmass: u64,
    currents: usize,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let settings = match &args.settings {
        Some(path) => Settings::from_toml_file(path)?,
        None => Settings::default(),
    };
    let store = JsonStore::open(args.root.join("records"))?;
    let rasters = FsRasterStore::new(args.root.join("layers"))?;
    let mut editor = Editor::new(
        Box::new(store),
        Box::new(rasters),
        Box::new(DelaunayVoronoi),
        settings,
    );

    let seed = args.seed.unwrap_or_else(rand::random);
    let world = editor.create_world(&args.name, args.width, args.height, seed)?;
    let seeds = WorldSeeds::from_master(world.seed);
    info!("{}", seeds);

    editor.create_tectonics(&world, args.noise_scale, args.points, seeds.tectonics)?;

    // a feature that finds no route is skipped, the rest of the world still builds
    for i in 0..args.mountains {
        let tag = format!("mountains-{}", i);
        let seed = WorldSeeds::nth(seeds.mountains, i as u64);
        if let Err(e) = editor.add_mountains(&world, Some(&tag), None, 1.0, seed) {
            warn!("skipped mountain range {}: {}", i, e);
        }
    }
    for i in 0..args.volcano_chains {
        let seed = WorldSeeds::nth(seeds.volcanoes, i as u64);
        if let Err(e) = editor.add_volcanoes(&world, None, args.volcanoes, None, seed) {
            warn!("skipped volcano chain {}: {}", i, e);
        }
    }
    for i in 0..args.ravines {
        let seed = WorldSeeds::nth(seeds.ravines, i as u64);
        if let Err(e) = editor.add_ravine(&world, None, None, seed) {
            warn!("skipped ravine {}: {}", i, e);
        }
    }
    for i in 0..args.rivers {
        let seed = WorldSeeds::nth(seeds.rivers, i as u64);
        if let Err(e) = editor.add_river(&world, None, None, seed) {
            warn!("skipped river {}: {}", i, e);
        }
    }

    let sea = editor.sea_map(
        &world,
        args.sea_level,
        args.equator_width,
        args.arctic_width,
        args.currents,
        seeds.sea,
    )?;
    let winds = (!args.winds.is_empty()).then_some(args.winds.as_slice());
    let rain = editor.rain(&world, args.storm, winds, seeds.rain)?;
    let heights = editor.heightmap(&world, world.bounds())?;

    fs::create_dir_all(&args.out)?;
    let stem = format!("{}-{}", world.name, world.epoch);
    heights.save_with_format(args.out.join(format!("{}-heightmap.png", stem)), ImageFormat::Png)?;
    sea.image.save_with_format(args.out.join(format!("{}-sea.png", stem)), ImageFormat::Png)?;
    rain.save_with_format(args.out.join(format!("{}-rain.png", stem)), ImageFormat::Png)?;
    for name in [layers::MOUNTAINS, layers::RAVINES, layers::RIVERS, layers::LANDMASS] {
        export_layer(&editor, &world, name, &args.out, &stem)?;
    }

    let summary = RunSummary {
        world: &world,
        generated_at: chrono::Utc::now().to_rfc3339(),
        landmasses: sea.landmasses.len(),
        largest_landmass: sea.landmasses.iter().map(|l| l.size).max().unwrap_or(0),
        currents: sea.currents.len(),
    };
    fs::write(
        args.out.join(format!("{}-summary.json", stem)),
        serde_json::to_vec_pretty(&summary)?,
    )?;
    info!(
        "world {}: {} landmasses, {} currents, layers in {}",
        world.name,
        summary.landmasses,
        summary.currents,
        args.out.display()
    );

    if args.next_epoch {
        let next = editor.next_epoch(&world)?;
        info!("world {} is now at epoch {}", next.name, next.epoch);
    }
    Ok(())
}

fn export_layer(editor: &Editor, world: &World, name: &str, out: &Path, stem: &str) -> Result<()> {
    if let Some(image) = editor.rasters().load(&world.layer(name))? {
        image.save_with_format(out.join(format!("{}-{}.png", stem, name)), ImageFormat::Png)?;
    }
    Ok(())
}
