use genesis::geometry::{Heading, Point, Rect};
use genesis::paint::FsRasterStore;
use genesis::store::JsonStore;
use genesis::subdivision::DelaunayVoronoi;
use genesis::world::layers;
use genesis::{Editor, GenesisError, PathSpec, Settings};

fn settings() -> Settings {
    let mut settings = Settings {
        min_world_size: 100,
        ..Settings::default()
    };
    settings.rain.workers = 4;
    settings.ocean.current_grid_size = 50;
    settings
}

fn editor(root: &std::path::Path) -> Editor {
    Editor::new(
        Box::new(JsonStore::open(root.join("records")).unwrap()),
        Box::new(FsRasterStore::new(root.join("layers")).unwrap()),
        Box::new(DelaunayVoronoi),
        settings(),
    )
}

#[test]
fn test_full_pipeline_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut ed = editor(dir.path());

    let world = ed.create_world("pipeline", 240, 240, 42).unwrap();
    ed.create_tectonics(&world, 1.0, 120, 1).unwrap();

    let range = PathSpec::between(Point::new(40, 120), Point::new(200, 120), 1000.0);
    let placed = ed.add_mountains(&world, Some("spine"), Some(&range), 1.0, 2).unwrap();
    assert!(placed.path.len() >= 2);
    assert!(!placed.points.is_empty());

    let chain = PathSpec::between(Point::new(120, 40), Point::new(120, 200), 1000.0);
    ed.add_volcanoes(&world, None, 3, Some(&chain), 3).unwrap();
    let cut = PathSpec::between(Point::new(40, 60), Point::new(200, 180), 1000.0);
    ed.add_ravine(&world, Some("scar"), Some(&cut), 4).unwrap();
    ed.add_river(&world, None, Some(&cut), 5).unwrap();
    ed.smooth_terrain(&world, 2).unwrap();

    let sea = ed.sea_map(&world, 90, 60, 30, 3, 6).unwrap();
    let heights = ed.heightmap(&world, world.bounds()).unwrap();
    let land = heights.pixels().filter(|p| p[0] > 90).count() as u64;
    let labelled: u64 = sea.landmasses.iter().map(|l| l.size).sum();
    // every pixel above sea level is land, and so are enclosed low basins
    assert!(labelled >= land);
    assert_eq!(ed.landmasses(&world).unwrap().len(), sea.landmasses.len());

    let before = ed.rasters().load(&world.layer(layers::RAIN)).unwrap();
    let unchanged = ed.rain(&world, 0.0, None, 7).unwrap();
    assert!(unchanged.pixels().all(|p| p[2] == 0));
    assert_eq!(before, ed.rasters().load(&world.layer(layers::RAIN)).unwrap());
    ed.rain(&world, 1.0, Some(&[Heading::East, Heading::West]), 7).unwrap();

    let next = ed.next_epoch(&world).unwrap();
    assert_eq!(next.epoch, 1);
    for name in layers::EPOCH_CARRY {
        assert!(ed.rasters().exists(&next.layer(name)).unwrap());
    }
    assert!(!ed.rasters().exists(&next.layer(layers::LANDMASS)).unwrap());

    // a second session over the same directory sees the saved graph and world
    drop(ed);
    let mut again = editor(dir.path());
    let reloaded = again.world("pipeline").unwrap();
    assert_eq!(reloaded, next);
    assert_eq!(again.tagged(&reloaded, "spine").unwrap(), placed.path);
    assert!(again.tagged(&reloaded, "scar").is_ok());
}

#[test]
fn test_unreachable_range_draws_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut ed = editor(dir.path());
    let world = ed.create_world("short", 200, 200, 8).unwrap();
    ed.create_tectonics(&world, 1.0, 80, 8).unwrap();

    // too short a limit for even one segment
    let spec = PathSpec::between(Point::new(20, 20), Point::new(180, 180), 0.5);
    let err = ed.add_mountains(&world, None, Some(&spec), 1.0, 1).unwrap_err();
    assert!(matches!(err, GenesisError::NoPath(_)));
    assert!(!ed.rasters().exists(&world.layer(layers::MOUNTAINS)).unwrap());

    let flat = ed.heightmap(&world, Rect::new(0, 0, 10, 10)).unwrap();
    assert_eq!(flat.dimensions(), (10, 10));
}
