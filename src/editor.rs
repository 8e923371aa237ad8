//! The editing session that ties records, layers and graphs together.
//!
//! An [`Editor`] owns its backends and two caches: the graph of the world it
//! last worked on, and heightmaps composited since the last terrain change.
//! Callers must not run two terrain-changing calls on the same world at once.

use image::{GrayImage, RgbaImage};
use log::{info, warn};

use crate::climate::{Climate, SeaMap};
use crate::epoch;
use crate::error::{GenesisError, Result};
use crate::geometry::{Heading, Point, Rect};
use crate::heightmap::HeightmapCache;
use crate::paint::{Canvas, RasterStore};
use crate::planar::WorldGraph;
use crate::settings::Settings;
use crate::store::{in_transaction, validate_id, validate_name, Store};
use crate::subdivision::SubdivisionBuilder;
use crate::terrain::{self, Placement, Terrain};
use crate::world::{layers, Landmass, PathSpec, World};

pub struct Editor {
    store: Box<dyn Store>,
    rasters: Box<dyn RasterStore>,
    builder: Box<dyn SubdivisionBuilder>,
    settings: Settings,
    graph: Option<WorldGraph>,
    heightmaps: HeightmapCache,
}

impl Editor {
    pub fn new(
        store: Box<dyn Store>,
        rasters: Box<dyn RasterStore>,
        builder: Box<dyn SubdivisionBuilder>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            rasters,
            builder,
            settings,
            graph: None,
            heightmaps: HeightmapCache::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn rasters(&self) -> &dyn RasterStore {
        self.rasters.as_ref()
    }

    /// Create (or reset) the world called `name` at epoch 0.
    ///
    /// A zero seed is replaced by a random one and sizes below the
    /// configured minimum are raised to it.
    pub fn create_world(&mut self, name: &str, width: u32, height: u32, seed: u64) -> Result<World> {
        validate_name(name)?;
        let min = self.settings.min_world_size;
        let world = World {
            id: World::id_for_name(name),
            name: name.to_string(),
            epoch: 0,
            seed: if seed == 0 { rand::random() } else { seed },
            width: width.max(min),
            height: height.max(min),
        };
        in_transaction(self.store.as_ref(), |tx| tx.set_worlds(std::slice::from_ref(&world)))?;

        self.forget(&world.id);
        info!(
            "created world {} ({}x{}, seed {})",
            world.name, world.width, world.height, world.seed
        );
        Ok(world)
    }

    /// Look a world up by id, or by name when `key` is not an id.
    pub fn world(&self, key: &str) -> Result<World> {
        let id = match validate_id(key) {
            Ok(()) => key.to_string(),
            Err(_) => World::id_for_name(key),
        };
        self.store
            .worlds(std::slice::from_ref(&id))?
            .into_iter()
            .next()
            .ok_or_else(|| GenesisError::NotFound(format!("world '{}'", key)))
    }

    pub fn list_worlds(&self) -> Result<Vec<World>> {
        self.store.list_worlds()
    }

    /// Landmasses found by the last sea map of the world's current epoch.
    pub fn landmasses(&self, world: &World) -> Result<Vec<Landmass>> {
        self.store.landmasses(&world.id, world.epoch)
    }

    /// Build a fresh world graph and noise layers, replacing any earlier
    /// graph of the world.
    pub fn create_tectonics(
        &mut self,
        world: &World,
        noise_scale: f64,
        points: usize,
        seed: u64,
    ) -> Result<()> {
        self.forget(&world.id);
        let terrain = Terrain::new(world, &self.settings, self.rasters.as_ref());
        let graph = terrain::create_tectonics(&terrain, self.builder.as_ref(), noise_scale, points, seed)?;
        self.save_graph(&graph)?;
        self.graph = Some(graph);
        Ok(())
    }

    pub fn add_mountains(
        &mut self,
        world: &World,
        tag: Option<&str>,
        spec: Option<&PathSpec>,
        scale: f64,
        seed: u64,
    ) -> Result<Placement> {
        self.with_graph(world, &[layers::MOUNTAINS], |terrain, graph| {
            terrain.add_mountains(graph, tag, spec, scale, seed)
        })
    }

    pub fn add_volcanoes(
        &mut self,
        world: &World,
        tag: Option<&str>,
        count: usize,
        spec: Option<&PathSpec>,
        seed: u64,
    ) -> Result<Placement> {
        self.with_graph(world, &[layers::MOUNTAINS], |terrain, graph| {
            terrain.add_volcanoes(graph, tag, count, spec, seed)
        })
    }

    pub fn add_ravine(
        &mut self,
        world: &World,
        tag: Option<&str>,
        spec: Option<&PathSpec>,
        seed: u64,
    ) -> Result<Vec<Point>> {
        self.with_graph(world, &[layers::RAVINES], |terrain, graph| {
            terrain.add_ravine(graph, tag, spec, seed)
        })
    }

    pub fn add_river(
        &mut self,
        world: &World,
        tag: Option<&str>,
        spec: Option<&PathSpec>,
        seed: u64,
    ) -> Result<Vec<Point>> {
        self.with_graph(world, &[layers::RIVERS], |terrain, graph| {
            terrain.add_river(graph, tag, spec, seed)
        })
    }

    /// Points tagged `name` in the world's graph.
    pub fn tagged(&mut self, world: &World, name: &str) -> Result<Vec<Point>> {
        let graph = self.load_graph(world)?;
        let points = graph.paths.from_tag(name).map(|p| p.to_vec());
        self.graph = Some(graph);
        points
    }

    pub fn smooth_terrain(&mut self, world: &World, radius: u32) -> Result<()> {
        self.heightmaps.invalidate(&world.id);
        Terrain::new(world, &self.settings, self.rasters.as_ref()).smooth(radius)
    }

    pub fn flatten_outside(&mut self, world: &World, area: Rect) -> Result<()> {
        self.heightmaps.invalidate(&world.id);
        Terrain::new(world, &self.settings, self.rasters.as_ref()).flatten_outside(area)
    }

    /// Heightmap of `area`, reused until the world's terrain next changes.
    pub fn heightmap(&mut self, world: &World, area: Rect) -> Result<GrayImage> {
        self.heightmaps
            .get_or_composite(world, self.rasters.as_ref(), &self.settings.heightmap, area)
    }

    /// Classify sea and land, route `currents` ocean currents, paint sea
    /// temperatures and replace the epoch's landmass records.
    pub fn sea_map(
        &mut self,
        world: &World,
        sea_level: u8,
        equator_width: i32,
        arctic_width: i32,
        currents: usize,
        seed: u64,
    ) -> Result<SeaMap> {
        let heights = self.heightmap(world, world.bounds())?;
        let vertices = if currents > 0 {
            let graph = self.load_graph(world)?;
            let vertices = graph.paths.vertices().to_vec();
            self.graph = Some(graph);
            vertices
        } else {
            Vec::new()
        };

        let climate = Climate::new(world, &self.settings, self.rasters.as_ref());
        let map = climate.sea_map(
            &heights,
            &vertices,
            sea_level,
            equator_width,
            arctic_width,
            currents,
            seed,
        )?;

        in_transaction(self.store.as_ref(), |tx| {
            tx.delete_landmasses(&world.id, world.epoch)?;
            tx.set_landmasses(&map.landmasses)
        })?;
        Ok(map)
    }

    /// Add rainfall to the world's rain layer; see [`Climate::rain`].
    pub fn rain(
        &mut self,
        world: &World,
        mult: f64,
        winds: Option<&[Heading]>,
        seed: u64,
    ) -> Result<RgbaImage> {
        Climate::new(world, &self.settings, self.rasters.as_ref()).rain(mult, winds, seed)
    }

    pub fn next_epoch(&mut self, world: &World) -> Result<World> {
        let next = epoch::next_epoch(world, self.store.as_ref(), self.rasters.as_ref())?;
        self.heightmaps.invalidate(&world.id);
        Ok(next)
    }

    /// Run a graph-changing terrain operation that draws on `drawn`.
    ///
    /// The operation saves its layers before the graph is saved. If saving
    /// the graph then fails, those layers are put back as they were, so
    /// layers and weights never disagree. On any failure the cached graph
    /// is dropped and the next call reloads the last saved one.
    fn with_graph<T, F>(&mut self, world: &World, drawn: &[&str], op: F) -> Result<T>
    where
        F: FnOnce(&Terrain, &mut WorldGraph) -> Result<T>,
    {
        let mut graph = self.load_graph(world)?;
        self.heightmaps.invalidate(&world.id);

        let snapshots = drawn
            .iter()
            .map(|name| {
                let key = world.layer(name);
                self.rasters.load(&key).map(|image| (key, image))
            })
            .collect::<Result<Vec<_>>>()?;

        let terrain = Terrain::new(world, &self.settings, self.rasters.as_ref());
        let out = match op(&terrain, &mut graph) {
            Ok(out) => out,
            Err(e) => {
                warn!("dropping cached graph of world {} after error", world.name);
                return Err(e);
            }
        };

        if let Err(e) = self.save_graph(&graph) {
            warn!(
                "graph of world {} not saved, restoring {} layers",
                world.name,
                snapshots.len()
            );
            for (key, image) in snapshots {
                match image {
                    Some(image) => self.rasters.save(&Canvas::from_image(key, image))?,
                    None => self.rasters.delete(&key)?,
                }
            }
            return Err(e);
        }
        self.graph = Some(graph);
        Ok(out)
    }

    /// Take the world's graph out of the cache, or load it from the store.
    fn load_graph(&mut self, world: &World) -> Result<WorldGraph> {
        if let Some(graph) = self.graph.take() {
            if graph.world_id == world.id {
                return Ok(graph);
            }
        }
        let bytes = self.store.graph(&world.id)?.ok_or_else(|| {
            GenesisError::NotFound(format!("graph of world '{}', create tectonics first", world.name))
        })?;
        WorldGraph::from_bytes(self.builder.as_ref(), &bytes)
    }

    fn save_graph(&self, graph: &WorldGraph) -> Result<()> {
        let bytes = graph.to_bytes()?;
        in_transaction(self.store.as_ref(), |tx| tx.set_graph(&graph.world_id, bytes))
    }

    fn forget(&mut self, world_id: &str) {
        self.heightmaps.invalidate(world_id);
        if self.graph.as_ref().is_some_and(|g| g.world_id == world_id) {
            self.graph = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::MemoryRasterStore;
    use crate::store::{JsonStore, Transaction};
    use crate::subdivision::DelaunayVoronoi;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn editor() -> Editor {
        let settings = Settings {
            min_world_size: 100,
            ..Settings::default()
        };
        Editor::new(
            Box::new(JsonStore::in_memory()),
            Box::new(MemoryRasterStore::new()),
            Box::new(DelaunayVoronoi),
            settings,
        )
    }

    /// Store whose commits fail while `failing` is set.
    struct FlakyStore {
        inner: JsonStore,
        failing: Arc<AtomicBool>,
    }

    struct FlakyTransaction<'a> {
        inner: Box<dyn Transaction + 'a>,
        fail: bool,
    }

    impl Store for FlakyStore {
        fn worlds(&self, ids: &[String]) -> Result<Vec<World>> {
            self.inner.worlds(ids)
        }

        fn list_worlds(&self) -> Result<Vec<World>> {
            self.inner.list_worlds()
        }

        fn landmasses(&self, world_id: &str, epoch: u32) -> Result<Vec<Landmass>> {
            self.inner.landmasses(world_id, epoch)
        }

        fn graph(&self, world_id: &str) -> Result<Option<Vec<u8>>> {
            self.inner.graph(world_id)
        }

        fn begin(&self) -> Result<Box<dyn Transaction + '_>> {
            Ok(Box::new(FlakyTransaction {
                inner: self.inner.begin()?,
                fail: self.failing.load(Ordering::SeqCst),
            }))
        }
    }

    impl Transaction for FlakyTransaction<'_> {
        fn set_worlds(&mut self, worlds: &[World]) -> Result<()> {
            self.inner.set_worlds(worlds)
        }

        fn set_landmasses(&mut self, landmasses: &[Landmass]) -> Result<()> {
            self.inner.set_landmasses(landmasses)
        }

        fn delete_landmasses(&mut self, world_id: &str, epoch: u32) -> Result<()> {
            self.inner.delete_landmasses(world_id, epoch)
        }

        fn set_graph(&mut self, world_id: &str, blob: Vec<u8>) -> Result<()> {
            self.inner.set_graph(world_id, blob)
        }

        fn commit(self: Box<Self>) -> Result<()> {
            let FlakyTransaction { inner, fail } = *self;
            if fail {
                inner.rollback();
                return Err(GenesisError::Io(std::io::Error::other("disk full")));
            }
            inner.commit()
        }

        fn rollback(self: Box<Self>) {
            self.inner.rollback()
        }
    }

    #[test]
    fn test_rejected_graph_save_restores_layers() {
        let failing = Arc::new(AtomicBool::new(false));
        let store = FlakyStore {
            inner: JsonStore::in_memory(),
            failing: failing.clone(),
        };
        let mut ed = Editor::new(
            Box::new(store),
            Box::new(MemoryRasterStore::new()),
            Box::new(DelaunayVoronoi),
            Settings {
                min_world_size: 100,
                ..Settings::default()
            },
        );
        let w = ed.create_world("flaky", 200, 200, 5).unwrap();
        ed.create_tectonics(&w, 1.0, 60, 5).unwrap();
        let across = PathSpec::between(Point::new(40, 100), Point::new(160, 100), 1000.0);
        let down = PathSpec::between(Point::new(100, 40), Point::new(100, 160), 1000.0);
        ed.add_ravine(&w, Some("first"), Some(&across), 1).unwrap();
        let ravines = ed.rasters().load(&w.layer(layers::RAVINES)).unwrap();
        assert!(ravines.is_some());

        failing.store(true, Ordering::SeqCst);
        assert!(matches!(
            ed.add_ravine(&w, Some("second"), Some(&down), 2),
            Err(GenesisError::Io(_))
        ));
        assert!(ed.add_river(&w, None, Some(&down), 3).is_err());
        assert_eq!(ed.rasters().load(&w.layer(layers::RAVINES)).unwrap(), ravines);
        assert!(!ed.rasters().exists(&w.layer(layers::RIVERS)).unwrap());

        // the next call reloads the last saved graph
        failing.store(false, Ordering::SeqCst);
        assert!(ed.tagged(&w, "first").is_ok());
        assert!(matches!(ed.tagged(&w, "second"), Err(GenesisError::NotFound(_))));
    }

    #[test]
    fn test_create_world_applies_minimums_and_seed() {
        let mut ed = editor();
        let w = ed.create_world("tiny", 10, 300, 0).unwrap();
        assert_eq!((w.width, w.height), (100, 300));
        assert_ne!(w.seed, 0);
        assert_eq!(w.id, World::id_for_name("tiny"));

        assert_eq!(ed.world("tiny").unwrap(), w);
        assert_eq!(ed.world(&w.id).unwrap(), w);
        assert!(matches!(ed.world("missing"), Err(GenesisError::NotFound(_))));
        assert!(matches!(
            ed.create_world("bad name", 100, 100, 1),
            Err(GenesisError::Validation(_))
        ));
        assert_eq!(ed.list_worlds().unwrap().len(), 1);
    }

    #[test]
    fn test_features_need_tectonics() {
        let mut ed = editor();
        let w = ed.create_world("flat", 100, 100, 3).unwrap();
        assert!(matches!(
            ed.add_mountains(&w, None, None, 1.0, 1),
            Err(GenesisError::NotFound(_))
        ));
    }

    #[test]
    fn test_graph_survives_cache_loss() {
        let mut ed = editor();
        let w = ed.create_world("saved", 200, 200, 5).unwrap();
        ed.create_tectonics(&w, 1.0, 60, 5).unwrap();
        let spec = PathSpec::between(Point::new(40, 100), Point::new(160, 100), 1000.0);
        let placed = ed.add_mountains(&w, Some("spine"), Some(&spec), 1.0, 6).unwrap();

        // force a reload from the store
        ed.graph = None;
        assert_eq!(ed.tagged(&w, "spine").unwrap(), placed.path);
        assert!(matches!(ed.tagged(&w, "nothing"), Err(GenesisError::NotFound(_))));
    }

    #[test]
    fn test_heightmap_cache_invalidated_by_terrain_changes() {
        let mut ed = editor();
        let w = ed.create_world("cached", 150, 150, 9).unwrap();
        ed.create_tectonics(&w, 1.0, 40, 9).unwrap();

        let before = ed.heightmap(&w, w.bounds()).unwrap();
        assert_eq!(ed.heightmaps.len(), 1);
        ed.flatten_outside(&w, Rect::new(50, 50, 100, 100)).unwrap();
        assert!(ed.heightmaps.is_empty());

        let after = ed.heightmap(&w, w.bounds()).unwrap();
        assert_eq!(after.get_pixel(0, 0)[0], 0);
        assert_eq!(before.dimensions(), after.dimensions());
    }

    #[test]
    fn test_sea_map_replaces_landmasses() {
        let mut ed = editor();
        let w = ed.create_world("isles", 150, 150, 2).unwrap();
        ed.create_tectonics(&w, 1.0, 40, 2).unwrap();

        let first = ed.sea_map(&w, 60, 30, 15, 2, 3).unwrap();
        let second = ed.sea_map(&w, 60, 30, 15, 2, 4).unwrap();
        let stored = ed.landmasses(&w).unwrap();
        assert_eq!(stored.len(), second.landmasses.len());
        assert_eq!(first.landmasses.len(), second.landmasses.len());
        assert!(stored.iter().all(|l| second.landmasses.contains(l)));
        assert!(ed.rasters().exists(&w.layer(layers::LANDMASS)).unwrap());
    }

    #[test]
    fn test_next_epoch_moves_world_on() {
        let mut ed = editor();
        let w = ed.create_world("ages", 100, 100, 1).unwrap();
        ed.create_tectonics(&w, 1.0, 30, 1).unwrap();
        let spec = PathSpec::between(Point::new(20, 50), Point::new(80, 50), 1000.0);
        ed.add_ravine(&w, None, Some(&spec), 2).unwrap();

        let next = ed.next_epoch(&w).unwrap();
        assert_eq!(next.epoch, 1);
        assert_eq!(ed.world("ages").unwrap().epoch, 1);
        assert_eq!(
            ed.rasters().load(&w.layer(layers::RAVINES)).unwrap(),
            ed.rasters().load(&next.layer(layers::RAVINES)).unwrap()
        );
        // the graph is shared across epochs
        ed.add_river(&next, None, Some(&spec), 3).unwrap();
    }
}
