//! Persistence of world and landmass records and serialized world graphs.
//!
//! Writes go through a [`Transaction`]: they are staged, checked and then
//! applied all at once on commit. A commit that fails leaves the previous
//! state in place.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GenesisError, Result};
use crate::world::{Landmass, World};

/// Read side of the record store.
pub trait Store: Send + Sync {
    /// Worlds with the given ids, skipping unknown ids.
    fn worlds(&self, ids: &[String]) -> Result<Vec<World>>;

    fn list_worlds(&self) -> Result<Vec<World>>;

    fn landmasses(&self, world_id: &str, epoch: u32) -> Result<Vec<Landmass>>;

    /// Serialized graph of a world, if one was saved.
    fn graph(&self, world_id: &str) -> Result<Option<Vec<u8>>>;

    fn begin(&self) -> Result<Box<dyn Transaction + '_>>;
}

/// Staged writes. Dropping a transaction without committing discards it.
pub trait Transaction {
    fn set_worlds(&mut self, worlds: &[World]) -> Result<()>;
    fn set_landmasses(&mut self, landmasses: &[Landmass]) -> Result<()>;
    fn delete_landmasses(&mut self, world_id: &str, epoch: u32) -> Result<()>;
    fn set_graph(&mut self, world_id: &str, blob: Vec<u8>) -> Result<()>;
    fn commit(self: Box<Self>) -> Result<()>;
    fn rollback(self: Box<Self>);
}

/// Run `writes` in a fresh transaction, committing when they all succeed and
/// rolling back otherwise.
pub fn in_transaction<F>(store: &dyn Store, writes: F) -> Result<()>
where
    F: FnOnce(&mut dyn Transaction) -> Result<()>,
{
    let mut tx = store.begin()?;
    match writes(tx.as_mut()) {
        Ok(()) => tx.commit(),
        Err(e) => {
            tx.rollback();
            Err(e)
        }
    }
}

pub fn validate_id(id: &str) -> Result<()> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| GenesisError::Validation(format!("'{}' is not a valid id", id)))
}

pub fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(GenesisError::Validation(format!(
            "name '{}' must be 1-255 letters, digits, '_' or '-'",
            name
        )))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Records {
    worlds: BTreeMap<String, World>,
    landmasses: Vec<Landmass>,
}

#[derive(Debug, Default)]
struct State {
    records: Records,
    graphs: HashMap<String, Vec<u8>>,
}

/// Records kept in memory and, when rooted in a directory, mirrored to
/// `worlds.json` and `graphs/{world}.json`.
#[derive(Debug)]
pub struct JsonStore {
    root: Option<PathBuf>,
    state: Mutex<State>,
}

impl JsonStore {
    pub fn in_memory() -> Self {
        Self {
            root: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Open or create a store under `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("graphs"))?;

        let index = root.join("worlds.json");
        let records = if index.exists() {
            serde_json::from_slice(&fs::read(&index)?)?
        } else {
            Records::default()
        };
        info!(
            "opened store at {} with {} worlds",
            root.display(),
            records.worlds.len()
        );

        Ok(Self {
            root: Some(root),
            state: Mutex::new(State {
                records,
                graphs: HashMap::new(),
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| GenesisError::Io(std::io::Error::other("store lock poisoned")))
    }

    fn graph_path(root: &Path, world_id: &str) -> PathBuf {
        root.join("graphs").join(format!("{}.json", world_id))
    }
}

impl Store for JsonStore {
    fn worlds(&self, ids: &[String]) -> Result<Vec<World>> {
        let state = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.records.worlds.get(id).cloned())
            .collect())
    }

    fn list_worlds(&self) -> Result<Vec<World>> {
        Ok(self.lock()?.records.worlds.values().cloned().collect())
    }

    fn landmasses(&self, world_id: &str, epoch: u32) -> Result<Vec<Landmass>> {
        Ok(self
            .lock()?
            .records
            .landmasses
            .iter()
            .filter(|l| l.world_id == world_id && l.epoch == epoch)
            .cloned()
            .collect())
    }

    fn graph(&self, world_id: &str) -> Result<Option<Vec<u8>>> {
        let mut state = self.lock()?;
        if let Some(blob) = state.graphs.get(world_id) {
            return Ok(Some(blob.clone()));
        }
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let path = Self::graph_path(root, world_id);
        if !path.exists() {
            return Ok(None);
        }
        let blob = fs::read(&path)?;
        state.graphs.insert(world_id.to_string(), blob.clone());
        Ok(Some(blob))
    }

    fn begin(&self) -> Result<Box<dyn Transaction + '_>> {
        Ok(Box::new(JsonTransaction {
            store: self,
            ops: Vec::new(),
        }))
    }
}

#[derive(Debug)]
enum Op {
    SetWorlds(Vec<World>),
    SetLandmasses(Vec<Landmass>),
    DeleteLandmasses(String, u32),
    SetGraph(String, Vec<u8>),
}

struct JsonTransaction<'a> {
    store: &'a JsonStore,
    ops: Vec<Op>,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `bytes` next to `path` under a temporary name. Renamed into place
/// once every file of a commit has been written.
fn stage_file(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let tmp = with_suffix(path, ".tmp");
    fs::write(&tmp, bytes)?;
    Ok(tmp)
}

/// Move every staged file over its target. Replaced files are set aside
/// first; if any move fails the targets already replaced get their old
/// contents back and no staged or backup file is left behind.
fn swap_in(staged: &[(PathBuf, PathBuf)]) -> Result<()> {
    let mut swapped: Vec<(&Path, Option<PathBuf>)> = Vec::new();
    let mut failure = None;

    for (tmp, path) in staged {
        let backup = if path.is_file() {
            let backup = with_suffix(path, ".bak");
            if let Err(e) = fs::rename(path, &backup) {
                failure = Some(e);
                break;
            }
            Some(backup)
        } else {
            None
        };
        if let Err(e) = fs::rename(tmp, path) {
            if let Some(backup) = &backup {
                let _ = fs::rename(backup, path);
            }
            failure = Some(e);
            break;
        }
        swapped.push((path.as_path(), backup));
    }

    match failure {
        None => {
            for backup in swapped.into_iter().filter_map(|(_, backup)| backup) {
                let _ = fs::remove_file(backup);
            }
            Ok(())
        }
        Some(e) => {
            warn!("commit failed, restoring {} files: {}", swapped.len(), e);
            for (path, backup) in swapped.into_iter().rev() {
                let _ = match backup {
                    Some(backup) => fs::rename(backup, path),
                    None => fs::remove_file(path),
                };
            }
            for (tmp, _) in staged {
                let _ = fs::remove_file(tmp);
            }
            Err(e.into())
        }
    }
}

impl Transaction for JsonTransaction<'_> {
    fn set_worlds(&mut self, worlds: &[World]) -> Result<()> {
        for world in worlds {
            validate_id(&world.id)?;
            validate_name(&world.name)?;
        }
        self.ops.push(Op::SetWorlds(worlds.to_vec()));
        Ok(())
    }

    fn set_landmasses(&mut self, landmasses: &[Landmass]) -> Result<()> {
        for landmass in landmasses {
            validate_id(&landmass.id)?;
            validate_id(&landmass.world_id)?;
        }
        self.ops.push(Op::SetLandmasses(landmasses.to_vec()));
        Ok(())
    }

    fn delete_landmasses(&mut self, world_id: &str, epoch: u32) -> Result<()> {
        validate_id(world_id)?;
        self.ops.push(Op::DeleteLandmasses(world_id.to_string(), epoch));
        Ok(())
    }

    fn set_graph(&mut self, world_id: &str, blob: Vec<u8>) -> Result<()> {
        validate_id(world_id)?;
        self.ops.push(Op::SetGraph(world_id.to_string(), blob));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let JsonTransaction { store, ops } = *self;
        let mut state = store.lock()?;
        let mut records = state.records.clone();
        let mut graphs: Vec<(String, Vec<u8>)> = Vec::new();
        let mut records_changed = false;

        for op in ops {
            match op {
                Op::SetWorlds(worlds) => {
                    for world in worlds {
                        records.worlds.insert(world.id.clone(), world);
                    }
                    records_changed = true;
                }
                Op::SetLandmasses(landmasses) => {
                    let ids: HashSet<&str> = landmasses.iter().map(|l| l.id.as_str()).collect();
                    records.landmasses.retain(|l| !ids.contains(l.id.as_str()));
                    records.landmasses.extend(landmasses);
                    records_changed = true;
                }
                Op::DeleteLandmasses(world_id, epoch) => {
                    records
                        .landmasses
                        .retain(|l| !(l.world_id == world_id && l.epoch == epoch));
                    records_changed = true;
                }
                Op::SetGraph(world_id, blob) => graphs.push((world_id, blob)),
            }
        }

        if let Some(root) = &store.root {
            let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
            let mut write = || -> Result<()> {
                for (world_id, blob) in &graphs {
                    let path = JsonStore::graph_path(root, world_id);
                    staged.push((stage_file(&path, blob)?, path));
                }
                if records_changed {
                    let path = root.join("worlds.json");
                    let bytes = serde_json::to_vec_pretty(&records)?;
                    staged.push((stage_file(&path, &bytes)?, path));
                }
                Ok(())
            };
            if let Err(e) = write() {
                for (tmp, _) in &staged {
                    let _ = fs::remove_file(tmp);
                }
                return Err(e);
            }
            swap_in(&staged)?;
        }

        debug!(
            "committed {} worlds, {} landmasses, {} graphs",
            records.worlds.len(),
            records.landmasses.len(),
            graphs.len()
        );
        state.records = records;
        for (world_id, blob) in graphs {
            state.graphs.insert(world_id, blob);
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        debug!("rolled back {} staged writes", self.ops.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn world(name: &str) -> World {
        World {
            id: World::id_for_name(name),
            name: name.into(),
            epoch: 0,
            seed: 1,
            width: 500,
            height: 500,
        }
    }

    fn landmass(world: &World, epoch: u32, size: u64) -> Landmass {
        Landmass {
            world_id: world.id.clone(),
            id: Uuid::new_v4().to_string(),
            epoch,
            size,
            color: (0, 1),
            first: Point::new(1, 1),
        }
    }

    #[test]
    fn test_names_and_ids_validated() {
        assert!(validate_name("my-world_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name(&"a".repeat(256)).is_err());
        assert!(validate_id("nope").is_err());

        let store = JsonStore::in_memory();
        let mut tx = store.begin().unwrap();
        let mut bad = world("ok");
        bad.name = "bad name".into();
        assert!(matches!(
            tx.set_worlds(&[bad]),
            Err(GenesisError::Validation(_))
        ));
    }

    #[test]
    fn test_uncommitted_writes_invisible() {
        let store = JsonStore::in_memory();
        let w = world("alpha");

        let mut tx = store.begin().unwrap();
        tx.set_worlds(&[w.clone()]).unwrap();
        tx.rollback();
        assert!(store.list_worlds().unwrap().is_empty());

        let mut tx = store.begin().unwrap();
        tx.set_worlds(&[w.clone()]).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.worlds(&[w.id.clone()]).unwrap(), vec![w]);
    }

    #[test]
    fn test_delete_then_set_landmasses() {
        let store = JsonStore::in_memory();
        let w = world("beta");

        let mut tx = store.begin().unwrap();
        tx.set_landmasses(&[landmass(&w, 0, 10), landmass(&w, 0, 20), landmass(&w, 1, 5)])
            .unwrap();
        tx.commit().unwrap();
        assert_eq!(store.landmasses(&w.id, 0).unwrap().len(), 2);

        let mut tx = store.begin().unwrap();
        tx.delete_landmasses(&w.id, 0).unwrap();
        tx.set_landmasses(&[landmass(&w, 0, 99)]).unwrap();
        tx.commit().unwrap();

        let sizes: Vec<u64> = store.landmasses(&w.id, 0).unwrap().iter().map(|l| l.size).collect();
        assert_eq!(sizes, vec![99]);
        assert_eq!(store.landmasses(&w.id, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_rooted_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let w = world("gamma");
        {
            let store = JsonStore::open(dir.path()).unwrap();
            let mut tx = store.begin().unwrap();
            tx.set_worlds(&[w.clone()]).unwrap();
            tx.set_landmasses(&[landmass(&w, 0, 42)]).unwrap();
            tx.set_graph(&w.id, b"{\"graph\":1}".to_vec()).unwrap();
            tx.commit().unwrap();
        }

        let store = JsonStore::open(dir.path()).unwrap();
        assert_eq!(store.list_worlds().unwrap(), vec![w.clone()]);
        assert_eq!(store.landmasses(&w.id, 0).unwrap()[0].size, 42);
        assert_eq!(store.graph(&w.id).unwrap().unwrap(), b"{\"graph\":1}".to_vec());
        assert!(store.graph(&World::id_for_name("other")).unwrap().is_none());
    }

    #[test]
    fn test_set_landmasses_replaces_same_id() {
        let store = JsonStore::in_memory();
        let w = world("delta");
        let kept = landmass(&w, 0, 1);
        let mut grown = landmass(&w, 0, 2);

        let mut tx = store.begin().unwrap();
        tx.set_landmasses(&[kept.clone(), grown.clone()]).unwrap();
        tx.commit().unwrap();

        grown.size = 50;
        let mut tx = store.begin().unwrap();
        tx.set_landmasses(&[grown.clone()]).unwrap();
        tx.commit().unwrap();

        let mut sizes: Vec<u64> = store.landmasses(&w.id, 0).unwrap().iter().map(|l| l.size).collect();
        sizes.sort();
        assert_eq!(sizes, vec![1, 50]);
    }

    #[test]
    fn test_failed_rename_restores_files() {
        let dir = tempfile::tempdir().unwrap();
        let w = world("epsilon");
        let store = JsonStore::open(dir.path()).unwrap();

        let mut tx = store.begin().unwrap();
        tx.set_graph(&w.id, b"OLD".to_vec()).unwrap();
        tx.commit().unwrap();

        // the index can no longer be replaced, so the second rename fails
        let index = dir.path().join("worlds.json");
        fs::create_dir(&index).unwrap();
        fs::write(index.join("blocker"), b"x").unwrap();

        let mut tx = store.begin().unwrap();
        tx.set_graph(&w.id, b"NEW".to_vec()).unwrap();
        tx.set_worlds(&[w.clone()]).unwrap();
        assert!(tx.commit().is_err());

        let graph_path = JsonStore::graph_path(dir.path(), &w.id);
        assert_eq!(fs::read(&graph_path).unwrap(), b"OLD".to_vec());
        assert_eq!(store.graph(&w.id).unwrap().unwrap(), b"OLD".to_vec());
        assert!(store.list_worlds().unwrap().is_empty());

        let leftovers: Vec<PathBuf> = [dir.path().to_path_buf(), dir.path().join("graphs")]
            .iter()
            .flat_map(|d| fs::read_dir(d).unwrap())
            .map(|entry| entry.unwrap().path())
            .filter(|p| {
                let name = p.to_string_lossy();
                name.ends_with(".tmp") || name.ends_with(".bak")
            })
            .collect();
        assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
    }
}
