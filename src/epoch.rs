//! Moving a world on to its next epoch.

use log::info;
use rayon::prelude::*;

use crate::error::{fan_in, Result};
use crate::paint::RasterStore;
use crate::store::{in_transaction, Store};
use crate::world::{layers, World};

/// Copy the terrain layers of `world` into `epoch + 1` and record the new
/// epoch.
///
/// Derived layers (heightmaps, sea classification, landmasses) are not
/// carried; they must be recomputed in the new epoch. Layers never saved are
/// carried as blank. The record is only updated once every copy succeeded.
pub fn next_epoch(world: &World, store: &dyn Store, rasters: &dyn RasterStore) -> Result<World> {
    let next = world.epoch + 1;

    let copied: Vec<Result<()>> = layers::EPOCH_CARRY
        .par_iter()
        .map(|name| {
            let from = world.layer(name);
            let to = from.at_epoch(next);
            rasters.copy(&from, &to, world.width, world.height)
        })
        .collect();
    fan_in(copied)?;

    let advanced = World {
        epoch: next,
        ..world.clone()
    };
    in_transaction(store, |tx| tx.set_worlds(std::slice::from_ref(&advanced)))?;

    info!("world {} moved to epoch {}", world.name, next);
    Ok(advanced)
}
