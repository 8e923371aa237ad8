//! Seed management for world generation
//!
//! Every randomized step takes an explicit seed. A world stores one master
//! seed; each generation system derives its own from it so that rerunning a
//! single step reproduces the same output.

/// Seeds for all world generation systems.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldSeeds {
    /// Master seed (stored on the world record)
    pub master: u64,
    /// Planar graph sites and tectonic noise
    pub tectonics: u64,
    /// Mountain range placement and drawing
    pub mountains: u64,
    /// Volcano candidate selection and drawing
    pub volcanoes: u64,
    /// Ravine placement
    pub ravines: u64,
    /// River placement
    pub rivers: u64,
    /// Sea classification, landmass ids and ocean currents
    pub sea: u64,
    /// Storm seeding and rainfall transport
    pub rain: u64,
}

impl WorldSeeds {
    /// Create seeds from a master seed, deriving all sub-seeds deterministically.
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            tectonics: derive_seed(master, "tectonics"),
            mountains: derive_seed(master, "mountains"),
            volcanoes: derive_seed(master, "volcanoes"),
            ravines: derive_seed(master, "ravines"),
            rivers: derive_seed(master, "rivers"),
            sea: derive_seed(master, "sea"),
            rain: derive_seed(master, "rain"),
        }
    }

    /// Seed for the `n`th repetition of a step, e.g. the third mountain range.
    pub fn nth(seed: u64, n: u64) -> u64 {
        derive_seed(seed, &n.to_string())
    }
}

/// Derive a sub-seed from a master seed and a system name.
///
/// The name is folded with FNV-1a and mixed into the master with
/// splitmix64, so a stored master seed derives the same sub-seeds on every
/// build and platform.
fn derive_seed(master: u64, system: &str) -> u64 {
    let name = system.bytes().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    });
    splitmix64(master ^ name)
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl std::fmt::Display for WorldSeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WorldSeeds {{ master: {}, tectonics: {}, mountains: {}, volcanoes: {}, \
             ravines: {}, rivers: {}, sea: {}, rain: {} }}",
            self.master,
            self.tectonics,
            self.mountains,
            self.volcanoes,
            self.ravines,
            self.rivers,
            self.sea,
            self.rain,
        )
    }
}
