//! Climate: where the sea lies, how warm it is, which way currents run and
//! where the rain falls.

mod currents;
mod rain;
mod sea;

use image::{GrayImage, RgbaImage};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::geometry::{Heading, Point};
use crate::paint::{Canvas, RasterStore};
use crate::settings::Settings;
use crate::world::{layers, Landmass, World};

pub use currents::find_currents;
pub use rain::{edge_points, rainfall, storms, RainInputs, Storm};
pub use sea::{classify_sea, label_landmasses, mask_image, paint_sea, Bands};

/// Output of a sea pass.
#[derive(Clone, Debug)]
pub struct SeaMap {
    /// Sea temperature in blue; 0 over land
    pub image: RgbaImage,
    pub landmasses: Vec<Landmass>,
    pub currents: Vec<Vec<Point>>,
}

/// What climate operations need to read and write a world's layers.
#[derive(Clone, Copy)]
pub struct Climate<'a> {
    pub world: &'a World,
    pub settings: &'a Settings,
    pub rasters: &'a dyn RasterStore,
}

impl<'a> Climate<'a> {
    pub fn new(world: &'a World, settings: &'a Settings, rasters: &'a dyn RasterStore) -> Self {
        Self {
            world,
            settings,
            rasters,
        }
    }

    fn canvas(&self, name: &str) -> Result<Canvas> {
        self.rasters
            .canvas(&self.world.layer(name), self.world.width, self.world.height)
    }

    /// Classify sea and land from `heightmap`, route currents over the sea
    /// vertices among `vertices`, paint sea temperatures and label the
    /// landmasses. Saves the sea and landmass layers.
    ///
    /// Both layers are painted from blank, so land never keeps a
    /// temperature from an earlier pass.
    pub fn sea_map(
        &self,
        heightmap: &GrayImage,
        vertices: &[Point],
        sea_level: u8,
        equator_width: i32,
        arctic_width: i32,
        currents: usize,
        seed: u64,
    ) -> Result<SeaMap> {
        let world = self.world;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let sea = classify_sea(heightmap, sea_level);
        let bands = Bands::new(world.height as i32, equator_width, arctic_width);
        let found = find_currents(&sea, vertices, &self.settings.ocean, bands, currents, &mut rng)?;

        let mut temperature = Canvas::new(world.layer(layers::SEA), world.width, world.height);
        temperature.set_mask(Some(sea.clone()));
        paint_sea(&mut temperature, &self.settings.ocean, bands, &found, &mut rng);
        temperature.set_mask(None);

        let mut labels = Canvas::new(world.layer(layers::LANDMASS), world.width, world.height);
        let landmasses = label_landmasses(world, &sea, &mut labels, &mut rng);

        self.rasters.save(&temperature)?;
        self.rasters.save(&labels)?;
        info!(
            "world {} epoch {}: {} sea pixels, {} currents, {} landmasses",
            world.name,
            world.epoch,
            sea.count_true(),
            found.len(),
            landmasses.len()
        );

        Ok(SeaMap {
            image: temperature.into_image(),
            landmasses,
            currents: found,
        })
    }

    /// Blow storms across the world and add their rain to the rain layer.
    ///
    /// `winds` overrides the configured prevailing winds when non-empty. A
    /// multiplier of zero or less returns the stored rain layer untouched.
    pub fn rain(&self, mult: f64, winds: Option<&[Heading]>, seed: u64) -> Result<RgbaImage> {
        let mut layer = self.canvas(layers::RAIN)?;
        if mult <= 0.0 {
            return Ok(layer.into_image());
        }

        let mountains = self.canvas(layers::MOUNTAINS)?;
        let sea = self.canvas(layers::SEA)?;
        let winds = match winds {
            Some(w) if !w.is_empty() => w,
            _ => self.settings.rain.prevailing_winds.as_slice(),
        };

        let inputs = RainInputs {
            sea: &sea,
            mountains: &mountains,
        };
        rainfall(
            &mut layer,
            &inputs,
            winds,
            &self.settings.rain,
            &self.settings.ocean,
            mult,
            seed,
        )?;
        self.rasters.save(&layer)?;
        info!(
            "rain over world {} epoch {} with {} wind bands",
            self.world.name,
            self.world.epoch,
            winds.len()
        );
        Ok(layer.into_image())
    }
}
