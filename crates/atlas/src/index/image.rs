//! Image catalog: exposures indexed by name, date, position and field.

use crate::config::{StoreConfig, BY_DATE, BY_FIELD, BY_NAME, BY_POSITION};
use crate::error::{AtlasError, Result};
use crate::folder::FolderKey;
use crate::index::keys::{date_key, day_key, name_key, position_key};
use crate::index::{IndexSpec, MultiIndex};
use crate::sky::Coordinate;
use crate::store::codec::{put_f64, put_i64, put_str, ByteReader};
use crate::store::{Cursor, Record, RecordBatch};
use std::collections::HashSet;

/// Default upper bound on an image's field of view, in degrees.
pub const DEFAULT_MAX_FIELD_OF_VIEW_DEG: f64 = 10.0;

/// One registered image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Image name, also the record ID.
    pub name: String,
    /// Exposure start, seconds since the Unix epoch (UTC).
    pub observed_at: i64,
    /// Sky position of the image center.
    pub center: Coordinate,
    /// Diameter of the imaged field, in degrees.
    pub field_of_view_deg: f64,
    /// Name of the target field (`"M31"`, `"NGC 7000"`).
    pub field: String,
}

impl ImageRecord {
    /// Returns true if `point` falls inside the imaged field.
    pub fn covers(&self, point: &Coordinate) -> bool {
        self.center.separation(point) <= self.field_of_view_deg / 2.0
    }
}

impl Record for ImageRecord {
    const KIND: &'static str = "image";
    type Holder = RecordBatch<ImageRecord>;

    fn id(&self) -> &str {
        &self.name
    }

    fn encode(&self, out: &mut Vec<u8>) {
        put_str(out, &self.name);
        put_i64(out, self.observed_at);
        put_f64(out, self.center.ra_deg());
        put_f64(out, self.center.dec_deg());
        put_f64(out, self.field_of_view_deg);
        put_str(out, &self.field);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let name = reader.get_str()?;
        let observed_at = reader.get_i64()?;
        let ra = reader.get_f64()?;
        let dec = reader.get_f64()?;
        let field_of_view_deg = reader.get_f64()?;
        let field = reader.get_str()?;
        reader.finish()?;
        Ok(Self {
            name,
            observed_at,
            center: Coordinate::new(ra, dec)?,
            field_of_view_deg,
            field,
        })
    }
}

fn image_date_key(image: &ImageRecord) -> FolderKey {
    date_key(image.observed_at)
}

fn image_position_key(image: &ImageRecord) -> FolderKey {
    position_key(&image.center)
}

fn image_field_key(image: &ImageRecord) -> FolderKey {
    name_key(&image.field)
}

/// Images mirrored under `by-name` (canonical), `by-date`, `by-position`
/// and `by-field`.
#[derive(Debug)]
pub struct ImageCatalog {
    index: MultiIndex<ImageRecord>,
    max_field_of_view_deg: f64,
}

impl ImageCatalog {
    /// Opens the catalog under `config.root`.
    pub fn new(config: StoreConfig) -> Self {
        let index = MultiIndex::new(config, BY_NAME, name_key)
            .with_index(IndexSpec::new(BY_DATE, image_date_key))
            .with_index(IndexSpec::new(BY_POSITION, image_position_key))
            .with_index(IndexSpec::new(BY_FIELD, image_field_key));
        Self {
            index,
            max_field_of_view_deg: DEFAULT_MAX_FIELD_OF_VIEW_DEG,
        }
    }

    /// Sets the widest field of view accepted by [`ImageCatalog::add`].
    ///
    /// Coverage queries search this far around the point, so keep it close
    /// to the widest image actually stored.
    pub fn with_max_field_of_view(mut self, degrees: f64) -> Self {
        self.max_field_of_view_deg = degrees;
        self
    }

    /// The underlying coordinator.
    pub fn index(&self) -> &MultiIndex<ImageRecord> {
        &self.index
    }

    /// Adds one image to every index.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` if the field of view is not positive or is
    /// wider than the catalog accepts.
    pub fn add(&self, image: &ImageRecord) -> Result<()> {
        self.check_field_of_view(image)?;
        self.index.add(image)
    }

    /// Adds many images, one batch shard per destination folder.
    pub fn add_many(&self, images: &[ImageRecord]) -> Result<()> {
        for image in images {
            self.check_field_of_view(image)?;
        }
        self.index.add_many(images)
    }

    /// Looks up an image by name.
    pub fn get(&self, name: &str) -> Result<Option<ImageRecord>> {
        self.index.get(name)
    }

    /// Removes an image from every index.
    pub fn delete(&self, name: &str) -> Result<Option<ImageRecord>> {
        self.index.delete(name)
    }

    /// Removes every named image from every index.
    pub fn delete_many(&self, names: &HashSet<String>) -> Result<Vec<ImageRecord>> {
        self.index.delete_many(names)
    }

    /// Images taken on the given UTC day, oldest first.
    pub fn images_on(&self, year: i32, month: u32, day: u32) -> Result<Vec<ImageRecord>> {
        let key = day_key(year, month, day);
        let mut images = self.index.get_elements(BY_DATE, &key_parts(&key))?;
        images.sort_by_key(|image| image.observed_at);
        Ok(images)
    }

    /// Images of the named target field, oldest first.
    pub fn images_of_field(&self, field: &str) -> Result<Vec<ImageRecord>> {
        let key = name_key(field);
        let mut images: Vec<ImageRecord> = self
            .index
            .get_elements(BY_FIELD, &key_parts(&key))?
            .into_iter()
            .filter(|image| name_key(&image.field) == key)
            .collect();
        images.sort_by_key(|image| image.observed_at);
        Ok(images)
    }

    /// Images whose field contains `point`, oldest first.
    pub fn images_covering(&self, point: &Coordinate) -> Result<Vec<ImageRecord>> {
        let mut cursor = self
            .index
            .cursor_within(point, self.max_field_of_view_deg / 2.0)?;
        let mut images = Vec::new();
        let mut image = cursor.first()?;
        while let Some(candidate) = image {
            if candidate.covers(point) {
                images.push(candidate);
            }
            image = cursor.next()?;
        }
        images.sort_by_key(|image| image.observed_at);
        Ok(images)
    }

    /// Writes images held in the write-back cache.
    pub fn flush(&self) -> Result<usize> {
        self.index.flush()
    }

    /// Deletes the whole catalog from disk.
    pub fn discard(&self) -> Result<()> {
        self.index.discard()
    }

    fn check_field_of_view(&self, image: &ImageRecord) -> Result<()> {
        let fov = image.field_of_view_deg;
        if !(fov > 0.0 && fov <= self.max_field_of_view_deg) {
            return Err(AtlasError::InvalidCoordinate(format!(
                "field of view {fov} of {} outside (0, {}]",
                image.name, self.max_field_of_view_deg
            )));
        }
        Ok(())
    }
}

fn key_parts(key: &FolderKey) -> Vec<&str> {
    key.components().iter().map(String::as_str).collect()
}
