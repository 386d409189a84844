//! Star catalog: stars indexed by name and by sky position.

use crate::config::{StoreConfig, BY_NAME, BY_POSITION};
use crate::error::Result;
use crate::folder::FolderKey;
use crate::index::keys::{name_key, position_key};
use crate::index::{IndexSpec, MultiIndex};
use crate::query::SpatialCursor;
use crate::sky::Coordinate;
use crate::store::codec::{put_f64, put_str, ByteReader};
use crate::store::{Cursor, Record, RecordBatch};
use std::collections::HashSet;

/// One catalog star.
#[derive(Debug, Clone, PartialEq)]
pub struct StarRecord {
    /// Designation, also the record ID (`"HD 12345"`, `"Vega"`).
    pub name: String,
    /// J2000 position.
    pub position: Coordinate,
    /// Visual magnitude.
    pub magnitude: f64,
    /// Source catalog name.
    pub catalog: String,
}

impl StarRecord {
    /// Creates a star record.
    pub fn new(
        name: impl Into<String>,
        position: Coordinate,
        magnitude: f64,
        catalog: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            magnitude,
            catalog: catalog.into(),
        }
    }
}

impl Record for StarRecord {
    const KIND: &'static str = "star";
    type Holder = RecordBatch<StarRecord>;

    fn id(&self) -> &str {
        &self.name
    }

    fn encode(&self, out: &mut Vec<u8>) {
        put_str(out, &self.name);
        put_f64(out, self.position.ra_deg());
        put_f64(out, self.position.dec_deg());
        put_f64(out, self.magnitude);
        put_str(out, &self.catalog);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let name = reader.get_str()?;
        let ra = reader.get_f64()?;
        let dec = reader.get_f64()?;
        let magnitude = reader.get_f64()?;
        let catalog = reader.get_str()?;
        reader.finish()?;
        Ok(Self {
            name,
            position: Coordinate::new(ra, dec)?,
            magnitude,
            catalog,
        })
    }
}

fn star_position_key(star: &StarRecord) -> FolderKey {
    position_key(&star.position)
}

/// Stars mirrored under `by-name` (canonical) and `by-position`.
#[derive(Debug)]
pub struct StarCatalog {
    index: MultiIndex<StarRecord>,
}

impl StarCatalog {
    /// Opens (lazily; nothing is created until the first write) the catalog
    /// under `config.root`.
    pub fn new(config: StoreConfig) -> Self {
        let index = MultiIndex::new(config, BY_NAME, name_key)
            .with_index(IndexSpec::new(BY_POSITION, star_position_key));
        Self { index }
    }

    /// The underlying coordinator.
    pub fn index(&self) -> &MultiIndex<StarRecord> {
        &self.index
    }

    /// Adds one star to both indices.
    pub fn add(&self, star: &StarRecord) -> Result<()> {
        self.index.add(star)
    }

    /// Adds many stars, one batch shard per destination folder.
    pub fn add_many(&self, stars: &[StarRecord]) -> Result<()> {
        self.index.add_many(stars)
    }

    /// Looks up a star by name.
    pub fn get(&self, name: &str) -> Result<Option<StarRecord>> {
        self.index.get(name)
    }

    /// Removes a star from both indices.
    pub fn delete(&self, name: &str) -> Result<Option<StarRecord>> {
        self.index.delete(name)
    }

    /// Removes every named star from both indices.
    pub fn delete_many(&self, names: &HashSet<String>) -> Result<Vec<StarRecord>> {
        self.index.delete_many(names)
    }

    /// Every star whose name folder starts with `prefix`, e.g. `["HD", "1"]`.
    pub fn stars_in_name_folder(&self, prefix: &[&str]) -> Result<Vec<StarRecord>> {
        self.index.get_elements(BY_NAME, prefix)
    }

    /// Cursor over the stars of every cell overlapping the circle.
    ///
    /// Stars near the circle but outside it may be included.
    pub fn cursor_within(
        &self,
        center: &Coordinate,
        radius: f64,
    ) -> Result<SpatialCursor<StarRecord>> {
        self.index.cursor_within(center, radius)
    }

    /// Stars no farther than `radius` degrees from `center`, nearest first.
    pub fn stars_within(&self, center: &Coordinate, radius: f64) -> Result<Vec<StarRecord>> {
        let mut cursor = self.cursor_within(center, radius)?;
        let mut found = Vec::new();
        let mut star = cursor.first()?;
        while let Some(candidate) = star {
            let distance = center.separation(&candidate.position);
            if distance <= radius {
                found.push((distance, candidate));
            }
            star = cursor.next()?;
        }
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(found.into_iter().map(|(_, star)| star).collect())
    }

    /// Writes stars held in the write-back cache.
    pub fn flush(&self) -> Result<usize> {
        self.index.flush()
    }

    /// Deletes the whole catalog from disk.
    pub fn discard(&self) -> Result<()> {
        self.index.discard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn star(name: &str, ra_hours: f64, dec: f64, magnitude: f64) -> StarRecord {
        StarRecord::new(name, Coordinate::from_hours(ra_hours, dec).unwrap(), magnitude, "test")
    }

    #[test]
    fn test_star_record_encoding() {
        let vega = star("Vega", 18.6156, 38.7837, 0.03);
        let mut bytes = Vec::new();
        vega.encode(&mut bytes);
        assert_eq!(StarRecord::decode(&bytes).unwrap(), vega);
        assert!(StarRecord::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_lookup_by_name_and_position() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = StarCatalog::new(StoreConfig::new(temp_dir.path()));
        let target = star("HD 12345", 10.0, 20.0, 7.1);
        catalog.add(&target).unwrap();
        catalog.add(&star("HD 99999", 22.0, -20.0, 8.0)).unwrap();

        assert_eq!(catalog.get("HD 12345").unwrap(), Some(target.clone()));
        let mut by_position = catalog.cursor_within(&target.position, 0.5).unwrap();
        assert_eq!(by_position.collect_all().unwrap(), vec![target.clone()]);
        assert_eq!(catalog.stars_in_name_folder(&["HD", "1"]).unwrap(), vec![target]);
    }

    #[test]
    fn test_stars_within_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = StarCatalog::new(StoreConfig::new(temp_dir.path()));
        let center = Coordinate::new(150.0, 20.0).unwrap();
        catalog
            .add_many(&[
                StarRecord::new("far", Coordinate::new(150.0, 21.8).unwrap(), 5.0, "t"),
                StarRecord::new("near", Coordinate::new(150.0, 20.2).unwrap(), 5.0, "t"),
                StarRecord::new("mid", Coordinate::new(150.9, 20.0).unwrap(), 5.0, "t"),
                StarRecord::new("outside", Coordinate::new(150.0, 22.5).unwrap(), 5.0, "t"),
            ])
            .unwrap();

        let names: Vec<String> = catalog
            .stars_within(&center, 2.0)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_delete_clears_position_cell() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = StarCatalog::new(StoreConfig::new(temp_dir.path()));
        let s = star("M31", 0.712, 41.27, 3.4);
        catalog.add(&s).unwrap();

        assert_eq!(catalog.delete("M31").unwrap(), Some(s.clone()));
        assert!(catalog.stars_within(&s.position, 1.0).unwrap().is_empty());
        assert_eq!(catalog.get("M31").unwrap(), None);
    }
}
