use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::Xxh64;

const DSP_HASH_SEED: u64 = 0x6473_705f_6861_7368;

/// Immutable coordinate in the dimension space, e.g. `{language: en, audience: b2b}`.
///
/// The hash is computed once from the sorted coordinates and serves as the
/// equality and lookup key. The empty point is the origin of root nodes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct DimensionSpacePoint {
    coordinates: BTreeMap<String, String>,
    hash: String,
}

impl DimensionSpacePoint {
    /// Builds a point from dimension-name/value pairs.
    pub fn new<K, V>(coordinates: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let coordinates: BTreeMap<String, String> = coordinates
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from(coordinates)
    }

    /// The point without coordinates.
    pub fn empty() -> Self {
        Self::from(BTreeMap::new())
    }

    /// Coordinates in dimension-name order.
    pub fn coordinates(&self) -> &BTreeMap<String, String> {
        &self.coordinates
    }

    /// Value of one dimension, if set.
    pub fn coordinate(&self, dimension: &str) -> Option<&str> {
        self.coordinates.get(dimension).map(String::as_str)
    }

    /// Stable hash of the coordinates.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Canonical JSON form used for persistence.
    pub fn to_json(&self) -> String {
        let mut out = String::from("{");
        for (i, (k, v)) in self.coordinates.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&serde_json::Value::from(k.as_str()).to_string());
            out.push(':');
            out.push_str(&serde_json::Value::from(v.as_str()).to_string());
        }
        out.push('}');
        out
    }

    /// Parses the persisted JSON form.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let coordinates: BTreeMap<String, String> = serde_json::from_str(raw)?;
        Ok(Self::from(coordinates))
    }
}

fn hash_coordinates(coordinates: &BTreeMap<String, String>) -> String {
    let mut hasher = Xxh64::new(DSP_HASH_SEED);
    for (k, v) in coordinates {
        hasher.update(k.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(v.as_bytes());
        hasher.update(&[0x1e]);
    }
    hex::encode(hasher.digest().to_be_bytes())
}

impl From<BTreeMap<String, String>> for DimensionSpacePoint {
    fn from(coordinates: BTreeMap<String, String>) -> Self {
        let hash = hash_coordinates(&coordinates);
        Self { coordinates, hash }
    }
}

impl From<DimensionSpacePoint> for BTreeMap<String, String> {
    fn from(point: DimensionSpacePoint) -> Self {
        point.coordinates
    }
}

impl PartialEq for DimensionSpacePoint {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.coordinates == other.coordinates
    }
}

impl Eq for DimensionSpacePoint {}

impl Hash for DimensionSpacePoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Display for DimensionSpacePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

/// Order-irrelevant set of dimension space points keyed by hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DimensionSpacePoint>", into = "Vec<DimensionSpacePoint>")]
pub struct DimensionSpacePointSet {
    points: BTreeMap<String, DimensionSpacePoint>,
}

impl DimensionSpacePointSet {
    /// Builds a set, dropping duplicates.
    pub fn new(points: impl IntoIterator<Item = DimensionSpacePoint>) -> Self {
        Self {
            points: points
                .into_iter()
                .map(|p| (p.hash().to_owned(), p))
                .collect(),
        }
    }

    /// Set with a single point.
    pub fn single(point: DimensionSpacePoint) -> Self {
        Self::new([point])
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the set has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether a point with this hash is a member.
    pub fn contains_hash(&self, hash: &str) -> bool {
        self.points.contains_key(hash)
    }

    /// Whether the point is a member.
    pub fn contains(&self, point: &DimensionSpacePoint) -> bool {
        self.contains_hash(point.hash())
    }

    /// Point with the given hash.
    pub fn get(&self, hash: &str) -> Option<&DimensionSpacePoint> {
        self.points.get(hash)
    }

    /// Points in hash order.
    pub fn iter(&self) -> impl Iterator<Item = &DimensionSpacePoint> {
        self.points.values()
    }

    /// Member hashes in ascending order.
    pub fn hashes(&self) -> impl Iterator<Item = &str> {
        self.points.keys().map(String::as_str)
    }

    /// Adds a point; returns false when it was already present.
    pub fn insert(&mut self, point: DimensionSpacePoint) -> bool {
        self.points.insert(point.hash().to_owned(), point).is_none()
    }

    /// Removes the point with the given hash.
    pub fn remove_hash(&mut self, hash: &str) -> Option<DimensionSpacePoint> {
        self.points.remove(hash)
    }

    /// Points present in either set.
    pub fn union(&self, other: &Self) -> Self {
        let mut points = self.points.clone();
        for (hash, point) in &other.points {
            points.entry(hash.clone()).or_insert_with(|| point.clone());
        }
        Self { points }
    }

    /// Points of `self` not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|(hash, _)| !other.points.contains_key(*hash))
                .map(|(h, p)| (h.clone(), p.clone()))
                .collect(),
        }
    }

    /// Points present in both sets.
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|(hash, _)| other.points.contains_key(*hash))
                .map(|(h, p)| (h.clone(), p.clone()))
                .collect(),
        }
    }
}

impl From<Vec<DimensionSpacePoint>> for DimensionSpacePointSet {
    fn from(points: Vec<DimensionSpacePoint>) -> Self {
        Self::new(points)
    }
}

impl From<DimensionSpacePointSet> for Vec<DimensionSpacePoint> {
    fn from(set: DimensionSpacePointSet) -> Self {
        set.points.into_values().collect()
    }
}

impl FromIterator<DimensionSpacePoint> for DimensionSpacePointSet {
    fn from_iter<I: IntoIterator<Item = DimensionSpacePoint>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a DimensionSpacePointSet {
    type Item = &'a DimensionSpacePoint;
    type IntoIter = std::collections::btree_map::Values<'a, String, DimensionSpacePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.values()
    }
}
