/// Segments and segmentations as GeoJSON features
use crate::error::{FilteringError, Result};
use crate::schema::validate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// GeoJSON position: longitude, latitude and an optional elevation.
pub type Position = Vec<f64>;

/// Area geometries a segment can be made of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// Well-known text representation as accepted by PDAL's crop filter.
    pub fn to_wkt(&self) -> String {
        match self {
            Geometry::Polygon(rings) => format!("POLYGON {}", polygon_wkt(rings)),
            Geometry::MultiPolygon(polygons) => format!(
                "MULTIPOLYGON ({})",
                polygons
                    .iter()
                    .map(|rings| polygon_wkt(rings))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Outer ring of the (first) polygon
    pub fn exterior(&self) -> &[Position] {
        let rings = match self {
            Geometry::Polygon(rings) => Some(rings),
            Geometry::MultiPolygon(polygons) => polygons.first(),
        };
        rings
            .and_then(|rings| rings.first())
            .map(|ring| ring.as_slice())
            .unwrap_or(&[])
    }
}

fn polygon_wkt(rings: &[Vec<Position>]) -> String {
    let rings: Vec<String> = rings
        .iter()
        .map(|ring| {
            let positions: Vec<String> = ring
                .iter()
                .map(|position| {
                    position
                        .iter()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            format!("({})", positions.join(", "))
        })
        .collect();
    format!("({})", rings.join(", "))
}

/// One GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct Feature {
    pub geometry: Geometry,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single geographic boundary with schema-validated metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    geometry: Geometry,
    metadata: Map<String, Value>,
}

impl Segment {
    pub fn new(geometry: Geometry, metadata: Value) -> Result<Self> {
        Ok(Self {
            geometry,
            metadata: validated_metadata(metadata)?,
        })
    }

    /// Segment from the rings of a single polygon
    pub fn polygon(rings: Vec<Vec<Position>>, metadata: Value) -> Result<Self> {
        Self::new(Geometry::Polygon(rings), metadata)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Replace the metadata; the geometry stays as constructed.
    pub fn with_metadata(self, metadata: Value) -> Result<Self> {
        Ok(Self {
            geometry: self.geometry,
            metadata: validated_metadata(metadata)?,
        })
    }

    pub fn to_feature(&self) -> Feature {
        Feature {
            geometry: self.geometry.clone(),
            properties: self.metadata.clone(),
        }
    }
}

impl TryFrom<&Feature> for Segment {
    type Error = FilteringError;

    fn try_from(feature: &Feature) -> Result<Self> {
        Segment::new(
            feature.geometry.clone(),
            Value::Object(feature.properties.clone()),
        )
    }
}

fn validated_metadata(metadata: Value) -> Result<Map<String, Value>> {
    validate(&metadata, "segment_metadata.json")?;
    match metadata {
        Value::Object(map) => Ok(map),
        // The schema only admits objects
        _ => Ok(Map::new()),
    }
}

/// Ordered collection of features, stored as a GeoJSON feature collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct Segmentation {
    pub features: Vec<Feature>,
}

impl Segmentation {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Load segmentation from a GeoJSON file.
    /// Relative paths are interpreted w.r.t. the current working directory.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let segmentation: Segmentation = serde_json::from_reader(reader)?;
        log::info!(
            "Loaded {} features from {}",
            segmentation.features.len(),
            path.display()
        );
        Ok(segmentation)
    }

    /// Save the segmentation as GeoJSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        log::info!("Saved {} features to {}", self.features.len(), path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn push(&mut self, segment: &Segment) {
        self.features.push(segment.to_feature());
    }

    /// Validate every feature as a segment
    pub fn segments(&self) -> Result<Vec<Segment>> {
        self.features.iter().map(Segment::try_from).collect()
    }

    /// WKT strings for every feature geometry, in order
    pub fn polygons_wkt(&self) -> Vec<String> {
        self.features.iter().map(|f| f.geometry.to_wkt()).collect()
    }
}

impl From<Segment> for Segmentation {
    fn from(segment: Segment) -> Self {
        Segmentation::new(vec![segment.to_feature()])
    }
}
