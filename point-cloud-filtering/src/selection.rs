/// Headless model of the map used to pick segments over a dataset
use crate::dataset::DataSet;
use crate::error::{FilteringError, Result};
use crate::pipeline::{PipelineEngine, execute_pipeline_with_metadata, stage_metadata};
use crate::segmentation::{Feature, Geometry, Segmentation};
use constants::map::{
    BOUNDARY_COLOUR, BOUNDARY_OPACITY, DEFAULT_DRAW_COLOUR, DEFAULT_ZOOM, DRAW_ERROR_COLOUR,
    DRAW_FILL_OPACITY, MAX_ZOOM, MIN_ZOOM,
};
use constants::pipeline::{FILTER_HEXBIN, FILTER_REPROJECTION, MAP_SRS};
use serde_json::{Map, Value, json};

/// Approximate footprint of a dataset, reprojected to map coordinates.
///
/// File datasets are read by the engine directly; in-memory datasets are fed
/// in as the pipeline input.
pub fn dataset_boundary(engine: &dyn PipelineEngine, dataset: &DataSet) -> Result<Geometry> {
    let mut stages = Vec::new();
    let input = match dataset {
        DataSet::File(file) => {
            stages.push(Value::from(file.filename().to_string_lossy().into_owned()));
            None
        }
        DataSet::InMemory(dataset) => Some(dataset.as_ref()),
    };
    stages.push(json!({"type": FILTER_REPROJECTION, "out_srs": MAP_SRS}));
    stages.push(json!({"type": FILTER_HEXBIN}));

    let (_, metadata) =
        execute_pipeline_with_metadata(engine, input, Some(&Value::Array(stages)))?;

    let boundary = stage_metadata(&metadata, FILTER_HEXBIN)
        .and_then(|hexbin| hexbin.get("boundary_json"))
        .ok_or_else(|| FilteringError::MissingMetadata(format!("{FILTER_HEXBIN}.boundary_json")))?;

    // Some PDAL versions hand the GeoJSON over as text
    let boundary = match boundary {
        Value::String(text) => serde_json::from_str(text)?,
        other => serde_json::from_value(other.clone())?,
    };
    Ok(boundary)
}

/// Selection state: dataset boundary, view, draw style and drawn polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionMap {
    boundary: Geometry,
    center: (f64, f64),
    zoom: u8,
    colour: String,
    features: Vec<Feature>,
}

impl SelectionMap {
    pub fn new(engine: &dyn PipelineEngine, dataset: &DataSet) -> Result<Self> {
        let boundary = dataset_boundary(engine, dataset)?;
        Ok(Self::with_boundary(boundary))
    }

    /// Map centred on the mean of the boundary's outer ring
    pub fn with_boundary(boundary: Geometry) -> Self {
        let ring = boundary.exterior();
        let n = ring.len().max(1) as f64;
        let (sum_x, sum_y) = ring.iter().fold((0.0, 0.0), |(sx, sy), position| {
            (
                sx + position.first().copied().unwrap_or_default(),
                sy + position.get(1).copied().unwrap_or_default(),
            )
        });

        Self {
            boundary,
            center: (sum_x / n, sum_y / n),
            zoom: DEFAULT_ZOOM,
            colour: DEFAULT_DRAW_COLOUR.to_string(),
            features: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &Geometry {
        &self.boundary
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Set the zoom level, clamped to the slider range
    pub fn set_zoom(&mut self, zoom: u8) -> u8 {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.zoom
    }

    pub fn colour(&self) -> &str {
        &self.colour
    }

    /// Colour used for polygons drawn from now on
    pub fn set_colour(&mut self, colour: &str) {
        log::debug!("Draw colour changed from {} to {}", self.colour, colour);
        self.colour = colour.to_string();
    }

    /// Polygon draw tool options for the current colour
    pub fn draw_options(&self) -> Value {
        json!({
            "shapeOptions": self.style(),
            "drawError": {"color": DRAW_ERROR_COLOUR, "message": "Oups!"},
            "allowIntersection": false,
        })
    }

    fn style(&self) -> Value {
        json!({
            "fillColor": self.colour,
            "color": self.colour,
            "fillOpacity": DRAW_FILL_OPACITY,
        })
    }

    /// Draw event: record a polygon with the current style.
    pub fn draw(&mut self, geometry: Geometry) -> &Feature {
        let mut properties = Map::new();
        properties.insert("style".to_string(), self.style());
        self.features.push(Feature {
            geometry,
            properties,
        });
        &self.features[self.features.len() - 1]
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Export all drawn polygons as a segmentation
    pub fn return_polygon(&self) -> Segmentation {
        Segmentation::new(self.features.clone())
    }

    /// Import a segmentation, skipping features whose geometry is already on
    /// the map. Style and colour are not compared. Returns the number added.
    pub fn load_polygon(&mut self, segmentation: &Segmentation) -> usize {
        let before = self.features.len();
        for feature in &segmentation.features {
            if !self.features.iter().any(|f| f.geometry == feature.geometry) {
                self.features.push(feature.clone());
            }
        }
        let added = self.features.len() - before;
        log::info!(
            "Imported {} of {} polygons",
            added,
            segmentation.features.len()
        );
        added
    }

    /// All map layers as a GeoJSON feature collection, boundary first
    pub fn to_geojson(&self) -> Value {
        let boundary = json!({
            "type": "Feature",
            "geometry": self.boundary,
            "properties": {
                "layer": "boundary",
                "style": {"color": BOUNDARY_COLOUR, "opacity": BOUNDARY_OPACITY},
            },
        });
        let mut features = vec![boundary];
        features.extend(
            self.features
                .iter()
                .filter_map(|feature| serde_json::to_value(feature).ok()),
        );
        json!({
            "type": "FeatureCollection",
            "features": features,
            "properties": {"center": [self.center.0, self.center.1], "zoom": self.zoom},
        })
    }
}
