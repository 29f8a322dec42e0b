use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::tile::{BoundingBox, GeoPoint};

/// A flight's line string as handed over by the geometry store
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub id: Option<String>,
    pub bbox: Option<BoundingBox>,
    pub path: Vec<GeoPoint>,
}

/// Either a bare `[[lon, lat], ...]` array or a flight object
#[derive(Deserialize)]
#[serde(untagged)]
enum TrackFile {
    Points(Vec<GeoPoint>),
    Flight {
        id: Option<serde_json::Value>,
        bbox: Option<[f64; 4]>,
        path: Vec<GeoPoint>,
    },
}

impl Track {
    pub fn from_json(text: &str) -> Result<Self> {
        let track = match serde_json::from_str::<TrackFile>(text)? {
            TrackFile::Points(path) => Track { id: None, bbox: None, path },
            TrackFile::Flight { id, bbox, path } => Track {
                id: id.map(|id| match id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }),
                bbox: bbox.map(BoundingBox::from_array).transpose()?,
                path,
            },
        };
        if track.path.is_empty() {
            return Err(Error::EmptyTrack);
        }
        for point in &track.path {
            point.check_projectable()?;
        }
        Ok(track)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text)
    }
}
