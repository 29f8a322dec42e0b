use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to download tile {z}/{x}/{y}: {source}")]
    Network {
        z: u8,
        x: i32,
        y: i32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to download tile {z}/{x}/{y}: HTTP {status}")]
    BadStatus { z: u8, x: i32, y: i32, status: u16 },

    #[error("Cannot project ({lon}, {lat}): coordinate is degenerate in Web Mercator")]
    ProjectionDegenerate { lon: f64, lat: f64 },

    #[error("Tile {z}/{x}/{y} is missing from the tile directory")]
    MissingTile { z: u8, x: i32, y: i32 },

    #[error("Invalid bounding box: {0}")]
    DegenerateBBox(String),

    #[error("Track contains no points")]
    EmptyTrack,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{failed} of {total} tiles failed to download")]
    FetchFailed { failed: usize, total: usize },

    #[error("Image error for {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to start fetch workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// Whether trying the same request again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::BadStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Error::Image { path: path.into(), source }
    }
}
