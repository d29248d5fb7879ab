use std::path::PathBuf;

/// Failures of a single import run.
///
/// Everything except [`ImportError::InvalidMeshReference`] aborts the whole import,
/// a re-import is the only way to recover.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Source file {0} does not exist")]
    MissingSource(PathBuf),

    #[error("Source file {0} is empty")]
    EmptySource(PathBuf),

    #[error("Failed to ingest {path}: {source:#}")]
    Ingest {
        path: PathBuf,
        source: anyhow::Error,
    },

    #[error("Ingest returned no scene for {0}")]
    EmptyScene(PathBuf),

    #[error("Scene {0} contains no meshes")]
    NoMeshes(PathBuf),

    #[error("Mesh {mesh} has no vertices or faces")]
    EmptyGeometry { mesh: String },

    #[error("Mesh {mesh} has no valid triangles ({skipped} face(s) skipped)")]
    NoValidTriangles { mesh: String, skipped: usize },

    #[error(
        "Mesh {mesh} has mismatching attribute counts ({positions} positions, {normals} normals, {tex_coords} uvs)"
    )]
    AttributeCountMismatch {
        mesh: String,
        positions: usize,
        normals: usize,
        tex_coords: usize,
    },

    #[error("Node {node} references mesh {index} which does not exist")]
    InvalidMeshReference { node: String, index: u32 },

    #[error("Texture extraction failed: {0:#}")]
    TextureExtraction(anyhow::Error),

    #[error("Asset database error: {0:#}")]
    Database(anyhow::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization failed: {0:#}")]
    Serialize(anyhow::Error),
}

impl ImportError {
    /// Whether the failing unit can be skipped while the import continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidMeshReference { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
