//! Model import: turns FBX, OBJ, glTF/GLB and DAE files into mesh and material assets.

pub mod error;
pub mod ingest;
pub mod material_extractor;
pub mod mesh_converter;
pub mod pipeline;
pub mod settings;
pub mod transparency;

pub use error::ImportError;
pub use ingest::{DefaultSceneIngest, SceneIngest};
pub use pipeline::{ImportPipeline, ImportReport, ImportRequest, ImportStage};
pub use settings::{ImportSettings, PostProcess};
