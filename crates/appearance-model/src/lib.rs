use glam::Mat4;
use material::SceneMaterial;
use mesh::SceneMesh;

pub mod asset;
pub mod bounds;
pub mod material;
pub mod mesh;

pub use bounds::Aabb;
pub use material::{MaterialAsset, MaterialInfo, TextureChannel, TransparencyMode};
pub use mesh::{MeshAsset, SubMesh};

/// Node of an ingested scene graph. Children and meshes index into [`Scene`].
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,

    pub transform: Mat4,
    pub children: Vec<u32>,

    pub meshes: Vec<u32>,
}

impl SceneNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            transform: Mat4::IDENTITY,
            children: vec![],
            meshes: vec![],
        }
    }
}

/// Texture bytes stored inside the model file itself, referenced as `*{index}`.
#[derive(Debug, Clone)]
pub struct EmbeddedTexture {
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Parsed and post-processed model, as handed over by scene ingest.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub root_nodes: Vec<u32>,
    pub nodes: Vec<SceneNode>,
    pub meshes: Vec<SceneMesh>,
    pub materials: Vec<SceneMaterial>,
    pub embedded_textures: Vec<EmbeddedTexture>,
}

impl Scene {
    pub fn has_meshes(&self) -> bool {
        !self.meshes.is_empty()
    }

    /// Resolves an embedded texture reference such as `*2`.
    pub fn embedded_texture(&self, reference: &str) -> Option<&EmbeddedTexture> {
        let index = reference.strip_prefix('*')?.parse::<usize>().ok()?;
        self.embedded_textures.get(index)
    }
}
