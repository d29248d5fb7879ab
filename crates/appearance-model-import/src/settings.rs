use bitflags::bitflags;

bitflags! {
    /// Post-processing steps requested from scene ingest.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PostProcess: u32 {
        const TRIANGULATE = 1 << 0;
        const CALC_TANGENT_SPACE = 1 << 1;
        const JOIN_IDENTICAL_VERTICES = 1 << 2;
        const SORT_BY_PRIMITIVE_TYPE = 1 << 3;
        const GEN_SMOOTH_NORMALS = 1 << 4;
        const PRE_TRANSFORM_VERTICES = 1 << 5;
        const VALIDATE_DATA_STRUCTURE = 1 << 6;
        const FIND_DEGENERATES = 1 << 7;
        const IMPROVE_CACHE_LOCALITY = 1 << 8;
        const FLIP_UVS = 1 << 9;
    }
}

impl PostProcess {
    /// Everything an editor import asks for, without the format specific uv flip.
    pub const IMPORT: Self = Self::TRIANGULATE
        .union(Self::CALC_TANGENT_SPACE)
        .union(Self::JOIN_IDENTICAL_VERTICES)
        .union(Self::SORT_BY_PRIMITIVE_TYPE)
        .union(Self::GEN_SMOOTH_NORMALS)
        .union(Self::PRE_TRANSFORM_VERTICES)
        .union(Self::VALIDATE_DATA_STRUCTURE)
        .union(Self::FIND_DEGENERATES)
        .union(Self::IMPROVE_CACHE_LOCALITY);

    /// glTF already stores uvs with a top-left origin, every other format gets flipped.
    pub fn for_extension(self, extension: &str) -> Self {
        if is_gltf_extension(extension) {
            self
        } else {
            self | Self::FLIP_UVS
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub post_process: PostProcess,
    /// Fill missing albedo/normal slots from textures that follow naming conventions.
    pub auto_assign_textures: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            post_process: PostProcess::IMPORT,
            auto_assign_textures: true,
        }
    }
}

pub(crate) fn is_gltf_extension(extension: &str) -> bool {
    extension.eq_ignore_ascii_case("gltf") || extension.eq_ignore_ascii_case("glb")
}

/// Lower-cased extension of `path`, empty when there is none.
pub(crate) fn extension_of(path: &std::path::Path) -> String {
    path.extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}
