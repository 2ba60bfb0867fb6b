/// What the host GPU offers, reduced to the facts the compute graph needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuCapabilities {
    /// Rgba32Float can be both rendered to and sampled.
    pub float_render_targets: bool,
    /// Sampled textures available to the vertex stage.
    pub max_vertex_textures: u32,
    pub max_texture_size: u32,
}

impl GpuCapabilities {
    pub fn check(&self, width: u32, vertex_textures_needed: u32) -> Result<(), String> {
        if !self.float_render_targets {
            return Err("floating-point render targets are not supported".into());
        }
        if self.max_vertex_textures < vertex_textures_needed {
            return Err(format!(
                "vertex-stage texture sampling unavailable ({} units, need {})",
                self.max_vertex_textures, vertex_textures_needed
            ));
        }
        if width == 0 || width > self.max_texture_size {
            return Err(format!(
                "grid width {} exceeds max texture size {}",
                width, self.max_texture_size
            ));
        }
        Ok(())
    }
}
