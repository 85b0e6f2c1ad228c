mod backends;

use crate::core::gfx::backends::opengl;
use cgmath::Matrix4;
use glow::HasContext;
use image::RgbaImage;
use std::{collections::HashMap, error::Error, sync::Arc};
use winit::window::Window;

// --- Public Data Contract ---
#[derive(Clone)]
pub struct RenderList {
    pub clear_color: [f32; 4],
    pub objects: Vec<RenderObject>,
}
#[derive(Clone)]
pub struct RenderObject {
    pub object_type: ObjectType,
    pub transform: Matrix4<f32>,
    /// Window-pixel rectangle `[x, y, w, h]` (top-left origin) to scissor to.
    pub clip: Option<[f32; 4]>,
    pub z: i16,
    pub order: u32,
}
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectType {
    Sprite {
        texture_id: String,
        tint: [f32; 4],
    },
    Solid {
        color: [f32; 4],
    },
}

// --- Public API Facade ---

pub enum Texture {
    OpenGL(opengl::Texture),
}

// Backend is an enum, not a trait object.
pub enum Backend {
    OpenGL(opengl::State),
}

impl Backend {
    /// Draws the list and presents. Returns the number of draw calls issued.
    pub fn draw(
        &mut self,
        render_list: &RenderList,
        textures: &HashMap<String, Texture>,
    ) -> Result<u32, Box<dyn Error>> {
        match self {
            Backend::OpenGL(state) => opengl::draw(state, render_list, textures),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        match self {
            Backend::OpenGL(state) => opengl::resize(state, width, height),
        }
    }

    pub fn cleanup(&mut self) {
        match self {
            Backend::OpenGL(state) => opengl::cleanup(state),
        }
    }

    pub fn create_texture(&mut self, image: &RgbaImage) -> Result<Texture, Box<dyn Error>> {
        match self {
            Backend::OpenGL(state) => {
                let tex = opengl::create_texture(&state.gl, image)?;
                Ok(Texture::OpenGL(tex))
            }
        }
    }

    pub fn dispose_textures(&mut self, textures: &mut HashMap<String, Texture>) {
        let old_textures = std::mem::take(textures);
        match self {
            Backend::OpenGL(state) => unsafe {
                for tex in old_textures.values() {
                    let Texture::OpenGL(opengl::Texture(handle)) = tex;
                    state.gl.delete_texture(*handle);
                }
            },
        }
    }
}

/// Creates and initializes the OpenGL backend for `window`.
pub fn create_backend(window: Arc<Window>, vsync_enabled: bool) -> Result<Backend, Box<dyn Error>> {
    Ok(Backend::OpenGL(opengl::init(window, vsync_enabled)?))
}
