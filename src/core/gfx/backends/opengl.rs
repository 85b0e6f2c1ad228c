// src/core/gfx/backends/opengl.rs
use crate::core::gfx as renderer;
use crate::core::gfx::{ObjectType, RenderList};
use crate::core::space::ortho_for_window;
use cgmath::Matrix4;
use glow::{HasContext, PixelUnpackData, UniformLocation};
use glutin::{
    config::ConfigTemplateBuilder,
    context::{ContextAttributesBuilder, PossiblyCurrentContext},
    display::{Display, DisplayApiPreference},
    prelude::*,
    surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface},
};
use image::RgbaImage;
use log::{info, warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawWindowHandle};
use std::{collections::HashMap, error::Error, ffi::CStr, mem, num::NonZeroU32, sync::Arc};
use winit::window::Window;

// A handle to an OpenGL texture on the GPU.
#[derive(Debug, Clone, Copy)]
pub struct Texture(pub glow::Texture);

pub struct State {
    pub gl: glow::Context,
    gl_surface: Surface<WindowSurface>,
    gl_context: PossiblyCurrentContext,
    program: glow::Program,
    mvp_location: UniformLocation,
    color_location: UniformLocation,
    use_texture_location: UniformLocation,
    projection: Matrix4<f32>,
    window_size: (u32, u32),
    shared_vao: glow::VertexArray,
    shared_vbo: glow::Buffer,
    shared_ibo: glow::Buffer,
    index_count: i32,
}

pub fn init(window: Arc<Window>, vsync_enabled: bool) -> Result<State, Box<dyn Error>> {
    info!("Initializing OpenGL backend...");

    let (gl_surface, gl_context, gl) = create_opengl_context(&window, vsync_enabled)?;
    let (program, mvp_location, color_location, use_texture_location, texture_location) =
        create_graphics_program(&gl)?;

    // One shared unit quad (0..1, top-left origin) reused for every object.
    let (shared_vao, shared_vbo, shared_ibo, index_count) = unsafe {
        const UNIT_QUAD_VERTICES: [[f32; 4]; 4] = [
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 1.0, 0.0],
            [1.0, 1.0, 1.0, 1.0],
            [0.0, 1.0, 0.0, 1.0],
        ];
        const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

        let vao = gl.create_vertex_array()?;
        let vbo = gl.create_buffer()?;
        let ibo = gl.create_buffer()?;

        gl.bind_vertex_array(Some(vao));

        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(&UNIT_QUAD_VERTICES),
            glow::STATIC_DRAW,
        );

        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
        gl.buffer_data_u8_slice(
            glow::ELEMENT_ARRAY_BUFFER,
            bytemuck::cast_slice(&QUAD_INDICES),
            glow::STATIC_DRAW,
        );

        let stride = (4 * mem::size_of::<f32>()) as i32;
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, 0);
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, (2 * mem::size_of::<f32>()) as i32);

        gl.bind_vertex_array(None);

        (vao, vbo, ibo, QUAD_INDICES.len() as i32)
    };

    let initial_size = window.inner_size();
    let projection = ortho_for_window(initial_size.width, initial_size.height);

    unsafe {
        gl.viewport(0, 0, initial_size.width as i32, initial_size.height as i32);
        gl.use_program(Some(program));
        gl.active_texture(glow::TEXTURE0);
        gl.uniform_1_i32(Some(&texture_location), 0);
        gl.use_program(None);
    }

    info!("OpenGL backend initialized successfully.");
    Ok(State {
        gl,
        gl_surface,
        gl_context,
        program,
        mvp_location,
        color_location,
        use_texture_location,
        projection,
        window_size: (initial_size.width, initial_size.height),
        shared_vao,
        shared_vbo,
        shared_ibo,
        index_count,
    })
}

pub fn create_texture(gl: &glow::Context, image: &RgbaImage) -> Result<Texture, String> {
    unsafe {
        let t = gl.create_texture()?;
        gl.bind_texture(glow::TEXTURE_2D, Some(t));

        // no mipmaps are uploaded
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);

        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGBA8 as i32,
            image.width() as i32,
            image.height() as i32,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            PixelUnpackData::Slice(Some(image.as_raw().as_slice())),
        );

        gl.bind_texture(glow::TEXTURE_2D, None);
        Ok(Texture(t))
    }
}

pub fn draw(
    state: &mut State,
    render_list: &RenderList,
    textures: &HashMap<String, renderer::Texture>,
) -> Result<u32, Box<dyn Error>> {
    let (width, height) = state.window_size;
    if width == 0 || height == 0 {
        return Ok(0);
    }

    let mut draw_calls = 0u32;
    unsafe {
        let c = render_list.clear_color;
        state.gl.disable(glow::SCISSOR_TEST);
        state.gl.clear_color(c[0], c[1], c[2], c[3]);
        state.gl.clear(glow::COLOR_BUFFER_BIT);

        state.gl.use_program(Some(state.program));
        state.gl.enable(glow::BLEND);
        state.gl.blend_equation(glow::FUNC_ADD);
        // every object is straight-alpha
        state.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        state.gl.active_texture(glow::TEXTURE0);
        state.gl.bind_vertex_array(Some(state.shared_vao));

        let mut last_bound_tex: Option<glow::Texture> = None;
        let mut last_use_texture: Option<bool> = None;
        let mut last_clip: Option<Option<[f32; 4]>> = None;

        for object in &render_list.objects {
            if last_clip != Some(object.clip) {
                match object.clip {
                    Some([x, y, w, h]) => {
                        // GL scissor is bottom-left based.
                        let gy = height as f32 - (y + h);
                        state.gl.enable(glow::SCISSOR_TEST);
                        state.gl.scissor(
                            x.round() as i32,
                            gy.round() as i32,
                            w.round().max(0.0) as i32,
                            h.round().max(0.0) as i32,
                        );
                    }
                    None => state.gl.disable(glow::SCISSOR_TEST),
                }
                last_clip = Some(object.clip);
            }

            let color = match &object.object_type {
                ObjectType::Solid { color } => {
                    if last_use_texture != Some(false) {
                        state.gl.uniform_1_i32(Some(&state.use_texture_location), 0);
                        last_use_texture = Some(false);
                    }
                    *color
                }
                ObjectType::Sprite { texture_id, tint } => {
                    if !bind_texture_for_object(state, textures, texture_id, &mut last_bound_tex, &mut last_use_texture) {
                        // Not uploaded (yet); skip rather than draw a blank quad.
                        continue;
                    }
                    *tint
                }
            };
            state.gl.uniform_4_f32_slice(Some(&state.color_location), &color);

            let mvp_array: [[f32; 4]; 4] = (state.projection * object.transform).into();
            let mvp_slice: &[f32] = bytemuck::cast_slice(&mvp_array);
            state.gl.uniform_matrix_4_f32_slice(Some(&state.mvp_location), false, mvp_slice);

            state.gl.draw_elements(glow::TRIANGLES, state.index_count, glow::UNSIGNED_SHORT, 0);
            draw_calls += 1;
        }

        state.gl.disable(glow::SCISSOR_TEST);
        state.gl.bind_vertex_array(None);
    }

    state.gl_surface.swap_buffers(&state.gl_context)?;
    Ok(draw_calls)
}

pub fn resize(state: &mut State, width: u32, height: u32) {
    if let (Some(width_nz), Some(height_nz)) = (NonZeroU32::new(width), NonZeroU32::new(height)) {
        state.gl_surface.resize(&state.gl_context, width_nz, height_nz);
        unsafe {
            state.gl.viewport(0, 0, width as i32, height as i32);
        }
        state.projection = ortho_for_window(width, height);
        state.window_size = (width, height);
    } else {
        warn!("Ignoring resize to zero dimensions.");
    }
}

pub fn cleanup(state: &mut State) {
    info!("Cleaning up OpenGL resources...");
    unsafe {
        // Textures are owned by the App and disposed there.
        state.gl.delete_program(state.program);
        state.gl.delete_vertex_array(state.shared_vao);
        state.gl.delete_buffer(state.shared_vbo);
        state.gl.delete_buffer(state.shared_ibo);
    }
}

#[cfg(target_os = "windows")]
fn display_preference(window: RawWindowHandle) -> DisplayApiPreference {
    info!("Using WGL display for OpenGL context.");
    DisplayApiPreference::Wgl(Some(window))
}

#[cfg(target_os = "macos")]
fn display_preference(_window: RawWindowHandle) -> DisplayApiPreference {
    info!("Using CGL display for OpenGL context.");
    DisplayApiPreference::Cgl
}

#[cfg(all(unix, not(target_os = "macos")))]
fn display_preference(_window: RawWindowHandle) -> DisplayApiPreference {
    info!("Using EGL display for OpenGL context.");
    DisplayApiPreference::Egl
}

fn create_opengl_context(
    window: &Window,
    vsync_enabled: bool,
) -> Result<(Surface<WindowSurface>, PossiblyCurrentContext, glow::Context), Box<dyn Error>> {
    let display_handle = window.display_handle()?.as_raw();
    let raw_window_handle = window.window_handle()?.as_raw();

    let display = unsafe { Display::new(display_handle, display_preference(raw_window_handle))? };

    let template = ConfigTemplateBuilder::new()
        .with_alpha_size(8)
        .compatible_with_native_window(raw_window_handle)
        .build();

    let config = unsafe { display.find_configs(template)?.next() }
        .ok_or("Failed to find a suitable GL config")?;

    let (width, height): (u32, u32) = window.inner_size().into();
    let surface_attributes = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        raw_window_handle,
        NonZeroU32::new(width).ok_or("window has zero width")?,
        NonZeroU32::new(height).ok_or("window has zero height")?,
    );
    let surface = unsafe { display.create_window_surface(&config, &surface_attributes)? };

    let context_attributes = ContextAttributesBuilder::new().build(Some(raw_window_handle));
    let context = unsafe { display.create_context(&config, &context_attributes)? }
        .make_current(&surface)?;

    let interval = if vsync_enabled {
        SwapInterval::Wait(NonZeroU32::MIN)
    } else {
        SwapInterval::DontWait
    };
    match surface.set_swap_interval(&context, interval) {
        Ok(()) => info!("VSync {}.", if vsync_enabled { "on" } else { "off" }),
        Err(e) => warn!("Could not set swap interval ({}); VSync state may not be as requested.", e),
    }

    let gl = unsafe { glow::Context::from_loader_function_cstr(|s: &CStr| display.get_proc_address(s)) };
    Ok((surface, context, gl))
}

fn create_graphics_program(
    gl: &glow::Context,
) -> Result<
    (
        glow::Program,
        UniformLocation, // u_model_view_proj
        UniformLocation, // u_color
        UniformLocation, // u_use_texture
        UniformLocation, // u_texture
    ),
    String,
> {
    unsafe {
        let program = gl.create_program()?;
        let shader_sources = [
            (glow::VERTEX_SHADER,   include_str!("../shaders/quad.vert")),
            (glow::FRAGMENT_SHADER, include_str!("../shaders/quad.frag")),
        ];

        let mut shaders = Vec::with_capacity(shader_sources.len());
        for (shader_type, shader_source) in shader_sources.iter() {
            let shader = gl.create_shader(*shader_type)?;
            gl.shader_source(shader, shader_source);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                return Err(gl.get_shader_info_log(shader));
            }
            gl.attach_shader(program, shader);
            shaders.push(shader);
        }

        gl.link_program(program);
        if !gl.get_program_link_status(program) {
            return Err(gl.get_program_info_log(program));
        }
        for shader in shaders {
            gl.detach_shader(program, shader);
            gl.delete_shader(shader);
        }

        let mvp_location         = gl.get_uniform_location(program, "u_model_view_proj").ok_or("u_model_view_proj")?;
        let color_location       = gl.get_uniform_location(program, "u_color").ok_or("u_color")?;
        let use_texture_location = gl.get_uniform_location(program, "u_use_texture").ok_or("u_use_texture")?;
        let texture_location     = gl.get_uniform_location(program, "u_texture").ok_or("u_texture")?;

        Ok((program, mvp_location, color_location, use_texture_location, texture_location))
    }
}

/// Binds the object's texture if needed. Returns false if it is not uploaded.
unsafe fn bind_texture_for_object(
    state: &State,
    textures: &HashMap<String, renderer::Texture>,
    texture_id: &str,
    last_bound_tex: &mut Option<glow::Texture>,
    last_use_texture: &mut Option<bool>,
) -> bool {
    let Some(renderer::Texture::OpenGL(gl_texture)) = textures.get(texture_id) else {
        return false;
    };
    unsafe {
        if *last_use_texture != Some(true) {
            state.gl.uniform_1_i32(Some(&state.use_texture_location), 1);
            *last_use_texture = Some(true);
        }
        if *last_bound_tex != Some(gl_texture.0) {
            state.gl.bind_texture(glow::TEXTURE_2D, Some(gl_texture.0));
            *last_bound_tex = Some(gl_texture.0);
        }
    }
    true
}

mod bytemuck {
    // Only used for f32/u16 -> u8 views, where alignment always holds.
    #[inline(always)]
    pub fn cast_slice<T, U>(slice: &[T]) -> &[U] {
        let (prefix, mid, suffix) = unsafe { slice.align_to::<U>() };
        debug_assert!(
            prefix.is_empty() && suffix.is_empty(),
            "cast_slice: misaligned cast"
        );
        mid
    }
}
