use crate::config::{self, Config, WINDOW_TITLE};
use crate::core::assets::{self, TextureStore};
use crate::core::gfx::{self as renderer, create_backend};
use crate::core::images::{ImageLoader, LoaderSettings};
use crate::core::space::{self, Rect, SurfaceLayout};
use crate::core::transport::{self, TransportSettings};
use crate::feed::event::FeedEvent;
use crate::feed::{Session, SessionSettings};
use crate::ui::actors::{self, Actor};
use crate::ui::color::rgba_hex;
use crate::utils::fps::FpsCounter;
use crossbeam_channel::Receiver;
use log::{error, info, warn};
use std::{error::Error, sync::Arc, time::{Duration, Instant}};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

const CLEAR: [f32; 4] = rgba_hex("#080808");
const FEED_BG: [f32; 4] = rgba_hex("#101519");
const OVERLAY_BG: [f32; 4] = rgba_hex("#0c0c0c");
const BALANCE_BG: [f32; 4] = rgba_hex("#000000");

pub struct App {
    window: Option<Arc<Window>>,
    backend: Option<renderer::Backend>,
    textures: TextureStore,
    session: Session,
    layout: SurfaceLayout,
    events: Receiver<FeedEvent>,
    loader: ImageLoader,
    fps: FpsCounter,
    start_time: Instant,
    config: Config,
}

impl App {
    fn new(config: Config, settings: SessionSettings, events: Receiver<FeedEvent>, loader: ImageLoader) -> Self {
        let layout = space::surface_layout(
            (settings.feed.width, settings.feed.height),
            (settings.overlay.width, settings.overlay.height),
            (settings.balance.width, settings.balance.height),
        );
        Self {
            window: None,
            backend: None,
            textures: TextureStore::new(),
            session: Session::new(settings),
            layout,
            events,
            loader,
            fps: FpsCounter::new(),
            start_time: Instant::now(),
            config,
        }
    }

    fn init_graphics(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Box<dyn Error>> {
        let (min_w, min_h) = self.layout.window_size();
        let window_width = self.config.width.max(min_w);
        let window_height = self.config.height.max(min_h);

        let mut window_attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_resizable(true);
        if self.config.windowed {
            window_attributes = window_attributes.with_inner_size(PhysicalSize::new(window_width, window_height));
        } else {
            window_attributes = window_attributes.with_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
        }

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let backend = create_backend(window.clone(), self.config.vsync)?;

        self.window = Some(window);
        self.backend = Some(backend);
        info!("Starting event loop...");
        Ok(())
    }

    /// Applies everything the worker threads produced since the last frame.
    fn drain_inputs(&mut self, now: f32) {
        for event in self.events.try_iter() {
            self.session.handle_event(event, now);
        }

        for (url, result) in self.loader.completed() {
            let ok = match (result, self.backend.as_mut()) {
                (Ok(image), Some(backend)) => match self.textures.insert(backend, &url, &image) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Failed to upload '{}': {}", url, e);
                        false
                    }
                },
                (Ok(_), None) => {
                    warn!("Image '{}' arrived with no graphics backend.", url);
                    false
                }
                (Err(e), _) => {
                    warn!("Failed to load '{}': {}", url, e);
                    false
                }
            };
            self.session.on_image_settled(&url, ok);
        }
    }

    fn current_actors(&self) -> Vec<Actor> {
        let SurfaceLayout { feed, overlay, balance } = self.layout;
        vec![
            actors::surface(feed.x, feed.y, feed.w, feed.h, FEED_BG, self.session.feed_actors()),
            actors::surface(
                overlay.x, overlay.y, overlay.w, overlay.h, OVERLAY_BG,
                self.session.overlay_actors(assets::texture_size),
            ),
            actors::surface(balance.x, balance.y, balance.w, balance.h, BALANCE_BG, self.session.balance_actors()),
        ]
    }

    fn redraw(&mut self, window: &Window, event_loop: &ActiveEventLoop) {
        let now = self.start_time.elapsed().as_secs_f32();
        self.drain_inputs(now);
        self.session.tick(now);
        for url in self.session.take_load_requests() {
            self.loader.request(url);
        }

        let root = Rect { x: 0.0, y: 0.0, w: space::screen_width(), h: space::screen_height() };
        let screen = crate::ui::compose::build_screen(&self.current_actors(), CLEAR, root);

        if let Some(backend) = &mut self.backend {
            if let Err(e) = backend.draw(&screen, &self.textures.textures) {
                error!("Failed to draw frame: {}", e);
                event_loop.exit();
                return;
            }
        }

        if let Some(fps) = self.fps.update() {
            if self.config.show_stats {
                window.set_title(&format!(
                    "{} | {} FPS | {:?}",
                    WINDOW_TITLE, fps, transport::get_status()
                ));
            }
            info!("{} | Textures: {}", self.session.status(), self.textures.len());
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init_graphics(event_loop) {
                error!("Failed to initialize graphics: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref().cloned() else { return; };
        if window_id != window.id() { return; }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested. Shutting down.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    if let Some(backend) = &mut self.backend {
                        backend.resize(new_size.width, new_size.height);
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(&window, event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(backend) = &mut self.backend {
            backend.dispose_textures(&mut self.textures.textures);
            backend.cleanup();
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let config = config::get();
    let settings = config.session_settings();

    let (tx, rx) = crossbeam_channel::unbounded();
    transport::spawn(
        TransportSettings {
            url: config.transport_url.clone(),
            protocol: config.protocol,
            reconnect_delay: Duration::from_secs(config.reconnect_seconds.max(1)),
        },
        tx,
    )?;
    let loader = ImageLoader::spawn(LoaderSettings {
        base_url: config.base_url.clone(),
        timeout: Duration::from_millis(config.load_timeout_ms.max(1)),
        threads: config.loader_threads,
    })?;

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, settings, rx, loader);
    event_loop.run_app(&mut app)?;
    Ok(())
}
