// src/config.rs
use crate::feed::SessionSettings;
use crate::feed::balance::BalanceLayout;
use crate::feed::engine::{FeedLayout, VerdictIcons};
use crate::feed::overlay::OverlayLayout;
use crate::feed::scheduler::PromotionOrder;
use configparser::ini::Ini;
use log::{info, warn};
use once_cell::sync::Lazy;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

pub const WINDOW_TITLE: &str = "bundlefeed";
const CONFIG_PATH: &str = "bundlefeed.ini";

/// Item cell size in pixels; fixed by the producers' screenshot format.
pub const ITEM_WIDTH: f32 = 256.0;
pub const ITEM_HEIGHT: f32 = 128.0;

/// Framing used on the websocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Engine.IO v4 packets carrying Socket.IO events.
    SocketIo,
    /// One `{"event": .., "data": ..}` object per text frame.
    Json,
}

impl FromStr for Protocol {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "socketio" | "socket.io" => Ok(Protocol::SocketIo),
            "json" => Ok(Protocol::Json),
            _ => Err(format!("'{}' is not a valid transport protocol", s)),
        }
    }
}

impl core::fmt::Display for Protocol {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SocketIo => write!(f, "socketio"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // [Display]
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub windowed: bool,
    pub show_stats: bool,
    // [Transport]
    pub transport_url: String,
    pub protocol: Protocol,
    pub reconnect_seconds: u64,
    // [Assets]
    pub base_url: String,
    pub load_timeout_ms: u64,
    pub loader_threads: usize,
    pub accept_icon: String,
    pub reject_icon: String,
    // [Feed]
    pub feed: FeedLayout,
    pub promotion_order: PromotionOrder,
    // [Overlay]
    pub overlay: OverlayLayout,
    // [Balance]
    pub balance: BalanceLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: 768,
            height: 720,
            vsync: true,
            windowed: true,
            show_stats: true,
            transport_url: "ws://127.0.0.1:5000/socket.io/?EIO=4&transport=websocket".to_string(),
            protocol: Protocol::SocketIo,
            reconnect_seconds: 3,
            base_url: "http://127.0.0.1:5000/".to_string(),
            load_timeout_ms: 10_000,
            loader_threads: 4,
            accept_icon: String::new(),
            reject_icon: String::new(),
            feed: FeedLayout::default(),
            promotion_order: PromotionOrder::default(),
            overlay: OverlayLayout::default(),
            balance: BalanceLayout::default(),
        }
    }
}

impl Config {
    pub fn session_settings(&self) -> SessionSettings {
        let icon = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());
        SessionSettings {
            feed: self.feed,
            overlay: self.overlay,
            balance: self.balance,
            order: self.promotion_order,
            icons: VerdictIcons { accept: icon(&self.accept_icon), reject: icon(&self.reject_icon) },
            shake_seed: None,
        }
    }

    fn to_ini(&self) -> Ini {
        let flag = |b: bool| Some(if b { "1" } else { "0" }.to_string());
        let mut conf = Ini::new();
        conf.set("Display", "Width", Some(self.width.to_string()));
        conf.set("Display", "Height", Some(self.height.to_string()));
        conf.set("Display", "VSync", flag(self.vsync));
        conf.set("Display", "Windowed", flag(self.windowed));
        conf.set("Display", "ShowStats", flag(self.show_stats));

        conf.set("Transport", "Url", Some(self.transport_url.clone()));
        conf.set("Transport", "Protocol", Some(self.protocol.to_string()));
        conf.set("Transport", "ReconnectSeconds", Some(self.reconnect_seconds.to_string()));

        conf.set("Assets", "BaseUrl", Some(self.base_url.clone()));
        conf.set("Assets", "LoadTimeoutMs", Some(self.load_timeout_ms.to_string()));
        conf.set("Assets", "LoaderThreads", Some(self.loader_threads.to_string()));
        conf.set("Assets", "AcceptIcon", Some(self.accept_icon.clone()));
        conf.set("Assets", "RejectIcon", Some(self.reject_icon.clone()));

        let f = &self.feed;
        conf.set("Feed", "Width", Some(f.width.to_string()));
        conf.set("Feed", "Height", Some(f.height.to_string()));
        conf.set("Feed", "Speed", Some(f.speed.to_string()));
        conf.set("Feed", "Spacing", Some(f.spacing.to_string()));
        conf.set("Feed", "MarkingLineOffset", Some(f.marking_offset.to_string()));
        conf.set("Feed", "StrobeDuration", Some(f.strobe_duration.to_string()));
        conf.set("Feed", "StrobeFrequency", Some(f.strobe_frequency.to_string()));
        let order = match self.promotion_order {
            PromotionOrder::Queue => "queue",
            PromotionOrder::Readiness => "readiness",
        };
        conf.set("Feed", "PromotionOrder", Some(order.to_string()));

        let o = &self.overlay;
        conf.set("Overlay", "Width", Some(o.width.to_string()));
        conf.set("Overlay", "Height", Some(o.height.to_string()));
        conf.set("Overlay", "FadeIn", Some(o.fade_in.to_string()));
        conf.set("Overlay", "Hold", Some(o.hold.to_string()));
        conf.set("Overlay", "FadeOut", Some(o.fade_out.to_string()));
        conf.set("Overlay", "ShakeDuration", Some(o.shake_duration.to_string()));
        conf.set("Overlay", "ShakeAmplitude", Some(o.shake_amplitude.to_string()));

        let b = &self.balance;
        conf.set("Balance", "Width", Some(b.width.to_string()));
        conf.set("Balance", "Height", Some(b.height.to_string()));
        conf.set("Balance", "FullScale", Some(b.full_scale.to_string()));
        conf
    }

    fn from_ini(conf: &Ini) -> Self {
        let d = Config::default();
        let protocol = match conf.get("Transport", "Protocol") {
            Some(v) => v.parse().unwrap_or_else(|e| {
                warn!("{}; using {}.", e, d.protocol);
                d.protocol
            }),
            None => d.protocol,
        };
        let feed = FeedLayout {
            width: read(conf, "Feed", "Width", d.feed.width),
            height: read(conf, "Feed", "Height", d.feed.height),
            item_w: ITEM_WIDTH,
            item_h: ITEM_HEIGHT,
            spacing: read(conf, "Feed", "Spacing", d.feed.spacing),
            speed: read(conf, "Feed", "Speed", d.feed.speed),
            marking_offset: read(conf, "Feed", "MarkingLineOffset", d.feed.marking_offset),
            strobe_duration: read(conf, "Feed", "StrobeDuration", d.feed.strobe_duration),
            strobe_frequency: read(conf, "Feed", "StrobeFrequency", d.feed.strobe_frequency),
        };
        let overlay = OverlayLayout {
            width: read(conf, "Overlay", "Width", d.overlay.width),
            height: read(conf, "Overlay", "Height", d.overlay.height),
            fade_in: read(conf, "Overlay", "FadeIn", d.overlay.fade_in),
            hold: read(conf, "Overlay", "Hold", d.overlay.hold),
            fade_out: read(conf, "Overlay", "FadeOut", d.overlay.fade_out),
            shake_duration: read(conf, "Overlay", "ShakeDuration", d.overlay.shake_duration),
            shake_amplitude: read(conf, "Overlay", "ShakeAmplitude", d.overlay.shake_amplitude),
        };
        let balance = BalanceLayout {
            width: read(conf, "Balance", "Width", d.balance.width),
            height: read(conf, "Balance", "Height", d.balance.height),
            full_scale: read(conf, "Balance", "FullScale", d.balance.full_scale),
        };
        Self {
            width: read(conf, "Display", "Width", d.width),
            height: read(conf, "Display", "Height", d.height),
            vsync: read_flag(conf, "Display", "VSync", d.vsync),
            windowed: read_flag(conf, "Display", "Windowed", d.windowed),
            show_stats: read_flag(conf, "Display", "ShowStats", d.show_stats),
            transport_url: conf.get("Transport", "Url").unwrap_or(d.transport_url),
            protocol,
            reconnect_seconds: read(conf, "Transport", "ReconnectSeconds", d.reconnect_seconds),
            base_url: conf.get("Assets", "BaseUrl").unwrap_or(d.base_url),
            load_timeout_ms: read(conf, "Assets", "LoadTimeoutMs", d.load_timeout_ms),
            loader_threads: read(conf, "Assets", "LoaderThreads", d.loader_threads).max(1),
            accept_icon: conf.get("Assets", "AcceptIcon").unwrap_or_default(),
            reject_icon: conf.get("Assets", "RejectIcon").unwrap_or_default(),
            feed,
            promotion_order: conf
                .get("Feed", "PromotionOrder")
                .map_or(d.promotion_order, |v| PromotionOrder::from_str_lossy(&v)),
            overlay,
            balance,
        }
    }
}

fn read<T: FromStr + Copy + core::fmt::Display>(conf: &Ini, section: &str, key: &str, default: T) -> T {
    match conf.get(section, key) {
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!("[{}] {}='{}' is invalid; using {}.", section, key, v, default);
            default
        }),
        None => default,
    }
}

fn read_flag(conf: &Ini, section: &str, key: &str, default: bool) -> bool {
    conf.get(section, key)
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map_or(default, |v| v != 0)
}

static CONFIG: Lazy<Mutex<Config>> = Lazy::new(|| Mutex::new(Config::default()));

fn create_default_file() -> Result<(), std::io::Error> {
    info!("'{}' not found, creating it with defaults.", CONFIG_PATH);
    Config::default().to_ini().write(CONFIG_PATH)
}

pub fn load() {
    if !Path::new(CONFIG_PATH).exists() {
        if let Err(e) = create_default_file() {
            warn!("Failed to create default config file: {}", e);
        }
    }

    let mut conf = Ini::new();
    let loaded = match conf.load(CONFIG_PATH) {
        Ok(_) => Config::from_ini(&conf),
        Err(e) => {
            warn!("Failed to load '{}' ({}), using defaults.", CONFIG_PATH, e);
            Config::default()
        }
    };
    info!(
        "Config: {}x{}, transport {} ({}), {} loader thread(s).",
        loaded.width, loaded.height, loaded.transport_url, loaded.protocol, loaded.loader_threads
    );
    *CONFIG.lock().unwrap_or_else(|p| p.into_inner()) = loaded;
}

/// Returns a copy of the currently loaded configuration.
pub fn get() -> Config {
    CONFIG.lock().unwrap_or_else(|p| p.into_inner()).clone()
}
