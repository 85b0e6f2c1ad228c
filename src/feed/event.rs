// src/feed/event.rs
//! Inbound feed events and their wire decoding.
//!
//! Two framings reach this module: plain JSON envelopes
//! (`{"event": "...", "data": ...}`) and Socket.IO event arrays
//! (`["name", payload]`, already stripped of the Engine.IO prefix by the
//! transport). Both funnel into [`FeedEvent::from_named`].
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type BundleId = String;

/// Number of items that make up one complete bundle.
pub const BUNDLE_SIZE: usize = 8;

/// A 1-indexed item position inside a bundle (1..=8).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(u8);

impl Slot {
    pub fn new(n: u8) -> Option<Self> {
        if (1..=BUNDLE_SIZE as u8).contains(&n) { Some(Slot(n)) } else { None }
    }

    #[inline(always)]
    pub fn get(self) -> u8 { self.0 }

    /// Zero-based index, handy for fixed arrays.
    #[inline(always)]
    pub fn index(self) -> usize { (self.0 - 1) as usize }

    pub fn all() -> impl Iterator<Item = Slot> {
        (1..=BUNDLE_SIZE as u8).map(Slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let n: u8 = trimmed
            .parse()
            .map_err(|_| format!("slot '{}' is not a number", trimmed))?;
        Slot::new(n).ok_or_else(|| format!("slot '{}' is outside 1..={}", trimmed, BUNDLE_SIZE))
    }
}

/// Per-item verdict produced by the decider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "accept" => Ok(Verdict::Accept),
            "no" | "reject" => Ok(Verdict::Reject),
            other => Err(format!("'{}' is not a verdict", other)),
        }
    }
}

/// Outcome shown on the investigation overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayVerdict {
    Pass,
    Buy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mark {
    pub slot: Slot,
    pub verdict: Verdict,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FeedEvent {
    /// An empty id is carried through so the assembler can reject it.
    BeginBundle { bundle_id: BundleId },
    AddItem { bundle_id: BundleId, slot: Slot, url: String },
    OverlayMarks { bundle_id: Option<BundleId>, marks: Vec<Mark> },
    Verdict(OverlayVerdict),
    StartInvestigation { image_url: String },
    StopInvestigation,
    UpdateBalance { net_balance: f64 },
    /// Legacy grid fade signal; the scrolling feed has no use for it.
    FadeOut,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
    #[error("malformed '{event}' payload: {reason}")]
    Malformed { event: &'static str, reason: String },
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

fn malformed(event: &'static str, reason: impl Into<String>) -> EventError {
    EventError::Malformed { event, reason: reason.into() }
}

/* -------------------------- payload shapes -------------------------- */

#[derive(Deserialize)]
#[serde(untagged)]
enum SlotRepr {
    Text(String),
    Number(u64),
}

impl SlotRepr {
    fn to_slot(&self) -> Result<Slot, String> {
        match self {
            SlotRepr::Text(s) => s.parse(),
            SlotRepr::Number(n) => u8::try_from(*n)
                .ok()
                .and_then(Slot::new)
                .ok_or_else(|| format!("slot {} is outside 1..={}", n, BUNDLE_SIZE)),
        }
    }
}

#[derive(Deserialize)]
struct BeginBundlePayload {
    #[serde(default)]
    bundle_id: Option<String>,
}

#[derive(Deserialize)]
struct AddItemPayload {
    #[serde(default)]
    bundle_id: Option<String>,
    #[serde(default, alias = "id")]
    slot: Option<SlotRepr>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct MarkPayload {
    #[serde(default, alias = "id")]
    slot: Option<SlotRepr>,
    #[serde(default, alias = "decision")]
    verdict: Option<String>,
}

#[derive(Deserialize)]
struct MarksEnvelope {
    #[serde(default)]
    bundle_id: Option<String>,
    #[serde(default)]
    marks: Vec<MarkPayload>,
}

#[derive(Deserialize)]
struct InvestigationPayload {
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Deserialize)]
struct BalancePayload {
    #[serde(default, alias = "netbalance")]
    net_balance: Option<f64>,
}

#[derive(Deserialize)]
struct JsonEnvelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/* ------------------------------ decoding ------------------------------ */

impl FeedEvent {
    /// Decodes one event from its name and JSON payload. Accepts both the
    /// canonical names and the legacy server names (`clear_canvas`,
    /// `add_coin`, `bought_coin`, ...).
    pub fn from_named(name: &str, data: Value) -> Result<Self, EventError> {
        let canonical = name.trim().to_ascii_lowercase().replace('-', "_");
        match canonical.as_str() {
            "begin_bundle" | "clear_canvas" => {
                let p: BeginBundlePayload = from_value_or_default(data)?;
                Ok(FeedEvent::BeginBundle { bundle_id: p.bundle_id.unwrap_or_default() })
            }
            "add_item" | "add_coin" => {
                const EV: &str = "add-item";
                let p: AddItemPayload = serde_json::from_value(data)?;
                let bundle_id = non_empty(p.bundle_id).ok_or_else(|| malformed(EV, "missing bundle_id"))?;
                let slot = p
                    .slot
                    .ok_or_else(|| malformed(EV, "missing slot"))?
                    .to_slot()
                    .map_err(|e| malformed(EV, e))?;
                let url = non_empty(p.url).ok_or_else(|| malformed(EV, "missing url"))?;
                Ok(FeedEvent::AddItem { bundle_id, slot, url })
            }
            "overlay_marks" => decode_marks(data),
            "disqualified_item" | "disqualified_coin" => Ok(FeedEvent::Verdict(OverlayVerdict::Pass)),
            "bought_item" | "bought_coin" => Ok(FeedEvent::Verdict(OverlayVerdict::Buy)),
            "start_investigation" => {
                let p: InvestigationPayload = serde_json::from_value(data)?;
                let image_url = non_empty(p.image_url)
                    .ok_or_else(|| malformed("start-investigation", "missing image_url"))?;
                Ok(FeedEvent::StartInvestigation { image_url })
            }
            "stop_investigation" => Ok(FeedEvent::StopInvestigation),
            "update_balance" | "update_balance_bar" => {
                let p: BalancePayload = serde_json::from_value(data)?;
                let net_balance = p
                    .net_balance
                    .ok_or_else(|| malformed("update-balance", "missing net_balance"))?;
                Ok(FeedEvent::UpdateBalance { net_balance })
            }
            "fade_out" => Ok(FeedEvent::FadeOut),
            _ => Err(EventError::UnknownEvent(name.to_string())),
        }
    }

    /// `{"event": "add_coin", "data": {...}}`
    pub fn from_json_frame(text: &str) -> Result<Self, EventError> {
        let env: JsonEnvelope = serde_json::from_str(text)?;
        Self::from_named(&env.event, env.data)
    }

    /// `["add_coin", {...}]` as carried inside a Socket.IO event packet.
    pub fn from_socketio_args(text: &str) -> Result<Self, EventError> {
        let args: Vec<Value> = serde_json::from_str(text)?;
        let mut it = args.into_iter();
        let name = match it.next() {
            Some(Value::String(s)) => s,
            _ => return Err(malformed("socket.io", "first argument must be the event name")),
        };
        Self::from_named(&name, it.next().unwrap_or(Value::Null))
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeedEvent::BeginBundle { .. } => "begin-bundle",
            FeedEvent::AddItem { .. } => "add-item",
            FeedEvent::OverlayMarks { .. } => "overlay-marks",
            FeedEvent::Verdict(OverlayVerdict::Pass) => "disqualified-item",
            FeedEvent::Verdict(OverlayVerdict::Buy) => "bought-item",
            FeedEvent::StartInvestigation { .. } => "start-investigation",
            FeedEvent::StopInvestigation => "stop-investigation",
            FeedEvent::UpdateBalance { .. } => "update-balance",
            FeedEvent::FadeOut => "fade-out",
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

fn from_value_or_default<T: for<'de> Deserialize<'de>>(data: Value) -> Result<T, EventError> {
    let data = if data.is_null() { Value::Object(Default::default()) } else { data };
    Ok(serde_json::from_value(data)?)
}

fn decode_marks(data: Value) -> Result<FeedEvent, EventError> {
    const EV: &str = "overlay-marks";
    let (bundle_id, raw) = match data {
        Value::Array(_) => (None, serde_json::from_value::<Vec<MarkPayload>>(data)?),
        Value::Object(_) => {
            let env: MarksEnvelope = serde_json::from_value(data)?;
            (non_empty(env.bundle_id), env.marks)
        }
        _ => return Err(malformed(EV, "expected an array of marks")),
    };

    let mut marks = Vec::with_capacity(raw.len());
    for entry in raw {
        let slot = match entry.slot.as_ref().map(SlotRepr::to_slot) {
            Some(Ok(slot)) => slot,
            Some(Err(e)) => { log::warn!("Skipping overlay mark: {}", e); continue; }
            None => { log::warn!("Skipping overlay mark without a slot."); continue; }
        };
        match entry.verdict.as_deref().map(str::parse::<Verdict>) {
            Some(Ok(verdict)) => marks.push(Mark { slot, verdict }),
            Some(Err(e)) => log::warn!("Skipping overlay mark for slot {}: {}", slot, e),
            None => log::warn!("Skipping overlay mark for slot {} without a verdict.", slot),
        }
    }
    Ok(FeedEvent::OverlayMarks { bundle_id, marks })
}
