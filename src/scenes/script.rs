//! Scroll scripts: timed page input for headless replay.
//!
//! JSON form:
//! ```json
//! { "tick_ms": 16,
//!   "events": [
//!     { "at_ms": 0,   "type": "scroll", "y": 1200 },
//!     { "at_ms": 400, "type": "resize", "viewport_height": 800 },
//!     { "at_ms": 900, "type": "idle" }
//!   ] }
//! ```
//! `idle` does nothing by itself; it extends the run so timers can fire.

use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::stage::Stage;

const DEFAULT_TICK_MS: u64 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PageAction {
    Scroll { y: f64 },
    Resize { viewport_height: f64 },
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: PageAction,
}

#[derive(Debug)]
pub enum ScriptError {
    Io(String),
    Parse(String),
    /// Event timestamps must not decrease
    Unordered { index: usize },
    ZeroTick,
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::Io(e) => write!(f, "IO error: {}", e),
            ScriptError::Parse(e) => write!(f, "Script parse error: {}", e),
            ScriptError::Unordered { index } => {
                write!(f, "Script event {} is earlier than the one before it", index)
            }
            ScriptError::ZeroTick => write!(f, "tick_ms must be positive"),
        }
    }
}

impl std::error::Error for ScriptError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollScript {
    /// Simulated frame interval between pumps
    pub tick_ms: u64,
    pub events: Vec<ScriptEvent>,
}

impl Default for ScrollScript {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            events: Vec::new(),
        }
    }
}

impl ScrollScript {
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let script: ScrollScript =
            serde_json::from_str(json).map_err(|e| ScriptError::Parse(e.to_string()))?;
        script.validate()?;
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ScriptError::Io(format!("{}: {}", path.display(), e)))?;
        let script = Self::from_json(&json)?;
        debug!("Loaded script {}: {} events", path.display(), script.events.len());
        Ok(script)
    }

    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.tick_ms == 0 {
            return Err(ScriptError::ZeroTick);
        }
        for (i, pair) in self.events.windows(2).enumerate() {
            if pair[1].at_ms < pair[0].at_ms {
                return Err(ScriptError::Unordered { index: i + 1 });
            }
        }
        Ok(())
    }

    /// Linear scroll from `from` to `to` over `duration_ms` in `step_ms` increments,
    /// then `hold_ms` without input.
    pub fn sweep(from: f64, to: f64, duration_ms: u64, step_ms: u64, hold_ms: u64) -> Self {
        let step_ms = step_ms.max(1);
        let steps = (duration_ms / step_ms).max(1);
        let mut events: Vec<ScriptEvent> = (0..=steps)
            .map(|i| {
                let t = i as f64 / steps as f64;
                ScriptEvent {
                    at_ms: i * step_ms,
                    action: PageAction::Scroll { y: from + (to - from) * t },
                }
            })
            .collect();
        events.push(ScriptEvent {
            at_ms: steps * step_ms + hold_ms,
            action: PageAction::Idle,
        });
        Self {
            tick_ms: DEFAULT_TICK_MS,
            events,
        }
    }

    /// Timestamp of the last event
    pub fn end_ms(&self) -> u64 {
        self.events.last().map(|e| e.at_ms).unwrap_or(0)
    }

    /// Feed the script into a mounted stage with simulated time starting at `start`.
    ///
    /// Each tick applies every event due by then, pumps the stage, and hands the
    /// stage to `on_tick` with the elapsed milliseconds.
    pub fn replay<F>(&self, stage: &mut Stage, start: Instant, mut on_tick: F)
    where
        F: FnMut(&mut Stage, u64),
    {
        let tick = self.tick_ms.max(1);
        let end = self.end_ms();
        let mut next = 0;
        let mut elapsed = 0;

        loop {
            let now = start + Duration::from_millis(elapsed);
            while let Some(event) = self.events.get(next)
                && event.at_ms <= elapsed
            {
                trace!("Script @{}ms: {:?}", event.at_ms, event.action);
                match event.action {
                    PageAction::Scroll { y } => stage.scroll_to(y, now),
                    PageAction::Resize { viewport_height } => stage.resize(viewport_height, now),
                    PageAction::Idle => {}
                }
                next += 1;
            }
            stage.pump(now);
            on_tick(stage, elapsed);

            if elapsed >= end {
                break;
            }
            elapsed = (elapsed + tick).min(end);
        }
    }
}
