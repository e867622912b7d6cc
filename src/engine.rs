use std::iter::FusedIterator;

use tracing::debug;

use crate::color::ColorMode;
use crate::frame::Frame;
use crate::stage::Stage;

/// Per-tick choreography an effect runs before entities advance, e.g.
/// staggered activation or spawning.
pub trait Director {
    fn direct(&mut self, stage: &mut Stage, tick: u64);

    /// The iterator only completes once this returns true and no entity is
    /// active.
    fn is_finished(&self, stage: &Stage) -> bool {
        let _ = stage;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Complete,
}

/// Pull-based frame loop. Each call to `next` advances the stage one tick
/// and returns the composited frame; `None` means the effect is complete.
pub struct EffectIterator {
    stage: Stage,
    director: Option<Box<dyn Director>>,
    mode: ColorMode,
    state: State,
    tick: u64,
    yielded: u64,
}

impl EffectIterator {
    pub fn new(stage: Stage, mode: ColorMode) -> Self {
        Self {
            stage,
            director: None,
            mode,
            state: State::Idle,
            tick: 0,
            yielded: 0,
        }
    }

    pub fn with_director<D>(mut self, director: D) -> Self
    where
        D: Director + 'static,
    {
        self.director = Some(Box::new(director));
        self
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn color_mode(&self) -> ColorMode {
        self.mode
    }

    fn is_settled(&self) -> bool {
        !self.stage.is_active()
            && !self.stage.has_pending_events()
            && self
                .director
                .as_ref()
                .map_or(true, |director| director.is_finished(&self.stage))
    }
}

impl Iterator for EffectIterator {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        match self.state {
            State::Complete => return None,
            State::Idle => {
                debug!(
                    entities = self.stage.len(),
                    active = self.stage.active_count(),
                    "effect started"
                );
                self.state = State::Running;
            }
            State::Running => {}
        }

        if self.is_settled() {
            self.state = State::Complete;
            debug!(ticks = self.tick, frames = self.yielded, "effect complete");
            if self.yielded == 0 {
                self.yielded = 1;
                return Some(self.stage.composite(self.mode, self.tick));
            }
            return None;
        }

        self.tick += 1;
        if let Some(director) = self.director.as_mut() {
            director.direct(&mut self.stage, self.tick);
        }
        self.stage.advance();
        self.yielded += 1;
        Some(self.stage.composite(self.mode, self.tick))
    }
}

impl FusedIterator for EffectIterator {}
