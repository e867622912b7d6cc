use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::easing::Easing;
use crate::error::EngineError;

/// What one cell shows: a symbol with optional foreground and background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Visual {
    pub symbol: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
}

impl Visual {
    pub const fn plain(symbol: char) -> Self {
        Self {
            symbol,
            fg: None,
            bg: None,
        }
    }

    pub fn fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    pub fn bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneFrame {
    pub visual: Visual,
    pub duration: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Frames advance on the scene's own tick counter.
    #[default]
    Independent,
    /// The frame index follows the entity's path progress.
    PathProgress,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    id: String,
    frames: Vec<SceneFrame>,
    looping: bool,
    sync: SyncMode,
    layer: Option<i32>,
    easing: Option<Easing>,
    total_ticks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneCursor {
    pub elapsed: u32,
    pub frame: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneAdvance {
    pub visual: Visual,
    pub cursor: SceneCursor,
    pub events: Vec<SceneEvent>,
}

impl Scene {
    pub fn builder(id: impl Into<String>) -> SceneBuilder {
        SceneBuilder {
            id: id.into(),
            frames: Vec::new(),
            looping: false,
            sync: SyncMode::Independent,
            layer: None,
            easing: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn frames(&self) -> &[SceneFrame] {
        &self.frames
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn sync(&self) -> SyncMode {
        self.sync
    }

    pub fn layer(&self) -> Option<i32> {
        self.layer
    }

    pub fn total_ticks(&self) -> u32 {
        self.total_ticks
    }

    pub fn first_visual(&self) -> Visual {
        self.frames[0].visual
    }

    /// Frame index a path-synced scene shows at `progress`.
    pub fn synced_index(&self, progress: f64) -> usize {
        let count = self.frames.len();
        let progress = if progress.is_finite() {
            progress.max(0.0)
        } else {
            0.0
        };
        ((progress * count as f64).floor() as usize).min(count - 1)
    }

    /// Consumes `ticks` from `cursor`. `path_progress` is `None` when no path
    /// is driving the entity; a path-synced scene then holds its frame and
    /// finishes. Callers drop the scene once `Complete` is returned.
    pub fn advance(
        &self,
        cursor: SceneCursor,
        path_progress: Option<f64>,
        ticks: u32,
    ) -> SceneAdvance {
        let mut events = Vec::new();
        let next = match self.sync {
            SyncMode::Independent => {
                let raw = cursor.elapsed.saturating_add(ticks);
                let elapsed = if self.looping {
                    if raw == 0 {
                        0
                    } else {
                        (raw - 1) % self.total_ticks + 1
                    }
                } else {
                    raw.min(self.total_ticks)
                };
                if !self.looping && elapsed >= self.total_ticks && cursor.elapsed < self.total_ticks
                {
                    events.push(SceneEvent::Complete);
                }
                SceneCursor {
                    elapsed,
                    frame: self.frame_at_elapsed(elapsed),
                }
            }
            SyncMode::PathProgress => {
                let frame = match path_progress {
                    Some(progress) => self.synced_index(progress),
                    None => cursor.frame,
                };
                let finished = match path_progress {
                    Some(progress) => progress >= 1.0,
                    None => true,
                };
                if !self.looping && finished && ticks > 0 {
                    events.push(SceneEvent::Complete);
                }
                SceneCursor {
                    elapsed: cursor.elapsed.saturating_add(ticks),
                    frame,
                }
            }
        };

        SceneAdvance {
            visual: self.frames[next.frame].visual,
            cursor: next,
            events,
        }
    }

    fn frame_at_elapsed(&self, elapsed: u32) -> usize {
        if elapsed == 0 {
            return 0;
        }
        let total = self.total_ticks;
        let position = match self.easing {
            Some(easing) => {
                let eased = easing.apply(f64::from(elapsed) / f64::from(total));
                ((eased * f64::from(total)).ceil() as i64 - 1).clamp(0, i64::from(total) - 1) as u32
            }
            None => elapsed - 1,
        };

        let mut window_end = 0_u32;
        for (index, frame) in self.frames.iter().enumerate() {
            window_end += frame.duration;
            if position < window_end {
                return index;
            }
        }
        self.frames.len() - 1
    }
}

#[derive(Debug, Clone)]
pub struct SceneBuilder {
    id: String,
    frames: Vec<SceneFrame>,
    looping: bool,
    sync: SyncMode,
    layer: Option<i32>,
    easing: Option<Easing>,
}

impl SceneBuilder {
    pub fn frame(mut self, visual: Visual, duration: u32) -> Self {
        self.frames.push(SceneFrame { visual, duration });
        self
    }

    pub fn symbol(self, symbol: char, duration: u32, fg: Option<Color>) -> Self {
        self.frame(
            Visual {
                symbol,
                fg,
                bg: None,
            },
            duration,
        )
    }

    /// One frame per color, with `symbols` spread evenly across the colors.
    pub fn gradient_frames<'a, I>(mut self, colors: I, symbols: &[char], duration: u32) -> Self
    where
        I: IntoIterator<Item = &'a Color>,
    {
        let colors = colors.into_iter().copied().collect::<Vec<_>>();
        if symbols.is_empty() {
            return self;
        }
        let count = colors.len();
        for (index, color) in colors.into_iter().enumerate() {
            let symbol = symbols[(index * symbols.len() / count).min(symbols.len() - 1)];
            self.frames.push(SceneFrame {
                visual: Visual::plain(symbol).fg(color),
                duration,
            });
        }
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn sync(mut self, sync: SyncMode) -> Self {
        self.sync = sync;
        self
    }

    pub fn layer(mut self, layer: i32) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn build(self) -> Result<Scene, EngineError> {
        if self.frames.is_empty() {
            return Err(EngineError::EmptyScene { id: self.id });
        }
        if self.sync == SyncMode::Independent {
            if let Some(index) = self.frames.iter().position(|frame| frame.duration == 0) {
                return Err(EngineError::ZeroFrameDuration { id: self.id, index });
            }
        }
        let Some(total_ticks) = self
            .frames
            .iter()
            .try_fold(0_u32, |total, frame| total.checked_add(frame.duration.max(1)))
        else {
            return Err(EngineError::SceneTooLong { id: self.id });
        };
        Ok(Scene {
            id: self.id,
            frames: self.frames,
            looping: self.looping,
            sync: self.sync,
            layer: self.layer,
            easing: self.easing,
            total_ticks,
        })
    }
}

#[derive(Debug, Clone)]
struct SceneRun {
    scene: Rc<Scene>,
    cursor: SceneCursor,
}

#[derive(Debug, Clone)]
pub struct SceneStep {
    pub scene: Rc<Scene>,
    pub events: Vec<SceneEvent>,
}

/// Owns an entity's visual, its registered scenes and the active one.
#[derive(Debug, Clone)]
pub struct Animator {
    base: Visual,
    visual: Visual,
    scenes: Vec<Rc<Scene>>,
    run: Option<SceneRun>,
}

impl Animator {
    pub fn new(symbol: char) -> Self {
        Self {
            base: Visual::plain(symbol),
            visual: Visual::plain(symbol),
            scenes: Vec::new(),
            run: None,
        }
    }

    /// Stores `scene` under its id, replacing an earlier scene with the same
    /// id.
    pub fn register(&mut self, scene: Scene) -> Rc<Scene> {
        let scene = Rc::new(scene);
        match self.scenes.iter_mut().find(|known| known.id() == scene.id()) {
            Some(slot) => *slot = Rc::clone(&scene),
            None => self.scenes.push(Rc::clone(&scene)),
        }
        scene
    }

    pub fn query(&self, id: &str) -> Option<&Rc<Scene>> {
        self.scenes.iter().find(|scene| scene.id() == id)
    }

    pub fn visual(&self) -> Visual {
        self.visual
    }

    pub fn active_scene(&self) -> Option<&Rc<Scene>> {
        self.run.as_ref().map(|run| &run.scene)
    }

    pub fn is_animating(&self) -> bool {
        self.run.is_some()
    }

    pub fn activate(&mut self, scene: Rc<Scene>) {
        self.visual = scene.first_visual();
        self.run = Some(SceneRun {
            scene,
            cursor: SceneCursor::default(),
        });
    }

    pub fn deactivate(&mut self) -> Option<Rc<Scene>> {
        self.run.take().map(|run| run.scene)
    }

    pub fn set_appearance(&mut self, visual: Visual) {
        self.visual = visual;
    }

    /// Back to the input symbol with no color; the active scene is kept.
    pub fn reset_appearance(&mut self) {
        self.visual = self.base;
    }

    pub fn step(&mut self, path_progress: Option<f64>) -> Option<SceneStep> {
        let run = self.run.as_mut()?;
        let advance = run.scene.advance(run.cursor, path_progress, 1);
        run.cursor = advance.cursor;
        self.visual = advance.visual;

        let scene = Rc::clone(&run.scene);
        if advance.events.contains(&SceneEvent::Complete) {
            self.run = None;
        }
        Some(SceneStep {
            scene,
            events: advance.events,
        })
    }
}
