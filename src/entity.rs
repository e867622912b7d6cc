use std::fmt;
use std::rc::Rc;

use crate::event::{Event, EventKind};
use crate::geometry::Coord;
use crate::motion::{Motion, Path, PathEvent};
use crate::scene::{Animator, Scene, SceneEvent, Visual};

/// Stable arena index of an entity inside its [`crate::stage::Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One animated glyph: an input character or a glyph an effect spawned.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    symbol: char,
    input_coord: Coord,
    from_input: bool,
    pub(crate) motion: Motion,
    pub(crate) animator: Animator,
    pub(crate) layer: i32,
    pub(crate) visible: bool,
}

impl Entity {
    pub(crate) fn new(id: EntityId, symbol: char, coord: Coord, from_input: bool) -> Self {
        Self {
            id,
            symbol,
            input_coord: coord,
            from_input,
            motion: Motion::new(coord),
            animator: Animator::new(symbol),
            layer: 0,
            visible: true,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn symbol(&self) -> char {
        self.symbol
    }

    pub fn input_coord(&self) -> Coord {
        self.input_coord
    }

    pub fn is_input(&self) -> bool {
        self.from_input
    }

    pub fn coord(&self) -> Coord {
        self.motion.current()
    }

    pub fn visual(&self) -> Visual {
        self.animator.visual()
    }

    pub fn base_layer(&self) -> i32 {
        self.layer
    }

    /// Draw layer: the active scene's layer, then the active path's, then the
    /// entity's own.
    pub fn layer(&self) -> i32 {
        self.animator
            .active_scene()
            .and_then(|scene| scene.layer())
            .or_else(|| self.motion.active_path().and_then(|path| path.layer()))
            .unwrap_or(self.layer)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn progress(&self) -> f64 {
        self.motion.progress()
    }

    pub fn active_path(&self) -> Option<&Rc<Path>> {
        self.motion.active_path()
    }

    pub fn active_scene(&self) -> Option<&Rc<Scene>> {
        self.animator.active_scene()
    }

    /// A path registered on this entity through
    /// [`crate::stage::Stage::register_path`].
    pub fn query_path(&self, id: &str) -> Option<&Rc<Path>> {
        self.motion.query(id)
    }

    pub fn query_scene(&self, id: &str) -> Option<&Rc<Scene>> {
        self.animator.query(id)
    }

    /// True while a path or a scene still has ticks to consume.
    pub fn is_active(&self) -> bool {
        self.motion.is_moving() || self.animator.is_animating()
    }

    /// Advances the path and then the scene by one tick, appending the raised
    /// events to `events`. Path events always precede scene events.
    pub(crate) fn tick(&mut self, events: &mut Vec<Event>) {
        let step = self.motion.step();
        let driven = step.is_some();
        if let Some(step) = step {
            for event in step.events {
                let kind = match event {
                    PathEvent::WaypointReached(index) => EventKind::WaypointReached {
                        path: Rc::clone(&step.path),
                        index,
                    },
                    PathEvent::Complete => EventKind::PathComplete(Rc::clone(&step.path)),
                };
                events.push(Event::new(self.id, kind));
            }
        }

        let progress = driven.then(|| self.motion.progress());
        if let Some(step) = self.animator.step(progress) {
            for event in step.events {
                match event {
                    SceneEvent::Complete => events.push(Event::new(
                        self.id,
                        EventKind::SceneComplete(Rc::clone(&step.scene)),
                    )),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{Entity, EntityId};
    use crate::event::EventKind;
    use crate::geometry::Coord;
    use crate::motion::Path;
    use crate::scene::Scene;

    #[test]
    fn scene_layer_overrides_path_layer_overrides_base() {
        let mut entity = Entity::new(EntityId(0), 'a', Coord::new(1, 1), true);
        entity.layer = 1;
        assert_eq!(entity.layer(), 1);

        let path = Path::builder("p").layer(4).to(Coord::new(9, 1)).build().expect("path");
        entity.motion.activate(Rc::new(path));
        assert_eq!(entity.layer(), 4);

        let scene = Scene::builder("s")
            .symbol('*', 3, None)
            .layer(7)
            .build()
            .expect("scene");
        entity.animator.activate(Rc::new(scene));
        assert_eq!(entity.layer(), 7);
    }

    #[test]
    fn path_complete_is_raised_before_scene_complete_on_the_same_tick() {
        let mut entity = Entity::new(EntityId(3), 'a', Coord::new(1, 1), true);
        let path = Path::builder("p").to(Coord::new(2, 1)).build().expect("path");
        let scene = Scene::builder("s").symbol('*', 1, None).build().expect("scene");
        entity.motion.activate(Rc::new(path));
        entity.animator.activate(Rc::new(scene));

        let mut events = Vec::new();
        entity.tick(&mut events);
        let kinds = events.iter().map(|event| &event.kind).collect::<Vec<_>>();
        assert!(matches!(kinds[0], EventKind::WaypointReached { index: 0, .. }));
        assert!(matches!(kinds[1], EventKind::PathComplete(_)));
        assert!(matches!(kinds[2], EventKind::SceneComplete(_)));
        assert!(!entity.is_active());
    }
}
