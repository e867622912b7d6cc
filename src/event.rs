//! Event bindings and the dispatcher pass that runs them.
//!
//! Entities raise [`Event`]s while they advance or when a path or scene is
//! activated on them. Each tick the stage hands its queued events to the
//! [`Dispatcher`], which runs every matching [`Binding`] in registration
//! order. Actions may queue further events; those are handled in the same
//! pass so a chained activation shows up in the frame being composited.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::entity::EntityId;
use crate::geometry::Coord;
use crate::motion::Path;
use crate::scene::Scene;
use crate::stage::Stage;

pub const DEFAULT_CASCADE_LIMIT: usize = 10_000;

#[derive(Debug, Clone)]
pub enum EventKind {
    PathActivated(Rc<Path>),
    WaypointReached { path: Rc<Path>, index: usize },
    PathComplete(Rc<Path>),
    SceneActivated(Rc<Scene>),
    SceneComplete(Rc<Scene>),
}

#[derive(Debug, Clone)]
pub struct Event {
    pub source: EntityId,
    pub kind: EventKind,
}

impl Event {
    pub fn new(source: EntityId, kind: EventKind) -> Self {
        Self { source, kind }
    }
}

/// Condition a binding waits for. A `None` id matches any path or scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    PathActivated { path: Option<String> },
    WaypointReached { path: Option<String>, index: usize },
    PathComplete { path: Option<String> },
    SceneActivated { scene: Option<String> },
    SceneComplete { scene: Option<String> },
}

impl Trigger {
    pub fn path_activated(path: &Path) -> Self {
        Self::PathActivated {
            path: Some(path.id().to_owned()),
        }
    }

    pub fn waypoint_reached(path: &Path, index: usize) -> Self {
        Self::WaypointReached {
            path: Some(path.id().to_owned()),
            index,
        }
    }

    pub fn path_complete(path: &Path) -> Self {
        Self::PathComplete {
            path: Some(path.id().to_owned()),
        }
    }

    pub fn scene_activated(scene: &Scene) -> Self {
        Self::SceneActivated {
            scene: Some(scene.id().to_owned()),
        }
    }

    pub fn scene_complete(scene: &Scene) -> Self {
        Self::SceneComplete {
            scene: Some(scene.id().to_owned()),
        }
    }

    pub fn matches(&self, kind: &EventKind) -> bool {
        fn id_matches(filter: &Option<String>, id: &str) -> bool {
            filter.as_deref().map_or(true, |wanted| wanted == id)
        }

        match (self, kind) {
            (Self::PathActivated { path }, EventKind::PathActivated(active)) => {
                id_matches(path, active.id())
            }
            (
                Self::WaypointReached { path, index },
                EventKind::WaypointReached {
                    path: active,
                    index: reached,
                },
            ) => index == reached && id_matches(path, active.id()),
            (Self::PathComplete { path }, EventKind::PathComplete(done)) => {
                id_matches(path, done.id())
            }
            (Self::SceneActivated { scene }, EventKind::SceneActivated(active)) => {
                id_matches(scene, active.id())
            }
            (Self::SceneComplete { scene }, EventKind::SceneComplete(done)) => {
                id_matches(scene, done.id())
            }
            _ => false,
        }
    }
}

/// The entity an action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Source,
    Entity(EntityId),
}

impl Target {
    fn resolve(self, source: EntityId) -> EntityId {
        match self {
            Self::Source => source,
            Self::Entity(id) => id,
        }
    }
}

pub type Callback = Box<dyn FnMut(&mut Stage, EntityId)>;

pub enum Operation {
    ActivatePath(Rc<Path>),
    ActivateScene(Rc<Scene>),
    DeactivatePath,
    DeactivateScene,
    SetLayer(i32),
    SetCoordinate(Coord),
    SetVisibility(bool),
    ResetAppearance,
    /// Receives the stage and the resolved target id.
    Callback(Callback),
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActivatePath(path) => f.debug_tuple("ActivatePath").field(&path.id()).finish(),
            Self::ActivateScene(scene) => {
                f.debug_tuple("ActivateScene").field(&scene.id()).finish()
            }
            Self::DeactivatePath => f.write_str("DeactivatePath"),
            Self::DeactivateScene => f.write_str("DeactivateScene"),
            Self::SetLayer(layer) => f.debug_tuple("SetLayer").field(layer).finish(),
            Self::SetCoordinate(coord) => f.debug_tuple("SetCoordinate").field(coord).finish(),
            Self::SetVisibility(visible) => f.debug_tuple("SetVisibility").field(visible).finish(),
            Self::ResetAppearance => f.write_str("ResetAppearance"),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[derive(Debug)]
pub struct Action {
    pub target: Target,
    pub operation: Operation,
}

impl Action {
    fn on_source(operation: Operation) -> Self {
        Self {
            target: Target::Source,
            operation,
        }
    }

    pub fn activate_path(path: &Rc<Path>) -> Self {
        Self::on_source(Operation::ActivatePath(Rc::clone(path)))
    }

    pub fn activate_scene(scene: &Rc<Scene>) -> Self {
        Self::on_source(Operation::ActivateScene(Rc::clone(scene)))
    }

    pub fn deactivate_path() -> Self {
        Self::on_source(Operation::DeactivatePath)
    }

    pub fn deactivate_scene() -> Self {
        Self::on_source(Operation::DeactivateScene)
    }

    pub fn set_layer(layer: i32) -> Self {
        Self::on_source(Operation::SetLayer(layer))
    }

    pub fn set_coordinate(coord: Coord) -> Self {
        Self::on_source(Operation::SetCoordinate(coord))
    }

    pub fn set_visibility(visible: bool) -> Self {
        Self::on_source(Operation::SetVisibility(visible))
    }

    pub fn reset_appearance() -> Self {
        Self::on_source(Operation::ResetAppearance)
    }

    pub fn callback<F>(callback: F) -> Self
    where
        F: FnMut(&mut Stage, EntityId) + 'static,
    {
        Self::on_source(Operation::Callback(Box::new(callback)))
    }

    /// Redirects the action from the firing entity to `id`.
    pub fn targeting(mut self, id: EntityId) -> Self {
        self.target = Target::Entity(id);
        self
    }
}

#[derive(Debug)]
pub struct Binding {
    pub source: EntityId,
    pub trigger: Trigger,
    pub action: Action,
    pub persistent: bool,
}

/// Registered bindings in registration order.
#[derive(Debug)]
pub struct Dispatcher {
    bindings: Vec<Binding>,
    cascade_limit: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            cascade_limit: DEFAULT_CASCADE_LIMIT,
        }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cascade_limit(mut self, limit: usize) -> Self {
        self.cascade_limit = limit.max(1);
        self
    }

    pub fn cascade_limit(&self) -> usize {
        self.cascade_limit
    }

    /// Registers a binding that is removed after it fires once.
    pub fn on(&mut self, source: EntityId, trigger: Trigger, action: Action) {
        self.bindings.push(Binding {
            source,
            trigger,
            action,
            persistent: false,
        });
    }

    pub fn on_persistent(&mut self, source: EntityId, trigger: Trigger, action: Action) {
        self.bindings.push(Binding {
            source,
            trigger,
            action,
            persistent: true,
        });
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub(crate) fn absorb(&mut self, other: &mut Dispatcher) {
        self.bindings.append(&mut other.bindings);
    }

    /// Runs every binding matching the queued events until the queue is empty
    /// or the cascade limit is hit. Returns the number of actions fired.
    pub(crate) fn dispatch(&mut self, stage: &mut Stage, queue: &mut VecDeque<Event>) -> usize {
        let mut fired = 0;
        while let Some(event) = queue.pop_front() {
            let mut index = 0;
            while index < self.bindings.len() {
                let binding = &self.bindings[index];
                if binding.source != event.source || !binding.trigger.matches(&event.kind) {
                    index += 1;
                    continue;
                }
                if fired >= self.cascade_limit {
                    warn!(
                        limit = self.cascade_limit,
                        dropped = queue.len() + 1,
                        "event cascade limit reached; dropping remaining events this tick"
                    );
                    queue.clear();
                    return fired;
                }

                fired += 1;
                if binding.persistent {
                    let target = binding.action.target.resolve(event.source);
                    stage.apply(target, &mut self.bindings[index].action.operation);
                    index += 1;
                } else {
                    let mut binding = self.bindings.remove(index);
                    let target = binding.action.target.resolve(event.source);
                    stage.apply(target, &mut binding.action.operation);
                }
                queue.extend(stage.take_events());
            }
            // Callbacks register through the stage while its dispatcher is
            // checked out; merge them before the next event.
            self.absorb(stage.dispatcher_mut());
        }
        fired
    }
}
