//! The entity arena: every glyph of an effect together with its motion,
//! visual state, and the event bindings that choreograph them.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use tracing::trace;

use crate::canvas::{Canvas, IngestOptions, TextBlock};
use crate::color::ColorMode;
use crate::entity::{Entity, EntityId};
use crate::error::EngineError;
use crate::event::{Action, Dispatcher, Event, EventKind, Operation, Trigger};
use crate::frame::Frame;
use crate::geometry::Coord;
use crate::gradient::Bounds;
use crate::motion::Path;
use crate::scene::{Scene, Visual};

/// Orderings for grouping input entities, mirroring the usual reveal sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    RowTopToBottom,
    RowBottomToTop,
    ColumnLeftToRight,
    ColumnRightToLeft,
    DiagonalTopLeftToBottomRight,
    DiagonalBottomLeftToTopRight,
    DiagonalTopRightToBottomLeft,
    DiagonalBottomRightToTopLeft,
    CenterToOutside,
    OutsideToCenter,
}

#[derive(Debug)]
pub struct Stage {
    canvas: Canvas,
    text_bounds: Bounds,
    entities: Vec<Entity>,
    by_input: HashMap<Coord, EntityId>,
    dispatcher: Dispatcher,
    pending: VecDeque<Event>,
}

impl Stage {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            text_bounds: canvas.bounds(),
            entities: Vec::new(),
            by_input: HashMap::new(),
            dispatcher: Dispatcher::new(),
            pending: VecDeque::new(),
        }
    }

    /// Spawns one entity per non-whitespace character of `text`.
    pub fn with_text(
        canvas: Canvas,
        text: &str,
        options: &IngestOptions,
    ) -> Result<Self, EngineError> {
        let TextBlock { glyphs, bounds } = canvas.ingest(text, options)?;
        let mut stage = Self::new(canvas);
        stage.text_bounds = bounds;
        for glyph in glyphs {
            let id = stage.push_entity(glyph.symbol, glyph.coord, true);
            stage.by_input.insert(glyph.coord, id);
        }
        Ok(stage)
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Bounds of the ingested text block; the whole canvas when the stage was
    /// built without text.
    pub fn text_bounds(&self) -> Bounds {
        self.text_bounds
    }

    pub fn spawn(&mut self, symbol: char, coord: Coord) -> EntityId {
        self.push_entity(symbol, coord, false)
    }

    fn push_entity(&mut self, symbol: char, coord: Coord, from_input: bool) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(Entity::new(id, symbol, coord, from_input));
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// The input character ingested at `coord`, wherever it has moved since.
    pub fn entity_at_input(&self, coord: Coord) -> Option<EntityId> {
        self.by_input.get(&coord).copied()
    }

    pub fn input_ids(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|entity| entity.is_input())
            .map(Entity::id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.entities.iter().filter(|entity| entity.is_active()).count()
    }

    pub fn is_active(&self) -> bool {
        self.entities.iter().any(Entity::is_active)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn on(&mut self, source: EntityId, trigger: Trigger, action: Action) {
        self.dispatcher.on(source, trigger, action);
    }

    pub fn on_persistent(&mut self, source: EntityId, trigger: Trigger, action: Action) {
        self.dispatcher.on_persistent(source, trigger, action);
    }

    /// Registers `path` on the entity so it can later be found with
    /// [`Entity::query_path`]. The returned handle is usable even when the
    /// entity does not exist.
    pub fn register_path(&mut self, id: EntityId, path: Path) -> Rc<Path> {
        match self.entities.get_mut(id.0) {
            Some(entity) => entity.motion.register(path),
            None => Rc::new(path),
        }
    }

    pub fn register_scene(&mut self, id: EntityId, scene: Scene) -> Rc<Scene> {
        match self.entities.get_mut(id.0) {
            Some(entity) => entity.animator.register(scene),
            None => Rc::new(scene),
        }
    }

    /// Links `paths` so each one's completion activates the next. With
    /// `looping` the last path hands back to the first. Fewer than two paths
    /// register nothing.
    pub fn chain_paths(&mut self, id: EntityId, paths: &[Rc<Path>], looping: bool) {
        if paths.len() < 2 {
            return;
        }
        for pair in paths.windows(2) {
            self.on_persistent(id, Trigger::path_complete(&pair[0]), Action::activate_path(&pair[1]));
        }
        if looping {
            let (first, last) = (&paths[0], &paths[paths.len() - 1]);
            self.on_persistent(id, Trigger::path_complete(last), Action::activate_path(first));
        }
    }

    /// Starts `path` from the entity's current coordinate. Returns false when
    /// the entity does not exist.
    pub fn activate_path(&mut self, id: EntityId, path: &Rc<Path>) -> bool {
        let Some(entity) = self.entities.get_mut(id.0) else {
            return false;
        };
        entity.motion.activate(Rc::clone(path));
        self.pending
            .push_back(Event::new(id, EventKind::PathActivated(Rc::clone(path))));
        true
    }

    pub fn activate_scene(&mut self, id: EntityId, scene: &Rc<Scene>) -> bool {
        let Some(entity) = self.entities.get_mut(id.0) else {
            return false;
        };
        entity.animator.activate(Rc::clone(scene));
        self.pending
            .push_back(Event::new(id, EventKind::SceneActivated(Rc::clone(scene))));
        true
    }

    pub fn deactivate_path(&mut self, id: EntityId) -> Option<Rc<Path>> {
        self.entities.get_mut(id.0)?.motion.deactivate()
    }

    pub fn deactivate_scene(&mut self, id: EntityId) -> Option<Rc<Scene>> {
        self.entities.get_mut(id.0)?.animator.deactivate()
    }

    pub fn set_coordinate(&mut self, id: EntityId, coord: Coord) {
        if let Some(entity) = self.entities.get_mut(id.0) {
            entity.motion.set_coordinate(coord);
        }
    }

    pub fn set_layer(&mut self, id: EntityId, layer: i32) {
        if let Some(entity) = self.entities.get_mut(id.0) {
            entity.layer = layer;
        }
    }

    pub fn set_visibility(&mut self, id: EntityId, visible: bool) {
        if let Some(entity) = self.entities.get_mut(id.0) {
            entity.visible = visible;
        }
    }

    pub fn set_appearance(&mut self, id: EntityId, visual: Visual) {
        if let Some(entity) = self.entities.get_mut(id.0) {
            entity.animator.set_appearance(visual);
        }
    }

    pub fn reset_appearance(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(id.0) {
            entity.animator.reset_appearance();
        }
    }

    /// Groups input entities by their input coordinate.
    pub fn group(&self, grouping: Grouping) -> Vec<Vec<EntityId>> {
        let center = self.canvas.center();
        let key = |coord: Coord| -> i64 {
            let (column, row) = (i64::from(coord.column), i64::from(coord.row));
            match grouping {
                Grouping::RowTopToBottom => -row,
                Grouping::RowBottomToTop => row,
                Grouping::ColumnLeftToRight => column,
                Grouping::ColumnRightToLeft => -column,
                Grouping::DiagonalTopLeftToBottomRight => column - row,
                Grouping::DiagonalBottomRightToTopLeft => row - column,
                Grouping::DiagonalBottomLeftToTopRight => column + row,
                Grouping::DiagonalTopRightToBottomLeft => -(column + row),
                Grouping::CenterToOutside | Grouping::OutsideToCenter => {
                    let dx = f64::from(coord.column - center.column);
                    let dy = f64::from(coord.row - center.row) * 2.0;
                    let ring = (dx * dx + dy * dy).sqrt().round() as i64;
                    if grouping == Grouping::CenterToOutside {
                        ring
                    } else {
                        -ring
                    }
                }
            }
        };

        let mut groups: BTreeMap<i64, Vec<EntityId>> = BTreeMap::new();
        for entity in self.entities.iter().filter(|entity| entity.is_input()) {
            groups
                .entry(key(entity.input_coord()))
                .or_default()
                .push(entity.id());
        }
        groups.into_values().collect()
    }

    /// Draws every visible on-canvas entity. Lower layers draw first; within a
    /// layer later entities overwrite earlier ones.
    pub fn composite(&self, mode: ColorMode, tick: u64) -> Frame {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        let mut cells: Vec<Option<Visual>> = vec![None; width * height];

        let mut order = self
            .entities
            .iter()
            .filter(|entity| entity.is_visible() && self.canvas.contains(entity.coord()))
            .collect::<Vec<_>>();
        order.sort_by_key(|entity| (entity.layer(), entity.id()));

        for entity in order {
            let coord = entity.coord();
            let line = height - coord.row as usize;
            let column = coord.column as usize - 1;
            cells[line * width + column] = Some(entity.visual());
        }
        Frame::from_cells(&cells, width, height, tick, mode)
    }

    /// Advances every active entity one tick in creation order, then runs
    /// the dispatcher over everything raised since the previous tick.
    pub(crate) fn advance(&mut self) -> usize {
        let mut raised = Vec::new();
        for entity in self.entities.iter_mut().filter(|entity| entity.is_active()) {
            entity.tick(&mut raised);
        }
        self.pending.extend(raised);
        self.dispatch()
    }

    pub(crate) fn dispatch(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let mut dispatcher = std::mem::take(&mut self.dispatcher);
        let mut queue = std::mem::take(&mut self.pending);
        let fired = dispatcher.dispatch(self, &mut queue);
        dispatcher.absorb(&mut self.dispatcher);
        self.dispatcher = dispatcher;
        fired
    }

    pub(crate) fn take_events(&mut self) -> VecDeque<Event> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn apply(&mut self, target: EntityId, operation: &mut Operation) {
        if self.entity(target).is_none() {
            trace!(entity = %target, ?operation, "skipping action for missing entity");
            return;
        }
        match operation {
            Operation::ActivatePath(path) => {
                let path = Rc::clone(path);
                self.activate_path(target, &path);
            }
            Operation::ActivateScene(scene) => {
                let scene = Rc::clone(scene);
                self.activate_scene(target, &scene);
            }
            Operation::DeactivatePath => {
                self.deactivate_path(target);
            }
            Operation::DeactivateScene => {
                self.deactivate_scene(target);
            }
            Operation::SetLayer(layer) => self.set_layer(target, *layer),
            Operation::SetCoordinate(coord) => self.set_coordinate(target, *coord),
            Operation::SetVisibility(visible) => self.set_visibility(target, *visible),
            Operation::ResetAppearance => self.reset_appearance(target),
            Operation::Callback(callback) => callback(self, target),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{Grouping, Stage};
    use crate::canvas::{Canvas, IngestOptions};
    use crate::color::ColorMode;
    use crate::entity::EntityId;
    use crate::event::{Action, Dispatcher, Trigger};
    use crate::geometry::{Anchor, Coord};
    use crate::motion::Path;
    use crate::scene::Scene;

    fn stage(text: &str, width: usize, height: usize) -> Stage {
        let canvas = Canvas::new(width, height).expect("canvas");
        let options = IngestOptions {
            anchor: Anchor::SouthWest,
            ..IngestOptions::default()
        };
        Stage::with_text(canvas, text, &options).expect("stage")
    }

    #[test]
    fn higher_layers_draw_over_lower_layers() {
        let mut stage = stage("ab", 2, 1);
        let a = EntityId(0);
        let b = EntityId(1);
        stage.set_coordinate(a, Coord::new(2, 1));
        assert_eq!(stage.composite(ColorMode::None, 0).to_text(), " b");

        stage.set_layer(a, 1);
        assert_eq!(stage.composite(ColorMode::None, 0).to_text(), " a");

        stage.set_visibility(a, false);
        stage.set_visibility(b, false);
        assert_eq!(stage.composite(ColorMode::None, 0).to_text(), "  ");
    }

    #[test]
    fn off_canvas_entities_are_not_drawn() {
        let mut stage = stage("ab", 2, 1);
        stage.set_coordinate(EntityId(1), Coord::new(3, 1));
        assert_eq!(stage.composite(ColorMode::None, 0).to_text(), "a ");
    }

    #[test]
    fn completion_chains_into_next_path_in_the_same_tick() {
        let mut stage = stage("a", 5, 1);
        let a = EntityId(0);
        let out = Rc::new(Path::builder("out").to(Coord::new(2, 1)).build().expect("path"));
        let back = Rc::new(Path::builder("back").to(Coord::new(1, 1)).build().expect("path"));
        stage.activate_path(a, &out);
        stage.on(a, Trigger::path_complete(&out), Action::activate_path(&back));

        stage.advance();
        let entity = stage.entity(a).expect("entity");
        assert_eq!(entity.coord(), Coord::new(2, 1));
        assert_eq!(entity.active_path().map(|path| path.id()), Some("back"));

        stage.advance();
        let entity = stage.entity(a).expect("entity");
        assert_eq!(entity.coord(), Coord::new(1, 1));
        assert!(!entity.is_active());
    }

    #[test]
    fn one_shot_bindings_fire_once_and_persistent_bindings_keep_firing() {
        let mut stage = stage("a", 5, 1);
        let a = EntityId(0);
        let hop = Rc::new(Path::builder("hop").to(Coord::new(2, 1)).build().expect("path"));
        let log = Rc::new(RefCell::new(Vec::new()));

        let once = Rc::clone(&log);
        stage.on(
            a,
            Trigger::path_activated(&hop),
            Action::callback(move |_, _| once.borrow_mut().push("once")),
        );
        let every = Rc::clone(&log);
        stage.on_persistent(
            a,
            Trigger::path_activated(&hop),
            Action::callback(move |_, _| every.borrow_mut().push("every")),
        );

        stage.activate_path(a, &hop);
        stage.advance();
        stage.activate_path(a, &hop);
        stage.advance();
        assert_eq!(*log.borrow(), vec!["once", "every", "every"]);
    }

    #[test]
    fn actions_can_target_other_entities_and_skip_missing_ones() {
        let mut stage = stage("ab", 5, 1);
        let (a, b) = (EntityId(0), EntityId(1));
        let flash = Rc::new(Scene::builder("flash").symbol('*', 2, None).build().expect("scene"));
        let hop = Rc::new(Path::builder("hop").to(Coord::new(1, 1)).build().expect("path"));

        stage.on(
            a,
            Trigger::path_complete(&hop),
            Action::activate_scene(&flash).targeting(b),
        );
        stage.on(
            a,
            Trigger::path_complete(&hop),
            Action::set_layer(3).targeting(EntityId(99)),
        );
        stage.activate_path(a, &hop);
        stage.advance();

        assert_eq!(stage.entity(b).expect("b").visual().symbol, '*');
        assert!(stage.entity(b).expect("b").is_active());
    }

    #[test]
    fn runaway_cascades_stop_at_the_limit() {
        let mut stage = stage("a", 3, 1);
        let a = EntityId(0);
        *stage.dispatcher_mut() = Dispatcher::new().with_cascade_limit(16);
        let spin = Rc::new(Path::builder("spin").to(Coord::new(1, 1)).build().expect("path"));
        stage.on_persistent(a, Trigger::path_activated(&spin), Action::activate_path(&spin));

        stage.activate_path(a, &spin);
        assert_eq!(stage.advance(), 16);
        assert!(!stage.has_pending_events());
    }

    #[test]
    fn callbacks_may_register_new_bindings() {
        let mut stage = stage("a", 3, 1);
        let a = EntityId(0);
        let first = Rc::new(Path::builder("first").to(Coord::new(2, 1)).build().expect("path"));
        let second = Rc::new(Path::builder("second").to(Coord::new(3, 1)).build().expect("path"));

        let arrived = Trigger::path_complete(&first);
        stage.on(
            a,
            Trigger::path_activated(&first),
            Action::callback(move |stage, id| {
                stage.on(id, arrived.clone(), Action::activate_path(&second));
            }),
        );
        stage.activate_path(a, &first);
        while stage.is_active() {
            stage.advance();
        }
        assert_eq!(stage.entity(a).expect("a").coord(), Coord::new(3, 1));
    }

    #[test]
    fn groups_rows_and_rings() {
        let stage = stage("ab\ncd", 2, 2);
        let rows = stage.group(Grouping::RowTopToBottom);
        assert_eq!(rows, vec![vec![EntityId(0), EntityId(1)], vec![EntityId(2), EntityId(3)]]);

        let columns = stage.group(Grouping::ColumnRightToLeft);
        assert_eq!(columns, vec![vec![EntityId(1), EntityId(3)], vec![EntityId(0), EntityId(2)]]);

        let diagonal = stage.group(Grouping::DiagonalBottomLeftToTopRight);
        assert_eq!(diagonal[0], vec![EntityId(2)]);
        assert_eq!(diagonal[2], vec![EntityId(1)]);

        let rings = stage.group(Grouping::CenterToOutside);
        assert_eq!(rings[0], vec![EntityId(2)]);
    }

    #[test]
    fn input_characters_are_found_by_their_input_coordinate() {
        let mut stage = stage("ab\nc", 3, 2);
        stage.spawn('*', Coord::new(3, 2));
        assert_eq!(stage.entity_at_input(Coord::new(1, 2)), Some(EntityId(0)));
        assert_eq!(stage.entity_at_input(Coord::new(2, 2)), Some(EntityId(1)));
        assert_eq!(stage.entity_at_input(Coord::new(1, 1)), Some(EntityId(2)));
        assert_eq!(stage.entity_at_input(Coord::new(3, 2)), None);

        stage.set_coordinate(EntityId(0), Coord::new(3, 1));
        assert_eq!(stage.entity_at_input(Coord::new(1, 2)), Some(EntityId(0)));
    }

    #[test]
    fn looping_chains_cycle_through_registered_paths() {
        let mut stage = stage("a", 5, 1);
        let a = EntityId(0);
        let out = stage.register_path(a, Path::builder("out").to(Coord::new(3, 1)).build().expect("path"));
        let back = stage.register_path(a, Path::builder("back").to(Coord::new(1, 1)).build().expect("path"));
        stage.chain_paths(a, &[Rc::clone(&out), Rc::clone(&back)], true);

        let start = stage.entity(a).and_then(|entity| entity.query_path("out")).cloned();
        let start = start.expect("registered path");
        assert!(Rc::ptr_eq(&start, &out));
        stage.activate_path(a, &start);

        let mut coords = Vec::new();
        for _ in 0..8 {
            stage.advance();
            coords.push(stage.entity(a).expect("a").coord().column);
        }
        assert_eq!(coords, vec![2, 3, 2, 1, 2, 3, 2, 1]);
        assert!(stage.is_active());
    }

    #[test]
    fn open_chains_stop_after_the_last_path() {
        let mut stage = stage("a", 5, 1);
        let a = EntityId(0);
        let legs = [Coord::new(2, 1), Coord::new(4, 1)]
            .iter()
            .enumerate()
            .map(|(index, coord)| {
                let leg = Path::builder(index.to_string()).to(*coord).build().expect("path");
                stage.register_path(a, leg)
            })
            .collect::<Vec<_>>();
        stage.chain_paths(a, &legs, false);
        stage.activate_path(a, &legs[0]);
        while stage.is_active() {
            stage.advance();
        }
        assert_eq!(stage.entity(a).expect("a").coord(), Coord::new(4, 1));
    }

    #[test]
    fn registered_scenes_are_found_by_id_and_missing_entities_still_get_a_handle() {
        let mut stage = stage("a", 2, 1);
        let glow = stage.register_scene(
            EntityId(0),
            Scene::builder("glow").symbol('*', 1, None).build().expect("scene"),
        );
        let found = stage.entity(EntityId(0)).and_then(|entity| entity.query_scene("glow"));
        assert!(found.is_some_and(|scene| Rc::ptr_eq(scene, &glow)));

        let orphan = stage.register_scene(
            EntityId(9),
            Scene::builder("orphan").symbol('?', 1, None).build().expect("scene"),
        );
        assert_eq!(orphan.id(), "orphan");
    }

    #[test]
    fn composition_is_idempotent() {
        let mut stage = stage("abc", 6, 2);
        let drift = Rc::new(Path::builder("drift").to(Coord::new(6, 2)).build().expect("path"));
        stage.activate_path(EntityId(1), &drift);
        stage.advance();
        let first = stage.composite(ColorMode::TrueColor, 1);
        let second = stage.composite(ColorMode::TrueColor, 1);
        assert_eq!(first.to_text(), second.to_text());
    }
}
