//! Motion geometry: waypoints, paths, and the per-entity controller that walks
//! an entity along its active path one tick at a time.

use std::rc::Rc;

use tracing::trace;

use crate::easing::Easing;
use crate::error::EngineError;
use crate::geometry::{cubic_bezier, curve_length, lerp, quadratic_bezier, Coord, Point};

const CURVE_LENGTH_SAMPLES: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Controls {
    #[default]
    None,
    Quadratic(Coord),
    Cubic(Coord, Coord),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub id: Option<String>,
    pub coord: Coord,
    pub controls: Controls,
    pub speed: Option<f64>,
    pub easing: Option<Easing>,
    pub hold: u32,
}

impl Waypoint {
    pub fn new(coord: Coord) -> Self {
        Self {
            id: None,
            coord,
            controls: Controls::None,
            speed: None,
            easing: None,
            hold: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn quadratic(mut self, control: Coord) -> Self {
        self.controls = Controls::Quadratic(control);
        self
    }

    pub fn cubic(mut self, first: Coord, second: Coord) -> Self {
        self.controls = Controls::Cubic(first, second);
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn hold(mut self, ticks: u32) -> Self {
        self.hold = ticks;
        self
    }
}

/// An immutable motion definition. Entities share paths through `Rc` and lay
/// them out from wherever they stand when the path is activated.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    id: String,
    waypoints: Vec<Waypoint>,
    speed: f64,
    easing: Easing,
    looping: bool,
    layer: Option<i32>,
}

impl Path {
    pub fn builder(id: impl Into<String>) -> PathBuilder {
        PathBuilder {
            id: id.into(),
            waypoints: Vec::new(),
            speed: 1.0,
            easing: Easing::Linear,
            looping: false,
            layer: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn layer(&self) -> Option<i32> {
        self.layer
    }

    pub fn waypoint_index(&self, id: &str) -> Option<usize> {
        self.waypoints
            .iter()
            .position(|waypoint| waypoint.id.as_deref() == Some(id))
    }

    pub fn plan(&self, origin: Coord) -> PathPlan {
        PathPlan::new(self, origin)
    }
}

#[derive(Debug, Clone)]
pub struct PathBuilder {
    id: String,
    waypoints: Vec<Waypoint>,
    speed: f64,
    easing: Easing,
    looping: bool,
    layer: Option<i32>,
}

impl PathBuilder {
    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn layer(mut self, layer: i32) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn waypoint(mut self, waypoint: Waypoint) -> Self {
        self.waypoints.push(waypoint);
        self
    }

    pub fn to(self, coord: Coord) -> Self {
        self.waypoint(Waypoint::new(coord))
    }

    pub fn build(self) -> Result<Path, EngineError> {
        if self.waypoints.is_empty() {
            return Err(EngineError::EmptyPath { id: self.id });
        }
        let speeds = std::iter::once(self.speed)
            .chain(self.waypoints.iter().filter_map(|waypoint| waypoint.speed));
        for speed in speeds {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(EngineError::InvalidSpeed { id: self.id, speed });
            }
        }
        Ok(Path {
            id: self.id,
            waypoints: self.waypoints,
            speed: self.speed,
            easing: self.easing,
            looping: self.looping,
            layer: self.layer,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Segment {
    start: Coord,
    end: Coord,
    controls: Controls,
    easing: Easing,
    length: f64,
    length_before: f64,
    start_tick: u32,
    motion_ticks: u32,
    hold: u32,
}

impl Segment {
    fn arrival_tick(&self) -> u32 {
        self.start_tick.saturating_add(self.motion_ticks)
    }

    fn end_tick(&self) -> u32 {
        self.arrival_tick().saturating_add(self.hold)
    }

    fn point(&self, t: f64) -> Point {
        match self.controls {
            Controls::None => lerp(self.start, self.end, t),
            Controls::Quadratic(control) => quadratic_bezier(self.start, control, self.end, t),
            Controls::Cubic(c1, c2) => cubic_bezier(self.start, c1, c2, self.end, t),
        }
    }
}

/// Where a traversal stands, in ticks consumed since activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathCursor {
    pub elapsed: u32,
    pub started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEvent {
    WaypointReached(usize),
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathAdvance {
    pub coord: Coord,
    pub progress: f64,
    pub cursor: PathCursor,
    pub events: Vec<PathEvent>,
    /// The traversal (final hold included) has been fully consumed.
    pub finished: bool,
}

/// A path laid out from a concrete origin: per-segment lengths, durations and
/// tick windows.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPlan {
    origin: Coord,
    segments: Vec<Segment>,
    total_length: f64,
    total_ticks: u32,
}

impl PathPlan {
    pub fn new(path: &Path, origin: Coord) -> Self {
        let mut segments = Vec::with_capacity(path.waypoints.len());
        let mut start = origin;
        let mut length_before = 0.0;
        let mut start_tick = 0_u32;

        for waypoint in &path.waypoints {
            let mut segment = Segment {
                start,
                end: waypoint.coord,
                controls: waypoint.controls,
                easing: waypoint.easing.unwrap_or(path.easing),
                length: 0.0,
                length_before,
                start_tick,
                motion_ticks: 0,
                hold: waypoint.hold,
            };
            segment.length = match segment.controls {
                Controls::None => start.distance(waypoint.coord),
                _ => curve_length(CURVE_LENGTH_SAMPLES, |t| segment.point(t)),
            };
            let speed = waypoint.speed.unwrap_or(path.speed);
            segment.motion_ticks = if segment.length <= f64::EPSILON {
                0
            } else {
                (segment.length / speed).ceil().max(1.0) as u32
            };

            length_before += segment.length;
            start_tick = segment.end_tick();
            start = waypoint.coord;
            segments.push(segment);
        }

        Self {
            origin,
            segments,
            total_length: length_before,
            total_ticks: start_tick,
        }
    }

    pub fn origin(&self) -> Coord {
        self.origin
    }

    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    pub fn total_ticks(&self) -> u32 {
        self.total_ticks
    }

    /// Coordinate and progress after `elapsed` ticks of this traversal.
    pub fn sample(&self, elapsed: u32) -> (Coord, f64) {
        let elapsed = elapsed.min(self.total_ticks);
        let last = &self.segments[self.segments.len() - 1];
        if elapsed >= last.arrival_tick() {
            return (last.end, 1.0);
        }

        let segment = self
            .segments
            .iter()
            .find(|segment| elapsed <= segment.end_tick())
            .unwrap_or(last);

        if elapsed >= segment.arrival_tick() {
            return (segment.end, self.fraction(segment.length_before + segment.length));
        }
        if elapsed <= segment.start_tick {
            return (segment.start, self.fraction(segment.length_before));
        }

        let local = f64::from(elapsed - segment.start_tick) / f64::from(segment.motion_ticks);
        let coord = segment.point(segment.easing.apply(local)).round();
        let progress = self.fraction(segment.length_before + segment.length * local);
        (coord, progress)
    }

    /// Consumes `delta` ticks starting from `cursor`. Waypoint events fire for
    /// every waypoint whose arrival falls inside the consumed window.
    pub fn advance(&self, cursor: PathCursor, delta: u32) -> PathAdvance {
        let old = cursor.elapsed;
        let new = old.saturating_add(delta).min(self.total_ticks);

        let mut events = Vec::new();
        if delta > 0 {
            for (index, segment) in self.segments.iter().enumerate() {
                let arrival = segment.arrival_tick();
                if arrival <= new && (arrival > old || !cursor.started) {
                    events.push(PathEvent::WaypointReached(index));
                }
            }
        }

        let started = cursor.started || delta > 0;
        let (coord, mut progress) = self.sample(new);
        if self.total_length <= f64::EPSILON && started {
            progress = 1.0;
        }

        PathAdvance {
            coord,
            progress,
            cursor: PathCursor {
                elapsed: new,
                started,
            },
            events,
            finished: started && new >= self.total_ticks,
        }
    }

    fn fraction(&self, length: f64) -> f64 {
        if self.total_length <= f64::EPSILON {
            0.0
        } else {
            (length / self.total_length).clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone)]
struct Traversal {
    path: Rc<Path>,
    plan: PathPlan,
    cursor: PathCursor,
}

/// Result of one motion tick.
#[derive(Debug, Clone)]
pub struct MotionStep {
    pub path: Rc<Path>,
    pub events: Vec<PathEvent>,
}

/// Owns an entity's coordinate, the paths registered on it and its active
/// traversal.
#[derive(Debug, Clone)]
pub struct Motion {
    current: Coord,
    paths: Vec<Rc<Path>>,
    traversal: Option<Traversal>,
    progress: f64,
}

impl Motion {
    pub fn new(coord: Coord) -> Self {
        Self {
            current: coord,
            paths: Vec::new(),
            traversal: None,
            progress: 0.0,
        }
    }

    /// Stores `path` under its id, replacing an earlier path with the same id.
    pub fn register(&mut self, path: Path) -> Rc<Path> {
        let path = Rc::new(path);
        match self.paths.iter_mut().find(|known| known.id() == path.id()) {
            Some(slot) => *slot = Rc::clone(&path),
            None => self.paths.push(Rc::clone(&path)),
        }
        path
    }

    pub fn query(&self, id: &str) -> Option<&Rc<Path>> {
        self.paths.iter().find(|path| path.id() == id)
    }

    pub fn current(&self) -> Coord {
        self.current
    }

    pub fn set_coordinate(&mut self, coord: Coord) {
        self.current = coord;
        if let Some(traversal) = &mut self.traversal {
            traversal.plan = PathPlan::new(&traversal.path, coord);
            traversal.cursor = PathCursor::default();
            self.progress = 0.0;
        }
    }

    /// Progress of the active traversal, or of the last one once it completed.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn active_path(&self) -> Option<&Rc<Path>> {
        self.traversal.as_ref().map(|traversal| &traversal.path)
    }

    pub fn is_moving(&self) -> bool {
        self.traversal.is_some()
    }

    pub fn activate(&mut self, path: Rc<Path>) {
        let plan = PathPlan::new(&path, self.current);
        trace!(
            path = path.id(),
            ticks = plan.total_ticks(),
            origin = %self.current,
            "path activated"
        );
        self.traversal = Some(Traversal {
            path,
            plan,
            cursor: PathCursor::default(),
        });
        self.progress = 0.0;
    }

    pub fn deactivate(&mut self) -> Option<Rc<Path>> {
        self.traversal.take().map(|traversal| traversal.path)
    }

    pub fn step(&mut self) -> Option<MotionStep> {
        let traversal = self.traversal.as_mut()?;
        let advance = traversal.plan.advance(traversal.cursor, 1);
        self.current = advance.coord;
        self.progress = advance.progress;
        traversal.cursor = advance.cursor;

        let path = Rc::clone(&traversal.path);
        let mut events = advance.events;
        if advance.finished {
            if path.looping() {
                traversal.plan = PathPlan::new(&path, self.current);
                traversal.cursor = PathCursor::default();
                self.progress = 0.0;
            } else {
                events.push(PathEvent::Complete);
                self.traversal = None;
            }
        }
        Some(MotionStep { path, events })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{Motion, Path, PathEvent, Waypoint};
    use crate::easing::Easing;
    use crate::error::EngineError;
    use crate::geometry::Coord;

    fn run_to_completion(motion: &mut Motion) -> (Vec<Coord>, Vec<f64>, Vec<PathEvent>) {
        let mut coords = Vec::new();
        let mut progress = Vec::new();
        let mut events = Vec::new();
        for _ in 0..10_000 {
            let Some(step) = motion.step() else {
                break;
            };
            coords.push(motion.current());
            progress.push(motion.progress());
            events.extend(step.events);
        }
        (coords, progress, events)
    }

    #[test]
    fn straight_path_moves_one_cell_per_tick_at_unit_speed() {
        let path = Path::builder("home").to(Coord::new(1, 1)).build().expect("path");
        let mut motion = Motion::new(Coord::new(5, 1));
        motion.activate(Rc::new(path));

        let (coords, progress, events) = run_to_completion(&mut motion);
        assert_eq!(
            coords,
            vec![Coord::new(4, 1), Coord::new(3, 1), Coord::new(2, 1), Coord::new(1, 1)]
        );
        assert_eq!(progress.last().copied(), Some(1.0));
        assert_eq!(events, vec![PathEvent::WaypointReached(0), PathEvent::Complete]);
        assert!(!motion.is_moving());
    }

    #[test]
    fn progress_is_monotonic_and_completes_once_with_easing_and_holds() {
        let path = Path::builder("wander")
            .speed(0.7)
            .easing(Easing::InOutBack)
            .waypoint(Waypoint::new(Coord::new(10, 3)).hold(3))
            .waypoint(Waypoint::new(Coord::new(2, 8)).cubic(Coord::new(12, 12), Coord::new(0, 0)))
            .waypoint(Waypoint::new(Coord::new(2, 8)))
            .build()
            .expect("path");
        let mut motion = Motion::new(Coord::new(1, 1));
        motion.activate(Rc::new(path));

        let (_, progress, events) = run_to_completion(&mut motion);
        assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(progress.last().copied(), Some(1.0));
        assert_eq!(
            events.iter().filter(|event| **event == PathEvent::Complete).count(),
            1
        );
        let reached = events
            .iter()
            .filter_map(|event| match event {
                PathEvent::WaypointReached(index) => Some(*index),
                PathEvent::Complete => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(reached, vec![0, 1, 2]);
    }

    #[test]
    fn hold_keeps_entity_at_waypoint() {
        let path = Path::builder("pause")
            .waypoint(Waypoint::new(Coord::new(3, 1)).hold(2))
            .build()
            .expect("path");
        let mut motion = Motion::new(Coord::new(1, 1));
        motion.activate(Rc::new(path));

        let (coords, _, events) = run_to_completion(&mut motion);
        assert_eq!(
            coords,
            vec![Coord::new(2, 1), Coord::new(3, 1), Coord::new(3, 1), Coord::new(3, 1)]
        );
        assert_eq!(events.last(), Some(&PathEvent::Complete));
    }

    #[test]
    fn faster_segments_take_fewer_ticks() {
        let slow = Path::builder("slow").speed(1.0).to(Coord::new(11, 1)).build().expect("path");
        let fast = Path::builder("fast").speed(2.5).to(Coord::new(11, 1)).build().expect("path");
        assert_eq!(slow.plan(Coord::new(1, 1)).total_ticks(), 10);
        assert_eq!(fast.plan(Coord::new(1, 1)).total_ticks(), 4);
    }

    #[test]
    fn zero_length_path_completes_on_first_tick() {
        let path = Path::builder("stay").to(Coord::new(4, 4)).build().expect("path");
        let mut motion = Motion::new(Coord::new(4, 4));
        motion.activate(Rc::new(path));

        let step = motion.step().expect("one step");
        assert_eq!(step.events, vec![PathEvent::WaypointReached(0), PathEvent::Complete]);
        assert_eq!(motion.progress(), 1.0);
        assert!(motion.step().is_none());
    }

    #[test]
    fn looping_path_wraps_without_completing() {
        let path = Path::builder("orbit")
            .looping(true)
            .to(Coord::new(3, 1))
            .to(Coord::new(1, 1))
            .build()
            .expect("path");
        let mut motion = Motion::new(Coord::new(1, 1));
        motion.activate(Rc::new(path));

        let mut events = Vec::new();
        for _ in 0..12 {
            events.extend(motion.step().expect("looping path keeps moving").events);
        }
        assert!(motion.is_moving());
        assert!(!events.contains(&PathEvent::Complete));
        assert_eq!(motion.progress(), 0.0);
    }

    #[test]
    fn off_canvas_targets_are_reachable() {
        let path = Path::builder("exit").to(Coord::new(-3, 1)).build().expect("path");
        let mut motion = Motion::new(Coord::new(1, 1));
        motion.activate(Rc::new(path));
        run_to_completion(&mut motion);
        assert_eq!(motion.current(), Coord::new(-3, 1));
    }

    #[test]
    fn invalid_paths_are_rejected_at_build_time() {
        assert_eq!(
            Path::builder("empty").build(),
            Err(EngineError::EmptyPath { id: "empty".into() })
        );
        assert!(matches!(
            Path::builder("still").speed(0.0).to(Coord::new(1, 1)).build(),
            Err(EngineError::InvalidSpeed { .. })
        ));
        assert!(matches!(
            Path::builder("nan")
                .waypoint(Waypoint::new(Coord::new(1, 1)).speed(f64::NAN))
                .build(),
            Err(EngineError::InvalidSpeed { .. })
        ));
    }
    #[test]
    fn quadratic_waypoint_bends_through_its_control_point() {
        let path = Path::builder("arc")
            .waypoint(Waypoint::new(Coord::new(9, 1)).quadratic(Coord::new(1, 9)))
            .build()
            .expect("path");
        let plan = path.plan(Coord::new(1, 1));
        assert!(plan.total_length() > 8.0);
        assert!(plan.total_ticks() > 8);

        let mut motion = Motion::new(Coord::new(1, 1));
        motion.activate(Rc::new(path));
        let (coords, _, _) = run_to_completion(&mut motion);
        assert!(coords.iter().map(|coord| coord.row).max() >= Some(4));
        assert_eq!(coords.last().copied(), Some(Coord::new(9, 1)));
    }

    #[test]
    fn waypoint_easing_overrides_the_path_easing() {
        let linear = Path::builder("linear").to(Coord::new(11, 1)).build().expect("path");
        let eased = Path::builder("eased")
            .waypoint(Waypoint::new(Coord::new(11, 1)).easing(Easing::InQuad))
            .build()
            .expect("path");
        let origin = Coord::new(1, 1);

        let (linear_coord, linear_progress) = linear.plan(origin).sample(4);
        let (eased_coord, eased_progress) = eased.plan(origin).sample(4);
        assert_eq!(linear_coord, Coord::new(5, 1));
        assert_eq!(eased_coord, Coord::new(3, 1));
        assert_eq!(linear_progress, eased_progress);
    }

    #[test]
    fn very_slow_paths_saturate_instead_of_overflowing() {
        let path = Path::builder("slow")
            .speed(1e-9)
            .waypoint(Waypoint::new(Coord::new(11, 1)).hold(1))
            .to(Coord::new(12, 1))
            .build()
            .expect("tiny speeds are valid");
        let plan = path.plan(Coord::new(1, 1));
        assert_eq!(plan.total_ticks(), u32::MAX);

        let (coord, progress) = plan.sample(u32::MAX);
        assert_eq!(coord, Coord::new(12, 1));
        assert_eq!(progress, 1.0);

        let mut motion = Motion::new(Coord::new(1, 1));
        motion.activate(Rc::new(path));
        assert!(motion.step().expect("moving").events.is_empty());
    }

    #[test]
    fn registered_paths_are_found_by_id() {
        let mut motion = Motion::new(Coord::new(1, 1));
        let first = motion.register(Path::builder("home").to(Coord::new(2, 1)).build().expect("path"));
        motion.register(Path::builder("away").to(Coord::new(9, 1)).build().expect("path"));
        assert!(Rc::ptr_eq(motion.query("home").expect("home"), &first));

        let replacement = motion.register(Path::builder("home").to(Coord::new(3, 1)).build().expect("path"));
        assert!(Rc::ptr_eq(motion.query("home").expect("home"), &replacement));
        assert!(motion.query("missing").is_none());
    }
}
