use std::collections::VecDeque;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{check_ratio, BuildContext};
use crate::canvas::Canvas;
use crate::color::{Color, Rgb};
use crate::easing::Easing;
use crate::engine::{Director, EffectIterator};
use crate::entity::EntityId;
use crate::error::EngineError;
use crate::geometry::Coord;
use crate::gradient::{Direction, Gradient};
use crate::motion::Path;
use crate::scene::Scene;
use crate::stage::{Grouping, Stage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinaryPathConfig {
    pub final_gradient_stops: Vec<Color>,
    pub final_gradient_steps: Vec<u32>,
    pub final_gradient_direction: Direction,
    /// Digit colors, picked at random per digit.
    pub binary_colors: Vec<Color>,
    pub movement_speed: f64,
    /// Share of characters whose digits may travel at the same time, in (0, 1].
    pub active_binary_groups: f64,
}

impl Default for BinaryPathConfig {
    fn default() -> Self {
        Self {
            final_gradient_stops: vec![Color::rgb(0x00, 0xd5, 0x00), Color::rgb(0x00, 0x75, 0x00)],
            final_gradient_steps: vec![12],
            final_gradient_direction: Direction::Radial,
            binary_colors: vec![
                Color::rgb(0x04, 0x4e, 0x29),
                Color::rgb(0x15, 0x7e, 0x38),
                Color::rgb(0x45, 0xbf, 0x55),
                Color::rgb(0x95, 0xed, 0x87),
            ],
            movement_speed: 1.0,
            active_binary_groups: 0.05,
        }
    }
}

const DIGIT_SCENE: &str = "binary_color";
const COLLAPSE_SCENE: &str = "collapse";
const BRIGHTEN_SCENE: &str = "brighten";

/// The digits of one character's code point. Scenes are registered on the
/// entities themselves.
struct BinaryGroup {
    source: EntityId,
    digits: Vec<EntityId>,
    released: usize,
    path: Rc<Path>,
}

impl BinaryGroup {
    fn arrived(&self, stage: &Stage) -> bool {
        self.digits.iter().all(|id| {
            stage
                .entity(*id)
                .map_or(true, |digit| digit.active_path().is_none())
        })
    }
}

enum Phase {
    Travel,
    Wipe(VecDeque<Vec<EntityId>>),
    Done,
}

struct BinaryDirector {
    rng: StdRng,
    pending: Vec<BinaryGroup>,
    active: Vec<BinaryGroup>,
    max_active: usize,
    phase: Phase,
}

fn registered_scene(stage: &Stage, id: EntityId, scene: &str) -> Option<Rc<Scene>> {
    stage.entity(id)?.query_scene(scene).cloned()
}

impl BinaryDirector {
    fn travel(&mut self, stage: &mut Stage) {
        while self.active.len() < self.max_active && !self.pending.is_empty() {
            let index = self.rng.gen_range(0..self.pending.len());
            self.active.push(self.pending.remove(index));
        }

        let mut index = 0;
        while index < self.active.len() {
            let group = &mut self.active[index];
            if let Some(&digit) = group.digits.get(group.released) {
                stage.set_visibility(digit, true);
                stage.activate_path(digit, &group.path);
                if let Some(color) = registered_scene(stage, digit, DIGIT_SCENE) {
                    stage.activate_scene(digit, &color);
                }
                group.released += 1;
                index += 1;
            } else if group.arrived(stage) {
                for &digit in &group.digits {
                    stage.set_visibility(digit, false);
                }
                stage.set_visibility(group.source, true);
                if let Some(collapse) = registered_scene(stage, group.source, COLLAPSE_SCENE) {
                    stage.activate_scene(group.source, &collapse);
                }
                self.active.remove(index);
            } else {
                index += 1;
            }
        }
    }
}

impl Director for BinaryDirector {
    fn direct(&mut self, stage: &mut Stage, _tick: u64) {
        if matches!(self.phase, Phase::Travel) {
            self.travel(stage);
            if self.pending.is_empty() && self.active.is_empty() && !stage.is_active() {
                self.phase = Phase::Wipe(stage.group(Grouping::DiagonalTopRightToBottomLeft).into());
            }
        }
        if let Phase::Wipe(groups) = &mut self.phase {
            match groups.pop_front() {
                Some(group) => {
                    for id in group {
                        if let Some(scene) = registered_scene(stage, id, BRIGHTEN_SCENE) {
                            stage.set_visibility(id, true);
                            stage.activate_scene(id, &scene);
                        }
                    }
                }
                None => self.phase = Phase::Done,
            }
        }
    }

    fn is_finished(&self, _stage: &Stage) -> bool {
        matches!(self.phase, Phase::Done)
    }
}

pub(super) fn build(
    config: &BinaryPathConfig,
    context: &BuildContext<'_>,
) -> Result<EffectIterator, EngineError> {
    check_ratio("binarypath", "active_binary_groups", config.active_binary_groups)?;
    if config.binary_colors.is_empty() {
        return Err(EngineError::InvalidEffectConfig {
            effect: "binarypath",
            message: "binary_colors must name at least one color".to_owned(),
        });
    }
    let mut stage = Stage::with_text(context.canvas, context.input, &context.ingest)?;
    let mut rng = StdRng::seed_from_u64(context.seed);
    let final_gradient = Gradient::new(&config.final_gradient_stops, &config.final_gradient_steps)?;
    let canvas = *stage.canvas();
    let bounds = canvas.bounds();

    let sources = stage
        .input_ids()
        .into_iter()
        .filter_map(|id| stage.entity(id).map(|entity| (id, entity.symbol(), entity.input_coord())))
        .collect::<Vec<_>>();

    let mut pending = Vec::with_capacity(sources.len());
    for (source, symbol, target) in sources {
        stage.set_visibility(source, false);
        let final_color = final_gradient.color_at(target, bounds, config.final_gradient_direction);
        let dim = final_color.adjust_brightness(0.5);

        let collapse = Gradient::uniform(&[Color::Rgb(Rgb::WHITE), dim], 10)?;
        let collapse = Scene::builder(COLLAPSE_SCENE)
            .easing(Easing::InQuad)
            .gradient_frames(&collapse, &[symbol], 7)
            .build()?;
        stage.register_scene(source, collapse);
        let bright = Gradient::uniform(&[dim, final_color], 10)?;
        let bright = Scene::builder(BRIGHTEN_SCENE)
            .gradient_frames(&bright, &[symbol], 2)
            .build()?;
        stage.register_scene(source, bright);

        let route = right_angle_route(&mut rng, &canvas, target);
        let path = route
            .iter()
            .skip(1)
            .fold(Path::builder("binary").speed(config.movement_speed), |path, coord| {
                path.to(*coord)
            })
            .build()?;

        let digits = format!("{:08b}", u32::from(symbol))
            .chars()
            .map(|digit| {
                let id = stage.spawn(digit, route[0]);
                stage.set_visibility(id, false);
                stage.set_layer(id, 1);
                let color = config.binary_colors[rng.gen_range(0..config.binary_colors.len())];
                let scene = Scene::builder(DIGIT_SCENE).symbol(digit, 1, Some(color)).build()?;
                stage.register_scene(id, scene);
                Ok(id)
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        pending.push(BinaryGroup {
            source,
            digits,
            released: 0,
            path: Rc::new(path),
        });
    }

    let max_active = ((config.active_binary_groups * pending.len() as f64) as usize).max(1);
    let director = BinaryDirector {
        rng,
        pending,
        active: Vec::new(),
        max_active,
        phase: Phase::Travel,
    };
    Ok(EffectIterator::new(stage, context.color_mode).with_director(director))
}

/// Alternating vertical and horizontal hops from just outside the canvas to
/// `target`. The first coordinate is the starting point.
fn right_angle_route(rng: &mut StdRng, canvas: &Canvas, target: Coord) -> Vec<Coord> {
    let mut route = vec![canvas.random_outside_coord(rng)];
    let mut vertical = rng.gen_bool(0.5);
    let row_hop_limit = (canvas.width() / 5).max(10);

    loop {
        let last = route[route.len() - 1];
        if last == target {
            break;
        }
        let column_gap = (target.column - last.column).unsigned_abs() as usize;
        let row_gap = (target.row - last.row).unsigned_abs() as usize;
        let next = if vertical && row_gap > 0 {
            let hop = rng.gen_range(1..=row_gap.min(row_hop_limit)) as i32;
            Coord::new(last.column, last.row + hop * (target.row - last.row).signum())
        } else if !vertical && column_gap > 0 {
            let hop = rng.gen_range(1..=column_gap.min(4)) as i32;
            Coord::new(last.column + hop * (target.column - last.column).signum(), last.row)
        } else {
            target
        };
        vertical = !vertical;
        route.push(next);
    }
    route
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{build, right_angle_route, BinaryPathConfig, BRIGHTEN_SCENE, COLLAPSE_SCENE, DIGIT_SCENE};
    use crate::canvas::{Canvas, IngestOptions};
    use crate::color::ColorMode;
    use crate::effects::BuildContext;
    use crate::geometry::Coord;

    #[test]
    fn route_moves_in_right_angles_and_ends_on_target() {
        let canvas = Canvas::new(30, 8).expect("canvas");
        let mut rng = StdRng::seed_from_u64(3);
        let target = Coord::new(12, 4);
        let route = right_angle_route(&mut rng, &canvas, target);
        assert!(!canvas.contains(route[0]));
        assert_eq!(route.last().copied(), Some(target));
        for pair in route.windows(2) {
            assert!(pair[0].column == pair[1].column || pair[0].row == pair[1].row);
        }
    }

    #[test]
    fn digits_collapse_into_the_input_text() {
        let context = BuildContext {
            input: "ok",
            canvas: Canvas::new(10, 3).expect("canvas"),
            ingest: IngestOptions::default(),
            color_mode: ColorMode::None,
            seed: 11,
        };
        let effect = build(&BinaryPathConfig::default(), &context).expect("effect");
        assert_eq!(effect.stage().len(), 2 + 16);
        for entity in effect.stage().entities() {
            let registered = [COLLAPSE_SCENE, BRIGHTEN_SCENE, DIGIT_SCENE]
                .map(|scene| entity.query_scene(scene).is_some());
            let expected = if entity.is_input() {
                [true, true, false]
            } else {
                [false, false, true]
            };
            assert_eq!(registered, expected);
        }
        let frames = effect.collect::<Vec<_>>();
        let last = frames.last().expect("frames");
        assert_eq!(last.to_plain_text().trim(), "ok");
        assert!(frames
            .iter()
            .any(|frame| frame.to_plain_text().contains('1')));
    }
}
