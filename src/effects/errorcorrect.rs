use std::collections::VecDeque;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{check_ratio, BuildContext};
use crate::color::Color;
use crate::engine::{Director, EffectIterator};
use crate::entity::EntityId;
use crate::error::EngineError;
use crate::event::{Action, Trigger};
use crate::geometry::Coord;
use crate::gradient::{Direction, Gradient};
use crate::motion::Path;
use crate::scene::{Scene, SyncMode};
use crate::stage::Stage;

const BLOCK: char = '▓';
const WIPE_UP: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const WIPE_DOWN: [char; 7] = ['▇', '▆', '▅', '▄', '▃', '▂', '▁'];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorCorrectConfig {
    /// Fraction of characters that start out swapped, in (0, 1].
    pub error_pairs: f64,
    /// Ticks between two pairs starting their correction.
    pub swap_delay: u32,
    pub error_color: Color,
    pub correct_color: Color,
    pub final_gradient_stops: Vec<Color>,
    pub final_gradient_steps: Vec<u32>,
    pub final_gradient_direction: Direction,
    pub movement_speed: f64,
}

impl Default for ErrorCorrectConfig {
    fn default() -> Self {
        Self {
            error_pairs: 0.1,
            swap_delay: 10,
            error_color: Color::rgb(0xe7, 0x4c, 0x3c),
            correct_color: Color::rgb(0x45, 0xbf, 0x55),
            final_gradient_stops: vec![
                Color::rgb(0x8a, 0x00, 0x8a),
                Color::rgb(0x00, 0xd1, 0xff),
                Color::rgb(0xff, 0xff, 0xff),
            ],
            final_gradient_steps: vec![12],
            final_gradient_direction: Direction::Vertical,
            movement_speed: 0.5,
        }
    }
}

const ERROR_SCENE: &str = "error";

/// Starts one swapped pair every `swap_delay` ticks.
struct SwapDirector {
    pairs: VecDeque<[EntityId; 2]>,
    swap_delay: u32,
    countdown: u32,
}

impl Director for SwapDirector {
    fn direct(&mut self, stage: &mut Stage, _tick: u64) {
        if self.countdown > 0 {
            self.countdown -= 1;
            return;
        }
        if let Some(pair) = self.pairs.pop_front() {
            for id in pair {
                let error = stage
                    .entity(id)
                    .and_then(|entity| entity.query_scene(ERROR_SCENE))
                    .cloned();
                if let Some(error) = error {
                    stage.activate_scene(id, &error);
                }
            }
            self.countdown = self.swap_delay;
        }
    }

    fn is_finished(&self, _stage: &Stage) -> bool {
        self.pairs.is_empty()
    }
}

pub(super) fn build(
    config: &ErrorCorrectConfig,
    context: &BuildContext<'_>,
) -> Result<EffectIterator, EngineError> {
    check_ratio("errorcorrect", "error_pairs", config.error_pairs)?;
    let mut stage = Stage::with_text(context.canvas, context.input, &context.ingest)?;
    let mut rng = StdRng::seed_from_u64(context.seed);

    let final_gradient = Gradient::new(&config.final_gradient_stops, &config.final_gradient_steps)?;
    let correcting = Gradient::uniform(&[config.error_color, config.correct_color], 10)?;
    let bounds = stage.canvas().bounds();

    let ids = stage.input_ids();
    let final_colors = ids
        .iter()
        .map(|id| {
            let coord = stage.entity(*id).map(|entity| entity.input_coord());
            coord.map(|coord| final_gradient.color_at(coord, bounds, config.final_gradient_direction))
        })
        .collect::<Vec<_>>();

    for (id, color) in ids.iter().zip(&final_colors) {
        let (Some(entity), Some(color)) = (stage.entity(*id), color) else {
            continue;
        };
        let spawn = Scene::builder("spawn")
            .symbol(entity.symbol(), 1, Some(*color))
            .build()?;
        stage.activate_scene(*id, &Rc::new(spawn));
    }

    let mut unpaired = ids
        .iter()
        .zip(&final_colors)
        .filter_map(|(id, color)| {
            let entity = stage.entity(*id)?;
            Some(Swapped {
                id: *id,
                symbol: entity.symbol(),
                input_coord: entity.input_coord(),
                final_color: *color,
            })
        })
        .collect::<Vec<_>>();
    let pair_count = (config.error_pairs * ids.len() as f64) as usize;
    let mut pairs = VecDeque::new();
    for _ in 0..pair_count {
        if unpaired.len() < 2 {
            break;
        }
        let first = unpaired.remove(rng.gen_range(0..unpaired.len()));
        let second = unpaired.remove(rng.gen_range(0..unpaired.len()));
        stage.set_coordinate(first.id, second.input_coord);
        stage.set_coordinate(second.id, first.input_coord);

        choreograph(&mut stage, config, &correcting, &first)?;
        choreograph(&mut stage, config, &correcting, &second)?;
        pairs.push_back([first.id, second.id]);
    }

    let director = SwapDirector {
        pairs,
        swap_delay: config.swap_delay,
        countdown: 0,
    };
    Ok(EffectIterator::new(stage, context.color_mode).with_director(director))
}

/// One character of a swapped pair.
struct Swapped {
    id: EntityId,
    symbol: char,
    input_coord: Coord,
    final_color: Option<Color>,
}

/// Registers the error, wipe, travel and settle chain for one swapped
/// character. The chain starts when the director activates its
/// [`ERROR_SCENE`].
fn choreograph(
    stage: &mut Stage,
    config: &ErrorCorrectConfig,
    correcting: &Gradient,
    swapped: &Swapped,
) -> Result<(), EngineError> {
    let Swapped {
        id,
        symbol,
        input_coord,
        final_color,
    } = *swapped;
    let final_color = final_color.unwrap_or(config.correct_color);

    let initial = Scene::builder("initial")
        .symbol(symbol, 1, Some(config.error_color))
        .build()?;
    let mut error = Scene::builder(ERROR_SCENE);
    for _ in 0..10 {
        error = error
            .symbol(BLOCK, 3, Some(config.error_color))
            .symbol(symbol, 3, Some(Color::rgb(0xff, 0xff, 0xff)));
    }
    let error = stage.register_scene(id, error.build()?);
    let wipe_up = WIPE_UP
        .iter()
        .fold(Scene::builder("wipe_up"), |scene, block| {
            scene.symbol(*block, 3, Some(config.error_color))
        })
        .build()?;
    let wipe_up = stage.register_scene(id, wipe_up);
    let wipe_down = WIPE_DOWN
        .iter()
        .fold(Scene::builder("wipe_down"), |scene, block| {
            scene.symbol(*block, 3, Some(config.correct_color))
        })
        .build()?;
    let wipe_down = stage.register_scene(id, wipe_down);
    let travel_scene = Scene::builder("correcting")
        .sync(SyncMode::PathProgress)
        .gradient_frames(correcting, &['█'], 3)
        .build()?;
    let travel_scene = stage.register_scene(id, travel_scene);
    let settle = Gradient::uniform(&[config.correct_color, final_color], 10)?;
    let settle = Scene::builder("final")
        .gradient_frames(&settle, &[symbol], 3)
        .build()?;
    let settle = stage.register_scene(id, settle);
    let home = Path::builder("input_coord")
        .speed(config.movement_speed)
        .to(input_coord)
        .build()?;
    let home = stage.register_path(id, home);

    stage.activate_scene(id, &Rc::new(initial));
    stage.on(id, Trigger::scene_complete(&error), Action::activate_scene(&wipe_up));
    stage.on(id, Trigger::scene_complete(&wipe_up), Action::activate_scene(&travel_scene));
    stage.on(id, Trigger::scene_complete(&wipe_up), Action::activate_path(&home));
    stage.on(id, Trigger::path_activated(&home), Action::set_layer(1));
    stage.on(id, Trigger::path_complete(&home), Action::set_layer(0));
    stage.on(id, Trigger::path_complete(&home), Action::activate_scene(&wipe_down));
    stage.on(id, Trigger::scene_complete(&wipe_down), Action::activate_scene(&settle));
    Ok(())
}
