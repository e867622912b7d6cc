use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::BuildContext;
use crate::canvas::Canvas;
use crate::color::Color;
use crate::easing::Easing;
use crate::engine::{Director, EffectIterator};
use crate::entity::{Entity, EntityId};
use crate::error::EngineError;
use crate::geometry::{coords_in_circle, Coord};
use crate::gradient::{Direction, Gradient};
use crate::motion::{Path, Waypoint};
use crate::scene::Visual;
use crate::stage::Stage;

const SPOTLIGHT: char = 'O';
const CENTER_PATH: &str = "center";
const CENTER_SPEED: f64 = 0.5;
/// Search legs per spotlight, chained into a loop.
const SEARCH_LEGS: usize = 11;
const PLACEMENT_ATTEMPTS: usize = 64;
/// Brightness of unlit characters and the floor of the beam falloff.
const DIM: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpotlightsConfig {
    pub final_gradient_stops: Vec<Color>,
    pub final_gradient_steps: Vec<u32>,
    pub final_gradient_direction: Direction,
    /// Beam radius is `min(width, height) / beam_width_ratio`, at least one
    /// cell.
    pub beam_width_ratio: f64,
    /// Outer share of the beam where brightness fades, in [0, 1].
    pub beam_falloff: f64,
    /// Ticks spent searching before the spotlights converge on the center.
    pub search_duration: u32,
    /// Each search leg picks a speed from this inclusive range.
    pub search_speed_range: [f64; 2],
    pub spotlight_count: usize,
}

impl Default for SpotlightsConfig {
    fn default() -> Self {
        Self {
            final_gradient_stops: vec![
                Color::rgb(0xab, 0x48, 0xff),
                Color::rgb(0xe7, 0xb2, 0xb2),
                Color::rgb(0xff, 0xfe, 0xbd),
            ],
            final_gradient_steps: vec![12],
            final_gradient_direction: Direction::Vertical,
            beam_width_ratio: 2.0,
            beam_falloff: 0.3,
            search_duration: 750,
            search_speed_range: [0.25, 0.5],
            spotlight_count: 3,
        }
    }
}

impl SpotlightsConfig {
    fn validate(&self) -> Result<(), EngineError> {
        let invalid = |message: String| EngineError::InvalidEffectConfig {
            effect: "spotlights",
            message,
        };
        if !self.beam_width_ratio.is_finite() || self.beam_width_ratio <= 0.0 {
            return Err(invalid(format!(
                "beam_width_ratio must be > 0, got {}",
                self.beam_width_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.beam_falloff) {
            return Err(invalid(format!(
                "beam_falloff must be in [0, 1], got {}",
                self.beam_falloff
            )));
        }
        if self.search_duration == 0 {
            return Err(invalid("search_duration must be >= 1".to_owned()));
        }
        let [low, high] = self.search_speed_range;
        if !(low.is_finite() && high.is_finite() && low > 0.0 && low <= high) {
            return Err(invalid(format!(
                "search_speed_range must be two speeds with 0 < low <= high, got [{low}, {high}]"
            )));
        }
        if self.spotlight_count == 0 {
            return Err(invalid("spotlight_count must be >= 1".to_owned()));
        }
        Ok(())
    }
}

/// Colors of one input character in and out of the light.
#[derive(Debug, Clone, Copy)]
struct Shade {
    symbol: char,
    bright: Color,
    dark: Color,
}

/// Lights the characters near each spotlight, calls the spotlights home once
/// the search is over, then widens a single beam until the canvas is lit.
struct SpotlightDirector {
    spotlights: Vec<EntityId>,
    shades: HashMap<EntityId, Shade>,
    lit: BTreeSet<EntityId>,
    range: usize,
    falloff: f64,
    search_remaining: u32,
    expand_limit: f64,
    complete: bool,
}

impl SpotlightDirector {
    fn illuminate(&mut self, stage: &mut Stage) {
        let beams = self
            .spotlights
            .iter()
            .filter_map(|id| stage.entity(*id).map(Entity::coord))
            .collect::<Vec<_>>();
        let in_range = beams
            .iter()
            .flat_map(|beam| coords_in_circle(*beam, self.range))
            .filter_map(|coord| stage.entity_at_input(coord))
            .collect::<BTreeSet<_>>();

        for id in self.lit.difference(&in_range) {
            if let Some(shade) = self.shades.get(id) {
                stage.set_appearance(*id, Visual::plain(shade.symbol).fg(shade.dark));
            }
        }

        let range = self.range as f64;
        let full = range * (1.0 - self.falloff);
        for id in &in_range {
            let (Some(shade), Some(entity)) = (self.shades.get(id), stage.entity(*id)) else {
                continue;
            };
            let target = entity.input_coord();
            let distance = beams
                .iter()
                .map(|beam| beam.distance_weighted(target))
                .fold(f64::INFINITY, f64::min);
            let color = if distance > full && self.falloff > 0.0 {
                let factor = 1.0 - (distance - full) / (range * self.falloff);
                shade.bright.adjust_brightness(factor.max(DIM))
            } else {
                shade.bright
            };
            stage.set_appearance(*id, Visual::plain(shade.symbol).fg(color));
        }
        self.lit = in_range;
    }

    fn converge(&self, stage: &mut Stage) {
        for &id in &self.spotlights {
            let center = stage
                .entity(id)
                .and_then(|spotlight| spotlight.query_path(CENTER_PATH))
                .cloned();
            if let Some(center) = center {
                stage.activate_path(id, &center);
            }
        }
    }
}

impl Director for SpotlightDirector {
    fn direct(&mut self, stage: &mut Stage, _tick: u64) {
        if self.complete {
            return;
        }
        self.illuminate(stage);
        if self.search_remaining > 0 {
            self.search_remaining -= 1;
            if self.search_remaining == 0 {
                self.converge(stage);
            }
        }

        let moving = self.spotlights.iter().any(|id| {
            stage
                .entity(*id)
                .is_some_and(|spotlight| spotlight.active_path().is_some())
        });
        if !moving {
            self.spotlights.truncate(1);
            self.range += 1;
            if self.range as f64 > self.expand_limit {
                self.complete = true;
            }
        }
    }

    fn is_finished(&self, _stage: &Stage) -> bool {
        self.complete
    }
}

pub(super) fn build(
    config: &SpotlightsConfig,
    context: &BuildContext<'_>,
) -> Result<EffectIterator, EngineError> {
    config.validate()?;
    let mut stage = Stage::with_text(context.canvas, context.input, &context.ingest)?;
    let mut rng = StdRng::seed_from_u64(context.seed);
    let gradient = Gradient::new(&config.final_gradient_stops, &config.final_gradient_steps)?;
    let canvas = *stage.canvas();
    let bounds = canvas.bounds();

    let mut shades = HashMap::new();
    for id in stage.input_ids() {
        let Some(entity) = stage.entity(id) else {
            continue;
        };
        let symbol = entity.symbol();
        let bright = gradient.color_at(entity.input_coord(), bounds, config.final_gradient_direction);
        let dark = bright.adjust_brightness(DIM);
        stage.set_appearance(id, Visual::plain(symbol).fg(dark));
        shades.insert(id, Shade { symbol, bright, dark });
    }

    let spotlights = (0..config.spotlight_count)
        .map(|_| spotlight(&mut stage, &mut rng, config))
        .collect::<Result<Vec<_>, EngineError>>()?;

    let short_side = canvas.width().min(canvas.height()) as f64;
    let range = ((short_side / config.beam_width_ratio).floor() as usize).max(1);
    let long_side = canvas.width().max(canvas.height()) as f64;
    let director = SpotlightDirector {
        spotlights,
        shades,
        lit: BTreeSet::new(),
        range,
        falloff: config.beam_falloff,
        search_remaining: config.search_duration,
        expand_limit: (long_side / 1.5).floor(),
        complete: false,
    };
    Ok(EffectIterator::new(stage, context.color_mode).with_director(director))
}

/// Spawns a hidden spotlight off the canvas with a looping chain of search
/// legs and a registered path to the center.
fn spotlight(
    stage: &mut Stage,
    rng: &mut StdRng,
    config: &SpotlightsConfig,
) -> Result<EntityId, EngineError> {
    let canvas = *stage.canvas();
    let id = stage.spawn(SPOTLIGHT, canvas.random_outside_coord(rng));
    stage.set_visibility(id, false);

    let spacing = f64::from(canvas.right() / 4);
    let [low, high] = config.search_speed_range;
    let mut target = canvas.random_coord(rng);
    let mut legs = Vec::with_capacity(SEARCH_LEGS);
    for index in 0..SEARCH_LEGS {
        if index > 0 {
            target = coord_at_distance(rng, &canvas, target, spacing);
        }
        let leg = Path::builder(index.to_string())
            .speed(rng.gen_range(low..=high))
            .easing(Easing::InOutQuad)
            .waypoint(Waypoint::new(target).quadratic(canvas.random_outside_coord(rng)))
            .build()?;
        legs.push(stage.register_path(id, leg));
    }
    stage.chain_paths(id, &legs, true);

    let center = Path::builder(CENTER_PATH)
        .speed(CENTER_SPEED)
        .easing(Easing::InOutSine)
        .to(canvas.center())
        .build()?;
    stage.register_path(id, center);
    stage.activate_path(id, &legs[0]);
    Ok(id)
}

/// A random canvas cell at least `spacing` away from `origin`, or the last
/// candidate tried when none is found.
fn coord_at_distance(rng: &mut StdRng, canvas: &Canvas, origin: Coord, spacing: f64) -> Coord {
    let mut candidate = canvas.random_coord(rng);
    for _ in 1..PLACEMENT_ATTEMPTS {
        if origin.distance(candidate) >= spacing {
            break;
        }
        candidate = canvas.random_coord(rng);
    }
    candidate
}
