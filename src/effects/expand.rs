use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::BuildContext;
use crate::color::Color;
use crate::easing::Easing;
use crate::engine::EffectIterator;
use crate::error::EngineError;
use crate::gradient::{Direction, Gradient};
use crate::motion::Path;
use crate::scene::Scene;
use crate::stage::Stage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExpandConfig {
    pub movement_speed: f64,
    pub expand_easing: Easing,
    pub final_gradient_stops: Vec<Color>,
    pub final_gradient_steps: Vec<u32>,
    /// Ticks each gradient color is shown while characters travel.
    pub final_gradient_frames: u32,
    pub final_gradient_direction: Direction,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            movement_speed: 0.35,
            expand_easing: Easing::InOutQuart,
            final_gradient_stops: vec![
                Color::rgb(0x8a, 0x00, 0x8a),
                Color::rgb(0x00, 0xd1, 0xff),
                Color::rgb(0xff, 0xff, 0xff),
            ],
            final_gradient_steps: vec![12],
            final_gradient_frames: 5,
            final_gradient_direction: Direction::Vertical,
        }
    }
}

pub(super) fn build(
    config: &ExpandConfig,
    context: &BuildContext<'_>,
) -> Result<EffectIterator, EngineError> {
    let mut stage = Stage::with_text(context.canvas, context.input, &context.ingest)?;
    let gradient = Gradient::new(&config.final_gradient_stops, &config.final_gradient_steps)?;
    if config.final_gradient_frames == 0 {
        return Err(EngineError::InvalidEffectConfig {
            effect: "expand",
            message: "final_gradient_frames must be >= 1".to_owned(),
        });
    }

    let bounds = stage.text_bounds();
    let center = stage.canvas().center();
    for id in stage.input_ids() {
        let Some(entity) = stage.entity(id) else {
            continue;
        };
        let (symbol, target) = (entity.symbol(), entity.input_coord());
        let final_color = gradient.color_at(target, bounds, config.final_gradient_direction);

        let path = Path::builder("expand")
            .speed(config.movement_speed)
            .easing(config.expand_easing)
            .to(target)
            .build()?;
        let fade = Gradient::uniform(&[gradient.first(), final_color], 8)?;
        let scene = Scene::builder("expand_gradient")
            .gradient_frames(&fade, &[symbol], config.final_gradient_frames)
            .build()?;

        stage.set_coordinate(id, center);
        stage.activate_path(id, &Rc::new(path));
        stage.activate_scene(id, &Rc::new(scene));
    }

    Ok(EffectIterator::new(stage, context.color_mode))
}
