//! Movement input for a headless client: a fixed script or a random walk.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{MoveFlags, MoveKey};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("unknown movement token {token:?} at position {position}")]
    UnknownToken { token: String, position: usize },
    #[error("movement script is empty")]
    Empty,
}

/// One script step. `None` idles for a step.
pub type Step = Option<MoveFlags>;

/// Parses whitespace or comma separated tokens: `U`, `D`, `L`, `R`, the
/// diagonals `UL`, `UR`, `DL`, `DR`, and `.` to idle. Case is ignored.
pub fn parse_script(script: &str) -> Result<Vec<Step>, ScriptError> {
    let steps = script
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(position, token)| {
            let keys: &[MoveKey] = match token.to_ascii_uppercase().as_str() {
                "." => return Ok(None),
                "U" => &[MoveKey::Up],
                "D" => &[MoveKey::Down],
                "L" => &[MoveKey::Left],
                "R" => &[MoveKey::Right],
                "UL" => &[MoveKey::Up, MoveKey::Left],
                "UR" => &[MoveKey::Up, MoveKey::Right],
                "DL" => &[MoveKey::Down, MoveKey::Left],
                "DR" => &[MoveKey::Down, MoveKey::Right],
                _ => {
                    return Err(ScriptError::UnknownToken {
                        token: token.to_string(),
                        position: position + 1,
                    })
                }
            };
            Ok(Some(MoveFlags::from_keys(keys)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if steps.is_empty() {
        return Err(ScriptError::Empty);
    }
    Ok(steps)
}

enum Source {
    Script { steps: Vec<Step>, next: usize },
    Wander(StdRng),
}

/// Produces at most one movement every `step_frames` frames.
pub struct InputManager {
    source: Source,
    step_frames: u64,
    frame: u64,
}

impl InputManager {
    /// Loops over `script` forever.
    pub fn scripted(script: &str, step_frames: u64) -> Result<Self, ScriptError> {
        Ok(Self {
            source: Source::Script {
                steps: parse_script(script)?,
                next: 0,
            },
            step_frames: step_frames.max(1),
            frame: 0,
        })
    }

    pub fn wander(step_frames: u64) -> Self {
        Self::wander_seeded(rand::thread_rng().gen(), step_frames)
    }

    pub fn wander_seeded(seed: u64, step_frames: u64) -> Self {
        Self {
            source: Source::Wander(StdRng::seed_from_u64(seed)),
            step_frames: step_frames.max(1),
            frame: 0,
        }
    }

    /// Advances one frame. Returns the keys to press on step frames.
    pub fn update(&mut self) -> Option<MoveFlags> {
        self.frame += 1;
        if self.frame % self.step_frames != 0 {
            return None;
        }

        match &mut self.source {
            Source::Script { steps, next } => {
                let step = steps[*next % steps.len()];
                *next = (*next + 1) % steps.len();
                step
            }
            Source::Wander(rng) => {
                if rng.gen_bool(0.2) {
                    return None;
                }
                let x = rng.gen_range(-1..=1);
                let y = rng.gen_range(-1..=1);
                shared::Direction::new(x, y).map(MoveFlags::from_direction)
            }
        }
    }
}
