use crate::colony::agent::AgentSpec;
use crate::colony::observer::ColonyObserver;
use crate::colony::{Colony, ColonyError};

/// Place up to `count` copies of `template` at uniformly random positions
/// drawn from the colony's generator.
///
/// Each agent gets `attempts_per_agent` tries; a failed placement is simply
/// retried elsewhere. Returns how many agents were placed, which is less
/// than `count` when the grid is too crowded.
pub fn populate(
    colony: &mut Colony,
    template: &AgentSpec,
    count: u32,
    attempts_per_agent: u32,
    observer: &mut dyn ColonyObserver,
) -> Result<u32, ColonyError> {
    colony.check_fits(template.body_radius)?;

    let mut placed = 0;
    for _ in 0..count {
        for _ in 0..attempts_per_agent {
            let spec = AgentSpec {
                position: colony.random_position(template.body_radius),
                ..template.clone()
            };
            if colony.add_agent(&spec, observer)? {
                placed += 1;
                break;
            }
        }
    }
    Ok(placed)
}
