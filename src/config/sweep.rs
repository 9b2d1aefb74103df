use serde::{Deserialize, Serialize};

/// Parameter lists for `huddle sweep`. Every combination runs as its own colony.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_body_radii")]
    pub body_radii: Vec<u32>,
    #[serde(default = "default_sense_radii")]
    pub sense_radii: Vec<i32>,
    #[serde(default = "default_counts")]
    pub counts: Vec<u32>,
    #[serde(default = "default_movement_speeds")]
    pub movement_speeds: Vec<u32>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            body_radii: default_body_radii(),
            sense_radii: default_sense_radii(),
            counts: default_counts(),
            movement_speeds: default_movement_speeds(),
        }
    }
}

fn default_body_radii() -> Vec<u32> {
    vec![1, 2, 4, 7]
}
fn default_sense_radii() -> Vec<i32> {
    vec![5, 10, 25, 50, 100]
}
fn default_counts() -> Vec<u32> {
    vec![16, 32, 64, 128, 256]
}
fn default_movement_speeds() -> Vec<u32> {
    vec![1, 2, 5, 10, 20]
}

/// One point of the sweep grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepCase {
    pub body_radius: u32,
    pub sense_radius: i32,
    pub count: u32,
    pub movement_speed: u32,
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();
        if self.body_radii.is_empty()
            || self.sense_radii.is_empty()
            || self.counts.is_empty()
            || self.movement_speeds.is_empty()
        {
            errors.push("sweep lists must not be empty".to_string());
        }
        if self.body_radii.contains(&0) {
            errors.push(format!(
                "sweep.body_radii entries must be >= 1, got {:?}. Example: body_radii = [1, 2, 4]",
                self.body_radii
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Cartesian product, body radius outermost.
    pub fn combinations(&self) -> Vec<SweepCase> {
        let mut cases = Vec::with_capacity(
            self.body_radii.len() * self.sense_radii.len() * self.counts.len() * self.movement_speeds.len(),
        );
        for &body_radius in &self.body_radii {
            for &sense_radius in &self.sense_radii {
                for &count in &self.counts {
                    for &movement_speed in &self.movement_speeds {
                        cases.push(SweepCase {
                            body_radius,
                            sense_radius,
                            count,
                            movement_speed,
                        });
                    }
                }
            }
        }
        cases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_has_every_combination() {
        let sweep = SweepConfig::default();
        let cases = sweep.combinations();
        assert_eq!(cases.len(), 4 * 5 * 5 * 5);
        assert_eq!(
            cases[0],
            SweepCase { body_radius: 1, sense_radius: 5, count: 16, movement_speed: 1 }
        );
        assert_eq!(
            cases[1],
            SweepCase { body_radius: 1, sense_radius: 5, count: 16, movement_speed: 2 }
        );
        assert_eq!(cases.last().map(|c| c.body_radius), Some(7));
    }

    #[test]
    fn partial_table_keeps_defaults() {
        let sweep: SweepConfig = toml::from_str("body_radii = [3]\ncounts = [8, 9]").unwrap();
        assert_eq!(sweep.body_radii, vec![3]);
        assert_eq!(sweep.sense_radii, vec![5, 10, 25, 50, 100]);
        assert_eq!(sweep.combinations().len(), 2 * 5 * 5);
    }

    #[test]
    fn empty_list_rejected() {
        let sweep = SweepConfig {
            counts: Vec::new(),
            ..SweepConfig::default()
        };
        assert!(sweep.validate().is_err());
        assert!(sweep.combinations().is_empty());
    }

    #[test]
    fn zero_radius_rejected() {
        let sweep = SweepConfig {
            body_radii: vec![0, 2],
            ..SweepConfig::default()
        };
        let err = sweep.validate().unwrap_err();
        assert!(err.contains("sweep.body_radii"));
    }
}
