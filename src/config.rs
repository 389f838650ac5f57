// Copyright 2017 Matthew Plant. This file is part of Kinetic.
//
// Kinetic is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Kinetic is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with Kinetic. If not, see <http://www.gnu.org/licenses/>.


//! Tuning parameters for the solver and the world.
//!
//! Constants that the inner solver loops depend on are supplied at compile
//! time through the `PhysicsConfig` trait. Everything a game may want to
//! change at run time lives in `WorldSettings`, which can be read from TOML.

use std::path::Path;

use cgmath::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A type that describes parameters used when resolving contacts.
pub trait PhysicsConfig {
    /// Fraction of the remaining penetration corrected per step.
    const BAUMGARTE: f32;
    /// Penetration that is tolerated without any position correction.
    const PENETRATION_SLOP: f32;
    /// Distance a cached contact may drift, along or across its normal,
    /// before it is discarded.
    const PERSISTENT_MARGIN: f32;
    /// Closing speed below which restitution is ignored.
    const RESTITUTION_VELOCITY_LIMIT: f32;
}

/// The suggested set of parameters to use when resolving collisions.
pub struct DefaultPhysConfig {}

impl PhysicsConfig for DefaultPhysConfig {
    const BAUMGARTE: f32 = 0.9;
    const PENETRATION_SLOP: f32 = 0.01;
    const PERSISTENT_MARGIN: f32 = 0.2;
    const RESTITUTION_VELOCITY_LIMIT: f32 = 0.25;
}

/// Errors produced while loading or validating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Run-time settings of a `World`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Acceleration applied to every dynamic body.
    pub gravity: Vector3<f32>,
    /// Length of one step taken by `World::advance`.
    pub fixed_timestep: f32,
    /// Most steps `World::advance` takes per call. Time beyond that is
    /// dropped.
    pub max_substeps: u32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        WorldSettings {
            gravity: Vector3::new(0.0, -9.81, 0.0),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 8,
            velocity_iterations: 8,
            position_iterations: 3,
        }
    }
}

impl WorldSettings {
    /// Parses settings from TOML text. Missing keys take their default value.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let settings: WorldSettings = toml::from_str(s)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads settings from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Checks that the settings describe a usable simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(ConfigError::Invalid {
                field: "fixed_timestep",
                reason: format!("must be positive and finite, got {}", self.fixed_timestep),
            });
        }
        if self.max_substeps == 0 {
            return Err(ConfigError::Invalid {
                field: "max_substeps",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.velocity_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "velocity_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.gravity.x.is_finite() && self.gravity.y.is_finite() && self.gravity.z.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "gravity",
                reason: format!("must be finite, got {:?}", self.gravity),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    mod settings {
        use cgmath::Vector3;

        use crate::config::*;

        #[test]
        fn test_defaults_are_valid() {
            let settings = WorldSettings::default();
            assert!(settings.validate().is_ok());
            assert_eq!(settings.gravity, Vector3::new(0.0, -9.81, 0.0));
        }

        #[test]
        fn test_partial_toml() {
            let settings = WorldSettings::from_toml_str(r#"
                fixed_timestep = 0.01
                velocity_iterations = 12

                [gravity]
                x = 0.0
                y = -1.62
                z = 0.0
            "#).unwrap();
            assert_eq!(settings.fixed_timestep, 0.01);
            assert_eq!(settings.velocity_iterations, 12);
            assert_eq!(settings.gravity, Vector3::new(0.0, -1.62, 0.0));
            // Untouched keys keep their defaults.
            assert_eq!(settings.max_substeps, WorldSettings::default().max_substeps);
        }

        #[test]
        fn test_toml_round_trip() {
            let settings = WorldSettings {
                max_substeps: 3,
                ..WorldSettings::default()
            };
            let text = settings.to_toml_string().unwrap();
            assert_eq!(WorldSettings::from_toml_str(&text).unwrap(), settings);
        }

        #[test]
        fn test_rejects_bad_values() {
            match WorldSettings::from_toml_str("fixed_timestep = -1.0") {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "fixed_timestep"),
                other => panic!("expected invalid timestep, got {:?}", other),
            }
            match WorldSettings::from_toml_str("max_substeps = 0") {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "max_substeps"),
                other => panic!("expected invalid substeps, got {:?}", other),
            }
            assert!(matches!(WorldSettings::from_toml_str("fixed_timestep = \"fast\""),
                             Err(ConfigError::Parse(_))));
        }

        #[test]
        fn test_missing_file() {
            assert!(matches!(WorldSettings::load_from_file("/nonexistent/kinetic.toml"),
                             Err(ConfigError::Io(_))));
        }
    }
}
