//! Component placement on a circuit grid.
//!
//! `width * height` components are placed on a grid of as many slots. Each
//! component is wired to its right and down neighbours; the goal is the
//! placement that minimizes total wire length.
//!
//! Layout convention: the slot of component `(x, y)` is
//! `candidate[x + y * width]`, and slot `p` sits at grid coordinates
//! `(p % width, p / width)` scaled by [`PITCH`].

use mlb_types::{Candidate, ConfigurationError, Parameters, Problem, ProblemConfig, Scope};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

/// Spacing between two adjacent grid slots.
pub const PITCH: i64 = 5;

/// Largest accepted `width * height`.
pub const MAX_COMPONENTS: usize = 10_000;

/// Wire length metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    /// `|dx| + |dy|`
    Cityblock,
    /// Squared euclidean distance, `dx² + dy²`.
    Euclidean,
}

impl Distance {
    fn parse(value: &str) -> Self {
        match value {
            "cityblock" => Self::Cityblock,
            "euclidean" => Self::Euclidean,
            other => {
                warn!(distance = other, "unknown distance, using euclidean");
                Self::Euclidean
            }
        }
    }

    fn between(self, a: (i64, i64), b: (i64, i64)) -> i64 {
        let dx = a.0 - b.0;
        let dy = a.1 - b.1;
        match self {
            Self::Cityblock => dx.abs() + dy.abs(),
            Self::Euclidean => dx * dx + dy * dy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Circuit {
    name: String,
    width: usize,
    height: usize,
    distance: Distance,
    scope: Scope,
}

impl Circuit {
    pub const IMPLEMENTATION: &'static str = "Circuit";

    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        distance: Distance,
    ) -> Result<Self, ConfigurationError> {
        if width == 0 {
            return Err(ConfigurationError::invalid(Self::IMPLEMENTATION, "width", "must be >= 1"));
        }
        if height == 0 {
            return Err(ConfigurationError::invalid(Self::IMPLEMENTATION, "height", "must be >= 1"));
        }
        let slots = width
            .checked_mul(height)
            .filter(|slots| *slots <= MAX_COMPONENTS)
            .ok_or_else(|| {
                ConfigurationError::invalid(
                    Self::IMPLEMENTATION,
                    "width",
                    format!("width * height must be at most {MAX_COMPONENTS}"),
                )
            })?;
        let scope = Scope {
            dimensions: (0..slots)
                .map(|_| mlb_types::Dimension::integer(0, slots as i64 - 1))
                .collect(),
        };
        Ok(Self {
            name: name.into(),
            width,
            height,
            distance,
            scope,
        })
    }

    pub fn from_config(config: &ProblemConfig) -> Result<Self, ConfigurationError> {
        Self::from_parameters(&config.name, &config.parameters)
    }

    pub fn from_parameters(name: &str, params: &Parameters) -> Result<Self, ConfigurationError> {
        let width = positive(params, "width")?;
        let height = positive(params, "height")?;
        let distance = Distance::parse(&params.string(Self::IMPLEMENTATION, "distance", Some("euclidean"))?);
        Self::new(name, width, height, distance)
    }

    /// Score assigned to placements that put two components in the same slot.
    pub fn duplicate_penalty(&self) -> f64 {
        let n = (self.width * self.height) as f64 * 25.0;
        n * n
    }

    fn slot_coordinates(&self, slot: i64) -> (i64, i64) {
        let width = self.width as i64;
        ((slot % width) * PITCH, (slot / width) * PITCH)
    }

    fn slot_of(&self, slots: &[i64], x: usize, y: usize) -> (i64, i64) {
        self.slot_coordinates(slots[x + y * self.width])
    }
}

fn positive(params: &Parameters, key: &str) -> Result<usize, ConfigurationError> {
    let value = params.integer(Circuit::IMPLEMENTATION, key, Some(5))?;
    usize::try_from(value)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| ConfigurationError::invalid(Circuit::IMPLEMENTATION, key, "must be >= 1"))
}

impl Problem for Circuit {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn evaluate(&self, candidate: &Candidate) -> f64 {
        let slots: Vec<i64> = candidate.values().iter().map(|v| v.as_i64()).collect();
        let count = self.width * self.height;
        if slots.len() != count || slots.iter().any(|s| *s < 0 || *s >= count as i64) {
            return self.duplicate_penalty();
        }
        let mut seen = vec![false; count];
        for slot in &slots {
            if std::mem::replace(&mut seen[*slot as usize], true) {
                return self.duplicate_penalty();
            }
        }

        let mut length = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                let here = self.slot_of(&slots, x, y);
                if x + 1 < self.width {
                    length += self.distance.between(here, self.slot_of(&slots, x + 1, y));
                }
                if y + 1 < self.height {
                    length += self.distance.between(here, self.slot_of(&slots, x, y + 1));
                }
            }
        }
        length as f64
    }

    fn is_better(&self, a: f64, b: f64) -> bool {
        a < b
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "implementation": Self::IMPLEMENTATION,
            "width": self.width,
            "height": self.height,
            "distance": self.distance,
            "scope": self.scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circuit(width: usize, height: usize, distance: Distance) -> Circuit {
        Circuit::new("test", width, height, distance).unwrap()
    }

    #[test]
    fn scope_has_one_slot_variable_per_component() {
        let c = circuit(2, 3, Distance::Cityblock);
        assert_eq!(c.scope().len(), 6);
        assert!(c.scope().all_integer());
        assert!(c.scope().iter().all(|d| d.min == 0.0 && d.max == 5.0));
    }

    #[test]
    fn identity_placement_has_minimal_cityblock_length() {
        // 2x2 grid: 4 edges, each one pitch long.
        let c = circuit(2, 2, Distance::Cityblock);
        let identity = Candidate::from(vec![0, 1, 2, 3]);
        assert_eq!(c.evaluate(&identity), 4.0 * PITCH as f64);

        // crossing the wires of the top row stretches them
        let swapped = Candidate::from(vec![0, 3, 1, 2]);
        assert_eq!(c.evaluate(&swapped), 6.0 * PITCH as f64);
        assert!(c.is_better(c.evaluate(&identity), c.evaluate(&swapped)));
    }

    #[test]
    fn euclidean_is_squared() {
        let c = circuit(2, 1, Distance::Euclidean);
        assert_eq!(c.evaluate(&Candidate::from(vec![0, 1])), (PITCH * PITCH) as f64);
    }

    #[test]
    fn duplicates_get_penalty_instead_of_failing() {
        let c = circuit(2, 2, Distance::Cityblock);
        let dup = Candidate::from(vec![0, 0, 1, 2]);
        assert_eq!(c.evaluate(&dup), (2.0 * 2.0 * 25.0f64).powi(2));
        assert_eq!(c.evaluate(&Candidate::from(vec![0, 1])), c.duplicate_penalty());
    }

    #[test]
    fn from_parameters_validates() {
        let params = Parameters::new()
            .with("width", "2")
            .with("height", 2)
            .with("distance", "cityblock");
        let c = Circuit::from_parameters("c", &params).unwrap();
        assert_eq!(c.scope().len(), 4);

        let defaults = Circuit::from_parameters("c", &Parameters::new()).unwrap();
        assert_eq!(defaults.scope().len(), 25);

        assert!(Circuit::from_parameters("c", &Parameters::new().with("width", 0)).is_err());
        assert!(Circuit::from_parameters("c", &Parameters::new().with("width", "abc")).is_err());
        assert!(Circuit::from_parameters("c", &Parameters::new().with("distance", 3)).is_err());
    }

    #[test]
    fn oversized_grids_are_rejected() {
        let huge = 1_i64 << 33;
        let params = Parameters::new().with("width", huge).with("height", huge);
        assert!(matches!(
            Circuit::from_parameters("c", &params),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
        assert!(Circuit::new("c", usize::MAX, 2, Distance::Euclidean).is_err());
        assert!(Circuit::new("c", 100_000, 100_000, Distance::Euclidean).is_err());
        assert!(Circuit::new("c", MAX_COMPONENTS + 1, 1, Distance::Euclidean).is_err());

        let largest = Circuit::new("c", MAX_COMPONENTS / 100, 100, Distance::Euclidean).unwrap();
        assert_eq!(largest.scope().len(), MAX_COMPONENTS);
    }

    #[test]
    fn unknown_distance_falls_back_to_euclidean() {
        let c = Circuit::from_parameters("c", &Parameters::new().with("distance", "manhattan")).unwrap();
        assert_eq!(c.describe()["distance"], "euclidean");
    }
}
