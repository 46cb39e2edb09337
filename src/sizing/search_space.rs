use rand::Rng;
use rand::rngs::StdRng;

use crate::config::DimensionConfig;
use crate::error::InvalidCapacity;

use super::candidate::CapacityVector;

/// Bounds of one sizeable capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    /// Id of the component the value is applied to.
    pub component: String,
    pub lower: f64,
    pub upper: f64,
}

impl Dimension {
    pub fn new(component: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            component: component.into(),
            lower,
            upper,
        }
    }

    pub fn span(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Box-bounded space of capacity vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    dimensions: Vec<Dimension>,
}

impl SearchSpace {
    /// Creates a search space.
    ///
    /// # Errors
    ///
    /// `InvalidCapacity::Empty` without dimensions, `InvalidCapacity::Bounds`
    /// for non-finite, negative or inverted bounds.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, InvalidCapacity> {
        if dimensions.is_empty() {
            return Err(InvalidCapacity::Empty);
        }
        for d in &dimensions {
            if !(d.lower.is_finite() && d.upper.is_finite() && 0.0 <= d.lower && d.lower <= d.upper) {
                return Err(InvalidCapacity::Bounds {
                    component: d.component.clone(),
                    lower: d.lower,
                    upper: d.upper,
                });
            }
        }
        Ok(Self { dimensions })
    }

    pub fn from_config(dimensions: &[DimensionConfig]) -> Result<Self, InvalidCapacity> {
        Self::new(
            dimensions
                .iter()
                .map(|d| Dimension::new(d.component.clone(), d.lower, d.upper))
                .collect(),
        )
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Draws a vector uniformly from the box.
    pub fn sample(&self, rng: &mut StdRng) -> CapacityVector {
        CapacityVector::new(
            self.dimensions
                .iter()
                .map(|d| rng.random_range(d.lower..=d.upper))
                .collect(),
        )
    }

    /// Projects every value onto its bounds.
    pub fn clamp(&self, values: &mut [f64]) {
        for (v, d) in values.iter_mut().zip(&self.dimensions) {
            *v = v.clamp(d.lower, d.upper);
        }
    }

    /// Checks that a vector has one finite, in-bounds value per dimension.
    pub fn check(&self, vector: &CapacityVector) -> Result<(), InvalidCapacity> {
        let values = vector.values();
        if values.len() != self.dimensions.len() {
            return Err(InvalidCapacity::Dimensions {
                got: values.len(),
                expected: self.dimensions.len(),
            });
        }
        for (&value, d) in values.iter().zip(&self.dimensions) {
            if !value.is_finite() {
                return Err(InvalidCapacity::NotFinite {
                    component: d.component.clone(),
                    value,
                });
            }
            if value < d.lower || value > d.upper {
                return Err(InvalidCapacity::OutOfBounds {
                    component: d.component.clone(),
                    value,
                    lower: d.lower,
                    upper: d.upper,
                });
            }
        }
        Ok(())
    }

    /// `(component id, capacity)` pairs for the engine, after checking the vector.
    pub fn capacities(&self, vector: &CapacityVector) -> Result<Vec<(String, f64)>, InvalidCapacity> {
        self.check(vector)?;
        Ok(self
            .dimensions
            .iter()
            .zip(vector.values())
            .map(|(d, &v)| (d.component.clone(), v))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn space() -> SearchSpace {
        SearchSpace::new(vec![
            Dimension::new("pv", 0.0, 50.0),
            Dimension::new("battery", 2.0, 2.0),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_empty_and_inverted_bounds() {
        assert_eq!(SearchSpace::new(vec![]), Err(InvalidCapacity::Empty));
        assert!(matches!(
            SearchSpace::new(vec![Dimension::new("pv", 5.0, 1.0)]),
            Err(InvalidCapacity::Bounds { .. })
        ));
        assert!(matches!(
            SearchSpace::new(vec![Dimension::new("pv", -1.0, 1.0)]),
            Err(InvalidCapacity::Bounds { .. })
        ));
    }

    #[test]
    fn samples_stay_in_bounds() {
        let space = space();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let v = space.sample(&mut rng);
            assert!(space.check(&v).is_ok());
            assert_eq!(v.values()[1], 2.0);
        }
    }

    #[test]
    fn check_reports_each_defect() {
        let space = space();
        assert_eq!(
            space.check(&CapacityVector::new(vec![1.0])),
            Err(InvalidCapacity::Dimensions { got: 1, expected: 2 })
        );
        assert!(matches!(
            space.check(&CapacityVector::new(vec![f64::NAN, 2.0])),
            Err(InvalidCapacity::NotFinite { .. })
        ));
        assert!(matches!(
            space.check(&CapacityVector::new(vec![51.0, 2.0])),
            Err(InvalidCapacity::OutOfBounds { .. })
        ));
    }

    #[test]
    fn capacities_pair_ids_with_values() {
        let caps = space().capacities(&CapacityVector::new(vec![10.0, 2.0])).unwrap();
        assert_eq!(caps, vec![("pv".to_string(), 10.0), ("battery".to_string(), 2.0)]);
    }

    #[test]
    fn clamp_projects_onto_box() {
        let mut values = vec![-3.0, 9.0];
        space().clamp(&mut values);
        assert_eq!(values, vec![0.0, 2.0]);
    }
}
