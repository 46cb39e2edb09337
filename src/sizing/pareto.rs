use super::candidate::Candidate;
use super::nsga::{crowding_distance, dominates};

/// Archive of non-dominated feasible candidates.
///
/// With one objective the archive degenerates to the single best
/// candidate. An optional size limit drops the most crowded members first.
#[derive(Debug, Clone, Default)]
pub struct ParetoSet {
    members: Vec<Candidate>,
    limit: Option<usize>,
}

impl ParetoSet {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            members: Vec::new(),
            limit,
        }
    }

    /// Offers a candidate to the archive.
    ///
    /// Returns `true` if the candidate was admitted. Infeasible candidates,
    /// candidates dominated by a member and candidates whose objectives equal
    /// a member's are rejected.
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        if !candidate.is_feasible() {
            return false;
        }
        let rejected = self.members.iter().any(|m| {
            dominates(&m.objectives, &candidate.objectives) || m.objectives == candidate.objectives
        });
        if rejected {
            return false;
        }
        self.members
            .retain(|m| !dominates(&candidate.objectives, &m.objectives));
        self.members.push(candidate);
        self.truncate();
        true
    }

    fn truncate(&mut self) {
        let Some(limit) = self.limit else { return };
        while self.members.len() > limit.max(1) {
            let points: Vec<Vec<f64>> = self.members.iter().map(|m| m.objectives.clone()).collect();
            let front: Vec<usize> = (0..points.len()).collect();
            let distance = crowding_distance(&points, &front);
            let most_crowded = distance
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.members.remove(most_crowded);
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member with the lowest value of objective `index`.
    pub fn best(&self, index: usize) -> Option<&Candidate> {
        self.members
            .iter()
            .filter(|m| index < m.objectives.len())
            .min_by(|a, b| a.objectives[index].total_cmp(&b.objectives[index]))
    }

    /// Per-objective minimum over the archive, or `None` when empty.
    pub fn ideal_point(&self) -> Option<Vec<f64>> {
        let first = self.members.first()?;
        let mut ideal = first.objectives.clone();
        for m in &self.members[1..] {
            for (v, o) in ideal.iter_mut().zip(&m.objectives) {
                *v = v.min(*o);
            }
        }
        Some(ideal)
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizing::candidate::{CapacityVector, DesignMetrics, Fitness};
    use crate::economics::CostBreakdown;

    fn candidate(objectives: &[f64]) -> Candidate {
        Candidate {
            capacities: CapacityVector::new(vec![objectives[0]]),
            objectives: objectives.to_vec(),
            fitness: Fitness::Feasible(DesignMetrics {
                cost: CostBreakdown::default(),
                unmet_kwh: 0.0,
                import_kwh: 0.0,
                export_kwh: 0.0,
                curtailed_kwh: 0.0,
                autarky: 1.0,
            }),
            generation: 0,
        }
    }

    #[test]
    fn keeps_only_non_dominated() {
        let mut set = ParetoSet::new(None);
        assert!(set.insert(candidate(&[3.0, 3.0])));
        assert!(set.insert(candidate(&[1.0, 4.0])));
        assert!(set.insert(candidate(&[2.0, 2.0])));
        assert_eq!(set.len(), 2);
        assert!(!set.insert(candidate(&[2.5, 2.5])));
        assert!(!set.insert(candidate(&[2.0, 2.0])));
        assert_eq!(set.ideal_point(), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn single_objective_keeps_single_best() {
        let mut set = ParetoSet::new(None);
        for v in [5.0, 3.0, 4.0, 3.0, 1.0, 2.0] {
            set.insert(candidate(&[v]));
        }
        assert_eq!(set.len(), 1);
        assert_eq!(set.best(0).map(|c| c.objectives[0]), Some(1.0));
    }

    #[test]
    fn infeasible_candidates_are_rejected() {
        let mut set = ParetoSet::new(None);
        let c = Candidate::infeasible(CapacityVector::new(vec![1.0]), 0.5, "imbalance".into(), 1, 1e9, 0);
        assert!(!set.insert(c));
        assert!(set.is_empty());
        assert_eq!(set.ideal_point(), None);
    }

    #[test]
    fn limit_drops_crowded_members_and_keeps_extremes() {
        let mut set = ParetoSet::new(Some(3));
        for p in [[0.0, 10.0], [4.0, 6.0], [4.5, 5.5], [10.0, 0.0]] {
            assert!(set.insert(candidate(&p)));
        }
        assert_eq!(set.len(), 3);
        let objs: Vec<&Vec<f64>> = set.candidates().iter().map(|c| &c.objectives).collect();
        assert!(objs.contains(&&vec![0.0, 10.0]));
        assert!(objs.contains(&&vec![10.0, 0.0]));
    }
}
