//! Cell topology: the set of components and the buses that connect them.

use crate::components::{Carrier, Component, ComponentKind};

use super::bus::{CarrierBus, Sign};

/// An energy cell: an ordered collection of components.
///
/// Components are referenced by their position. Buses and dispatch plans
/// index into the same ordering.
#[derive(Debug, Default)]
pub struct Cell {
    components: Vec<Box<dyn Component>>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component, builder style.
    pub fn with(mut self, component: impl Component + 'static) -> Self {
        self.add(Box::new(component));
        self
    }

    /// Adds a boxed component.
    ///
    /// # Panics
    ///
    /// Panics if a component with the same id is already present.
    pub fn add(&mut self, component: Box<dyn Component>) {
        assert!(
            self.index_of(component.id()).is_none(),
            "duplicate component id `{}`",
            component.id()
        );
        self.components.push(component);
    }

    pub fn components(&self) -> &[Box<dyn Component>] {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut [Box<dyn Component>] {
        &mut self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.components.iter().position(|c| c.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&dyn Component> {
        self.components.iter().find(|c| c.id() == id).map(|c| c.as_ref())
    }

    /// Component ids in cell order.
    pub fn ids(&self) -> Vec<String> {
        self.components.iter().map(|c| c.id().to_string()).collect()
    }

    /// Sizeable capacities in cell order.
    pub fn sizes(&self) -> Vec<(String, f64)> {
        self.components
            .iter()
            .filter_map(|c| c.size().map(|s| (c.id().to_string(), s)))
            .collect()
    }

    /// Accumulated wear of every component that ages, `(id, wear)`.
    pub fn wear(&self) -> Vec<(String, f64)> {
        self.components
            .iter()
            .filter_map(|c| c.wear().map(|w| (c.id().to_string(), w)))
            .collect()
    }

    /// Carriers exchanged by at least one component, in carrier order.
    pub fn carriers(&self) -> Vec<Carrier> {
        Carrier::ALL
            .into_iter()
            .filter(|carrier| self.components.iter().any(|c| c.carriers().contains(carrier)))
            .collect()
    }

    /// Evaluation order: stable sort by stage, so exogenous components run
    /// first and the grid slack last.
    pub fn evaluation_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.components.len()).collect();
        order.sort_by_key(|&i| self.components[i].kind().stage());
        order
    }

    /// One bus per carrier in use, with every component registered on the
    /// buses of the carriers it exchanges. Demands report consumption and are
    /// registered as withdrawals.
    pub fn buses(&self) -> Vec<CarrierBus> {
        self.carriers()
            .into_iter()
            .map(|carrier| {
                let mut bus = CarrierBus::new(carrier);
                for (i, component) in self.components.iter().enumerate() {
                    if component.carriers().contains(&carrier) {
                        let sign = match component.kind() {
                            ComponentKind::Demand => Sign::Withdrawal,
                            _ => Sign::Supply,
                        };
                        bus.register(i, sign);
                    }
                }
                bus
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Demand, Grid, PvArray, Storage};

    fn cell() -> Cell {
        Cell::new()
            .with(Grid::new("grid", Carrier::Electricity, 10.0, 10.0, 0.3, 0.1))
            .with(Storage::new(
                "battery",
                Carrier::Electricity,
                5.0,
                (0.0, 1.0),
                0.5,
                (1.0, 1.0),
                (0.95, 0.95),
            ))
            .with(PvArray::new("pv", 10.0, 0.2, 0.0, 45.0))
            .with(Demand::electric(1.0))
    }

    #[test]
    fn evaluation_order_puts_grid_last() {
        let cell = cell();
        let order = cell.evaluation_order();
        let ids: Vec<&str> = order.iter().map(|&i| cell.components()[i].id()).collect();
        assert_eq!(ids, vec!["pv", "electric_load", "battery", "grid"]);
    }

    #[test]
    fn buses_cover_used_carriers() {
        let cell = cell();
        let buses = cell.buses();
        assert_eq!(buses.len(), 1);
        assert_eq!(buses[0].carrier(), Carrier::Electricity);
        assert_eq!(buses[0].members().len(), 4);
        let load = cell.index_of("electric_load").unwrap();
        assert!(buses[0].members().contains(&(load, Sign::Withdrawal)));
    }

    #[test]
    fn sizes_list_sizeable_components() {
        let sizes = cell().sizes();
        assert_eq!(
            sizes,
            vec![("battery".to_string(), 5.0), ("pv".to_string(), 10.0)]
        );
    }

    #[test]
    #[should_panic]
    fn duplicate_ids_panic() {
        let _ = cell().with(PvArray::new("pv", 1.0, 0.2, 0.0, 45.0));
    }
}
