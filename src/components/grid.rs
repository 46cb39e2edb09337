use crate::components::types::{
    Advance, Carrier, CarrierFlows, Component, ComponentContext, ComponentKind, GridModel,
    LinearModel,
};
use crate::error::InfeasibleStateError;
use crate::feed::ForecastStep;

/// Connection to an external network for one carrier.
///
/// The grid is the slack of its bus: it is advanced last and imports or
/// exports whatever residual the other components left, up to its limits.
/// It never imports and exports in the same step.
///
/// # Power Flow Convention (Bus)
/// Import is a **positive** flow, export a **negative** one.
#[derive(Debug, Clone)]
pub struct Grid {
    id: String,
    carrier: Carrier,
    pub max_import_kw: f64,
    pub max_export_kw: f64,
    /// Price paid per imported kWh.
    pub import_price: f64,
    /// Revenue per exported kWh.
    pub export_price: f64,
}

impl Grid {
    /// # Panics
    ///
    /// Panics if either limit is negative.
    pub fn new(
        id: impl Into<String>,
        carrier: Carrier,
        max_import_kw: f64,
        max_export_kw: f64,
        import_price: f64,
        export_price: f64,
    ) -> Self {
        assert!(max_import_kw >= 0.0 && max_export_kw >= 0.0);
        Self {
            id: id.into(),
            carrier,
            max_import_kw,
            max_export_kw,
            import_price,
            export_price,
        }
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }
}

impl Component for Grid {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Grid
    }

    fn carriers(&self) -> Vec<Carrier> {
        vec![self.carrier]
    }

    fn initialize(&mut self, _size: Option<f64>) {}

    fn advance(&mut self, context: &ComponentContext) -> Result<Advance, InfeasibleStateError> {
        let residual = context.residual.get(self.carrier);
        let kw = if residual < 0.0 {
            (-residual).min(self.max_import_kw)
        } else {
            -residual.min(self.max_export_kw)
        };
        Ok(Advance::flows(CarrierFlows::single(self.carrier, kw)))
    }

    fn linear_model(&self, _window: &[ForecastStep]) -> LinearModel {
        LinearModel::Grid(GridModel {
            carrier: self.carrier,
            max_import_kw: self.max_import_kw,
            max_export_kw: self.max_export_kw,
            import_price: self.import_price,
            export_price: self.export_price,
        })
    }

    fn operating_cost(&self, advance: &Advance, hours: f64) -> f64 {
        let kw = advance.flows.get(self.carrier);
        if kw >= 0.0 {
            kw * hours * self.import_price
        } else {
            kw * hours * self.export_price
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Exogenous;
    use crate::sim::clock::Timebase;

    fn settle(grid: &mut Grid, residual_kw: f64) -> Advance {
        let timebase = Timebase::hourly(1);
        let step = timebase.step(0);
        let exo = Exogenous::default();
        let ctx = ComponentContext::new(&step, &exo)
            .with_residual(CarrierFlows::single(Carrier::Electricity, residual_kw));
        grid.advance(&ctx).unwrap()
    }

    #[test]
    fn deficit_is_imported_up_to_limit() {
        let mut grid = Grid::new("grid", Carrier::Electricity, 3.0, 2.0, 0.3, 0.1);
        assert_eq!(settle(&mut grid, -1.5).flows.get(Carrier::Electricity), 1.5);
        assert_eq!(settle(&mut grid, -5.0).flows.get(Carrier::Electricity), 3.0);
    }

    #[test]
    fn surplus_is_exported_up_to_limit() {
        let mut grid = Grid::new("grid", Carrier::Electricity, 3.0, 2.0, 0.3, 0.1);
        assert_eq!(settle(&mut grid, 1.0).flows.get(Carrier::Electricity), -1.0);
        assert_eq!(settle(&mut grid, 4.0).flows.get(Carrier::Electricity), -2.0);
    }

    #[test]
    fn cost_charges_import_and_credits_export() {
        let mut grid = Grid::new("grid", Carrier::Electricity, 3.0, 2.0, 0.3, 0.1);
        let import = settle(&mut grid, -2.0);
        assert!((grid.operating_cost(&import, 0.5) - 0.3).abs() < 1e-12);
        let export = settle(&mut grid, 2.0);
        assert!((grid.operating_cost(&export, 1.0) + 0.2).abs() < 1e-12);
    }

    #[test]
    fn other_carriers_are_ignored() {
        let mut grid = Grid::new("grid_heat", Carrier::Heat, 3.0, 0.0, 0.1, 0.0);
        assert_eq!(settle(&mut grid, -2.0).flows, CarrierFlows::zero());
    }
}
