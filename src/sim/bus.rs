use crate::components::{Carrier, CarrierFlows};

/// Orientation a component is registered with on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Reported flows are already supply-positive.
    Supply,
    /// Reported flows are consumption-positive and are negated on the bus.
    Withdrawal,
}

impl Sign {
    pub fn factor(self) -> f64 {
        match self {
            Sign::Supply => 1.0,
            Sign::Withdrawal => -1.0,
        }
    }
}

/// Aggregation point for one carrier.
///
/// The bus holds component indices, not components. Each step it collects
/// the signed contributions of its members; `balance` is their sum, with
/// supply positive.
#[derive(Debug, Clone)]
pub struct CarrierBus {
    carrier: Carrier,
    members: Vec<(usize, Sign)>,
    supply_kw: f64,
    withdrawal_kw: f64,
}

impl CarrierBus {
    pub fn new(carrier: Carrier) -> Self {
        Self {
            carrier,
            members: Vec::new(),
            supply_kw: 0.0,
            withdrawal_kw: 0.0,
        }
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    /// Registers component `index` on this bus. Registering twice is a no-op.
    pub fn register(&mut self, index: usize, sign: Sign) {
        if !self.is_member(index) {
            self.members.push((index, sign));
        }
    }

    pub fn is_member(&self, index: usize) -> bool {
        self.members.iter().any(|(i, _)| *i == index)
    }

    pub fn members(&self) -> &[(usize, Sign)] {
        &self.members
    }

    /// Clears the accumulated contributions.
    pub fn reset(&mut self) {
        self.supply_kw = 0.0;
        self.withdrawal_kw = 0.0;
    }

    /// Bus-oriented contribution of a member's flows, or `None` for
    /// non-members.
    pub fn oriented(&self, index: usize, flows: &CarrierFlows) -> Option<f64> {
        self.members
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, sign)| sign.factor() * flows.get(self.carrier))
    }

    /// Adds a member's flows for the current step.
    pub fn record(&mut self, index: usize, flows: &CarrierFlows) {
        if let Some(kw) = self.oriented(index, flows) {
            if kw >= 0.0 {
                self.supply_kw += kw;
            } else {
                self.withdrawal_kw -= kw;
            }
        }
    }

    /// Net residual in kW: positive is surplus, negative is deficit.
    pub fn balance(&self) -> f64 {
        self.supply_kw - self.withdrawal_kw
    }

    pub fn supply_kw(&self) -> f64 {
        self.supply_kw
    }

    pub fn withdrawal_kw(&self) -> f64 {
        self.withdrawal_kw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_sums_signed_contributions() {
        let mut bus = CarrierBus::new(Carrier::Electricity);
        bus.register(0, Sign::Supply);
        bus.register(1, Sign::Withdrawal);
        bus.record(0, &CarrierFlows::single(Carrier::Electricity, 3.0));
        bus.record(1, &CarrierFlows::single(Carrier::Electricity, 1.0));
        assert_eq!(bus.supply_kw(), 3.0);
        assert_eq!(bus.withdrawal_kw(), 1.0);
        assert_eq!(bus.balance(), 2.0);
    }

    #[test]
    fn non_members_and_other_carriers_are_ignored() {
        let mut bus = CarrierBus::new(Carrier::Heat);
        bus.register(0, Sign::Supply);
        bus.record(1, &CarrierFlows::single(Carrier::Heat, 5.0));
        bus.record(0, &CarrierFlows::single(Carrier::Electricity, 5.0));
        assert_eq!(bus.balance(), 0.0);
    }

    #[test]
    fn reset_clears_step_totals() {
        let mut bus = CarrierBus::new(Carrier::Electricity);
        bus.register(0, Sign::Supply);
        bus.register(0, Sign::Withdrawal);
        assert_eq!(bus.members().len(), 1);
        bus.record(0, &CarrierFlows::single(Carrier::Electricity, -2.0));
        assert_eq!(bus.balance(), -2.0);
        bus.reset();
        assert_eq!(bus.balance(), 0.0);
    }
}
