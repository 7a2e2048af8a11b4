use log::debug;

use super::params::CALL_GAS_RETAIN_DIVISOR;
use super::ExecError;
use crate::common::{checked_as_u64, Gas, U256};

/// Gas budget of one frame.
///
/// Every charge is checked before it is applied, so a sequence of charges can
/// never leave the meter below zero: the failing charge leaves the meter
/// untouched and reports [ExecError::OutOfGas].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasMeter {
    limit: Gas,
    remaining: Gas,
}

impl GasMeter {
    pub fn new(limit: Gas) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    #[inline(always)]
    pub fn remaining(&self) -> Gas {
        self.remaining
    }

    /// Gas spent so far, counting gas lent to children that has not come
    /// back.
    #[inline(always)]
    pub fn used(&self) -> Gas {
        self.limit - self.remaining
    }

    #[inline(always)]
    pub fn charge(&mut self, gas: Gas) -> Result<(), ExecError> {
        match self.remaining.checked_sub(gas) {
            Some(r) => {
                self.remaining = r;
                Ok(())
            }
            None => {
                debug!("Out of Gas: {} < {}", self.remaining, gas);
                Err(ExecError::OutOfGas)
            }
        }
    }

    /// Take back gas that a finished child did not use.
    #[inline(always)]
    pub fn refund(&mut self, gas: Gas) {
        self.remaining = self.remaining.saturating_add(gas).min(self.limit)
    }

    /// Reserve the budget for a child frame and charge it to this meter.
    ///
    /// The request is capped rather than rejected: the child receives
    /// `min(requested, available - available / 64)`, so a child can never
    /// hold more than its parent had.
    pub fn allot(&mut self, requested: &U256) -> Result<Gas, ExecError> {
        let cap = self.remaining - self.remaining / CALL_GAS_RETAIN_DIVISOR;
        let gas = match checked_as_u64(requested) {
            Some(r) if r < cap => r,
            _ => cap,
        };
        self.charge(gas)?;
        Ok(gas)
    }
}

#[test]
fn test_charge_never_goes_negative() {
    let mut meter = GasMeter::new(10);
    assert!(meter.charge(4).is_ok());
    assert!(meter.charge(4).is_ok());
    assert!(matches!(meter.charge(4), Err(ExecError::OutOfGas)));
    // the failed charge did not touch the meter
    assert_eq!(meter.remaining(), 2);
    assert!(meter.charge(2).is_ok());
    assert_eq!(meter.remaining(), 0);
    assert_eq!(meter.used(), 10);
}

#[test]
fn test_allot_caps_to_available() {
    let mut meter = GasMeter::new(6400);
    // asking for more than the frame holds yields all but one 64th
    let child = meter.allot(&U256::from(1_000_000u64)).unwrap();
    assert_eq!(child, 6300);
    assert_eq!(meter.remaining(), 100);

    let mut meter = GasMeter::new(6400);
    let child = meter.allot(&U256::from(1000u64)).unwrap();
    assert_eq!(child, 1000);
    assert_eq!(meter.remaining(), 5400);

    // oversized words are capped too
    let mut meter = GasMeter::new(640);
    assert_eq!(meter.allot(&U256::MAX).unwrap(), 630);
}

#[test]
fn test_refund_returns_unused() {
    let mut meter = GasMeter::new(1000);
    let child = meter.allot(&U256::from(500u64)).unwrap();
    assert_eq!(meter.remaining(), 500);
    meter.refund(child - 120);
    assert_eq!(meter.remaining(), 880);
    assert_eq!(meter.used(), 120);
}
