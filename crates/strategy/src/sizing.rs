/// Inputs to one entry-size calculation.
#[derive(Debug, Clone, Copy)]
pub struct SizingParams {
    pub equity: f64,
    pub risk_pct: f64,
    pub price: f64,
    /// When set, the size is shrunk so that notional plus this fee fits the budget.
    pub net_fee_pct: Option<f64>,
    /// Minimum tradable increment; the size is floored to a multiple of it.
    pub lot_size: Option<f64>,
}

/// Guards the floor against `0.3 / 0.1 = 2.999...` style representation error.
const LOT_EPSILON: f64 = 1e-9;

/// Units to trade: `equity * risk_pct / price`, optionally fee-netted and floored
/// to the lot size. Returns 0.0 for non-positive or non-finite price or equity.
pub fn position_size(params: SizingParams) -> f64 {
    let SizingParams {
        equity,
        risk_pct,
        price,
        net_fee_pct,
        lot_size,
    } = params;

    if !(price > 0.0 && price.is_finite()) || !(equity > 0.0 && equity.is_finite()) {
        return 0.0;
    }

    let budget = equity * risk_pct;
    let unit_cost = match net_fee_pct {
        Some(fee) => price * (1.0 + fee),
        None => price,
    };
    let raw = budget / unit_cost;
    if !(raw > 0.0 && raw.is_finite()) {
        return 0.0;
    }

    match lot_size {
        Some(lot) if lot > 0.0 => ((raw / lot) + LOT_EPSILON).floor() * lot,
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(equity: f64, price: f64) -> SizingParams {
        SizingParams {
            equity,
            risk_pct: 0.1,
            price,
            net_fee_pct: None,
            lot_size: None,
        }
    }

    #[test]
    fn size_is_risk_budget_over_price() {
        let size = position_size(params(10_000.0, 50.0));
        assert!((size - 20.0).abs() < 1e-12, "got {size}");
    }

    #[test]
    fn zero_price_yields_zero() {
        assert_eq!(position_size(params(10_000.0, 0.0)), 0.0);
        assert_eq!(position_size(params(10_000.0, -1.0)), 0.0);
        assert_eq!(position_size(params(10_000.0, f64::NAN)), 0.0);
    }

    #[test]
    fn non_positive_equity_yields_zero() {
        assert_eq!(position_size(params(0.0, 100.0)), 0.0);
        assert_eq!(position_size(params(-500.0, 100.0)), 0.0);
    }

    #[test]
    fn size_floors_to_lot() {
        let size = position_size(SizingParams {
            lot_size: Some(0.5),
            ..params(1_000.0, 30.0)
        });
        // 100 / 30 = 3.33.. -> 3.0
        assert!((size - 3.0).abs() < 1e-12, "got {size}");
    }

    #[test]
    fn exact_lot_multiple_is_not_lost_to_rounding() {
        let size = position_size(SizingParams {
            lot_size: Some(0.1),
            ..params(3.0, 1.0)
        });
        // 0.3 / 0.1 is 2.9999999999999996 in binary
        assert!((size - 0.3).abs() < 1e-12, "got {size}");
    }

    #[test]
    fn lot_larger_than_budget_yields_zero() {
        let size = position_size(SizingParams {
            lot_size: Some(10.0),
            ..params(1_000.0, 50.0)
        });
        assert_eq!(size, 0.0);
    }

    #[test]
    fn fee_netting_shrinks_size() {
        let gross = position_size(params(10_000.0, 100.0));
        let net = position_size(SizingParams {
            net_fee_pct: Some(0.01),
            ..params(10_000.0, 100.0)
        });
        assert!(net < gross);
        assert!((net - 10.0 / 1.01).abs() < 1e-12);
    }
}
