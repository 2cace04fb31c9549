//! Performance statistics over a monthly equity series.

const MONTHS_PER_YEAR: f64 = 12.0;
const SHARPE_EPSILON: f64 = 1e-12;

/// Summary statistics; `None` means the value is not available for this curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceStats {
    pub months: usize,
    pub total_return: Option<f64>,
    pub cagr: Option<f64>,
    pub ann_vol: Option<f64>,
    pub sharpe: Option<f64>,
    /// Largest peak-to-trough decline as a positive fraction.
    pub max_drawdown: Option<f64>,
}

impl PerformanceStats {
    pub fn from_equity(equity: &[f64]) -> Self {
        if equity.len() < 2 {
            return PerformanceStats::default();
        }

        let returns: Vec<f64> = equity.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        let months = returns.len();
        let first = equity[0];
        let last = equity[equity.len() - 1];

        let growth = last / first;
        let total_return = finite(growth - 1.0);
        let cagr = finite(growth.powf(MONTHS_PER_YEAR / months as f64) - 1.0);

        let (ann_vol, sharpe) = if months > 1 {
            let n = months as f64;
            let mean = returns.iter().sum::<f64>() / n;
            let std = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
            (
                finite(std * MONTHS_PER_YEAR.sqrt()),
                finite(mean / (std + SHARPE_EPSILON) * MONTHS_PER_YEAR.sqrt()),
            )
        } else {
            (None, None)
        };

        PerformanceStats {
            months,
            total_return,
            cagr,
            ann_vol,
            sharpe,
            max_drawdown: finite(compute_drawdown(equity)),
        }
    }
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

fn compute_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }
    max_dd
}
