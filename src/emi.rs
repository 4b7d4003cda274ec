// Car loan instalment calculator

use serde::Serialize;

use crate::error::EmiError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiBreakdown {
    pub monthly: f64,
    pub total_interest: f64,
    pub total_payable: f64,
}

/// Equated monthly instalment for a reducing-balance loan, rounded to whole rupees.
pub fn emi(principal: f64, annual_rate_percent: f64, months: u32) -> Result<EmiBreakdown, EmiError> {
    if principal.is_nan() || principal <= 0.0 {
        return Err(EmiError::NotPositive("principal"));
    }
    if months == 0 {
        return Err(EmiError::NotPositive("months"));
    }
    if annual_rate_percent.is_nan() || annual_rate_percent < 0.0 {
        return Err(EmiError::NegativeRate);
    }

    let n = f64::from(months);
    let monthly_rate = annual_rate_percent / 12.0 / 100.0;
    let monthly = if monthly_rate == 0.0 {
        principal / n
    } else {
        let growth = (1.0 + monthly_rate).powf(n);
        principal * monthly_rate * growth / (growth - 1.0)
    };

    let monthly = monthly.round();
    let total_payable = monthly * n;
    Ok(EmiBreakdown {
        monthly,
        total_interest: (total_payable - principal).round(),
        total_payable,
    })
}
