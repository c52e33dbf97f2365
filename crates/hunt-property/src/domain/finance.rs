//! Financial calculator tabs. Every result is rounded to whole rupees.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Share of free monthly income a lender allows towards a new EMI.
const MAX_EMI_RATIO: f64 = 0.5;

fn monthly_rate(annual_percent: f64) -> f64 {
    annual_percent / 100.0 / 12.0
}

fn whole(value: f64) -> f64 {
    value.round()
}

/// Standard reducing-balance instalment for `principal` over `months`.
pub fn monthly_instalment(principal: f64, annual_percent: f64, months: f64) -> f64 {
    let r = monthly_rate(annual_percent);
    if r <= 0.0 {
        return principal / months;
    }
    let growth = (1.0 + r).powf(months);
    principal * r * growth / (growth - 1.0)
}

/// Inverse of [`monthly_instalment`]: the principal a given EMI can service.
pub fn serviceable_principal(emi: f64, annual_percent: f64, months: f64) -> f64 {
    let r = monthly_rate(annual_percent);
    if r <= 0.0 {
        return emi * months;
    }
    let growth = (1.0 + r).powf(months);
    emi * (growth - 1.0) / (r * growth)
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoanEligibilityRequest {
    #[validate(range(min = 0.0))]
    pub loan_required: f64,
    #[validate(range(min = 0.0))]
    pub net_income_per_month: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub existing_loan_commitments: f64,
    #[validate(range(min = 0.5, max = 30.0))]
    pub loan_tenure_years: f64,
    #[validate(range(min = 0.0, max = 30.0))]
    pub rate_of_interest: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanEligibility {
    pub eligible: bool,
    pub message: &'static str,
    pub maximum_eligible_amount: f64,
    pub maximum_emi: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_required: Option<f64>,
}

impl LoanEligibilityRequest {
    pub fn evaluate(&self) -> LoanEligibility {
        let available = (self.net_income_per_month - self.existing_loan_commitments).max(0.0);
        let max_emi = available * MAX_EMI_RATIO;
        if max_emi <= 0.0 {
            return LoanEligibility {
                eligible: false,
                message: "Eligibility Check Failed",
                maximum_eligible_amount: 0.0,
                maximum_emi: 0.0,
                loan_required: None,
            };
        }

        let max_principal =
            serviceable_principal(max_emi, self.rate_of_interest, self.loan_tenure_years * 12.0);
        let eligible = self.loan_required <= max_principal;
        LoanEligibility {
            eligible,
            message: if eligible {
                "Eligible"
            } else {
                "Eligibility Check Failed"
            },
            maximum_eligible_amount: whole(max_principal),
            maximum_emi: whole(max_emi),
            loan_required: Some(self.loan_required),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RentalValueRequest {
    #[validate(range(min = 0.0))]
    pub property_value: f64,
    /// Annual gross yield in percent.
    #[validate(range(min = 0.0, max = 30.0))]
    pub rate_of_rent: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub years: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RentalValue {
    pub rental_value_annual: f64,
    pub rental_value_monthly: f64,
    pub property_value: f64,
    pub rate_of_rent: f64,
}

impl RentalValueRequest {
    pub fn evaluate(&self) -> RentalValue {
        let annual = self.property_value * self.rate_of_rent / 100.0;
        RentalValue {
            rental_value_annual: whole(annual),
            rental_value_monthly: whole(annual / 12.0),
            property_value: self.property_value,
            rate_of_rent: self.rate_of_rent,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FutureValueRequest {
    #[validate(range(min = 0.0))]
    pub current_property_value: f64,
    #[validate(range(min = 0.0, max = 50.0))]
    pub years: f64,
    #[validate(range(min = 0.0, max = 50.0))]
    pub average_appreciation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FutureValue {
    pub future_value: f64,
    pub current_property_value: f64,
    pub years: f64,
    pub average_appreciation: f64,
}

impl FutureValueRequest {
    pub fn evaluate(&self) -> FutureValue {
        let value = self.current_property_value
            * (1.0 + self.average_appreciation / 100.0).powf(self.years);
        FutureValue {
            future_value: whole(value),
            current_property_value: self.current_property_value,
            years: self.years,
            average_appreciation: self.average_appreciation,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmiRequest {
    #[validate(range(min = 0.0))]
    pub loan_amount: f64,
    #[validate(range(min = 0.5, max = 30.0))]
    pub loan_tenure_years: f64,
    #[validate(range(min = 0.0, max = 30.0))]
    pub rate_of_interest: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmiBreakdown {
    pub monthly_emi: f64,
    pub total_amount_payable: f64,
    pub total_interest: f64,
    pub loan_amount: f64,
    pub loan_tenure_years: f64,
    pub rate_of_interest: f64,
}

impl EmiRequest {
    pub fn evaluate(&self) -> EmiBreakdown {
        let months = self.loan_tenure_years * 12.0;
        let emi = monthly_instalment(self.loan_amount, self.rate_of_interest, months);
        let total = emi * months;
        EmiBreakdown {
            monthly_emi: whole(emi),
            total_amount_payable: whole(total),
            total_interest: whole(total - self.loan_amount),
            loan_amount: self.loan_amount,
            loan_tenure_years: self.loan_tenure_years,
            rate_of_interest: self.rate_of_interest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emi_matches_reference_schedule() {
        let breakdown = EmiRequest {
            loan_amount: 1_000_000.0,
            loan_tenure_years: 20.0,
            rate_of_interest: 8.5,
        }
        .evaluate();
        assert_eq!(breakdown.monthly_emi, 8678.0);
        assert_eq!(
            breakdown.total_interest,
            breakdown.total_amount_payable - 1_000_000.0
        );
    }

    #[test]
    fn zero_rate_splits_principal_evenly() {
        let breakdown = EmiRequest {
            loan_amount: 120_000.0,
            loan_tenure_years: 1.0,
            rate_of_interest: 0.0,
        }
        .evaluate();
        assert_eq!(breakdown.monthly_emi, 10_000.0);
        assert_eq!(breakdown.total_interest, 0.0);
    }

    #[test]
    fn eligibility_fails_when_commitments_consume_income() {
        let result = LoanEligibilityRequest {
            loan_required: 100.0,
            net_income_per_month: 50_000.0,
            existing_loan_commitments: 60_000.0,
            loan_tenure_years: 10.0,
            rate_of_interest: 9.0,
        }
        .evaluate();
        assert!(!result.eligible);
        assert_eq!(result.maximum_eligible_amount, 0.0);
        assert_eq!(result.loan_required, None);
    }

    #[test]
    fn eligibility_inverts_the_instalment_formula() {
        let result = LoanEligibilityRequest {
            loan_required: 2_000_000.0,
            net_income_per_month: 100_000.0,
            existing_loan_commitments: 20_000.0,
            loan_tenure_years: 20.0,
            rate_of_interest: 8.5,
        }
        .evaluate();
        assert_eq!(result.maximum_emi, 40_000.0);
        assert!(result.eligible);
        let emi = monthly_instalment(result.maximum_eligible_amount, 8.5, 240.0);
        assert!((emi - 40_000.0).abs() < 1.0);
    }

    #[test]
    fn rental_and_future_values() {
        let rent = RentalValueRequest {
            property_value: 6_000_000.0,
            rate_of_rent: 3.0,
            years: None,
        }
        .evaluate();
        assert_eq!(rent.rental_value_annual, 180_000.0);
        assert_eq!(rent.rental_value_monthly, 15_000.0);

        let future = FutureValueRequest {
            current_property_value: 1_000_000.0,
            years: 2.0,
            average_appreciation: 10.0,
        }
        .evaluate();
        assert_eq!(future.future_value, 1_210_000.0);
    }

    #[test]
    fn tenure_outside_range_is_rejected() {
        let request = EmiRequest {
            loan_amount: 1.0,
            loan_tenure_years: 31.0,
            rate_of_interest: 5.0,
        };
        assert!(request.validate().is_err());
    }
}
