use super::domain::CustomerClass;

pub const VERY_GOOD_RANGE: &str = "$50,000 - $200,000";
pub const NORMAL_RANGE: &str = "$10,000 - $50,000";
pub const NOT_ELIGIBLE: &str = "Not eligible";

/// Loan amount band offered for a customer category.
pub const fn loan_range(label: CustomerClass) -> &'static str {
    match label {
        CustomerClass::VeryGood => VERY_GOOD_RANGE,
        CustomerClass::Normal => NORMAL_RANGE,
        CustomerClass::VeryBad => NOT_ELIGIBLE,
    }
}
