//! Domain models for brokerage account data.

use serde::{Deserialize, Serialize};

/// The account's portfolio profile. Monetary fields arrive from the
/// API as decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PortfolioProfile {
    pub account: Option<String>,
    pub equity: Option<String>,
    pub extended_hours_equity: Option<String>,
    pub market_value: Option<String>,
    pub extended_hours_market_value: Option<String>,
    pub withdrawable_amount: Option<String>,
}
