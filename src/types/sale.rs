//! Sale log entries
//!
//! A sale record is created exactly once per sold unit and carries a frozen
//! copy of the unit's economics, so later stock edits never rewrite history.

use super::error::LedgerError;
use super::ids::{CustomerId, SaleRecordId, StockItemId, Timestamp};
use super::money::{Amount, ShareRate};
use super::stock::StockItem;
use serde::{Deserialize, Serialize};

/// One completed item sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SaleRecord {
    pub id: SaleRecordId,

    pub customer_id: CustomerId,

    /// The specific unit that was sold
    pub stock_item_id: StockItemId,

    pub external_code: String,

    pub brand: String,

    #[serde(default)]
    pub cost_price: Amount,

    #[serde(default)]
    pub sale_price: Amount,

    /// `sale_price - cost_price`, may be negative
    #[serde(default)]
    pub profit: Amount,

    /// `round(max(0, profit) * rate)`, never negative
    #[serde(default)]
    pub partner_share: Amount,

    #[serde(default)]
    pub partner_share_paid: bool,

    #[serde(default)]
    pub partner_share_paid_at: Option<Timestamp>,

    pub occurred_at: Timestamp,
}

impl SaleRecord {
    /// Book the sale of `item` to `customer_id`
    pub fn for_item(
        item: &StockItem,
        customer_id: CustomerId,
        rate: ShareRate,
        occurred_at: Timestamp,
    ) -> Result<Self, LedgerError> {
        let profit = item.margin()?;
        Ok(SaleRecord {
            id: SaleRecordId::new(),
            customer_id,
            stock_item_id: item.id,
            external_code: item.external_code.clone(),
            brand: item.brand.clone(),
            cost_price: item.cost_price,
            sale_price: item.sale_price,
            profit,
            partner_share: rate.share_of_profit(profit),
            partner_share_paid: false,
            partner_share_paid_at: None,
            occurred_at,
        })
    }

    /// Profit kept after the partner's share
    pub fn net_profit(&self) -> Amount {
        self.profit.saturating_sub(self.partner_share)
    }

    /// Mark the partner share settled (`Some(at)`) or unsettled (`None`)
    pub(crate) fn set_settlement(&mut self, paid_at: Option<Timestamp>) {
        self.partner_share_paid = paid_at.is_some();
        self.partner_share_paid_at = paid_at;
    }

    pub fn check_shape(&self) -> Result<(), String> {
        if self.cost_price < 0 || self.sale_price < 0 {
            return Err(format!(
                "prices must not be negative, got cost {} and sale {}",
                self.cost_price, self.sale_price
            ));
        }
        if self.partner_share < 0 {
            return Err(format!(
                "partnerShare must not be negative, got {}",
                self.partner_share
            ));
        }
        if self.partner_share_paid_at.is_some() && !self.partner_share_paid {
            return Err("partnerSharePaidAt set on an unsettled sale".to_string());
        }
        Ok(())
    }
}
