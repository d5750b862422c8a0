use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Money, Order, OrderLine, OrderStatusType},
    helpers::DiscountRejection,
};

//--------------------------------------   OrderQueryFilter    -------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub customer_id: Option<String>,
    pub status: Option<Vec<OrderStatusType>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn with_customer_id(mut self, customer_id: String) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none() && self.status.is_none() && self.since.is_none() && self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(customer_id) = &self.customer_id {
            write!(f, "customer_id: {customer_id}. ")?;
        }
        if let Some(statuses) = &self.status {
            let s = statuses.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ");
            write!(f, "status in [{s}]. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since: {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until: {until}. ")?;
        }
        Ok(())
    }
}

//--------------------------------------      Pagination       -------------------------------------------------------
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_page_size")]
    pub limit: i64,
}

fn default_page_size() -> i64 {
    50
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, limit: default_page_size() }
    }
}

//--------------------------------------    CheckoutReceipt    -------------------------------------------------------
/// What checkout hands back to the caller. A rejected promotion does not block checkout, so the receipt carries the
/// rejection alongside the (zero-discount) order for the UI to display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub discount_warning: Option<DiscountRejection>,
}

//--------------------------------------     OrderDetails      -------------------------------------------------------
/// An order line enriched with the product's *current* name and image for display. The stored `unit_price` on the
/// line is what was frozen at order time; the live catalog price is deliberately not part of this projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedOrderLine {
    #[serde(flatten)]
    pub line: OrderLine,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<EnrichedOrderLine>,
    pub buyer_display_name: Option<String>,
}

//--------------------------------------    OrderStatistics    -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: OrderStatusType,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRevenue {
    /// Calendar day (UTC) the settlements landed on, `YYYY-MM-DD`.
    pub day: String,
    pub orders: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatistics {
    pub status_counts: Vec<StatusCount>,
    pub revenue_by_day: Vec<DailyRevenue>,
}
