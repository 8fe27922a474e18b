//! Request payloads for the AP2 merchant endpoints.
//!
//! Both endpoints exchange [`DidMessage`](anp_types::proto::DidMessage)
//! envelopes; these are the `data` members.

use serde::{Deserialize, Serialize};

use crate::types::{PaymentItem, ShippingAddress};

/// `data` of `POST /ap2/merchant/create_cart_mandate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCartMandateRequest {
    /// Client-chosen id for the cart being assembled.
    pub cart_mandate_id: String,
    pub items: Vec<PaymentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}
