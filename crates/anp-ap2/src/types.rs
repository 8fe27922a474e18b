//! AP2 mandate data model.
//!
//! These structs are the exact wire shapes the hashes commit to, so their
//! serde layout is deliberate:
//!
//! - optional and empty members are omitted rather than serialized as
//!   `null` / `[]`, keeping the JCS form of a round-tripped object equal to
//!   what the counterparty hashed;
//! - dynamic, channel-specific method data keeps unknown members through a
//!   flattened map, so a mandate passing through this implementation hashes
//!   the same on the other side;
//! - array order (line items, method data) is meaningful and preserved.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use anp_types::UtcTimestamp;

use crate::error::Ap2Error;

/// A currency amount. The minor-unit value rides as a JSON number; JCS fixes
/// its textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyAmount {
    pub currency: String,
    pub value: f64,
}

/// One priced line in a cart: a display item or the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentItem {
    pub label: String,
    pub amount: MoneyAmount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

/// Where physical goods go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Payment channels carried in method data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentChannel {
    #[serde(rename = "ALIPAY")]
    Alipay,
    #[serde(rename = "WECHAT")]
    Wechat,
    #[serde(untagged)]
    Other(String),
}

/// Channel-specific payment descriptor (QR code, merchant account, …).
///
/// Members this implementation does not know about are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelData {
    pub channel: PaymentChannel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_account: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One supported payment method with its descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodData {
    pub supported_methods: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MethodData>,
}

/// Method descriptor: a recognized channel shape or an opaque passthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodData {
    Channel(ChannelData),
    Opaque(Value),
}

/// The payment request attached to a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method_data: Vec<PaymentMethodData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The merchant-assembled cart the `cart_hash` claim commits to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartContents {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<PaymentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingAddress>,
    pub total: PaymentItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_request: Option<PaymentRequest>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CartContents {
    /// Schema validation applied on build and on verify.
    pub fn validate(&self) -> Result<(), Ap2Error> {
        if self.id.is_empty() {
            return Err(Ap2Error::PayloadSchemaInvalid("cart id is empty".into()));
        }
        for item in self.items.iter().chain(std::iter::once(&self.total)) {
            validate_item(item)?;
        }
        Ok(())
    }
}

fn validate_item(item: &PaymentItem) -> Result<(), Ap2Error> {
    if item.amount.currency.is_empty() {
        return Err(Ap2Error::PayloadSchemaInvalid(format!(
            "item {:?} has an empty currency",
            item.label
        )));
    }
    if !item.amount.value.is_finite() || item.amount.value < 0.0 {
        return Err(Ap2Error::PayloadSchemaInvalid(format!(
            "item {:?} has an invalid amount",
            item.label
        )));
    }
    if let Some(quantity) = item.quantity {
        if quantity < 0 {
            return Err(Ap2Error::PayloadSchemaInvalid(format!(
                "item {:?} has a negative quantity",
                item.label
            )));
        }
    }
    Ok(())
}

/// What the user signs over in a payment mandate. `prev_hash` carries the
/// cart-hash chaining marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMandateContents {
    pub payment_mandate_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_details_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_details_total: Option<PaymentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<UtcTimestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymentMandateContents {
    pub fn validate(&self) -> Result<(), Ap2Error> {
        if self.payment_mandate_id.is_empty() {
            return Err(Ap2Error::PayloadSchemaInvalid(
                "payment_mandate_id is empty".into(),
            ));
        }
        if let Some(total) = &self.payment_details_total {
            validate_item(total)?;
        }
        Ok(())
    }
}

/// A merchant-signed cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartMandate {
    pub contents: CartContents,
    /// JWS compact string; payload claims include `cart_hash`.
    pub merchant_authorization: String,
    pub timestamp: UtcTimestamp,
}

/// A user-signed payment bound to a verified cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMandate {
    pub payment_mandate_contents: PaymentMandateContents,
    /// JWS compact string; payload claims include `transaction_data`.
    pub user_authorization: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_cart_round_trips_without_spurious_members() {
        let cart: CartContents = serde_json::from_value(json!({
            "id": "cart_1",
            "total": {"label": "Total", "amount": {"currency": "CNY", "value": 120.0}}
        }))
        .unwrap();
        let back = serde_json::to_value(&cart).unwrap();
        assert_eq!(
            back,
            json!({
                "id": "cart_1",
                "total": {"label": "Total", "amount": {"currency": "CNY", "value": 120.0}}
            })
        );
    }

    #[test]
    fn unknown_members_survive_round_trips() {
        let cart: CartContents = serde_json::from_value(json!({
            "id": "cart_1",
            "total": {"label": "Total", "amount": {"currency": "CNY", "value": 1.0}},
            "loyalty_tier": "gold"
        }))
        .unwrap();
        let back = serde_json::to_value(&cart).unwrap();
        assert_eq!(back["loyalty_tier"], "gold");
    }

    #[test]
    fn channel_data_keeps_unknown_fields_and_channel_tags() {
        let data: ChannelData = serde_json::from_value(json!({
            "channel": "ALIPAY",
            "qr_code": "https://qr.alipay.com/x",
            "expires_in": 300
        }))
        .unwrap();
        assert_eq!(data.channel, PaymentChannel::Alipay);
        let back = serde_json::to_value(&data).unwrap();
        assert_eq!(back["expires_in"], 300);

        let other: ChannelData =
            serde_json::from_value(json!({"channel": "UNIONPAY"})).unwrap();
        assert_eq!(other.channel, PaymentChannel::Other("UNIONPAY".into()));
    }

    #[test]
    fn negative_quantity_fails_schema_validation() {
        let cart: CartContents = serde_json::from_value(json!({
            "id": "cart_1",
            "items": [{
                "label": "beans",
                "amount": {"currency": "CNY", "value": 60.0},
                "quantity": -2
            }],
            "total": {"label": "Total", "amount": {"currency": "CNY", "value": 120.0}}
        }))
        .unwrap();
        assert!(matches!(
            cart.validate(),
            Err(Ap2Error::PayloadSchemaInvalid(_))
        ));
    }

    #[test]
    fn empty_items_list_is_valid() {
        let cart: CartContents = serde_json::from_value(json!({
            "id": "cart_1",
            "items": [],
            "total": {"label": "Total", "amount": {"currency": "CNY", "value": 0.0}}
        }))
        .unwrap();
        cart.validate().unwrap();
    }
}
