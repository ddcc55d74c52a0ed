use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::subscriptions::repo::Subscription;

/// Request body for subscribing to an address. Block heights default to 0
/// when absent. The `startingBlockheight` casing is the wire contract;
/// the conventional spelling is accepted as an alias.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub currency: String,
    pub address: String,
    #[serde(default)]
    pub block_height: i64,
    #[serde(
        default,
        rename = "startingBlockheight",
        alias = "startingBlockHeight"
    )]
    pub starting_block_height: i64,
}

/// Request body for unsubscribing from an address.
#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub currency: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency: String,
    pub account: String,
    pub block_height: i64,
    pub starting_block_height: i64,
    pub total_received: i64,
    pub total_spent: i64,
    pub filters: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            currency: s.currency,
            account: s.account,
            block_height: s.block_height,
            starting_block_height: s.starting_block_height,
            total_received: s.total_received,
            total_spent: s.total_spent,
            filters: s.filters,
            created_at: s.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_heights_default_to_zero() {
        let req: SubscribeRequest =
            serde_json::from_str(r#"{"currency":"BTC","address":"bc1qxyz"}"#).unwrap();
        assert_eq!(req.block_height, 0);
        assert_eq!(req.starting_block_height, 0);
    }

    #[test]
    fn starting_block_height_accepts_both_spellings() {
        let wire: SubscribeRequest = serde_json::from_str(
            r#"{"currency":"BTC","address":"bc1qxyz","startingBlockheight":42}"#,
        )
        .unwrap();
        assert_eq!(wire.starting_block_height, 42);

        let conventional: SubscribeRequest = serde_json::from_str(
            r#"{"currency":"BTC","address":"bc1qxyz","startingBlockHeight":42}"#,
        )
        .unwrap();
        assert_eq!(conventional.starting_block_height, 42);
    }

    #[test]
    fn response_is_camel_case() {
        let value = serde_json::to_value(SubscriptionResponse {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            currency: "ETH".into(),
            account: "0xabc".into(),
            block_height: 10,
            starting_block_height: 5,
            total_received: 0,
            total_spent: 0,
            filters: String::new(),
            created_at: OffsetDateTime::now_utc(),
        })
        .unwrap();
        assert!(value.get("blockHeight").is_some());
        assert!(value.get("startingBlockHeight").is_some());
        assert!(value.get("totalReceived").is_some());
        assert!(value.get("userId").is_some());
        assert!(value.get("block_height").is_none());
    }
}
