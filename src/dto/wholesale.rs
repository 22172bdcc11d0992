use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::WholesaleOrder;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceWholesaleOrderRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WholesaleOrderList {
    pub items: Vec<WholesaleOrder>,
}
