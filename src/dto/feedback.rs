use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Feedback;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitFeedbackRequest {
    /// Integer star rating, 1 to 5.
    pub rating: i32,
    pub comment: String,
}

/// Feedback for one product, with its aggregate. `average_rating` is 0.0
/// when `total_reviews` is 0; the count tells an empty set apart from a
/// genuinely zero score.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductFeedback {
    pub items: Vec<Feedback>,
    pub average_rating: f64,
    pub total_reviews: i64,
}
