pub mod auth_service;
pub mod cart_service;
pub mod feedback_service;
pub mod notification_service;
pub mod order_service;
pub mod product_service;
pub mod wholesale_service;
