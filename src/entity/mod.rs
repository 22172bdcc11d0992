pub mod cart_items;
pub mod feedback;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod users;
pub mod wholesale_orders;

pub use cart_items::Entity as CartItems;
pub use feedback::Entity as Feedbacks;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use users::Entity as Users;
pub use wholesale_orders::Entity as WholesaleOrders;
