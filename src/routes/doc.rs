use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartList, SetQuantityRequest},
        feedback::{ProductFeedback, SubmitFeedbackRequest},
        notifications::NotificationList,
        orders::{CheckoutRequest, CheckoutResponse, OrderList, OrderWithItems},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        wholesale::{PlaceWholesaleOrderRequest, WholesaleOrderList},
    },
    models::{
        CartLine, Feedback, Notification, Order, OrderItem, OrderStatus, Product, User,
        WholesaleOrder, WholesaleStatus,
    },
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, notifications, orders, params, products, wholesale},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_to_cart,
        cart::set_quantity,
        cart::remove_from_cart,
        products::list_products,
        products::list_my_products,
        products::list_low_stock,
        products::list_wholesale_products,
        products::get_product,
        products::product_feedback,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::accept_order,
        orders::ship_order,
        orders::deliver_order,
        orders::cancel_order,
        orders::submit_feedback,
        wholesale::list_orders,
        wholesale::place_order,
        wholesale::accept_order,
        wholesale::complete_order,
        notifications::list_notifications,
        notifications::mark_read
    ),
    components(
        schemas(
            User,
            Product,
            CartLine,
            Order,
            OrderItem,
            OrderStatus,
            WholesaleOrder,
            WholesaleStatus,
            Feedback,
            Notification,
            AddToCartRequest,
            SetQuantityRequest,
            CartList,
            CheckoutRequest,
            CheckoutResponse,
            OrderList,
            OrderWithItems,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            PlaceWholesaleOrderRequest,
            WholesaleOrderList,
            SubmitFeedbackRequest,
            ProductFeedback,
            NotificationList,
            params::Pagination,
            params::ProductQuery,
            params::LowStockQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<WholesaleOrderList>,
            ApiResponse<ProductFeedback>,
            ApiResponse<NotificationList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Customer order endpoints"),
        (name = "Wholesale", description = "Retailer-to-wholesaler bulk order endpoints"),
        (name = "Notifications", description = "Notification endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
