use axum_marketplace_api::{
    entity::cart_items,
    models::{OrderStatus, WholesaleStatus},
    routes::params::Pagination,
    services::order_service::group_by_seller,
};
use chrono::Utc;
use uuid::Uuid;

fn line(seller_id: Uuid, unit_price: i64, quantity: i32) -> cart_items::Model {
    cart_items::Model {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        product_name: "Widget".into(),
        seller_id,
        unit_price,
        quantity,
        created_at: Utc::now().into(),
    }
}

#[test]
fn grouping_keeps_first_appearance_order() {
    let seller_a = Uuid::new_v4();
    let seller_b = Uuid::new_v4();
    let lines = vec![
        line(seller_a, 100, 1),
        line(seller_b, 50, 1),
        line(seller_a, 25, 2),
    ];

    let groups = group_by_seller(&lines);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].0, seller_a);
    assert_eq!(groups[0].1.len(), 2);
    assert_eq!(groups[1].0, seller_b);
    assert_eq!(groups[1].1.len(), 1);
}

#[test]
fn group_totals_match_per_seller_sums() {
    let seller_a = Uuid::new_v4();
    let seller_b = Uuid::new_v4();
    let lines = vec![line(seller_a, 100, 2), line(seller_b, 50, 1)];

    let groups = group_by_seller(&lines);
    let totals: Vec<i64> = groups
        .iter()
        .map(|(_, group)| {
            group
                .iter()
                .map(|l| l.unit_price * l.quantity as i64)
                .sum()
        })
        .collect();

    assert_eq!(totals, vec![200, 50]);
}

#[test]
fn empty_cart_produces_no_groups() {
    assert!(group_by_seller(&[]).is_empty());
}

#[test]
fn order_status_moves_forward_only() {
    use OrderStatus::*;

    assert!(Pending.can_advance_to(Processing));
    assert!(Processing.can_advance_to(Shipped));
    assert!(Shipped.can_advance_to(Delivered));

    // Skipping a step or moving backward is never allowed.
    assert!(!Pending.can_advance_to(Shipped));
    assert!(!Pending.can_advance_to(Delivered));
    assert!(!Processing.can_advance_to(Pending));
    assert!(!Shipped.can_advance_to(Processing));
    assert!(!Delivered.can_advance_to(Shipped));
}

#[test]
fn cancellation_is_only_reachable_from_pending() {
    use OrderStatus::*;

    assert!(Pending.can_advance_to(Cancelled));
    assert!(!Processing.can_advance_to(Cancelled));
    assert!(!Shipped.can_advance_to(Cancelled));
    assert!(!Delivered.can_advance_to(Cancelled));
    assert!(!Cancelled.can_advance_to(Pending));
}

#[test]
fn terminal_statuses_have_no_exit() {
    use OrderStatus::*;

    for status in [Delivered, Cancelled] {
        assert!(status.is_terminal());
        for next in [Pending, Processing, Shipped, Delivered, Cancelled] {
            assert!(!status.can_advance_to(next));
        }
    }
    assert!(!Pending.is_terminal());
}

#[test]
fn order_status_round_trips_through_strings() {
    use OrderStatus::*;

    for status in [Pending, Processing, Shipped, Delivered, Cancelled] {
        assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(OrderStatus::parse("paid"), None);
    assert_eq!(OrderStatus::parse(""), None);
}

#[test]
fn wholesale_status_is_a_two_step_machine() {
    use WholesaleStatus::*;

    assert!(Pending.can_advance_to(Processing));
    assert!(Processing.can_advance_to(Completed));
    assert!(!Pending.can_advance_to(Completed));
    assert!(!Completed.can_advance_to(Pending));
    assert_eq!(WholesaleStatus::parse("completed"), Some(Completed));
    assert_eq!(WholesaleStatus::parse("delivered"), None);
}

#[test]
fn pagination_normalizes_bounds() {
    let (page, per_page, offset) = Pagination {
        page: None,
        per_page: None,
    }
    .normalize();
    assert_eq!((page, per_page, offset), (1, 20, 0));

    let (page, per_page, offset) = Pagination {
        page: Some(3),
        per_page: Some(10),
    }
    .normalize();
    assert_eq!((page, per_page, offset), (3, 10, 20));

    let (page, per_page, _) = Pagination {
        page: Some(-1),
        per_page: Some(10_000),
    }
    .normalize();
    assert_eq!((page, per_page), (1, 100));
}
