//! Property tests for the pricing engine.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::USD};
use trolley::prelude::*;

fn usd(minor: i64) -> Price {
    Money::from_minor(minor, USD)
}

/// (base price, quantity, discount points, addons as (price, quantity))
type ItemSpec = (i64, i64, u32, Vec<(i64, i64)>);

fn item_spec_strategy() -> impl Strategy<Value = ItemSpec> {
    (
        1_i64..=50_000,
        1_i64..=25,
        0_u32..=100,
        prop::collection::vec((0_i64..=2_000, 1_i64..=5), 0..3),
    )
}

fn build_items(specs: &[ItemSpec]) -> Result<Vec<CartItem>, AmountError> {
    specs
        .iter()
        .enumerate()
        .map(|(idx, (price, quantity, points, addons))| {
            let mut item = CartItem::new(format!("item-{idx}"), format!("Item {idx}"), usd(*price))?
                .with_quantity(Quantity::new(*quantity)?)
                .with_discount(DiscountPercent::new(Decimal::from(*points))?);

            for (addon_idx, (addon_price, addon_quantity)) in addons.iter().enumerate() {
                item = item.with_addon(Addon::new(
                    format!("addon-{addon_idx}"),
                    usd(*addon_price),
                    Quantity::new(*addon_quantity)?,
                )?);
            }

            Ok(item)
        })
        .collect()
}

fn promo_strategy() -> impl Strategy<Value = Option<PromoCode>> {
    prop_oneof![
        Just(None),
        (0_u32..=100, 0_i64..=20_000).prop_map(|(points, min)| {
            DiscountPercent::new(Decimal::from(points))
                .ok()
                .and_then(|percent| {
                    PromoCode::new("PCT", PromoDiscount::Percentage(percent), usd(min)).ok()
                })
        }),
        (0_i64..=500_000, 0_i64..=20_000).prop_map(|(amount, min)| {
            PromoCode::new("FIXED", PromoDiscount::Fixed(usd(amount)), usd(min)).ok()
        }),
        (0_i64..=20_000)
            .prop_map(|min| PromoCode::new("SHIP", PromoDiscount::Shipping, usd(min)).ok()),
    ]
}

fn delivery_strategy() -> impl Strategy<Value = Option<DeliveryOption>> {
    prop_oneof![
        Just(None),
        (0_i64..=2_000).prop_map(|fee| DeliveryOption::new("option", "Option", usd(fee)).ok()),
    ]
}

proptest! {
    /// Property: the summary does not depend on item order.
    #[test]
    fn prop_summary_is_order_independent(
        (specs, order) in prop::collection::vec(item_spec_strategy(), 0..8)
            .prop_flat_map(|specs| {
                let order: Vec<usize> = (0..specs.len()).collect();
                (Just(specs), Just(order).prop_shuffle())
            }),
        promo in promo_strategy(),
        delivery in delivery_strategy(),
    ) {
        let config = PricingConfig::default();

        let items = build_items(&specs)?;
        let permuted: Vec<CartItem> = order.iter().filter_map(|&idx| items.get(idx).cloned()).collect();

        let original = compute_summary(&items, delivery.as_ref(), promo.as_ref(), &config)?;
        let reordered = compute_summary(&permuted, delivery.as_ref(), promo.as_ref(), &config)?;

        prop_assert_eq!(original, reordered);
    }

    /// Property: no combination of discounts drives the total below zero.
    #[test]
    fn prop_total_is_never_negative(
        specs in prop::collection::vec(item_spec_strategy(), 0..6),
        promo in promo_strategy(),
        delivery in delivery_strategy(),
    ) {
        let items = build_items(&specs)?;

        let summary =
            compute_summary(&items, delivery.as_ref(), promo.as_ref(), &PricingConfig::default())?;

        prop_assert!(summary.total.to_minor_units() >= 0, "total was {}", summary.total);
        prop_assert!(summary.promo_discount.to_minor_units() <= summary.subtotal.to_minor_units());
        prop_assert!(summary.item_discount_total.to_minor_units() <= summary.subtotal.to_minor_units());
    }

    /// Property: switching delivery incrementally equals a full recompute.
    #[test]
    fn prop_delivery_switch_matches_full_recompute(
        specs in prop::collection::vec(item_spec_strategy(), 0..6),
        promo in promo_strategy(),
        from in delivery_strategy(),
        to in delivery_strategy(),
    ) {
        let config = PricingConfig::default();
        let items = build_items(&specs)?;

        let before = compute_summary(&items, from.as_ref(), promo.as_ref(), &config)?;
        let switched = with_delivery_option(&before, to.as_ref(), promo.as_ref(), &config)?;
        let recomputed = compute_summary(&items, to.as_ref(), promo.as_ref(), &config)?;

        prop_assert_eq!(switched, recomputed);
    }

    /// Property: the rounded payload total is exactly the minor unit total.
    #[test]
    fn prop_payload_total_is_exact(
        specs in prop::collection::vec(item_spec_strategy(), 1..6),
    ) {
        let items = build_items(&specs)?;
        let summary = compute_summary(&items, None, None, &PricingConfig::default())?;

        let payload = summary.payload();

        prop_assert_eq!(payload.total, round2(&summary.total).to_string());
        prop_assert_eq!(
            round2(&summary.total) * Decimal::ONE_HUNDRED,
            Decimal::from(summary.total.to_minor_units())
        );
    }
}
