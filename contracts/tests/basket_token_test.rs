//! Integration tests for basket construction and share supply.
//!
//! Construction is exercised against heterogeneous in-memory assets,
//! including ones that hide or fail their precision query. Supply tests
//! cover controller reassignment through the factory reference.

use std::sync::Arc;

use basket_contracts::basket_token::{
    encode_fixed_text, BasketError, BasketParams, BasketToken, ConstructionError,
};
use basket_protocol::{
    Address, Asset, ControllerSource, DecimalsBehavior, FixedController, LedgerAsset, Quantity,
};

/// Helper: a fresh asset with the given label and precision.
fn asset(label: &str, decimals: DecimalsBehavior) -> Arc<dyn Asset> {
    Arc::new(LedgerAsset::with_behavior(Address::derive(label), decimals))
}

fn build(
    factory: Arc<dyn ControllerSource>,
    assets: Vec<Arc<dyn Asset>>,
    units: Vec<Quantity>,
    natural_unit: Quantity,
) -> Result<BasketToken, BasketError> {
    BasketToken::new(BasketParams {
        factory,
        assets,
        units,
        natural_unit,
        name: encode_fixed_text("Two Asset Basket"),
        symbol: encode_fixed_text("TAB"),
    })
}

fn factory() -> Arc<FixedController> {
    Arc::new(FixedController::new(Address::derive("core")))
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn natural_unit_floor_follows_least_precise_component() {
    let assets = || {
        vec![
            asset("asset-x", DecimalsBehavior::Reports(18)),
            asset("asset-y", DecimalsBehavior::Reports(6)),
        ]
    };

    let too_small = build(factory(), assets(), vec![100, 50], 10u128.pow(11));
    assert!(matches!(
        too_small,
        Err(BasketError::InvalidConstruction(
            ConstructionError::InvalidNaturalUnit { .. }
        ))
    ));

    let basket = build(factory(), assets(), vec![100, 50], 10u128.pow(12)).unwrap();
    assert_eq!(basket.natural_unit(), 10u128.pow(12));
    assert_eq!(basket.components().min_decimals(), 6);
    assert_eq!(basket.name(), "Two Asset Basket");
    assert_eq!(basket.symbol(), "TAB");
}

#[test]
fn accepted_baskets_always_satisfy_the_floor() {
    for decimals in 0..=18u8 {
        let floor = 10u128.pow((18 - decimals) as u32);
        for natural_unit in [floor / 10, floor, floor * 10] {
            let assets = vec![
                asset("base", DecimalsBehavior::Reports(18)),
                asset("probe", DecimalsBehavior::Reports(decimals)),
            ];
            let result = build(factory(), assets, vec![1, 1], natural_unit);
            assert_eq!(
                result.is_ok(),
                natural_unit >= floor && natural_unit > 0,
                "decimals={decimals} natural_unit={natural_unit}"
            );
        }
    }
}

#[test]
fn duplicate_asset_rejected_at_any_position() {
    let labels = ["a", "b", "c", "d"];
    for dup_at in 1..labels.len() {
        for original in 0..dup_at {
            let mut assets: Vec<Arc<dyn Asset>> = labels
                .iter()
                .map(|l| asset(l, DecimalsBehavior::Reports(18)))
                .collect();
            assets[dup_at] = asset(labels[original], DecimalsBehavior::Reports(18));

            let result = build(factory(), assets, vec![1; labels.len()], 1);
            match result {
                Err(BasketError::InvalidConstruction(ConstructionError::DuplicateComponent {
                    asset: repeated,
                })) => assert_eq!(repeated, Address::derive(labels[original])),
                other => panic!("expected duplicate error, got {other:?}"),
            }
        }
    }
}

#[test]
fn hidden_precision_after_precise_assets_still_forces_worst_case() {
    let assets = vec![
        asset("x", DecimalsBehavior::Reports(18)),
        asset("y", DecimalsBehavior::Fails),
        asset("z", DecimalsBehavior::Reports(18)),
    ];
    let result = build(factory(), assets, vec![1, 1, 1], 10u128.pow(18) - 1);
    assert!(matches!(
        result,
        Err(BasketError::InvalidConstruction(
            ConstructionError::InvalidNaturalUnit { .. }
        ))
    ));
}

#[test]
fn component_reads_preserve_construction_order() {
    let assets = vec![
        asset("z", DecimalsBehavior::Reports(18)),
        asset("a", DecimalsBehavior::Reports(18)),
        asset("m", DecimalsBehavior::Reports(18)),
    ];
    let basket = build(factory(), assets, vec![3, 1, 2], 1).unwrap();

    assert_eq!(
        basket.list_component_assets(),
        vec![Address::derive("z"), Address::derive("a"), Address::derive("m")]
    );
    assert_eq!(basket.list_component_units(), vec![3, 1, 2]);
    for asset in basket.list_component_assets() {
        assert!(basket.is_component(&asset));
    }
    assert!(!basket.is_component(&Address::derive("q")));
}

// ---------------------------------------------------------------------------
// Supply
// ---------------------------------------------------------------------------

#[test]
fn mint_then_burn_restores_state() {
    let basket = build(
        factory(),
        vec![asset("x", DecimalsBehavior::Reports(18))],
        vec![1],
        1,
    )
    .unwrap();
    let core = Address::derive("core");
    let alice = Address::derive("alice");
    let bob = Address::derive("bob");
    basket.mint_shares(&core, bob, 42).unwrap();

    basket.mint_shares(&core, alice, 1_000).unwrap();
    basket.burn_shares(&core, alice, 1_000).unwrap();

    assert_eq!(basket.total_supply(), 42);
    assert_eq!(basket.share_balance_of(&alice), 0);
    assert_eq!(
        basket.total_supply(),
        basket.share_balance_of(&alice) + basket.share_balance_of(&bob)
    );
}

#[test]
fn controller_is_resolved_on_every_call() {
    let factory = factory();
    let basket = build(
        factory.clone(),
        vec![asset("x", DecimalsBehavior::Reports(18))],
        vec![1],
        1,
    )
    .unwrap();
    let old_core = Address::derive("core");
    let new_core = Address::derive("core-v2");
    let alice = Address::derive("alice");

    basket.mint_shares(&old_core, alice, 10).unwrap();
    factory.reassign(new_core);
    assert_eq!(basket.factory_controller(), new_core);

    assert!(matches!(
        basket.mint_shares(&old_core, alice, 10),
        Err(BasketError::Unauthorized { .. })
    ));
    assert!(matches!(
        basket.burn_shares(&old_core, alice, 10),
        Err(BasketError::Unauthorized { .. })
    ));
    assert_eq!(basket.total_supply(), 10);

    basket.burn_shares(&new_core, alice, 10).unwrap();
    assert_eq!(basket.total_supply(), 0);
}

#[test]
fn supply_equals_sum_of_balances_through_transfers() {
    let basket = build(
        factory(),
        vec![asset("x", DecimalsBehavior::Reports(18))],
        vec![1],
        1,
    )
    .unwrap();
    let core = Address::derive("core");
    let holders: Vec<Address> = (0..3).map(|i| Address::derive(&format!("h{i}"))).collect();

    for (i, holder) in holders.iter().enumerate() {
        basket.mint_shares(&core, *holder, 100 * (i as Quantity + 1)).unwrap();
    }
    basket.transfer_shares(&holders[2], holders[0], 150).unwrap();
    basket.approve(&holders[1], holders[2], 80).unwrap();
    basket
        .transfer_shares_from(&holders[2], holders[1], holders[0], 80)
        .unwrap();
    basket.burn_shares(&core, holders[0], 200).unwrap();

    let sum: Quantity = holders.iter().map(|h| basket.share_balance_of(h)).sum();
    assert_eq!(basket.total_supply(), sum);
    assert_eq!(sum, 400);
}
