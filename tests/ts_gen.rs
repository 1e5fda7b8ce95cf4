#![cfg(feature = "ts-rs")]

use dealscope::forecast::TimelinePhase;
use dealscope::scenario::UsageBreakdownItem;
use dealscope::CreditPricingItem;
use ts_rs::TS;

#[test]
fn test_credit_pricing_item_generation() {
    assert_eq!(
        CreditPricingItem::decl(),
        "type CreditPricingItem = { category: string, key: string, price: number, unit: string, editable: boolean, };"
    );
}

#[test]
fn test_usage_breakdown_item_generation() {
    assert_eq!(
        UsageBreakdownItem::decl(),
        "type UsageBreakdownItem = { resource: string, units: number, rate: number, credits: number, };"
    );
}

#[test]
fn test_timeline_phase_generation() {
    assert_eq!(
        TimelinePhase::decl(),
        "type TimelinePhase = { name: string, weeks: number, description: string, };"
    );
}
