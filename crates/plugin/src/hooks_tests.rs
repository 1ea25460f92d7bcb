// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    before_run = { HookStage::BeforeRun, false },
    before_row = { HookStage::BeforeRow, false },
    after_mapped = { HookStage::AfterTableMapped, true },
    after_transformed = { HookStage::AfterTableTransformed, true },
    after_validated = { HookStage::AfterTableValidated, true },
    before_save = { HookStage::BeforeSave, false },
    after_run = { HookStage::AfterRun, false },
)]
fn table_returning_stages(stage: HookStage, returns: bool) {
    assert_eq!(stage.returns_table(), returns);
}

#[test]
fn stage_parse_roundtrip() {
    for stage in [
        HookStage::BeforeRun,
        HookStage::BeforeRow,
        HookStage::AfterTableMapped,
        HookStage::AfterTableTransformed,
        HookStage::AfterTableValidated,
        HookStage::BeforeSave,
        HookStage::AfterRun,
    ] {
        assert_eq!(HookStage::parse(&stage.to_string()), Some(stage));
    }
    assert_eq!(HookStage::parse("after_lunch"), None);
}

#[test]
fn context_serializes_with_stage_tag() {
    let ctx = HookContext::AfterTableMapped {
        region: "Sheet1".to_string(),
        table: Table::default(),
        table_index: 0,
    };
    assert_eq!(ctx.stage(), HookStage::AfterTableMapped);
    let json = serde_json::to_value(&ctx).unwrap();
    assert_eq!(json["stage"], "after_table_mapped");
    assert_eq!(json["region"], "Sheet1");
    assert_eq!(json["table_index"], 0);
}

#[test]
fn before_row_context_carries_row() {
    let mut row = BTreeMap::new();
    row.insert("amount".to_string(), "12.5".to_string());
    let ctx = HookContext::BeforeRow {
        region: "Sheet1".to_string(),
        row_index: 3,
        row,
    };
    let json = serde_json::to_value(&ctx).unwrap();
    assert_eq!(json["row"]["amount"], "12.5");
    assert_eq!(json["row_index"], 3);
}
