// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn field(name: &str) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        required: false,
    }
}

fn detector(handle: u64, field: &str, priority: i32) -> Detector {
    Detector {
        handle,
        field: field.to_string(),
        priority,
        module: "plugin".to_string(),
        qualname: format!("detect_{field}_{handle}"),
    }
}

#[test]
fn duplicate_field_is_an_error() {
    let regs = Registrations {
        fields: vec![field("amount"), field("amount")],
        ..Default::default()
    };
    assert_eq!(
        PluginRegistry::from_registrations(regs).unwrap_err(),
        RegistryError::DuplicateField("amount".to_string())
    );
}

#[test]
fn capability_referencing_unknown_field_is_an_error() {
    let regs = Registrations {
        fields: vec![field("amount")],
        detectors: vec![detector(0, "missing", 0)],
        ..Default::default()
    };
    let err = PluginRegistry::from_registrations(regs).unwrap_err();
    assert!(matches!(err, RegistryError::UnknownField { field, .. } if field == "missing"));
}

#[test]
fn detectors_sorted_by_priority_then_registration_order() {
    let regs = Registrations {
        fields: vec![field("amount")],
        detectors: vec![
            detector(0, "amount", 1),
            detector(1, "amount", 5),
            detector(2, "amount", 5),
            detector(3, "amount", 10),
        ],
        ..Default::default()
    };
    let registry = PluginRegistry::from_registrations(regs).unwrap();
    let handles: Vec<u64> = registry
        .detectors_for("amount")
        .iter()
        .map(|d| d.handle)
        .collect();
    // priority 10 first, then the two priority-5 entries in registration
    // order, then priority 1
    assert_eq!(handles, vec![3, 1, 2, 0]);
}

#[test]
fn fields_keep_declaration_order() {
    let regs = Registrations {
        fields: vec![field("zebra"), field("alpha"), field("mid")],
        ..Default::default()
    };
    let registry = PluginRegistry::from_registrations(regs).unwrap();
    let names: Vec<&str> = registry.fields().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["zebra", "alpha", "mid"]);
}

#[test]
fn hooks_grouped_by_stage_and_sorted() {
    let hook = |handle: u64, stage: &str, priority: i32| Hook {
        handle,
        stage: stage.to_string(),
        priority,
        module: "plugin".to_string(),
        qualname: format!("hook_{handle}"),
    };
    let regs = Registrations {
        hooks: vec![
            hook(0, "after_table_mapped", 0),
            hook(1, "before_run", 0),
            hook(2, "after_table_mapped", 7),
        ],
        ..Default::default()
    };
    let registry = PluginRegistry::from_registrations(regs).unwrap();
    let mapped: Vec<u64> = registry
        .hooks_for(HookStage::AfterTableMapped)
        .iter()
        .map(|h| h.handle)
        .collect();
    assert_eq!(mapped, vec![2, 0]);
    assert_eq!(registry.hooks_for(HookStage::BeforeRun).len(), 1);
    assert!(registry.hooks_for(HookStage::AfterRun).is_empty());
}

#[test]
fn unknown_hook_stage_is_an_error() {
    let regs = Registrations {
        hooks: vec![Hook {
            handle: 0,
            stage: "after_lunch".to_string(),
            priority: 0,
            module: "plugin".to_string(),
            qualname: "hook_0".to_string(),
        }],
        ..Default::default()
    };
    let err = PluginRegistry::from_registrations(regs).unwrap_err();
    assert!(matches!(err, RegistryError::UnknownStage { stage, .. } if stage == "after_lunch"));
}

#[test]
fn registrations_deserialize_from_driver_json() {
    let json = serde_json::json!({
        "fields": [{"name": "amount", "required": true}],
        "detectors": [{"handle": 0, "field": "amount", "priority": 10,
                       "module": "plugin", "qualname": "detect_amount"}],
        "carry_passthrough": true
    });
    let regs: Registrations = serde_json::from_value(json).unwrap();
    let registry = PluginRegistry::from_registrations(regs).unwrap();
    assert!(registry.carry_passthrough());
    assert_eq!(registry.detectors_for("amount").len(), 1);
    assert!(registry.transforms_for("amount").is_empty());
}
