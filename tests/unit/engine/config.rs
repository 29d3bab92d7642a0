use super::*;

#[test]
fn defaults_match_plugin_start_values() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.intensity, 1.0);
    assert_eq!(cfg.log_every, 60);
    assert_eq!(cfg.region.pad, 18);
    assert_eq!(cfg.region.mode, RegionMode::Combined);
    assert_eq!(cfg.region.anchors, AnchorStrategy::Ring { step: None });
    assert_eq!(cfg.solver.grid_size, 5);
    assert_eq!(cfg.solver.fall_off, 1.4);
    assert!(cfg.solver.pre_scale);
    assert!(cfg.validate().is_ok());
}

#[test]
fn intensity_bounds_are_enforced() {
    for bad in [10.5, -11.0, f64::NAN, f64::INFINITY] {
        let cfg = EngineConfig {
            intensity: bad,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err(), "{bad} accepted");
    }
    let cfg = EngineConfig {
        intensity: -10.0,
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_ok());
}

#[test]
fn zero_ring_step_is_rejected() {
    let mut cfg = EngineConfig::default();
    cfg.region.anchors = AnchorStrategy::Ring { step: Some(0) };
    assert!(cfg.validate().is_err());
}

#[test]
fn solver_errors_surface() {
    let mut cfg = EngineConfig::default();
    cfg.solver.grid_size = 0;
    assert!(matches!(cfg.validate(), Err(WarpError::Validation(_))));
}

#[test]
fn partial_json_fills_defaults() {
    let cfg: EngineConfig = serde_json::from_str(
        r#"{
            "intensity": -2.5,
            "region": { "mode": "per_group", "anchors": { "kind": "corners" } },
            "solver": { "grid_size": 8 }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.intensity, -2.5);
    assert_eq!(cfg.region.mode, RegionMode::PerGroup);
    assert_eq!(cfg.region.anchors, AnchorStrategy::Corners);
    assert_eq!(cfg.region.pad, 18);
    assert_eq!(cfg.solver.grid_size, 8);
    assert_eq!(cfg.solver.fall_off, 1.4);
}

#[test]
fn json_file_round_trip() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("target/unit-config");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("engine.json");
    let cfg = EngineConfig {
        intensity: 3.0,
        drop_when_no_face: true,
        ..EngineConfig::default()
    };
    std::fs::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();
    assert_eq!(EngineConfig::from_json_file(&path).unwrap(), cfg);

    std::fs::write(&path, r#"{"intensity": 99}"#).unwrap();
    assert!(EngineConfig::from_json_file(&path).is_err());
}
