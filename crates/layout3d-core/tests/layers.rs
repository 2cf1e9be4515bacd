use layout3d_core::layers::{ConfigError, LayerRule, LayerStackConfig, LayerStackTable, Rgb};
use layout3d_core::model::LayerKey;

fn rule(layer: u16, name: &str, z_bottom: f64, z_top: f64) -> LayerRule {
    LayerRule {
        source_layer: layer,
        source_datatype: 0,
        name: name.to_string(),
        z_bottom,
        z_top,
        material: "Al".to_string(),
        color: Rgb::new(200, 200, 200),
        enabled: true,
    }
}

#[test]
fn lookup_by_layer_and_datatype() {
    let table = LayerStackTable::new(vec![rule(1, "metal1", 0.0, 1.0), rule(2, "via1", 1.0, 1.5)])
        .expect("valid table");
    assert_eq!(2, table.len());
    assert_eq!("via1", table.lookup(LayerKey::new(2, 0)).map(|r| r.name.as_str()).unwrap_or(""));
    assert!(table.lookup(LayerKey::new(2, 1)).is_none());
}

#[test]
fn rejects_inverted_z_range() {
    let err = LayerStackTable::new(vec![rule(1, "bad", 2.0, 1.0)]).unwrap_err();
    assert!(matches!(err, ConfigError::InvertedZRange { .. }));
}

#[test]
fn rejects_duplicate_mapping() {
    let err = LayerStackTable::new(vec![rule(1, "a", 0.0, 1.0), rule(1, "b", 1.0, 2.0)])
        .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateMapping { layer: 1, .. }));
}

#[test]
fn parses_hex_colors() {
    assert_eq!(Rgb::new(255, 0, 16), Rgb::parse_hex("#FF0010").unwrap());
    assert_eq!("#0A0B0C", Rgb::new(10, 11, 12).to_string());
    assert!(Rgb::parse_hex("#FFF").is_err());
    assert!(Rgb::parse_hex("#GG0000").is_err());
}

#[test]
fn layer_stack_file_accepts_thickness_or_z_end() {
    let json = r##"{
        "project": "demo",
        "units": "um",
        "layers": [
            {"gds_layer": 1, "gds_datatype": 0, "name": "metal1", "z_start": 0.0,
             "z_end": 0.5, "material": "Al", "color": "#C0C0C0"},
            {"gds_layer": 2, "name": "via1", "z_start": 0.5, "thickness": 0.25,
             "material": "W", "color": "#404040", "enabled": false}
        ]
    }"##;
    let config: LayerStackConfig = serde_json::from_str(json).expect("parse");
    assert_eq!(Some("um".to_string()), config.units);

    let table = config.into_table().expect("table");
    let via = table.lookup(LayerKey::new(2, 0)).expect("via rule");
    assert_eq!(0.75, via.z_top);
    assert!(!via.enabled);
    assert_eq!(1, table.enabled_rules().count());
}

#[test]
fn layer_stack_entry_without_top_is_rejected() {
    let json = r#"{"layers": [{"gds_layer": 1, "name": "m1", "z_start": 0.0}]}"#;
    let config: LayerStackConfig = serde_json::from_str(json).expect("parse");
    assert!(matches!(
        config.into_table(),
        Err(ConfigError::MissingTop { .. })
    ));
}
