use std::path::PathBuf;

use crate::convert::{CachePolicy, ConfigError, EngineConfig, NgonConfig};
use crate::knots::KnotTolerance;
use crate::units::UnitSystem;

#[test]
fn attributes_override_defaults() {
    let xml = r#"
        <engine cache_policy="extreme" model_units="Millimeters" interchange_fallback="false" subd_levels="3">
            <knot_tolerance absolute="1e-10" relative="0"/>
            <interchange_dir>/var/tmp/brep</interchange_dir>
        </engine>
    "#;
    let config = EngineConfig::from_xml_str(xml).expect("config");
    assert_eq!(config.cache_policy, CachePolicy::Extreme);
    assert_eq!(config.model_units, UnitSystem::Millimeters);
    assert_eq!(config.page_units, UnitSystem::Feet);
    assert!(!config.interchange_fallback);
    assert_eq!(config.subd_levels, 3);
    assert_eq!(
        config.knot_tolerance,
        KnotTolerance {
            absolute: 1e-10,
            relative: 0.0
        }
    );
    assert_eq!(config.interchange_dir, Some(PathBuf::from("/var/tmp/brep")));
    assert_eq!(config.ngon, NgonConfig::default());
}

#[test]
fn empty_element_is_the_default_config() {
    let config = EngineConfig::from_xml_str("<engine/>").expect("config");
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn config_survives_xml() {
    let config = EngineConfig {
        cache_policy: CachePolicy::Disabled,
        model_units: UnitSystem::Meters,
        ngon: NgonConfig {
            min_vertex_count: 5,
            min_face_count: 3,
        },
        ..EngineConfig::default()
    };
    let xml = config.to_xml_string().expect("serialize");
    assert!(xml.starts_with("<engine"));
    assert_eq!(EngineConfig::from_xml_str(&xml).expect("parse"), config);
}

#[test]
fn invalid_values_are_rejected() {
    assert!(matches!(
        EngineConfig::from_xml_str(r#"<engine subd_levels="0"/>"#),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        EngineConfig::from_xml_str(r#"<engine><knot_tolerance absolute="-1" relative="0"/></engine>"#),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        EngineConfig::from_xml_str(r#"<engine subd_levels="many"/>"#),
        Err(ConfigError::Xml(_))
    ));
}
