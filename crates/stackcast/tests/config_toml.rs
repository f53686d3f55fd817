use serde::Deserialize;
use stackcast::{
    ByteOrder, ComponentStack, Context, DriverRegistry, LengthPrefix, Model, RegistryConfig,
    Serializer,
};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Settings {
    #[serde(default)]
    drivers: RegistryConfig,
    context: Context,
}

const SETTINGS: &str = r#"
[drivers.binary]
byte_order = "little"
length_prefix = "u16"

[drivers.json]
pretty = true

[context]
version = 2
compact = true
"#;

#[test]
fn settings_parse_from_toml() {
    let settings: Settings = toml::from_str(SETTINGS).unwrap();
    assert_eq!(settings.drivers.binary.byte_order, ByteOrder::Little);
    assert_eq!(settings.drivers.binary.length_prefix, LengthPrefix::U16);
    assert!(!settings.drivers.binary.allow_trailing);
    assert!(settings.drivers.json.pretty);
    assert_eq!(settings.context.version(), 2);
    assert!(settings.context.flag("compact"));
}

#[test]
fn configured_registry_changes_the_layout() {
    let settings: Settings = toml::from_str(SETTINGS).unwrap();
    let registry = DriverRegistry::from_config(&settings.drivers);
    let stack = Arc::new(
        ComponentStack::builder("msg")
            .field("id", Serializer::uint16())
            .field("body", Serializer::string())
            .build()
            .unwrap(),
    );
    let model = Model::new(Arc::clone(&stack))
        .with("id", 0x0102u16)
        .and_then(|m| m.with("body", "ok"))
        .unwrap();

    let binary = registry.get("binary").unwrap();
    let artifact = model.dump(binary.as_ref(), &settings.context).unwrap();
    assert_eq!(artifact.as_bytes(), Some(&[0x02, 0x01, 0x02, 0x00, b'o', b'k'][..]));
    let loaded = Model::load(stack, binary.as_ref(), &artifact, &settings.context).unwrap();
    assert_eq!(loaded, model);
}

#[test]
fn empty_document_uses_defaults() {
    let settings: Settings = toml::from_str("[context]\n").unwrap();
    assert_eq!(settings.drivers, RegistryConfig::default());
    assert!(settings.context.is_latest());
}
