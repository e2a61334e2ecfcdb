//! Behavior of typed option access, overrides and checked updates.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use runway_config::{Config, ConfigError, Opt, OptionType, Schema};
use serde_json::{Value, json};

fn name_schema() -> Arc<Schema> {
    Schema::builder("MyConfig")
        .option(Opt::new("name").ty(OptionType::String).default("foo"))
        .build()
        .expect("schema builds")
}

fn required_name_schema() -> Arc<Schema> {
    Schema::builder("MyConfig")
        .option(Opt::new("name").ty(OptionType::String))
        .build()
        .expect("schema builds")
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[test]
fn reads_stored_value_through_every_interface() {
    let config = Config::with_values(name_schema(), [("name", json!("bar"))]).unwrap();

    assert_eq!(config.get("name").unwrap(), json!("bar"));
    assert_eq!(config.item("name"), Some(&json!("bar")));
    assert_eq!(config.data().get("name"), Some(&json!("bar")));
}

#[test]
fn required_option_without_value_fails() {
    let config = Config::new(required_name_schema());
    assert!(matches!(
        config.get("name"),
        Err(ConfigError::Required { name }) if name == "name"
    ));
}

#[test]
fn optional_option_defaults_to_null() {
    let schema = Schema::builder("MyConfig")
        .option(Opt::new("name").ty(OptionType::optional(OptionType::String)))
        .build()
        .unwrap();

    assert_eq!(Config::new(schema).get("name").unwrap(), Value::Null);
}

#[test]
fn untyped_options_accept_anything() {
    let schema = Schema::builder("MyConfig")
        .option(Opt::new("first_name"))
        .option(Opt::new("last_name").ty(OptionType::Any))
        .build()
        .unwrap();
    let mut config = Config::new(schema);

    config.set("first_name", "foo").unwrap();
    config.set("last_name", "bar").unwrap();
    assert_eq!(config.get("first_name").unwrap(), json!("foo"));

    config.set("first_name", 42).unwrap();
    config.set("last_name", 9000).unwrap();
    assert_eq!(config.get("first_name").unwrap(), json!(42));
    assert_eq!(config.get("last_name").unwrap(), json!(9000));
}

#[test]
fn typed_extraction() {
    let schema = Schema::builder("Server")
        .option(Opt::new("port").ty(OptionType::Integer).default(8080))
        .option(
            Opt::new("hosts")
                .ty(OptionType::list(OptionType::String))
                .default(json!(["a", "b"])),
        )
        .build()
        .unwrap();
    let config = Config::new(schema);

    assert_eq!(config.get_as::<u16>("port").unwrap(), 8080);
    assert_eq!(
        config.get_as::<Vec<String>>("hosts").unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
    assert!(matches!(
        config.get_as::<bool>("port"),
        Err(ConfigError::Deserialize { .. })
    ));
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

#[test]
fn initial_values_are_checked() {
    assert!(Config::with_values(name_schema(), [("name", json!(42))]).is_err());
}

#[test]
fn raw_write_then_checked_read_sees_raw_value() {
    let mut config = Config::new(name_schema());

    config.data_mut().insert("name".into(), json!(42));
    assert_eq!(config.get("name").unwrap(), json!(42));

    config.data_mut().insert("name".into(), json!("bar"));
    assert_eq!(config.get("name").unwrap(), json!("bar"));
}

#[test]
fn removal_restores_default_through_every_interface() {
    let mut config = Config::new(name_schema());
    config.set("name", "bar").unwrap();
    assert!(config.contains_key("name"));
    config.unset("name").unwrap();
    assert!(!config.contains_key("name"));
    assert_eq!(config.get("name").unwrap(), json!("foo"));

    config.set("name", "bar").unwrap();
    assert_eq!(config.remove("name"), Some(json!("bar")));
    assert_eq!(config.get("name").unwrap(), json!("foo"));

    config.set("name", "bar").unwrap();
    config.data_mut().remove("name");
    assert_eq!(config.get("name").unwrap(), json!("foo"));

    // Removing an unset option is fine.
    config.unset("name").unwrap();
}

#[test]
fn update_checks_every_pair() {
    let schema = required_name_schema();

    assert!(Config::new(schema.clone()).update([("name", json!(42))]).is_err());
    assert!(
        Config::new(schema.clone())
            .update([("name", json!("foo")), ("name", json!(42))])
            .is_err()
    );

    let mut config = Config::new(schema);
    config
        .update([("name", json!("foo")), ("bar", json!("baz"))])
        .unwrap();
    assert_eq!(config.len(), 2);
}

#[test]
fn failed_update_keeps_earlier_pairs() {
    let mut config = Config::new(required_name_schema());
    let result = config.update([("extra", json!(1)), ("name", json!(42))]);

    assert!(result.is_err());
    assert_eq!(config.item("extra"), Some(&json!(1)));
    assert_eq!(config.item("name"), None);
}

#[test]
fn custom_key_name_is_used_for_storage() {
    let schema = Schema::builder("Person")
        .option(Opt::new("first_name").key("name").ty(OptionType::String))
        .build()
        .unwrap();
    let mut config = Config::new(schema);

    config.set("first_name", "Ada").unwrap();
    assert_eq!(config.item("name"), Some(&json!("Ada")));
    assert!(config.insert("name", json!(1)).is_err());
    assert!(matches!(
        config.get("name"),
        Err(ConfigError::UnknownOption { .. })
    ));
}

// ---------------------------------------------------------------------------
// Schema inheritance
// ---------------------------------------------------------------------------

#[test]
fn subschema_inherits_options() {
    let parent = Schema::builder("MyConfig")
        .option(Opt::new("first_name").ty(OptionType::String).default("foo"))
        .build()
        .unwrap();
    let child = Schema::builder("SubConfig")
        .extends(&parent)
        .option(Opt::new("last_name").ty(OptionType::String).default("bar"))
        .build()
        .unwrap();

    let config = Config::new(child);
    assert_eq!(config.get("first_name").unwrap(), json!("foo"));
    assert_eq!(config.get("last_name").unwrap(), json!("bar"));
}

#[test]
fn subschema_overrides_default() {
    let parent = Schema::builder("MyConfig")
        .option(Opt::new("first_name").ty(OptionType::String).default("foo"))
        .build()
        .unwrap();
    let child = Schema::builder("SubConfig")
        .extends(&parent)
        .option(Opt::new("first_name").ty(OptionType::String).default("bar"))
        .build()
        .unwrap();

    assert_eq!(Config::new(child).get("first_name").unwrap(), json!("bar"));
}

#[test]
fn override_cannot_rebind_key_to_new_attribute() {
    let parent = Schema::builder("MyConfig")
        .option(Opt::new("first_name").key("name"))
        .build()
        .unwrap();
    let result = Schema::builder("SubConfig")
        .extends(&parent)
        .option(Opt::new("last_name").key("name"))
        .build();

    assert!(matches!(result, Err(ConfigError::MismatchedOverride { .. })));
}

#[test]
fn two_attributes_cannot_share_a_key() {
    let result = Schema::builder("MyConfig")
        .option(Opt::new("first_name").key("first_name"))
        .option(Opt::new("last_name").key("first_name"))
        .build();

    assert!(matches!(result, Err(ConfigError::MismatchedOverride { .. })));
}

#[test]
fn override_cannot_rename_key_of_attribute() {
    let parent = Schema::builder("MyConfig")
        .option(Opt::new("first_name").key("first_name"))
        .build()
        .unwrap();
    let result = Schema::builder("SubConfig")
        .extends(&parent)
        .option(Opt::new("first_name").key("last_name"))
        .build();

    assert!(matches!(result, Err(ConfigError::MismatchedOverride { .. })));
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn app_schema() -> Arc<Schema> {
    let db = Schema::builder("Db")
        .option(Opt::new("url").ty(OptionType::String).default("sqlite::memory:"))
        .option(Opt::new("pool").ty(OptionType::Integer).default(4))
        .build()
        .unwrap();
    Schema::builder("App").option(Opt::section("db", db)).build().unwrap()
}

#[test]
fn section_defaults_to_empty_nested_config() {
    let config = Config::new(app_schema());
    let db = config.section("db").unwrap();

    assert!(db.is_empty());
    assert_eq!(db.get("url").unwrap(), json!("sqlite::memory:"));
}

#[test]
fn section_values_are_converted_and_checked() {
    let mut config = Config::new(app_schema());

    config.set("db", json!({"url": "postgres://db"})).unwrap();
    assert_eq!(
        config.section("db").unwrap().get("url").unwrap(),
        json!("postgres://db")
    );

    assert!(config.set("db", json!({"pool": "many"})).is_err());
    assert!(config.set("db", json!("postgres://db")).is_err());
}

#[test]
fn section_round_trips_through_set_section() {
    let mut config = Config::new(app_schema());
    let mut db = config.section("db").unwrap();
    db.set("pool", 16).unwrap();
    config.set_section("db", &db).unwrap();

    assert_eq!(config.section("db").unwrap().get("pool").unwrap(), json!(16));
    assert_eq!(
        Value::Object(config.resolved()),
        json!({"db": {"url": "sqlite::memory:", "pool": 16}})
    );
}

#[test]
fn check_type_on_config_ignores_unknown_keys() {
    let config = Config::new(required_name_schema());
    assert!(config.check_type("name", &json!(42)).is_err());
    assert!(config.check_type("age", &json!(42)).is_ok());
    assert!(config.check_type("age", &json!("foo")).is_ok());
}
