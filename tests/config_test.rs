use serial_test::serial;
use std::env;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use wx_influx_forwarder::Config;
use wx_influx_forwarder::app::{BindingFilter, ConfigError};
use wx_influx_forwarder::buffer::OverflowPolicy;
use wx_influx_forwarder::domain::Binding;
use wx_influx_forwarder::protocol::LineFormat;
use wx_influx_forwarder::reliability::ShutdownPolicy;
use wx_influx_forwarder::sender::HttpClient;
use wx_influx_forwarder::transform::{InclusionPolicy, MapperError, ObsToUpload};
use wx_influx_forwarder::units::{Unit, UnitSystem};

const ENV_VARS: &[&str] = &[
    "INFLUX_SERVER_URL",
    "INFLUX_HOST",
    "INFLUX_PORT",
    "INFLUX_DATABASE",
    "INFLUX_USERNAME",
    "INFLUX_PASSWORD",
    "MEASUREMENT",
    "TAGS",
    "LINE_FORMAT",
    "QUEUE_CAPACITY",
    "CONFIG_FILE",
];

fn clean_env() {
    for var in ENV_VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const FULL_TOML: &str = r#"
server_url = "http://influx.local:8086/"
database = "weewx"
username = "writer"
password = "pw"
measurement = "weewx"
tags = "station=A, field=C"
line_format = "multi-line-dotted"
obs_to_upload = "none"
unit_system = "METRIC"
binding = "both"
queue_capacity = 50
overflow_policy = "drop-oldest"
shutdown_policy = "discard"
shutdown_deadline_ms = 1500

[inputs.outTemp]
units = "degree_F"
name = "outTemp_F"
format = "%.1f"

[inputs.barometer]
format = "%.3f"
"#;

#[test]
fn test_toml_file_with_inputs_table() {
    let file = write_config(FULL_TOML);
    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.server_url.as_deref(), Some("http://influx.local:8086"));
    assert_eq!(config.line_format, LineFormat::MultiLineDotted);
    assert_eq!(config.obs_to_upload, ObsToUpload::None);
    assert_eq!(config.unit_system, Some(UnitSystem::Metric));
    assert_eq!(config.binding, BindingFilter::Both);
    assert_eq!(config.overflow_policy, OverflowPolicy::DropOldest);
    assert_eq!(config.inputs.len(), 2);
    assert_eq!(config.inputs["outTemp"].units, Some(Unit::DegreeF));
    assert_eq!(config.config_file.as_deref(), Some(file.path()));

    let tags = config.tag_set().unwrap();
    assert_eq!(tags.get("station"), Some("A"));
    assert_eq!(tags.get("field"), Some("C"));
    assert_eq!(config.mapper().unwrap().policy(), InclusionPolicy::ExplicitList);

    let forwarder = config.to_forwarder_config().unwrap();
    assert_eq!(forwarder.client.database, "weewx");
    assert_eq!(forwarder.client.credentials.unwrap().username, "writer");
    assert_eq!(forwarder.queue_capacity, 50);
    assert_eq!(forwarder.worker.shutdown_policy, ShutdownPolicy::Discard);
    assert_eq!(forwarder.worker.shutdown_deadline, Duration::from_millis(1500));
    assert!(forwarder.transformer.mapper().is_listed("barometer"));
}

#[test]
fn test_defaults() {
    let config = Config::from_toml("host = \"localhost\"\ndatabase = \"weewx\"").unwrap();
    assert_eq!(config.server_url().unwrap().as_str(), "http://localhost:8086/");
    assert_eq!(config.measurement, "record");
    assert!(config.append_units_label);
    assert!(!config.augment_record);
    assert!(config.create_database);
    assert_eq!(config.binding, BindingFilter::Archive);
    assert_eq!(config.queue_capacity, 10);
    assert_eq!(config.max_retries, 3);

    let forwarder = config.to_forwarder_config().unwrap();
    let client = HttpClient::new(forwarder.client).unwrap();
    assert_eq!(client.write_url().as_str(), "http://localhost:8086/write?db=weewx");
}

#[test]
fn test_host_and_server_url_conflict() {
    let result = Config::from_toml(
        "host = \"localhost\"\nserver_url = \"http://other:8086\"\ndatabase = \"weewx\"",
    );
    assert!(matches!(result, Err(ConfigError::Conflict(_))));
}

#[test]
fn test_missing_host_and_database() {
    assert!(matches!(
        Config::from_toml("database = \"weewx\""),
        Err(ConfigError::Missing(_))
    ));
    assert!(matches!(
        Config::from_toml("host = \"localhost\""),
        Err(ConfigError::Missing("database"))
    ));
    assert!(matches!(
        Config::from_toml("host = \"localhost\"\ndatabase = \"  \""),
        Err(ConfigError::Missing("database"))
    ));
}

#[test]
fn test_incompatible_override_unit_is_fatal() {
    let toml = r#"
host = "localhost"
database = "weewx"

[inputs.outTemp]
units = "mbar"
"#;
    match Config::from_toml(toml) {
        Err(ConfigError::Mapping(MapperError::Units { name, .. })) => assert_eq!(name, "outTemp"),
        other => panic!("expected a unit group error, got {other:?}"),
    }
}

#[test]
fn test_unknown_unit_and_bad_format_rejected() {
    let unknown_unit = "host = \"h\"\ndatabase = \"d\"\n[inputs.outTemp]\nunits = \"furlong\"";
    assert!(matches!(
        Config::from_toml(unknown_unit),
        Err(ConfigError::ParseError(_))
    ));

    let bad_format = "host = \"h\"\ndatabase = \"d\"\n[inputs.outTemp]\nformat = \"%.1f F\"";
    assert!(matches!(
        Config::from_toml(bad_format),
        Err(ConfigError::Mapping(MapperError::Format { .. }))
    ));
}

#[test]
fn test_invalid_values_rejected() {
    for toml in [
        "host = \"h\"\ndatabase = \"d\"\nqueue_capacity = 0",
        "host = \"h\"\ndatabase = \"d\"\nmeasurement = \" \"",
        "host = \"h\"\ndatabase = \"d\"\npassword = \"pw\"",
        "host = \"h\"\ndatabase = \"d\"\nretry_base_delay_ms = 5000\nretry_max_delay_ms = 10",
        "server_url = \"ftp://h\"\ndatabase = \"d\"",
        "host = \"http://h\"\ndatabase = \"d\"",
        "host = \"h\"\ndatabase = \"d\"\ntags = \"station\"",
        "host = \"h\"\ndatabase = \"d\"\ntags = \"station=A\\nB\"",
        "host = \"h\"\ndatabase = \"d\"\nmeasurement = \"wx\\ndata\"",
    ] {
        assert!(Config::from_toml(toml).is_err(), "accepted: {toml}");
    }
}

#[test]
#[serial]
fn test_from_args_and_environment() {
    clean_env();
    unsafe {
        env::set_var("INFLUX_HOST", "influx.local");
        env::set_var("INFLUX_DATABASE", "weather");
        env::set_var("TAGS", "station=B");
    }

    let config = Config::from_args([
        "wx-influx-forwarder",
        "--port",
        "9999",
        "--line-format",
        "multi-line",
        "--input-binding",
        "loop",
    ])
    .unwrap();

    assert_eq!(config.host.as_deref(), Some("influx.local"));
    assert_eq!(config.port, 9999);
    assert_eq!(config.database.as_deref(), Some("weather"));
    assert_eq!(config.line_format, LineFormat::MultiLine);
    assert_eq!(config.input_binding, Binding::Loop);
    assert_eq!(config.tag_set().unwrap().get("station"), Some("B"));

    clean_env();
}

#[test]
#[serial]
fn test_command_line_overrides_file() {
    clean_env();
    let file = write_config(FULL_TOML);
    let path = file.path().to_str().unwrap().to_string();

    let config = Config::from_args([
        "wx-influx-forwarder",
        "--config-file",
        path.as_str(),
        "--database",
        "other",
    ])
    .unwrap();

    assert_eq!(config.database.as_deref(), Some("other"));
    // Values left at their defaults on the command line keep the file's.
    assert_eq!(config.line_format, LineFormat::MultiLineDotted);
    assert_eq!(config.queue_capacity, 50);
    assert_eq!(config.inputs.len(), 2);

    clean_env();
}

#[test]
#[serial]
fn test_command_line_default_value_overrides_file() {
    clean_env();
    let file = write_config(
        "host = \"localhost\"\ndatabase = \"weewx\"\nline_format = \"multi-line\"\ncreate_database = false\nqueue_capacity = 25\n",
    );
    let path = file.path().to_str().unwrap().to_string();

    let config = Config::from_args([
        "wx-influx-forwarder",
        "--config-file",
        path.as_str(),
        "--line-format",
        "single-line",
        "--create-database",
        "true",
    ])
    .unwrap();

    assert_eq!(config.line_format, LineFormat::SingleLine);
    assert!(config.create_database);
    assert_eq!(config.queue_capacity, 25);

    unsafe {
        env::set_var("QUEUE_CAPACITY", "10");
    }
    let config = Config::from_args(["wx-influx-forwarder", "--config-file", path.as_str()]).unwrap();
    assert_eq!(config.queue_capacity, 10);
    assert_eq!(config.line_format, LineFormat::MultiLine);

    clean_env();
}
