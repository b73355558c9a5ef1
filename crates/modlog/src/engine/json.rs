//! Provides [`JsonEngine`], an [`Engine`] writing one JSON object per message.

use std::{collections::HashMap, time::Duration};

use serde::ser::{SerializeMap, Serializer};
use serde_json::{
    ser::{CompactFormatter, Formatter},
    Value,
};
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::fmt::MakeWriter;

use super::{write_time, Engine, Output};
use crate::{keys, param::ChainedParams, pool::Pool, record::Record, Logger, LoggerError};

const MAX_IDLE_BUFFERS: usize = 32;
const BUFFER_HIGH_WATER: usize = 64 * 1024;

/// Configuration for creating a [`JsonEngine`].
#[derive(Clone, Debug, Default)]
pub struct JsonEngineConfig {
    /// Key-value pairs included in every log entry, after the level.
    pub static_fields: HashMap<String, Value>,

    /// If `true`, every entry carries the `hostname` and `pid` of the process.
    pub include_process_info: bool,
}

/// An [`Engine`] formatting messages as JSON objects, one per line.
///
/// Keys are written in the order `time`, `level`, `hostname` and `pid` (if enabled), the
/// static fields, `module`, `params`, `duration`, `stack`, `details` and `message`.
/// `duration` (in milliseconds), `stack` and `details` are omitted when absent.
///
/// The [`Formatter`] controls the JSON layout: [`CompactFormatter`] keeps each entry on a
/// single line, [`PrettyFormatter`](serde_json::ser::PrettyFormatter) indents it.
#[derive(Debug)]
pub struct JsonEngine<W, F = CompactFormatter>
where
    F: Formatter + Clone,
{
    output: Output<W>,
    formatter: F,
    process_info: Option<ProcessInfo>,
    static_fields: HashMap<String, Value>,
    buffers: Pool<Vec<u8>>,
}

#[derive(Debug)]
struct ProcessInfo {
    hostname: String,
    pid: u32,
}

impl<W> JsonEngine<W>
where
    W: for<'a> MakeWriter<'a>,
{
    /// Creates an engine writing compact JSON lines to `dst_writer`.
    pub fn new(dst_writer: W) -> Self {
        Self {
            output: Output::new(dst_writer),
            formatter: CompactFormatter,
            process_info: None,
            static_fields: HashMap::new(),
            buffers: Pool::new(MAX_IDLE_BUFFERS, BUFFER_HIGH_WATER),
        }
    }
}

impl<W, F> JsonEngine<W, F>
where
    W: for<'a> MakeWriter<'a>,
    F: Formatter + Clone,
{
    /// Creates a new [`JsonEngine`] with the specified configuration, writer and formatter.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Configuration`] if a static field uses one of the keys written by
    /// the engine itself.
    pub fn with_config(
        config: JsonEngineConfig,
        dst_writer: W,
        formatter: F,
    ) -> Result<Self, LoggerError> {
        for key in config.static_fields.keys() {
            if keys::IMPLICIT_KEYS.contains(key.as_str()) {
                return Err(LoggerError::Configuration(format!(
                    "A reserved key `{key}` was included in `static_fields` of the JSON engine"
                )));
            }
        }

        let process_info = config.include_process_info.then(|| ProcessInfo {
            hostname: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
        });

        Ok(Self {
            output: Output::new(dst_writer),
            formatter,
            process_info,
            static_fields: config.static_fields,
            buffers: Pool::new(MAX_IDLE_BUFFERS, BUFFER_HIGH_WATER),
        })
    }

    /// Serializes `record` as a JSON object into `buffer`, newline terminated.
    fn serialize(
        &self,
        logger: &Logger,
        record: &Record,
        buffer: &mut Vec<u8>,
    ) -> Result<(), LoggerError> {
        let mut time = self.buffers.acquire();
        write_time(logger, record, &Rfc3339, &mut time)?;
        let time = std::str::from_utf8(&time).unwrap_or_default();

        let mut serializer =
            serde_json::Serializer::with_formatter(&mut *buffer, self.formatter.clone());
        let mut map_serializer = serializer.serialize_map(None)?;

        map_serializer.serialize_entry(keys::TIME, time)?;
        map_serializer.serialize_entry(keys::LEVEL, record.level().as_str())?;

        if let Some(info) = &self.process_info {
            map_serializer.serialize_entry(keys::HOSTNAME, &info.hostname)?;
            map_serializer.serialize_entry(keys::PID, &info.pid)?;
        }

        for (key, value) in &self.static_fields {
            map_serializer.serialize_entry(key, value)?;
        }

        map_serializer.serialize_entry(keys::MODULE, logger.modules())?;

        map_serializer.serialize_entry(
            keys::PARAMS,
            &ChainedParams {
                first: record.logger_params(),
                second: record.params(),
            },
        )?;

        let duration = duration_millis(record.duration());
        if duration > 0 {
            map_serializer.serialize_entry(keys::DURATION, &duration)?;
        }
        if let Some(stack) = record.stack() {
            map_serializer.serialize_entry(keys::STACK, stack)?;
        }
        if let Some(details) = record.details() {
            map_serializer.serialize_entry(keys::DETAILS, details)?;
        }
        map_serializer.serialize_entry(keys::MESSAGE, record.message())?;

        map_serializer.end()?;
        buffer.push(b'\n');
        Ok(())
    }
}

impl<W, F> Engine for JsonEngine<W, F>
where
    W: for<'a> MakeWriter<'a> + Send + Sync,
    F: Formatter + Clone + Send + Sync,
{
    fn write(&self, logger: &Logger, record: &Record) {
        let mut buffer = self.buffers.acquire();
        if let Err(error) = self.serialize(logger, record, &mut buffer) {
            tracing::warn!("Failed to serialize log entry: {error}");
            return;
        }

        // A single `write_all()` keeps concurrent entries from interleaving.
        if let Err(error) = self.output.write_entry(&buffer) {
            tracing::warn!("Failed to write log entry: {error}");
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, ser::PrettyFormatter};

    use super::*;
    use crate::testing::Capture;

    fn entries(capture: &Capture) -> Vec<Value> {
        capture
            .lines()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn entry_has_the_documented_fields() {
        let capture = Capture::default();
        let logger = Logger::new("app", JsonEngine::new(capture.clone()));
        logger
            .module("users")
            .info()
            .param("id", 42)
            .send(format_args!("login {}", "ok"));

        let entries = entries(&capture);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry["level"], "INFO");
        assert_eq!(entry["module"], json!(["app", "users"]));
        assert_eq!(entry["params"], json!([{"name": "id", "value": 42}]));
        assert_eq!(entry["message"], "login ok");
        assert!(entry["time"].as_str().is_some_and(|time| time.contains('T')));

        let object = entry.as_object().unwrap();
        for absent in ["duration", "stack", "details", "hostname", "pid"] {
            assert!(!object.contains_key(absent), "`{absent}` should be omitted");
        }
    }

    #[test]
    fn keys_are_written_in_order() {
        let capture = Capture::default();
        let logger = Logger::new("app", JsonEngine::new(capture.clone()));
        logger
            .error()
            .duration(Duration::from_millis(1500))
            .details(json!({"attempt": 2}))
            .stack()
            .send("failed");

        let line = &capture.lines()[0];
        let keys = [
            "\"time\"",
            "\"level\"",
            "\"module\"",
            "\"params\"",
            "\"duration\"",
            "\"stack\"",
            "\"details\"",
            "\"message\"",
        ];
        let positions: Vec<_> = keys.iter().map(|key| line.find(key).unwrap()).collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{line}");

        let entry: Value = serde_json::from_str(line).unwrap();
        assert_eq!(entry["duration"], 1500);
        assert_eq!(entry["details"], json!({"attempt": 2}));
        assert!(!entry["stack"].as_str().unwrap().is_empty());
    }

    #[test]
    fn params_match_the_text_rendering() {
        let capture = Capture::default();
        let logger = Logger::new("app", JsonEngine::new(capture.clone()));
        logger.param("service", "api");

        let values = [json!(1), json!("two"), json!(3.5), json!(true), json!(null)];
        let mut message = logger.info();
        for (index, value) in values.iter().enumerate() {
            message.param(format!("p{index}"), value.clone());
        }
        message.send("test");

        let logger_params = logger.params();
        let expected: Vec<_> = logger_params
            .iter()
            .map(|param| (param.name().to_owned(), param.display_value().to_string()))
            .chain(
                values
                    .iter()
                    .enumerate()
                    .map(|(index, value)| {
                        let param = crate::Param::new(format!("p{index}"), value.clone());
                        (param.name().to_owned(), param.display_value().to_string())
                    }),
            )
            .collect();

        let entry = &entries(&capture)[0];
        let parsed: Vec<_> = entry["params"]
            .as_array()
            .unwrap()
            .iter()
            .map(|param| {
                let param = crate::Param::new(
                    param["name"].as_str().unwrap().to_owned(),
                    param["value"].clone(),
                );
                (param.name().to_owned(), param.display_value().to_string())
            })
            .collect();

        assert_eq!(parsed, expected);
    }

    #[test]
    fn scoped_modules_are_written_with_their_scope() {
        let capture = Capture::default();
        let logger = Logger::new("app", JsonEngine::new(capture.clone()));
        logger
            .module_with_scope("users", "eu")
            .module("sessions")
            .info()
            .send("opened");

        let entry = &entries(&capture)[0];
        assert_eq!(entry["module"], json!(["app", "users@eu", "sessions"]));
    }

    #[test]
    fn static_fields_and_process_info() {
        let capture = Capture::default();
        let config = JsonEngineConfig {
            static_fields: HashMap::from([("service".to_owned(), json!("billing"))]),
            include_process_info: true,
        };
        let engine = JsonEngine::with_config(config, capture.clone(), CompactFormatter).unwrap();
        Logger::new("app", engine).warn().send("low balance");

        let entry = &entries(&capture)[0];
        assert_eq!(entry["service"], "billing");
        assert_eq!(entry["pid"], std::process::id());
        assert!(entry["hostname"].is_string());
    }

    #[test]
    fn reserved_static_fields_are_rejected() {
        let config = JsonEngineConfig {
            static_fields: HashMap::from([("message".to_owned(), json!("nope"))]),
            include_process_info: false,
        };
        let result = JsonEngine::with_config(config, Capture::default(), CompactFormatter);
        assert!(matches!(result, Err(LoggerError::Configuration(_))));
    }

    #[test]
    fn pretty_entries_are_still_newline_terminated() {
        let capture = Capture::default();
        let engine =
            JsonEngine::with_config(JsonEngineConfig::default(), capture.clone(), PrettyFormatter::new())
                .unwrap();
        Logger::new("app", engine).info().send("pretty");

        let text = capture.text();
        assert!(text.ends_with("}\n"));
        let entry: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(entry["message"], "pretty");
    }

    #[test]
    fn time_format_override_applies() {
        let capture = Capture::default();
        let logger = Logger::new("app", JsonEngine::new(capture.clone()));
        logger.set_time_format("[year]").unwrap();
        logger.info().send("dated");

        let entry = &entries(&capture)[0];
        assert_eq!(entry["time"].as_str().unwrap().len(), 4);
    }
}
