//! Per-operation timeouts configured through the `timeouts` block
//!
//! Values use Go duration syntax (`30m`, `1h30m`, `45s`). The chosen timeout
//! becomes the deadline of the operation's [`Context`].

use std::time::Duration;
use tfplug::context::Context;
use tfplug::schema::{
    AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode, Validator,
    ValidatorRequest, ValidatorResponse,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use thiserror::Error;

pub const BLOCK_NAME: &str = "timeouts";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TimeoutParseError {
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("unknown unit {unit:?} in duration {value:?}")]
    UnknownUnit { value: String, unit: String },
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
}

/// Parses a Go style duration such as `1h30m` or `1.5s`; negative values are
/// rejected
pub fn parse_duration(value: &str) -> Result<Duration, TimeoutParseError> {
    let input = value.trim();
    if input.is_empty() || input.starts_with('-') {
        return Err(TimeoutParseError::Invalid(value.to_string()));
    }
    let input = input.strip_prefix('+').unwrap_or(input);
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(TimeoutParseError::Invalid(value.to_string()));
        }
        let number: f64 = rest[..number_len]
            .parse()
            .map_err(|_| TimeoutParseError::Invalid(value.to_string()))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        if unit_len == 0 {
            return Err(TimeoutParseError::MissingUnit(value.to_string()));
        }
        let unit = &rest[..unit_len];
        let nanos_per_unit = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => {
                return Err(TimeoutParseError::UnknownUnit {
                    value: value.to_string(),
                    unit: unit.to_string(),
                })
            }
        };
        total_nanos += number * nanos_per_unit;
        rest = &rest[unit_len..];
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    pub fn default_timeout(&self) -> Duration {
        match self {
            Operation::Read => Duration::from_secs(5 * 60),
            Operation::Create | Operation::Update | Operation::Delete => {
                Duration::from_secs(30 * 60)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Operation::Create.default_timeout(),
            read: Operation::Read.default_timeout(),
            update: Operation::Update.default_timeout(),
            delete: Operation::Delete.default_timeout(),
        }
    }
}

impl Timeouts {
    /// Reads the `timeouts` block from config or state; unset values keep
    /// their defaults
    pub fn from_value(value: &DynamicValue) -> Result<Self, TimeoutParseError> {
        let mut timeouts = Self::default();
        let Some(Dynamic::Map(block)) = value.get(&AttributePath::new(BLOCK_NAME)) else {
            return Ok(timeouts);
        };

        for op in [
            Operation::Create,
            Operation::Read,
            Operation::Update,
            Operation::Delete,
        ] {
            if let Some(Dynamic::String(raw)) = block.get(op.as_str()) {
                let duration = parse_duration(raw)?;
                match op {
                    Operation::Create => timeouts.create = duration,
                    Operation::Read => timeouts.read = duration,
                    Operation::Update => timeouts.update = duration,
                    Operation::Delete => timeouts.delete = duration,
                }
            }
        }
        Ok(timeouts)
    }

    pub fn get(&self, op: Operation) -> Duration {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// Derives the context an operation runs under from the configured timeout
pub fn operation_context(
    ctx: &Context,
    value: &DynamicValue,
    op: Operation,
) -> Result<Context, Diagnostic> {
    let timeouts = Timeouts::from_value(value).map_err(|e| {
        Diagnostic::error("Invalid timeout", e.to_string())
            .with_attribute(AttributePath::new(BLOCK_NAME).attribute(op.as_str()))
    })?;
    Ok(ctx.with_timeout(timeouts.get(op)))
}

/// The `timeouts {}` block offering the given operations
pub fn block(operations: &[Operation]) -> NestedBlock {
    let mut builder = NestedBlockBuilder::new(BLOCK_NAME).nesting(NestingMode::Single);
    for op in operations {
        builder = builder.attribute(
            AttributeBuilder::new(op.as_str(), AttributeType::String)
                .optional()
                .description(&format!(
                    "Timeout for {} operations (default {}m)",
                    op.as_str(),
                    op.default_timeout().as_secs() / 60
                ))
                .validator(Box::new(DurationValidator))
                .build(),
        );
    }
    builder.build()
}

pub fn resource_block() -> NestedBlock {
    block(&[
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
    ])
}

pub fn data_source_block() -> NestedBlock {
    block(&[Operation::Read])
}

pub struct DurationValidator;

impl Validator for DurationValidator {
    fn description(&self) -> String {
        "value must be a duration such as 30m or 1h30m".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(raw) = request.config_value.value.as_string() {
            if let Err(e) = parse_duration(raw) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for {}", request.path), e.to_string())
                        .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_go_durations() {
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_invalid_durations() {
        assert_eq!(
            parse_duration(""),
            Err(TimeoutParseError::Invalid(String::new()))
        );
        assert!(matches!(
            parse_duration("30"),
            Err(TimeoutParseError::MissingUnit(_))
        ));
        assert!(matches!(
            parse_duration("10d"),
            Err(TimeoutParseError::UnknownUnit { .. })
        ));
        assert!(parse_duration("-5m").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("1..5s").is_err());
    }

    #[test]
    fn defaults_apply_without_block() {
        let timeouts = Timeouts::from_value(&DynamicValue::object()).unwrap();
        assert_eq!(timeouts, Timeouts::default());
        assert_eq!(timeouts.create, Duration::from_secs(30 * 60));
        assert_eq!(timeouts.read, Duration::from_secs(5 * 60));
    }

    #[test]
    fn config_overrides_individual_operations() {
        let mut config = DynamicValue::object();
        let mut block = HashMap::new();
        block.insert("create".to_string(), Dynamic::String("1h".to_string()));
        block.insert("delete".to_string(), Dynamic::Null);
        config
            .set_map(&AttributePath::new(BLOCK_NAME), block)
            .unwrap();

        let timeouts = Timeouts::from_value(&config).unwrap();
        assert_eq!(timeouts.get(Operation::Create), Duration::from_secs(3600));
        assert_eq!(timeouts.get(Operation::Delete), Duration::from_secs(30 * 60));
    }

    #[tokio::test]
    async fn operation_context_carries_deadline() {
        let mut config = DynamicValue::object();
        let mut block = HashMap::new();
        block.insert("read".to_string(), Dynamic::String("2s".to_string()));
        config
            .set_map(&AttributePath::new(BLOCK_NAME), block)
            .unwrap();

        let ctx = operation_context(&Context::new(), &config, Operation::Read).unwrap();
        let remaining = ctx.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(2));
        assert!(remaining > Duration::from_secs(1));
    }

    #[tokio::test]
    async fn invalid_timeout_is_a_diagnostic() {
        let mut config = DynamicValue::object();
        let mut block = HashMap::new();
        block.insert("update".to_string(), Dynamic::String("soon".to_string()));
        config
            .set_map(&AttributePath::new(BLOCK_NAME), block)
            .unwrap();

        let err = operation_context(&Context::new(), &config, Operation::Update).unwrap_err();
        assert_eq!(err.summary, "Invalid timeout");
    }

    #[test]
    fn block_lists_requested_operations() {
        let block = data_source_block();
        assert_eq!(block.type_name, "timeouts");
        assert_eq!(block.nesting, NestingMode::Single);
        assert_eq!(block.block.attributes.len(), 1);
        assert!(block.block.attribute("read").is_some());
        assert_eq!(resource_block().block.attributes.len(), 4);
    }
}
