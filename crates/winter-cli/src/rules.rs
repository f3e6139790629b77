//! Rule and dictionary files.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use winter_core::{
    ConfigurationError, Constraint, EnumConstraintSpec, ObjectValidator, StaticDictProvider,
    ValidationEngine,
};

/// Constraints for one object shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleSet {
    /// Object-level expressions.
    #[serde(default)]
    pub expressions: Vec<ExpressionRule>,
    #[serde(default)]
    pub fields: IndexMap<String, Vec<FieldRule>>,
    /// Rules for object or list-of-object fields.
    #[serde(default)]
    pub nested: IndexMap<String, RuleSet>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExpressionRule {
    pub expression: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnumRule {
    #[serde(default)]
    pub dict_type: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub allow_null: bool,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRule {
    Enum(EnumRule),
    Expression(ExpressionRule),
}

impl RuleSet {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
        Self::from_json_str(&read(path)?)
    }

    /// Compile every rule into a validator. The first bad rule aborts.
    pub fn build(&self, engine: &ValidationEngine) -> Result<ObjectValidator, ConfigurationError> {
        let mut validator = ObjectValidator::new();

        for rule in &self.expressions {
            let spec = expression_spec(engine, rule)?
                .with_target(winter_core::ExpressionTarget::Object);
            validator = validator.with_object_constraint(engine.expression_constraint(spec));
        }

        for (field, rules) in &self.fields {
            for rule in rules {
                let constraint: Constraint = match rule {
                    FieldRule::Enum(rule) => engine.enum_constraint(rule.to_spec())?.into(),
                    FieldRule::Expression(rule) => engine
                        .expression_constraint(expression_spec(engine, rule)?)
                        .into(),
                };
                validator = validator.with_field(field.clone(), constraint);
            }
        }

        for (field, rules) in &self.nested {
            validator = validator.with_nested(field.clone(), rules.build(engine)?);
        }

        Ok(validator)
    }
}

impl EnumRule {
    fn to_spec(&self) -> EnumConstraintSpec {
        let mut spec = EnumConstraintSpec::new(self.dict_type.clone())
            .with_values(self.values.iter().cloned())
            .allow_null(self.allow_null)
            .ignore_case(self.ignore_case)
            .reverse(self.reverse);
        if let Some(message) = &self.message {
            spec = spec.with_message(message.clone());
        }
        spec
    }
}

fn expression_spec(
    engine: &ValidationEngine,
    rule: &ExpressionRule,
) -> Result<winter_core::ExpressionConstraintSpec, ConfigurationError> {
    let mut spec = engine.expression(&rule.expression)?;
    if let Some(description) = &rule.description {
        spec = spec.with_description(description.clone());
    }
    if let Some(message) = &rule.message {
        spec = spec.with_message(message.clone());
    }
    Ok(spec)
}

/// A dictionary is either `{"KEY": "label"}` or a plain list of values.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DictEntries {
    Labeled(IndexMap<String, String>),
    Values(Vec<String>),
}

/// Load a dictionary file into an in-memory provider.
pub fn load_dicts(path: &Path) -> Result<Arc<StaticDictProvider>, ConfigurationError> {
    parse_dicts(&read(path)?).map(Arc::new)
}

fn parse_dicts(json: &str) -> Result<StaticDictProvider, ConfigurationError> {
    let dicts: IndexMap<String, DictEntries> = serde_json::from_str(json)?;
    let mut provider = StaticDictProvider::new().with_name("dict-file");
    for (dict_type, entries) in dicts {
        match entries {
            DictEntries::Labeled(map) => provider.insert_dict(dict_type, map),
            DictEntries::Values(values) => {
                provider.insert_dict(dict_type, values.into_iter().map(|v| (v.clone(), v)))
            }
        }
    }
    Ok(provider)
}

fn read(path: &Path) -> Result<String, ConfigurationError> {
    std::fs::read_to_string(path).map_err(|error| ConfigurationError::Io {
        path: path.to_path_buf(),
        error,
    })
}
