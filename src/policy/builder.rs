use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::{
    condition::{allows, field, Clause, Conditions, FieldFilter, Operator},
    policy::{ActionList, Effect},
    validator::{DefaultValidator, Field, PolicyValidator},
    Config, Error, Policy, Result, Value,
};

/// Filter key marking a derived condition: `{"$allows": "read"}`.
const ALLOWS: &str = "$allows";

/// Builds an empty or JSON-defined `Policy` with validated options.
pub struct PolicyBuilder<V = DefaultValidator> {
    name: String,
    validator: V,
    options: Vec<(String, Value)>,
    json: Option<String>,
}

impl PolicyBuilder<DefaultValidator> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            validator: DefaultValidator,
            options: Vec::new(),
            json: None,
        }
    }

    pub fn from_json(json: &str) -> Self {
        Self {
            name: String::new(),
            validator: DefaultValidator,
            options: Vec::new(),
            json: Some(json.into()),
        }
    }
}

impl<V> PolicyBuilder<V>
where
    V: PolicyValidator,
{
    /// Overrides the name given in the JSON definition.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_validator<W>(self, validator: W) -> PolicyBuilder<W>
    where
        W: PolicyValidator,
    {
        PolicyBuilder {
            name: self.name,
            validator,
            options: self.options,
            json: self.json,
        }
    }

    /// Sets a policy option. Options set here override the JSON definition's.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    pub fn with_options<I, K, T>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        self.options.extend(
            options
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        self
    }

    pub fn build(self) -> Result<Policy> {
        let definition: PolicyDefinition20240501 = match &self.json {
            Some(json) => serde_json::from_str(json).map_err(Error::Deserializing)?,
            None => PolicyDefinition20240501::default(),
        };

        let name = if self.name.is_empty() {
            definition.name.unwrap_or_default()
        } else {
            self.name
        };
        let config = Config::from_options(definition.options.into_iter().chain(self.options))?;

        let mut policy = Policy::with_config(name, config);
        for statement in definition.statements {
            policy = process_statement(policy, statement, &self.validator)?;
        }

        tracing::debug!(policy = policy.name(), "Built policy");
        Ok(policy)
    }
}

fn process_statement<V>(
    policy: Policy,
    statement: Statement20240501,
    validator: &V,
) -> Result<Policy>
where
    V: PolicyValidator,
{
    if statement.actions.is_empty() {
        return Err(Error::Validation(format!(
            "statement on `{}` has no actions",
            statement.resource
        )));
    }

    validator.validate(Field::ResourceType, &statement.resource)?;
    for action in &statement.actions {
        validator.validate(Field::Action, action)?;
    }

    let conditions = process_conditions(statement.conditions, validator)?;

    Ok(policy.push(
        statement.effect.into(),
        ActionList::from(statement.actions),
        &statement.resource,
        &conditions,
    ))
}

fn process_conditions<V>(
    definitions: Vec<Condition20240501>,
    validator: &V,
) -> Result<Conditions>
where
    V: PolicyValidator,
{
    definitions
        .into_iter()
        .try_fold(Conditions::new(), |conditions, definition| {
            let (operator, filters) = match definition {
                Condition20240501::Where(filters) => (Operator::Where, filters),
                Condition20240501::WhereNot(filters) => (Operator::WhereNot, filters),
                Condition20240501::OrWhere(filters) => (Operator::OrWhere, filters),
            };
            Ok(conditions.push(operator, process_filters(filters, validator)?))
        })
}

fn process_filters<V>(filters: Map<String, JsonValue>, validator: &V) -> Result<Vec<Clause>>
where
    V: PolicyValidator,
{
    // a derived marker stands for the whole filter map.
    if let Some(action) = filters.get(ALLOWS) {
        return match action {
            JsonValue::String(action) if filters.len() == 1 => {
                validator.validate(Field::Action, action)?;
                Ok(vec![allows(action.as_str())])
            }
            _ => Err(Error::Validation(format!(
                "`{}` takes a single action name and no sibling filters",
                ALLOWS
            ))),
        };
    }

    filters
        .into_iter()
        .map(|(name, value)| {
            validator.validate(Field::FieldName, &name)?;
            Ok(field(name, process_filter(value, validator)?))
        })
        .collect()
}

fn process_filter<V>(value: JsonValue, validator: &V) -> Result<FieldFilter>
where
    V: PolicyValidator,
{
    match value {
        JsonValue::Object(nested) => Ok(FieldFilter::Nested(process_filters(nested, validator)?)),
        JsonValue::Array(items) => {
            let definitions: Vec<Condition20240501> =
                serde_json::from_value(JsonValue::Array(items)).map_err(Error::Deserializing)?;
            Ok(FieldFilter::Conditions(process_conditions(
                definitions,
                validator,
            )?))
        }
        JsonValue::Number(number) if number.is_u64() && number.as_i64().is_none() => Err(
            Error::Validation(format!("integer {} is out of range", number)),
        ),
        scalar => serde_json::from_value::<Value>(scalar)
            .map(FieldFilter::Value)
            .map_err(Error::Deserializing),
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PolicyDefinition20240501 {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    options: BTreeMap<String, Value>,
    #[serde(default)]
    statements: Vec<Statement20240501>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statement20240501 {
    effect: Effect20240501,
    actions: Vec<String>,
    resource: String,
    #[serde(default)]
    conditions: Vec<Condition20240501>,
}

#[derive(Deserialize, Copy, Clone)]
#[serde(rename_all = "camelCase")]
enum Effect20240501 {
    Allow,
    Deny,
}

impl From<Effect20240501> for Effect {
    fn from(effect: Effect20240501) -> Self {
        match effect {
            Effect20240501::Allow => Effect::Allow,
            Effect20240501::Deny => Effect::Deny,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum Condition20240501 {
    Where(Map<String, JsonValue>),
    WhereNot(Map<String, JsonValue>),
    OrWhere(Map<String, JsonValue>),
}
