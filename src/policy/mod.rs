mod builder;
pub use builder::PolicyBuilder;

use std::collections::{btree_map::Entry, BTreeMap};

use crate::errors::Result;
use crate::{condition::Condition, matcher::Matcher, Config, Conditions, Error, Resource};

/// Maximum number of nested derived-condition evaluations.
pub const MAX_DEPTH: usize = 32;

/// Policy engine. Holds the allow/deny rules of one actor, keyed by resource
/// type and action, and decides requests against resource instances.
///
/// Every builder call consumes the policy and returns the updated one. Built
/// policies are read-only and can be shared across threads.
#[derive(Debug, Clone)]
pub struct Policy {
    name: String,
    config: Config,
    rules: BTreeMap<String, Actions>,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, Config::default())
    }

    pub fn with_config(name: impl Into<String>, config: Config) -> Self {
        Self {
            name: name.into(),
            config,
            rules: BTreeMap::new(),
        }
    }

    /// Name of the policy module that built this policy.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Adds an allow condition for each of `actions` on `resource_type`.
    pub fn allow(
        self,
        actions: impl Into<ActionList>,
        resource_type: &str,
        conditions: impl Into<Conditions>,
    ) -> Self {
        self.push(Effect::Allow, actions.into(), resource_type, &conditions.into())
    }

    /// Adds a deny condition for each of `actions` on `resource_type`.
    pub fn deny(
        self,
        actions: impl Into<ActionList>,
        resource_type: &str,
        conditions: impl Into<Conditions>,
    ) -> Self {
        self.push(Effect::Deny, actions.into(), resource_type, &conditions.into())
    }

    fn push(
        mut self,
        effect: Effect,
        actions: ActionList,
        resource_type: &str,
        conditions: &Conditions,
    ) -> Self {
        let rules = self
            .rules
            .entry(resource_type.to_owned())
            .or_insert_with(Actions::new);

        for action in actions.0 {
            let rule = match rules.0.entry(action) {
                Entry::Vacant(item) => {
                    let rule = Rule::new(resource_type, item.key());
                    item.insert(rule)
                }
                Entry::Occupied(item) => item.into_mut(),
            };
            match effect {
                Effect::Allow => rule.allow.push(conditions.build()),
                Effect::Deny => rule.deny.push(conditions.build()),
            }
        }

        self
    }

    /// Returns the rule for `action` on `resource_type`, or an empty rule.
    pub fn rule_for(&self, action: &str, resource_type: &str) -> Rule {
        self.find_rule(action, resource_type)
            .cloned()
            .unwrap_or_else(|| Rule::new(resource_type, action))
    }

    fn find_rule(&self, action: &str, resource_type: &str) -> Option<&Rule> {
        self.rules
            .get(resource_type)
            .and_then(|actions| actions.0.get(action))
    }

    /// Authorizes `action` on `resource`.
    ///
    /// A denial is an ordinary result. Errors are reserved for broken rules
    /// and resources that are missing the data the rules need.
    #[tracing::instrument(
        skip_all,
        fields(resource_type = resource.resource_type(), action = action)
    )]
    pub fn authorize<'r, R>(
        &self,
        resource: &'r R,
        action: &str,
        _options: &AuthorizeOptions,
    ) -> Result<Authorization<'r, R>>
    where
        R: Resource,
    {
        match self.evaluate(resource, action)? {
            Decision::Allowed => Ok(Authorization::Permitted(resource)),
            Decision::Denied => Ok(Authorization::Denied),
        }
    }

    /// Evaluates `action` on `resource` and produces the `Decision`.
    ///
    /// If no rule exists for the resource type and action, the request is denied.
    pub fn evaluate(&self, resource: &dyn Resource, action: &str) -> Result<Decision> {
        let decision = self.decide(resource, action, 0)?;
        tracing::debug!(
            policy = self.name.as_str(),
            resource_type = resource.resource_type(),
            action,
            ?decision,
            "Evaluated request"
        );
        Ok(decision)
    }

    pub(crate) fn decide(
        &self,
        resource: &dyn Resource,
        action: &str,
        depth: usize,
    ) -> Result<Decision> {
        if depth > MAX_DEPTH {
            return Err(Error::DepthLimitExceeded {
                max_depth: MAX_DEPTH,
            });
        }

        let rule = match self.find_rule(action, resource.resource_type()) {
            Some(rule) => rule,
            None => {
                tracing::trace!(
                    resource_type = resource.resource_type(),
                    action,
                    "No rule defined"
                );
                return Ok(Decision::Denied);
            }
        };

        let matcher = Matcher::new(self, depth);

        // an empty allow list never evaluates anything.
        let mut permitted = !rule.allow.is_empty() && matcher.any(&rule.allow, resource)?;

        // any matching deny overrides the allow.
        if permitted && !rule.deny.is_empty() {
            permitted = !matcher.any(&rule.deny, resource)?;
        }

        Ok(permitted.into())
    }

    /// Whether `action` could ever be allowed on the queried resource type.
    ///
    /// Ignores instance-level conditions: true iff at least one allow
    /// condition is registered.
    pub fn any_authorized<Q>(&self, target: &Q, action: &str) -> bool
    where
        Q: Queryable + ?Sized,
    {
        self.find_rule(action, target.queried_type())
            .map_or(false, |rule| !rule.allow.is_empty())
    }
}

/// Anything that names the resource type it queries: a type name, or a query
/// descriptor provided by a query-compilation collaborator.
pub trait Queryable {
    fn queried_type(&self) -> &str;
}

impl Queryable for str {
    fn queried_type(&self) -> &str {
        self
    }
}

impl Queryable for String {
    fn queried_type(&self) -> &str {
        self
    }
}

/// Rules of one resource type, keyed by action.
#[derive(Debug, Clone)]
struct Actions(BTreeMap<String, Rule>);

impl Actions {
    fn new() -> Self {
        Actions(BTreeMap::new())
    }
}

/// The allow and deny conditions of one (resource type, action) pair.
#[derive(Debug, Clone)]
pub struct Rule {
    resource_type: String,
    action: String,
    allow: Vec<Condition>,
    deny: Vec<Condition>,
}

impl Rule {
    pub fn new(resource_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            action: action.into(),
            allow: Vec::new(),
            deny: Vec::new(),
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn allow(&self) -> &[Condition] {
        &self.allow
    }

    pub fn deny(&self) -> &[Condition] {
        &self.deny
    }
}

/// One action or several actions sharing the same conditions.
#[derive(Debug, Clone)]
pub struct ActionList(Vec<String>);

impl From<&str> for ActionList {
    fn from(action: &str) -> Self {
        ActionList(vec![action.to_owned()])
    }
}

impl From<String> for ActionList {
    fn from(action: String) -> Self {
        ActionList(vec![action])
    }
}

impl From<Vec<String>> for ActionList {
    fn from(actions: Vec<String>) -> Self {
        ActionList(actions)
    }
}

impl From<&[&str]> for ActionList {
    fn from(actions: &[&str]) -> Self {
        ActionList(actions.iter().map(|action| (*action).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ActionList {
    fn from(actions: [&str; N]) -> Self {
        ActionList::from(&actions[..])
    }
}

/// Reserved for per-request options.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct AuthorizeOptions {}

#[derive(Debug)]
pub enum Authorization<'r, R> {
    Permitted(&'r R),
    Denied,
}

impl<'r, R> Authorization<'r, R> {
    pub fn is_permitted(&self) -> bool {
        matches!(self, Authorization::Permitted(_))
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl From<bool> for Decision {
    fn from(permitted: bool) -> Self {
        if permitted {
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Effect {
    Allow,
    Deny,
}
