use crate::{
    condition::{Clause, Condition, Mode, Outcome},
    policy::Decision,
    resource::Related,
    Error, Policy, Resource, Result,
};

/// Matches conditions against a resource instance in boolean mode.
///
/// Derived clauses evaluate other decisions of the same policy at `depth + 1`.
pub(crate) struct Matcher<'p> {
    policy: &'p Policy,
    depth: usize,
}

impl<'p> Matcher<'p> {
    pub(crate) fn new(policy: &'p Policy, depth: usize) -> Self {
        Self { policy, depth }
    }

    /// True if any of `conditions` matches. Stops at the first match.
    pub(crate) fn any(&self, conditions: &[Condition], resource: &dyn Resource) -> Result<bool> {
        for condition in conditions {
            if self.matches(condition, resource)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn matches(&self, condition: &Condition, resource: &dyn Resource) -> Result<bool> {
        match condition {
            Condition::Assert(clause) => self.clause_matches(clause, resource),
            Condition::Not(inner) => Ok(!self.matches(inner, resource)?),
            Condition::All(members) => {
                for member in members {
                    if !self.matches(member, resource)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any(members) => self.any(members, resource),
        }
    }

    fn clause_matches(&self, clause: &Clause, resource: &dyn Resource) -> Result<bool> {
        match clause {
            Clause::Equals { field, value } => match resource.field(field) {
                Some(actual) => Ok(actual == *value),
                // equality on a relation only tests for nil.
                None => match resource.relation(field) {
                    Some(Related::NotLoaded) => Err(not_loaded(resource, field)),
                    Some(Related::Nil) => Ok(value.is_null()),
                    Some(_) if value.is_null() => Ok(false),
                    Some(_) => Err(Error::NotAnAttribute {
                        resource_type: resource.resource_type().to_owned(),
                        field: field.clone(),
                    }),
                    None => Err(unknown_field(resource, field)),
                },
            },
            Clause::Predicate { field, predicate } => {
                match predicate.call(Mode::Boolean, resource, field) {
                    Outcome::Bool(matched) => Ok(matched),
                    Outcome::Absent => Ok(false),
                    Outcome::Unsupported => Err(Error::UnsupportedPredicateMode {
                        field: field.clone(),
                        mode: Mode::Boolean,
                    }),
                }
            }
            Clause::Relation { field, condition } => match resource.relation(field) {
                Some(Related::One(related)) => self.matches(condition, related),
                Some(Related::Many(related)) => {
                    for item in related {
                        if self.matches(condition, item)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Some(Related::Nil) => Ok(false),
                Some(Related::NotLoaded) => Err(not_loaded(resource, field)),
                None if resource.field(field).is_some() => Err(Error::NotARelation {
                    resource_type: resource.resource_type().to_owned(),
                    field: field.clone(),
                }),
                None => Err(unknown_field(resource, field)),
            },
            Clause::Derived { action } => {
                tracing::trace!(
                    resource_type = resource.resource_type(),
                    action = action.as_str(),
                    depth = self.depth + 1,
                    "Evaluating derived condition"
                );
                let decision = self.policy.decide(resource, action, self.depth + 1)?;
                Ok(decision == Decision::Allowed)
            }
        }
    }
}

fn unknown_field(resource: &dyn Resource, field: &str) -> Error {
    Error::UnknownField {
        resource_type: resource.resource_type().to_owned(),
        field: field.to_owned(),
    }
}

fn not_loaded(resource: &dyn Resource, field: &str) -> Error {
    Error::RelationNotLoaded {
        resource_type: resource.resource_type().to_owned(),
        field: field.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{condition::Predicate, field, Conditions, Record, Value};
    use assert_matches::assert_matches;
    use test_case::test_case;

    fn matches(conditions: Conditions, resource: &Record) -> Result<bool> {
        let policy = Policy::new("test");
        Matcher::new(&policy, 0).matches(&conditions.build(), resource)
    }

    fn post(user_id: i64) -> Record {
        Record::new("Post")
            .with_field("user_id", user_id)
            .with_field("archived", false)
            .with_field("deleted_at", None::<String>)
    }

    #[test_case(1, true ; "equal value matches")]
    #[test_case(2, false ; "different value does not match")]
    fn field_equality(user_id: i64, expected: bool) {
        let conditions = Conditions::new().and_where(vec![field("user_id", 1)]);

        assert_matches!(matches(conditions, &post(user_id)), Ok(matched) if matched == expected);
    }

    #[test]
    fn nil_is_an_ordinary_value() {
        let conditions = Conditions::new().and_where(vec![field("deleted_at", Value::Null)]);

        assert_matches!(matches(conditions, &post(1)), Ok(true));
    }

    #[test]
    fn equality_does_not_coerce() {
        let conditions = Conditions::new().and_where(vec![field("user_id", 1.0)]);

        assert_matches!(matches(conditions, &post(1)), Ok(false));
    }

    #[test]
    fn negated_clause() {
        let conditions = Conditions::new().where_not(vec![field("archived", true)]);

        assert_matches!(matches(conditions, &post(1)), Ok(true));
    }

    #[test]
    fn where_not_is_the_complement_of_where() {
        let record = Record::new("Post").with_field("a", 1).with_field("b", 3);
        let clauses = || vec![field("a", 1), field("b", 2)];

        assert_matches!(matches(Conditions::new().and_where(clauses()), &record), Ok(false));
        assert_matches!(matches(Conditions::new().where_not(clauses()), &record), Ok(true));
    }

    #[test]
    fn empty_group_matches() {
        assert_matches!(matches(Conditions::new(), &post(1)), Ok(true));
    }

    #[test]
    fn unknown_field_is_an_error() {
        let conditions = Conditions::new().and_where(vec![field("title", "x")]);

        assert_matches!(
            matches(conditions, &post(1)),
            Err(Error::UnknownField { resource_type, field })
                if resource_type == "Post" && field == "title"
        );
    }

    #[test]
    fn relation_on_plain_field_is_an_error() {
        let conditions =
            Conditions::new().and_where(vec![field("user_id", [field("role", "admin")])]);

        assert_matches!(
            matches(conditions, &post(1)),
            Err(Error::NotARelation { .. })
        );
    }

    #[test]
    fn unloaded_relation_is_an_error() {
        let comment = Record::new("Comment").with_unloaded("user");
        let conditions = Conditions::new().and_where(vec![field("user", [field("role", "admin")])]);

        assert_matches!(
            matches(conditions, &comment),
            Err(Error::RelationNotLoaded { field, .. }) if field == "user"
        );
    }

    #[test]
    fn unloaded_relation_under_negation_is_still_an_error() {
        let comment = Record::new("Comment").with_unloaded("user");
        let conditions = Conditions::new().where_not(vec![field("user", [field("role", "admin")])]);

        assert_matches!(
            matches(conditions, &comment),
            Err(Error::RelationNotLoaded { .. })
        );
    }

    #[test]
    fn relation_matches_loaded_resource() {
        let comment = Record::new("Comment")
            .with_association("user", Record::new("User").with_field("role", "admin"));

        let admin = Conditions::new().and_where(vec![field("user", [field("role", "admin")])]);
        let member = Conditions::new().and_where(vec![field("user", [field("role", "member")])]);

        assert_matches!(matches(admin, &comment), Ok(true));
        assert_matches!(matches(member, &comment), Ok(false));
    }

    #[test]
    fn to_many_relation_matches_any_member() {
        let post = Record::new("Post").with_association(
            "comments",
            vec![
                Record::new("Comment").with_field("flagged", false),
                Record::new("Comment").with_field("flagged", true),
            ],
        );
        let empty = Record::new("Post").with_association("comments", Vec::<Record>::new());
        let conditions =
            || Conditions::new().and_where(vec![field("comments", [field("flagged", true)])]);

        assert_matches!(matches(conditions(), &post), Ok(true));
        assert_matches!(matches(conditions(), &empty), Ok(false));
    }

    #[test]
    fn equality_on_loaded_relation_is_an_error() {
        let comment = Record::new("Comment")
            .with_association("user", Record::new("User").with_field("id", 5));

        let by_value = Conditions::new().and_where(vec![field("user", 5)]);
        let is_nil = Conditions::new().and_where(vec![field("user", Value::Null)]);

        assert_matches!(
            matches(by_value, &comment),
            Err(Error::NotAnAttribute { field, .. }) if field == "user"
        );
        assert_matches!(matches(is_nil, &comment), Ok(false));
    }

    #[test]
    fn nil_relation() {
        let post = Record::new("Post").with_association("editor", None::<Record>);

        let nested = Conditions::new().and_where(vec![field("editor", [field("role", "admin")])]);
        let is_nil = Conditions::new().and_where(vec![field("editor", Value::Null)]);

        assert_matches!(matches(nested, &post), Ok(false));
        assert_matches!(matches(is_nil, &post), Ok(true));
    }

    #[test_case(Outcome::Bool(true), true ; "true matches")]
    #[test_case(Outcome::Bool(false), false ; "false does not match")]
    #[test_case(Outcome::Absent, false ; "absent does not match")]
    fn predicate_outcome(outcome: Outcome, expected: bool) {
        let predicate = Predicate::new(move |mode, _resource, _field| {
            assert_eq!(Mode::Boolean, mode);
            outcome
        });
        let conditions = Conditions::new().and_where(vec![field("title", predicate)]);

        assert_matches!(matches(conditions, &post(1)), Ok(matched) if matched == expected);
    }

    #[test]
    fn predicate_receives_resource_and_field() {
        let predicate = Predicate::new(|_mode, resource, field| {
            Outcome::from(resource.field(field).map(|value| value == Value::from(3)))
        });
        let conditions = Conditions::new().and_where(vec![field("user_id", predicate)]);

        assert_matches!(matches(conditions.clone(), &post(3)), Ok(true));
        assert_matches!(matches(conditions, &post(4)), Ok(false));
    }

    #[test]
    fn predicate_without_boolean_mode_is_an_error() {
        let predicate = Predicate::new(|mode, _resource, _field| match mode {
            Mode::Filter => Outcome::Bool(true),
            Mode::Boolean => Outcome::Unsupported,
        });
        let conditions = Conditions::new().and_where(vec![field("title", predicate)]);

        assert_matches!(
            matches(conditions, &post(1)),
            Err(Error::UnsupportedPredicateMode { mode: Mode::Boolean, .. })
        );
    }

    #[test]
    fn all_stops_at_first_mismatch() {
        // the unknown field after the mismatch is never looked up.
        let conditions = Conditions::new().and_where(vec![field("user_id", 9), field("nope", 1)]);

        assert_matches!(matches(conditions, &post(1)), Ok(false));
    }
}
