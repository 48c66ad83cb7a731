use std::{fmt, mem, sync::Arc};

use crate::{Resource, Value};

/// Evaluation mode passed to predicate callbacks.
///
/// The rule engine itself only ever asks for `Boolean`. `Filter` is the mode
/// used by query-compilation collaborators that turn conditions into
/// storage-level filters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Boolean,
    Filter,
}

/// Result of invoking a predicate callback.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Bool(bool),
    /// The predicate produced no value. Treated as no match.
    Absent,
    /// The predicate cannot handle the requested mode.
    Unsupported,
}

impl From<bool> for Outcome {
    fn from(value: bool) -> Self {
        Outcome::Bool(value)
    }
}

impl From<Option<bool>> for Outcome {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Outcome::Absent, Outcome::Bool)
    }
}

type PredicateFn = dyn Fn(Mode, &dyn Resource, &str) -> Outcome + Send + Sync;

/// A custom field predicate, called with `(mode, resource, field)`.
#[derive(Clone)]
pub struct Predicate(Arc<PredicateFn>);

impl Predicate {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(Mode, &dyn Resource, &str) -> Outcome + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn call(&self, mode: Mode, resource: &dyn Resource, field: &str) -> Outcome {
        (self.0)(mode, resource, field)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// The smallest matchable unit of a condition.
#[derive(Debug, Clone)]
pub enum Clause {
    /// Field equals a value.
    Equals { field: String, value: Value },
    /// Custom callback decides.
    Predicate { field: String, predicate: Predicate },
    /// Nested condition holds for the resource(s) reached through `field`.
    Relation {
        field: String,
        condition: Box<Condition>,
    },
    /// The same resource is allowed to perform `action` under the same policy.
    Derived { action: String },
}

/// Boolean expression over clauses.
#[derive(Debug, Clone)]
pub enum Condition {
    Assert(Clause),
    /// The inner condition does not hold.
    Not(Box<Condition>),
    /// Every member holds. Empty holds vacuously.
    All(Vec<Condition>),
    /// At least one member holds.
    Any(Vec<Condition>),
}

/// Right-hand side of a field clause.
#[derive(Debug, Clone)]
pub enum FieldFilter {
    Value(Value),
    Predicate(Predicate),
    /// Every clause holds for the related resource.
    Nested(Vec<Clause>),
    /// A full condition holds for the related resource.
    Conditions(Conditions),
}

macro_rules! value_filter {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldFilter {
                fn from(value: $ty) -> Self {
                    FieldFilter::Value(value.into())
                }
            }
        )*
    };
}

value_filter!(Value, bool, i32, i64, u32, f64, &str, String);

impl From<Predicate> for FieldFilter {
    fn from(predicate: Predicate) -> Self {
        FieldFilter::Predicate(predicate)
    }
}

impl From<Clause> for FieldFilter {
    fn from(clause: Clause) -> Self {
        FieldFilter::Nested(vec![clause])
    }
}

impl From<Vec<Clause>> for FieldFilter {
    fn from(clauses: Vec<Clause>) -> Self {
        FieldFilter::Nested(clauses)
    }
}

impl<const N: usize> From<[Clause; N]> for FieldFilter {
    fn from(clauses: [Clause; N]) -> Self {
        FieldFilter::Nested(Vec::from(clauses))
    }
}

impl From<Conditions> for FieldFilter {
    fn from(conditions: Conditions) -> Self {
        FieldFilter::Conditions(conditions)
    }
}

/// Builds a clause on `name`.
///
/// A scalar compares for equality, a predicate is called back, and anything
/// else (nested clauses, conditions, [`allows`]) is evaluated against the
/// resource(s) reached through the relation `name`.
pub fn field(name: impl Into<String>, filter: impl Into<FieldFilter>) -> Clause {
    let field = name.into();
    match filter.into() {
        FieldFilter::Value(value) => Clause::Equals { field, value },
        FieldFilter::Predicate(predicate) => Clause::Predicate { field, predicate },
        FieldFilter::Nested(clauses) => Clause::Relation {
            field,
            condition: Box::new(Condition::All(
                clauses.into_iter().map(Condition::Assert).collect(),
            )),
        },
        FieldFilter::Conditions(conditions) => Clause::Relation {
            field,
            condition: Box::new(conditions.build()),
        },
    }
}

/// Defers to the decision for `action`.
///
/// On its own it refers to the resource under evaluation; passed as the
/// filter of a relation [`field`] it refers to the related resource.
pub fn allows(action: impl Into<String>) -> Clause {
    Clause::Derived {
        action: action.into(),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operator {
    Where,
    WhereNot,
    OrWhere,
}

/// Ordered `where` / `where_not` / `or_where` options of one allow or deny
/// statement.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    operations: Vec<(Operator, Vec<Clause>)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and_where<I>(self, clauses: I) -> Self
    where
        I: IntoIterator<Item = Clause>,
    {
        self.push(Operator::Where, clauses)
    }

    pub fn where_not<I>(self, clauses: I) -> Self
    where
        I: IntoIterator<Item = Clause>,
    {
        self.push(Operator::WhereNot, clauses)
    }

    pub fn or_where<I>(self, clauses: I) -> Self
    where
        I: IntoIterator<Item = Clause>,
    {
        self.push(Operator::OrWhere, clauses)
    }

    pub fn push<I>(mut self, operator: Operator, clauses: I) -> Self
    where
        I: IntoIterator<Item = Clause>,
    {
        self.operations.push((operator, clauses.into_iter().collect()));
        self
    }

    /// Folds the options, left to right, into a single condition.
    ///
    /// `where` extends the current AND-group. `or_where` closes the current
    /// group as an OR-branch and opens a new one seeded with its clauses.
    /// `where_not` right after an `or_where` extends the group just opened;
    /// anywhere else past a split it ANDs with the whole disjunction so far.
    pub fn build(&self) -> Condition {
        let mut branches: Vec<Condition> = Vec::new();
        let mut group: Vec<Condition> = Vec::new();
        let mut after_split = false;

        for (operator, clauses) in &self.operations {
            match operator {
                Operator::Where => {
                    group.extend(clauses.iter().cloned().map(Condition::Assert));
                }
                Operator::OrWhere => {
                    // a leading or_where has nothing to close.
                    if !group.is_empty() {
                        branches.push(Condition::All(mem::take(&mut group)));
                    }
                    group.extend(clauses.iter().cloned().map(Condition::Assert));
                }
                Operator::WhereNot => {
                    if !branches.is_empty() && !after_split {
                        branches.push(Condition::All(mem::take(&mut group)));
                        group.push(Condition::Any(mem::take(&mut branches)));
                    }
                    if let Some(negated) = negate(clauses) {
                        group.push(negated);
                    }
                }
            }
            after_split = *operator == Operator::OrWhere;
        }

        if branches.is_empty() {
            Condition::All(group)
        } else {
            branches.push(Condition::All(group));
            Condition::Any(branches)
        }
    }
}

/// `NOT (a AND b ..)`, the complement of `where` over the same clauses.
fn negate(clauses: &[Clause]) -> Option<Condition> {
    let inner = match clauses {
        [] => return None,
        [clause] => Condition::Assert(clause.clone()),
        _ => Condition::All(clauses.iter().cloned().map(Condition::Assert).collect()),
    };
    Some(Condition::Not(Box::new(inner)))
}

impl From<Vec<Clause>> for Conditions {
    fn from(clauses: Vec<Clause>) -> Self {
        Conditions::new().and_where(clauses)
    }
}

impl From<Clause> for Conditions {
    fn from(clause: Clause) -> Self {
        Conditions::new().and_where(vec![clause])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn shape(condition: &Condition) -> String {
        match condition {
            Condition::Assert(clause) => clause_shape(clause),
            Condition::Not(inner) => format!("!{}", shape(inner)),
            Condition::All(members) => format!(
                "all({})",
                members.iter().map(shape).collect::<Vec<_>>().join(", ")
            ),
            Condition::Any(members) => format!(
                "any({})",
                members.iter().map(shape).collect::<Vec<_>>().join(", ")
            ),
        }
    }

    fn clause_shape(clause: &Clause) -> String {
        match clause {
            Clause::Equals { field, value } => format!("{}={}", field, value),
            Clause::Predicate { field, .. } => format!("{}?", field),
            Clause::Relation { field, condition } => format!("{}.{}", field, shape(condition)),
            Clause::Derived { action } => format!("allows({})", action),
        }
    }

    #[test]
    fn where_clauses_form_one_group() {
        let condition = Conditions::new()
            .and_where(vec![field("a", 1), field("b", 2)])
            .and_where(vec![field("c", 3)])
            .build();

        assert_eq!("all(a=1, b=2, c=3)", shape(&condition));
    }

    #[test]
    fn where_not_before_split_joins_first_branch() {
        let condition = Conditions::new()
            .and_where(vec![field("flagged_for_review", true)])
            .where_not(vec![field("user", [field("role", "admin")])])
            .or_where(vec![field("user_id", 5)])
            .build();

        assert_eq!(
            "any(all(flagged_for_review=true, !user.all(role=\"admin\")), all(user_id=5))",
            shape(&condition)
        );
    }

    #[test]
    fn where_not_right_after_split_joins_new_branch() {
        let condition = Conditions::new()
            .and_where(vec![field("a", 1)])
            .or_where(vec![field("b", 2)])
            .where_not(vec![field("c", 3)])
            .build();

        assert_eq!("any(all(a=1), all(b=2, !c=3))", shape(&condition));
    }

    #[test]
    fn where_not_later_after_split_binds_whole_disjunction() {
        let condition = Conditions::new()
            .and_where(vec![field("a", 1)])
            .or_where(vec![field("b", 2)])
            .and_where(vec![field("d", 4)])
            .where_not(vec![field("c", 3)])
            .build();

        assert_eq!("all(any(all(a=1), all(b=2, d=4)), !c=3)", shape(&condition));
    }

    #[test]
    fn where_not_negates_its_clauses_as_a_group() {
        let condition = Conditions::new()
            .and_where(vec![field("a", 1)])
            .where_not(vec![field("b", 2), field("c", 3)])
            .where_not(Vec::new())
            .build();

        assert_eq!("all(a=1, !all(b=2, c=3))", shape(&condition));
    }

    #[test]
    fn leading_or_where_opens_first_branch() {
        let condition = Conditions::new().or_where(vec![field("a", 1)]).build();

        assert_eq!("all(a=1)", shape(&condition));
    }

    #[test]
    fn no_options_is_empty_group() {
        assert_matches!(Conditions::new().build(), Condition::All(members) if members.is_empty());
    }

    #[test]
    fn allows_under_relation_targets_related_resource() {
        assert_eq!(
            "post.all(allows(read))",
            clause_shape(&field("post", allows("read")))
        );
        assert_eq!("allows(read)", clause_shape(&allows("read")));
    }

    #[test]
    fn nested_conditions_keep_their_own_grouping() {
        let clause = field(
            "user",
            Conditions::new()
                .and_where(vec![field("role", "admin")])
                .or_where(vec![field("id", 1)]),
        );

        assert_eq!(
            "user.any(all(role=\"admin\"), all(id=1))",
            clause_shape(&clause)
        );
    }

    #[test]
    fn predicate_outcome_from_optional_bool() {
        assert_eq!(Outcome::Absent, Outcome::from(None));
        assert_eq!(Outcome::Bool(true), Outcome::from(Some(true)));
    }
}
