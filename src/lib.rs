#![deny(rust_2018_idioms)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cognitive_complexity,
    clippy::large_enum_variant,
    clippy::similar_names,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::match_same_arms,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]
//! Declarative, condition-based authorization.
//!
//! A [`Policy`] maps each (resource type, action) pair to a [`Rule`]: an
//! ordered list of allow conditions and an ordered list of deny conditions.
//! A request is allowed if any allow condition matches the resource and no
//! deny condition does.
//!
//! ```
//! use allow_where::{allows, field, Conditions, Decision, Policy, Record};
//!
//! let policy = Policy::new("Blog.Policy")
//!     .allow("read", "Post", vec![field("archived", false)])
//!     .allow("read", "Comment", vec![field("post", allows("read"))])
//!     .allow(
//!         "edit",
//!         "Comment",
//!         Conditions::new()
//!             .and_where(vec![field("flagged_for_review", true)])
//!             .where_not(vec![field("user", [field("role", "admin")])])
//!             .or_where(vec![field("user_id", 5)]),
//!     );
//!
//! let comment = Record::new("Comment")
//!     .with_field("user_id", 5)
//!     .with_field("flagged_for_review", false)
//!     .with_association("post", Record::new("Post").with_field("archived", false))
//!     .with_association("user", Record::new("User").with_field("role", "member"));
//!
//! assert_eq!(Decision::Allowed, policy.evaluate(&comment, "read").unwrap());
//! assert_eq!(Decision::Allowed, policy.evaluate(&comment, "edit").unwrap());
//! assert_eq!(Decision::Denied, policy.evaluate(&comment, "delete").unwrap());
//! ```
mod condition;
mod config;
mod errors;
mod matcher;
mod module;
mod policy;
mod resource;
mod validator;
mod value;

pub use condition::{
    allows, field, Clause, Condition, Conditions, FieldFilter, Mode, Operator, Outcome, Predicate,
};
pub use config::Config;
pub use errors::{Error, Result};
pub use module::{policy_for, PolicyModule};
pub use policy::{
    ActionList, Authorization, AuthorizeOptions, Decision, Policy, PolicyBuilder, Queryable, Rule,
    MAX_DEPTH,
};
pub use resource::{Association, Record, Related, Resource};
pub use validator::{DefaultValidator, Field, PolicyValidator};
pub use value::Value;
