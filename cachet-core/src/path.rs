//! Include path selectors.
//!
//! An [`IncludePath<T>`] names a navigation property of entity `T` that a
//! caller wants resolved and attached to a read result. Selectors are small
//! expression trees so two independently built selectors can be compared by
//! the path they denote rather than by identity.
//!
//! The grammar is fixed at two levels, `Identifier ('.' Identifier)?`:
//!
//! ```text
//! x => x.policies                                  "policies"
//! x => x.policies.select(p => p.policy_versions)   "policies.policy_versions"
//! ```

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::PathError;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex should compile")
});

/// Shape of a path selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// The selector's own parameter, `x => x`. Does not name a property.
    Parameter,
    /// Member access on the parameter, `x => x.name`.
    Member(Cow<'static, str>),
    /// Projection through a collection member into a per-element selector.
    /// Well-formed projections carry exactly two member operands.
    Projection(Vec<Selector>),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Parameter => f.write_str("x"),
            Selector::Member(name) => write!(f, "x.{}", name),
            Selector::Projection(operands) => {
                f.write_str("select(")?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", operand)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A typed include path selector over entity `T`.
pub struct IncludePath<T> {
    selector: Selector,
    _entity: PhantomData<fn(&T)>,
}

impl<T> IncludePath<T> {
    /// Wrap a raw selector. The shape is validated lazily, on first use.
    pub fn from_selector(selector: Selector) -> Self {
        Self {
            selector,
            _entity: PhantomData,
        }
    }

    /// Select a direct property of `T`.
    pub fn member(name: impl Into<Cow<'static, str>>) -> Self {
        Self::from_selector(Selector::Member(name.into()))
    }

    /// Select `element` on each item of the collection property `collection`.
    pub fn through<U>(collection: impl Into<Cow<'static, str>>, element: IncludePath<U>) -> Self {
        Self::from_selector(Selector::Projection(vec![
            Selector::Member(collection.into()),
            element.selector,
        ]))
    }

    /// Parse a dotted path such as `policies.policy_versions`.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        let segments: Vec<&str> = text.split('.').collect();
        if let Some(bad) = segments.iter().find(|s| !IDENTIFIER.is_match(s)) {
            return Err(PathError::InvalidSelector {
                selector: text.to_string(),
                reason: format!("'{}' is not an identifier", bad),
            });
        }
        match segments.as_slice() {
            [member] => Ok(Self::member(member.to_string())),
            [collection, element] => Ok(Self::through(
                collection.to_string(),
                IncludePath::<()>::member(element.to_string()),
            )),
            _ => Err(PathError::InvalidSelector {
                selector: text.to_string(),
                reason: "paths are limited to two levels".to_string(),
            }),
        }
    }

    /// The underlying selector.
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// The dotted path this selector denotes.
    pub fn path_string(&self) -> Result<String, PathError> {
        resolve(&self.selector)
    }

    /// True if `other` is this selector or denotes the same path.
    pub fn path_equals(&self, other: Option<&IncludePath<T>>) -> Result<bool, PathError> {
        let Some(other) = other else {
            return Ok(false);
        };
        if std::ptr::eq(self, other) {
            return Ok(true);
        }
        Ok(self.path_string()? == other.path_string()?)
    }

    /// True if `other`'s path is this path or a leading segment of it.
    pub fn path_starts_with(&self, other: Option<&IncludePath<T>>) -> Result<bool, PathError> {
        let Some(other) = other else {
            return Ok(false);
        };
        if std::ptr::eq(self, other) {
            return Ok(true);
        }
        let value = self.path_string()?;
        let prefix = other.path_string()?;
        Ok(value == prefix
            || (value.starts_with(&prefix) && value[prefix.len()..].starts_with('.')))
    }
}

/// True if any of `paths` denotes the same path as `target`.
pub fn any_path_equals<T>(paths: &[IncludePath<T>], target: &IncludePath<T>) -> Result<bool, PathError> {
    for path in paths {
        if path.path_equals(Some(target))? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn resolve(selector: &Selector) -> Result<String, PathError> {
    match selector {
        Selector::Member(_) => member_name(selector, selector),
        Selector::Projection(operands) => match operands.as_slice() {
            [collection, element] => Ok(format!(
                "{}.{}",
                member_name(selector, collection)?,
                member_name(selector, element)?
            )),
            _ => Err(invalid(
                selector,
                format!("a projection takes two operands, found {}", operands.len()),
            )),
        },
        Selector::Parameter => Err(invalid(selector, "the selector does not name a property")),
    }
}

fn member_name(root: &Selector, operand: &Selector) -> Result<String, PathError> {
    match operand {
        Selector::Member(name) if IDENTIFIER.is_match(name) => Ok(name.to_string()),
        Selector::Member(name) => Err(invalid(root, format!("'{}' is not an identifier", name))),
        Selector::Projection(_) => Err(invalid(root, "paths are limited to two levels")),
        Selector::Parameter => Err(invalid(root, "the selector does not name a property")),
    }
}

fn invalid(selector: &Selector, reason: impl Into<String>) -> PathError {
    PathError::InvalidSelector {
        selector: selector.to_string(),
        reason: reason.into(),
    }
}

impl<T> Clone for IncludePath<T> {
    fn clone(&self) -> Self {
        Self::from_selector(self.selector.clone())
    }
}

impl<T> PartialEq for IncludePath<T> {
    fn eq(&self, other: &Self) -> bool {
        self.selector == other.selector
    }
}

impl<T> Eq for IncludePath<T> {}

impl<T> fmt::Debug for IncludePath<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IncludePath").field(&self.selector).finish()
    }
}

impl<T> fmt::Display for IncludePath<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path_string() {
            Ok(path) => f.write_str(&path),
            Err(_) => write!(f, "{}", self.selector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Client, Policy};

    #[test]
    fn test_member_path_string() {
        let path = Client::include_policies();
        assert_eq!(path.path_string().unwrap(), "policies");
    }

    #[test]
    fn test_projection_path_string() {
        let path = Client::include_policy_versions();
        assert_eq!(path.path_string().unwrap(), "policies.policy_versions");
    }

    #[test]
    fn test_path_equals_distinct_instances() {
        let a = Client::include_policies();
        let b = Client::include_policies();
        assert!(a.path_equals(Some(&b)).unwrap());
    }

    #[test]
    fn test_path_equals_same_instance() {
        let a = IncludePath::<Client>::from_selector(Selector::Parameter);
        // Same instance short-circuits before the selector is resolved.
        assert!(a.path_equals(Some(&a)).unwrap());
    }

    #[test]
    fn test_path_equals_different_members() {
        let policies = Client::include_policies();
        let name = IncludePath::<Client>::member("name");
        assert!(!policies.path_equals(Some(&name)).unwrap());
    }

    #[test]
    fn test_path_equals_absent_is_false() {
        let policies = Client::include_policies();
        assert!(!policies.path_equals(None).unwrap());
        assert!(!policies.path_starts_with(None).unwrap());
    }

    #[test]
    fn test_path_starts_with_prefix_segment() {
        let nested = Client::include_policy_versions();
        let policies = Client::include_policies();
        assert!(nested.path_starts_with(Some(&policies)).unwrap());
        assert!(policies.path_starts_with(Some(&policies.clone())).unwrap());
        assert!(!policies.path_starts_with(Some(&nested)).unwrap());
    }

    #[test]
    fn test_path_starts_with_requires_segment_boundary() {
        let long = IncludePath::<Client>::member("policies_archive");
        let short = Client::include_policies();
        assert!(!long.path_starts_with(Some(&short)).unwrap());
    }

    #[test]
    fn test_parameter_selector_is_invalid() {
        let path = IncludePath::<Client>::from_selector(Selector::Parameter);
        let err = path.path_string().unwrap_err();
        assert!(matches!(err, PathError::InvalidSelector { .. }));
    }

    #[test]
    fn test_projection_operand_count_is_checked() {
        let path = IncludePath::<Client>::from_selector(Selector::Projection(vec![
            Selector::Member("policies".into()),
        ]));
        assert!(path.path_string().is_err());
    }

    #[test]
    fn test_three_levels_rejected() {
        let deep = IncludePath::<Client>::from_selector(Selector::Projection(vec![
            Selector::Member("policies".into()),
            Selector::Projection(vec![
                Selector::Member("policy_versions".into()),
                Selector::Member("policy_id".into()),
            ]),
        ]));
        let err = deep.path_string().unwrap_err();
        assert!(err.to_string().contains("two levels"));
    }

    #[test]
    fn test_invalid_selector_propagates_from_comparisons() {
        let bad = IncludePath::<Client>::member("not a name");
        let good = Client::include_policies();
        assert!(good.path_equals(Some(&bad)).is_err());
        assert!(bad.path_starts_with(Some(&good)).is_err());
    }

    #[test]
    fn test_parse_roundtrip() {
        let parsed = IncludePath::<Client>::parse("policies.policy_versions").unwrap();
        assert!(parsed
            .path_equals(Some(&Client::include_policy_versions()))
            .unwrap());
        assert_eq!(parsed, Client::include_policy_versions());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(IncludePath::<Client>::parse("").is_err());
        assert!(IncludePath::<Client>::parse("a.b.c").is_err());
        assert!(IncludePath::<Client>::parse("policies.").is_err());
        assert!(IncludePath::<Client>::parse("9lives").is_err());
    }

    #[test]
    fn test_any_path_equals() {
        let paths = vec![Client::include_policies(), Client::include_policy_versions()];
        assert!(any_path_equals(&paths, &Client::include_policy_versions()).unwrap());
        assert!(!any_path_equals(&paths[..1], &Client::include_policy_versions()).unwrap());
    }

    #[test]
    fn test_display_falls_back_to_selector() {
        assert_eq!(Policy::include_policy_versions().to_string(), "policy_versions");
        let bad = IncludePath::<Policy>::from_selector(Selector::Parameter);
        assert_eq!(bad.to_string(), "x");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn identifier() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,12}"
    }

    proptest! {
        /// Independently built selectors with the same members compare equal.
        #[test]
        fn prop_structural_equality(outer in identifier(), inner in identifier()) {
            let a = IncludePath::<()>::through(outer.clone(), IncludePath::<()>::member(inner.clone()));
            let b = IncludePath::<()>::parse(&format!("{}.{}", outer, inner)).unwrap();
            prop_assert!(a.path_equals(Some(&b)).unwrap());
        }

        /// A nested path always starts with its collection member.
        #[test]
        fn prop_nested_starts_with_outer(outer in identifier(), inner in identifier()) {
            let nested = IncludePath::<()>::through(outer.clone(), IncludePath::<()>::member(inner));
            let root = IncludePath::<()>::member(outer);
            prop_assert!(nested.path_starts_with(Some(&root)).unwrap());
            prop_assert!(!nested.path_equals(Some(&root)).unwrap());
        }
    }
}
