//! Eager-load include descriptors and dotted path resolution.
//!
//! # Responsibility
//! - Let callers name eager-load paths with statically typed navigations.
//! - Lower every navigation into a `NavExpr` tree and resolve it into a
//!   store-agnostic dotted path (`user_roles.role`).
//!
//! # Invariants
//! - Resolution is purely structural: nothing is evaluated.
//! - The root parameter resolves to "no path", which is distinct from failure.
//! - An include that fails to resolve is skipped by the query, never raised.

use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

/// Method name of the "project collection elements then navigate" call.
pub const SELECT_METHOD: &str = "select";

/// Untyped navigation expression tree.
///
/// `Include` builds these through `Nav`, but raw trees are accepted too so
/// callers can describe shapes the typed builder cannot produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavExpr {
    /// The lambda parameter (the entity itself).
    Parameter,
    /// Widening/boxing conversion wrapper.
    Convert(Box<NavExpr>),
    /// Member access `target.name`.
    Member { target: Box<NavExpr>, name: String },
    /// Method call such as `source.select(|e| ...)`.
    Call {
        method: String,
        arguments: Vec<NavExpr>,
    },
    /// Per-element lambda passed to a call.
    Lambda { body: Box<NavExpr> },
    /// Literal value; never part of a valid path.
    Constant(String),
}

impl NavExpr {
    pub fn member(target: NavExpr, name: impl Into<String>) -> Self {
        Self::Member {
            target: Box::new(target),
            name: name.into(),
        }
    }

    pub fn convert(inner: NavExpr) -> Self {
        Self::Convert(Box::new(inner))
    }

    pub fn lambda(body: NavExpr) -> Self {
        Self::Lambda {
            body: Box::new(body),
        }
    }

    pub fn call(method: impl Into<String>, arguments: Vec<NavExpr>) -> Self {
        Self::Call {
            method: method.into(),
            arguments,
        }
    }

    /// `source.select(|e| body)` with `body` rooted at the element parameter.
    pub fn select(source: NavExpr, body: NavExpr) -> Self {
        Self::call(SELECT_METHOD, vec![source, Self::lambda(body)])
    }
}

/// Dotted eager-load path, e.g. `user_roles.role`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludePath(String);

impl IncludePath {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn segments(&self) -> Vec<&str> {
        self.0.split('.').collect()
    }

    /// Returns whether `self` is a strict segment-wise prefix of `other`.
    pub fn is_prefix_of(&self, other: &IncludePath) -> bool {
        let own = self.segments();
        let theirs = other.segments();
        own.len() < theirs.len() && theirs.starts_with(&own)
    }
}

impl Display for IncludePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Navigation shape the resolver cannot turn into a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludePathError {
    pub shape: String,
}

impl IncludePathError {
    fn unsupported(expr: &NavExpr) -> Self {
        let shape = match expr {
            NavExpr::Parameter => "parameter".to_string(),
            NavExpr::Convert(_) => "convert".to_string(),
            NavExpr::Member { name, .. } => format!("member `{name}`"),
            NavExpr::Call { method, arguments } => {
                format!("call `{method}` with {} argument(s)", arguments.len())
            }
            NavExpr::Lambda { .. } => "lambda".to_string(),
            NavExpr::Constant(value) => format!("constant `{value}`"),
        };
        Self { shape }
    }
}

impl Display for IncludePathError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unresolvable include expression: {}", self.shape)
    }
}

impl Error for IncludePathError {}

/// Resolves a navigation tree into a dotted path.
///
/// Returns `Ok(None)` for the bare root parameter and `Err` for any shape that
/// is not a member chain or a two-argument `select` projection.
pub fn resolve_path(expr: &NavExpr) -> Result<Option<String>, IncludePathError> {
    let expr = strip_convert(expr);
    match expr {
        NavExpr::Parameter => Ok(None),
        NavExpr::Member { target, name } => match resolve_path(target)? {
            None => Ok(Some(name.clone())),
            Some(parent) => Ok(Some(format!("{parent}.{name}"))),
        },
        NavExpr::Call { method, arguments } if method == SELECT_METHOD && arguments.len() == 2 => {
            let NavExpr::Lambda { body } = &arguments[1] else {
                return Err(IncludePathError::unsupported(expr));
            };
            let parent = resolve_path(&arguments[0])?;
            let child = resolve_path(body)?;
            match (parent, child) {
                (Some(parent), Some(child)) => Ok(Some(format!("{parent}.{child}"))),
                _ => Err(IncludePathError::unsupported(expr)),
            }
        }
        other => Err(IncludePathError::unsupported(other)),
    }
}

fn strip_convert(mut expr: &NavExpr) -> &NavExpr {
    while let NavExpr::Convert(inner) = expr {
        expr = inner;
    }
    expr
}

/// Statically typed navigation declared on the owning entity.
///
/// `To` is the navigated type: `Vec<E>` for one-to-many relations, the target
/// entity for one-to-one/many-to-one relations.
pub struct Relation<From, To> {
    name: &'static str,
    _marker: PhantomData<fn(&From) -> To>,
}

impl<From, To> Relation<From, To> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<From, To> Clone for Relation<From, To> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<From, To> Copy for Relation<From, To> {}

/// Typed navigation under construction, rooted at `Root` and currently at `Cur`.
pub struct Nav<Root, Cur> {
    expr: NavExpr,
    _marker: PhantomData<fn(&Root) -> Cur>,
}

impl<Root> Nav<Root, Root> {
    pub fn root() -> Self {
        Self::wrap(NavExpr::Parameter)
    }
}

impl<Root, Cur> Nav<Root, Cur> {
    fn wrap(expr: NavExpr) -> Self {
        Self {
            expr,
            _marker: PhantomData,
        }
    }

    /// Navigates one relation from the current type.
    pub fn then<Next>(self, relation: Relation<Cur, Next>) -> Nav<Root, Next> {
        Nav::wrap(NavExpr::member(self.expr, relation.name()))
    }

    pub fn into_expr(self) -> NavExpr {
        self.expr
    }
}

impl<Root, Elem> Nav<Root, Vec<Elem>> {
    /// Projects every element of a collection and keeps navigating from it.
    pub fn select<Next>(
        self,
        project: impl FnOnce(Nav<Elem, Elem>) -> Nav<Elem, Next>,
    ) -> Nav<Root, Vec<Next>> {
        let body = project(Nav::root()).into_expr();
        Nav::wrap(NavExpr::select(self.expr, body))
    }
}

/// Eager-load descriptor for entity `T`.
///
/// ```ignore
/// let include = Include::new(|u| u.then(User::USER_ROLES).select(|ur| ur.then(UserRole::ROLE)));
/// assert_eq!(include.resolve().unwrap().unwrap().as_str(), "user_roles.role");
/// ```
pub struct Include<T> {
    expr: NavExpr,
    _entity: PhantomData<fn(&T)>,
}

impl<T> Include<T> {
    pub fn new<Cur>(navigate: impl FnOnce(Nav<T, T>) -> Nav<T, Cur>) -> Self {
        Self::from_expr(navigate(Nav::root()).into_expr())
    }

    pub fn from_expr(expr: NavExpr) -> Self {
        Self {
            expr,
            _entity: PhantomData,
        }
    }

    pub fn expr(&self) -> &NavExpr {
        &self.expr
    }

    pub fn resolve(&self) -> Result<Option<IncludePath>, IncludePathError> {
        resolve_path(&self.expr).map(|path| path.map(IncludePath))
    }
}

impl<T> Clone for Include<T> {
    fn clone(&self) -> Self {
        Self::from_expr(self.expr.clone())
    }
}

impl<T> std::fmt::Debug for Include<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Include").field("expr", &self.expr).finish()
    }
}

/// Resolves every include of one query into the paths a backend must load.
///
/// Unresolvable and root-only includes are skipped; skipped failures are
/// reported through a `warn` diagnostic. Duplicates collapse and paths that
/// prefix a longer requested path are dropped.
pub fn resolve_includes<T>(entity: &'static str, includes: &[Include<T>]) -> Vec<IncludePath> {
    let mut resolved: Vec<IncludePath> = Vec::new();
    for include in includes {
        match include.resolve() {
            Ok(Some(path)) => {
                if !resolved.contains(&path) {
                    resolved.push(path);
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    "event=include_skipped module=query status=skipped entity={} reason={}",
                    entity, err
                );
            }
        }
    }

    let snapshot = resolved.clone();
    resolved.retain(|path| !snapshot.iter().any(|other| path.is_prefix_of(other)));
    resolved
}

#[cfg(test)]
mod tests {
    use super::{resolve_includes, resolve_path, Include, NavExpr};

    fn member(target: NavExpr, name: &str) -> NavExpr {
        NavExpr::member(target, name)
    }

    #[test]
    fn root_parameter_is_success_without_path() {
        assert_eq!(resolve_path(&NavExpr::Parameter), Ok(None));
        assert_eq!(
            resolve_path(&NavExpr::convert(NavExpr::Parameter)),
            Ok(None)
        );
    }

    #[test]
    fn nested_members_concatenate_with_dots() {
        let expr = member(member(NavExpr::Parameter, "a"), "b");
        assert_eq!(resolve_path(&expr), Ok(Some("a.b".to_string())));
    }

    #[test]
    fn convert_nodes_are_stripped_at_any_depth() {
        let expr = NavExpr::convert(NavExpr::convert(member(
            NavExpr::convert(member(NavExpr::Parameter, "a")),
            "b",
        )));
        assert_eq!(resolve_path(&expr), Ok(Some("a.b".to_string())));
    }

    #[test]
    fn select_with_root_body_fails() {
        let expr = NavExpr::select(member(NavExpr::Parameter, "items"), NavExpr::Parameter);
        assert!(resolve_path(&expr).is_err());
    }

    #[test]
    fn select_on_root_source_fails() {
        let expr = NavExpr::select(NavExpr::Parameter, member(NavExpr::Parameter, "x"));
        assert!(resolve_path(&expr).is_err());
    }

    #[test]
    fn select_without_lambda_argument_fails() {
        let expr = NavExpr::call(
            "select",
            vec![
                member(NavExpr::Parameter, "items"),
                member(NavExpr::Parameter, "x"),
            ],
        );
        assert!(resolve_path(&expr).is_err());
    }

    #[test]
    fn other_calls_and_constants_fail() {
        let filter = NavExpr::call(
            "filter",
            vec![
                member(NavExpr::Parameter, "items"),
                NavExpr::lambda(member(NavExpr::Parameter, "x")),
            ],
        );
        assert!(resolve_path(&filter).is_err());

        let single_arg = NavExpr::call("select", vec![member(NavExpr::Parameter, "items")]);
        assert!(resolve_path(&single_arg).is_err());

        let on_constant = member(NavExpr::Constant("42".to_string()), "x");
        assert!(resolve_path(&on_constant).is_err());
    }

    #[test]
    fn resolve_includes_skips_failures_and_collapses_prefixes() {
        struct Row;
        let includes: Vec<Include<Row>> = vec![
            Include::from_expr(member(NavExpr::Parameter, "a")),
            Include::from_expr(NavExpr::Constant("bad".to_string())),
            Include::from_expr(NavExpr::select(
                member(NavExpr::Parameter, "a"),
                member(NavExpr::Parameter, "b"),
            )),
            Include::from_expr(NavExpr::Parameter),
            Include::from_expr(member(NavExpr::Parameter, "c")),
            Include::from_expr(member(NavExpr::Parameter, "c")),
        ];

        let paths = resolve_includes("Row", &includes);
        let rendered: Vec<&str> = paths.iter().map(|path| path.as_str()).collect();
        assert_eq!(rendered, vec!["a.b", "c"]);
    }
}
