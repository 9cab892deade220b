use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::errors::ParseError;
use crate::options::Options;

/// One step of the path from the root of the input to the value at hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteItem {
    Key(String),
    Index(usize),
}

impl From<&str> for RouteItem {
    fn from(key: &str) -> Self {
        RouteItem::Key(key.to_string())
    }
}

impl From<String> for RouteItem {
    fn from(key: String) -> Self {
        RouteItem::Key(key)
    }
}

impl From<usize> for RouteItem {
    fn from(index: usize) -> Self {
        RouteItem::Index(index)
    }
}

/// Location of a value inside the input, rendered as `$.items[2].name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route(Vec<RouteItem>);

impl Route {
    pub fn items(&self) -> &[RouteItem] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, item: RouteItem) -> Route {
        let mut items = self.0.clone();
        items.push(item);
        Route(items)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for item in &self.0 {
            match item {
                RouteItem::Key(k) => write!(f, ".{k}")?,
                RouteItem::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

/// A non-fatal finding: an excluded or preserved value, a deprecated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub route: Route,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.route, self.message)
    }
}

/// Per-invocation state.
///
/// A root context is created by [`Options::make_context`]; every nested value
/// gets its own child through [`Context::enter`]. Children own their errors and
/// warnings, so a failed speculative attempt (a combinator branch, a
/// containment probe) leaves the parent untouched until the caller decides
/// to [`absorb`](Context::absorb) the child.
#[derive(Debug, Clone)]
pub struct Context {
    options: Arc<Options>,
    route: Route,
    depth: usize,
    errors: Vec<ParseError>,
    warnings: Vec<Warning>,
}

impl Context {
    pub fn new(options: Arc<Options>) -> Self {
        Self { options, route: Route::default(), depth: 0, errors: Vec::new(), warnings: Vec::new() }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn shared_options(&self) -> Arc<Options> {
        Arc::clone(&self.options)
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Child context one level deeper, at `item` below the current route.
    pub fn enter(&self, item: impl Into<RouteItem>) -> Result<Context, ParseError> {
        let depth = self.depth + 1;
        let max_depth = self.options.max_depth();
        let route = self.route.child(item.into());
        if depth > max_depth {
            return Err(ParseError::RecursionExceeded { route, depth, max_depth });
        }
        Ok(Context { options: Arc::clone(&self.options), route, depth, errors: Vec::new(), warnings: Vec::new() })
    }

    /// Isolated child at the same route and depth, for attempts that may be discarded.
    pub fn speculate(&self) -> Context {
        Context {
            options: Arc::clone(&self.options),
            route: self.route.clone(),
            depth: self.depth,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Isolated child whose options are the current ones merged with `overrides`.
    pub fn speculate_with(&self, overrides: &Options) -> Context {
        let mut child = self.speculate();
        child.options = Arc::new(&*self.options & overrides);
        child
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(route = %self.route, "{message}");
        self.warnings.push(Warning { route: self.route.clone(), message });
    }

    /// Record an error. Fails fast unless errors are collected; in collect
    /// mode reaching `max_errors` raises everything gathered so far.
    pub fn collect(&mut self, error: ParseError) -> Result<(), ParseError> {
        if !self.options.collect_errors() {
            return Err(error);
        }
        self.errors.extend(error.into_errors());
        match self.options.max_errors {
            Some(max) if self.errors.len() >= max => Err(self.raise_error(None)),
            _ => Ok(()),
        }
    }

    /// Take collected errors (and an optional forced one) as a single aggregate.
    pub fn raise_error(&mut self, forced: Option<ParseError>) -> ParseError {
        let mut errors = std::mem::take(&mut self.errors);
        errors.extend(forced);
        ParseError::aggregate(errors)
    }

    /// Commit a finished child: keep its warnings and route its errors through
    /// [`collect`](Context::collect).
    pub fn absorb(&mut self, mut child: Context) -> Result<(), ParseError> {
        self.warnings.append(&mut child.warnings);
        for error in child.errors {
            self.collect(error)?;
        }
        Ok(())
    }

    /// Keep only the warnings of a child, discarding its errors.
    pub fn absorb_warnings(&mut self, child: &mut Context) {
        self.warnings.append(&mut child.warnings);
    }

    /// Errors of a failed attempt: those collected by the child plus the one it returned.
    pub fn take_failure(&mut self, returned: Option<ParseError>) -> Vec<ParseError> {
        let mut errors = std::mem::take(&mut self.errors);
        errors.extend(returned);
        errors
    }

    /// End of a root invocation: collected errors become one aggregate.
    pub fn finish(&mut self) -> Result<Vec<Warning>, ParseError> {
        if self.has_errors() {
            return Err(self.raise_error(None));
        }
        Ok(std::mem::take(&mut self.warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn absence(field: &str) -> ParseError {
        ParseError::Absence { route: Route::default(), field: field.into() }
    }

    #[test]
    fn routes_render_like_paths() {
        let ctx = Options::default().make_context();
        let child = ctx.enter("items").unwrap().enter(2usize).unwrap().enter("name").unwrap();
        assert_eq!(child.route().to_string(), "$.items[2].name");
        assert_eq!(child.depth(), 3);
    }

    #[test]
    fn fail_fast_returns_first_error() {
        let mut ctx = Options::default().make_context();
        assert_eq!(ctx.collect(absence("a")), Err(absence("a")));
        assert!(!ctx.has_errors());
    }

    #[test]
    fn collect_mode_stops_at_max_errors() {
        let options = Options { collect_errors: Some(true), max_errors: Some(2), ..Options::default() };
        let mut ctx = options.make_context();
        assert!(ctx.collect(absence("a")).is_ok());
        let err = ctx.collect(absence("b")).unwrap_err();
        assert_eq!(err, ParseError::Aggregate(vec![absence("a"), absence("b")]));
    }

    #[test]
    fn depth_is_bounded() {
        let options = Options { max_depth: Some(1), ..Options::default() };
        let ctx = options.make_context();
        let child = ctx.enter(0usize).unwrap();
        assert!(matches!(child.enter(0usize), Err(ParseError::RecursionExceeded { depth: 2, max_depth: 1, .. })));
    }

    #[test]
    fn speculative_children_stay_isolated() {
        let options = Options { collect_errors: Some(true), ..Options::default() };
        let mut ctx = options.make_context();
        let mut attempt = ctx.speculate();
        attempt.collect(absence("x")).unwrap();
        attempt.warn("tried");
        ctx.absorb_warnings(&mut attempt);
        assert!(!ctx.has_errors());
        assert_eq!(ctx.warnings().len(), 1);
        ctx.absorb(attempt).unwrap();
        assert_eq!(ctx.errors(), &[absence("x")]);
        assert_eq!(ctx.finish().unwrap_err().into_errors().len(), 1);
    }
}
