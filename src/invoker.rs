//! Argument binding and handler invocation.
//!
//! Each declared [`Param`] is bound from the first source that has a value:
//!
//! | # | Source | Applies to |
//! |---|---|---|
//! | 1 | the current request | [`ParamKind::Request`] |
//! | 2 | entity lookup: id route var, slug route var, id query var, slug query var, else `None` | [`ParamKind::Entity`] |
//! | 3 | route variable of the same name, raw string | [`ParamKind::Value`] |
//! | 4 | query variable of the same name, raw string | [`ParamKind::Value`] |
//! | 5 | declared default | [`ParamKind::Value`] |
//! | 6 | null, if nullable | [`ParamKind::Value`] |
//! | 7 | [`Error::MissingArgument`] | [`ParamKind::Value`] |
//!
//! A missing entity is bound as `None` rather than answered with 404: the
//! handler checks it and returns its own `fail` result.

use serde_json::Value;

use crate::entity::{Entity, EntityRegistry};
use crate::error::{Error, Result};
use crate::handler::{Arg, Args, HandlerRef, HandlerRegistry, Param, ParamKind};
use crate::request::Request;
use crate::result::ActionResult;
use crate::route::RouteDefinition;

/// Resolves handler references and binds their arguments.
pub struct HandlerInvoker<'a> {
    handlers: &'a HandlerRegistry,
    entities: &'a EntityRegistry,
}

impl<'a> HandlerInvoker<'a> {
    pub fn new(handlers: &'a HandlerRegistry, entities: &'a EntityRegistry) -> Self {
        Self { handlers, entities }
    }

    /// Resolves `handler`, binds its parameters against `req`, and calls it.
    pub fn invoke(
        &self,
        handler: &HandlerRef,
        req: &Request,
        route: &RouteDefinition,
    ) -> Result<ActionResult> {
        let resolved = self.handlers.resolve(handler)?;
        let args = self.bind(resolved.params(), req, &handler.label(), &route.to_string())?;
        resolved.call(args)
    }

    /// Binds `params` in declaration order. `handler` and `route` only feed
    /// the [`Error::MissingArgument`] context.
    pub fn bind<'r>(
        &self,
        params: &[Param],
        req: &'r Request,
        handler: &str,
        route: &str,
    ) -> Result<Args<'r>> {
        let mut args = Args::default();
        for param in params {
            let arg = match param.kind() {
                ParamKind::Request => Arg::Request(req),
                ParamKind::Entity(kind) => Arg::Entity(self.load_entity(kind, req)?),
                ParamKind::Value => Arg::Value(bind_value(param, req).ok_or_else(|| {
                    Error::MissingArgument {
                        param: param.name().to_owned(),
                        handler: handler.to_owned(),
                        route: route.to_owned(),
                    }
                })?),
            };
            args.push(param.name(), arg);
        }
        Ok(args)
    }

    fn load_entity(&self, kind: &str, req: &Request) -> Result<Option<Entity>> {
        let repo = self.entities.get(kind)?;
        let (pk, slug) = (repo.primary_key(), repo.slug_key());

        if let Some(id) = req.param(pk) {
            if let Some(found) = repo.find_by_primary_key(id)? {
                return Ok(Some(found));
            }
        }
        if let Some(s) = req.param(slug) {
            if let Some(found) = repo.find_by_slug(s)? {
                return Ok(Some(found));
            }
        }
        if let Some(id) = req.query(pk) {
            if let Some(found) = repo.find_by_primary_key(id)? {
                return Ok(Some(found));
            }
        }
        if let Some(s) = req.query(slug) {
            return repo.find_by_slug(s);
        }
        Ok(None)
    }
}

/// Steps 3 to 6; `None` means step 7.
fn bind_value(param: &Param, req: &Request) -> Option<Value> {
    let name = param.name();
    req.param(name)
        .or_else(|| req.query(name))
        .map(|raw| Value::String(raw.to_owned()))
        .or_else(|| param.default_value().cloned())
        .or_else(|| param.is_nullable().then_some(Value::Null))
}
