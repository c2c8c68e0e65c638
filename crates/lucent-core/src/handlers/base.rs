#![forbid(unsafe_code)]

//! General-purpose tracked operations for plain objects, arrays, and
//! functions.
//!
//! # Design
//!
//! Reads acquire a token for `(target, key)`: the stored one, else a pooled
//! one, else a fresh one. If the read happens inside a tracking context the
//! token is stored so later writes find it; otherwise a token that was not
//! already stored goes back to the pool.
//!
//! Writes and deletes collect the tokens to fire (`All` then the exact key)
//! and fire them inside one batch, so a reaction observing several of them
//! runs once.
//!
//! # Invariants
//!
//! 1. A write of a value strictly equal to the current one fires nothing.
//! 2. A delete always fires.
//! 3. One call of a mutating array builtin fires `All` once, whatever the
//!    number of elements it moves.
//! 4. Raw data never holds wrappers: written values are unwrapped first.

use lucent_reactive::{Atom, BatchScope, run_in_action};

use super::ProxyHandler;
use crate::config;
use crate::error::Result;
use crate::function::Function;
use crate::key::PropertyKey;
use crate::observable::{Target, observable};
use crate::store::{self, TokenKey, TokenList};
use crate::value::Value;

/// The general-purpose handler set.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseHandler;

impl ProxyHandler for BaseHandler {}

/// Report `(target, key)` as observed. Returns whether a tracking context
/// was active.
pub(crate) fn track(target: &Target, key: TokenKey) -> bool {
    let (token, stored) = store::get_or_create_token(target, &key);
    let observed = token.report_observed();
    if observed {
        if !stored {
            store::set_token(target, key, token);
        }
    } else if !stored {
        store::pool_return(token);
    }
    observed
}

/// Fire `tokens` in order as one batch.
pub(crate) fn notify(target: &Target, key: &TokenKey, tokens: impl IntoIterator<Item = Atom>) {
    let _batch = BatchScope::new();
    let trace = config::with_config(|c| c.trace_notifications);
    for token in tokens {
        if trace {
            tracing::trace!(
                message = "handler.notify",
                class = %target.class(),
                key = ?key,
                token = token.label(),
            );
        }
        token.report_changed();
    }
}

pub(crate) fn get(target: &Target, key: &PropertyKey) -> Result<Value> {
    if key.is_symbol() {
        return Ok(target.get(key));
    }
    let value = target.get(key);
    if let Value::Function(function) = value {
        return Ok(Value::Observable(observable(function)));
    }

    let observed = track(target, TokenKey::Prop(key.clone()));
    Ok(match value {
        Value::Object(object) if observed => Value::Observable(observable(object)),
        Value::Object(object) => store::get_wrapper(&Target::Object(object.clone()))
            .map_or(Value::Object(object), Value::Observable),
        other => other,
    })
}

pub(crate) fn has(target: &Target, key: &PropertyKey) -> Result<bool> {
    if !key.is_symbol() {
        track(target, TokenKey::Prop(key.clone()));
    }
    Ok(target.has(key))
}

pub(crate) fn own_keys(target: &Target) -> Result<Vec<PropertyKey>> {
    track(target, TokenKey::All);
    Ok(target.own_keys())
}

pub(crate) fn set(target: &Target, key: &PropertyKey, value: Value) -> Result<bool> {
    let value = store::unwrap(&value);
    let previous = target.get(key);
    let len_before = target.array_len();
    let token_key = TokenKey::Prop(key.clone());
    let mut tokens = store::tokens_to_notify_on_change(target, &token_key);

    let written = target.set(key, value.clone())?;
    if written && !previous.strict_eq(&value) {
        if !key.is_length() && target.array_len() != len_before {
            tokens.extend(store::get_token(target, &TokenKey::length()));
        }
        notify(target, &token_key, tokens);
    }
    Ok(written)
}

pub(crate) fn delete_property(target: &Target, key: &PropertyKey) -> Result<bool> {
    let token_key = TokenKey::Prop(key.clone());
    let tokens = store::tokens_to_notify_on_change(target, &token_key);
    let deleted = target.delete(key);
    notify(target, &token_key, tokens);
    Ok(deleted)
}

pub(crate) fn apply(function: &Function, this: &Value, args: &[Value]) -> Result<Value> {
    let raw_this = store::unwrap(this);
    let method = function.builtin_method();
    if let (Value::Object(receiver), Some(method)) = (&raw_this, method)
        && receiver.is_array()
    {
        let target = Target::Object(receiver.clone());
        if !method.is_mutating() {
            track(&target, TokenKey::All);
            return function.call(&raw_this, args);
        }

        let len_before = receiver.array_len();
        let result = function.call(&raw_this, args);
        let mut tokens: TokenList = store::get_token(&target, &TokenKey::All).into_iter().collect();
        if receiver.array_len() != len_before {
            tokens.extend(store::get_token(&target, &TokenKey::length()));
        }
        notify(&target, &TokenKey::All, tokens);

        let result = result?;
        return Ok(if result.strict_eq(&raw_this) {
            this.clone()
        } else {
            result
        });
    }

    run_in_action(|| function.call(this, args))
}
