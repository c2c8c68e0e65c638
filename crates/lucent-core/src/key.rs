#![forbid(unsafe_code)]

//! Property keys.
//!
//! A [`PropertyKey`] addresses one slot of an object: a name, an integer
//! index, or a [`Symbol`]. Canonical numeric strings normalize to indices,
//! so `"3"` and `3u32` address the same slot.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

struct SymbolInner {
    description: Option<Box<str>>,
}

/// An identity-compared protocol/metadata key.
///
/// Two symbols are equal only if they are the same symbol, whatever their
/// descriptions. Reads through symbol keys are never tracked.
#[derive(Clone)]
pub struct Symbol(Rc<SymbolInner>);

thread_local! {
    static ITERATOR: Symbol = Symbol::new("Symbol.iterator");
}

impl Symbol {
    /// Create a fresh symbol.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self(Rc::new(SymbolInner {
            description: Some(description.into().into_boxed_str()),
        }))
    }

    /// Create a fresh symbol without a description.
    #[must_use]
    pub fn anonymous() -> Self {
        Self(Rc::new(SymbolInner { description: None }))
    }

    /// The well-known iteration protocol symbol.
    #[must_use]
    pub fn iterator() -> Self {
        ITERATOR.with(Clone::clone)
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description().unwrap_or(""))
    }
}

/// Key of one object slot.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// A string name that is not a canonical array index.
    Name(Rc<str>),
    /// A canonical array index.
    Index(u32),
    /// A symbol; exempt from tracking.
    Symbol(Symbol),
}

/// Largest valid array index (`2^32 - 2`).
pub const MAX_INDEX: u32 = u32::MAX - 1;

impl PropertyKey {
    /// Build a key from a name, normalizing canonical numeric strings.
    #[must_use]
    pub fn name(name: &str) -> Self {
        match parse_index(name) {
            Some(index) => Self::Index(index),
            None => Self::Name(Rc::from(name)),
        }
    }

    /// The `length` pseudo-property of arrays.
    #[must_use]
    pub fn length() -> Self {
        Self::Name(Rc::from("length"))
    }

    #[must_use]
    pub fn is_symbol(&self) -> bool {
        matches!(self, Self::Symbol(_))
    }

    #[must_use]
    pub fn is_length(&self) -> bool {
        matches!(self, Self::Name(name) if &**name == "length")
    }

    #[must_use]
    pub fn as_index(&self) -> Option<u32> {
        match self {
            Self::Index(index) => Some(*index),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }
}

/// `Some(n)` iff `s` is the canonical decimal form of an array index.
fn parse_index(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 10 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse::<u64>()
        .ok()
        .filter(|&n| n <= u64::from(MAX_INDEX))
        .map(|n| n as u32)
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        Self::name(name)
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        Self::name(&name)
    }
}

impl From<&String> for PropertyKey {
    fn from(name: &String) -> Self {
        Self::name(name)
    }
}

impl From<u32> for PropertyKey {
    fn from(index: u32) -> Self {
        if index <= MAX_INDEX {
            Self::Index(index)
        } else {
            Self::Name(Rc::from(index.to_string()))
        }
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(index) => Self::from(index),
            Err(_) => Self::Name(Rc::from(index.to_string())),
        }
    }
}

impl From<Symbol> for PropertyKey {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(key: &PropertyKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name:?}"),
            Self::Index(index) => write!(f, "{index}"),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}
