//! Core value type for facts, bindings, and user-function calls.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::multifield::Multifield;
use crate::types::Type;

/// The symbol returned when a value is absent.
pub const NIL: &str = "nil";

/// A single slot value.
///
/// Clones are cheap: text is reference counted and multifields share
/// structure. Floats compare by bit pattern so `Value` can be `Eq` and
/// `Hash` and serve as an alpha-memory key.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    /// Signed integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Quoted text. Never equal to a symbol with the same characters.
    String(Arc<str>),
    /// Bare identifier such as `red` or `nil`.
    Symbol(Arc<str>),
    /// `true` or `false`.
    Bool(bool),
    /// Multifield.
    List(Multifield),
}

impl Value {
    /// Interns `name` as a symbol.
    #[must_use]
    pub fn symbol(name: impl AsRef<str>) -> Self {
        Self::Symbol(Arc::from(name.as_ref()))
    }

    /// The `nil` symbol.
    #[must_use]
    pub fn nil() -> Self {
        Self::symbol(NIL)
    }

    /// Collects `items` into a multifield.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// The runtime type tag, as checked against template slot types.
    #[must_use]
    pub fn value_type(&self) -> Type {
        match self {
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::String(_) => Type::String,
            Self::Symbol(_) => Type::Symbol,
            Self::Bool(_) => Type::Bool,
            Self::List(_) => Type::List,
        }
    }

    /// Returns true for the `nil` symbol.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.as_symbol() == Some(NIL)
    }

    /// Everything except `false` and `nil` counts as true in a test.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        self.as_bool() != Some(false) && !self.is_nil()
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        if let Self::Bool(b) = self { Some(*b) } else { None }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        if let Self::Int(n) = self { Some(*n) } else { None }
    }

    /// Returns the float, if this is one.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        if let Self::Float(x) = self { Some(*x) } else { None }
    }

    /// Widens ints to `f64`. Ints beyond 2^53 round.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Self::Int(n) => Some(n as f64),
            Self::Float(x) => Some(x),
            _ => None,
        }
    }

    /// Text of a string value. Symbols return `None`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        if let Self::String(s) = self { Some(s) } else { None }
    }

    /// Returns the symbol name, if this is a symbol.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        if let Self::Symbol(s) = self { Some(s) } else { None }
    }

    /// Returns the elements, if this is a list.
    #[must_use]
    pub const fn as_list(&self) -> Option<&Multifield> {
        if let Self::List(items) = self { Some(items) } else { None }
    }

    /// Stable per-variant tag used by `Hash`.
    const fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Float(_) => 1,
            Self::String(_) => 2,
            Self::Symbol(_) => 3,
            Self::Bool(_) => 4,
            Self::List(_) => 5,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(x), Self::Float(y)) => x.to_bits() == y.to_bits(),
            (Self::Int(x), Self::Int(y)) => x == y,
            (Self::String(x), Self::String(y)) | (Self::Symbol(x), Self::Symbol(y)) => x == y,
            (Self::Bool(x), Self::Bool(y)) => x == y,
            (Self::List(x), Self::List(y)) => x == y,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.tag());
        match self {
            Self::Int(n) => state.write_i64(*n),
            Self::Float(x) => state.write_u64(x.to_bits()),
            Self::String(s) | Self::Symbol(s) => s.hash(state),
            Self::Bool(b) => state.write_u8(u8::from(*b)),
            Self::List(items) => items.hash(state),
        }
    }
}

/// Numbers order across int and float. Text orders within its own kind.
/// Every other pairing is unordered, so `<` and `>` tests on it fail.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(x), Self::Int(y)) => Some(x.cmp(y)),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_number()?.partial_cmp(&other.as_number()?)
            }
            (Self::String(x), Self::String(y)) | (Self::Symbol(x), Self::Symbol(y)) => {
                Some(x.cmp(y))
            }
            (Self::Bool(x), Self::Bool(y)) => Some(x.cmp(y)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::String(s) => write!(f, "{:?}", &**s),
            Self::Symbol(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => {
                f.write_str("(")?;
                let mut sep = "";
                for item in items {
                    write!(f, "{sep}{item}")?;
                    sep = " ";
                }
                f.write_str(")")
            }
        }
    }
}

/// Same text as `Display`, so assertion failures read like slot values.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

macro_rules! value_from {
    ($($source:ty => |$v:ident| $build:expr;)*) => {
        $(
            impl From<$source> for Value {
                fn from($v: $source) -> Self {
                    $build
                }
            }
        )*
    };
}

value_from! {
    bool => |b| Self::Bool(b);
    i64 => |n| Self::Int(n);
    i32 => |n| Self::Int(i64::from(n));
    f64 => |x| Self::Float(x);
    &str => |s| Self::String(Arc::from(s));
    String => |s| Self::String(Arc::from(s));
    Multifield => |items| Self::List(items);
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::list(items.into_iter().map(Into::into))
    }
}
