//! A `PackedOption<T>` is the same size as `T` itself, using a reserved
//! "invalid" value of `T` to represent `None`. This matters for entity
//! references: an `Option<Value>` would be 8 bytes (discriminant + 4-byte
//! index), while `PackedOption<Value>` stays 4 bytes, which adds up across
//! the large per-function tables this crate backs.

use crate::EntityRef;
use core::fmt;

/// Types that have a reserved value which is not a valid instance.
pub trait ReservedValue {
    /// Return an instance of `Self` that is guaranteed not to be equal to any
    /// real instance.
    fn reserved_value() -> Self;

    /// Check if this is actually the reserved value.
    fn is_reserved_value(&self) -> bool;
}

/// Packed representation of `Option<T>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedOption<T: ReservedValue>(T);

impl<T: ReservedValue> Default for PackedOption<T> {
    fn default() -> Self {
        Self(T::reserved_value())
    }
}

impl<T: ReservedValue> PackedOption<T> {
    /// Returns `true` if this packed option is `None`.
    pub fn is_none(&self) -> bool {
        self.0.is_reserved_value()
    }

    /// Returns `true` if this packed option is `Some`.
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Convert to a plain `Option`.
    pub fn expand(self) -> Option<T> {
        if self.is_none() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Unwrap, panicking if this is `None`.
    pub fn unwrap(self) -> T {
        self.expand().expect("PackedOption::unwrap on a None value")
    }
}

impl<T: ReservedValue> From<T> for PackedOption<T> {
    fn from(t: T) -> Self {
        debug_assert!(
            !t.is_reserved_value(),
            "cannot store the reserved value in a PackedOption"
        );
        Self(t)
    }
}

impl<T: ReservedValue> From<Option<T>> for PackedOption<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(t) => t.into(),
            None => Self::default(),
        }
    }
}

impl<T: ReservedValue + fmt::Debug> fmt::Debug for PackedOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expand() {
            None => write!(f, "None"),
            Some(t) => t.fmt(f),
        }
    }
}

// Blanket impl so any `EntityRef` built via `entity_impl!` (which also
// implements `ReservedValue`) can be packed without extra ceremony at the
// call site.
impl<T: EntityRef + ReservedValue> PackedOption<T> {
    /// True if the given entity reference is present and equal to `entity`.
    pub fn is(&self, entity: T) -> bool {
        self.expand() == Some(entity)
    }
}
