//! The `EntityRef` trait and the `entity_impl!` macro that builds one.
//!
//! Instructions, blocks and values in the Cot IR/SSA representations need to
//! reference other entities that live in the same per-function arena. We
//! deliberately don't use Rust references for this: ownership and mutability
//! rules make cyclic block/value/function graphs painful to express, and a
//! 64-bit pointer is wasteful next to a 32-bit dense index. Instead every
//! entity reference is a newtype wrapping a `u32` index into a table owned by
//! the function. A distinct type per entity kind keeps the indices from being
//! mixed up at the type level even though they're all just `u32`s underneath.

use core::u32;

/// A type wrapping a small integer index should implement `EntityRef` so it
/// can be used as the key of a `PrimaryMap` or `SecondaryMap`.
pub trait EntityRef: Copy + Eq {
    /// Create a new entity reference from a small integer. This should crash
    /// if the requested index is not representable.
    fn new(index: usize) -> Self;

    /// Get the index that was used to create this entity reference.
    fn index(self) -> usize;
}

/// Generate an `EntityRef` implementation for a type that wraps a `u32`.
///
/// The macro also implements `Display`/`Debug` printing the entity with the
/// given prefix (e.g. `block12`, `v7`), matching the textual-IR convention
/// Cranelift uses for its own entity references.
#[macro_export]
macro_rules! entity_impl {
    ($entity:ident) => {
        impl $crate::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $entity(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl $entity {
            /// A sentinel value reserved for "no entity", used inside
            /// `PackedOption`.
            #[allow(dead_code)]
            pub const RESERVED_VALUE: Self = $entity(u32::MAX);

            #[allow(dead_code)]
            fn is_reserved_value(self) -> bool {
                self.0 == u32::MAX
            }
        }

        impl $crate::packed_option::ReservedValue for $entity {
            fn reserved_value() -> Self {
                $entity(u32::MAX)
            }

            fn is_reserved_value(&self) -> bool {
                self.0 == u32::MAX
            }
        }
    };

    ($entity:ident, $display_prefix:expr) => {
        entity_impl!($entity);

        impl ::core::fmt::Display for $entity {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                write!(f, concat!($display_prefix, "{}"), self.0)
            }
        }

        impl ::core::fmt::Debug for $entity {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                (self as &dyn ::core::fmt::Display).fmt(f)
            }
        }
    };
}
