//! Typed indices into a [`NeslAssembly`](crate::NeslAssembly).
//!
//! Ids are dense `u32` indices. Fields and methods travel through IL tails
//! as big-endian `u64`, so they also convert from the wire width.

use std::fmt;

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Decode an id read from an IL tail. Out-of-range values yield `None`.
            #[inline]
            pub fn from_wire(raw: u64) -> Option<Self> {
                u32::try_from(raw).ok().map($name)
            }

            #[inline]
            pub const fn to_wire(self) -> u64 {
                self.0 as u64
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_index!(
    /// Index of a [`NeslType`](crate::NeslType).
    TypeId,
    "Type"
);
define_index!(
    /// Index of a [`NeslField`](crate::NeslField).
    FieldId,
    "Field"
);
define_index!(
    /// Index of a [`NeslMethod`](crate::NeslMethod).
    MethodId,
    "Method"
);
