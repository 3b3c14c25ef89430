//! Types for compile-time and run-time endianness.
//!
//! On-disk Mach-O records keep the byte order implied by the file's magic
//! number. Every multi-byte field in `macho::raw` is therefore
//! wrapped in one of the types here instead of a plain integer, so a
//! transposed byte order can never silently read the wrong value.

use std::fmt;

use crate::pod::Pod;

/// A trait for a byte order, implemented by `BigEndian`, `LittleEndian` and
/// the run-time `Endianness`.
pub trait Endian: fmt::Debug + Default + Clone + Copy + PartialEq + Eq + 'static {
    /// Return true if this endian is big-endian.
    fn is_big_endian(self) -> bool;

    /// Return true if this endian is little-endian.
    #[inline]
    fn is_little_endian(self) -> bool {
        !self.is_big_endian()
    }

    /// Convert a `u16` value to the stored byte order.
    fn write_u16(self, n: u16) -> [u8; 2] {
        if self.is_big_endian() {
            n.to_be_bytes()
        } else {
            n.to_le_bytes()
        }
    }

    /// Convert a `u32` value to the stored byte order.
    fn write_u32(self, n: u32) -> [u8; 4] {
        if self.is_big_endian() {
            n.to_be_bytes()
        } else {
            n.to_le_bytes()
        }
    }

    /// Convert a `u64` value to the stored byte order.
    fn write_u64(self, n: u64) -> [u8; 8] {
        if self.is_big_endian() {
            n.to_be_bytes()
        } else {
            n.to_le_bytes()
        }
    }
}

/// A marker type for big-endian byte order, selected at compile time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BigEndian;

impl Endian for BigEndian {
    #[inline]
    fn is_big_endian(self) -> bool {
        true
    }
}

/// A marker type for little-endian byte order, selected at compile time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LittleEndian;

impl Endian for LittleEndian {
    #[inline]
    fn is_big_endian(self) -> bool {
        false
    }
}

/// A byte order that is selected at run time, from the file's magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    /// Little-endian byte order.
    Little,
    /// Big-endian byte order.
    Big,
}

impl Default for Endianness {
    #[inline]
    fn default() -> Self {
        Endianness::Little
    }
}

impl Endian for Endianness {
    #[inline]
    fn is_big_endian(self) -> bool {
        matches!(self, Endianness::Big)
    }
}

macro_rules! endian_int {
    ($name:ident, $int:ty, $size:expr) => {
        /// An integer value stored using a generic byte order.
        #[derive(Clone, Copy, Eq, PartialEq)]
        #[repr(transparent)]
        pub struct $name<E: Endian = Endianness>([u8; $size], core::marker::PhantomData<E>);

        impl<E: Endian> Default for $name<E> {
            #[inline]
            fn default() -> Self {
                Self::new(E::default(), 0)
            }
        }

        impl<E: Endian> fmt::Debug for $name<E> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.get(E::default()))
            }
        }

        // Safety: this is a fixed-size array of bytes with no padding.
        unsafe impl<E: Endian> Pod for $name<E> {}

        impl<E: Endian> $name<E> {
            /// Construct a new value, encoding it in the given byte order.
            #[inline]
            pub fn new(endian: E, n: $int) -> Self {
                let bytes = if endian.is_big_endian() {
                    n.to_be_bytes()
                } else {
                    n.to_le_bytes()
                };
                $name(bytes, core::marker::PhantomData)
            }

            /// Decode the value using the given byte order.
            #[inline]
            pub fn get(&self, endian: E) -> $int {
                if endian.is_big_endian() {
                    <$int>::from_be_bytes(self.0)
                } else {
                    <$int>::from_le_bytes(self.0)
                }
            }

            /// Re-encode the value using the given byte order.
            #[inline]
            pub fn set(&mut self, endian: E, n: $int) {
                *self = Self::new(endian, n);
            }
        }
    };
}

endian_int!(U16, u16, 2);
endian_int!(U32, u32, 4);
endian_int!(U64, u64, 8);
endian_int!(I32, i32, 4);
endian_int!(I64, i64, 8);

impl<E: Endian> I32<E> {
    /// Decode as a signed value using the given byte order.
    #[inline]
    pub fn get_signed(&self, endian: E) -> i32 {
        self.get(endian)
    }
}
