// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Coercions from decoded elements into typed destinations.
//!
//! The rules: byte strings convert into text strings (UTF-8
//! validated), byte vectors, or fixed-size byte arrays of matching
//! length; integers and big integers convert into any integer width
//! the value fits; booleans convert into booleans. `Element` itself
//! accepts anything, including null; no other destination does.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::element::Element;
use super::error::TupleError;

/// A typed destination fillable from a decoded [`Element`].
pub trait FromElement: Sized {
    fn from_element(element: Element) -> Result<Self, TupleError>;
}

impl FromElement for Element {
    fn from_element(element: Element) -> Result<Self, TupleError> {
        Ok(element)
    }
}

impl FromElement for bool {
    fn from_element(element: Element) -> Result<Self, TupleError> {
        match element {
            Element::Bool(v) => Ok(v),
            Element::Null => Err(TupleError::UnsupportedType),
            other => Err(TupleError::CannotConvert {
                from: other.kind(),
                to: "bool",
            }),
        }
    }
}

macro_rules! int_from_element {
    ($($ty:ty => $to:ident),* $(,)?) => {$(
        impl FromElement for $ty {
            fn from_element(element: Element) -> Result<Self, TupleError> {
                match element {
                    Element::Int(v) => <$ty>::try_from(v).map_err(|_| TupleError::IntRange {
                        to: stringify!($ty),
                    }),
                    Element::BigInt(n) => n.$to().ok_or(TupleError::IntRange {
                        to: stringify!($ty),
                    }),
                    Element::Null => Err(TupleError::UnsupportedType),
                    other => Err(TupleError::CannotConvert {
                        from: other.kind(),
                        to: stringify!($ty),
                    }),
                }
            }
        }
    )*};
}

int_from_element!(
    i8 => to_i8,
    i16 => to_i16,
    i32 => to_i32,
    i64 => to_i64,
    isize => to_isize,
    u8 => to_u8,
    u16 => to_u16,
    u32 => to_u32,
    u64 => to_u64,
    usize => to_usize,
);

impl FromElement for BigInt {
    fn from_element(element: Element) -> Result<Self, TupleError> {
        match element {
            Element::BigInt(n) => Ok(n),
            Element::Int(v) => Ok(BigInt::from(v)),
            Element::Null => Err(TupleError::UnsupportedType),
            other => Err(TupleError::CannotConvert {
                from: other.kind(),
                to: "bigint",
            }),
        }
    }
}

impl FromElement for String {
    fn from_element(element: Element) -> Result<Self, TupleError> {
        match element {
            Element::Bytes(b) => String::from_utf8(b).map_err(|_| TupleError::CannotConvert {
                from: "bytes",
                to: "string",
            }),
            Element::Null => Err(TupleError::UnsupportedType),
            other => Err(TupleError::CannotConvert {
                from: other.kind(),
                to: "string",
            }),
        }
    }
}

impl FromElement for Vec<u8> {
    fn from_element(element: Element) -> Result<Self, TupleError> {
        match element {
            Element::Bytes(b) => Ok(b),
            Element::Null => Err(TupleError::UnsupportedType),
            other => Err(TupleError::CannotConvert {
                from: other.kind(),
                to: "bytes",
            }),
        }
    }
}

impl<const N: usize> FromElement for [u8; N] {
    fn from_element(element: Element) -> Result<Self, TupleError> {
        match element {
            Element::Bytes(b) => {
                if b.len() != N {
                    return Err(TupleError::ArrayLength {
                        got: b.len(),
                        want: N,
                    });
                }
                let mut out = [0u8; N];
                out.copy_from_slice(&b);
                Ok(out)
            }
            Element::Null => Err(TupleError::UnsupportedType),
            other => Err(TupleError::CannotConvert {
                from: other.kind(),
                to: "byte array",
            }),
        }
    }
}
