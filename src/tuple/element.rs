// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The dynamic element produced and consumed by the tuple codec.

use num_bigint::BigInt;

/// One decoded tuple element.
///
/// Decoding produces `Int` whenever the value fits a signed 64-bit
/// integer and `BigInt` otherwise. Text and byte strings share a wire
/// representation and both decode as `Bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Null,
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Bytes(Vec<u8>),
}

impl Element {
    /// A short name for the element's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Element::Null => "null",
            Element::Bool(_) => "bool",
            Element::Int(_) => "int",
            Element::BigInt(_) => "bigint",
            Element::Bytes(_) => "bytes",
        }
    }
}

impl From<bool> for Element {
    fn from(v: bool) -> Self {
        Element::Bool(v)
    }
}

macro_rules! element_from_int {
    ($($ty:ty),* $(,)?) => {$(
        impl From<$ty> for Element {
            fn from(v: $ty) -> Self {
                Element::Int(v as i64)
            }
        }
    )*};
}

element_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Element {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(v) => Element::Int(v),
            Err(_) => Element::BigInt(BigInt::from(v)),
        }
    }
}

impl From<BigInt> for Element {
    fn from(v: BigInt) -> Self {
        Element::BigInt(v)
    }
}

impl From<&str> for Element {
    fn from(v: &str) -> Self {
        Element::Bytes(v.as_bytes().to_vec())
    }
}

impl From<String> for Element {
    fn from(v: String) -> Self {
        Element::Bytes(v.into_bytes())
    }
}

impl From<&[u8]> for Element {
    fn from(v: &[u8]) -> Self {
        Element::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Element {
    fn from(v: Vec<u8>) -> Self {
        Element::Bytes(v)
    }
}

impl<const N: usize> From<[u8; N]> for Element {
    fn from(v: [u8; N]) -> Self {
        Element::Bytes(v.to_vec())
    }
}
