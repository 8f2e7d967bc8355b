// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Tuple codec error types.

/// Errors that can occur encoding, decoding, or converting tuples.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TupleError {
    #[error("tuple data too short")]
    TooShort,

    #[error("bad tuple data")]
    BadTupleData,

    #[error("too many tuple elements for destination")]
    TooManyElements,

    #[error("too few tuple elements for destination")]
    TooFewElements,

    #[error("tuple integer too big")]
    IntTooBig,

    #[error("cannot convert {from} element into {to}")]
    CannotConvert {
        from: &'static str,
        to: &'static str,
    },

    #[error("integer out of range of destination type {to}")]
    IntRange { to: &'static str },

    #[error("byte string of length {got} does not fit destination array of length {want}")]
    ArrayLength { got: usize, want: usize },

    #[error("unsupported type for tuple operation")]
    UnsupportedType,
}
