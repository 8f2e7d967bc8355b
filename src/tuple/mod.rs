// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Order-preserving tuple keys.
//!
//! Encodes heterogeneous element sequences into byte strings whose
//! unsigned byte order matches element-wise lexicographic order of
//! the originals, with a fixed rank between kinds: null < false <
//! true < negative integers < non-negative integers < byte strings.
//! Used to compose structured keys whose components sort correctly
//! under plain byte comparison.
//!
//! # Example
//!
//! ```
//! use rubidium::tuple::{pack, unpack_into, Element};
//!
//! let key = pack(&[
//!     Element::from("user"),
//!     Element::from(42),
//! ]).unwrap();
//!
//! let (name, id): (String, i64) = unpack_into(&key).unwrap();
//! assert_eq!((name.as_str(), id), ("user", 42));
//! ```

mod convert;
mod decode;
mod element;
mod encode;
mod error;

pub use convert::FromElement;
pub use decode::{decode_element, unpack, unpack_into, unpack_prefix, UnpackTuple};
pub use element::Element;
pub use encode::Pack;
pub use error::TupleError;

/// Appends one element's encoding to `out`.
pub fn append<P: Pack + ?Sized>(out: &mut Vec<u8>, value: &P) -> Result<(), TupleError> {
    value.pack_into(out)
}

/// Encodes a sequence of elements into a fresh byte string.
pub fn pack(elements: &[Element]) -> Result<Vec<u8>, TupleError> {
    let mut out = Vec::new();
    for element in elements {
        element.pack_into(&mut out)?;
    }
    Ok(out)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use num_bigint::BigInt;
    use proptest::prelude::*;

    fn arbitrary_element() -> impl Strategy<Value = Element> {
        prop_oneof![
            Just(Element::Null),
            any::<bool>().prop_map(Element::Bool),
            any::<i64>().prop_map(Element::Int),
            // Big integers beyond the i64 range in both directions.
            (any::<u64>(), 0usize..128).prop_map(|(lo, shift)| {
                let n = (BigInt::from(lo) + 1) << (64 + shift);
                Element::BigInt(n)
            }),
            (any::<u64>(), 0usize..128).prop_map(|(lo, shift)| {
                let n: BigInt = (BigInt::from(lo) + 1) << (64 + shift);
                Element::BigInt(-n)
            }),
            prop::collection::vec(any::<u8>(), 0..64).prop_map(Element::Bytes),
        ]
    }

    proptest! {
        #[test]
        fn roundtrip(elements in prop::collection::vec(arbitrary_element(), 0..6)) {
            let data = pack(&elements).unwrap();
            let decoded = unpack(&data).unwrap();
            prop_assert_eq!(decoded, elements);
        }

        #[test]
        fn int_order_preserved(a in any::<i64>(), b in any::<i64>()) {
            let ea = pack(&[Element::Int(a)]).unwrap();
            let eb = pack(&[Element::Int(b)]).unwrap();
            prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
        }

        #[test]
        fn bigint_order_preserved(
            a in prop::collection::vec(any::<u8>(), 1..40),
            b in prop::collection::vec(any::<u8>(), 1..40),
            neg_a in any::<bool>(),
            neg_b in any::<bool>(),
        ) {
            let mut na = BigInt::from_bytes_be(num_bigint::Sign::Plus, &a);
            let mut nb = BigInt::from_bytes_be(num_bigint::Sign::Plus, &b);
            if neg_a { na = -na; }
            if neg_b { nb = -nb; }

            let ea = pack(&[Element::BigInt(na.clone())]).unwrap();
            let eb = pack(&[Element::BigInt(nb.clone())]).unwrap();
            prop_assert_eq!(ea.cmp(&eb), na.cmp(&nb));
        }

        #[test]
        fn bytes_order_preserved(
            a in prop::collection::vec(any::<u8>(), 0..32),
            b in prop::collection::vec(any::<u8>(), 0..32),
        ) {
            let ea = pack(&[Element::Bytes(a.clone())]).unwrap();
            let eb = pack(&[Element::Bytes(b.clone())]).unwrap();
            prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
        }

        #[test]
        fn tuple_order_matches_elementwise(
            a1 in any::<i64>(), a2 in prop::collection::vec(any::<u8>(), 0..8),
            b1 in any::<i64>(), b2 in prop::collection::vec(any::<u8>(), 0..8),
        ) {
            let ta = pack(&[Element::Int(a1), Element::Bytes(a2.clone())]).unwrap();
            let tb = pack(&[Element::Int(b1), Element::Bytes(b2.clone())]).unwrap();
            let want = (a1, a2).cmp(&(b1, b2));
            prop_assert_eq!(ta.cmp(&tb), want);
        }
    }
}
