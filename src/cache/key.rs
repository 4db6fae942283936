//! Cache Key Module
//!
//! Derives stable, comparable cache keys from a call's argument tuple.

use std::any::type_name;
use std::fmt::{self, Debug};

use serde::ser::{self, Serialize, Serializer};
use tracing::debug;

// == Cache Key ==
/// Immutable key derived from an ordered argument list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Canonical JSON encoding of the argument tuple
    Structural(String),
    /// Type name plus `Debug` rendering, used when serde cannot encode the arguments
    Degraded(String),
}

impl CacheKey {
    /// Returns true if this key came from the fallback encoding.
    pub fn is_degraded(&self) -> bool {
        matches!(self, CacheKey::Degraded(_))
    }

    /// Returns the encoded form of the key.
    pub fn as_str(&self) -> &str {
        match self {
            CacheKey::Structural(encoded) | CacheKey::Degraded(encoded) => encoded,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Structural(encoded) => f.write_str(encoded),
            CacheKey::Degraded(encoded) => write!(f, "~{}", encoded),
        }
    }
}

// == Key Codec ==
/// Turns a call's arguments into a [`CacheKey`].
///
/// Implementations must be pure: equal arguments yield equal keys, and
/// argument order is significant.
pub trait KeyCodec<A: ?Sized>: Send + Sync {
    fn derive_key(&self, args: &A) -> CacheKey;
}

impl<A, F> KeyCodec<A> for F
where
    A: ?Sized,
    F: Fn(&A) -> CacheKey + Send + Sync,
{
    fn derive_key(&self, args: &A) -> CacheKey {
        self(args)
    }
}

// == JSON Key Codec ==
/// Default codec: canonical `serde_json` encoding of the arguments.
///
/// JSON keeps values type-tagged (`[1,"2"]` and `[12]` never collide) and
/// sorts object keys, so maps encode the same regardless of iteration order.
/// Values plain JSON would fold into `null` get a tagged form first:
/// non-finite floats become `"inf"`, `"-inf"` or `"NaN"`, and `Some(v)`
/// becomes `{"Some":v}`, so `None` and `Some(None)` stay distinct.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonKeyCodec;

impl<A> KeyCodec<A> for JsonKeyCodec
where
    A: Serialize + Debug + ?Sized,
{
    fn derive_key(&self, args: &A) -> CacheKey {
        match serde_json::to_value(Lossless(args)) {
            Ok(value) => CacheKey::Structural(value.to_string()),
            Err(err) => {
                debug!(error = %err, "argument encoding failed, using degraded key");
                CacheKey::Degraded(format!("{}:{:?}", type_name::<A>(), args))
            }
        }
    }
}

// == Lossless Encoding ==
/// Serializes the wrapped value through [`LosslessSerializer`] at every depth.
struct Lossless<'a, T: ?Sized>(&'a T);

impl<T: Serialize + ?Sized> Serialize for Lossless<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(LosslessSerializer(serializer))
    }
}

fn non_finite_tag(v: f64) -> &'static str {
    if v.is_nan() {
        "NaN"
    } else if v > 0.0 {
        "inf"
    } else {
        "-inf"
    }
}

/// Forwards to the inner serializer, tagging floats and options on the way.
struct LosslessSerializer<S>(S);

impl<S: Serializer> Serializer for LosslessSerializer<S> {
    type Ok = S::Ok;
    type Error = S::Error;
    type SerializeSeq = LosslessCompound<S::SerializeSeq>;
    type SerializeTuple = LosslessCompound<S::SerializeTuple>;
    type SerializeTupleStruct = LosslessCompound<S::SerializeTupleStruct>;
    type SerializeTupleVariant = LosslessCompound<S::SerializeTupleVariant>;
    type SerializeMap = LosslessCompound<S::SerializeMap>;
    type SerializeStruct = LosslessCompound<S::SerializeStruct>;
    type SerializeStructVariant = LosslessCompound<S::SerializeStructVariant>;

    fn serialize_bool(self, v: bool) -> Result<S::Ok, S::Error> {
        self.0.serialize_bool(v)
    }

    fn serialize_i8(self, v: i8) -> Result<S::Ok, S::Error> {
        self.0.serialize_i8(v)
    }

    fn serialize_i16(self, v: i16) -> Result<S::Ok, S::Error> {
        self.0.serialize_i16(v)
    }

    fn serialize_i32(self, v: i32) -> Result<S::Ok, S::Error> {
        self.0.serialize_i32(v)
    }

    fn serialize_i64(self, v: i64) -> Result<S::Ok, S::Error> {
        self.0.serialize_i64(v)
    }

    fn serialize_i128(self, v: i128) -> Result<S::Ok, S::Error> {
        self.0.serialize_i128(v)
    }

    fn serialize_u8(self, v: u8) -> Result<S::Ok, S::Error> {
        self.0.serialize_u8(v)
    }

    fn serialize_u16(self, v: u16) -> Result<S::Ok, S::Error> {
        self.0.serialize_u16(v)
    }

    fn serialize_u32(self, v: u32) -> Result<S::Ok, S::Error> {
        self.0.serialize_u32(v)
    }

    fn serialize_u64(self, v: u64) -> Result<S::Ok, S::Error> {
        self.0.serialize_u64(v)
    }

    fn serialize_u128(self, v: u128) -> Result<S::Ok, S::Error> {
        self.0.serialize_u128(v)
    }

    fn serialize_f32(self, v: f32) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            self.0.serialize_f32(v)
        } else {
            self.0.serialize_str(non_finite_tag(f64::from(v)))
        }
    }

    fn serialize_f64(self, v: f64) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            self.0.serialize_f64(v)
        } else {
            self.0.serialize_str(non_finite_tag(v))
        }
    }

    fn serialize_char(self, v: char) -> Result<S::Ok, S::Error> {
        self.0.serialize_char(v)
    }

    fn serialize_str(self, v: &str) -> Result<S::Ok, S::Error> {
        self.0.serialize_str(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<S::Ok, S::Error> {
        self.0.serialize_bytes(v)
    }

    fn serialize_none(self) -> Result<S::Ok, S::Error> {
        self.0.serialize_none()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<S::Ok, S::Error> {
        self.0
            .serialize_newtype_variant("Option", 1, "Some", &Lossless(value))
    }

    fn serialize_unit(self) -> Result<S::Ok, S::Error> {
        self.0.serialize_unit()
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<S::Ok, S::Error> {
        self.0.serialize_unit_struct(name)
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        index: u32,
        variant: &'static str,
    ) -> Result<S::Ok, S::Error> {
        self.0.serialize_unit_variant(name, index, variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<S::Ok, S::Error> {
        self.0.serialize_newtype_struct(name, &Lossless(value))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<S::Ok, S::Error> {
        self.0
            .serialize_newtype_variant(name, index, variant, &Lossless(value))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, S::Error> {
        self.0.serialize_seq(len).map(LosslessCompound)
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, S::Error> {
        self.0.serialize_tuple(len).map(LosslessCompound)
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, S::Error> {
        self.0.serialize_tuple_struct(name, len).map(LosslessCompound)
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, S::Error> {
        self.0
            .serialize_tuple_variant(name, index, variant, len)
            .map(LosslessCompound)
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, S::Error> {
        self.0.serialize_map(len).map(LosslessCompound)
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, S::Error> {
        self.0.serialize_struct(name, len).map(LosslessCompound)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, S::Error> {
        self.0
            .serialize_struct_variant(name, index, variant, len)
            .map(LosslessCompound)
    }

    fn is_human_readable(&self) -> bool {
        self.0.is_human_readable()
    }
}

/// Compound state of [`LosslessSerializer`]; wraps every nested value.
struct LosslessCompound<C>(C);

impl<C: ser::SerializeSeq> ser::SerializeSeq for LosslessCompound<C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), C::Error> {
        self.0.serialize_element(&Lossless(value))
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C: ser::SerializeTuple> ser::SerializeTuple for LosslessCompound<C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), C::Error> {
        self.0.serialize_element(&Lossless(value))
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C: ser::SerializeTupleStruct> ser::SerializeTupleStruct for LosslessCompound<C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), C::Error> {
        self.0.serialize_field(&Lossless(value))
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C: ser::SerializeTupleVariant> ser::SerializeTupleVariant for LosslessCompound<C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), C::Error> {
        self.0.serialize_field(&Lossless(value))
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C: ser::SerializeMap> ser::SerializeMap for LosslessCompound<C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), C::Error> {
        self.0.serialize_key(&Lossless(key))
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), C::Error> {
        self.0.serialize_value(&Lossless(value))
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C: ser::SerializeStruct> ser::SerializeStruct for LosslessCompound<C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), C::Error> {
        self.0.serialize_field(key, &Lossless(value))
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), C::Error> {
        self.0.skip_field(key)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C: ser::SerializeStructVariant> ser::SerializeStructVariant for LosslessCompound<C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), C::Error> {
        self.0.serialize_field(key, &Lossless(value))
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), C::Error> {
        self.0.skip_field(key)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.0.end()
    }
}
