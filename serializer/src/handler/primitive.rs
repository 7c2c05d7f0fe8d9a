use super::{unsupported, Codegen, Handler, StaticHandler};
use crate::{
    codec::{Read, Write},
    info::TypeInfo,
    primitives::{self, Decimal},
    routine::{ReadFn, WriteFn},
    Error, Serializer,
};
use bytes::{Buf, BufMut, Bytes};
use std::any::{type_name, Any, TypeId};

type LeafWrite = fn(&Serializer, &mut dyn BufMut, &dyn Any) -> Result<(), Error>;
type LeafRead = fn(&Serializer, &mut dyn Buf, &mut dyn Any) -> Result<(), Error>;

fn write_leaf<T: Write + Any>(
    _: &Serializer,
    buf: &mut dyn BufMut,
    value: &dyn Any,
) -> Result<(), Error> {
    let value = value
        .downcast_ref::<T>()
        .ok_or(Error::TypeMismatch(type_name::<T>()))?;
    value.write(buf);
    Ok(())
}

/// Text and byte arrays, whose length field can overflow.
trait Framed: Any {
    fn write_framed(&self, buf: &mut dyn BufMut) -> Result<(), Error>;
}

impl Framed for String {
    fn write_framed(&self, buf: &mut dyn BufMut) -> Result<(), Error> {
        primitives::write_str(Some(self), buf)
    }
}

impl Framed for Option<String> {
    fn write_framed(&self, buf: &mut dyn BufMut) -> Result<(), Error> {
        primitives::write_str(self.as_deref(), buf)
    }
}

impl Framed for Vec<u8> {
    fn write_framed(&self, buf: &mut dyn BufMut) -> Result<(), Error> {
        primitives::write_bytes(Some(self), buf)
    }
}

impl Framed for Option<Vec<u8>> {
    fn write_framed(&self, buf: &mut dyn BufMut) -> Result<(), Error> {
        primitives::write_bytes(self.as_deref(), buf)
    }
}

impl Framed for Bytes {
    fn write_framed(&self, buf: &mut dyn BufMut) -> Result<(), Error> {
        primitives::write_bytes(Some(self), buf)
    }
}

fn write_framed_leaf<T: Framed>(
    _: &Serializer,
    buf: &mut dyn BufMut,
    value: &dyn Any,
) -> Result<(), Error> {
    value
        .downcast_ref::<T>()
        .ok_or(Error::TypeMismatch(type_name::<T>()))?
        .write_framed(buf)
}

fn read_leaf<T: Read + Any>(
    _: &Serializer,
    buf: &mut dyn Buf,
    slot: &mut dyn Any,
) -> Result<(), Error> {
    let slot = slot
        .downcast_mut::<T>()
        .ok_or(Error::TypeMismatch(type_name::<T>()))?;
    *slot = T::read(buf)?;
    Ok(())
}

/// Returns the leaf routines of a type with a built-in encoding.
fn leaf(id: TypeId) -> Option<(LeafWrite, LeafRead)> {
    macro_rules! table {
        ($write:ident: $($type:ty),* $(,)?) => {
            $(
                if id == TypeId::of::<$type>() {
                    return Some((
                        $write::<$type> as LeafWrite,
                        read_leaf::<$type> as LeafRead,
                    ));
                }
            )*
        };
    }
    table!(write_leaf: bool, u8, i8, char, u16, i16, u32, i32, u64, i64, f32, f64, Decimal);
    table!(write_framed_leaf: String, Option<String>, Vec<u8>, Option<Vec<u8>>, Bytes);
    None
}

/// Serializes types with a fixed leaf encoding (see [crate::primitives]).
///
/// Strings and byte arrays are claimed here (including their `Option` forms), ahead of the
/// array and nullable handlers.
pub struct PrimitiveHandler;

impl Handler for PrimitiveHandler {
    fn name(&self) -> &'static str {
        "primitive"
    }

    fn handles(&self, info: &TypeInfo) -> bool {
        leaf(info.id()).is_some()
    }

    fn subtypes(&self, _: &TypeInfo) -> Vec<TypeInfo> {
        Vec::new()
    }

    fn codegen(&self) -> Codegen<'_> {
        Codegen::Static(self)
    }
}

impl StaticHandler for PrimitiveHandler {
    fn writer(&self, info: &TypeInfo) -> Result<WriteFn, Error> {
        let (write, _) = leaf(info.id()).ok_or_else(|| unsupported(self, info))?;
        Ok(Box::new(write))
    }

    fn reader(&self, info: &TypeInfo) -> Result<ReadFn, Error> {
        let (_, read) = leaf(info.id()).ok_or_else(|| unsupported(self, info))?;
        Ok(Box::new(read))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reflect;

    #[test]
    fn test_claims_text_and_bytes() {
        let handler = PrimitiveHandler;
        for info in [
            u64::type_info(),
            String::type_info(),
            Option::<String>::type_info(),
            Vec::<u8>::type_info(),
            Option::<Vec<u8>>::type_info(),
            Bytes::type_info(),
            Decimal::type_info(),
        ] {
            assert!(handler.handles(&info), "{}", info.name());
        }
        for info in [Vec::<u16>::type_info(), Option::<u8>::type_info()] {
            assert!(!handler.handles(&info), "{}", info.name());
        }
    }
}
