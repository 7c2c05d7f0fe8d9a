//! Polymorphic value slot.

use std::{
    any::{type_name, Any},
    fmt,
};

struct Boxed {
    value: Box<dyn Any + Send + Sync>,
    name: &'static str,
}

/// A nullable value whose concrete type is only known at runtime.
///
/// `Dynamic` is the root of every envelope: serializing a `Dynamic` writes the registered id of
/// the contained value's type (or `0` for null) followed by that type's payload. Fields declared
/// as `Dynamic` are always enveloped.
#[derive(Default)]
pub struct Dynamic(Option<Boxed>);

impl Dynamic {
    /// Wraps a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Boxed {
            value: Box::new(value),
            name: type_name::<T>(),
        }))
    }

    /// Returns the null value.
    pub fn null() -> Self {
        Self(None)
    }

    pub(crate) fn from_boxed(value: Box<dyn Any + Send + Sync>, name: &'static str) -> Self {
        Self(Some(Boxed { value, name }))
    }

    /// Returns whether the slot is null.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the name of the contained value's type.
    pub fn type_name(&self) -> Option<&'static str> {
        self.0.as_ref().map(|boxed| boxed.name)
    }

    /// Returns the contained value.
    pub fn value(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.0.as_ref().map(|boxed| boxed.value.as_ref())
    }

    /// Returns whether the contained value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Returns a reference to the contained value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value()?.downcast_ref::<T>()
    }

    /// Returns a mutable reference to the contained value if it is a `T`.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.as_mut()?.value.downcast_mut::<T>()
    }

    /// Unwraps the contained value if it is a `T`, returning the slot unchanged otherwise.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let Some(Boxed { value, name }) = self.0 else {
            return Err(Self(None));
        };
        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self(Some(Boxed { value, name }))),
        }
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_name() {
            Some(name) => write!(f, "Dynamic({name})"),
            None => f.write_str("Dynamic(null)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null() {
        let value = Dynamic::null();
        assert!(value.is_null());
        assert!(value.type_name().is_none());
        assert!(value.downcast_ref::<u32>().is_none());
        assert_eq!(format!("{value:?}"), "Dynamic(null)");
    }

    #[test]
    fn test_downcast() {
        let mut value = Dynamic::new(7u32);
        assert!(value.is::<u32>());
        assert!(!value.is::<u64>());
        *value.downcast_mut::<u32>().unwrap() += 1;
        assert_eq!(value.downcast_ref::<u32>(), Some(&8));

        let value = value.downcast::<String>().unwrap_err();
        assert_eq!(value.type_name(), Some("u32"));
        assert_eq!(value.downcast::<u32>().unwrap(), 8);
    }
}
