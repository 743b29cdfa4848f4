//! Name ↔ representation registry for box types.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use super::{BoxList, FromRaw, HorizontalBoxes, RawBoxes, RotatedBoxes};
use crate::error::DetError;

/// A handle to one concrete box representation.
///
/// Two handles are equal when they describe the same Rust type.
#[derive(Clone, Copy)]
pub struct BoxRepr {
    type_id: TypeId,
    type_name: &'static str,
    box_dim: usize,
    build: fn(RawBoxes) -> Result<Box<dyn BoxList>, DetError>,
}

impl BoxRepr {
    /// The handle for representation `T`.
    pub fn of<T: FromRaw>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            box_dim: T::BOX_DIM,
            build: build_boxed::<T>,
        }
    }

    /// Wraps a raw array as this representation, taking ownership of its buffer.
    pub fn build(&self, raw: RawBoxes) -> Result<Box<dyn BoxList>, DetError> {
        (self.build)(raw)
    }

    /// Returns true if `boxes` is an instance of this representation.
    pub fn matches(&self, boxes: &dyn BoxList) -> bool {
        boxes.as_any().type_id() == self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn box_dim(&self) -> usize {
        self.box_dim
    }
}

fn build_boxed<T: FromRaw>(raw: RawBoxes) -> Result<Box<dyn BoxList>, DetError> {
    Ok(Box::new(T::from_raw(raw)?))
}

impl PartialEq for BoxRepr {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for BoxRepr {}

impl fmt::Debug for BoxRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxRepr")
            .field("type_name", &self.type_name)
            .field("box_dim", &self.box_dim)
            .finish()
    }
}

/// Lookup key for [`BoxTypeRegistry::resolve`]: a name or a representation.
#[derive(Clone, Copy, Debug)]
pub enum BoxTypeRef<'a> {
    Name(&'a str),
    Repr(BoxRepr),
}

impl<'a> From<&'a str> for BoxTypeRef<'a> {
    fn from(name: &'a str) -> Self {
        BoxTypeRef::Name(name)
    }
}

impl<'a> From<&'a String> for BoxTypeRef<'a> {
    fn from(name: &'a String) -> Self {
        BoxTypeRef::Name(name.as_str())
    }
}

impl From<BoxRepr> for BoxTypeRef<'_> {
    fn from(repr: BoxRepr) -> Self {
        BoxTypeRef::Repr(repr)
    }
}

/// A bijection between lower-cased box type names and representations.
///
/// Populate the registry once at startup, then share it by reference: all
/// lookups take `&self`, and registration takes `&mut self`, so the borrow
/// checker keeps registration out of concurrent iteration.
#[derive(Debug, Default)]
pub struct BoxTypeRegistry {
    by_name: HashMap<String, BoxRepr>,
    by_type: HashMap<TypeId, String>,
}

impl BoxTypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `hbox` and `rbox` representations.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert("hbox".to_string(), BoxRepr::of::<HorizontalBoxes>());
        registry.insert("rbox".to_string(), BoxRepr::of::<RotatedBoxes>());
        registry
    }

    /// Registers `repr` under `name`.
    ///
    /// Fails with [`DetError::Conflict`] if either side is already taken and
    /// `force` is false. With `force`, every entry touching `name` or `repr`
    /// is removed in both directions before inserting.
    pub fn register(&mut self, name: &str, repr: BoxRepr, force: bool) -> Result<(), DetError> {
        let name = name.to_lowercase();
        let name_taken = self.by_name.contains_key(&name);
        let repr_taken = self.by_type.contains_key(&repr.type_id);

        if !force && (name_taken || repr_taken) {
            return Err(DetError::Conflict { name });
        }

        if let Some(old) = self.by_name.remove(&name) {
            warn!(name = %name, old = old.type_name, new = repr.type_name, "overriding box type");
            self.by_type.remove(&old.type_id);
        }
        if let Some(old_name) = self.by_type.remove(&repr.type_id) {
            warn!(old_name = %old_name, name = %name, repr = repr.type_name, "renaming box type");
            self.by_name.remove(&old_name);
        }

        self.insert(name, repr);
        Ok(())
    }

    /// Registers representation `T` under `name` and returns its handle.
    pub fn register_type<T: FromRaw>(&mut self, name: &str, force: bool) -> Result<BoxRepr, DetError> {
        let repr = BoxRepr::of::<T>();
        self.register(name, repr, force)?;
        Ok(repr)
    }

    fn insert(&mut self, name: String, repr: BoxRepr) {
        debug!(name = %name, repr = repr.type_name, "registered box type");
        self.by_type.insert(repr.type_id, name.clone());
        self.by_name.insert(name, repr);
    }

    /// Resolves a name or a representation into both halves of its entry.
    pub fn resolve<'a>(
        &self,
        query: impl Into<BoxTypeRef<'a>>,
    ) -> Result<(String, BoxRepr), DetError> {
        match query.into() {
            BoxTypeRef::Name(name) => {
                let name = name.to_lowercase();
                match self.by_name.get(&name) {
                    Some(repr) => Ok((name, *repr)),
                    None => Err(DetError::NotRegistered(name)),
                }
            }
            BoxTypeRef::Repr(repr) => match self.by_type.get(&repr.type_id) {
                Some(name) => Ok((name.clone(), repr)),
                None => Err(DetError::NotRegistered(repr.type_name.to_string())),
            },
        }
    }

    /// Resolves a configuration value. Only strings name a box type.
    pub fn resolve_value(&self, value: &serde_json::Value) -> Result<(String, BoxRepr), DetError> {
        match value {
            serde_json::Value::String(name) => self.resolve(name.as_str()),
            other => Err(DetError::InvalidInput(format!(
                "box_type must be a registered name, but got {other}"
            ))),
        }
    }

    /// The registered name of a typed box list, if its representation is known.
    pub fn name_of(&self, boxes: &dyn BoxList) -> Option<&str> {
        self.by_type
            .get(&boxes.as_any().type_id())
            .map(String::as_str)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
