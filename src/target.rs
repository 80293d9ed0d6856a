use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::properties::PropertyValue;

/// Capability interface for anything the engine can animate.
///
/// The engine only ever reads and writes named properties; it never assumes a
/// widget, a style object, or any other concrete host type.
pub trait AnimTarget: Send {
    fn get(&self, name: &str) -> Option<PropertyValue>;
    fn set(&mut self, name: &str, value: PropertyValue);
}

/// Shared handle to a target. The scheduler mutates it at tick time; callers
/// may read current values from the same handle between ticks.
pub type SharedTarget = Arc<Mutex<dyn AnimTarget>>;

/// Plain property-bag target for hosts without their own bag type, and for
/// tests and demos.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    values: HashMap<String, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn into_shared(self) -> SharedTarget {
        Arc::new(Mutex::new(self))
    }
}

impl AnimTarget for PropertyBag {
    fn get(&self, name: &str) -> Option<PropertyValue> {
        self.values.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: PropertyValue) {
        self.values.insert(name.to_string(), value);
    }
}

/// Read a single property back out of a shared target.
pub fn read_property(target: &SharedTarget, name: &str) -> Option<PropertyValue> {
    let guard = match target.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.get(name)
}
