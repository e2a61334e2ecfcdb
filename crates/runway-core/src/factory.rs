//! Type-keyed service constructors.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Constructor = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// Registry of constructors keyed by the type they build.
#[derive(Clone, Default)]
pub struct Factories {
    constructors: HashMap<TypeId, (&'static str, Constructor)>,
}

impl Factories {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` as the constructor for `T`, replacing any earlier one.
    pub fn register<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(move || Box::new(factory()));
        self.constructors
            .insert(TypeId::of::<T>(), (type_name::<T>(), constructor));
        self
    }

    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.constructors.contains_key(&TypeId::of::<T>())
    }

    /// Build a `T` if a constructor is registered for it.
    #[must_use]
    pub fn build<T: 'static>(&self) -> Option<T> {
        let (_, constructor) = self.constructors.get(&TypeId::of::<T>())?;
        constructor().downcast::<T>().ok().map(|boxed| *boxed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for Factories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.constructors.values().map(|(name, _)| name))
            .finish()
    }
}

/// Build a `T` from the first registry that knows it, else `T::default()`.
pub(crate) fn make_service<T: Default + 'static>(chain: &[&Factories]) -> T {
    chain
        .iter()
        .find_map(|factories| factories.build::<T>())
        .unwrap_or_default()
}
