//! Option declarations and the schemas that own them.
//!
//! A [`Schema`] plays the role of a config "class": an ordered set of
//! options, each addressed by an attribute name (typed access) and a key
//! name (storage in the data map). Schemas can extend other schemas; an
//! override must keep the attribute/key pairing of what it overrides.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::kind::OptionType;

/// Declaration of a single option, consumed by [`SchemaBuilder::option`].
#[derive(Debug, Clone)]
pub struct Opt {
    attr: String,
    key: Option<String>,
    ty: OptionType,
    default: Option<Value>,
    doc: Option<String>,
    section: bool,
}

impl Opt {
    /// Declare an option of type `any` stored under its attribute name.
    pub fn new(attr: impl Into<String>) -> Self {
        Self {
            attr: attr.into(),
            key: None,
            ty: OptionType::Any,
            default: None,
            doc: None,
            section: false,
        }
    }

    /// Declare a nested-config option.
    ///
    /// Its default is always an empty config of `schema`.
    pub fn section(attr: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self {
            ty: OptionType::Section(schema),
            section: true,
            ..Self::new(attr)
        }
    }

    /// Store the value under `key` instead of the attribute name.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn ty(mut self, ty: OptionType) -> Self {
        self.ty = ty;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// An option as resolved inside its schema.
#[derive(Debug, Clone)]
pub struct OptionDef {
    attr: String,
    name: String,
    ty: OptionType,
    default: Option<Value>,
    doc: Option<String>,
    allow_empty: bool,
}

impl OptionDef {
    /// Attribute name used for typed access.
    #[must_use]
    pub fn attr(&self) -> &str {
        &self.attr
    }

    /// Key name used in the data map.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn ty(&self) -> &OptionType {
        &self.ty
    }

    #[must_use]
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Whether the option resolves to `null` when no default is declared.
    #[must_use]
    pub const fn allow_empty(&self) -> bool {
        self.allow_empty
    }

    #[must_use]
    pub const fn is_section(&self) -> bool {
        matches!(self.ty, OptionType::Section(_))
    }

    /// The value an unset option resolves to.
    ///
    /// # Errors
    ///
    /// `ConfigError::Required` when there is no default and the type does
    /// not accept `null`.
    pub fn default_value(&self) -> Result<Value, ConfigError> {
        match &self.default {
            Some(value) => Ok(value.clone()),
            None if self.allow_empty => Ok(Value::Null),
            None => Err(ConfigError::Required {
                name: self.attr.clone(),
            }),
        }
    }
}

/// Ordered set of options describing one kind of config.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    doc: Option<String>,
    options: Vec<OptionDef>,
    by_attr: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            doc: None,
            inherited: Vec::new(),
            declared: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Options in declaration order, inherited ones first.
    pub fn options(&self) -> impl Iterator<Item = &OptionDef> {
        self.options.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    #[must_use]
    pub fn option(&self, attr: &str) -> Option<&OptionDef> {
        self.by_attr.get(attr).map(|&idx| &self.options[idx])
    }

    #[must_use]
    pub fn option_by_name(&self, name: &str) -> Option<&OptionDef> {
        self.by_name.get(name).map(|&idx| &self.options[idx])
    }

    /// Check `value` against the option stored under `name`.
    ///
    /// Keys that are not options are implicitly `any`.
    pub fn check_type(&self, name: &str, value: &Value) -> Result<(), ConfigError> {
        match self.option_by_name(name) {
            Some(option) => option.ty.check(name, value),
            None => Ok(()),
        }
    }
}

/// Builder returned by [`Schema::builder`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    doc: Option<String>,
    inherited: Vec<OptionDef>,
    declared: Vec<Opt>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Inherit every option of `parent`.
    #[must_use]
    pub fn extends(mut self, parent: &Schema) -> Self {
        self.inherited.extend(parent.options.iter().cloned());
        self
    }

    #[must_use]
    pub fn option(mut self, opt: Opt) -> Self {
        self.declared.push(opt);
        self
    }

    /// Resolve declarations into a schema.
    ///
    /// # Errors
    ///
    /// - `MismatchedOverride` when an attribute or key is rebound to a
    ///   different partner.
    /// - `DefaultNotAllowed` for a section with an explicit default.
    /// - `TypeMismatch` when a default does not match its option type.
    pub fn build(self) -> Result<Arc<Schema>, ConfigError> {
        let mut schema = Schema {
            name: self.name,
            doc: self.doc,
            options: Vec::new(),
            by_attr: HashMap::new(),
            by_name: HashMap::new(),
        };

        for def in self.inherited {
            schema.insert(def);
        }

        for opt in self.declared {
            let name = opt.key.clone().unwrap_or_else(|| opt.attr.clone());

            if let Some(existing) = schema.option(&opt.attr) {
                if existing.name != name {
                    return Err(ConfigError::MismatchedOverride {
                        schema: schema.name.clone(),
                        on: opt.attr,
                        existing: existing.name.clone(),
                        declared: name,
                    });
                }
            }

            if let Some(existing) = schema.option_by_name(&name) {
                if existing.attr != opt.attr {
                    return Err(ConfigError::MismatchedOverride {
                        schema: schema.name.clone(),
                        on: name,
                        existing: existing.attr.clone(),
                        declared: opt.attr,
                    });
                }
            }

            schema.insert(resolve(opt, name)?);
        }

        Ok(Arc::new(schema))
    }
}

impl Schema {
    fn insert(&mut self, def: OptionDef) {
        if let Some(&idx) = self.by_attr.get(&def.attr) {
            self.by_name.remove(&self.options[idx].name);
            self.by_name.insert(def.name.clone(), idx);
            self.options[idx] = def;
        } else {
            let idx = self.options.len();
            self.by_attr.insert(def.attr.clone(), idx);
            self.by_name.insert(def.name.clone(), idx);
            self.options.push(def);
        }
    }
}

fn resolve(opt: Opt, name: String) -> Result<OptionDef, ConfigError> {
    let mut doc = opt.doc;
    let explicit_default = opt.default.is_some();
    // An explicit `null` default means "no default".
    let mut default = opt.default.filter(|value| !value.is_null());

    if opt.section {
        if explicit_default {
            return Err(ConfigError::DefaultNotAllowed { attr: opt.attr });
        }
        default = Some(Value::Object(Map::new()));
        if doc.is_none() {
            if let OptionType::Section(nested) = &opt.ty {
                doc = nested.doc.clone();
            }
        }
    }

    let allow_empty = match &default {
        Some(value) => {
            opt.ty.check(&format!("{name}[default]"), value)?;
            false
        }
        None => opt.ty.accepts_null(),
    };

    Ok(OptionDef {
        attr: opt.attr,
        name,
        ty: opt.ty,
        default,
        doc,
        allow_empty,
    })
}
