//! Runtime constant pool of a class.
//!
//! Entries hold symbolic references as they appear in the class file.
//! Method and field references resolve against the [`MethodArea`] on first
//! use and the result is memoized per entry, so later resolutions are a
//! plain load.
use std::sync::{Arc, OnceLock};

use crate::error::{Result, RuntimeError};
use crate::program::{Method, MethodArea};

/// Symbolic reference to a class member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(class: &str, name: &str, descriptor: &str) -> Self {
        Self {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

/// Constant pool entry. Only the tags the invoke and field instructions
/// read are modeled.
#[derive(Debug, Clone)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    FieldRef(MemberRef),
    MethodRef(MemberRef),
    InterfaceMethodRef(MemberRef),
}

/// Result of resolving a member reference.
#[derive(Debug, Clone)]
enum Resolved {
    Method(Arc<Method>),
    Field(usize),
}

#[derive(Debug)]
struct Entry {
    constant: Constant,
    resolved: OnceLock<Resolved>,
}

/// Constant pool, indexed from 1 like in the class file.
#[derive(Debug, Default)]
pub struct ConstantPool {
    entries: Vec<Entry>,
}

impl ConstantPool {
    pub fn new(constants: Vec<Constant>) -> Self {
        Self {
            entries: constants
                .into_iter()
                .map(|constant| Entry {
                    constant,
                    resolved: OnceLock::new(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, index: u16) -> Result<&Entry> {
        (index as usize)
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .ok_or(RuntimeError::InvalidConstantIndex(index))
    }

    /// Returns the symbolic constant at `index`.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        Ok(&self.entry(index)?.constant)
    }

    /// Whether the entry at `index` has already been resolved.
    pub fn is_resolved(&self, index: u16) -> bool {
        self.entry(index)
            .map(|entry| entry.resolved.get().is_some())
            .unwrap_or(false)
    }

    /// Resolve a method reference to the concrete method, searching the
    /// referenced class and then its superclasses.
    pub fn resolve_method(&self, index: u16, area: &MethodArea) -> Result<Arc<Method>> {
        let entry = self.entry(index)?;
        if let Some(Resolved::Method(method)) = entry.resolved.get() {
            return Ok(Arc::clone(method));
        }
        let member = match &entry.constant {
            Constant::MethodRef(member) | Constant::InterfaceMethodRef(member) => member,
            _ => {
                return Err(RuntimeError::UnexpectedConstant {
                    index,
                    expected: "method reference",
                })
            }
        };
        let method = area.find_method(&member.class, &member.name, &member.descriptor)?;
        let _ = entry.resolved.set(Resolved::Method(Arc::clone(&method)));
        Ok(method)
    }

    /// Resolve a field reference to the field's slot in object storage.
    pub fn resolve_field(&self, index: u16, area: &MethodArea) -> Result<usize> {
        let entry = self.entry(index)?;
        if let Some(Resolved::Field(slot)) = entry.resolved.get() {
            return Ok(*slot);
        }
        let member = match &entry.constant {
            Constant::FieldRef(member) => member,
            _ => {
                return Err(RuntimeError::UnexpectedConstant {
                    index,
                    expected: "field reference",
                })
            }
        };
        let class = area.get(&member.class)?;
        let slot = class
            .find_field(&member.name)
            .map(|field| field.slot())
            .ok_or_else(|| RuntimeError::FieldNotFound {
                class: member.class.clone(),
                name: member.name.clone(),
            })?;
        let _ = entry.resolved.set(Resolved::Field(slot));
        Ok(slot)
    }
}
