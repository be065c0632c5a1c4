//! Abstract representation of loaded Java classes: methods, fields, heap
//! objects and the method area that holds them.
//!
//! The engine only reads this metadata. Classes are assembled once, either
//! by a class loader or with [`ClassBuilder`], and are immutable afterwards
//! apart from the lazily filled constant pool caches.
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

use crate::constant_pool::{Constant, ConstantPool};
use crate::error::{Result, RuntimeError};
use crate::value::{ObjectRef, Value};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_NATIVE: u16 = 0x0100;

/// Primitive types supported by the JVM.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BaseTypeKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Reference,
    Void,
}

/// JVM value type as written in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Reference(String),
    Array(Box<Type>),
    Void,
}

impl Type {
    pub fn kind(&self) -> BaseTypeKind {
        match self {
            Self::Boolean => BaseTypeKind::Boolean,
            Self::Byte => BaseTypeKind::Byte,
            Self::Char => BaseTypeKind::Char,
            Self::Short => BaseTypeKind::Short,
            Self::Int => BaseTypeKind::Int,
            Self::Long => BaseTypeKind::Long,
            Self::Float => BaseTypeKind::Float,
            Self::Double => BaseTypeKind::Double,
            Self::Reference(_) | Self::Array(_) => BaseTypeKind::Reference,
            Self::Void => BaseTypeKind::Void,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Zero value a freshly allocated field of this type holds.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Boolean => Value::Boolean(false),
            Self::Byte => Value::Byte(0),
            Self::Char => Value::Char(0),
            Self::Short => Value::Short(0),
            Self::Int => Value::Int(0),
            Self::Long => Value::Long(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::Reference(_) | Self::Array(_) => Value::Null,
            Self::Void => Value::Uninitialized,
        }
    }

    /// Parse a single field descriptor such as `I` or `[Ljava/lang/String;`.
    pub fn parse_field(descriptor: &str) -> Result<Self> {
        let mut chars = descriptor.chars();
        let t = decode_type(&mut chars)
            .ok_or_else(|| RuntimeError::MalformedDescriptor(descriptor.to_string()))?;
        if chars.next().is_some() {
            return Err(RuntimeError::MalformedDescriptor(descriptor.to_string()));
        }
        Ok(t)
    }
}

/// Decode the next field type off a descriptor character stream.
fn decode_type(chars: &mut std::str::Chars) -> Option<Type> {
    let t = match chars.next()? {
        'Z' => Type::Boolean,
        'B' => Type::Byte,
        'C' => Type::Char,
        'S' => Type::Short,
        'I' => Type::Int,
        'J' => Type::Long,
        'F' => Type::Float,
        'D' => Type::Double,
        'L' => {
            let rest = chars.as_str();
            let end = rest.find(';').filter(|end| *end > 0)?;
            *chars = rest[end + 1..].chars();
            Type::Reference(rest[..end].to_string())
        }
        '[' => Type::Array(Box::new(decode_type(chars)?)),
        _ => return None,
    };
    Some(t)
}

static METHOD_DESCRIPTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(([^)]*)\)(.+)$").expect("method descriptor pattern"));

/// Parse a method descriptor, returns a tuple of argument types and
/// return type.
pub fn parse_method_types(descriptor: &str) -> Result<(Vec<Type>, Type)> {
    let malformed = || RuntimeError::MalformedDescriptor(descriptor.to_string());
    let caps = METHOD_DESCRIPTOR
        .captures(descriptor).ok_or_else(malformed)?;
    let arg_string = caps.get(1).map_or("", |m| m.as_str());
    let return_type_string = caps.get(2).map_or("", |m| m.as_str());

    let mut types = Vec::new();
    let mut chars = arg_string.chars();
    while !chars.as_str().is_empty() {
        types.push(decode_type(&mut chars).ok_or_else(malformed)?);
    }
    let ret_type = match return_type_string {
        "V" => Type::Void,
        other => Type::parse_field(other).map_err(|_| malformed())?,
    };
    Ok((types, ret_type))
}

/// Java class method representation for the interpreter.
pub struct Method {
    name: String,
    descriptor: String,
    class_name: String,
    arg_types: Vec<Type>,
    return_type: Type,
    access_flags: u16,
    max_stack: u16,
    max_locals: u16,
    class: Weak<Class>,
}

impl Method {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Internal name of the declaring class.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Key used by method tables: name followed by descriptor.
    pub fn signature_key(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }

    pub fn parameter_types(&self) -> &[Type] {
        &self.arg_types
    }

    /// Number of declared parameters, receiver excluded.
    pub fn parameter_count(&self) -> usize {
        self.arg_types.len()
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_native(&self) -> bool {
        self.access_flags & ACC_NATIVE != 0
    }

    pub fn max_stack(&self) -> usize {
        self.max_stack as usize
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals as usize
    }

    /// Returns the declaring class.
    pub fn class(&self) -> Result<Arc<Class>> {
        self.class
            .upgrade()
            .ok_or_else(|| RuntimeError::Unlinked(self.to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}{}", self.class_name, self.name, self.descriptor)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Method")
            .field("method", &format_args!("{self}"))
            .field("access_flags", &self.access_flags)
            .field("max_stack", &self.max_stack)
            .field("max_locals", &self.max_locals)
            .finish()
    }
}

/// Instance field with its slot in object field storage.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    field_type: Type,
    slot: usize,
}

impl Field {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// A loaded class.
pub struct Class {
    name: String,
    super_class: Option<Arc<Class>>,
    constant_pool: ConstantPool,
    methods: HashMap<String, Arc<Method>>,
    fields: Vec<Field>,
}

impl Class {
    /// Internal name, e.g. `java/lang/Object`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn super_class(&self) -> Option<&Arc<Class>> {
        self.super_class.as_ref()
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    /// Find a method by name and descriptor, walking up the inheritance
    /// chain from this class.
    pub fn find_method(&self, name_and_descriptor: &str) -> Option<Arc<Method>> {
        let mut class = Some(self);
        while let Some(c) = class {
            if let Some(method) = c.methods.get(name_and_descriptor) {
                return Some(Arc::clone(method));
            }
            class = c.super_class.as_deref();
        }
        None
    }

    /// Like [`Class::find_method`] but only instance methods match, so a
    /// static method in a subclass never hides an inherited implementation.
    pub fn find_virtual_method(&self, name_and_descriptor: &str) -> Option<Arc<Method>> {
        let mut class = Some(self);
        while let Some(c) = class {
            match c.methods.get(name_and_descriptor) {
                Some(method) if !method.is_static() => return Some(Arc::clone(method)),
                _ => class = c.super_class.as_deref(),
            }
        }
        None
    }

    /// Find an instance field by name, walking up the inheritance chain.
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        let mut class = Some(self);
        while let Some(c) = class {
            if let Some(field) = c.fields.iter().find(|f| f.name == name) {
                return Some(field);
            }
            class = c.super_class.as_deref();
        }
        None
    }

    /// Number of instance field slots, inherited ones included.
    pub fn instance_field_count(&self) -> usize {
        self.super_class
            .as_ref()
            .map_or(0, |s| s.instance_field_count())
            + self.fields.len()
    }

    /// Whether this class is `other` or one of its subclasses.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if std::ptr::eq(c, other) {
                return true;
            }
            class = c.super_class.as_deref();
        }
        false
    }

    fn field_defaults(&self, out: &mut Vec<Value>) {
        if let Some(super_class) = &self.super_class {
            super_class.field_defaults(out);
        }
        out.extend(self.fields.iter().map(|f| f.field_type.default_value()));
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("super_class", &self.super_class.as_ref().map(|s| s.name()))
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("fields", &self.fields)
            .finish()
    }
}

/// Declaration of a method handed to [`ClassBuilder`].
#[derive(Debug, Clone)]
pub struct MethodDef {
    name: String,
    descriptor: String,
    access_flags: u16,
    max_stack: u16,
    max_locals: u16,
}

impl MethodDef {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags: ACC_PUBLIC,
            max_stack: 0,
            max_locals: 0,
        }
    }

    pub fn flags(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    pub fn max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = max_stack;
        self
    }

    pub fn max_locals(mut self, max_locals: u16) -> Self {
        self.max_locals = max_locals;
        self
    }
}

/// Assembles a [`Class`] and links its methods back to it.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    super_class: Option<Arc<Class>>,
    constants: Vec<Constant>,
    methods: Vec<MethodDef>,
    fields: Vec<(String, String)>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_class: None,
            constants: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn super_class(mut self, super_class: &Arc<Class>) -> Self {
        self.super_class = Some(Arc::clone(super_class));
        self
    }

    /// Append a constant pool entry. The first one gets index 1.
    pub fn constant(mut self, constant: Constant) -> Self {
        self.constants.push(constant);
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Declare an instance field.
    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        self.fields.push((name.to_string(), descriptor.to_string()));
        self
    }

    pub fn build(self) -> Result<Arc<Class>> {
        let mut parsed = Vec::with_capacity(self.methods.len());
        for def in self.methods {
            let (arg_types, return_type) = parse_method_types(&def.descriptor)?;
            parsed.push((def, arg_types, return_type));
        }

        let first_slot = self
            .super_class
            .as_ref()
            .map_or(0, |s| s.instance_field_count());
        let mut fields = Vec::with_capacity(self.fields.len());
        for (i, (name, descriptor)) in self.fields.into_iter().enumerate() {
            fields.push(Field {
                name,
                field_type: Type::parse_field(&descriptor)?,
                slot: first_slot + i,
            });
        }

        let name = self.name;
        let constant_pool = ConstantPool::new(self.constants);
        let super_class = self.super_class;
        Ok(Arc::new_cyclic(|class: &Weak<Class>| {
            let methods = parsed
                .into_iter()
                .map(|(def, arg_types, return_type)| {
                    let method = Method {
                        name: def.name,
                        descriptor: def.descriptor,
                        class_name: name.clone(),
                        arg_types,
                        return_type,
                        access_flags: def.access_flags,
                        max_stack: def.max_stack,
                        max_locals: def.max_locals,
                        class: class.clone(),
                    };
                    (method.signature_key(), Arc::new(method))
                })
                .collect();
            Class {
                name,
                super_class,
                constant_pool,
                methods,
                fields,
            }
        }))
    }
}

/// Heap object: a runtime class and its field storage.
pub struct Object {
    class: Arc<Class>,
    fields: Mutex<Vec<Value>>,
}

impl Object {
    /// Allocate an instance with every field at its zero value.
    pub fn new(class: &Arc<Class>) -> ObjectRef {
        let mut fields = Vec::with_capacity(class.instance_field_count());
        class.field_defaults(&mut fields);
        Arc::new(Self {
            class: Arc::clone(class),
            fields: Mutex::new(fields),
        })
    }

    /// Runtime class of the object.
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    pub fn get_field(&self, slot: usize) -> Result<Value> {
        let fields = self.fields.lock();
        fields
            .get(slot)
            .cloned()
            .ok_or(RuntimeError::FieldOutOfRange {
                index: slot,
                len: fields.len(),
            })
    }

    pub fn put_field(&self, slot: usize, value: Value) -> Result<()> {
        let mut fields = self.fields.lock();
        let len = fields.len();
        match fields.get_mut(slot) {
            Some(field) => {
                *field = value;
                Ok(())
            }
            None => Err(RuntimeError::FieldOutOfRange { index: slot, len }),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Object({}@{:p})", self.class.name, self)
    }
}

/// Loaded classes by internal name. Filled before any thread runs.
#[derive(Debug, Default)]
pub struct MethodArea {
    classes: HashMap<String, Arc<Class>>,
}

impl MethodArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, class: Arc<Class>) {
        self.classes.insert(class.name().to_string(), class);
    }

    pub fn get(&self, name: &str) -> Result<Arc<Class>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::ClassNotFound(name.to_string()))
    }

    /// Look up a method by class, name and descriptor.
    pub fn find_method(&self, class: &str, name: &str, descriptor: &str) -> Result<Arc<Method>> {
        self.get(class)?
            .find_method(&format!("{name}{descriptor}"))
            .ok_or_else(|| RuntimeError::MethodNotFound {
                class: class.to_string(),
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_method_descriptors() {
        let (args, ret) = parse_method_types("([Ljava/lang/String;)V").unwrap();
        assert_eq!(
            args,
            vec![Type::Array(Box::new(Type::Reference(
                "java/lang/String".to_string()
            )))]
        );
        assert!(ret.is_void());

        let (args, ret) = parse_method_types("(IJLjava/lang/Object;[[DZ)F").unwrap();
        assert_eq!(args.len(), 5);
        assert_eq!(args[1], Type::Long);
        assert_eq!(args[3], Type::Array(Box::new(Type::Array(Box::new(Type::Double)))));
        assert_eq!(ret, Type::Float);
        assert_eq!(args[2].kind(), BaseTypeKind::Reference);
        assert_eq!(args[4].kind(), BaseTypeKind::Boolean);

        assert!(parse_method_types("()").is_err());
        assert!(parse_method_types("(Q)V").is_err());
        assert!(parse_method_types("(L;)V").is_err());
        assert!(parse_method_types("(Ljava/lang/Object)V").is_err());

        // the shared pattern keeps matching after earlier failures
        let (args, ret) = parse_method_types("(C)J").unwrap();
        assert_eq!(args, vec![Type::Char]);
        assert_eq!(ret, Type::Long);
    }

    #[test]
    fn methods_link_back_to_their_class() {
        let class = ClassBuilder::new("pkg/Foo")
            .method(MethodDef::new("bar", "(II)I").max_locals(3))
            .build()
            .unwrap();
        let method = class.find_method("bar(II)I").unwrap();
        assert_eq!(method.parameter_count(), 2);
        assert_eq!(method.class().unwrap().name(), "pkg/Foo");
        assert_eq!(method.to_string(), "pkg/Foo#bar(II)I");
    }

    #[test]
    fn method_lookup_walks_the_superclass_chain() {
        let base = ClassBuilder::new("A")
            .method(MethodDef::new("foo", "()V"))
            .method(MethodDef::new("bar", "()V"))
            .build()
            .unwrap();
        let sub = ClassBuilder::new("B")
            .super_class(&base)
            .method(MethodDef::new("foo", "()V"))
            .build()
            .unwrap();
        assert_eq!(sub.find_method("foo()V").unwrap().class_name(), "B");
        assert_eq!(sub.find_method("bar()V").unwrap().class_name(), "A");
        assert!(sub.find_method("baz()V").is_none());
        assert!(sub.is_subclass_of(&base));
        assert!(!base.is_subclass_of(&sub));
    }

    #[test]
    fn virtual_lookup_skips_static_methods() {
        let base = ClassBuilder::new("A")
            .method(MethodDef::new("foo", "()V"))
            .build()
            .unwrap();
        let sub = ClassBuilder::new("B")
            .super_class(&base)
            .method(MethodDef::new("foo", "()V").flags(ACC_STATIC))
            .build()
            .unwrap();
        assert_eq!(sub.find_method("foo()V").unwrap().class_name(), "B");
        assert_eq!(sub.find_virtual_method("foo()V").unwrap().class_name(), "A");

        let lone = ClassBuilder::new("C")
            .method(MethodDef::new("util", "()V").flags(ACC_STATIC))
            .build()
            .unwrap();
        assert!(lone.find_virtual_method("util()V").is_none());
    }

    #[test]
    fn inherited_fields_come_first() {
        let base = ClassBuilder::new("A").field("x", "I").build().unwrap();
        let sub = ClassBuilder::new("B")
            .super_class(&base)
            .field("name", "Ljava/lang/String;")
            .build()
            .unwrap();
        assert_eq!(sub.instance_field_count(), 2);
        assert_eq!(sub.find_field("x").unwrap().slot(), 0);
        assert_eq!(sub.find_field("name").unwrap().slot(), 1);

        let object = Object::new(&sub);
        assert_eq!(object.get_field(0).unwrap(), Value::Int(0));
        assert_eq!(object.get_field(1).unwrap(), Value::Null);
        object.put_field(0, Value::Int(7)).unwrap();
        assert_eq!(object.get_field(0).unwrap(), Value::Int(7));
        assert!(object.put_field(2, Value::Null).is_err());
    }

    #[test]
    fn missing_classes_are_reported() {
        let area = MethodArea::new();
        assert!(matches!(
            area.get("nope"),
            Err(RuntimeError::ClassNotFound(name)) if name == "nope"
        ));
    }
}
