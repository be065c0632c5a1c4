//! Bridge from native methods to host functions.
//!
//! Host functions are registered under the JNI-style symbol of the method
//! they implement (`Java_` + class name + `_` + method name, with package
//! separators turned into `_`). Each registration is wrapped in an adapter
//! with a fixed arity that converts [`Value`] arguments into the function's
//! parameter types and converts the result back.
use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, RuntimeError};
use crate::program::Method;
use crate::value::{ObjectRef, Value};

/// Conversion from an argument value into a native parameter type.
pub trait FromValue: Sized {
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

/// Conversion from a native return value. `None` means void.
pub trait IntoValue {
    fn into_value(self) -> Option<Value>;
}

impl FromValue for i32 {
    const TYPE_NAME: &'static str = "int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "long";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for f32 {
    const TYPE_NAME: &'static str = "float";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "double";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl FromValue for ObjectRef {
    const TYPE_NAME: &'static str = "object reference";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_reference().cloned()
    }
}

impl FromValue for Option<ObjectRef> {
    const TYPE_NAME: &'static str = "reference";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Reference(object) => Some(Some(object.clone())),
            Value::Null => Some(None),
            _ => None,
        }
    }
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "value";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl IntoValue for () {
    fn into_value(self) -> Option<Value> {
        None
    }
}

macro_rules! into_value {
    ($($t:ty),*) => {
        $(
            impl IntoValue for $t {
                fn into_value(self) -> Option<Value> {
                    Some(Value::from(self))
                }
            }
        )*
    };
}

into_value!(i32, i64, f32, f64, bool, ObjectRef, Option<ObjectRef>);

impl IntoValue for Value {
    fn into_value(self) -> Option<Value> {
        Some(self)
    }
}

/// A host function callable as a native method with arguments `Args`.
pub trait NativeMethod<Args>: Send + Sync + 'static {
    const ARITY: usize;

    fn apply(&self, symbol: &str, args: &[Value]) -> Result<Option<Value>>;
}

fn unpack<T: FromValue>(symbol: &str, index: usize, args: &[Value]) -> Result<T> {
    let value = args.get(index).ok_or_else(|| RuntimeError::NativeArityMismatch {
        symbol: symbol.to_string(),
        expected: index + 1,
        actual: args.len(),
    })?;
    T::from_value(value).ok_or_else(|| RuntimeError::NativeArgumentType {
        symbol: symbol.to_string(),
        index,
        expected: T::TYPE_NAME,
    })
}

macro_rules! one {
    ($arg:ident) => {
        1
    };
}

/// Implement `NativeMethod` for plain functions of the given parameters.
macro_rules! native_method {
    ($($arg:ident),*) => {
        impl<F, R, $($arg),*> NativeMethod<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoValue,
            $($arg: FromValue,)*
        {
            const ARITY: usize = 0 $(+ one!($arg))*;

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn apply(&self, symbol: &str, args: &[Value]) -> Result<Option<Value>> {
                let mut index = 0;
                Ok((self)($({
                    let value = unpack::<$arg>(symbol, index, args)?;
                    index += 1;
                    value
                }),*)
                .into_value())
            }
        }
    };
}

native_method!();
native_method!(A);
native_method!(A, B);
native_method!(A, B, C);
native_method!(A, B, C, D);
native_method!(A, B, C, D, E);
native_method!(A, B, C, D, E, G);

type Adapter = Box<dyn Fn(&str, &[Value]) -> Result<Option<Value>> + Send + Sync>;

/// Type-erased native function with a fixed arity.
pub struct NativeFunction {
    arity: usize,
    adapter: Adapter,
}

impl NativeFunction {
    pub fn new<F, Args>(function: F) -> Self
    where
        F: NativeMethod<Args>,
    {
        Self {
            arity: <F as NativeMethod<Args>>::ARITY,
            adapter: Box::new(move |symbol: &str, args: &[Value]| function.apply(symbol, args)),
        }
    }

    /// Wrap a function that works on raw values.
    pub fn raw<F>(arity: usize, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        Self {
            arity,
            adapter: Box::new(move |_: &str, args: &[Value]| function(args)),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Check the argument count, then call.
    pub fn call(&self, symbol: &str, args: &[Value]) -> Result<Option<Value>> {
        if args.len() != self.arity {
            return Err(RuntimeError::NativeArityMismatch {
                symbol: symbol.to_string(),
                expected: self.arity,
                actual: args.len(),
            });
        }
        (self.adapter)(symbol, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("arity", &self.arity)
            .finish()
    }
}

/// Symbol a native method is registered under.
pub fn native_symbol(class_name: &str, method_name: &str) -> String {
    format!("Java_{}_{}", class_name, method_name).replace(['/', '.'], "_")
}

/// Native functions by symbol. Populated before any thread runs and only
/// read afterwards.
#[derive(Debug, Default)]
pub struct NativeRegistry {
    functions: HashMap<String, NativeFunction>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` as the body of `class_name.method_name`.
    pub fn register<F, Args>(&mut self, class_name: &str, method_name: &str, function: F) -> &mut Self
    where
        F: NativeMethod<Args>,
    {
        self.insert(native_symbol(class_name, method_name), NativeFunction::new(function))
    }

    /// Register an already wrapped function under an explicit symbol.
    pub fn insert(&mut self, symbol: String, function: NativeFunction) -> &mut Self {
        self.functions.insert(symbol, function);
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&NativeFunction> {
        self.functions.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Invoke the host function bound to `method` with `params`, receiver
    /// first for instance methods. Returns `None` for void results.
    pub fn invoke_native(&self, method: &Method, params: &[Value]) -> Result<Option<Value>> {
        if !method.is_native() {
            return Err(RuntimeError::NotNativeMethod(method.to_string()));
        }
        tracing::debug!(
            target: "brewvm::native",
            class = method.class_name(),
            method = method.name(),
            descriptor = method.descriptor(),
            "invoke native method"
        );
        let symbol = native_symbol(method.class_name(), method.name());
        let function = self
            .functions
            .get(&symbol)
            .ok_or_else(|| RuntimeError::NativeNotFound(symbol.clone()))?;
        function.call(&symbol, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeErrorKind;
    use crate::program::{ClassBuilder, MethodDef, ACC_NATIVE, ACC_STATIC};

    #[test]
    fn symbols_flatten_package_separators() {
        assert_eq!(native_symbol("java/lang/Math", "max"), "Java_java_lang_Math_max");
        assert_eq!(native_symbol("java.lang.Math", "max"), "Java_java_lang_Math_max");
        assert_eq!(native_symbol("Main", "print"), "Java_Main_print");
    }

    #[test]
    fn adapters_have_fixed_arity() {
        assert_eq!(NativeFunction::new(|| ()).arity(), 0);
        assert_eq!(NativeFunction::new(|a: i32, b: i32| a + b).arity(), 2);
        assert_eq!(
            NativeFunction::new(|_: f64, _: i64, _: bool, _: Value| 0i32).arity(),
            4
        );
    }

    #[test]
    fn adapters_convert_arguments_and_results() {
        let add = NativeFunction::new(|a: i32, b: i32| a + b);
        assert_eq!(
            add.call("add", &[Value::Int(2), Value::Char(3)]).unwrap(),
            Some(Value::Int(5))
        );
        let err = add.call("add", &[Value::Int(2)]).unwrap_err();
        assert_eq!(err.kind(), RuntimeErrorKind::UnresolvedNative);
        assert!(matches!(
            add.call("add", &[Value::Int(2), Value::Long(3)]),
            Err(RuntimeError::NativeArgumentType { index: 1, expected: "int", .. })
        ));

        let void = NativeFunction::new(|_: Option<ObjectRef>| ());
        assert_eq!(void.call("void", &[Value::Null]).unwrap(), None);
    }

    #[test]
    fn raw_functions_see_every_value() {
        let first = NativeFunction::raw(2, |args| Ok(Some(args[0].clone())));
        assert_eq!(
            first.call("first", &[Value::Long(1), Value::Null]).unwrap(),
            Some(Value::Long(1))
        );
    }

    #[test]
    fn invoke_native_looks_up_the_method_symbol() {
        let class = ClassBuilder::new("java/lang/Math")
            .method(MethodDef::new("abs", "(I)I").flags(ACC_STATIC | ACC_NATIVE))
            .method(MethodDef::new("floor", "(D)D").flags(ACC_STATIC | ACC_NATIVE))
            .method(MethodDef::new("plain", "()V").flags(ACC_STATIC))
            .build()
            .unwrap();
        let mut natives = NativeRegistry::new();
        natives.register("java/lang/Math", "abs", |x: i32| x.abs());

        let abs = class.find_method("abs(I)I").unwrap();
        assert_eq!(
            natives.invoke_native(&abs, &[Value::Int(-3)]).unwrap(),
            Some(Value::Int(3))
        );

        let floor = class.find_method("floor(D)D").unwrap();
        assert!(matches!(
            natives.invoke_native(&floor, &[Value::Double(1.5)]),
            Err(RuntimeError::NativeNotFound(symbol)) if symbol == "Java_java_lang_Math_floor"
        ));

        let plain = class.find_method("plain()V").unwrap();
        assert!(matches!(
            natives.invoke_native(&plain, &[]),
            Err(RuntimeError::NotNativeMethod(_))
        ));
    }
}
