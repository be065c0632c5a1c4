use brewvm::constant_pool::{Constant, MemberRef};
use brewvm::error::halt;
use brewvm::program::{ClassBuilder, MethodArea, MethodDef, Object, ACC_NATIVE, ACC_STATIC};
use brewvm::{NativeRegistry, ObjectRef, Result, Runtime, RuntimeConfig, StackFrame, Value};

fn run() -> Result<()> {
    // What are the program components ?
    // 1. Classes: Shape with a native area() and Square overriding it.
    let object = ClassBuilder::new("java/lang/Object")
        .method(MethodDef::new("<init>", "()V").max_locals(1))
        .build()?;
    let shape = ClassBuilder::new("demo/Shape")
        .super_class(&object)
        .field("side", "I")
        .method(MethodDef::new("area", "()I").flags(ACC_NATIVE))
        .build()?;
    let square = ClassBuilder::new("demo/Square")
        .super_class(&shape)
        .method(MethodDef::new("area", "()I").flags(ACC_NATIVE))
        .build()?;
    let main = ClassBuilder::new("demo/Main")
        .constant(Constant::MethodRef(MemberRef::new("demo/Shape", "area", "()I")))
        .constant(Constant::MethodRef(MemberRef::new("java/lang/Math", "max", "(II)I")))
        .constant(Constant::FieldRef(MemberRef::new("demo/Shape", "side", "I")))
        .method(MethodDef::new("main", "()V").flags(ACC_STATIC).max_stack(4).max_locals(1))
        .build()?;
    let math = ClassBuilder::new("java/lang/Math")
        .super_class(&object)
        .method(MethodDef::new("max", "(II)I").flags(ACC_STATIC | ACC_NATIVE))
        .build()?;

    let mut area = MethodArea::new();
    for class in [object, shape, square.clone(), main, math] {
        area.define(class);
    }
    let entry = area.find_method("demo/Main", "main", "()V")?;

    // 2. Native functions, registered before any thread runs.
    let mut natives = NativeRegistry::new();
    natives
        .register("java/lang/Math", "max", |a: i32, b: i32| a.max(b))
        .register("demo/Shape", "area", |_: ObjectRef| -1i32)
        .register("demo/Square", "area", |this: ObjectRef| {
            let side = this.get_field(0).ok().and_then(|v| v.as_int()).unwrap_or(0);
            side * side
        });

    // 3. A thread invokes through the main method's constant pool.
    let runtime = Runtime::new(RuntimeConfig::default(), area, natives);
    let mut thread = runtime.spawn_thread("main");
    thread.push_frame(StackFrame::new(entry))?;

    let sq = Object::new(&square);
    let caller = thread.peek_frame_mut()?;
    caller.put_field(&sq, 3, Value::Int(7), runtime.method_area())?;
    caller.push(Value::Reference(sq))?;
    thread.invoke_virtual(1)?;
    let area = thread.peek_frame_mut()?.pop()?;
    println!("Square.area() through Shape reference: {:?}", area);

    let caller = thread.peek_frame_mut()?;
    caller.push(Value::Int(3))?;
    caller.push(Value::Int(11))?;
    thread.invoke_static(2)?;
    println!("Math.max(3, 11): {:?}", thread.peek_frame()?.peek()?);
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        halt(err);
    }
}
