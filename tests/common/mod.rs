//! Small interpreter for method bodies, with native versions of the runtime support classes
//!
//! Only what the tests need is supported: anything else panics.

#![allow(dead_code)]

use jmixin::jvm::code::{
    Constant, EqComparison, Instruction, InvokeType, MethodBody, MethodRef, OrdComparison, SynLabel,
};
use jmixin::jvm::model::{Class, Method};
use jmixin::jvm::{
    BinaryName, ClassAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor, Name,
    ParseDescriptor, RenderDescriptor, UnqualifiedName,
};
use jmixin::settings::RuntimeClasses;
use std::collections::HashMap;

/// Class whose static `println(Ljava/lang/Object;)V` records its argument
pub const OUT: &str = "test/Out";

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Ref(usize),
    Top,
}

impl Value {
    pub fn int(&self) -> i32 {
        match self {
            Value::Int(i) => *i,
            other => panic!("expected an int, got {:?}", other),
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Instance {
        class: String,
        fields: HashMap<String, Value>,
    },
    Boxed(Value),
    Str(String),
    Array(Vec<Value>),
}

/// Exception that escaped a method, with its message
#[derive(Clone, Debug, PartialEq)]
pub struct Thrown(pub String);

enum Control {
    Next,
    Jump(SynLabel),
    Return(Option<Value>),
}

pub struct Vm {
    classes: HashMap<String, Class>,
    runtime: RuntimeClasses,
    heap: Vec<Object>,
    statics: HashMap<(String, String), Value>,
    pub output: Vec<String>,
}

impl Vm {
    pub fn new(runtime: RuntimeClasses, classes: impl IntoIterator<Item = Class>) -> Vm {
        Vm {
            classes: classes
                .into_iter()
                .map(|class| (class.name.as_str().to_owned(), class))
                .collect(),
            runtime,
            heap: vec![],
            statics: HashMap::new(),
            output: vec![],
        }
    }

    fn alloc(&mut self, object: Object) -> Value {
        self.heap.push(object);
        Value::Ref(self.heap.len() - 1)
    }

    pub fn string(&mut self, value: &str) -> Value {
        self.alloc(Object::Str(value.to_owned()))
    }

    pub fn new_instance(&mut self, class: &str) -> Value {
        self.alloc(Object::Instance {
            class: class.to_owned(),
            fields: HashMap::new(),
        })
    }

    pub fn object(&self, value: &Value) -> &Object {
        match value {
            Value::Ref(idx) => &self.heap[*idx],
            other => panic!("expected a reference, got {:?}", other),
        }
    }

    fn object_mut(&mut self, value: &Value) -> &mut Object {
        match value {
            Value::Ref(idx) => &mut self.heap[*idx],
            other => panic!("expected a reference, got {:?}", other),
        }
    }

    pub fn field(&self, object: &Value, name: &str) -> Value {
        match self.object(object) {
            Object::Instance { fields, .. } => fields.get(name).cloned().unwrap_or(Value::Null),
            other => panic!("no field {} on {:?}", name, other),
        }
    }

    fn set_field(&mut self, object: &Value, name: &str, value: Value) {
        match self.object_mut(object) {
            Object::Instance { fields, .. } => {
                fields.insert(name.to_owned(), value);
            }
            other => panic!("no field {} on {:?}", name, other),
        }
    }

    /// Render a value the way `println` shows it
    pub fn render(&self, value: &Value) -> String {
        match value {
            Value::Int(i) => i.to_string(),
            Value::Long(l) => l.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Null => String::from("null"),
            Value::Top => String::from("<top>"),
            Value::Ref(_) => match self.object(value) {
                Object::Str(s) => s.clone(),
                Object::Boxed(inner) => self.render(inner),
                Object::Instance { class, .. } => format!("<{}>", class),
                Object::Array(values) => format!("<array of {}>", values.len()),
            },
        }
    }

    fn array(&self, value: &Value) -> &Vec<Value> {
        match self.object(value) {
            Object::Array(values) => values,
            other => panic!("expected an array, got {:?}", other),
        }
    }

    fn array_mut(&mut self, value: &Value) -> &mut Vec<Value> {
        match self.object_mut(value) {
            Object::Array(values) => values,
            other => panic!("expected an array, got {:?}", other),
        }
    }

    pub fn new_array(&mut self, values: Vec<Value>) -> Value {
        self.alloc(Object::Array(values))
    }

    pub fn boxed(&mut self, value: Value) -> Value {
        self.alloc(Object::Boxed(value))
    }

    /// Call a static method of a loaded class
    pub fn call_static(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Thrown> {
        let method = self.find_method(class, name, descriptor);
        self.run(class, &method, args)
    }

    /// Call an instance method of a loaded class
    pub fn call_virtual(
        &mut self,
        receiver: Value,
        class: &str,
        name: &str,
        descriptor: &str,
        mut args: Vec<Value>,
    ) -> Result<Option<Value>, Thrown> {
        let method = self.find_method(class, name, descriptor);
        args.insert(0, receiver);
        self.run(class, &method, args)
    }

    /// Build an instance of a loaded class through one of its constructors
    pub fn construct(&mut self, class: &str, descriptor: &str, args: Vec<Value>) -> Result<Value, Thrown> {
        let instance = self.new_instance(class);
        self.call_virtual(instance.clone(), class, "<init>", descriptor, args)?;
        Ok(instance)
    }

    fn find_method(&self, class: &str, name: &str, descriptor: &str) -> Method {
        let descriptor = MethodDescriptor::parse(descriptor).unwrap();
        self.classes
            .get(class)
            .and_then(|class| {
                class
                    .methods
                    .iter()
                    .find(|method| method.name.as_str() == name && method.descriptor == descriptor)
            })
            .cloned()
            .unwrap_or_else(|| panic!("no method {}.{}", class, name))
    }

    fn run(&mut self, class: &str, method: &Method, args: Vec<Value>) -> Result<Option<Value>, Thrown> {
        let body: MethodBody = method
            .body
            .clone()
            .unwrap_or_else(|| panic!("{}.{} has no code", class, method.name.as_str()));

        let mut locals = vec![];
        for arg in args {
            let wide = arg.is_wide();
            locals.push(arg);
            if wide {
                locals.push(Value::Top);
            }
        }

        let labels: HashMap<SynLabel, usize> = body
            .instructions
            .iter()
            .enumerate()
            .filter_map(|(idx, insn)| match insn {
                Instruction::Label(label) => Some((*label, idx)),
                _ => None,
            })
            .collect();

        let mut stack = vec![];
        let mut pc = 0;
        loop {
            let insn = body
                .instructions
                .get(pc)
                .unwrap_or_else(|| panic!("fell off the end of {}.{}", class, method.name.as_str()));
            match self.step(insn, &mut stack, &mut locals) {
                Ok(Control::Next) => pc += 1,
                Ok(Control::Jump(label)) => pc = labels[&label],
                Ok(Control::Return(value)) => return Ok(value),
                Err(thrown) => {
                    let handler = body.try_catch.iter().find(|block| {
                        labels[&block.start] <= pc && pc < labels[&block.end]
                    });
                    match handler {
                        Some(block) => {
                            let exception = self.exception(&thrown.0);
                            stack.clear();
                            stack.push(exception);
                            pc = labels[&block.handler];
                        }
                        None => return Err(thrown),
                    }
                }
            }
        }
    }

    fn exception(&mut self, message: &str) -> Value {
        let exception = self.new_instance(BinaryName::EXCEPTION.as_str());
        let message = self.string(message);
        self.set_field(&exception, "message", message);
        exception
    }

    fn step(
        &mut self,
        insn: &Instruction,
        stack: &mut Vec<Value>,
        locals: &mut Vec<Value>,
    ) -> Result<Control, Thrown> {
        use Instruction::*;

        fn pop(stack: &mut Vec<Value>) -> Value {
            stack.pop().expect("stack underflow")
        }

        fn store(locals: &mut Vec<Value>, slot: u16, value: Value) {
            let slot = slot as usize;
            if locals.len() <= slot + 1 {
                locals.resize(slot + 2, Value::Top);
            }
            locals[slot] = value;
        }

        fn compare(op: OrdComparison, a: i32, b: i32) -> bool {
            match op {
                OrdComparison::EQ => a == b,
                OrdComparison::NE => a != b,
                OrdComparison::LT => a < b,
                OrdComparison::LE => a <= b,
                OrdComparison::GT => a > b,
                OrdComparison::GE => a >= b,
            }
        }

        match insn {
            Nop | Label(_) | Frame(_) | LineNumber(_) | CheckCast(_) => (),
            AConstNull => stack.push(Value::Null),
            IConstM1 => stack.push(Value::Int(-1)),
            IConst0 => stack.push(Value::Int(0)),
            IConst1 => stack.push(Value::Int(1)),
            IConst2 => stack.push(Value::Int(2)),
            IConst3 => stack.push(Value::Int(3)),
            IConst4 => stack.push(Value::Int(4)),
            IConst5 => stack.push(Value::Int(5)),
            LConst0 => stack.push(Value::Long(0)),
            LConst1 => stack.push(Value::Long(1)),
            BiPush(b) => stack.push(Value::Int(*b as i32)),
            SiPush(s) => stack.push(Value::Int(*s as i32)),
            Ldc(Constant::Integer(i)) => stack.push(Value::Int(*i)),
            Ldc(Constant::Long(l)) => stack.push(Value::Long(*l)),
            Ldc(Constant::Float(f)) => stack.push(Value::Float(*f)),
            Ldc(Constant::Double(d)) => stack.push(Value::Double(*d)),
            Ldc(Constant::String(s)) => {
                let s = self.string(s);
                stack.push(s);
            }
            ILoad(slot) | LLoad(slot) | FLoad(slot) | DLoad(slot) | ALoad(slot) => {
                stack.push(locals[*slot as usize].clone())
            }
            IStore(slot) | LStore(slot) | FStore(slot) | DStore(slot) | AStore(slot) => {
                let value = pop(stack);
                store(locals, *slot, value);
            }
            IInc(slot, delta) => {
                let value = locals[*slot as usize].int() + *delta as i32;
                locals[*slot as usize] = Value::Int(value);
            }
            AALoad => {
                let idx = pop(stack).int() as usize;
                let array = pop(stack);
                stack.push(self.array(&array)[idx].clone());
            }
            AAStore => {
                let value = pop(stack);
                let idx = pop(stack).int() as usize;
                let array = pop(stack);
                self.array_mut(&array)[idx] = value;
            }
            Pop => {
                pop(stack);
            }
            Dup => {
                let top = stack.last().cloned().expect("stack underflow");
                stack.push(top);
            }
            Swap => {
                let a = pop(stack);
                let b = pop(stack);
                stack.push(a);
                stack.push(b);
            }
            IAdd => {
                let b = pop(stack).int();
                let a = pop(stack).int();
                stack.push(Value::Int(a.wrapping_add(b)));
            }
            ISub => {
                let b = pop(stack).int();
                let a = pop(stack).int();
                stack.push(Value::Int(a.wrapping_sub(b)));
            }
            IMul => {
                let b = pop(stack).int();
                let a = pop(stack).int();
                stack.push(Value::Int(a.wrapping_mul(b)));
            }
            INeg => {
                let a = pop(stack).int();
                stack.push(Value::Int(-a));
            }
            LAdd => match (pop(stack), pop(stack)) {
                (Value::Long(b), Value::Long(a)) => stack.push(Value::Long(a + b)),
                other => panic!("ladd on {:?}", other),
            },
            If(op, label) => {
                if compare(*op, pop(stack).int(), 0) {
                    return Ok(Control::Jump(*label));
                }
            }
            IfICmp(op, label) => {
                let b = pop(stack).int();
                let a = pop(stack).int();
                if compare(*op, a, b) {
                    return Ok(Control::Jump(*label));
                }
            }
            IfNull(op, label) => {
                let is_null = pop(stack) == Value::Null;
                if is_null == (*op == EqComparison::EQ) {
                    return Ok(Control::Jump(*label));
                }
            }
            Goto(label) => return Ok(Control::Jump(*label)),
            TableSwitch {
                default,
                low,
                targets,
            } => {
                let idx = i64::from(pop(stack).int()) - i64::from(*low);
                let target = usize::try_from(idx)
                    .ok()
                    .and_then(|idx| targets.get(idx))
                    .unwrap_or(default);
                return Ok(Control::Jump(*target));
            }
            LookupSwitch { default, targets } => {
                let key = pop(stack).int();
                let target = targets
                    .iter()
                    .find(|(case, _)| *case == key)
                    .map_or(default, |(_, label)| label);
                return Ok(Control::Jump(*target));
            }
            IReturn | LReturn | FReturn | DReturn | AReturn => {
                return Ok(Control::Return(Some(pop(stack))))
            }
            Return => return Ok(Control::Return(None)),
            GetStatic(field) if field.owner == self.runtime.type_sort => {
                let constant = self.string(field.name.as_str());
                stack.push(constant);
            }
            GetStatic(field) => {
                let key = (field.owner.as_str().to_owned(), field.name.as_str().to_owned());
                stack.push(self.statics.get(&key).cloned().unwrap_or(Value::Int(0)));
            }
            PutStatic(field) => {
                let key = (field.owner.as_str().to_owned(), field.name.as_str().to_owned());
                let value = pop(stack);
                self.statics.insert(key, value);
            }
            GetField(field) => {
                let object = pop(stack);
                let value = match self.field(&object, field.name.as_str()) {
                    Value::Null if field.descriptor == FieldType::int() => Value::Int(0),
                    value => value,
                };
                stack.push(value);
            }
            PutField(field) => {
                let value = pop(stack);
                let object = pop(stack);
                self.set_field(&object, field.name.as_str(), value);
            }
            New(class) => {
                let instance = self.new_instance(class.as_str());
                stack.push(instance);
            }
            ANewArray(_) => {
                let length = pop(stack).int() as usize;
                let array = self.new_array(vec![Value::Null; length]);
                stack.push(array);
            }
            AThrow => {
                let exception = pop(stack);
                let message = self.field(&exception, "message");
                return Err(Thrown(self.render(&message)));
            }
            Invoke(invoke_type, callee) => {
                let count = callee.descriptor.parameters.len();
                let args = stack.split_off(stack.len() - count);
                let receiver = if *invoke_type == InvokeType::Static {
                    None
                } else {
                    Some(pop(stack))
                };
                if let Some(result) = self.invoke(callee, receiver, args)? {
                    stack.push(result);
                }
            }
            other => panic!("unsupported instruction {:?}", other),
        }
        Ok(Control::Next)
    }

    fn invoke(
        &mut self,
        callee: &MethodRef,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Thrown> {
        if let Some(result) = self.native(callee, receiver.as_ref(), &args) {
            return Ok(result);
        }
        let method = self.find_method(
            callee.owner.as_str(),
            callee.name.as_str(),
            &callee.descriptor.render(),
        );
        let mut all = receiver.into_iter().collect::<Vec<_>>();
        all.extend(args);
        self.run(callee.owner.as_str(), &method, all)
    }

    /// Methods of the JDK and runtime support classes (`None` if the callee is not native)
    fn native(
        &mut self,
        callee: &MethodRef,
        receiver: Option<&Value>,
        args: &[Value],
    ) -> Option<Option<Value>> {
        let owner = callee.owner.clone();
        let name = callee.name.as_str();
        let runtime = self.runtime.clone();
        let arg = |idx: usize| args[idx].clone();

        if name == "<init>" {
            let this = receiver.cloned().expect("constructor without receiver");
            if owner == BinaryName::OBJECT || owner == runtime.internal_flow {
                // nothing to initialize
            } else if owner == BinaryName::EXCEPTION {
                self.set_field(&this, "message", arg(0));
            } else if owner == runtime.flow_result {
                self.set_field(&this, "yielding", arg(0));
                self.set_field(&this, "value", arg(1));
                self.set_field(&this, "sort", arg(2));
            } else if owner == runtime.internal_captured {
                self.set_field(&this, "value", arg(0));
                self.set_field(&this, "sort", arg(1));
            } else if owner == runtime.internal_stack {
                self.set_field(&this, "values", arg(0));
            } else if owner == runtime.uninitialized_type {
                self.set_field(&this, "name", arg(0));
            } else {
                return None;
            }
            return Some(None);
        }

        let this = || receiver.cloned().expect("instance method without receiver");
        if owner.as_str() == OUT && name == "println" {
            let line = self.render(&arg(0));
            self.output.push(line);
            Some(None)
        } else if name == "valueOf" {
            Some(Some(self.boxed(arg(0))))
        } else if matches!(name, "intValue" | "longValue" | "floatValue" | "doubleValue") {
            match self.object(&this()) {
                Object::Boxed(inner) => Some(Some(inner.clone())),
                other => panic!("unboxing {:?}", other),
            }
        } else if owner == runtime.flow_result && name == "fold" {
            let this = this();
            let yielding = self.field(&this, "yielding") == Value::Int(1);
            Some(Some(if yielding { this } else { arg(0) }))
        } else if owner == runtime.flow && name == "yield" {
            Some(Some(self.result(true, arg(0))))
        } else if owner == runtime.flow && name == "proceed" {
            Some(Some(self.result(false, Value::Null)))
        } else if owner == runtime.captured && name == "get" {
            Some(Some(self.field(&this(), "value")))
        } else if owner == runtime.captured && name == "set" {
            self.set_field(&this(), "value", arg(0));
            Some(None)
        } else if owner == runtime.stack && name == "get" {
            let values = self.field(&this(), "values");
            Some(Some(self.array(&values)[arg(0).int() as usize].clone()))
        } else if owner == runtime.stack && name == "set" {
            let values = self.field(&this(), "values");
            self.array_mut(&values)[arg(0).int() as usize] = arg(1);
            Some(None)
        } else {
            None
        }
    }

    fn result(&mut self, yielding: bool, value: Value) -> Value {
        let class = self.runtime.flow_result.as_str().to_owned();
        let result = self.new_instance(&class);
        self.set_field(&result, "yielding", Value::Int(yielding as i32));
        self.set_field(&result, "value", value);
        result
    }
}

pub fn binary(name: &str) -> BinaryName {
    BinaryName::from_string(String::from(name)).unwrap()
}

pub fn unqualified(name: &str) -> UnqualifiedName {
    UnqualifiedName::from_string(String::from(name)).unwrap()
}

pub fn descriptor(descriptor: &str) -> MethodDescriptor {
    MethodDescriptor::parse(descriptor).unwrap()
}

pub fn method(
    access_flags: MethodAccessFlags,
    name: &str,
    desc: &str,
    max_locals: u16,
    code: Vec<Instruction>,
) -> Method {
    Method::new(
        access_flags,
        unqualified(name),
        descriptor(desc),
        Some(MethodBody::new(code, max_locals, 8)),
    )
}

pub fn class(name: &str, methods: Vec<Method>) -> Class {
    let mut class = Class::new(binary(name), Some(BinaryName::OBJECT), ClassAccessFlags::PUBLIC);
    for method in methods {
        class.add_method(method);
    }
    class
}

/// `test/Out.println(Object)`
pub fn println() -> Instruction {
    Instruction::Invoke(
        InvokeType::Static,
        MethodRef::new(binary(OUT), unqualified("println"), descriptor("(Ljava/lang/Object;)V")),
    )
}

/// Print a string constant
pub fn print(line: &str) -> Vec<Instruction> {
    vec![Instruction::Ldc(Constant::String(String::from(line))), println()]
}
