//! Field and method descriptors (JVMS 4.3)

use super::{BinaryName, Name};
use crate::util::Width;

/// Conversion of a descriptor to its string form
pub trait RenderDescriptor {
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    fn render_to(&self, write_to: &mut String);
}

/// Conversion of a string to a descriptor
pub trait ParseDescriptor: Sized {
    /// Parse a whole string as a descriptor
    fn parse(source: &str) -> Result<Self, String> {
        let mut cursor = Cursor { source, position: 0 };
        let parsed = Self::parse_from(&mut cursor)?;
        match cursor.peek() {
            None => Ok(parsed),
            Some(c) => Err(cursor.error(format!("unexpected leftover '{}'", c))),
        }
    }

    fn parse_from(cursor: &mut Cursor) -> Result<Self, String>;
}

/// Position in a descriptor being parsed
pub struct Cursor<'a> {
    source: &'a str,
    position: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.source[self.position..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        match self.next() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found the end", expected))),
        }
    }

    fn error(&self, message: String) -> String {
        format!("Descriptor '{}' at {}: {}", self.source, self.position, message)
    }
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    const ALL: [(char, BaseType); 8] = [
        ('B', BaseType::Byte),
        ('C', BaseType::Char),
        ('D', BaseType::Double),
        ('F', BaseType::Float),
        ('I', BaseType::Int),
        ('J', BaseType::Long),
        ('S', BaseType::Short),
        ('Z', BaseType::Boolean),
    ];

    fn from_char(c: char) -> Option<BaseType> {
        BaseType::ALL
            .iter()
            .find(|(code, _)| *code == c)
            .map(|(_, base)| *base)
    }

    fn code(self) -> char {
        BaseType::ALL
            .iter()
            .find(|(_, base)| *base == self)
            .map_or('?', |(code, _)| *code)
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        write_to.push(self.code());
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(cursor: &mut Cursor) -> Result<Self, String> {
        match cursor.next() {
            Some(c) => BaseType::from_char(c)
                .ok_or_else(|| cursor.error(format!("'{}' is not a primitive type", c))),
            None => Err(cursor.error(String::from("missing primitive type"))),
        }
    }
}

/// Reference type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType {
    Object(BinaryName),
    ObjectArray(ArrayType<BinaryName>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Array type, by its innermost element type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Dimensions beyond the first (`A[][]` has 1)
    pub additional_dimensions: usize,

    pub element_type: T,
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, write_to: &mut String) {
        for _ in 0..=self.additional_dimensions {
            write_to.push('[');
        }
        self.element_type.render_to(write_to);
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn parse_from(cursor: &mut Cursor) -> Result<Self, String> {
        cursor.expect('L')?;
        let source = cursor.source;
        let rest = &source[cursor.position..];
        let end = rest
            .find(';')
            .ok_or_else(|| cursor.error(String::from("unterminated class name")))?;
        let name = BinaryName::from_string(rest[..end].to_owned())
            .map_err(|msg| cursor.error(msg))?;
        cursor.position += end + 1;
        Ok(name)
    }
}

impl RenderDescriptor for RefType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(class) => class.render_to(write_to),
            RefType::PrimitiveArray(array) => array.render_to(write_to),
            RefType::ObjectArray(array) => array.render_to(write_to),
        }
    }
}

impl ParseDescriptor for RefType {
    fn parse_from(cursor: &mut Cursor) -> Result<Self, String> {
        if cursor.peek() != Some('[') {
            return BinaryName::parse_from(cursor).map(RefType::Object);
        }

        let mut dimensions = 0;
        while cursor.peek() == Some('[') {
            cursor.next();
            dimensions += 1;
        }
        let additional_dimensions = dimensions - 1;
        if cursor.peek() == Some('L') {
            Ok(RefType::ObjectArray(ArrayType {
                additional_dimensions,
                element_type: BinaryName::parse_from(cursor)?,
            }))
        } else {
            Ok(RefType::PrimitiveArray(ArrayType {
                additional_dimensions,
                element_type: BaseType::parse_from(cursor)?,
            }))
        }
    }
}

impl RefType {
    /// Array whose elements have the given type
    pub fn array(field_type: FieldType) -> RefType {
        match field_type {
            FieldType::Base(element_type) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::Object(element_type)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::PrimitiveArray(array)) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: array.additional_dimensions + 1,
                ..array
            }),
            FieldType::Ref(RefType::ObjectArray(array)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: array.additional_dimensions + 1,
                ..array
            }),
        }
    }

    /// Element type, if this is an array type
    pub fn element(&self) -> Option<FieldType> {
        let element = match self {
            RefType::Object(_) => return None,
            RefType::PrimitiveArray(array) => match array.additional_dimensions {
                0 => FieldType::Base(array.element_type),
                n => FieldType::Ref(RefType::PrimitiveArray(ArrayType {
                    additional_dimensions: n - 1,
                    element_type: array.element_type,
                })),
            },
            RefType::ObjectArray(array) => match array.additional_dimensions {
                0 => FieldType::object(array.element_type.clone()),
                n => FieldType::Ref(RefType::ObjectArray(ArrayType {
                    additional_dimensions: n - 1,
                    element_type: array.element_type.clone(),
                })),
            },
        };
        Some(element)
    }
}

/// Type of a field, parameter, or local variable
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Ref(RefType),
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl FieldType {
    pub fn array(field_type: FieldType) -> FieldType {
        FieldType::Ref(RefType::array(field_type))
    }

    pub const fn object(class_name: BinaryName) -> FieldType {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub const fn int() -> FieldType {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType {
        FieldType::Base(BaseType::Long)
    }

    pub const fn float() -> FieldType {
        FieldType::Base(BaseType::Float)
    }

    pub const fn double() -> FieldType {
        FieldType::Base(BaseType::Double)
    }

    pub const fn char() -> FieldType {
        FieldType::Base(BaseType::Char)
    }

    pub const fn boolean() -> FieldType {
        FieldType::Base(BaseType::Boolean)
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(ref_type) => ref_type.render_to(write_to),
        }
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(cursor: &mut Cursor) -> Result<Self, String> {
        match cursor.peek() {
            Some('L' | '[') => RefType::parse_from(cursor).map(FieldType::Ref),
            _ => BaseType::parse_from(cursor).map(FieldType::Base),
        }
    }
}

/// Parameter and return types of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,

    /// `None` for `void`
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    /// Number of local slots the parameters take up (`this` included if there is one)
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let this = usize::from(has_this_param);
        this + self.parameters.iter().map(Width::width).sum::<usize>()
    }

    /// Rendered parameter list, including both parentheses but excluding the return type
    ///
    /// Invocation selectors match on this prefix so that the return type does not matter.
    pub fn parameter_prefix(&self) -> String {
        let mut prefix = String::from("(");
        for parameter in &self.parameters {
            parameter.render_to(&mut prefix);
        }
        prefix.push(')');
        prefix
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push_str(&self.parameter_prefix());
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(cursor: &mut Cursor) -> Result<Self, String> {
        cursor.expect('(')?;
        let mut parameters = vec![];
        loop {
            match cursor.peek() {
                Some(')') => break,
                None => return Err(cursor.error(String::from("unterminated parameters"))),
                Some(_) => parameters.push(FieldType::parse_from(cursor)?),
            }
        }
        cursor.expect(')')?;

        let return_type = if cursor.peek() == Some('V') {
            cursor.next();
            None
        } else {
            Some(FieldType::parse_from(cursor)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}
