use std::borrow::Cow;
use std::fmt;

/// Name of a method or field (JVMS 4.2.2)
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Internal form of a class name, with `/` between packages (JVMS 4.2.1)
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BinaryName(Cow<'static, str>);

/// Validated name
pub trait Name: Sized {
    /// Validate a string and wrap it
    fn from_string(name: String) -> Result<Self, String>;

    fn as_str(&self) -> &str;
}

fn validate_segment(name: &str) -> Result<(), String> {
    if name.is_empty() {
        Err(String::from("name or name segment is empty"))
    } else if let Some(illegal) = name.chars().find(|c| matches!(c, '.' | ';' | '[' | '/')) {
        Err(format!("'{}' contains illegal character '{}'", name, illegal))
    } else {
        Ok(())
    }
}

macro_rules! name_impls {
    ($name:ident, $validate:expr) => {
        impl Name for $name {
            fn from_string(name: String) -> Result<Self, String> {
                let validate: fn(&str) -> Result<(), String> = $validate;
                validate(&name)?;
                Ok($name(Cow::Owned(name)))
            }

            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_impls!(UnqualifiedName, validate_segment);
name_impls!(BinaryName, |name| name.split('/').try_for_each(validate_segment));

impl UnqualifiedName {
    /// Append another name (used to build dispatcher names)
    pub fn concat(&self, other: &UnqualifiedName) -> UnqualifiedName {
        UnqualifiedName(Cow::Owned(format!("{}{}", self.as_str(), other.as_str())))
    }

    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    /// Name known to be well-formed, skipping validation
    pub(crate) const fn from_static(value: &'static str) -> UnqualifiedName {
        Self::name(value)
    }

    // JDK names
    pub const DOUBLEVALUE: Self = Self::name("doubleValue");
    pub const FLOATVALUE: Self = Self::name("floatValue");
    pub const INTVALUE: Self = Self::name("intValue");
    pub const LONGVALUE: Self = Self::name("longValue");
    pub const VALUEOF: Self = Self::name("valueOf");

    pub const INIT: Self = Self::name("<init>");

    // Members of the runtime support classes
    pub const FOLD: Self = Self::name("fold");
    pub const GET: Self = Self::name("get");
    pub const VALUE: Self = Self::name("value");
    pub const YIELDING: Self = Self::name("yielding");

    // Constants of the runtime `TypeSort` enum
    pub const INT: Self = Self::name("INT");
    pub const LONG: Self = Self::name("LONG");
    pub const FLOAT: Self = Self::name("FLOAT");
    pub const DOUBLE: Self = Self::name("DOUBLE");
    pub const OBJECT: Self = Self::name("OBJECT");
}

impl BinaryName {
    /// Flatten the package separators into underscores (`a/b/C` becomes `a_b_C`)
    pub fn flattened(&self) -> UnqualifiedName {
        UnqualifiedName(Cow::Owned(self.as_str().replace('/', "_")))
    }

    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    /// Name known to be well-formed, skipping validation
    pub(crate) const fn from_static(value: &'static str) -> BinaryName {
        Self::name(value)
    }

    // JDK names
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const METHODTYPE: Self = Self::name("java/lang/invoke/MethodType");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validation() {
        assert!(UnqualifiedName::from_string(String::from("run")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("a/b")).is_err());
        assert!(UnqualifiedName::from_string(String::new()).is_err());
        assert!(BinaryName::from_string(String::from("a/b/C")).is_ok());
        assert!(BinaryName::from_string(String::from("a//C")).is_err());
        assert_eq!(
            BinaryName::from_string(String::from("a.b")).unwrap_err(),
            "'a.b' contains illegal character '.'"
        );
    }

    #[test]
    fn flattening() {
        let name = BinaryName::from_string(String::from("com/example/Target")).unwrap();
        assert_eq!(name.flattened().as_str(), "com_example_Target");
        assert_eq!(
            UnqualifiedName::from_static("uber_").concat(&name.flattened()).as_str(),
            "uber_com_example_Target"
        );
    }
}
