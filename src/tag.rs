use std::borrow::Cow;
use std::fmt;

/// Identity of a mixin declaration
///
/// Everything registered on behalf of a declaration carries its tag, so that unregistering the
/// tag removes all of it at once.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Tag(Cow<'static, str>);

impl Tag {
    pub fn new(name: impl Into<String>) -> Tag {
        Tag(Cow::Owned(name.into()))
    }

    pub const fn from_static(name: &'static str) -> Tag {
        Tag(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    /// Tag used for failures that cannot be attributed to any declaration
    pub const ENGINE: Tag = Tag::from_static("<engine>");
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
