use serde_json::{Map, Value};

use crate::common::types::{ColorRgba, Float2, Float3};
use crate::ParserError;

/// One location inside a plain JSON document, addressed by a dotted field
/// path. Every conversion either yields the expected kind or fails with a
/// [`ParserError::SchemaViolation`] naming the path and the expectation, so
/// callers compose these primitives instead of poking at `Value` directly.
#[derive(Debug)]
pub struct Node<'a> {
    file: &'a str,
    path: String,
    value: &'a Value,
}

impl<'a> Node<'a> {
    pub fn root(file: &'a str, value: &'a Value) -> Node<'a> {
        Node {
            file,
            path: String::new(),
            value,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn violation(&self, expected: impl Into<String>) -> ParserError {
        ParserError::SchemaViolation {
            file: self.file.to_owned(),
            path: self.path.clone(),
            expected: expected.into(),
        }
    }

    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn child(&self, path: String, value: &'a Value) -> Node<'a> {
        Node {
            file: self.file,
            path,
            value,
        }
    }

    /// A member that may be absent. JSON `null` counts as absent.
    pub fn optional(&self, key: &str) -> Option<Node<'a>> {
        match self.value.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(self.child(self.child_path(key), value)),
        }
    }

    /// A member that must be present.
    pub fn member(&self, key: &str) -> Result<Node<'a>, ParserError> {
        self.value
            .get(key)
            .filter(|value| !value.is_null())
            .map(|value| self.child(self.child_path(key), value))
            .ok_or_else(|| ParserError::SchemaViolation {
                file: self.file.to_owned(),
                path: self.child_path(key),
                expected: "a required field".to_owned(),
            })
    }

    pub fn expect_object(&self) -> Result<&'a Map<String, Value>, ParserError> {
        self.value.as_object().ok_or_else(|| self.violation("an object"))
    }

    /// Object members as `(key, node)` pairs, for name-keyed tables.
    pub fn entries(&self) -> Result<Vec<(&'a str, Node<'a>)>, ParserError> {
        Ok(self
            .expect_object()?
            .iter()
            .map(|(key, value)| (key.as_str(), self.child(self.child_path(key), value)))
            .collect())
    }

    pub fn elements(&self) -> Result<Vec<Node<'a>>, ParserError> {
        let array = self.value.as_array().ok_or_else(|| self.violation("an array"))?;
        Ok(array
            .iter()
            .enumerate()
            .map(|(index, value)| self.child(format!("{}[{}]", self.path, index), value))
            .collect())
    }

    pub fn expect_string(&self) -> Result<&'a str, ParserError> {
        self.value.as_str().ok_or_else(|| self.violation("a string"))
    }

    pub fn expect_bool(&self) -> Result<bool, ParserError> {
        self.value.as_bool().ok_or_else(|| self.violation("a boolean"))
    }

    pub fn expect_f32(&self) -> Result<f32, ParserError> {
        self.value
            .as_f64()
            .map(|number| number as f32)
            .ok_or_else(|| self.violation("a number"))
    }

    pub fn expect_u32(&self) -> Result<u32, ParserError> {
        self.value
            .as_u64()
            .and_then(|number| u32::try_from(number).ok())
            .ok_or_else(|| self.violation("an unsigned integer"))
    }

    pub fn expect_usize(&self) -> Result<usize, ParserError> {
        self.value
            .as_u64()
            .and_then(|number| usize::try_from(number).ok())
            .ok_or_else(|| self.violation("an unsigned integer"))
    }

    /// A fixed-arity array of numbers.
    pub fn expect_f32s<const N: usize>(&self) -> Result<[f32; N], ParserError> {
        let elements = self.elements().map_err(|_| self.violation(format!("a {}-tuple", N)))?;
        if elements.len() != N {
            return Err(self.violation(format!("a {}-tuple", N)));
        }

        let mut result = [0f32; N];
        for (slot, element) in result.iter_mut().zip(&elements) {
            *slot = element.expect_f32()?;
        }
        Ok(result)
    }

    /// An `{x, y, z}` object of numbers.
    pub fn expect_float3(&self) -> Result<Float3, ParserError> {
        if !self.value.is_object() {
            return Err(self.violation("an {x, y, z} object"));
        }
        Ok(Float3 {
            x: self.member("x")?.expect_f32()?,
            y: self.member("y")?.expect_f32()?,
            z: self.member("z")?.expect_f32()?,
        })
    }

    /// A `{u, v}` object of numbers.
    pub fn expect_float2(&self) -> Result<Float2, ParserError> {
        if !self.value.is_object() {
            return Err(self.violation("a {u, v} object"));
        }
        Ok(Float2 {
            x: self.member("u")?.expect_f32()?,
            y: self.member("v")?.expect_f32()?,
        })
    }

    /// An `{x, y, z}` object of integer indices.
    pub fn expect_index_triple(&self) -> Result<[u32; 3], ParserError> {
        if !self.value.is_object() {
            return Err(self.violation("an {x, y, z} object of integers"));
        }
        Ok([
            self.member("x")?.expect_u32()?,
            self.member("y")?.expect_u32()?,
            self.member("z")?.expect_u32()?,
        ])
    }

    /// An `{r, g, b, a}` color with every channel clamped into [0, 1].
    /// The alpha channel may be omitted and defaults to opaque.
    pub fn expect_color(&self) -> Result<ColorRgba, ParserError> {
        if !self.value.is_object() {
            return Err(self.violation("an {r, g, b, a} color object"));
        }
        let alpha = match self.optional("a") {
            Some(node) => node.expect_f32()?,
            None => 1.0,
        };
        Ok(ColorRgba::clamped(
            self.member("r")?.expect_f32()?,
            self.member("g")?.expect_f32()?,
            self.member("b")?.expect_f32()?,
            alpha,
        ))
    }
}
