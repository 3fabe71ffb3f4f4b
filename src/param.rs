//! Argument tokens and their coercion to typed action parameters.
//!
//! The client sends an ordered list of JSON tokens plus zero or more binary
//! attachments. Parameters are bound in declaration order: attachment typed
//! parameters draw from the attachment list, every other parameter consumes
//! the next token.

use crate::error::CoercionError;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Number, Value};
use std::vec;

/// A loosely typed argument as sent by the client.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(from = "Value")]
pub enum Token {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    /// Objects and arrays, bound by deserializing into the parameter type.
    Structured(Value),
}

impl Token {
    /// Short description used in coercion errors.
    pub fn describe(&self) -> String {
        match self {
            Token::Null => "null".to_string(),
            Token::Bool(b) => format!("boolean {b}"),
            Token::Number(n) => format!("number {n}"),
            Token::Text(s) => format!("string '{s}'"),
            Token::Structured(Value::Array(_)) => "array".to_string(),
            Token::Structured(_) => "object".to_string(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Token::Null => Value::Null,
            Token::Bool(b) => Value::Bool(b),
            Token::Number(n) => Value::Number(n),
            Token::Text(s) => Value::String(s),
            Token::Structured(v) => v,
        }
    }
}

impl From<Value> for Token {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Token::Null,
            Value::Bool(b) => Token::Bool(b),
            Value::Number(n) => Token::Number(n),
            Value::String(s) => Token::Text(s),
            other => Token::Structured(other),
        }
    }
}

/// Binary payload uploaded alongside an action call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Where a parameter takes its value from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// Next argument token.
    Token,
    /// Next attachment, if any.
    Attachment,
    /// All remaining attachments.
    Attachments,
}

impl ParamKind {
    pub fn is_attachment(self) -> bool {
        !matches!(self, ParamKind::Token)
    }
}

/// Cursor over the tokens and attachments of one invocation.
#[derive(Debug)]
pub struct Arguments {
    tokens: vec::IntoIter<Token>,
    attachments: vec::IntoIter<Attachment>,
    position: usize,
}

impl Arguments {
    pub fn new(tokens: Vec<Token>, attachments: Vec<Attachment>) -> Self {
        Self {
            tokens: tokens.into_iter(),
            attachments: attachments.into_iter(),
            position: 0,
        }
    }

    /// Take the next token, returning it with its position in the token list.
    pub fn next_token(&mut self, expected: &'static str) -> Result<(usize, Token), CoercionError> {
        let index = self.position;

        match self.tokens.next() {
            Some(token) => {
                self.position += 1;
                Ok((index, token))
            }
            None => Err(CoercionError::Missing { index, expected }),
        }
    }

    pub fn next_attachment(&mut self) -> Option<Attachment> {
        self.attachments.next()
    }

    pub fn remaining_attachments(&mut self) -> Vec<Attachment> {
        self.attachments.by_ref().collect()
    }

    /// Number of tokens no parameter asked for.
    pub fn surplus_tokens(&self) -> usize {
        self.tokens.len()
    }
}

/// Total conversion of one token into a parameter type.
pub trait FromToken: Sized {
    const EXPECTED: &'static str;

    fn from_token(token: Token, index: usize) -> Result<Self, CoercionError>;
}

/// A type that can appear as an action parameter.
pub trait ActionParam: Sized {
    const KIND: ParamKind = ParamKind::Token;

    fn extract(args: &mut Arguments) -> Result<Self, CoercionError>;
}

fn incompatible<T: FromToken>(token: &Token, index: usize) -> CoercionError {
    CoercionError::Incompatible {
        index,
        expected: T::EXPECTED,
        found: token.describe(),
    }
}

impl FromToken for String {
    const EXPECTED: &'static str = "string";

    fn from_token(token: Token, index: usize) -> Result<Self, CoercionError> {
        match token {
            Token::Text(s) => Ok(s),
            Token::Number(n) => Ok(n.to_string()),
            Token::Bool(b) => Ok(b.to_string()),
            other => Err(incompatible::<Self>(&other, index)),
        }
    }
}

impl FromToken for bool {
    const EXPECTED: &'static str = "bool";

    fn from_token(token: Token, index: usize) -> Result<Self, CoercionError> {
        match &token {
            Token::Bool(b) => Ok(*b),
            Token::Text(s) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
            Token::Text(s) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
            Token::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            _ => Err(incompatible::<Self>(&token, index)),
        }
    }
}

macro_rules! integer_from_token {
    ($($ty:ty),*) => {$(
        impl FromToken for $ty {
            const EXPECTED: &'static str = stringify!($ty);

            fn from_token(token: Token, index: usize) -> Result<Self, CoercionError> {
                let converted = match &token {
                    Token::Number(n) => {
                        if let Some(i) = n.as_i64() {
                            <$ty>::try_from(i).ok()
                        } else if let Some(u) = n.as_u64() {
                            <$ty>::try_from(u).ok()
                        } else {
                            // floats convert only when they carry no fraction
                            n.as_f64()
                                .filter(|f| f.fract() == 0.0 && f.is_finite())
                                .and_then(|f| <$ty>::try_from(f as i128).ok())
                        }
                    }
                    Token::Text(s) => s.trim().parse::<$ty>().ok(),
                    Token::Bool(b) => Some(<$ty>::from(*b)),
                    _ => None,
                };

                converted.ok_or_else(|| incompatible::<Self>(&token, index))
            }
        }
    )*};
}

integer_from_token!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! float_from_token {
    ($($ty:ty),*) => {$(
        impl FromToken for $ty {
            const EXPECTED: &'static str = stringify!($ty);

            fn from_token(token: Token, index: usize) -> Result<Self, CoercionError> {
                let converted = match &token {
                    Token::Number(n) => n.as_f64().map(|f| f as $ty),
                    Token::Text(s) => s.trim().parse::<$ty>().ok(),
                    Token::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                    _ => None,
                };

                converted.ok_or_else(|| incompatible::<Self>(&token, index))
            }
        }
    )*};
}

float_from_token!(f32, f64);

/// Implement [`ActionParam`] for a [`FromToken`] type.
#[doc(hidden)]
#[macro_export]
macro_rules! impl_token_param {
    ($($ty:ty),* $(,)?) => {$(
        impl $crate::param::ActionParam for $ty {
            fn extract(
                args: &mut $crate::param::Arguments,
            ) -> ::std::result::Result<Self, $crate::error::CoercionError> {
                let (index, token) =
                    args.next_token(<$ty as $crate::param::FromToken>::EXPECTED)?;
                <$ty as $crate::param::FromToken>::from_token(token, index)
            }
        }
    )*};
}

/// `null` binds to `None`; any other token goes through the type's
/// conversion.
impl<T: FromToken> ActionParam for Option<T> {
    fn extract(args: &mut Arguments) -> Result<Self, CoercionError> {
        let (index, token) = args.next_token(T::EXPECTED)?;

        match token {
            Token::Null => Ok(None),
            token => T::from_token(token, index).map(Some),
        }
    }
}

impl_token_param!(String, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// Make a field-less enum usable as an action parameter.
///
/// Textual tokens resolve by variant name, case sensitive; anything else is a
/// [`CoercionError`].
///
/// ```
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// enum Theme {
///     Light,
///     Dark,
/// }
///
/// vue_page::action_enum!(Theme { Light, Dark });
///
/// fn bind<P: vue_page::param::ActionParam>() {}
/// bind::<Theme>();
/// bind::<Option<Theme>>();
///
/// assert_eq!(Theme::Dark.name(), "Dark");
/// assert_eq!(Theme::VARIANTS, &["Light", "Dark"]);
/// ```
#[macro_export]
macro_rules! action_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $ty {
            pub const VARIANTS: &'static [&'static str] = &[$(stringify!($variant)),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $($ty::$variant => stringify!($variant),)+
                }
            }
        }

        impl $crate::param::FromToken for $ty {
            const EXPECTED: &'static str = stringify!($ty);

            fn from_token(
                token: $crate::param::Token,
                index: usize,
            ) -> ::std::result::Result<Self, $crate::error::CoercionError> {
                match token {
                    $crate::param::Token::Text(name) => match name.as_str() {
                        $(stringify!($variant) => Ok($ty::$variant),)+
                        _ => Err($crate::error::CoercionError::UnknownVariant {
                            index,
                            expected: stringify!($ty),
                            value: name,
                        }),
                    },
                    other => Err($crate::error::CoercionError::Incompatible {
                        index,
                        expected: stringify!($ty),
                        found: other.describe(),
                    }),
                }
            }
        }

        $crate::impl_token_param!($ty);
    };
}

/// Parameter bound by deserializing the token into `T`.
///
/// Used for objects, arrays and any other serde type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned> ActionParam for Json<T> {
    fn extract(args: &mut Arguments) -> Result<Self, CoercionError> {
        let expected = std::any::type_name::<T>();
        let (index, token) = args.next_token(expected)?;

        serde_json::from_value(token.into_value())
            .map(Json)
            .map_err(|e| CoercionError::Malformed {
                index,
                expected,
                reason: e.to_string(),
            })
    }
}

impl ActionParam for Option<Attachment> {
    const KIND: ParamKind = ParamKind::Attachment;

    fn extract(args: &mut Arguments) -> Result<Self, CoercionError> {
        Ok(args.next_attachment())
    }
}

impl ActionParam for Vec<Attachment> {
    const KIND: ParamKind = ParamKind::Attachments;

    fn extract(args: &mut Arguments) -> Result<Self, CoercionError> {
        Ok(args.remaining_attachments())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Level {
        Low,
        High,
    }

    crate::action_enum!(Level { Low, High });

    #[derive(Debug, Deserialize, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    fn args(tokens: Value) -> Arguments {
        let Value::Array(tokens) = tokens else {
            panic!("tokens must be an array");
        };
        Arguments::new(tokens.into_iter().map(Token::from).collect(), vec![])
    }

    #[test]
    fn tokens_deserialize_into_tagged_variants() {
        let tokens: Vec<Token> =
            serde_json::from_value(json!([null, true, 3, "a", {"k": 1}, [1]])).unwrap();

        assert_eq!(tokens[0], Token::Null);
        assert_eq!(tokens[1], Token::Bool(true));
        assert_eq!(tokens[2], Token::Number(3.into()));
        assert_eq!(tokens[3], Token::Text("a".into()));
        assert_eq!(tokens[4], Token::Structured(json!({"k": 1})));
        assert_eq!(tokens[5], Token::Structured(json!([1])));
    }

    #[test]
    fn primitives_convert_from_text() {
        let mut a = args(json!(["42", " true ", "2.5", 7]));

        assert_eq!(i32::extract(&mut a), Ok(42));
        assert_eq!(bool::extract(&mut a), Ok(true));
        assert_eq!(f64::extract(&mut a), Ok(2.5));
        assert_eq!(String::extract(&mut a), Ok("7".to_string()));
    }

    #[test]
    fn unconvertible_values_fail() {
        let mut a = args(json!(["abc"]));
        assert_eq!(
            i64::extract(&mut a),
            Err(CoercionError::Incompatible {
                index: 0,
                expected: "i64",
                found: "string 'abc'".to_string()
            })
        );

        let mut a = args(json!([300, 1.5, {"a": 1}]));
        assert!(u8::extract(&mut a).is_err());
        assert!(i32::extract(&mut a).is_err());
        assert!(String::extract(&mut a).is_err());
    }

    #[test]
    fn integral_floats_convert_to_integers() {
        let mut a = args(json!([4.0]));
        assert_eq!(u32::extract(&mut a), Ok(4));
    }

    #[test]
    fn null_binds_to_none_only() {
        let mut a = args(json!([null, null, 5]));

        assert_eq!(Option::<i32>::extract(&mut a), Ok(None));
        assert!(i32::extract(&mut a).is_err());
        assert_eq!(Option::<i32>::extract(&mut a), Ok(Some(5)));
    }

    #[test]
    fn missing_token_is_reported_with_position() {
        let mut a = args(json!(["x"]));
        String::extract(&mut a).unwrap();

        assert_eq!(
            i32::extract(&mut a),
            Err(CoercionError::Missing {
                index: 1,
                expected: "i32"
            })
        );
    }

    #[test]
    fn enums_resolve_by_exact_name() {
        let mut a = args(json!(["High", "high", 1]));

        assert_eq!(Level::extract(&mut a), Ok(Level::High));
        assert_eq!(
            Level::extract(&mut a),
            Err(CoercionError::UnknownVariant {
                index: 1,
                expected: "Level",
                value: "high".to_string()
            })
        );
        assert!(matches!(
            Level::extract(&mut a),
            Err(CoercionError::Incompatible { index: 2, .. })
        ));
        assert_eq!(Level::VARIANTS, &["Low", "High"]);
        assert_eq!(Level::Low.name(), "Low");
    }

    #[test]
    fn optional_enum_accepts_null() {
        let mut a = args(json!([null, "Low", "Medium"]));

        assert_eq!(Option::<Level>::extract(&mut a), Ok(None));
        assert_eq!(Option::<Level>::extract(&mut a), Ok(Some(Level::Low)));
        assert!(matches!(
            Option::<Level>::extract(&mut a),
            Err(CoercionError::UnknownVariant { index: 2, .. })
        ));
    }

    #[test]
    fn structured_tokens_deserialize_into_target_type() {
        let mut a = args(json!([{"x": 1, "y": 2}, {"x": "no"}]));

        assert_eq!(
            Json::<Point>::extract(&mut a).map(Json::into_inner),
            Ok(Point { x: 1, y: 2 })
        );
        assert!(matches!(
            Json::<Point>::extract(&mut a),
            Err(CoercionError::Malformed { index: 1, .. })
        ));
    }

    #[test]
    fn attachments_never_consume_tokens() {
        let mut a = Arguments::new(
            vec![Token::Text("Bob".into())],
            vec![Attachment::new("a.txt", "A"), Attachment::new("b.txt", "B")],
        );

        let first = Option::<Attachment>::extract(&mut a).unwrap();
        assert_eq!(first.unwrap().file_name.as_deref(), Some("a.txt"));
        assert_eq!(String::extract(&mut a), Ok("Bob".to_string()));

        let rest = Vec::<Attachment>::extract(&mut a).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(Option::<Attachment>::extract(&mut a), Ok(None));
    }
}
