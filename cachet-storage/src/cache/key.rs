//! Cache keys derived from an operation signature and its arguments.
//!
//! A key has the form `{signature}:{encoded_args}`:
//!
//! ```text
//! ClientRepository.get_client_by_client_id(i32 client_id, Option<&[IncludePath<Client>]> include_paths, bool refresh_cache):v1.W3sia2luZCI6...
//! ```
//!
//! Each public cached operation declares its own `const` [`OperationSignature`]
//! so two operations never share a key, even when called with identical
//! arguments. Arguments are normalized into [`KeyArg`] values first; include
//! paths collapse to their path strings, which makes independently built but
//! structurally equal selectors produce the same key.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use cachet_core::{IncludePath, KeyEncodingError, PathError};
use serde::Serialize;

/// Version tag prefixed to every encoded argument vector.
pub const KEY_ENCODING_VERSION: &str = "v1";

/// Encoded-args segment used when no argument vector is supplied at all.
pub const NULL_ARGS: &str = "null";

/// A formal parameter of a cached operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parameter {
    ty: &'static str,
    name: &'static str,
}

impl Parameter {
    pub const fn new(ty: &'static str, name: &'static str) -> Self {
        Self { ty, name }
    }

    pub fn ty(&self) -> &'static str {
        self.ty
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Identity of a cached operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationSignature {
    declaring_type: &'static str,
    operation: &'static str,
    parameters: &'static [Parameter],
}

impl OperationSignature {
    pub const fn new(
        declaring_type: &'static str,
        operation: &'static str,
        parameters: &'static [Parameter],
    ) -> Self {
        Self {
            declaring_type,
            operation,
            parameters,
        }
    }

    pub fn declaring_type(&self) -> &'static str {
        self.declaring_type
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn parameters(&self) -> &'static [Parameter] {
        self.parameters
    }

    /// `DeclaringType.operation`, without the parameter list.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.operation)
    }
}

impl fmt::Display for OperationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.declaring_type, self.operation)?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", p.ty, p.name)?;
        }
        f.write_str(")")
    }
}

/// A normalized key argument.
///
/// Serialized as a tagged union so values of different kinds never encode
/// alike (the integer `1` and the string `"1"` give different keys).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum KeyArg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Paths(Vec<String>),
}

/// Conversion into a normalized key argument.
pub trait ToKeyArg {
    fn to_key_arg(&self) -> Result<KeyArg, PathError>;
}

impl<T: ToKeyArg + ?Sized> ToKeyArg for &T {
    fn to_key_arg(&self) -> Result<KeyArg, PathError> {
        (**self).to_key_arg()
    }
}

impl<T: ToKeyArg> ToKeyArg for Option<T> {
    fn to_key_arg(&self) -> Result<KeyArg, PathError> {
        match self {
            Some(value) => value.to_key_arg(),
            None => Ok(KeyArg::Null),
        }
    }
}

impl ToKeyArg for KeyArg {
    fn to_key_arg(&self) -> Result<KeyArg, PathError> {
        Ok(self.clone())
    }
}

impl ToKeyArg for bool {
    fn to_key_arg(&self) -> Result<KeyArg, PathError> {
        Ok(KeyArg::Bool(*self))
    }
}

macro_rules! int_key_arg {
    ($($t:ty),*) => {
        $(
            impl ToKeyArg for $t {
                fn to_key_arg(&self) -> Result<KeyArg, PathError> {
                    Ok(KeyArg::Int(i64::from(*self)))
                }
            }
        )*
    };
}

int_key_arg!(i8, i16, i32, i64, u8, u16, u32);

impl ToKeyArg for f64 {
    fn to_key_arg(&self) -> Result<KeyArg, PathError> {
        Ok(KeyArg::Float(*self))
    }
}

impl ToKeyArg for str {
    fn to_key_arg(&self) -> Result<KeyArg, PathError> {
        Ok(KeyArg::Str(self.to_string()))
    }
}

impl ToKeyArg for String {
    fn to_key_arg(&self) -> Result<KeyArg, PathError> {
        Ok(KeyArg::Str(self.clone()))
    }
}

impl<T> ToKeyArg for [IncludePath<T>] {
    fn to_key_arg(&self) -> Result<KeyArg, PathError> {
        self.iter()
            .map(IncludePath::path_string)
            .collect::<Result<Vec<_>, _>>()
            .map(KeyArg::Paths)
    }
}

impl<T> ToKeyArg for Vec<IncludePath<T>> {
    fn to_key_arg(&self) -> Result<KeyArg, PathError> {
        self.as_slice().to_key_arg()
    }
}

/// A fully built cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

/// Outcome of building a key. An `Err` means caching is unavailable for the
/// call; it is never fatal to the operation itself.
pub type CacheKeyResult = Result<CacheKey, KeyEncodingError>;

impl CacheKey {
    /// Start building a key for `signature` with an empty argument vector.
    pub fn builder(signature: &OperationSignature) -> CacheKeyBuilder<'_> {
        CacheKeyBuilder {
            signature,
            args: Vec::new(),
            error: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True if this key was built for `signature`.
    pub fn belongs_to(&self, signature: &OperationSignature) -> bool {
        self.0
            .strip_prefix(signature.to_string().as_str())
            .is_some_and(|rest| rest.starts_with(':'))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Inline key construction at the call site.
///
/// ```ignore
/// let key = CacheKey::builder(&GET_CLIENT_BY_CLIENT_ID)
///     .arg(client_id)
///     .arg(include_paths)
///     .build();
/// ```
#[derive(Debug)]
pub struct CacheKeyBuilder<'a> {
    signature: &'a OperationSignature,
    args: Vec<KeyArg>,
    error: Option<KeyEncodingError>,
}

impl<'a> CacheKeyBuilder<'a> {
    /// Append an argument. The first normalization failure is kept and
    /// reported by [`CacheKeyBuilder::build`].
    pub fn arg(mut self, value: impl ToKeyArg) -> Self {
        if self.error.is_some() {
            return self;
        }
        let position = self.args.len();
        match value.to_key_arg() {
            Ok(arg) => self.args.push(arg),
            Err(e) => {
                self.error = Some(KeyEncodingError::UnresolvablePath {
                    position,
                    reason: e.to_string(),
                });
            }
        }
        self
    }

    pub fn build(self) -> CacheKeyResult {
        if let Some(error) = self.error {
            return Err(error);
        }
        build_key(self.signature, Some(&self.args))
    }
}

/// Build the key for `signature` called with `args`.
///
/// `None` stands for "no argument vector at all" and encodes as `null`;
/// `Some(&[])` is an empty vector and encodes like any other.
pub fn build_key(signature: &OperationSignature, args: Option<&[KeyArg]>) -> CacheKeyResult {
    let encoded = match args {
        Some(args) => encode_args(args)?,
        None => NULL_ARGS.to_string(),
    };
    Ok(CacheKey(format!("{}:{}", signature, encoded)))
}

fn encode_args(args: &[KeyArg]) -> Result<String, KeyEncodingError> {
    // serde_json writes NaN and infinities as null, which would collide.
    for (position, arg) in args.iter().enumerate() {
        if let KeyArg::Float(value) = arg {
            if !value.is_finite() {
                return Err(KeyEncodingError::NonFiniteFloat {
                    position,
                    value: value.to_string(),
                });
            }
        }
    }

    let bytes = serde_json::to_vec(args).map_err(|e| KeyEncodingError::Serialization {
        reason: e.to_string(),
    })?;

    Ok(format!("{}.{}", KEY_ENCODING_VERSION, STANDARD.encode(bytes)))
}
