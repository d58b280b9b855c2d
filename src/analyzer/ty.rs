use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Integer,
    Real,
    Boolean,
    String,
    Void,
}

impl Primitive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Integer => "integer",
            Primitive::Real => "real",
            Primitive::Boolean => "boolean",
            Primitive::String => "string",
            Primitive::Void => "void",
        }
    }
}

/// A primitive kind plus array dimensions. An empty dimension list is a scalar.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PType {
    primitive: Primitive,
    dims: Vec<u32>,
}

impl PType {
    pub fn new(primitive: Primitive) -> Self {
        Self {
            primitive,
            dims: vec![],
        }
    }

    pub fn array(primitive: Primitive, dims: Vec<u32>) -> Self {
        Self { primitive, dims }
    }

    pub fn integer() -> Self {
        Self::new(Primitive::Integer)
    }

    pub fn real() -> Self {
        Self::new(Primitive::Real)
    }

    pub fn boolean() -> Self {
        Self::new(Primitive::Boolean)
    }

    pub fn string() -> Self {
        Self::new(Primitive::String)
    }

    pub fn void() -> Self {
        Self::new(Primitive::Void)
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn dims(&self) -> &[u32] {
        &self.dims
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn is_scalar_of(&self, primitive: Primitive) -> bool {
        self.is_scalar() && self.primitive == primitive
    }

    pub fn is_numeric(&self) -> bool {
        self.is_scalar() && matches!(self.primitive, Primitive::Integer | Primitive::Real)
    }

    pub fn is_void(&self) -> bool {
        self.primitive == Primitive::Void
    }

    /// Every declared dimension must be a positive integer.
    pub fn has_valid_dims(&self) -> bool {
        self.dims.iter().all(|&d| d > 0)
    }

    /// The type left after `used` leading subscripts, or `None` when over-indexed.
    pub fn strip_dims(&self, used: usize) -> Option<PType> {
        if used > self.dims.len() {
            return None;
        }
        Some(PType::array(self.primitive, self.dims[used..].to_vec()))
    }

    /// Whether a value of type `self` may flow into a slot of type `target`.
    ///
    /// Identical types are always compatible; the only implicit conversion is
    /// widening a scalar integer into a real.
    pub fn is_compatible_with(&self, target: &PType) -> bool {
        if self.dims != target.dims {
            return false;
        }
        if self.primitive == target.primitive {
            return true;
        }
        self.is_scalar() && self.primitive == Primitive::Integer && target.primitive == Primitive::Real
    }
}

impl fmt::Display for PType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primitive.as_str())?;
        if !self.dims.is_empty() {
            write!(f, " ")?;
            for d in &self.dims {
                write!(f, "[{}]", d)?;
            }
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("malformed type string '{0}'")]
pub struct ParsePTypeError(pub String);

impl FromStr for PType {
    type Err = ParsePTypeError;

    /// Parses the text produced by `Display`, e.g. `integer` or `real [2][3]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePTypeError(s.to_string());
        let s = s.trim();
        let (head, mut rest) = match s.find('[') {
            Some(i) => (s[..i].trim_end(), &s[i..]),
            None => (s, ""),
        };
        let primitive = match head {
            "integer" => Primitive::Integer,
            "real" => Primitive::Real,
            "boolean" => Primitive::Boolean,
            "string" => Primitive::String,
            "void" => Primitive::Void,
            _ => return Err(err()),
        };

        let mut dims = vec![];
        while !rest.is_empty() {
            let Some(inner) = rest.strip_prefix('[') else {
                return Err(err());
            };
            let close = inner.find(']').ok_or_else(err)?;
            dims.push(inner[..close].parse().map_err(|_| err())?);
            rest = &inner[close + 1..];
        }

        Ok(PType::array(primitive, dims))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
}

impl Constant {
    pub fn ty(&self) -> PType {
        match self {
            Constant::Integer(_) => PType::integer(),
            Constant::Real(_) => PType::real(),
            Constant::Boolean(_) => PType::boolean(),
            Constant::String(_) => PType::string(),
        }
    }

    /// Operand text for an `li`/`.word`; booleans lower to `1`/`0`.
    pub fn asm_value(&self) -> Option<String> {
        match self {
            Constant::Integer(v) => Some(v.to_string()),
            Constant::Boolean(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Constant::Real(_) | Constant::String(_) => None,
        }
    }

    pub fn negated(&self) -> Option<Constant> {
        match self {
            Constant::Integer(v) => Some(Constant::Integer(-v)),
            Constant::Real(v) => Some(Constant::Real(-v)),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Integer(v) => write!(f, "{}", v),
            Constant::Real(v) => write!(f, "{:.6}", v),
            Constant::Boolean(b) => write!(f, "{}", b),
            Constant::String(s) => write!(f, "{}", s),
        }
    }
}
