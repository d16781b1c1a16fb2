/// Iterators are named generators of values, used to parameterize the names
/// and contents of scenario groups and scenarios.
///     <iterator name="year" type="int" min="2020" max="2050" step="10"/>
///     <iterator name="tax" type="float" min="0.5" max="1.5" step="0.5" format="%.2f"/>
///     <iterator name="policy" type="list" values="low, high"/>
/// Numeric ranges include their upper bound.
use crate::errors::Error;
use crate::printf::{format_number, Number};
use crate::xml::XmlElement;
use ustr::Ustr;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IteratorKind {
    Int,
    Float,
    List,
}

impl std::fmt::Display for IteratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IteratorKind::Int => write!(f, "int"),
            IteratorKind::Float => write!(f, "float"),
            IteratorKind::List => write!(f, "list"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ValueIterator {
    name: Ustr,
    kind: IteratorKind,
    range: Option<(Number, Number, Number)>, // min, max, step
    values: Vec<String>,
}

fn parse_int(node: &XmlElement, attr: &'static str, v: &str) -> Result<i64, Error> {
    v.trim()
        .parse::<i64>()
        .map_err(|_| Error::invalid_attribute(node, attr, v))
}

fn parse_float(
    node: &XmlElement,
    attr: &'static str,
    v: &str,
) -> Result<f64, Error> {
    v.trim()
        .parse::<f64>()
        .map_err(|_| Error::invalid_attribute(node, attr, v))
}

impl ValueIterator {
    /// Build an iterator from its <iterator> element.
    pub fn from_node(node: &XmlElement) -> Result<Self, Error> {
        Self::load(node).map_err(|e| node.locate(e))
    }

    fn load(node: &XmlElement) -> Result<Self, Error> {
        let name = Ustr::from(node.require("name")?);
        let kind = match node.require("type")? {
            "int" => IteratorKind::Int,
            "float" => IteratorKind::Float,
            "list" => IteratorKind::List,
            t => return Err(Error::invalid_attribute(node, "type", t)),
        };

        if kind == IteratorKind::List {
            return match node.get_non_empty("values") {
                None => Err(Error::invalid_iterator(
                    name,
                    "list iterator must provide a values attribute",
                )),
                Some(values) => Self::new_list(name, values),
            };
        }

        let (min, max) =
            match (node.get_non_empty("min"), node.get_non_empty("max")) {
                (Some(min), Some(max)) => (min, max),
                _ => {
                    return Err(Error::invalid_iterator(
                        name,
                        format!(
                            "{} iterator must provide min and max attributes",
                            kind
                        ),
                    ))
                }
            };
        let format = node.get_non_empty("format");

        if kind == IteratorKind::Int {
            Self::new_int(
                name,
                parse_int(node, "min", min)?,
                parse_int(node, "max", max)?,
                match node.get_non_empty("step") {
                    None => 1,
                    Some(s) => parse_int(node, "step", s)?,
                },
                format,
            )
        } else {
            Self::new_float(
                name,
                parse_float(node, "min", min)?,
                parse_float(node, "max", max)?,
                match node.get_non_empty("step") {
                    None => 1.0,
                    Some(s) => parse_float(node, "step", s)?,
                },
                format,
            )
        }
    }

    /// An integer range, including `max`.  The default format is "%d".
    pub fn new_int(
        name: Ustr,
        min: i64,
        max: i64,
        step: i64,
        format: Option<&str>,
    ) -> Result<Self, Error> {
        if step <= 0 {
            return Err(Error::invalid_iterator(name, "step must be positive"));
        }
        let format = format.unwrap_or("%d");
        let mut values = Vec::new();
        let mut current = Some(min);
        while let Some(v) = current.filter(|v| *v <= max) {
            values.push(
                format_number(format, Number::Int(v))
                    .map_err(|e| Error::invalid_iterator(name, e))?,
            );
            current = v.checked_add(step);
        }
        Self::build(
            name,
            IteratorKind::Int,
            Some((Number::Int(min), Number::Int(max), Number::Int(step))),
            values,
        )
    }

    /// A floating point range, including `max`.  Values are accumulated by
    /// repeatedly adding `step`.  The default format is "%.1f".
    pub fn new_float(
        name: Ustr,
        min: f64,
        max: f64,
        step: f64,
        format: Option<&str>,
    ) -> Result<Self, Error> {
        if step.is_nan() || step <= 0.0 {
            return Err(Error::invalid_iterator(name, "step must be positive"));
        }
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::invalid_iterator(name, "bounds must be finite"));
        }
        let format = format.unwrap_or("%.1f");
        let mut values = Vec::new();
        let mut current = min;
        while current <= max {
            values.push(
                format_number(format, Number::Float(current))
                    .map_err(|e| Error::invalid_iterator(name, e))?,
            );
            let next = current + step;
            if next <= current {
                break; // step is too small to make progress
            }
            current = next;
        }
        Self::build(
            name,
            IteratorKind::Float,
            Some((
                Number::Float(min),
                Number::Float(max),
                Number::Float(step),
            )),
            values,
        )
    }

    /// An explicit comma-separated list of values.  Surrounding whitespaces
    /// are removed from each value.
    pub fn new_list(name: Ustr, values: &str) -> Result<Self, Error> {
        Self::build(
            name,
            IteratorKind::List,
            None,
            values.split(',').map(|v| v.trim().to_string()).collect(),
        )
    }

    fn build(
        name: Ustr,
        kind: IteratorKind,
        range: Option<(Number, Number, Number)>,
        values: Vec<String>,
    ) -> Result<Self, Error> {
        if values.is_empty() {
            return Err(Error::invalid_iterator(name, "no values produced"));
        }
        Ok(ValueIterator {
            name,
            kind,
            range,
            values,
        })
    }

    pub fn name(&self) -> Ustr {
        self.name
    }

    /// The formatted values, in order
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

impl std::fmt::Display for ValueIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<iterator name='{}' type='{}' ", self.name, self.kind)?;
        match self.range {
            None => write!(f, "values='{}'/>", self.values.join(",")),
            Some((min, max, step)) => {
                let show = |n: Number| match n {
                    Number::Int(i) => i.to_string(),
                    Number::Float(v) => v.to_string(),
                };
                write!(
                    f,
                    "min='{}' max='{}' step='{}'/>",
                    show(min),
                    show(max),
                    show(step)
                )
            }
        }
    }
}
