//! Freehand stroke translation
//!
//! Strokes arrive as `[opcode, ...operands]` arrays in raster space. They are
//! scaled into PDF units without an axis flip: the page builder draws them
//! under a transform whose origin sits at the page's top edge.

use lopdf::content::Operation;
use lopdf::Object;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    QuadTo(f64, f64, f64, f64),
    CubicTo(f64, f64, f64, f64, f64, f64),
    Close,
}

impl PathCommand {
    pub fn opcode(&self) -> &'static str {
        match self {
            PathCommand::MoveTo(..) => "M",
            PathCommand::LineTo(..) => "L",
            PathCommand::QuadTo(..) => "Q",
            PathCommand::CubicTo(..) => "C",
            PathCommand::Close => "Z",
        }
    }

    pub fn operands(&self) -> Vec<f64> {
        match *self {
            PathCommand::MoveTo(x, y) | PathCommand::LineTo(x, y) => vec![x, y],
            PathCommand::QuadTo(cx, cy, x, y) => vec![cx, cy, x, y],
            PathCommand::CubicTo(c1x, c1y, c2x, c2y, x, y) => vec![c1x, c1y, c2x, c2y, x, y],
            PathCommand::Close => Vec::new(),
        }
    }

    /// Build a command from an opcode and its operands, checking arity
    pub fn from_parts(opcode: &str, operands: &[f64]) -> Result<Self, String> {
        let expected = match opcode {
            "M" | "L" => 2,
            "Q" => 4,
            "C" => 6,
            "Z" | "z" => 0,
            other => return Err(format!("unknown path opcode '{}'", other)),
        };
        if operands.len() != expected {
            return Err(format!(
                "path opcode '{}' takes {} operands, got {}",
                opcode,
                expected,
                operands.len()
            ));
        }
        let o = operands;
        Ok(match opcode {
            "M" => PathCommand::MoveTo(o[0], o[1]),
            "L" => PathCommand::LineTo(o[0], o[1]),
            "Q" => PathCommand::QuadTo(o[0], o[1], o[2], o[3]),
            "C" => PathCommand::CubicTo(o[0], o[1], o[2], o[3], o[4], o[5]),
            _ => PathCommand::Close,
        })
    }

    fn scaled(&self, s: f64) -> Self {
        match *self {
            PathCommand::MoveTo(x, y) => PathCommand::MoveTo(x * s, y * s),
            PathCommand::LineTo(x, y) => PathCommand::LineTo(x * s, y * s),
            PathCommand::QuadTo(cx, cy, x, y) => PathCommand::QuadTo(cx * s, cy * s, x * s, y * s),
            PathCommand::CubicTo(c1x, c1y, c2x, c2y, x, y) => {
                PathCommand::CubicTo(c1x * s, c1y * s, c2x * s, c2y * s, x * s, y * s)
            }
            PathCommand::Close => PathCommand::Close,
        }
    }
}

impl Serialize for PathCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let operands = self.operands();
        let mut seq = serializer.serialize_seq(Some(operands.len() + 1))?;
        seq.serialize_element(self.opcode())?;
        for v in operands {
            seq.serialize_element(&v)?;
        }
        seq.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PathToken {
    Op(String),
    Num(f64),
}

impl<'de> Deserialize<'de> for PathCommand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tokens = Vec::<PathToken>::deserialize(deserializer)?;
        let mut iter = tokens.into_iter();
        let opcode = match iter.next() {
            Some(PathToken::Op(op)) => op,
            Some(PathToken::Num(_)) => return Err(de::Error::custom("path command must start with an opcode")),
            None => return Err(de::Error::custom("empty path command")),
        };
        let operands = iter
            .map(|t| match t {
                PathToken::Num(v) => Ok(v),
                PathToken::Op(s) => Err(de::Error::custom(format!("unexpected '{}' in operands", s))),
            })
            .collect::<Result<Vec<f64>, D::Error>>()?;
        PathCommand::from_parts(&opcode, &operands).map_err(de::Error::custom)
    }
}

/// Scale every operand of a raster-space path into PDF units.
///
/// Order and arity are preserved exactly.
pub fn translate_path(commands: &[PathCommand], scale: f64) -> Vec<PathCommand> {
    commands.iter().map(|c| c.scaled(scale)).collect()
}

pub fn scale_stroke_width(width: f64, scale: f64) -> f64 {
    width * scale
}

/// Lower a translated path to PDF path construction operators.
///
/// PDF has no quadratic segment, so `Q` is raised to the equivalent cubic
/// using the current point.
pub fn path_operations(commands: &[PathCommand]) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(commands.len());
    let mut current = (0.0, 0.0);
    let mut subpath_start = (0.0, 0.0);

    for command in commands {
        match *command {
            PathCommand::MoveTo(x, y) => {
                ops.push(Operation::new("m", reals(&[x, y])));
                current = (x, y);
                subpath_start = (x, y);
            }
            PathCommand::LineTo(x, y) => {
                ops.push(Operation::new("l", reals(&[x, y])));
                current = (x, y);
            }
            PathCommand::QuadTo(cx, cy, x, y) => {
                let (x0, y0) = current;
                let c1 = (x0 + 2.0 / 3.0 * (cx - x0), y0 + 2.0 / 3.0 * (cy - y0));
                let c2 = (x + 2.0 / 3.0 * (cx - x), y + 2.0 / 3.0 * (cy - y));
                ops.push(Operation::new("c", reals(&[c1.0, c1.1, c2.0, c2.1, x, y])));
                current = (x, y);
            }
            PathCommand::CubicTo(c1x, c1y, c2x, c2y, x, y) => {
                ops.push(Operation::new("c", reals(&[c1x, c1y, c2x, c2y, x, y])));
                current = (x, y);
            }
            PathCommand::Close => {
                ops.push(Operation::new("h", vec![]));
                current = subpath_start;
            }
        }
    }

    ops
}

fn reals(values: &[f64]) -> Vec<Object> {
    values.iter().map(|v| Object::Real(*v as f32)).collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn command() -> impl Strategy<Value = PathCommand> {
        let v = -2000.0f64..2000.0;
        prop_oneof![
            (v.clone(), v.clone()).prop_map(|(x, y)| PathCommand::MoveTo(x, y)),
            (v.clone(), v.clone()).prop_map(|(x, y)| PathCommand::LineTo(x, y)),
            (v.clone(), v.clone(), v.clone(), v.clone()).prop_map(|(a, b, c, d)| PathCommand::QuadTo(a, b, c, d)),
            (v.clone(), v.clone(), v.clone(), v.clone(), v.clone(), v)
                .prop_map(|(a, b, c, d, e, f)| PathCommand::CubicTo(a, b, c, d, e, f)),
            Just(PathCommand::Close),
        ]
    }

    proptest! {
        /// Property: scaling keeps opcodes and arity, and multiplies every operand
        #[test]
        fn translate_scales_each_operand(
            path in prop::collection::vec(command(), 0..32),
            scale in 0.01f64..10.0,
        ) {
            let translated = translate_path(&path, scale);
            prop_assert_eq!(translated.len(), path.len());
            for (before, after) in path.iter().zip(&translated) {
                prop_assert_eq!(before.opcode(), after.opcode());
                let (a, b) = (before.operands(), after.operands());
                prop_assert_eq!(a.len(), b.len());
                for (x, y) in a.iter().zip(&b) {
                    prop_assert!((x * scale - y).abs() < 1e-9);
                }
            }
        }

        /// Property: every command lowers to exactly one PDF operator
        #[test]
        fn lowering_is_one_to_one(path in prop::collection::vec(command(), 0..32)) {
            prop_assert_eq!(path_operations(&path).len(), path.len());
        }
    }
}
